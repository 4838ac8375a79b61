use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use mr_filer::channels::{MailSession, NntpSession};
use mr_filer::config::FilerConfig;
use mr_filer::error::RunError;
use mr_filer::logging;
use mr_filer::pipeline::{Ledger, Pipeline};
use mr_filer::tracker::{CommandTracker, Tracker};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage; a second install is harmless.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = FilerConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = logging::init(&config.logging, &config.project.product)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        profile = %config.profile.name,
        product = %config.project.product,
        alias = %config.mail.alias,
        "MR filer starting"
    );

    let (mut session, range) = match NntpSession::connect(&config.mail).await {
        Ok(connected) => connected,
        Err(source) => {
            let err = RunError::Connection {
                server: config.mail.server.clone(),
                alias: config.mail.alias.clone(),
                source,
            };
            error!(error = %err, "Connection failed");
            return Err(err.into());
        }
    };

    let ledger = Ledger::open(config.run.ledger_path(&config.project.product))
        .await
        .map_err(RunError::from)?;

    let tracker: Arc<dyn Tracker> = Arc::new(
        CommandTracker::new(&config.project, &config.tracker, &config.profile)
            .with_working_dir(config.run.work_dir.clone()),
    );

    let mut pipeline = Pipeline::new(&config, tracker, ledger);
    let result = pipeline.run(&mut session, range).await;

    if let Err(e) = session.quit().await {
        warn!(error = %e, "Failed to close news session");
    }

    match result {
        Ok(summary) => {
            info!(
                filed = summary.filed.len(),
                failed = summary.failed,
                "MR filer finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            Err(e.into())
        }
    }
}
