//! NNTP session for reading mailer aliases published as newsgroups.
//!
//! Raw protocol over TCP (or TLS via rustls), blocking I/O. The async
//! `MailSession` impl hands the connection to `spawn_blocking` for each
//! exchange and takes it back afterwards.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use async_trait::async_trait;
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::channels::headers::decode_header;
use crate::channels::{GroupRange, MailSession, MessageHeader};
use crate::config::MailConfig;
use crate::error::MailError;

/// Byte stream an NNTP conversation runs over.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

// ── Blocking connection ─────────────────────────────────────────────

/// One NNTP conversation. Every method blocks on the socket.
pub struct NntpConnection {
    stream: BufReader<Box<dyn Transport>>,
}

impl NntpConnection {
    /// Wrap an already-connected stream.
    pub fn new(stream: Box<dyn Transport>) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Open a TCP (or TLS) connection to the configured server.
    pub fn open(config: &MailConfig) -> Result<Self, MailError> {
        let tcp = TcpStream::connect((config.server.as_str(), config.port))?;
        tcp.set_read_timeout(Some(config.read_timeout))?;

        let stream: Box<dyn Transport> = if config.use_tls {
            Box::new(tls_stream(&config.server, tcp)?)
        } else {
            Box::new(tcp)
        };
        Ok(Self::new(stream))
    }

    /// Read the greeting, authenticate if configured, switch to reader mode.
    pub fn handshake(&mut self, config: &MailConfig) -> Result<(), MailError> {
        let (code, greeting) = self.status()?;
        if !matches!(code, 200 | 201) {
            return Err(MailError::Rejected {
                command: "greeting".into(),
                response: greeting,
            });
        }
        debug!(greeting = %greeting, "NNTP server greeting");

        if config.username.is_some() {
            self.authenticate(config)?;
        }

        let (code, response) = self.command("MODE READER")?;
        match code {
            200 | 201 => Ok(()),
            480 => Err(MailError::Rejected {
                command: "MODE READER".into(),
                response,
            }),
            // Transit-only servers reject MODE READER; reading may still work.
            _ => {
                debug!(code, "MODE READER not supported");
                Ok(())
            }
        }
    }

    fn authenticate(&mut self, config: &MailConfig) -> Result<(), MailError> {
        let user = config.username.as_deref().unwrap_or_default();
        let (code, response) = self.command(&format!("AUTHINFO USER {user}"))?;
        match code {
            281 => return Ok(()),
            381 => {}
            _ => {
                return Err(MailError::Rejected {
                    command: "AUTHINFO USER".into(),
                    response,
                });
            }
        }

        let password = config
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_string())
            .unwrap_or_default();
        let (code, response) = self.command(&format!("AUTHINFO PASS {password}"))?;
        if code != 281 {
            return Err(MailError::Rejected {
                command: "AUTHINFO PASS".into(),
                response,
            });
        }
        Ok(())
    }

    /// Select a group and return its article range.
    pub fn group(&mut self, alias: &str) -> Result<GroupRange, MailError> {
        let line = self.expect(&format!("GROUP {alias}"), &[211])?;
        parse_group_line(&line)
    }

    /// Overview (subject/from) for `first..=last`, via OVER or XOVER.
    pub fn over(&mut self, first: u64, last: u64) -> Result<Vec<MessageHeader>, MailError> {
        let range = format!("{first}-{last}");
        let (mut code, mut response) = self.command(&format!("OVER {range}"))?;
        if code == 500 {
            debug!("OVER unsupported, falling back to XOVER");
            (code, response) = self.command(&format!("XOVER {range}"))?;
        }
        match code {
            224 => {}
            423 => return Ok(Vec::new()),
            _ => {
                return Err(MailError::Rejected {
                    command: format!("OVER {range}"),
                    response,
                });
            }
        }

        let headers = self
            .read_multiline()?
            .iter()
            .filter_map(|line| match parse_overview_line(line) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable overview line");
                    None
                }
            })
            .collect();
        Ok(headers)
    }

    /// Body lines of one article.
    pub fn body(&mut self, id: u64) -> Result<Vec<String>, MailError> {
        self.expect(&format!("BODY {id}"), &[222])?;
        self.read_multiline()
    }

    pub fn quit(&mut self) -> Result<(), MailError> {
        let (code, response) = self.command("QUIT")?;
        if code != 205 {
            warn!(code, response = %response, "Unexpected QUIT response");
        }
        Ok(())
    }

    // ── Protocol helpers ────────────────────────────────────────────

    fn command(&mut self, cmd: &str) -> Result<(u16, String), MailError> {
        let verb = cmd.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
        debug!(command = %verb, "NNTP >");
        let stream = self.stream.get_mut();
        stream.write_all(cmd.as_bytes())?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        self.status()
    }

    fn expect(&mut self, cmd: &str, ok: &[u16]) -> Result<String, MailError> {
        let (code, response) = self.command(cmd)?;
        if ok.contains(&code) {
            Ok(response)
        } else {
            Err(MailError::Rejected {
                command: cmd.to_string(),
                response,
            })
        }
    }

    fn status(&mut self) -> Result<(u16, String), MailError> {
        let line = self.read_line()?;
        let code = line
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| MailError::Malformed(format!("status line {line:?}")))?;
        Ok((code, line))
    }

    fn read_line(&mut self) -> Result<String, MailError> {
        let mut buf = Vec::new();
        if self.stream.read_until(b'\n', &mut buf)? == 0 {
            return Err(MailError::Closed);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read a dot-terminated block, undoing dot-stuffing.
    fn read_multiline(&mut self) -> Result<Vec<String>, MailError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "." {
                return Ok(lines);
            }
            match line.strip_prefix('.') {
                Some(rest) => lines.push(rest.to_string()),
                None => lines.push(line),
            }
        }
    }
}

fn tls_stream(
    host: &str,
    tcp: TcpStream,
) -> Result<rustls::StreamOwned<rustls::ClientConnection, TcpStream>, MailError> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name =
        ServerName::try_from(host.to_string()).map_err(|e| MailError::Tls(e.to_string()))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailError::Tls(e.to_string()))?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// `211 <count> <first> <last> <group>`
fn parse_group_line(line: &str) -> Result<GroupRange, MailError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let num = |i: usize| {
        parts
            .get(i)
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(|| MailError::Malformed(format!("GROUP response {line:?}")))
    };
    Ok(GroupRange {
        count: num(1)?,
        first: num(2)?,
        last: num(3)?,
    })
}

/// `<number>\t<subject>\t<from>\t<date>\t<message-id>\t...`
fn parse_overview_line(line: &str) -> Result<MessageHeader, MailError> {
    let mut fields = line.split('\t');
    let id = fields
        .next()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .ok_or_else(|| MailError::Malformed(format!("overview line {line:?}")))?;
    let subject = fields.next().unwrap_or_default();
    let from = fields.next().unwrap_or_default();
    Ok(MessageHeader {
        id,
        subject: decode_header(subject),
        from: decode_header(from),
    })
}

// ── Async session ───────────────────────────────────────────────────

/// Connected NNTP session implementing `MailSession`.
pub struct NntpSession {
    conn: Option<NntpConnection>,
}

impl NntpSession {
    /// Connect, select the alias and return its article range.
    pub async fn connect(config: &MailConfig) -> Result<(Self, GroupRange), MailError> {
        let cfg = config.clone();
        let (conn, range) = tokio::task::spawn_blocking(move || {
            let mut conn = NntpConnection::open(&cfg)?;
            conn.handshake(&cfg)?;
            let range = conn.group(&cfg.alias)?;
            Ok::<_, MailError>((conn, range))
        })
        .await
        .map_err(|e| MailError::Task(e.to_string()))??;

        info!(
            server = %config.server,
            alias = %config.alias,
            first = range.first,
            last = range.last,
            "Successfully connected to news server"
        );
        Ok((Self::from_connection(conn), range))
    }

    pub fn from_connection(conn: NntpConnection) -> Self {
        Self { conn: Some(conn) }
    }

    /// Run one blocking exchange off the async runtime.
    async fn exchange<T, F>(&mut self, f: F) -> Result<T, MailError>
    where
        T: Send + 'static,
        F: FnOnce(&mut NntpConnection) -> Result<T, MailError> + Send + 'static,
    {
        let mut conn = self.conn.take().ok_or(MailError::Closed)?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut conn);
            (conn, result)
        })
        .await
        .map_err(|e| MailError::Task(e.to_string()))?;
        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl MailSession for NntpSession {
    async fn fetch_overview(
        &mut self,
        first: u64,
        last: u64,
    ) -> Result<Vec<MessageHeader>, MailError> {
        self.exchange(move |conn| conn.over(first, last)).await
    }

    async fn fetch_body(&mut self, id: u64) -> Result<Vec<String>, MailError> {
        self.exchange(move |conn| conn.body(id)).await
    }

    async fn quit(&mut self) -> Result<(), MailError> {
        let result = self.exchange(|conn| conn.quit()).await;
        self.conn = None;
        result
    }
}
