//! Mail session abstraction and its IMAP implementation.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use imap::{ClientBuilder, ConnectionMode};

use crate::config::RunConfig;
use crate::error::{PluckError, Result};

/// The mailbox operations the pipeline consumes. Implemented over a live
/// IMAP connection in production and over in-memory messages in tests.
pub trait MailSession {
    /// Select a folder; returns its message count.
    fn select_folder(&mut self, folder: &str) -> Result<u32>;

    /// Search with an IMAP criteria string; returns message sequence
    /// numbers in ascending order.
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>>;

    /// Download one message's raw RFC 822 bytes.
    fn fetch(&mut self, id: u32) -> Result<Vec<u8>>;

    /// End the session. Best-effort; errors are logged, not returned.
    fn logout(&mut self);
}

/// Build the IMAP search criteria for an optional subject filter.
pub fn search_criteria(subject_filter: Option<&str>) -> String {
    match subject_filter {
        Some(s) if !s.is_empty() => format!("(SUBJECT \"{}\")", escape_quoted(s)),
        _ => "ALL".to_string(),
    }
}

/// Escape backslashes and double quotes for an IMAP quoted string.
fn escape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// [`MailSession`] over a TLS IMAP connection.
pub struct ImapSession {
    session: imap::Session<imap::Connection>,
}

impl ImapSession {
    /// Connect and authenticate.
    ///
    /// The endpoint is first probed with a bounded TCP connect so an
    /// unreachable host fails within `connect_timeout_secs` instead of
    /// hanging; the IMAP client then establishes its own connection.
    /// Connection and authentication failures are both fatal for a run.
    pub fn connect(cfg: &RunConfig) -> Result<Self> {
        probe_endpoint(
            &cfg.server,
            cfg.port,
            Duration::from_secs(cfg.connect_timeout_secs),
        )?;

        tracing::info!(server = %cfg.server, port = cfg.port, "Connecting");
        let client = ClientBuilder::new(cfg.server.as_str(), cfg.port)
            .tls_kind(imap::TlsKind::Native)
            .mode(ConnectionMode::AutoTls)
            .connect()
            .map_err(|e| PluckError::Connect {
                server: cfg.server.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!("Connection established");

        tracing::info!(user = %cfg.user, "Authenticating");
        let session = client
            .login(&cfg.user, &cfg.password)
            .map_err(|e| auth_error(&cfg.user, e.0))?;
        tracing::info!("Authentication succeeded");

        Ok(Self { session })
    }
}

fn auth_error(user: &str, e: imap::Error) -> PluckError {
    let reason = e.to_string();
    if reason.to_ascii_lowercase().contains("invalid credentials") {
        tracing::error!("Login rejected: check the password or app password");
    }
    PluckError::Auth {
        user: user.to_string(),
        reason,
    }
}

/// Resolve the endpoint and attempt a bounded TCP connect to it.
fn probe_endpoint(server: &str, port: u16, timeout: Duration) -> Result<()> {
    let connect_err = |reason: String| PluckError::Connect {
        server: server.to_string(),
        reason,
    };

    let addrs = (server, port)
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_probe) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    Err(connect_err(match last_err {
        Some(e) => e.to_string(),
        None => "host name resolved to no addresses".to_string(),
    }))
}

impl MailSession for ImapSession {
    fn select_folder(&mut self, folder: &str) -> Result<u32> {
        let mailbox = self
            .session
            .select(folder)
            .map_err(|e| PluckError::Folder {
                folder: folder.to_string(),
                reason: e.to_string(),
            })?;
        Ok(mailbox.exists)
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let ids = self
            .session
            .search(criteria)
            .map_err(|e| PluckError::Search {
                reason: e.to_string(),
            })?;
        // The imap crate hands back a set; restore the server's
        // sequence-number order.
        let mut ids: Vec<u32> = ids.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
        let fetch_err = |reason: String| PluckError::Fetch { id, reason };

        let fetches = self
            .session
            .fetch(id.to_string(), "BODY[]")
            .map_err(|e| fetch_err(e.to_string()))?;
        let message = fetches
            .iter()
            .next()
            .ok_or_else(|| fetch_err("empty fetch response".to_string()))?;
        let body = message
            .body()
            .ok_or_else(|| fetch_err("fetch response without a body".to_string()))?;
        Ok(body.to_vec())
    }

    fn logout(&mut self) {
        match self.session.logout() {
            Ok(()) => tracing::info!("Disconnected"),
            Err(e) => tracing::debug!(error = %e, "Logout failed"),
        }
    }
}
