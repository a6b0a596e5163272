//! Run configuration.
//!
//! All pipeline entry points take a [`RunConfig`] explicitly; there is no
//! global state and no interactive prompting. Values come from a TOML file
//! at:
//! 1. `$MAILPLUCK_CONFIG` (environment variable)
//! 2. `~/.config/mailpluck/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailpluck\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! with CLI flags layered on top by the binary.

use std::path::PathBuf;

use serde::Deserialize;

/// Everything one run needs: server coordinates, credentials, folder,
/// optional subject filter and the output directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// IMAP server host name.
    pub server: String,
    /// IMAP port (993 = implicit TLS).
    pub port: u16,
    /// Account user name.
    pub user: String,
    /// Account password or app password.
    pub password: String,
    /// Mailbox folder to scan.
    pub folder: String,
    /// Only process messages whose subject contains this text.
    pub subject_filter: Option<String>,
    /// Directory attachments are saved into.
    pub output_dir: PathBuf,
    /// Charset label used when an encoded-word declares none or an unknown
    /// one. Policy, not a standard; see `decode`.
    pub fallback_charset: String,
    /// Timeout for the initial connection attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Log full error details (source chains) with per-message errors.
    pub verbose_errors: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 993,
            user: String::new(),
            password: String::new(),
            folder: "INBOX".to_string(),
            subject_filter: None,
            output_dir: PathBuf::from("attachments"),
            fallback_charset: "utf-8".to_string(),
            connect_timeout_secs: 10,
            verbose_errors: false,
        }
    }
}

impl RunConfig {
    /// Resolve the configured fallback charset label to an encoding.
    ///
    /// An unrecognized label itself falls back to UTF-8, with a warning.
    pub fn fallback_encoding(&self) -> &'static encoding_rs::Encoding {
        match encoding_rs::Encoding::for_label(self.fallback_charset.as_bytes()) {
            Some(enc) => enc,
            None => {
                tracing::warn!(
                    charset = %self.fallback_charset,
                    "Unknown fallback charset in config, using UTF-8"
                );
                encoding_rs::UTF_8
            }
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> RunConfig {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<RunConfig>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    RunConfig::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILPLUCK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailpluck").join("config.toml"))
}

/// Return the cache directory used for the run log.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailpluck")
}
