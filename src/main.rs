//! CLI entry point for `mailpluck`.

use std::path::PathBuf;

use clap::Parser;

use mailpluck::config::{self, RunConfig};
use mailpluck::run::{self, RunSummary};
use mailpluck::session::ImapSession;
use mailpluck::storage::LocalStorage;

#[derive(Parser)]
#[command(
    name = "mailpluck",
    version,
    about = "Download attachments from an IMAP mailbox"
)]
struct Cli {
    /// IMAP server host name
    #[arg(short, long)]
    server: Option<String>,

    /// IMAP port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Account user name
    #[arg(short, long)]
    user: Option<String>,

    /// Account password or app password
    #[arg(long, env = "MAILPLUCK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Mailbox folder to scan
    #[arg(short, long)]
    folder: Option<String>,

    /// Only process messages whose subject matches this text
    #[arg(long)]
    subject: Option<String>,

    /// Directory attachments are saved into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Verbose logging (-v debug, -vv trace); also logs full error details
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    setup_logging(level);

    let cfg = merge_config(config::load_config(), cli);

    if cfg.server.is_empty() {
        anyhow::bail!("no IMAP server given (use --server or the config file)");
    }
    if cfg.user.is_empty() {
        anyhow::bail!("no user given (use --user or the config file)");
    }
    if cfg.password.is_empty() {
        anyhow::bail!(
            "no password given (use --password, MAILPLUCK_PASSWORD or the config file)"
        );
    }

    let storage = LocalStorage;
    let summary = run::run(&cfg, &storage, || ImapSession::connect(&cfg))?;

    print_summary(&cfg, &summary);
    Ok(())
}

/// Layer CLI flags over the file configuration.
fn merge_config(mut cfg: RunConfig, cli: Cli) -> RunConfig {
    if let Some(v) = cli.server {
        cfg.server = v;
    }
    if let Some(v) = cli.port {
        cfg.port = v;
    }
    if let Some(v) = cli.user {
        cfg.user = v;
    }
    if let Some(v) = cli.password {
        cfg.password = v;
    }
    if let Some(v) = cli.folder {
        cfg.folder = v;
    }
    if let Some(v) = cli.subject {
        cfg.subject_filter = Some(v);
    }
    if let Some(v) = cli.output {
        cfg.output_dir = v;
    }
    if let Some(v) = cli.timeout {
        cfg.connect_timeout_secs = v;
    }
    cfg.verbose_errors = cfg.verbose_errors || cli.verbose > 0;
    cfg
}

/// Set up tracing with stderr output and a run log file.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailpluck.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print the run summary as a human-readable table.
fn print_summary(cfg: &RunConfig, summary: &RunSummary) {
    println!();
    println!(
        "  {:<22} {}",
        "Output directory",
        cfg.output_dir.display()
    );
    println!(
        "  {:<22} {}",
        "Messages scanned", summary.messages_scanned
    );
    println!(
        "  {:<22} {}",
        "Without attachments", summary.without_attachments
    );
    println!("  {:<22} {}", "Attachments saved", summary.saved);
    println!("  {:<22} {}", "Attachments failed", summary.failed);
    println!();
}
