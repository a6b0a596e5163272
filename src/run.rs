//! The run orchestrator: drives a whole mailbox scan and isolates
//! per-message failures.

use crate::config::RunConfig;
use crate::error::{PluckError, Result};
use crate::process::process_message;
use crate::session::{search_criteria, MailSession};
use crate::storage::Storage;

/// Totals for one run, built incrementally while iterating messages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages the loop visited (fetched or attempted to fetch).
    pub messages_scanned: usize,
    /// Messages that contained no attachment parts at all.
    pub without_attachments: usize,
    /// Attachments written to the output directory.
    pub saved: usize,
    /// Fetch failures plus attachments that could not be named or written.
    pub failed: usize,
}

/// Run the full pipeline: ensure the output directory, connect, select the
/// folder, search, then process every matching message.
///
/// Failures before the message loop (directory creation, connect,
/// authenticate, select, search) abort the run. Once iterating, a single
/// message's failure only moves the loop to the next id. The session is
/// logged out on every exit path after `connect` succeeds.
pub fn run<S, F>(cfg: &RunConfig, storage: &dyn Storage, connect: F) -> Result<RunSummary>
where
    S: MailSession,
    F: FnOnce() -> Result<S>,
{
    storage.ensure_dir(&cfg.output_dir)?;
    tracing::info!(dir = %cfg.output_dir.display(), "Output directory ready");

    let mut session = connect()?;
    let result = drive(cfg, &mut session, storage);
    session.logout();
    result
}

fn drive<S: MailSession>(
    cfg: &RunConfig,
    session: &mut S,
    storage: &dyn Storage,
) -> Result<RunSummary> {
    let count = session.select_folder(&cfg.folder)?;
    tracing::info!(folder = %cfg.folder, messages = count, "Folder selected");

    let criteria = search_criteria(cfg.subject_filter.as_deref());
    tracing::debug!(criteria = %criteria, "Searching");
    let ids = session.search(&criteria)?;

    let mut summary = RunSummary::default();
    if ids.is_empty() {
        tracing::warn!("No messages found");
        return Ok(summary);
    }
    tracing::info!(count = ids.len(), "Messages found");

    let fallback = cfg.fallback_encoding();
    let total = ids.len();

    for (i, &id) in ids.iter().enumerate() {
        let index = i + 1;
        tracing::info!(index, total, id, "Processing message");
        summary.messages_scanned += 1;

        let raw = match session.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                log_message_error(cfg, index, &e);
                summary.failed += 1;
                continue;
            }
        };

        match process_message(&raw, &cfg.output_dir, storage, fallback, index) {
            Ok(outcome) => {
                if outcome.saved == 0 && outcome.failed == 0 {
                    summary.without_attachments += 1;
                }
                summary.saved += outcome.saved;
                summary.failed += outcome.failed;
            }
            Err(e) => log_message_error(cfg, index, &e),
        }
    }

    Ok(summary)
}

/// Log a per-message error; the verbose flag switches to the full debug
/// representation, mirroring a stack-trace-on-demand log style.
fn log_message_error(cfg: &RunConfig, index: usize, e: &PluckError) {
    if cfg.verbose_errors {
        tracing::error!(index, error = ?e, "Message processing failed");
    } else {
        tracing::error!(index, error = %e, "Message processing failed");
    }
}
