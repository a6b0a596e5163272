//! Per-message processing: parse raw bytes, extract attachments, persist.

use std::path::Path;

use humansize::{format_size, BINARY};
use mail_parser::MessageParser;

use crate::error::{PluckError, Result};
use crate::extract::attachments;
use crate::storage::Storage;

/// What one message produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Attachments written to the output directory.
    pub saved: usize,
    /// Attachments that could not be named or written.
    pub failed: usize,
}

/// Process one raw message: parse, extract every attachment, write each to
/// `dir`.
///
/// A parse failure is an error for this message alone (the caller keeps the
/// run going). A single attachment's failure is logged, counted and does
/// not stop its siblings. Zero attachments is informational, not an error.
pub fn process_message(
    raw: &[u8],
    dir: &Path,
    storage: &dyn Storage,
    fallback: &'static encoding_rs::Encoding,
    index: usize,
) -> Result<ProcessOutcome> {
    let msg = MessageParser::default()
        .parse(raw)
        .ok_or(PluckError::Parse { index })?;

    let sender = msg
        .from()
        .and_then(|a| a.first())
        .and_then(|a| a.address.as_deref())
        .unwrap_or("<unknown>");
    tracing::debug!(
        index,
        from = sender,
        subject = msg.subject().unwrap_or(""),
        "Parsed message"
    );

    let mut outcome = ProcessOutcome::default();

    for item in attachments(&msg, dir, storage, fallback) {
        match item {
            Ok(att) => {
                let path = dir.join(&att.filename);
                match storage.write_bytes(&path, &att.payload) {
                    Ok(()) => {
                        tracing::info!(
                            path = %path.display(),
                            size = %format_size(att.payload.len() as u64, BINARY),
                            "Saved attachment"
                        );
                        outcome.saved += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            filename = %att.filename,
                            error = %e,
                            "Failed to save attachment"
                        );
                        outcome.failed += 1;
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve attachment filename");
                outcome.failed += 1;
            }
        }
    }

    if outcome.saved == 0 && outcome.failed == 0 {
        tracing::info!(index, "No attachments in this message");
    }

    Ok(outcome)
}
