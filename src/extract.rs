//! Attachment extraction from a parsed mail message.

use std::path::Path;

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};

use crate::decode::decode_filename;
use crate::error::Result;
use crate::storage::{resolve_collision, Storage};

/// One attachment ready to persist: a collision-free filename and the
/// transfer-decoded payload bytes.
pub struct ExtractedAttachment {
    pub filename: String,
    pub payload: Vec<u8>,
}

/// Iterate the attachments of `msg`, resolving each filename against the
/// live contents of `dir`.
///
/// The iterator is lazy on purpose: collision resolution happens at yield
/// time, so an attachment sees the files its predecessors in the same
/// message have already written. Collecting the sequence up front would
/// hand two same-named attachments the same resolved name.
pub fn attachments<'a, 'x>(
    msg: &'a Message<'x>,
    dir: &'a Path,
    storage: &'a dyn Storage,
    fallback: &'static encoding_rs::Encoding,
) -> Attachments<'a, 'x> {
    Attachments {
        stack: vec![msg.parts.iter()],
        dir,
        storage,
        fallback,
    }
}

/// Lazy, single-pass iterator over a message's attachment parts.
pub struct Attachments<'a, 'x> {
    stack: Vec<std::slice::Iter<'a, MessagePart<'x>>>,
    dir: &'a Path,
    storage: &'a dyn Storage,
    fallback: &'static encoding_rs::Encoding,
}

impl Iterator for Attachments<'_, '_> {
    type Item = Result<ExtractedAttachment>;

    fn next(&mut self) -> Option<Self::Item> {
        // Walks every MIME part exactly once, descending into attached
        // messages (message/rfc822) whose parts live in their own tree.
        // Bodies, inline images and multipart containers all fail the
        // disposition or filename test and are skipped.
        loop {
            let top = self.stack.last_mut()?;
            let Some(part) = top.next() else {
                self.stack.pop();
                continue;
            };

            if let PartType::Message(inner) = &part.body {
                self.stack.push(inner.parts.iter());
            }

            let Some(disposition) = part.content_disposition() else {
                continue;
            };
            if disposition.ctype() != "attachment" {
                continue;
            }
            let Some(raw_name) = part.attachment_name() else {
                continue;
            };

            let desired = decode_filename(raw_name, self.fallback);
            tracing::info!(filename = %desired, "Attachment found");

            return Some(
                resolve_collision(self.storage, self.dir, &desired).map(|filename| {
                    ExtractedAttachment {
                        filename,
                        payload: part.contents().to_vec(),
                    }
                }),
            );
        }
    }
}
