//! `mailpluck` — download attachments from an IMAP mailbox.
//!
//! This crate provides the core library: a mail-session abstraction, the
//! message-to-attachment extraction pipeline (filename decoding, collision
//! resolution, payload persistence) and the run orchestrator that drives it
//! while containing per-message failures.

pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod process;
pub mod run;
pub mod session;
pub mod storage;
