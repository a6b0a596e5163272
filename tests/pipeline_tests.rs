//! End-to-end pipeline tests over an in-memory mail session.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use mailpluck::config::RunConfig;
use mailpluck::error::{PluckError, Result};
use mailpluck::run::run;
use mailpluck::session::MailSession;
use mailpluck::storage::LocalStorage;

/// A mail session over canned raw messages. Sequence numbers are 1-based
/// indexes into `messages`, like a real folder.
struct FakeSession {
    messages: Vec<Vec<u8>>,
    fail_select: bool,
    fail_fetch: HashSet<u32>,
    logged_out: Arc<AtomicBool>,
}

impl FakeSession {
    fn new(messages: Vec<Vec<u8>>) -> Self {
        Self {
            messages,
            fail_select: false,
            fail_fetch: HashSet::new(),
            logged_out: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MailSession for FakeSession {
    fn select_folder(&mut self, folder: &str) -> Result<u32> {
        if self.fail_select {
            return Err(PluckError::Folder {
                folder: folder.to_string(),
                reason: "NO [NONEXISTENT] Unknown Mailbox".to_string(),
            });
        }
        Ok(self.messages.len() as u32)
    }

    fn search(&mut self, _criteria: &str) -> Result<Vec<u32>> {
        Ok((1..=self.messages.len() as u32).collect())
    }

    fn fetch(&mut self, id: u32) -> Result<Vec<u8>> {
        if self.fail_fetch.contains(&id) {
            return Err(PluckError::Fetch {
                id,
                reason: "connection reset".to_string(),
            });
        }
        Ok(self.messages[(id - 1) as usize].clone())
    }

    fn logout(&mut self) {
        self.logged_out.store(true, Ordering::SeqCst);
    }
}

fn config_for(dir: &Path) -> RunConfig {
    RunConfig {
        output_dir: dir.to_path_buf(),
        ..RunConfig::default()
    }
}

fn message_with_attachment(filename: &str, payload: &[u8]) -> Vec<u8> {
    let b64 = BASE64.encode(payload);
    format!(
        "From: sender@example.com\r\n\
Subject: with attachment\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"bb\"\r\n\
\r\n\
--bb\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attached\r\n\
--bb\r\n\
Content-Type: application/octet-stream; name=\"{filename}\"\r\n\
Content-Disposition: attachment; filename=\"{filename}\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
{b64}\r\n\
--bb--\r\n"
    )
    .into_bytes()
}

fn plain_message() -> Vec<u8> {
    b"From: sender@example.com\r\nSubject: plain\r\n\r\nno files here\r\n".to_vec()
}

#[test]
fn scenario_colliding_attachments_across_messages() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let cfg = config_for(&out);

    let session = FakeSession::new(vec![
        message_with_attachment("report.pdf", b"first report"),
        plain_message(),
        message_with_attachment("report.pdf", b"second report"),
    ]);

    let summary = run(&cfg, &LocalStorage, || Ok(session)).unwrap();

    assert_eq!(summary.messages_scanned, 3);
    assert_eq!(summary.without_attachments, 1);
    assert_eq!(summary.saved, 2);
    assert_eq!(summary.failed, 0);

    let mut names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["report.pdf", "report_1.pdf"]);
    assert_eq!(std::fs::read(out.join("report.pdf")).unwrap(), b"first report");
    assert_eq!(
        std::fs::read(out.join("report_1.pdf")).unwrap(),
        b"second report"
    );
}

#[test]
fn scenario_no_messages_found() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let mut cfg = config_for(&out);
    cfg.subject_filter = Some("Invoice".to_string());

    let session = FakeSession::new(Vec::new());
    let logged_out = session.logged_out.clone();

    let summary = run(&cfg, &LocalStorage, || Ok(session)).unwrap();

    assert_eq!(summary.messages_scanned, 0);
    assert_eq!(summary.saved, 0);
    assert_eq!(summary.failed, 0);
    assert!(out.is_dir(), "output directory is created up front");
    assert!(logged_out.load(Ordering::SeqCst));
}

#[test]
fn unparseable_message_does_not_stop_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let cfg = config_for(&out);

    let session = FakeSession::new(vec![
        Vec::new(), // unparseable
        message_with_attachment("data.csv", b"a,b,c"),
    ]);

    let summary = run(&cfg, &LocalStorage, || Ok(session)).unwrap();

    assert_eq!(summary.messages_scanned, 2);
    assert_eq!(summary.saved, 1);
    assert!(out.join("data.csv").exists());
}

#[test]
fn fetch_failure_is_counted_and_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let cfg = config_for(&out);

    let mut session = FakeSession::new(vec![
        message_with_attachment("one.txt", b"1"),
        message_with_attachment("two.txt", b"2"),
    ]);
    session.fail_fetch.insert(1);

    let summary = run(&cfg, &LocalStorage, || Ok(session)).unwrap();

    assert_eq!(summary.messages_scanned, 2);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.failed, 1);
    assert!(!out.join("one.txt").exists());
    assert!(out.join("two.txt").exists());
}

#[test]
fn second_run_never_overwrites_prior_files() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let cfg = config_for(&out);

    let messages = vec![
        message_with_attachment("report.pdf", b"run payload"),
        message_with_attachment("report.pdf", b"run payload"),
    ];

    let first = run(&cfg, &LocalStorage, || Ok(FakeSession::new(messages.clone()))).unwrap();
    assert_eq!(first.saved, 2);

    // Age-mark the originals so an overwrite would be detectable
    std::fs::write(out.join("report.pdf"), b"original one").unwrap();
    std::fs::write(out.join("report_1.pdf"), b"original two").unwrap();

    let second = run(&cfg, &LocalStorage, || Ok(FakeSession::new(messages))).unwrap();
    assert_eq!(second.saved, 2);
    assert_eq!(second.failed, 0);

    assert_eq!(std::fs::read(out.join("report.pdf")).unwrap(), b"original one");
    assert_eq!(
        std::fs::read(out.join("report_1.pdf")).unwrap(),
        b"original two"
    );
    assert_eq!(std::fs::read(out.join("report_2.pdf")).unwrap(), b"run payload");
    assert_eq!(std::fs::read(out.join("report_3.pdf")).unwrap(), b"run payload");
}

#[test]
fn folder_selection_failure_is_fatal_but_still_logs_out() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let mut cfg = config_for(&out);
    cfg.folder = "No/Such/Folder".to_string();

    let mut session = FakeSession::new(vec![plain_message()]);
    session.fail_select = true;
    let logged_out = session.logged_out.clone();

    let err = run(&cfg, &LocalStorage, || Ok(session)).unwrap_err();
    assert!(matches!(err, PluckError::Folder { .. }));
    assert!(
        logged_out.load(Ordering::SeqCst),
        "session must be released on the fatal path too"
    );
}

#[test]
fn connect_failure_aborts_before_any_session_work() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let cfg = config_for(&out);

    let err = run(&cfg, &LocalStorage, || -> Result<FakeSession> {
        Err(PluckError::Connect {
            server: "imap.example.com".to_string(),
            reason: "timed out".to_string(),
        })
    })
    .unwrap_err();

    assert!(matches!(err, PluckError::Connect { .. }));
    assert!(out.is_dir(), "directory creation precedes connecting");
}
