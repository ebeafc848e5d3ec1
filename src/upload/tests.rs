//! Dispatcher tests against an in-process fake storage client.

use super::*;
use crate::credentials::{
    AppCredentials, CredentialStore, MemoryOptionStore, OAuthToken, UploadSettings,
};
use crate::dropbox::{AccountInfo, ClientFactory, FileMetadata, ShareLink, StorageClient};
use crate::notify::{Notice, Notifier};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SITE: &str = "https://example.com";

#[derive(Default)]
struct Recorder {
    connects: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct FakeClient {
    recorder: Arc<Recorder>,
    fail_uploads: Vec<String>,
    fail_share: bool,
}

#[async_trait]
impl StorageClient for FakeClient {
    async fn upload(&self, remote_path: &str, local_path: &Path) -> Result<FileMetadata> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .push(format!("upload {}", remote_path));

        if self.fail_uploads.iter().any(|f| remote_path.ends_with(f.as_str())) {
            return Err(anyhow!("Dropbox API error: 500 Internal Server Error"));
        }
        if !local_path.exists() {
            return Err(anyhow!("Failed to read local file {}", local_path.display()));
        }
        Ok(FileMetadata {
            path: format!("/{}", remote_path),
            bytes: None,
            rev: None,
        })
    }

    async fn share(&self, remote_path: &str) -> Result<ShareLink> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .push(format!("share {}", remote_path));

        if self.fail_share {
            return Err(anyhow!("Dropbox rate limit exceeded"));
        }
        Ok(ShareLink {
            url: format!("https://db.tt/{}", remote_path),
            expires: None,
        })
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        Ok(serde_json::from_str(r#"{"uid": 1}"#)?)
    }
}

#[derive(Default)]
struct FakeFactory {
    recorder: Arc<Recorder>,
    fail_uploads: Vec<String>,
    fail_share: bool,
}

impl ClientFactory for FakeFactory {
    fn connect(&self, _: &AppCredentials, _: &OAuthToken) -> Result<Box<dyn StorageClient>> {
        self.recorder.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClient {
            recorder: self.recorder.clone(),
            fail_uploads: self.fail_uploads.clone(),
            fail_share: self.fail_share,
        }))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &Notice) -> Result<()> {
        self.notices.lock().unwrap().push(notice.clone());
        if self.fail {
            return Err(anyhow!("relay down"));
        }
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    store: CredentialStore,
    recorder: Arc<Recorder>,
    notifier: Arc<RecordingNotifier>,
    dispatcher: UploadDispatcher,
}

impl Harness {
    fn new(factory: FakeFactory, notifier: RecordingNotifier) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(Arc::new(MemoryOptionStore::new()));
        let recorder = factory.recorder.clone();
        let notifier = Arc::new(notifier);

        let dispatcher = UploadDispatcher::new(
            store.clone(),
            Arc::new(factory),
            notifier.clone(),
            LocalPathResolver::new(SITE, dir.path()),
        );

        Self {
            dir,
            store,
            recorder,
            notifier,
            dispatcher,
        }
    }

    fn authorized(self, remove_after_upload: bool) -> Self {
        self.store.save_app_credentials("app-key", "app-secret").unwrap();
        self.store
            .store_access_token(&OAuthToken {
                key: "acc-key".to_string(),
                secret: "acc-secret".to_string(),
            })
            .unwrap();
        self.store
            .save_upload_settings(&UploadSettings {
                directory: "Forms/#login#/#uniqueid#/".to_string(),
                remove_after_upload,
            })
            .unwrap();
        self
    }

    /// Creates `uploads/<name>` under the fake site root; returns its URL.
    fn local_file(&self, name: &str) -> String {
        let uploads = self.dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join(name), b"content").unwrap();
        format!("{}/uploads/{}", SITE, name)
    }

    fn local_exists(&self, name: &str) -> bool {
        self.dir.path().join("uploads").join(name).exists()
    }

    fn notices(&self) -> Vec<Notice> {
        self.notifier.notices.lock().unwrap().clone()
    }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap()
}

fn flagged_form(field_id: FieldId) -> FormDefinition {
    FormDefinition {
        id: Some(1),
        fields: vec![
            FieldDefinition {
                id: 1,
                upload_to_dropbox: false,
                dropbox_path: None,
            },
            FieldDefinition {
                id: field_id,
                upload_to_dropbox: true,
                dropbox_path: None,
            },
        ],
    }
}

fn submission(values: &[(FieldId, &str)]) -> Submission {
    Submission {
        id: "42".to_string(),
        values: values.iter().map(|(k, v)| (*k, v.to_string())).collect(),
    }
}

#[tokio::test]
async fn test_no_flagged_fields_is_noop() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(true);
    let input = submission(&[(1, "https://example.com/uploads/cv.pdf")]);

    let form = FormDefinition {
        id: Some(1),
        fields: vec![FieldDefinition {
            id: 1,
            upload_to_dropbox: false,
            dropbox_path: None,
        }],
    };
    let outcome = h.dispatcher.dispatch(input.clone(), &form, Some("alice"), now()).await;

    assert_eq!(outcome.submission, input);
    assert!(outcome.errors.is_empty());
    assert_eq!(h.recorder.connects.load(Ordering::SeqCst), 0);
    assert!(h.recorder.calls().is_empty());
}

#[tokio::test]
async fn test_empty_flagged_value_is_skipped() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(true);
    let input = submission(&[(3, "")]);

    let outcome = h.dispatcher.dispatch(input.clone(), &flagged_form(3), None, now()).await;

    assert_eq!(outcome.submission, input);
    assert_eq!(h.recorder.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_access_token_makes_no_calls() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default());
    h.store.save_app_credentials("app-key", "app-secret").unwrap();
    let url = h.local_file("cv.pdf");
    let input = submission(&[(3, url.as_str())]);

    let outcome = h.dispatcher.dispatch(input.clone(), &flagged_form(3), None, now()).await;

    assert_eq!(outcome.submission, input);
    assert!(matches!(outcome.errors.as_slice(), [UploadError::Config(_)]));
    assert_eq!(h.recorder.connects.load(Ordering::SeqCst), 0);
    assert!(h.recorder.calls().is_empty());
    assert!(h.notices().is_empty());
    assert!(h.local_exists("cv.pdf"));
}

#[tokio::test]
async fn test_missing_app_secret_makes_no_calls() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(true);
    h.store.save_app_credentials("app-key", "").unwrap();
    let url = h.local_file("cv.pdf");

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(3, url.as_str())]), &flagged_form(3), None, now())
        .await;

    assert!(matches!(outcome.errors.as_slice(), [UploadError::Config(_)]));
    assert_eq!(h.recorder.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_file_replaced_by_share_link() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(true);
    let url = h.local_file("cv.pdf");

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(3, url.as_str())]), &flagged_form(3), Some("alice"), now())
        .await;

    assert_eq!(
        outcome.submission.value(3),
        Some("https://db.tt/Forms/alice/42/cv.pdf")
    );
    assert_eq!(outcome.uploaded, vec!["Forms/alice/42/cv.pdf".to_string()]);
    assert!(outcome.errors.is_empty());
    assert!(!h.local_exists("cv.pdf"));
    assert_eq!(
        h.recorder.calls(),
        vec![
            "upload Forms/alice/42/cv.pdf".to_string(),
            "share Forms/alice/42/cv.pdf".to_string(),
        ]
    );
    assert!(h.notices().is_empty());
}

#[tokio::test]
async fn test_without_remove_flag_file_is_kept() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(false);
    let url = h.local_file("cv.pdf");
    let input = submission(&[(3, url.as_str())]);

    let outcome = h.dispatcher.dispatch(input.clone(), &flagged_form(3), Some("alice"), now()).await;

    assert_eq!(outcome.submission, input);
    assert_eq!(outcome.uploaded.len(), 1);
    assert!(h.local_exists("cv.pdf"));
    assert_eq!(h.recorder.calls(), vec!["upload Forms/alice/42/cv.pdf".to_string()]);
}

#[tokio::test]
async fn test_failed_upload_in_batch_is_isolated_and_reported_once() {
    let factory = FakeFactory {
        fail_uploads: vec!["b.png".to_string()],
        ..Default::default()
    };
    let h = Harness::new(factory, RecordingNotifier::default()).authorized(true);
    let a = h.local_file("a.png");
    let b = h.local_file("b.png");
    let c = h.local_file("c.png");
    let value = serde_json::to_string(&[&a, &b, &c]).unwrap();

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(3, value.as_str())]), &flagged_form(3), None, now())
        .await;

    let stored: Vec<String> = serde_json::from_str(outcome.submission.value(3).unwrap()).unwrap();
    assert_eq!(
        stored,
        vec![
            "https://db.tt/Forms/anonymous/42/a.png".to_string(),
            b.clone(),
            "https://db.tt/Forms/anonymous/42/c.png".to_string(),
        ]
    );
    assert!(!h.local_exists("a.png"));
    assert!(h.local_exists("b.png"));
    assert!(!h.local_exists("c.png"));

    let notices = h.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].subject, NOTICE_SUBJECT);
    assert!(notices[0].body.contains("b.png"));
    assert!(notices[0].body.contains(&b));
    assert!(!notices[0].body.contains("a.png"));
}

#[tokio::test]
async fn test_share_failure_is_swallowed() {
    let factory = FakeFactory {
        fail_share: true,
        ..Default::default()
    };
    let h = Harness::new(factory, RecordingNotifier::default()).authorized(true);
    let url = h.local_file("cv.pdf");
    let input = submission(&[(3, url.as_str())]);

    let outcome = h
        .dispatcher
        .clone()
        .with_debug(true)
        .dispatch(input.clone(), &flagged_form(3), None, now())
        .await;

    assert_eq!(outcome.submission, input);
    assert_eq!(outcome.uploaded.len(), 1);
    assert!(matches!(outcome.errors.as_slice(), [UploadError::Share { .. }]));
    assert!(h.local_exists("cv.pdf"));
    assert!(h.notices().is_empty());
}

#[tokio::test]
async fn test_local_delete_failure_is_swallowed() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(true);
    // A directory uploads fine in the fake client but cannot be removed as a file.
    std::fs::create_dir_all(h.dir.path().join("uploads").join("scans.d")).unwrap();
    let url = format!("{}/uploads/scans.d", SITE);

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(3, url.as_str())]), &flagged_form(3), Some("alice"), now())
        .await;

    assert_eq!(
        outcome.submission.value(3),
        Some("https://db.tt/Forms/alice/42/scans.d")
    );
    assert!(matches!(outcome.errors.as_slice(), [UploadError::LocalIo { .. }]));
    assert!(h.notices().is_empty());
}

#[tokio::test]
async fn test_field_override_path_and_macros() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(false);
    let url = h.local_file("cv.pdf");
    let form = FormDefinition {
        id: Some(1),
        fields: vec![FieldDefinition {
            id: 3,
            upload_to_dropbox: true,
            dropbox_path: Some("Special/#date#/#time#/".to_string()),
        }],
    };

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(3, url.as_str())]), &form, Some("alice"), now())
        .await;

    assert_eq!(
        outcome.uploaded,
        vec!["Special/2024-05-01/12-30-00/cv.pdf".to_string()]
    );
}

#[tokio::test]
async fn test_path_filter_rewrites_directory() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(false);
    let url = h.local_file("cv.pdf");
    let dispatcher = h
        .dispatcher
        .clone()
        .with_path_filter(Arc::new(|path: &str, id: &str| format!("tenant-a/{}{}-", path, id)));

    let outcome = dispatcher
        .dispatch(submission(&[(3, url.as_str())]), &flagged_form(3), Some("bob"), now())
        .await;

    assert_eq!(
        outcome.uploaded,
        vec!["tenant-a/Forms/bob/42/42-cv.pdf".to_string()]
    );
}

#[tokio::test]
async fn test_stripped_file_name_gets_hash_prefix() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(false);
    let url = h.local_file("履歴書.pdf");

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(7, url.as_str())]), &flagged_form(7), Some("alice"), now())
        .await;

    assert_eq!(
        outcome.uploaded,
        vec!["Forms/alice/42/8f14e45fceea167a5a36dedd4bea2543.pdf".to_string()]
    );
}

#[tokio::test]
async fn test_accented_file_name_is_stripped_before_upload() {
    let h = Harness::new(FakeFactory::default(), RecordingNotifier::default()).authorized(false);
    let resume = h.local_file("résumé.pdf");
    let accent_only = h.local_file("é.pdf");
    let value = serde_json::to_string(&[&resume, &accent_only]).unwrap();

    let outcome = h
        .dispatcher
        .dispatch(submission(&[(7, value.as_str())]), &flagged_form(7), Some("alice"), now())
        .await;

    assert_eq!(
        outcome.uploaded,
        vec![
            "Forms/alice/42/rsum.pdf".to_string(),
            "Forms/alice/42/8f14e45fceea167a5a36dedd4bea2543.pdf".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_notifier_failure_is_not_propagated() {
    let factory = FakeFactory {
        fail_uploads: vec!["cv.pdf".to_string()],
        ..Default::default()
    };
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let h = Harness::new(factory, notifier).authorized(true);
    let url = h.local_file("cv.pdf");
    let input = submission(&[(3, url.as_str())]);

    let result = h.dispatcher.on_submission(input.clone(), &flagged_form(3), None).await;

    assert_eq!(result, input);
    assert_eq!(h.notices().len(), 1);
}
