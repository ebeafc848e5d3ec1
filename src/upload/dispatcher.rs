use super::descriptor::{destination_file_name, LocalPathResolver, UploadDescriptor};
use super::submission::{FileRefs, FormDefinition, Submission};
use super::UploadError;
use crate::credentials::CredentialStore;
use crate::dropbox::{ClientFactory, StorageClient};
use crate::notify::{Notice, Notifier};
use crate::template::{self, ANONYMOUS};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NOTICE_SUBJECT: &str = "Dropbox Uploader Error";

/// Rewrites an expanded destination directory. Receives the path and the
/// submission id.
pub type PathFilter = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Result of one dispatch.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub submission: Submission,
    /// Remote paths uploaded successfully
    pub uploaded: Vec<String>,
    /// Every error encountered, including swallowed ones
    pub errors: Vec<UploadError>,
}

impl DispatchOutcome {
    fn unchanged(submission: Submission) -> Self {
        Self {
            submission,
            uploaded: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Uploads the flagged files of a submission.
///
/// Holds no client between calls: each dispatch reads the current credentials
/// and builds its own [`StorageClient`].
#[derive(Clone)]
pub struct UploadDispatcher {
    store: CredentialStore,
    clients: Arc<dyn ClientFactory>,
    notifier: Arc<dyn Notifier>,
    paths: LocalPathResolver,
    path_filter: Option<PathFilter>,
    debug: bool,
}

impl UploadDispatcher {
    pub fn new(
        store: CredentialStore,
        clients: Arc<dyn ClientFactory>,
        notifier: Arc<dyn Notifier>,
        paths: LocalPathResolver,
    ) -> Self {
        Self {
            store,
            clients,
            notifier,
            paths,
            path_filter: None,
            debug: false,
        }
    }

    /// Log swallowed share/cleanup faults at `warn` instead of `debug`.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_path_filter(mut self, filter: PathFilter) -> Self {
        self.path_filter = Some(filter);
        self
    }

    /// Form-submission hook: always returns the (possibly rewritten) submission.
    pub async fn on_submission(
        &self,
        submission: Submission,
        form: &FormDefinition,
        username: Option<&str>,
    ) -> Submission {
        self.dispatch(submission, form, username, chrono::Local::now().naive_local())
            .await
            .submission
    }

    pub async fn dispatch(
        &self,
        submission: Submission,
        form: &FormDefinition,
        username: Option<&str>,
        now: NaiveDateTime,
    ) -> DispatchOutcome {
        let flagged: Vec<_> = form
            .fields
            .iter()
            .filter(|field| field.upload_to_dropbox && field.id != 0)
            .filter_map(|field| {
                submission
                    .value(field.id)
                    .filter(|value| !value.is_empty())
                    .map(|value| (field, FileRefs::parse(value)))
            })
            .collect();

        if flagged.is_empty() {
            return DispatchOutcome::unchanged(submission);
        }

        let settings = match self.store.upload_settings() {
            Ok(settings) => settings,
            Err(e) => return self.abort(submission, UploadError::Config(format!("{:#}", e))),
        };

        let username = username.filter(|u| !u.is_empty()).unwrap_or(ANONYMOUS);
        let mut descriptors = Vec::new();
        for (field, refs) in &flagged {
            let template = field.override_path().unwrap_or(settings.directory.as_str());
            let destination_dir = self.destination_dir(template, username, &submission.id, now);

            for reference in refs.references() {
                descriptors.push(UploadDescriptor {
                    field_id: field.id,
                    destination_dir: destination_dir.clone(),
                    file_name: destination_file_name(reference, field.id),
                    source_url: reference.clone(),
                    local_path: self.paths.resolve(reference),
                });
            }
        }

        let client = match self.connect() {
            Ok(client) => client,
            Err(e) => return self.abort(submission, e),
        };

        let mut outcome = DispatchOutcome::unchanged(submission);
        for descriptor in &descriptors {
            self.process(
                client.as_ref(),
                descriptor,
                settings.remove_after_upload,
                &mut outcome,
            )
            .await;
        }

        self.report(&outcome.errors).await;

        info!(
            submission_id = %outcome.submission.id,
            files = descriptors.len(),
            uploaded = outcome.uploaded.len(),
            "Dispatch complete"
        );
        outcome
    }

    fn destination_dir(
        &self,
        template: &str,
        username: &str,
        submission_id: &str,
        now: NaiveDateTime,
    ) -> String {
        let expanded = template::expand(template, username, submission_id, now);
        match &self.path_filter {
            Some(filter) => filter(&expanded, submission_id),
            None => expanded,
        }
    }

    /// Reads credentials and token; builds a client only if both are present.
    fn connect(&self) -> Result<Box<dyn StorageClient>, UploadError> {
        let credentials = self
            .store
            .app_credentials()
            .map_err(|e| UploadError::Config(format!("{:#}", e)))?
            .ok_or_else(|| UploadError::Config("app key or secret missing".to_string()))?;
        let token = self
            .store
            .access_token()
            .map_err(|e| UploadError::Config(format!("{:#}", e)))?
            .ok_or_else(|| UploadError::Config("account not authorized".to_string()))?;

        self.clients
            .connect(&credentials, &token)
            .map_err(|e| UploadError::Config(format!("{:#}", e)))
    }

    async fn process(
        &self,
        client: &dyn StorageClient,
        descriptor: &UploadDescriptor,
        remove_after_upload: bool,
        outcome: &mut DispatchOutcome,
    ) {
        let remote_path = descriptor.remote_path();

        if let Err(e) = client.upload(&remote_path, &descriptor.local_path).await {
            let err = UploadError::Upload {
                file_name: descriptor.file_name.clone(),
                source_url: descriptor.source_url.clone(),
                reason: format!("{:#}", e),
            };
            warn!(field_id = descriptor.field_id, error = %err, "Upload failed");
            outcome.errors.push(err);
            return;
        }

        debug!(field_id = descriptor.field_id, remote_path = %remote_path, "Uploaded");
        outcome.uploaded.push(remote_path.clone());

        if !remove_after_upload {
            return;
        }

        let link = match client.share(&remote_path).await {
            Ok(link) => link,
            Err(e) => {
                self.swallow(
                    outcome,
                    UploadError::Share {
                        remote_path,
                        reason: format!("{:#}", e),
                    },
                );
                return;
            }
        };

        if let Some(value) = outcome.submission.values.get_mut(&descriptor.field_id) {
            let mut refs = FileRefs::parse(value.as_str());
            refs.replace(&descriptor.source_url, &link.url);
            *value = refs.to_stored_value();
        }

        if let Err(e) = tokio::fs::remove_file(&descriptor.local_path).await {
            self.swallow(
                outcome,
                UploadError::LocalIo {
                    path: descriptor.local_path.clone(),
                    reason: e.to_string(),
                },
            );
        }
    }

    fn swallow(&self, outcome: &mut DispatchOutcome, err: UploadError) {
        if self.debug {
            warn!(error = %err, "Ignoring post-upload failure");
        } else {
            debug!(error = %err, "Ignoring post-upload failure");
        }
        outcome.errors.push(err);
    }

    /// One notification for all failed uploads. Delivery failures are logged only.
    async fn report(&self, errors: &[UploadError]) {
        let failures: Vec<String> = errors
            .iter()
            .filter(|e| matches!(e, UploadError::Upload { .. }))
            .map(ToString::to_string)
            .collect();

        if failures.is_empty() {
            return;
        }

        let notice = Notice {
            subject: NOTICE_SUBJECT.to_string(),
            body: failures.join("\n"),
        };
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(error = %e, "Failed to send upload failure notification");
        }
    }

    fn abort(&self, submission: Submission, err: UploadError) -> DispatchOutcome {
        warn!(submission_id = %submission.id, error = %err, "Skipping Dropbox upload");
        DispatchOutcome {
            submission,
            uploaded: Vec::new(),
            errors: vec![err],
        }
    }
}
