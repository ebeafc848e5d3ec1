//! Per-submission upload of flagged file fields to Dropbox.
//!
//! # Pipeline
//!
//! ```text
//! Submission + FormDefinition
//!          ↓  select flagged, non-empty fields
//!          ↓  parse value → FileRefs::{Single, Multiple}
//!          ↓  file name + macro-expanded directory + local path
//!   Vec<UploadDescriptor>
//!          ↓  credentials / access token check (no network if missing)
//!          ↓  for each: upload → [share → rewrite field → delete local]
//!          ↓  aggregated notification for failed uploads
//!   Submission'
//! ```

mod descriptor;
mod dispatcher;
mod submission;

#[cfg(test)]
mod tests;

pub use descriptor::{destination_file_name, LocalPathResolver, UploadDescriptor};
pub use dispatcher::{DispatchOutcome, PathFilter, UploadDispatcher, NOTICE_SUBJECT};
pub use submission::{FieldDefinition, FieldId, FileRefs, FormDefinition, Submission};

use std::path::PathBuf;

/// Upload pipeline errors.
///
/// Only `Config` stops a batch; `Upload` is reported to the admin; `Share` and
/// `LocalIo` are swallowed after logging.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadError {
    /// App credentials or access token missing/unreadable
    Config(String),
    /// File could not be uploaded
    Upload {
        file_name: String,
        source_url: String,
        reason: String,
    },
    /// Share link could not be created
    Share { remote_path: String, reason: String },
    /// Local file could not be removed
    LocalIo { path: PathBuf, reason: String },
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::Config(msg) => write!(f, "Dropbox uploader not configured: {}", msg),
            UploadError::Upload {
                file_name,
                source_url,
                reason,
            } => write!(
                f,
                "Could not upload {} file to dropbox: {} ({})",
                file_name, source_url, reason
            ),
            UploadError::Share {
                remote_path,
                reason,
            } => write!(f, "Could not share {}: {}", remote_path, reason),
            UploadError::LocalIo { path, reason } => {
                write!(f, "Could not remove {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for UploadError {}
