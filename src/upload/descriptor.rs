//! Per-file upload descriptors.

use super::submission::FieldId;
use md5::{Digest, Md5};
use serde::Deserialize;
use std::path::PathBuf;

const MAX_KEPT_CHAR: u32 = 0xAD;

/// One file to upload. Built per submission and discarded after dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub field_id: FieldId,
    pub destination_dir: String,
    pub file_name: String,
    /// Reference as stored in the submission
    pub source_url: String,
    pub local_path: PathBuf,
}

impl UploadDescriptor {
    pub fn remote_path(&self) -> String {
        format!("{}{}", self.destination_dir, self.file_name)
    }
}

/// Derives the Dropbox file name from a file reference.
///
/// Only characters up to U+00AD are kept, so accented Latin-1 letters such as
/// `é` are dropped too. A name that is left exactly four bytes long (typically
/// just an extension such as `.pdf`) gets the hex MD5 of the field id prepended.
pub fn destination_file_name(reference: &str, field_id: FieldId) -> String {
    let stripped: String = base_name(reference)
        .chars()
        .filter(|c| u32::from(*c) <= MAX_KEPT_CHAR)
        .collect();

    if stripped.len() == 4 {
        let digest = Md5::digest(field_id.to_string().as_bytes());
        format!("{}{}", hex::encode(digest), stripped)
    } else {
        stripped
    }
}

fn base_name(reference: &str) -> &str {
    reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}

/// Maps public upload URLs back to files on local disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LocalPathResolver {
    /// Public site URL, e.g. `https://example.com`
    #[serde(default)]
    pub site_url: String,
    /// Directory the site URL maps onto
    #[serde(default)]
    pub local_root: PathBuf,
}

impl LocalPathResolver {
    pub fn new(site_url: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            site_url: site_url.into(),
            local_root: local_root.into(),
        }
    }

    /// `<site_url>/<rest>` becomes `<local_root>/<rest>`; anything else is
    /// taken to already be a local path.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let prefix = format!("{}/", self.site_url.trim_end_matches('/'));
        match reference.strip_prefix(&prefix) {
            Some(rest) if !self.site_url.is_empty() => self.local_root.join(rest),
            _ => PathBuf::from(reference),
        }
    }
}
