//! Form submissions and form definitions as received from the form engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FieldId = u32;

/// A completed form entry. Field values are stored as strings; multi-file upload
/// fields hold a JSON-encoded array of file references.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    #[serde(default)]
    pub values: BTreeMap<FieldId, String>,
}

impl Submission {
    pub fn value(&self, field_id: FieldId) -> Option<&str> {
        self.values.get(&field_id).map(String::as_str)
    }
}

/// Per-field upload settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    /// Flagged for upload to Dropbox
    #[serde(default)]
    pub upload_to_dropbox: bool,
    /// Overrides the global upload directory for this field
    #[serde(default)]
    pub dropbox_path: Option<String>,
}

impl FieldDefinition {
    pub fn override_path(&self) -> Option<&str> {
        self.dropbox_path.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDefinition {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// The stored value of a file field, parsed once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileRefs {
    Single(String),
    Multiple(Vec<String>),
}

impl FileRefs {
    /// A JSON array of strings is a multi-upload; anything else, including other
    /// JSON, is one reference. Pure: depends only on `value`.
    pub fn parse(value: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(value) {
            Ok(refs) => FileRefs::Multiple(refs),
            Err(_) => FileRefs::Single(value.to_string()),
        }
    }

    pub fn references(&self) -> &[String] {
        match self {
            FileRefs::Single(reference) => std::slice::from_ref(reference),
            FileRefs::Multiple(refs) => refs,
        }
    }

    /// Swaps `original` for `replacement`. A single reference is replaced
    /// wholesale; in a list only matching elements change.
    pub fn replace(&mut self, original: &str, replacement: &str) {
        match self {
            FileRefs::Single(reference) => *reference = replacement.to_string(),
            FileRefs::Multiple(refs) => {
                for reference in refs.iter_mut().filter(|r| r.as_str() == original) {
                    *reference = replacement.to_string();
                }
            }
        }
    }

    /// Value as it goes back into the submission.
    pub fn to_stored_value(&self) -> String {
        match self {
            FileRefs::Single(reference) => reference.clone(),
            FileRefs::Multiple(refs) => {
                serde_json::to_string(refs).unwrap_or_else(|_| refs.join(","))
            }
        }
    }
}
