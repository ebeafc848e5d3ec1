//! Destination path macros.
//!
//! Supported placeholders: `#login#`, `#date#` (`YYYY-MM-DD`), `#time#`
//! (`HH-MM-SS`) and `#uniqueid#` (the submission id). Anything else is left as
//! written.

use chrono::NaiveDateTime;

pub const LOGIN: &str = "#login#";
pub const DATE: &str = "#date#";
pub const TIME: &str = "#time#";
pub const UNIQUE_ID: &str = "#uniqueid#";

/// Username substituted for `#login#` when the submitter is not logged in.
pub const ANONYMOUS: &str = "anonymous";

/// Expands the path macros in `template`.
///
/// Substitution happens in a fixed order: login, date, time, submission id.
pub fn expand(template: &str, username: &str, submission_id: &str, now: NaiveDateTime) -> String {
    if template.is_empty() {
        return String::new();
    }

    template
        .replace(LOGIN, username)
        .replace(DATE, &now.format("%Y-%m-%d").to_string())
        .replace(TIME, &now.format("%H-%M-%S").to_string())
        .replace(UNIQUE_ID, submission_id)
}
