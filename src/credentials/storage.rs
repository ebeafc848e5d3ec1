//! SQLite-backed option store.
//!
//! Secret-bearing options (app secret, temporary token, access token) are sealed
//! with AES-256-GCM before they reach the database.

use super::encryption::Cipher;
use super::options::{OptionKey, OptionStore};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Option store backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE options (
///     name TEXT PRIMARY KEY,
///     value TEXT NOT NULL,        -- sealed for secret keys
///     updated_at TEXT NOT NULL    -- ISO 8601 timestamp
/// );
/// ```
pub struct SqliteOptionStore {
    conn: Mutex<Connection>,
    cipher: Cipher,
}

impl SqliteOptionStore {
    /// Creates or opens an option store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = Cipher::from_base64_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS options (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create options table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    /// Raw column value, exactly as stored. Used to check sealing.
    fn raw_value(&self, key: OptionKey) -> Result<Option<String>> {
        self.conn
            .lock()
            .unwrap()
            .query_row(
                "SELECT value FROM options WHERE name = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read option {}", key))
    }
}

impl OptionStore for SqliteOptionStore {
    fn get_option(&self, key: OptionKey) -> Result<Option<String>> {
        let Some(stored) = self.raw_value(key)? else {
            return Ok(None);
        };

        if key.is_secret() {
            let value = self
                .cipher
                .open(&stored)
                .with_context(|| format!("Failed to decrypt option {}", key))?;
            Ok(Some(value))
        } else {
            Ok(Some(stored))
        }
    }

    fn set_option(&self, key: OptionKey, value: &str) -> Result<()> {
        let stored = if key.is_secret() {
            self.cipher
                .seal(value)
                .with_context(|| format!("Failed to encrypt option {}", key))?
        } else {
            value.to_string()
        };

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO options (name, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![key.as_str(), stored, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("Failed to store option {}", key))?;

        Ok(())
    }

    fn delete_option(&self, key: OptionKey) -> Result<bool> {
        let rows_affected = self
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM options WHERE name = ?1", params![key.as_str()])
            .with_context(|| format!("Failed to delete option {}", key))?;

        Ok(rows_affected > 0)
    }
}
