//! Local persistence for unsaved form drafts.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Field name to raw input value
pub type FormFields = BTreeMap<String, String>;

/// A draft loaded back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
  pub fields: FormFields,
  pub saved_at: DateTime<Utc>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS form_drafts (
    form_key TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    saved_at TEXT NOT NULL
);
"#;

/// SQLite-backed store for form drafts.
///
/// Each form is stored under `form:<form_id>`. The field map is serialized
/// as JSON and overwritten on every save.
#[derive(Clone)]
pub struct DraftStore {
  conn: Arc<Mutex<Connection>>,
}

impl DraftStore {
  /// Open or create the draft database at the default location
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open draft database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// In-memory store, nothing survives a restart
  pub fn in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
    })
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("stockroom").join("drafts.db"))
  }

  fn storage_key(form_id: &str) -> String {
    format!("form:{}", form_id)
  }

  /// Load the saved draft for a form, if any.
  pub fn load(&self, form_id: &str) -> Result<Option<Draft>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(String, String)> = conn
      .query_row(
        "SELECT data, saved_at FROM form_drafts WHERE form_key = ?",
        params![Self::storage_key(form_id)],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to load draft '{}': {}", form_id, e))?;

    let Some((data, saved_at)) = row else {
      return Ok(None);
    };

    let fields: FormFields = serde_json::from_str(&data)
      .map_err(|e| eyre!("Failed to parse draft '{}': {}", form_id, e))?;
    let saved_at = DateTime::parse_from_rfc3339(&saved_at)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(|e| eyre!("Failed to parse draft timestamp '{}': {}", saved_at, e))?;

    Ok(Some(Draft { fields, saved_at }))
  }

  /// Overwrite the draft for a form.
  pub fn save(&self, form_id: &str, fields: &FormFields) -> Result<()> {
    let data =
      serde_json::to_string(fields).map_err(|e| eyre!("Failed to serialize draft: {}", e))?;
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO form_drafts (form_key, data, saved_at) VALUES (?, ?, ?)",
        params![Self::storage_key(form_id), data, Utc::now().to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to save draft '{}': {}", form_id, e))?;

    Ok(())
  }

  /// Forget the draft for a form, e.g. after it was submitted.
  pub fn clear(&self, form_id: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM form_drafts WHERE form_key = ?",
        params![Self::storage_key(form_id)],
      )
      .map_err(|e| eyre!("Failed to clear draft '{}': {}", form_id, e))?;
    debug!(form_id, removed, "draft cleared");

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fields(pairs: &[(&str, &str)]) -> FormFields {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_missing_draft_is_none() {
    let store = DraftStore::in_memory().unwrap();
    assert_eq!(store.load("new_item").unwrap(), None);
  }

  #[test]
  fn test_save_overwrites_previous_draft() {
    let store = DraftStore::in_memory().unwrap();

    store.save("new_item", &fields(&[("name", "Bol")])).unwrap();
    store
      .save("new_item", &fields(&[("name", "Bolts"), ("quantity", "12")]))
      .unwrap();

    let draft = store.load("new_item").unwrap().unwrap();
    assert_eq!(draft.fields, fields(&[("name", "Bolts"), ("quantity", "12")]));
  }

  #[test]
  fn test_drafts_are_namespaced_by_form() {
    let store = DraftStore::in_memory().unwrap();

    store.save("new_item", &fields(&[("name", "Bolts")])).unwrap();
    store.save("new_supplier", &fields(&[("name", "Acme")])).unwrap();

    let item = store.load("new_item").unwrap().unwrap();
    assert_eq!(item.fields.get("name").map(String::as_str), Some("Bolts"));

    store.clear("new_item").unwrap();
    assert_eq!(store.load("new_item").unwrap(), None);
    assert!(store.load("new_supplier").unwrap().is_some());
  }
}
