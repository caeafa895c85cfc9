use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::AppRow;
use crate::resolver::Icon;

/// One visible launcher entry. `icon: None` draws the generic icon.
#[derive(Debug, Clone)]
pub struct Row {
    pub key: String,
    pub label: String,
    pub icon: Option<Icon>,
    pub url: String,
}

/// Ordered rows shown in the launcher, keyed by service name.
/// Rows keep their insertion position; lookups scan the key column.
#[derive(Debug, Default)]
pub struct Projection {
    rows: Vec<Row>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.key == key)
    }

    /// Append a row, or reset an existing row in place to the fallback
    /// label and generic icon.
    pub fn upsert(&mut self, key: &str, label: &str, url: &str) {
        let row = Row {
            key: key.to_string(),
            label: label.to_string(),
            icon: None,
            url: url.to_string(),
        };
        match self.position(key) {
            Some(idx) => self.rows[idx] = row,
            None => self.rows.push(row),
        }
    }

    pub fn set_label(&mut self, key: &str, label: &str) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.rows[idx].label = label.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_icon(&mut self, key: &str, icon: Icon) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.rows[idx].icon = Some(icon);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Row> {
        self.position(key).map(|idx| self.rows.remove(idx))
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.position(key).map(|idx| &self.rows[idx])
    }

    pub fn to_app_rows(&self) -> Vec<AppRow> {
        self.rows
            .iter()
            .map(|row| AppRow {
                key: row.key.clone(),
                label: row.label.clone(),
                has_icon: row.icon.is_some(),
                url: row.url.clone(),
            })
            .collect()
    }

    /// SHA-256 over what a front-end draws, in display order. Front-ends
    /// poll this to know when to refetch the list.
    pub fn compute_hash(&self) -> String {
        #[derive(Serialize)]
        struct HashView<'a> {
            key: &'a str,
            label: &'a str,
            url: &'a str,
            icon: Option<String>,
        }

        let views: Vec<HashView<'_>> = self
            .rows
            .iter()
            .map(|row| HashView {
                key: &row.key,
                label: &row.label,
                url: &row.url,
                icon: row.icon.as_ref().map(|icon| hex::encode(Sha256::digest(&icon.bytes))),
            })
            .collect();

        // Serializing plain strings and options cannot fail
        let json = serde_json::to_string(&views).unwrap_or_default();
        hex::encode(Sha256::digest(json.as_bytes()))
    }
}
