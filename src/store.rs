// 🗂️ Table Store
// All rows + selected rows for one table, with revision counters standing in
// for "the collection reference changed"

use crate::csv_codec::ParseResult;
use crate::persist::{load_json, save_json, KeyValueStore};
use crate::record::{Keyed, Record, RecordId, RowKey, DEFAULT_ID_FIELD};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// TableStore - selection state for one table
///
/// `selected` is a subset of `all_rows` by key. `set_selected_rows` trusts
/// the caller on that; every other operation keeps it true.
#[derive(Debug, Clone)]
pub struct TableStore<T> {
    id_field: String,
    all_rows: Vec<T>,
    selected: Vec<T>,
    is_loading: bool,
    error: Option<String>,
    rows_revision: u64,
    selection_revision: u64,
}

/// Persisted form of a [`TableStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot<T> {
    pub rows: Vec<T>,
    pub selected_keys: Vec<RowKey>,
}

impl<T: Keyed + Clone> TableStore<T> {
    pub fn new(id_field: impl Into<String>) -> Self {
        TableStore {
            id_field: id_field.into(),
            all_rows: Vec::new(),
            selected: Vec::new(),
            is_loading: false,
            error: None,
            rows_revision: 0,
            selection_revision: 0,
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn all_rows(&self) -> &[T] {
        &self.all_rows
    }

    pub fn selected_rows(&self) -> &[T] {
        &self.selected
    }

    /// Bumped whenever the row collection is replaced or changed
    pub fn rows_revision(&self) -> u64 {
        self.rows_revision
    }

    /// Bumped whenever the selected collection is replaced
    pub fn selection_revision(&self) -> u64 {
        self.selection_revision
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn key_of(&self, row: &T) -> Option<RowKey> {
        row.key(&self.id_field)
    }

    /// Keys of the selected rows
    pub fn selected_keys(&self) -> HashSet<RowKey> {
        self.selected.iter().filter_map(|r| self.key_of(r)).collect()
    }

    // ------------------------------------------------------------------------
    // Row management
    // ------------------------------------------------------------------------

    /// Replace every row; the selection starts over
    pub fn set_all_rows(&mut self, rows: Vec<T>) {
        self.all_rows = rows;
        self.error = None;
        self.touch_rows();
        self.replace_selection(Vec::new());
    }

    /// Append rows, keeping the current selection
    pub fn add_rows(&mut self, rows: Vec<T>) {
        self.all_rows.extend(rows);
        self.error = None;
        self.touch_rows();
    }

    /// Remove the selected rows and clear the selection
    pub fn remove_selected_rows(&mut self) -> usize {
        let keys = self.selected_keys();
        let removed = self.retain_rows(|key| !keys.contains(key));
        self.replace_selection(Vec::new());
        removed
    }

    /// Remove rows by key; selection entries for those keys go too
    pub fn remove_keys(&mut self, keys: &[RowKey]) -> usize {
        let keys: HashSet<&RowKey> = keys.iter().collect();
        let removed = self.retain_rows(|key| !keys.contains(key));

        let before = self.selected.len();
        let id_field = self.id_field.clone();
        let remaining: Vec<T> = self
            .selected
            .iter()
            .filter(|r| r.key(&id_field).map_or(true, |k| !keys.contains(&k)))
            .cloned()
            .collect();
        if remaining.len() != before {
            self.replace_selection(remaining);
        }
        removed
    }

    /// Apply `update` to the row with `key`; selected copies are refreshed
    pub fn update_row(&mut self, key: &str, update: impl FnOnce(&mut T)) -> bool {
        let id_field = self.id_field.clone();
        let Some(row) = self
            .all_rows
            .iter_mut()
            .find(|r| r.key(&id_field).as_deref() == Some(key))
        else {
            return false;
        };
        update(row);
        let updated = row.clone();
        self.touch_rows();

        if let Some(pos) = self
            .selected
            .iter()
            .position(|r| r.key(&id_field).as_deref() == Some(key))
        {
            let mut selected = self.selected.clone();
            selected[pos] = updated;
            self.replace_selection(selected);
        }
        true
    }

    pub fn clear_all_data(&mut self) {
        self.all_rows.clear();
        self.error = None;
        self.touch_rows();
        self.replace_selection(Vec::new());
    }

    // ------------------------------------------------------------------------
    // Selection management
    // ------------------------------------------------------------------------

    /// Overwrite the selection wholesale
    pub fn set_selected_rows(&mut self, rows: Vec<T>) {
        self.replace_selection(rows);
    }

    pub fn clear_selection(&mut self) {
        self.replace_selection(Vec::new());
    }

    pub fn select_all(&mut self) {
        self.replace_selection(self.all_rows.clone());
    }

    pub fn deselect_all(&mut self) {
        self.clear_selection();
    }

    pub fn toggle_row_selection(&mut self, row: &T) {
        let Some(key) = self.key_of(row) else {
            return;
        };
        let id_field = self.id_field.clone();
        let mut selected = self.selected.clone();

        if self.is_row_selected(row) {
            selected.retain(|r| r.key(&id_field).as_deref() != Some(key.as_str()));
        } else {
            selected.push(row.clone());
        }
        self.replace_selection(selected);
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    // ------------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------------

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn total_count(&self) -> usize {
        self.all_rows.len()
    }

    pub fn is_all_selected(&self) -> bool {
        !self.all_rows.is_empty() && self.selected.len() == self.all_rows.len()
    }

    pub fn is_indeterminate(&self) -> bool {
        !self.selected.is_empty() && !self.is_all_selected()
    }

    pub fn is_row_selected(&self, row: &T) -> bool {
        match self.key_of(row) {
            Some(key) => self
                .selected
                .iter()
                .any(|r| self.key_of(r).as_deref() == Some(key.as_str())),
            None => false,
        }
    }

    pub fn unselected_rows(&self) -> Vec<T> {
        let keys = self.selected_keys();
        self.all_rows
            .iter()
            .filter(|r| self.key_of(r).map_or(true, |k| !keys.contains(&k)))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn replace_selection(&mut self, rows: Vec<T>) {
        self.selected = rows;
        self.selection_revision += 1;
    }

    fn touch_rows(&mut self) {
        self.rows_revision += 1;
    }

    fn retain_rows(&mut self, mut keep: impl FnMut(&RowKey) -> bool) -> usize {
        let before = self.all_rows.len();
        let id_field = self.id_field.clone();
        self.all_rows
            .retain(|r| r.key(&id_field).map_or(true, |k| keep(&k)));
        let removed = before - self.all_rows.len();
        if removed > 0 {
            self.touch_rows();
        }
        removed
    }
}

impl TableStore<Record> {
    /// CSV table store keyed by the synthetic record id
    pub fn for_records() -> Self {
        TableStore::new(DEFAULT_ID_FIELD)
    }

    /// Restore saved records; ids allocated afterwards stay above the restored ones
    pub fn load_records(&mut self, kv: &dyn KeyValueStore, key: &str) -> Result<bool> {
        let found = self.load(kv, key)?;
        for record in &self.all_rows {
            RecordId::observe(record.id);
        }
        Ok(found)
    }

    /// Take a parse outcome: replace when empty, append otherwise.
    ///
    /// A failure is recorded in `error` and leaves rows and selection as they were.
    pub fn apply_parse(&mut self, result: ParseResult) -> Result<usize, String> {
        match result {
            Ok(rows) => {
                let count = rows.len();
                if self.all_rows.is_empty() {
                    self.set_all_rows(rows);
                } else {
                    self.add_rows(rows);
                }
                info!(added = count, total = self.total_count(), "loaded rows into table");
                Ok(count)
            }
            Err(err) => {
                let message = err.to_string();
                debug!(reason = %message, "parse failed, table unchanged");
                self.error = Some(message.clone());
                Err(message)
            }
        }
    }
}

impl<T: Keyed + Clone + Serialize + DeserializeOwned> TableStore<T> {
    pub fn snapshot(&self) -> TableSnapshot<T> {
        let mut selected_keys: Vec<RowKey> = self.selected_keys().into_iter().collect();
        selected_keys.sort();
        TableSnapshot {
            rows: self.all_rows.clone(),
            selected_keys,
        }
    }

    /// Rebuild rows and selection from a snapshot; unknown selected keys are skipped
    pub fn restore(&mut self, snapshot: TableSnapshot<T>) {
        let keys: HashSet<RowKey> = snapshot.selected_keys.into_iter().collect();
        self.set_all_rows(snapshot.rows);
        let selected: Vec<T> = self
            .all_rows
            .iter()
            .filter(|r| self.key_of(r).map_or(false, |k| keys.contains(&k)))
            .cloned()
            .collect();
        self.replace_selection(selected);
    }

    pub fn save(&self, kv: &dyn KeyValueStore, key: &str) -> Result<()> {
        save_json(kv, key, &self.snapshot())
    }

    /// Restore from `kv`; returns false when nothing was stored
    pub fn load(&mut self, kv: &dyn KeyValueStore, key: &str) -> Result<bool> {
        match load_json::<TableSnapshot<T>>(kv, key)? {
            Some(snapshot) => {
                self.restore(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
