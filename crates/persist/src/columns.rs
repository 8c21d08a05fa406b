//! Visible-columns preference for one list table.

use std::collections::BTreeSet;
use std::sync::Arc;

use conveyor_core::columns::ColumnTable;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::Prefs;

/// Visible columns of a table, read once at construction and written on every change.
/// The set always contains the table's non-hidable columns.
pub struct ColumnVisibility {
    table: ColumnTable,
    prefs: Arc<dyn Prefs>,
    tx: watch::Sender<BTreeSet<String>>,
}

impl ColumnVisibility {
    /// Load the stored set; missing or unreadable values fall back to the table default.
    pub fn load(table: ColumnTable, prefs: Arc<dyn Prefs>) -> Self {
        let stored = match prefs.get(table.storage_key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(keys) => Some(table.normalize(keys)),
                Err(e) => {
                    warn!(key = %table.storage_key, error = %e, "unreadable column preference; using defaults");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %table.storage_key, error = %e, "column preference read failed; using defaults");
                None
            }
        };
        let initial = stored.unwrap_or_else(|| table.default_visible());
        let (tx, _rx) = watch::channel(initial);
        Self { table, prefs, tx }
    }

    pub fn table(&self) -> &ColumnTable { &self.table }

    pub fn get(&self) -> BTreeSet<String> {
        self.tx.borrow().clone()
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.tx.borrow().contains(key)
    }

    /// Receive every future change.
    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.tx.subscribe()
    }

    /// Replace the set. Non-hidable columns are added back and unknown keys dropped.
    pub fn set<I, S>(&self, keys: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let next = self.table.normalize(keys);
        self.persist(&next);
        debug!(table = %self.table.id, visible = next.len(), "visible columns changed");
        self.tx.send_replace(next.clone());
        next
    }

    /// Flip one column. Non-hidable columns are left alone.
    pub fn toggle(&self, key: &str) -> BTreeSet<String> {
        if self.table.is_non_hidable(key) || self.table.get(key).is_none() {
            return self.get();
        }
        let mut cur = self.get();
        if !cur.remove(key) {
            cur.insert(key.to_string());
        }
        self.set(cur)
    }

    pub fn reset(&self) -> BTreeSet<String> {
        self.set(self.table.default_visible())
    }

    fn persist(&self, set: &BTreeSet<String>) {
        let keys: Vec<&String> = set.iter().collect();
        match serde_json::to_string(&keys) {
            Ok(raw) => {
                if let Err(e) = self.prefs.put(self.table.storage_key, &raw) {
                    warn!(key = %self.table.storage_key, error = %e, "persisting visible columns failed");
                }
            }
            Err(e) => warn!(error = %e, "encoding visible columns failed"),
        }
    }
}
