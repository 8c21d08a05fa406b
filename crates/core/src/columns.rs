//! Declarative column tables for the commits and pipeline-run lists.
//!
//! This module provides:
//! - Stable column keys + specs (titles, widths, sort paths, visibility flags)
//! - Per-list tables with the storage key their visible set is persisted under
//! - Normalization of a visible set against a table

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub key: &'static str,
    pub title: &'static str,
    pub width: u16,
    /// Field path for the default comparator. `None` means the column is not
    /// sortable by path (custom comparator or not sortable).
    pub sort_path: Option<&'static str>,
    pub sortable: bool,
    pub default_visible: bool,
    pub non_hidable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnTable {
    pub id: &'static str,
    /// Preference key the visible-columns set is stored under.
    pub storage_key: &'static str,
    pub defs: &'static [ColumnDef],
}

// ---------------- Column keys (stable) ----------------
// Commits
pub const COMMIT_NAME: &str = "name";
pub const COMMIT_BRANCH: &str = "branch";
pub const COMMIT_COMPONENT: &str = "component";
pub const COMMIT_BY_USER: &str = "byUser";
pub const COMMIT_COMMITTED_AT: &str = "committedAt";
pub const COMMIT_STATUS: &str = "status";

// Pipeline runs
pub const RUN_NAME: &str = "name";
pub const RUN_STARTED: &str = "started";
pub const RUN_DURATION: &str = "duration";
pub const RUN_STATUS: &str = "status";
pub const RUN_TYPE: &str = "type";
pub const RUN_VERSION: &str = "version";
pub const RUN_TRIGGER: &str = "trigger";
pub const RUN_REFERENCE: &str = "reference";

const fn col(
    key: &'static str,
    title: &'static str,
    width: u16,
    sort_path: Option<&'static str>,
    sortable: bool,
    default_visible: bool,
    non_hidable: bool,
) -> ColumnDef {
    ColumnDef { key, title, width, sort_path, sortable, default_visible, non_hidable }
}

pub const COMMIT_COLUMNS: ColumnTable = ColumnTable {
    id: "commits",
    storage_key: "conveyor/commits-visible-columns",
    defs: &[
        col(COMMIT_NAME, "Name", 48, Some("shaTitle"), true, true, true),
        col(COMMIT_BRANCH, "Branch", 18, Some("branch"), true, true, false),
        col(COMMIT_COMPONENT, "Component", 18, None, false, true, false),
        col(COMMIT_BY_USER, "By user", 16, Some("user"), true, true, false),
        col(COMMIT_COMMITTED_AT, "Latest commit at", 20, Some("creationTime"), true, true, false),
        col(COMMIT_STATUS, "Status", 16, None, true, true, false),
    ],
};

pub const PIPELINE_RUN_COLUMNS: ColumnTable = ColumnTable {
    id: "pipelineruns",
    storage_key: "conveyor/pipelineruns-visible-columns",
    defs: &[
        col(RUN_NAME, "Name", 40, Some("name"), true, true, true),
        col(RUN_STARTED, "Started", 20, Some("startTime"), true, true, false),
        col(RUN_DURATION, "Duration", 10, Some("duration"), true, true, false),
        col(RUN_STATUS, "Status", 16, None, true, true, true),
        col(RUN_TYPE, "Type", 10, Some("type"), true, true, false),
        col(RUN_VERSION, "Version", 14, Some("version"), true, false, false),
        col(RUN_TRIGGER, "Trigger", 14, Some("trigger"), true, true, false),
        col(RUN_REFERENCE, "Reference", 14, None, false, false, false),
    ],
};

impl ColumnTable {
    pub fn get(&self, key: &str) -> Option<&ColumnDef> {
        self.defs.iter().find(|d| d.key == key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.defs.iter().position(|d| d.key == key)
    }

    pub fn default_visible(&self) -> BTreeSet<String> {
        self.defs.iter().filter(|d| d.default_visible || d.non_hidable).map(|d| d.key.to_string()).collect()
    }

    pub fn non_hidable(&self) -> BTreeSet<String> {
        self.defs.iter().filter(|d| d.non_hidable).map(|d| d.key.to_string()).collect()
    }

    pub fn is_non_hidable(&self, key: &str) -> bool {
        self.get(key).map(|d| d.non_hidable).unwrap_or(false)
    }

    /// Drop unknown keys and add back every non-hidable column.
    pub fn normalize<I, S>(&self, keys: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: BTreeSet<String> = keys
            .into_iter()
            .filter(|k| self.get(k.as_ref()).is_some())
            .map(|k| k.as_ref().to_string())
            .collect();
        out.extend(self.non_hidable());
        out
    }

    /// Visible column defs in table order.
    pub fn visible_defs<'a>(&'a self, visible: &'a BTreeSet<String>) -> impl Iterator<Item = (usize, &'a ColumnDef)> + 'a {
        self.defs.iter().enumerate().filter(move |(_, d)| visible.contains(d.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_non_hidable_and_drops_unknown() {
        let set = COMMIT_COLUMNS.normalize(["branch", "bogus"]);
        assert!(set.contains(COMMIT_NAME));
        assert!(set.contains(COMMIT_BRANCH));
        assert!(!set.contains("bogus"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn defaults_are_superset_of_non_hidable() {
        for table in [&COMMIT_COLUMNS, &PIPELINE_RUN_COLUMNS] {
            let d = table.default_visible();
            assert!(table.non_hidable().is_subset(&d));
        }
        assert!(!PIPELINE_RUN_COLUMNS.default_visible().contains(RUN_VERSION));
    }

    #[test]
    fn sort_paths_only_on_sortable_columns() {
        for table in [&COMMIT_COLUMNS, &PIPELINE_RUN_COLUMNS] {
            for d in table.defs {
                assert!(d.sort_path.is_none() || d.sortable, "{}/{}", table.id, d.key);
            }
        }
        assert_eq!(PIPELINE_RUN_COLUMNS.get(RUN_REFERENCE).and_then(|d| d.sort_path), None);
    }
}
