//! Sort engine: field-path comparator and the status-priority comparator.

use std::cmp::Ordering;

use conveyor_core::columns::ColumnTable;
use conveyor_core::{Commit, PipelineRun, RunStatus, UNKNOWN_STATUS_RANK};
use serde::{Deserialize, Serialize};

use crate::commits::StatusMap;

/// Column key that sorts with the status comparator instead of a field path.
pub const STATUS_COLUMN: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }

    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Selected column index (into the view's column table) and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub index: usize,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(index: usize, direction: SortDirection) -> Self {
        Self { index, direction }
    }

    /// Default for a table: `key` descending, or the first column.
    pub fn default_for(table: &ColumnTable, key: &str) -> Self {
        Self::new(table.index_of(key).unwrap_or(0), SortDirection::Desc)
    }

    /// Header click: index and direction change together.
    pub fn set(&mut self, index: usize, direction: SortDirection) {
        *self = Self { index, direction };
    }
}

/// Comparable value behind a field path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Missing,
    Num(i64),
    Text(String),
}

impl SortValue {
    fn text(s: &str) -> Self {
        if s.is_empty() { SortValue::Missing } else { SortValue::Text(s.to_string()) }
    }
}

/// Resolve a configured field path on a record.
pub trait FieldPath {
    fn field(&self, path: &str) -> SortValue;
}

impl FieldPath for Commit {
    fn field(&self, path: &str) -> SortValue {
        match path {
            "sha" => SortValue::text(&self.sha),
            "shaTitle" => SortValue::text(&self.sha_title),
            "branch" => SortValue::text(&self.branch),
            "user" => SortValue::text(&self.user),
            "pullRequestNumber" => SortValue::text(&self.pull_request_number),
            "application" => SortValue::text(&self.application),
            "creationTime" => SortValue::Num(self.creation_ts),
            _ => SortValue::Missing,
        }
    }
}

impl FieldPath for PipelineRun {
    fn field(&self, path: &str) -> SortValue {
        match path {
            "name" => SortValue::text(&self.name),
            "startTime" => self.start_ts.map(SortValue::Num).unwrap_or(SortValue::Missing),
            "creationTime" => SortValue::Num(self.creation_ts),
            "duration" => match (self.start_ts, self.completion_ts) {
                (Some(s), Some(e)) => SortValue::Num((e - s).max(0)),
                _ => SortValue::Missing,
            },
            "type" => SortValue::text(self.pipeline_type().unwrap_or("")),
            "version" => SortValue::text(self.component_version().unwrap_or("")),
            "trigger" => SortValue::text(self.event_type().unwrap_or("")),
            "component" => SortValue::text(self.component().unwrap_or("")),
            _ => SortValue::Missing,
        }
    }
}

/// Compare two records by a field path. Missing values order before present ones.
pub fn compare_path<T: FieldPath>(a: &T, b: &T, path: &str) -> Ordering {
    a.field(path).cmp(&b.field(path))
}

/// Stable sort by field path.
pub fn sort_by_path<T: FieldPath>(items: &mut [T], path: &str, direction: SortDirection) {
    items.sort_by(|a, b| direction.apply(compare_path(a, b, path)));
}

/// Rank of an optional status; absent or unranked statuses get the sentinel.
pub fn status_rank(status: Option<RunStatus>) -> u16 {
    status.map(|s| s.rank()).unwrap_or(UNKNOWN_STATUS_RANK)
}

/// Status comparator. Unknown ranks sort after every known rank in both
/// directions; equal ranks compare equal.
pub fn compare_status(a: Option<RunStatus>, b: Option<RunStatus>, direction: SortDirection) -> Ordering {
    let (ra, rb) = (status_rank(a), status_rank(b));
    match (ra >= UNKNOWN_STATUS_RANK, rb >= UNKNOWN_STATUS_RANK) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => direction.apply(ra.cmp(&rb)),
    }
}

/// Stable sort by status priority, looking statuses up with `status_of`.
pub fn sort_by_status<T, F>(items: &mut [T], status_of: F, direction: SortDirection)
where
    F: Fn(&T) -> Option<RunStatus>,
{
    items.sort_by(|a, b| compare_status(status_of(a), status_of(b), direction));
}

/// Sort commits for the current sort state. The status column uses the commit
/// status map; other columns use their configured field path; columns with
/// neither keep the input order.
pub fn sort_commits(commits: &mut [Commit], table: &ColumnTable, state: SortState, statuses: &StatusMap) {
    let Some(def) = table.defs.get(state.index) else { return };
    if def.key == STATUS_COLUMN {
        sort_by_status(commits, |c| statuses.get(&c.sha).copied(), state.direction);
    } else if let Some(path) = def.sort_path {
        sort_by_path(commits, path, state.direction);
    }
}

pub fn sort_runs(runs: &mut [PipelineRun], table: &ColumnTable, state: SortState) {
    let Some(def) = table.defs.get(state.index) else { return };
    if def.key == STATUS_COLUMN {
        sort_by_status(runs, |r| Some(r.status), state.direction);
    } else if let Some(path) = def.sort_path {
        sort_by_path(runs, path, state.direction);
    }
}

/// Pipeline runs in their default list order: start time descending, unstarted last.
pub fn default_run_order(runs: &mut [PipelineRun]) {
    runs.sort_by(|a, b| match (a.start_ts, b.start_ts) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
