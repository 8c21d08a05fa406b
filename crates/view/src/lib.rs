//! Conveyor view: the pure list view-model pipeline.
//!
//! Loaded runs → derived commit index → filter → sort. Everything here is a pure
//! recomputation over its inputs; views rerun it on every snapshot or state change.

#![forbid(unsafe_code)]

use conveyor_core::columns::{COMMIT_COLUMNS, PIPELINE_RUN_COLUMNS};
use conveyor_core::{Commit, PipelineRun};
use tracing::debug;

pub mod commits;
pub mod filter;
pub mod paging;
pub mod sort;

pub use commits::{aggregate_status, commits_from_runs, CommitIndex, StatusMap};
pub use filter::{EmptyState, FilterKey, FilterState};
pub use paging::{PageFlags, ViewPhase};
pub use sort::{SortDirection, SortState};

/// Output of the commits pipeline.
#[derive(Debug, Clone, Default)]
pub struct CommitRows {
    /// Every commit derived from the loaded build runs.
    pub commits: Vec<Commit>,
    /// Filtered and sorted.
    pub rows: Vec<Commit>,
    pub statuses: StatusMap,
}

/// Run the commits pipeline over loaded runs scoped to `components`.
pub fn commit_rows(runs: &[PipelineRun], components: &[&str], filter: &FilterState, sort: SortState) -> CommitRows {
    let commits = commits_from_runs(runs);
    let statuses = CommitIndex::build(runs, components).statuses();
    let mut rows = filter::filter_commits(&commits, filter, &statuses);
    sort::sort_commits(&mut rows, &COMMIT_COLUMNS, sort, &statuses);
    debug!(runs = runs.len(), commits = commits.len(), rows = rows.len(), "view: commit rows");
    CommitRows { commits, rows, statuses }
}

/// Output of the pipeline-runs pipeline.
#[derive(Debug, Clone, Default)]
pub struct RunRows {
    /// Loaded runs in default order (start time descending).
    pub runs: Vec<PipelineRun>,
    pub rows: Vec<PipelineRun>,
}

/// Run the pipeline-runs pipeline. With no explicit sort the default order is kept.
pub fn run_rows(loaded: &[PipelineRun], component: Option<&str>, filter: &FilterState, sort: Option<SortState>) -> RunRows {
    let mut runs = loaded.to_vec();
    sort::default_run_order(&mut runs);
    let mut rows = filter::filter_runs(&runs, filter, component);
    if let Some(state) = sort {
        sort::sort_runs(&mut rows, &PIPELINE_RUN_COLUMNS, state);
    }
    debug!(runs = runs.len(), rows = rows.len(), "view: run rows");
    RunRows { runs, rows }
}
