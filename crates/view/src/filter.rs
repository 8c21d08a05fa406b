//! Filter engine: free-text match plus categorical set membership, ANDed.

use std::collections::{BTreeMap, BTreeSet};

use conveyor_core::{Commit, PipelineRun, RunStatus};
use serde::{Deserialize, Serialize};

use crate::commits::StatusMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterKey {
    Status,
    Type,
    Version,
}

impl FilterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Status => "status",
            FilterKey::Type => "type",
            FilterKey::Version => "version",
        }
    }
}

/// Per-view filter state. An empty set places no constraint on its dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub text: String,
    pub status: BTreeSet<String>,
    #[serde(rename = "type")]
    pub types: BTreeSet<String>,
    pub version: BTreeSet<String>,
}

impl FilterState {
    pub fn values(&self, key: FilterKey) -> &BTreeSet<String> {
        match key {
            FilterKey::Status => &self.status,
            FilterKey::Type => &self.types,
            FilterKey::Version => &self.version,
        }
    }

    fn values_mut(&mut self, key: FilterKey) -> &mut BTreeSet<String> {
        match key {
            FilterKey::Status => &mut self.status,
            FilterKey::Type => &mut self.types,
            FilterKey::Version => &mut self.version,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_values<I, S>(&mut self, key: FilterKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.values_mut(key) = values.into_iter().map(Into::into).collect();
    }

    pub fn toggle(&mut self, key: FilterKey, value: &str) {
        let set = self.values_mut(key);
        if !set.remove(value) {
            set.insert(value.to_string());
        }
    }

    /// Reset text and every set in one update.
    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    /// Whether any filter is active. The version dimension only counts when the
    /// view is not already scoped to a single version.
    pub fn is_filtered(&self, scoped_to_version: bool) -> bool {
        !self.text.is_empty()
            || !self.status.is_empty()
            || !self.types.is_empty()
            || (!scoped_to_version && !self.version.is_empty())
    }

    fn admits(&self, key: FilterKey, value: Option<&str>) -> bool {
        let set = self.values(key);
        set.is_empty() || value.map(|v| set.contains(v)).unwrap_or(false)
    }
}

/// Commit text match: SHA, component names, PR number (query without `#`) or title.
pub fn commit_matches_text(commit: &Commit, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    let pr_query = q.replace('#', "");
    commit.sha.to_lowercase().contains(&q)
        || commit.components.iter().any(|c| c.to_lowercase().contains(&q))
        || (!commit.pull_request_number.is_empty() && commit.pull_request_number.to_lowercase().contains(&pr_query))
        || commit.sha_title.to_lowercase().contains(&q)
}

/// Commits passing the text filter and whose aggregate status is selected.
pub fn filter_commits(commits: &[Commit], state: &FilterState, statuses: &StatusMap) -> Vec<Commit> {
    commits
        .iter()
        .filter(|c| {
            let status = statuses.get(&c.sha).copied().unwrap_or(RunStatus::Unknown);
            commit_matches_text(c, &state.text) && state.admits(FilterKey::Status, Some(status.as_str()))
        })
        .cloned()
        .collect()
}

/// Single-run predicate: name substring, status, type, version, and optional component scope.
pub fn run_matches(run: &PipelineRun, state: &FilterState, component: Option<&str>) -> bool {
    let q = state.text.trim().to_lowercase();
    (q.is_empty() || run.name.to_lowercase().contains(&q))
        && component.map(|c| run.component() == Some(c)).unwrap_or(true)
        && state.admits(FilterKey::Status, Some(run.status.as_str()))
        && state.admits(FilterKey::Type, run.pipeline_type())
        && state.admits(FilterKey::Version, run.component_version())
}

pub fn filter_runs(runs: &[PipelineRun], state: &FilterState, component: Option<&str>) -> Vec<PipelineRun> {
    runs.iter().filter(|r| run_matches(r, state, component)).cloned().collect()
}

/// Multiselect option counts: every known value seeded at zero, then one count
/// per item (after the optional pre-filter) under the value it reports.
pub fn option_counts<T, V, P>(items: &[T], known: &[&str], value_of: V, pre: Option<P>) -> BTreeMap<String, usize>
where
    V: Fn(&T) -> Option<String>,
    P: Fn(&T) -> bool,
{
    let mut out: BTreeMap<String, usize> = known.iter().map(|k| (k.to_string(), 0)).collect();
    for item in items {
        if let Some(p) = pre.as_ref() {
            if !p(item) {
                continue;
            }
        }
        if let Some(v) = value_of(item) {
            *out.entry(v).or_insert(0) += 1;
        }
    }
    out
}

/// Display names of every run status, for seeding status options.
pub fn status_options() -> Vec<&'static str> {
    RunStatus::ALL.iter().map(|s| s.as_str()).collect()
}

/// Which empty message a list shows, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmptyState {
    /// Nothing loaded at all.
    NoData,
    /// Items exist but the filters exclude all of them; offers "clear filters".
    NoResults,
}

pub fn empty_state(unfiltered: usize, filtered: usize, is_filtered: bool) -> Option<EmptyState> {
    if filtered > 0 {
        None
    } else if unfiltered > 0 || is_filtered {
        Some(EmptyState::NoResults)
    } else {
        Some(EmptyState::NoData)
    }
}
