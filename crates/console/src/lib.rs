//! Conveyor console: the list views and component pages.
//!
//! Every view is an explicit value built from a [`ConsoleContext`] and owns its filter,
//! sort and visible-columns state. Views never render; they hand a serializable state
//! to a renderer (see [`table`]).

#![forbid(unsafe_code)]

use std::sync::Arc;

use conveyor_api::{ConsoleApi, PIPELINE_RUN_GVK};
use conveyor_core::{labels, Component};
use conveyor_persist::Prefs;
use conveyor_store::LoaderParams;

pub mod activity;
pub mod builds;
pub mod commits;
pub mod nudges;
pub mod runs;
pub mod table;
pub mod versions;

pub use activity::{ActivityTabs, Navigation, TabResolution};
pub use commits::{CommitRow, CommitsListView, CommitsViewState};
pub use nudges::{load_nudge_relations, nudge_relations, NudgeRelation};
pub use runs::{PipelineRunsListView, RunsViewState};
pub use versions::{component_version, VersionOverview, VersionRow, VersionsTab};

/// Shared collaborators every view is built from.
#[derive(Clone)]
pub struct ConsoleContext {
    pub api: Arc<dyn ConsoleApi>,
    pub prefs: Arc<dyn Prefs>,
    pub namespace: String,
}

impl ConsoleContext {
    pub fn new(api: Arc<dyn ConsoleApi>, prefs: Arc<dyn Prefs>, namespace: impl Into<String>) -> Self {
        Self { api, prefs, namespace: namespace.into() }
    }
}

/// Pipeline-run loader parameters for a component (and optionally one version).
/// Runs created before the component itself are dropped.
pub(crate) fn component_run_params(namespace: &str, component: &Component, version: Option<&str>) -> LoaderParams {
    let mut params = LoaderParams::new(PIPELINE_RUN_GVK, Some(namespace)).with_label(labels::COMPONENT, &component.name);
    if let Some(v) = version {
        params = params.with_label(labels::COMPONENT_VERSION, v);
    }
    params.created_after = (component.creation_ts > 0).then_some(component.creation_ts);
    params
}

/// Seconds since epoch, for duration cells of running runs.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
