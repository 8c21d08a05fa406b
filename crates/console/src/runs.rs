//! Pipeline runs list view for one component (optionally one version).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use conveyor_api::ConsoleApi;
use conveyor_core::columns::PIPELINE_RUN_COLUMNS;
use conveyor_core::labels::pipeline_type;
use conveyor_core::{error_state, Component, ConsoleError, ErrorState, PipelineRun};
use conveyor_persist::ColumnVisibility;
use conveyor_store::{spawn_loader, LoaderHandle, LoaderParams};
use conveyor_view::filter::{empty_state, option_counts, status_options};
use conveyor_view::paging::{self, PageFlags};
use conveyor_view::{run_rows, EmptyState, FilterKey, FilterState, SortDirection, SortState, ViewPhase};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{component_run_params, ConsoleContext};

const SUBJECT: &str = "pipeline runs";

#[derive(Debug, Clone, Serialize)]
pub struct RunsViewState {
    pub phase: ViewPhase,
    pub loaded: bool,
    pub error: Option<ErrorState>,
    pub total: usize,
    pub rows: Vec<PipelineRun>,
    pub row_count: usize,
    pub has_next_page: bool,
    pub is_fetching_next_page: bool,
    pub is_filtered: bool,
    pub empty: Option<EmptyState>,
    pub status_options: BTreeMap<String, usize>,
    pub type_options: BTreeMap<String, usize>,
    /// Only offered when the view is not scoped to one version.
    pub version_options: Option<BTreeMap<String, usize>>,
    /// Revision → version name, for labelling version options.
    pub version_labels: Option<BTreeMap<String, String>>,
    pub visible_columns: BTreeSet<String>,
    #[serde(skip)]
    auto_advance: bool,
}

pub struct PipelineRunsListView {
    api: Arc<dyn ConsoleApi>,
    namespace: String,
    component_name: String,
    version: Option<String>,
    component: Option<Component>,
    component_error: Option<ConsoleError>,
    loader: Option<LoaderHandle<PipelineRun>>,
    filter: FilterState,
    sort: Option<SortState>,
    columns: ColumnVisibility,
}

impl PipelineRunsListView {
    /// Fetch the component; the run loader only starts once it is known.
    pub async fn open(ctx: &ConsoleContext, component: &str, version: Option<&str>) -> Self {
        let mut view = Self {
            api: ctx.api.clone(),
            namespace: ctx.namespace.clone(),
            component_name: component.to_string(),
            version: version.map(|s| s.to_string()),
            component: None,
            component_error: None,
            loader: None,
            filter: FilterState::default(),
            sort: None,
            columns: ColumnVisibility::load(PIPELINE_RUN_COLUMNS, ctx.prefs.clone()),
        };
        match ctx.api.get_component(&ctx.namespace, component).await {
            Ok(c) => {
                view.component = Some(c);
                view.restart_loader();
            }
            Err(e) => {
                warn!(ns = %ctx.namespace, component = %component, error = %e, "runs: component fetch failed");
                view.component_error = Some(e);
            }
        }
        view
    }

    fn params(&self, component: &Component) -> LoaderParams {
        let mut params = component_run_params(&self.namespace, component, self.version.as_deref());
        let name = self.filter.text.trim();
        params.name_filter = (!name.is_empty()).then(|| name.to_string());
        params
    }

    /// The name filter is part of the loader selector, so changing it starts over.
    fn restart_loader(&mut self) {
        let Some(component) = self.component.as_ref() else { return };
        let params = self.params(component);
        info!(ns = %self.namespace, component = %self.component_name, name = ?params.name_filter, "runs: loading");
        // Dropping the old handle stops its task and discards any in-flight page.
        self.loader = Some(spawn_loader(self.api.clone(), params));
    }

    pub fn component(&self) -> Option<&Component> { self.component.as_ref() }
    pub fn filter(&self) -> &FilterState { &self.filter }
    pub fn sort(&self) -> Option<SortState> { self.sort }
    pub fn columns(&self) -> &ColumnVisibility { &self.columns }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.filter.text {
            return;
        }
        self.filter.set_text(text);
        self.restart_loader();
    }

    pub fn set_values<I, S>(&mut self, key: FilterKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.set_values(key, values);
    }

    pub fn toggle(&mut self, key: FilterKey, value: &str) {
        self.filter.toggle(key, value);
    }

    pub fn clear_filters(&mut self) {
        let had_text = !self.filter.text.is_empty();
        self.filter.clear();
        if had_text {
            self.restart_loader();
        }
    }

    pub fn sort_by(&mut self, key: &str, direction: SortDirection) -> bool {
        match PIPELINE_RUN_COLUMNS.index_of(key) {
            Some(i) if PIPELINE_RUN_COLUMNS.defs[i].sortable => {
                self.sort = Some(SortState::new(i, direction));
                true
            }
            _ => false,
        }
    }

    fn version_options(&self, runs: &[PipelineRun]) -> (Option<BTreeMap<String, usize>>, Option<BTreeMap<String, String>>) {
        if self.version.is_some() {
            return (None, None);
        }
        let versions = self.component.as_ref().map(|c| c.versions()).unwrap_or(&[]);
        let known: Vec<&str> = versions.iter().map(|v| v.revision.as_str()).collect();
        let counts = option_counts(runs, &known, |r| r.component_version().map(|s| s.to_string()), None::<fn(&PipelineRun) -> bool>);
        let labels = versions.iter().map(|v| (v.revision.clone(), v.name.clone())).collect();
        (Some(counts), Some(labels))
    }

    pub fn state(&self) -> RunsViewState {
        let visible_columns = self.columns.get();
        let snap = self.loader.as_ref().map(|l| l.current()).unwrap_or_default();
        if let Some(err) = self.component_error.as_ref().or(snap.error.as_ref()) {
            return RunsViewState {
                phase: ViewPhase::Error,
                loaded: true,
                error: Some(error_state(err, SUBJECT)),
                total: 0,
                rows: Vec::new(),
                row_count: 0,
                has_next_page: false,
                is_fetching_next_page: false,
                is_filtered: self.filter.is_filtered(self.version.is_some()),
                empty: None,
                status_options: BTreeMap::new(),
                type_options: BTreeMap::new(),
                version_options: None,
                version_labels: None,
                visible_columns,
                auto_advance: false,
            };
        }

        let out = run_rows(&snap.items, Some(self.component_name.as_str()), &self.filter, self.sort);
        let flags = PageFlags {
            loaded: snap.loaded,
            has_next_page: snap.has_next_page,
            is_fetching_next_page: snap.is_fetching_next_page,
            errored: false,
        };
        let no_pre = None::<fn(&PipelineRun) -> bool>;
        let status_options = option_counts(&out.runs, &status_options(), |r| Some(r.status.as_str().to_string()), no_pre);
        let type_options = option_counts(&out.runs, &pipeline_type::ALL, |r| r.pipeline_type().map(|s| s.to_string()), no_pre);
        let (version_options, version_labels) = self.version_options(&out.runs);
        let is_filtered = self.filter.is_filtered(self.version.is_some());
        let loaded = snap.is_fetching_next_page || paging::view_loaded(flags, out.runs.len());
        let empty = if loaded && !snap.is_fetching_next_page {
            empty_state(out.runs.len(), out.rows.len(), is_filtered)
        } else {
            None
        };
        RunsViewState {
            phase: paging::phase(flags, out.runs.len()),
            loaded,
            error: None,
            total: out.runs.len(),
            row_count: paging::row_count(out.rows.len(), snap.has_next_page),
            rows: out.rows,
            has_next_page: snap.has_next_page,
            is_fetching_next_page: snap.is_fetching_next_page,
            is_filtered,
            empty,
            status_options,
            type_options,
            version_options,
            version_labels,
            visible_columns,
            auto_advance: paging::should_auto_advance(flags, out.runs.len()),
        }
    }

    pub fn refresh(&self) -> RunsViewState {
        let st = self.state();
        if st.auto_advance {
            if let Some(loader) = self.loader.as_ref() {
                debug!(component = %self.component_name, "runs: empty page; fetching next");
                loader.fetch_next_page();
            }
        }
        st
    }

    pub fn on_rows_rendered(&self, stop_index: usize) -> bool {
        let Some(loader) = self.loader.as_ref() else { return false };
        let snap = loader.current();
        let flags = PageFlags {
            loaded: snap.loaded,
            has_next_page: snap.has_next_page,
            is_fetching_next_page: snap.is_fetching_next_page,
            errored: snap.error.is_some(),
        };
        let filtered = self.state().rows.len();
        let more = paging::should_request_more(flags, stop_index, filtered);
        if more {
            loader.fetch_next_page();
        }
        more
    }

    pub async fn settle(&self) -> RunsViewState {
        if let Some(loader) = self.loader.as_ref() {
            let mut rx = loader.subscribe_epoch();
            loop {
                let st = self.refresh();
                if st.error.is_some() || (st.loaded && !st.is_fetching_next_page) {
                    return st;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        self.refresh()
    }

    pub async fn load_more(&self) -> RunsViewState {
        if let Some(loader) = self.loader.as_ref() {
            let before = loader.current();
            if before.error.is_none() && before.has_next_page && !before.is_fetching_next_page {
                loader.fetch_next_page();
                let epoch = before.epoch;
                loader.wait_for(|s| s.error.is_some() || (s.epoch > epoch && !s.is_fetching_next_page)).await;
            }
        }
        self.settle().await
    }
}
