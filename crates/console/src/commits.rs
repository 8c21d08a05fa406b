//! Commits list view: build runs of one component grouped by commit SHA.

use std::collections::{BTreeMap, BTreeSet};

use conveyor_core::columns::{COMMIT_COLUMNS, COMMIT_COMMITTED_AT};
use conveyor_core::{error_state, Commit, Component, ConsoleError, ErrorState, PipelineRun, RunStatus};
use conveyor_persist::ColumnVisibility;
use conveyor_store::{spawn_loader, LoaderHandle, LoaderSnapshot};
use conveyor_view::filter::{empty_state, option_counts, status_options};
use conveyor_view::paging::{self, PageFlags};
use conveyor_view::{commit_rows, EmptyState, FilterKey, FilterState, SortDirection, SortState, ViewPhase};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{component_run_params, ConsoleContext};

const SUBJECT: &str = "commits";

/// One rendered commit with its aggregate status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRow {
    #[serde(flatten)]
    pub commit: Commit,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitsViewState {
    pub phase: ViewPhase,
    pub loaded: bool,
    pub error: Option<ErrorState>,
    /// Commits before filtering.
    pub total: usize,
    pub rows: Vec<CommitRow>,
    pub row_count: usize,
    pub has_next_page: bool,
    pub is_fetching_next_page: bool,
    pub empty: Option<EmptyState>,
    pub status_options: BTreeMap<String, usize>,
    pub visible_columns: BTreeSet<String>,
    #[serde(skip)]
    auto_advance: bool,
}

pub struct CommitsListView {
    component_name: String,
    version: Option<String>,
    component: Option<Component>,
    component_error: Option<ConsoleError>,
    loader: Option<LoaderHandle<PipelineRun>>,
    filter: FilterState,
    sort: SortState,
    columns: ColumnVisibility,
}

impl CommitsListView {
    /// Fetch the component, then start loading its pipeline runs.
    pub async fn open(ctx: &ConsoleContext, component: &str, version: Option<&str>) -> Self {
        let mut view = Self {
            component_name: component.to_string(),
            version: version.map(|s| s.to_string()),
            component: None,
            component_error: None,
            loader: None,
            filter: FilterState::default(),
            sort: SortState::default_for(&COMMIT_COLUMNS, COMMIT_COMMITTED_AT),
            columns: ColumnVisibility::load(COMMIT_COLUMNS, ctx.prefs.clone()),
        };
        match ctx.api.get_component(&ctx.namespace, component).await {
            Ok(c) => {
                let params = component_run_params(&ctx.namespace, &c, version);
                info!(ns = %ctx.namespace, component = %component, version = ?version, "commits: loading runs");
                view.loader = Some(spawn_loader(ctx.api.clone(), params));
                view.component = Some(c);
            }
            Err(e) => {
                warn!(ns = %ctx.namespace, component = %component, error = %e, "commits: component fetch failed");
                view.component_error = Some(e);
            }
        }
        view
    }

    pub fn component(&self) -> Option<&Component> { self.component.as_ref() }
    pub fn version(&self) -> Option<&str> { self.version.as_deref() }
    pub fn filter(&self) -> &FilterState { &self.filter }
    pub fn sort(&self) -> SortState { self.sort }
    pub fn columns(&self) -> &ColumnVisibility { &self.columns }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.filter.set_text(text);
    }

    pub fn set_statuses<I, S>(&mut self, statuses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.set_values(FilterKey::Status, statuses);
    }

    pub fn toggle_status(&mut self, status: &str) {
        self.filter.toggle(FilterKey::Status, status);
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    /// Header click. Returns false for unknown or unsortable columns.
    pub fn sort_by(&mut self, key: &str, direction: SortDirection) -> bool {
        match COMMIT_COLUMNS.index_of(key) {
            Some(i) if COMMIT_COLUMNS.defs[i].sortable => {
                self.sort.set(i, direction);
                true
            }
            _ => false,
        }
    }

    fn snapshot(&self) -> Option<std::sync::Arc<LoaderSnapshot<PipelineRun>>> {
        self.loader.as_ref().map(|l| l.current())
    }

    /// Recompute the view from the current loader snapshot.
    pub fn state(&self) -> CommitsViewState {
        let visible_columns = self.columns.get();
        let snap = self.snapshot().unwrap_or_default();
        let error = self.component_error.as_ref().or(snap.error.as_ref());
        if let Some(err) = error {
            return CommitsViewState {
                phase: ViewPhase::Error,
                loaded: true,
                error: Some(error_state(err, SUBJECT)),
                total: 0,
                rows: Vec::new(),
                row_count: 0,
                has_next_page: false,
                is_fetching_next_page: false,
                empty: None,
                status_options: BTreeMap::new(),
                visible_columns,
                auto_advance: false,
            };
        }

        let components = [self.component_name.as_str()];
        let out = commit_rows(&snap.items, &components, &self.filter, self.sort);
        let build_runs = snap.items.iter().filter(|r| r.is_build()).count();
        let flags = PageFlags {
            loaded: snap.loaded,
            has_next_page: snap.has_next_page,
            is_fetching_next_page: snap.is_fetching_next_page,
            errored: false,
        };
        let loaded = paging::view_loaded(flags, build_runs);
        let status_of = |c: &Commit| out.statuses.get(&c.sha).copied().unwrap_or(RunStatus::Unknown);
        let status_options = option_counts(
            &out.commits,
            &status_options(),
            |c| Some(status_of(c).as_str().to_string()),
            None::<fn(&Commit) -> bool>,
        );
        let rows: Vec<CommitRow> = out.rows.iter().map(|c| CommitRow { commit: c.clone(), status: status_of(c) }).collect();
        let empty = if loaded {
            empty_state(out.commits.len(), rows.len(), self.filter.is_filtered(self.version.is_some()))
        } else {
            None
        };
        CommitsViewState {
            phase: paging::phase(flags, build_runs),
            loaded,
            error: None,
            total: out.commits.len(),
            row_count: paging::row_count(rows.len(), snap.has_next_page),
            rows,
            has_next_page: snap.has_next_page,
            is_fetching_next_page: snap.is_fetching_next_page,
            empty,
            status_options,
            visible_columns,
            auto_advance: paging::should_auto_advance(flags, build_runs),
        }
    }

    /// Recompute and, when the loaded pages hold no build runs but more exist,
    /// ask for the next page.
    pub fn refresh(&self) -> CommitsViewState {
        let st = self.state();
        if st.auto_advance {
            if let Some(loader) = self.loader.as_ref() {
                counter!("view_auto_advance_total", 1u64);
                debug!(component = %self.component_name, "commits: no build runs yet; fetching next page");
                loader.fetch_next_page();
            }
        }
        st
    }

    /// The renderer showed rows up to `stop_index`. Returns whether a page was requested.
    pub fn on_rows_rendered(&self, stop_index: usize) -> bool {
        let Some(loader) = self.loader.as_ref() else { return false };
        let st = self.state();
        let snap = loader.current();
        let flags = PageFlags {
            loaded: snap.loaded,
            has_next_page: snap.has_next_page,
            is_fetching_next_page: snap.is_fetching_next_page,
            errored: st.error.is_some(),
        };
        let more = paging::should_request_more(flags, stop_index, st.rows.len());
        if more {
            loader.fetch_next_page();
        }
        more
    }

    /// Drive the view until it reports loaded (auto-advancing as needed) or errors.
    pub async fn settle(&self) -> CommitsViewState {
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

    /// Fetch one more page (when the paging guard allows it) and settle again.
    pub async fn load_more(&self) -> CommitsViewState {
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use conveyor_api::{ConsoleApi, ListRequest, MockApi, PageSource, RawPage, ResourceRef, COMPONENT_GVK};
    use conveyor_core::columns::COMMIT_STATUS;
    use conveyor_core::ConsoleResult;
    use conveyor_persist::MemoryStore;
    use tokio::sync::Notify;

    use super::*;
    use crate::fixtures;

    fn ctx(api: MockApi) -> ConsoleContext {
        ConsoleContext::new(Arc::new(api), Arc::new(MemoryStore::new()), "team-a")
    }

    #[tokio::test]
    async fn groups_build_runs_by_commit() {
        let view = CommitsListView::open(&ctx(fixtures::api()), "frontend", None).await;
        let st = view.settle().await;
        assert!(st.loaded);
        assert_eq!(st.phase, ViewPhase::Loaded { empty: false, has_more: false });
        // fe-old predates the component and is dropped by the loader
        let shas: Vec<_> = st.rows.iter().map(|r| r.commit.sha.as_str()).collect();
        assert_eq!(shas, vec!["bbb", "aaa"]);
        // the failed test run still counts towards commit aaa
        assert_eq!(st.rows[1].status, RunStatus::Failed);
        assert_eq!(st.status_options.get("Failed"), Some(&1));
        assert_eq!(st.status_options.get("Succeeded"), Some(&0));
        assert_eq!(st.row_count, 2);
    }

    #[tokio::test]
    async fn filters_and_clear() {
        let mut view = CommitsListView::open(&ctx(fixtures::api()), "frontend", None).await;
        view.settle().await;
        view.set_statuses(["Running"]);
        let st = view.state();
        assert_eq!(st.rows.len(), 1);
        view.set_text("nothing-matches");
        let st = view.state();
        assert_eq!(st.empty, Some(EmptyState::NoResults));
        view.clear_filters();
        assert_eq!(view.filter(), &FilterState::default());
        assert_eq!(view.state().rows.len(), 2);
    }

    #[tokio::test]
    async fn status_header_sorts_by_aggregate() {
        let mut view = CommitsListView::open(&ctx(fixtures::api()), "frontend", None).await;
        view.settle().await;
        assert!(view.sort_by(COMMIT_STATUS, SortDirection::Asc));
        let st = view.state();
        assert_eq!(st.rows.first().map(|r| r.status), Some(RunStatus::Failed));
        assert!(!view.sort_by("component", SortDirection::Asc));
    }

    #[tokio::test]
    async fn missing_component_is_an_error_state() {
        let view = CommitsListView::open(&ctx(MockApi::new()), "nope", None).await;
        let st = view.settle().await;
        let err = st.error.expect("error state");
        assert_eq!(err.code, Some(404));
        assert!(err.message.contains("commits"));
    }

    #[tokio::test]
    async fn empty_first_page_advances_automatically() {
        let mut api = MockApi::new().with_object(COMPONENT_GVK, fixtures::component("frontend", "2024-01-01T00:00:00Z"));
        api = api.with_pages(vec![
            vec![fixtures::run("fe-test-1", "aaa", "test", "frontend", ("True", "Completed"), "2024-03-01T10:00:00Z")],
            vec![],
            vec![fixtures::run("fe-build-1", "aaa", "build", "frontend", ("True", "Completed"), "2024-03-01T11:00:00Z")],
        ]);
        let api = Arc::new(api);
        let ctx = ConsoleContext::new(api.clone(), Arc::new(MemoryStore::new()), "team-a");
        let view = CommitsListView::open(&ctx, "frontend", None).await;
        let st = view.settle().await;
        assert!(st.loaded);
        assert_eq!(st.rows.len(), 1);
        assert_eq!(st.empty, None);
        assert_eq!(api.list_calls(), 3);
    }

    /// Serves the first page at once and holds every continuation until released.
    struct HeldPages {
        inner: MockApi,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl PageSource for HeldPages {
        async fn fetch_page(&self, req: &ListRequest, cont: Option<String>) -> ConsoleResult<RawPage> {
            if cont.is_some() {
                self.release.notified().await;
            }
            self.inner.fetch_page(req, cont).await
        }
    }

    #[async_trait::async_trait]
    impl ConsoleApi for HeldPages {
        async fn get_raw(&self, reference: ResourceRef) -> ConsoleResult<serde_json::Value> {
            self.inner.get_raw(reference).await
        }
    }

    #[tokio::test]
    async fn no_data_is_not_shown_while_advancing() {
        let inner = MockApi::new()
            .with_object(COMPONENT_GVK, fixtures::component("frontend", "2024-01-01T00:00:00Z"))
            .with_pages(vec![
                vec![fixtures::run("fe-test-1", "aaa", "test", "frontend", ("True", "Completed"), "2024-03-01T10:00:00Z")],
                vec![fixtures::run("fe-build-1", "aaa", "build", "frontend", ("True", "Completed"), "2024-03-01T11:00:00Z")],
            ]);
        let api = Arc::new(HeldPages { inner, release: Notify::new() });
        let ctx = ConsoleContext::new(api.clone(), Arc::new(MemoryStore::new()), "team-a");
        let view = CommitsListView::open(&ctx, "frontend", None).await;

        let st = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let st = view.refresh();
                if st.is_fetching_next_page {
                    return st;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("continuation fetch in flight");
        assert!(!st.loaded);
        assert_ne!(st.empty, Some(EmptyState::NoData));
        assert!(st.rows.is_empty());

        // repeated refreshes during the fetch keep the same picture
        for _ in 0..3 {
            let st = view.refresh();
            assert!(!st.loaded);
            assert_ne!(st.empty, Some(EmptyState::NoData));
        }

        api.release.notify_one();
        let st = view.settle().await;
        assert!(st.loaded);
        assert_eq!(st.rows.len(), 1);
        assert_eq!(api.inner.list_calls(), 2);
    }
}
