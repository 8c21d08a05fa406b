//! Component versions: the versions tab and a single version's overview.

use std::sync::Arc;

use conveyor_api::ConsoleApi;
use conveyor_core::{error_state, Component, ComponentVersion, ConsoleError, ConsoleResult, ErrorState, PipelineRun};
use conveyor_view::filter::empty_state;
use conveyor_view::EmptyState;
use serde::Serialize;
use tracing::{debug, warn};

use crate::builds::{latest_build_run, latest_successful_build_run};
use crate::ConsoleContext;

pub const NO_VERSIONS_MESSAGE: &str = "No versions found for this component.";

/// Version of `component` whose revision is `revision`, or `NotFound`.
pub fn component_version(component: &Component, revision: &str) -> ConsoleResult<ComponentVersion> {
    component
        .version(revision)
        .cloned()
        .ok_or_else(|| ConsoleError::NotFound(format!("component version '{}' of {}", revision, component.name)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionRow {
    pub name: String,
    /// Build context directory within the repository.
    pub context: Option<String>,
    /// Branch or tag.
    pub git_revision: Option<String>,
    /// Most recent build run of this version.
    pub pipeline_run_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionsTabState {
    pub error: Option<ErrorState>,
    pub git_url: Option<String>,
    pub application: Option<String>,
    pub total: usize,
    pub rows: Vec<VersionRow>,
    pub empty: Option<EmptyState>,
}

/// Versions tab of a component, filtered by name.
pub struct VersionsTab {
    component: Option<Component>,
    error: Option<ErrorState>,
    versions: Vec<VersionRow>,
    name_filter: String,
}

impl VersionsTab {
    pub async fn open(ctx: &ConsoleContext, component: &str) -> Self {
        let comp = match ctx.api.get_component(&ctx.namespace, component).await {
            Ok(c) => c,
            Err(e) => {
                warn!(ns = %ctx.namespace, component = %component, error = %e, "versions: component fetch failed");
                return Self { component: None, error: Some(error_state(&e, "component")), versions: Vec::new(), name_filter: String::new() };
            }
        };
        match version_rows(ctx.api.clone(), &ctx.namespace, &comp).await {
            Ok(versions) => Self { component: Some(comp), error: None, versions, name_filter: String::new() },
            Err(e) => {
                warn!(ns = %ctx.namespace, component = %component, error = %e, "versions: build lookup failed");
                Self { component: Some(comp), error: Some(error_state(&e, "versions")), versions: Vec::new(), name_filter: String::new() }
            }
        }
    }

    pub fn set_filter(&mut self, name: impl Into<String>) {
        self.name_filter = name.into();
    }

    pub fn clear_filters(&mut self) {
        self.name_filter.clear();
    }

    pub fn state(&self) -> VersionsTabState {
        let needle = self.name_filter.to_lowercase();
        let rows: Vec<VersionRow> =
            self.versions.iter().filter(|v| needle.is_empty() || v.name.to_lowercase().contains(&needle)).cloned().collect();
        let empty = if self.error.is_none() { empty_state(self.versions.len(), rows.len(), !self.name_filter.is_empty()) } else { None };
        VersionsTabState {
            error: self.error.clone(),
            git_url: self.component.as_ref().and_then(|c| c.git_url()).map(|s| s.to_string()),
            application: self.component.as_ref().map(|c| c.spec.application.clone()).filter(|a| !a.is_empty()),
            total: self.versions.len(),
            rows,
            empty,
        }
    }
}

async fn version_rows(api: Arc<dyn ConsoleApi>, namespace: &str, component: &Component) -> ConsoleResult<Vec<VersionRow>> {
    let mut out = Vec::with_capacity(component.versions().len());
    for v in component.versions() {
        let latest = latest_build_run(api.clone(), namespace, &component.name, Some(&v.revision)).await?;
        out.push(VersionRow {
            name: v.name.clone(),
            context: v.context.clone().filter(|c| !c.is_empty()),
            git_revision: Some(v.revision.clone()).filter(|r| !r.is_empty()),
            pipeline_run_name: latest.map(|r| r.name),
        });
    }
    debug!(component = %component.name, versions = out.len(), "versions: rows built");
    Ok(out)
}

/// Details of one component version.
#[derive(Debug, Clone, Serialize)]
pub struct VersionOverview {
    pub name: String,
    /// Branch or tag; `-` when empty.
    pub revision: String,
    pub repo_url: Option<String>,
    /// Build pipeline name; `-` when none resolves.
    pub pipeline: String,
    pub latest_successful_build: Option<PipelineRun>,
}

impl VersionOverview {
    /// Load the overview. Errors come back as the state the page shows.
    pub async fn load(ctx: &ConsoleContext, component: &str, revision: &str) -> Result<Self, ErrorState> {
        let comp = ctx.api.get_component(&ctx.namespace, component).await.map_err(|e| error_state(&e, "Component version"))?;
        let subject = format!("Component version '{}'", revision);
        let version = component_version(&comp, revision).map_err(|e| error_state(&e, &subject))?;
        let latest = latest_successful_build_run(ctx.api.clone(), &ctx.namespace, &comp.name, Some(&version.revision))
            .await
            .map_err(|e| error_state(&e, &subject))?;
        Ok(Self {
            name: version.name.clone(),
            revision: if version.revision.is_empty() { "-".to_string() } else { version.revision.clone() },
            repo_url: comp.spec.source.as_ref().and_then(|s| s.url.clone()),
            pipeline: comp.pipeline_name(&version).unwrap_or("-").to_string(),
            latest_successful_build: latest,
        })
    }
}

#[cfg(test)]
mod tests {
    use conveyor_api::{MockApi, COMPONENT_GVK, PIPELINE_RUN_GVK};
    use conveyor_persist::MemoryStore;

    use super::*;
    use crate::fixtures;

    fn ctx() -> ConsoleContext {
        let mut comp = fixtures::component("frontend", "2024-01-01T00:00:00Z");
        comp["spec"]["source"]["url"] = serde_json::json!("https://github.com/acme/frontend");
        comp["spec"]["default-build-pipeline"] = serde_json::json!({ "push": { "pipelineref-by-name": "docker-build" } });
        let api = MockApi::new().with_object(COMPONENT_GVK, comp).with_object(
            PIPELINE_RUN_GVK,
            fixtures::run("fe-build-1", "aaa", "build", "frontend", ("True", "Completed"), "2024-03-01T10:00:00Z"),
        );
        ConsoleContext::new(Arc::new(api), Arc::new(MemoryStore::new()), "team-a")
    }

    #[test]
    fn missing_revision_is_not_found() {
        let comp = Component::from_raw(&fixtures::component("frontend", "2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(component_version(&comp, "main").unwrap().name, "Main");
        let err = component_version(&comp, "nope").unwrap_err();
        assert_eq!(err.code(), Some(404));
    }

    #[tokio::test]
    async fn tab_lists_versions_with_latest_build() {
        let mut tab = VersionsTab::open(&ctx(), "frontend").await;
        let st = tab.state();
        assert_eq!(st.total, 2);
        assert_eq!(st.git_url.as_deref(), Some("https://github.com/acme/frontend"));
        assert_eq!(st.rows[0].pipeline_run_name.as_deref(), Some("fe-build-1"));
        assert_eq!(st.rows[1].pipeline_run_name, None);

        tab.set_filter("RELEASE");
        assert_eq!(tab.state().rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["Release 1"]);
        tab.set_filter("zzz");
        assert_eq!(tab.state().empty, Some(EmptyState::NoResults));
        tab.clear_filters();
        assert_eq!(tab.state().rows.len(), 2);
    }

    #[tokio::test]
    async fn tab_for_missing_component_shows_component_error() {
        let ctx = ConsoleContext::new(Arc::new(MockApi::new()), Arc::new(MemoryStore::new()), "team-a");
        let st = VersionsTab::open(&ctx, "ghost").await.state();
        assert_eq!(st.error.map(|e| e.message), Some("component not found.".to_string()));
    }

    #[tokio::test]
    async fn overview_resolves_pipeline_and_latest_build() {
        let ov = VersionOverview::load(&ctx(), "frontend", "main").await.unwrap();
        assert_eq!(ov.name, "Main");
        assert_eq!(ov.revision, "main");
        assert_eq!(ov.repo_url.as_deref(), Some("https://github.com/acme/frontend"));
        assert_eq!(ov.pipeline, "docker-build");
        assert_eq!(ov.latest_successful_build.map(|r| r.name).as_deref(), Some("fe-build-1"));

        let err = VersionOverview::load(&ctx(), "frontend", "v9").await.unwrap_err();
        assert_eq!(err.code, Some(404));
        assert!(err.message.contains("Component version 'v9'"));
    }
}
