//! Latest build lookups for a component.

use std::sync::Arc;

use conveyor_api::{ConsoleApi, PIPELINE_RUN_GVK};
use conveyor_core::labels::{self, event_type, pipeline_type};
use conveyor_core::{ConsoleResult, PipelineRun, RunStatus};
use conveyor_store::{spawn_loader, LoaderParams};
use tracing::debug;

fn build_params(namespace: &str, component: &str) -> LoaderParams {
    LoaderParams::new(PIPELINE_RUN_GVK, Some(namespace))
        .with_label(labels::PIPELINE_TYPE, pipeline_type::BUILD)
        .with_label(labels::COMPONENT, component)
}

async fn first_run(api: Arc<dyn ConsoleApi>, mut params: LoaderParams) -> ConsoleResult<Option<PipelineRun>> {
    params.limit = Some(1);
    params.page_size = 1;
    let loader = spawn_loader::<PipelineRun, _>(api, params);
    let snap = loader.settled().await;
    match snap.error.clone() {
        Some(e) => Err(e),
        None => Ok(snap.items.first().cloned()),
    }
}

/// Most recent build run of a component, optionally for one version.
pub async fn latest_build_run(
    api: Arc<dyn ConsoleApi>,
    namespace: &str,
    component: &str,
    version: Option<&str>,
) -> ConsoleResult<Option<PipelineRun>> {
    let mut params = build_params(namespace, component);
    if let Some(v) = version {
        params = params.with_label(labels::COMPONENT_VERSION, v);
    }
    first_run(api, params).await
}

/// Most recent build run triggered by a push.
pub async fn latest_push_build_run(api: Arc<dyn ConsoleApi>, namespace: &str, component: &str) -> ConsoleResult<Option<PipelineRun>> {
    let params = build_params(namespace, component).with_label(labels::COMMIT_EVENT_TYPE_LABEL, event_type::PUSH);
    first_run(api, params).await
}

/// First succeeded build run, walking pages until one shows up or pages run out.
pub async fn latest_successful_build_run(
    api: Arc<dyn ConsoleApi>,
    namespace: &str,
    component: &str,
    version: Option<&str>,
) -> ConsoleResult<Option<PipelineRun>> {
    let mut params = build_params(namespace, component);
    if let Some(v) = version {
        params = params.with_label(labels::COMPONENT_VERSION, v);
    }
    let loader = spawn_loader::<PipelineRun, _>(api, params);
    let mut snap = loader.settled().await;
    loop {
        if let Some(e) = snap.error.clone() {
            return Err(e);
        }
        if let Some(run) = snap.items.iter().find(|r| r.status == RunStatus::Succeeded) {
            return Ok(Some(run.clone()));
        }
        if !snap.has_next_page {
            return Ok(None);
        }
        debug!(component = %component, seen = snap.items.len(), "no successful build yet; next page");
        let epoch = snap.epoch;
        loader.fetch_next_page();
        snap = loader.wait_for(|s| s.error.is_some() || (s.epoch > epoch && !s.is_fetching_next_page)).await;
    }
}
