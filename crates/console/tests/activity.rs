use std::sync::Arc;

use conveyor_api::{MockApi, COMPONENT_GVK, PIPELINE_RUN_GVK};
use conveyor_console::table::{render, Cells};
use conveyor_console::{ActivityTabs, CommitsListView, ConsoleContext, PipelineRunsListView};
use conveyor_core::columns::{COMMIT_BRANCH, COMMIT_COLUMNS, RUN_VERSION};
use conveyor_core::routes::{resolve, Page};
use conveyor_persist::{MemoryStore, Prefs};

fn run(name: &str, sha: &str, kind: &str, start: &str) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "name": name,
            "namespace": "team-a",
            "creationTimestamp": start,
            "labels": {
                "pipelinesascode.tekton.dev/sha": sha,
                "pipelines.appstudio.openshift.io/type": kind,
                "appstudio.openshift.io/component": "frontend",
                "pipelinesascode.tekton.dev/pull-request": "42"
            }
        },
        "status": { "startTime": start, "conditions": [{ "type": "Succeeded", "status": "True", "reason": "Completed" }] }
    })
}

fn context(prefs: Arc<dyn Prefs>) -> ConsoleContext {
    let api = MockApi::new()
        .with_object(
            COMPONENT_GVK,
            serde_json::json!({
                "metadata": { "name": "frontend", "namespace": "team-a", "creationTimestamp": "2024-01-01T00:00:00Z" },
                "spec": { "componentName": "frontend", "application": "shop" }
            }),
        )
        .with_objects(
            PIPELINE_RUN_GVK,
            [
                run("fe-build-1", "aaa", "build", "2024-03-01T10:00:00Z"),
                run("fe-build-2", "bbb", "build", "2024-03-02T10:00:00Z"),
                run("fe-test-1", "bbb", "test", "2024-03-02T11:00:00Z"),
            ],
        );
    ConsoleContext::new(Arc::new(api), prefs, "team-a")
}

#[tokio::test]
async fn route_tab_selects_view_and_is_remembered() {
    let prefs: Arc<dyn Prefs> = Arc::new(MemoryStore::new());
    let ctx = context(prefs.clone());

    let (page, params) = resolve("/ns/team-a/components/frontend/activity/pipelineruns").expect("route");
    assert_eq!(page, Page::ComponentActivityV2);
    let component = params.component_name.clone().unwrap_or_default();
    let tabs = ActivityTabs::new(prefs.clone(), "team-a", &component);
    let res = tabs.resolve(params.activity_tab.as_deref());
    assert_eq!(res.current.key, "pipelineruns");

    let view = PipelineRunsListView::open(&ctx, &component, None).await;
    let st = view.settle().await;
    assert_eq!(st.rows.len(), 3);

    // coming back without a tab segment goes to the remembered tab
    let (_, params) = resolve("/ns/team-a/components/frontend/activity").expect("route");
    let res = tabs.resolve(params.activity_tab.as_deref());
    let nav = res.redirect.expect("redirect");
    assert!(nav.replace);
    assert_eq!(nav.path, "/ns/team-a/components/frontend/activity/pipelineruns");
}

#[tokio::test]
async fn column_choices_survive_reopening_views() {
    let prefs: Arc<dyn Prefs> = Arc::new(MemoryStore::new());
    let ctx = context(prefs.clone());

    let commits = CommitsListView::open(&ctx, "frontend", None).await;
    commits.columns().toggle(COMMIT_BRANCH);
    let runs = PipelineRunsListView::open(&ctx, "frontend", None).await;
    runs.columns().toggle(RUN_VERSION);
    drop(commits);
    drop(runs);

    let commits = CommitsListView::open(&ctx, "frontend", None).await;
    let st = commits.settle().await;
    assert!(!st.visible_columns.contains(COMMIT_BRANCH));
    let runs = PipelineRunsListView::open(&ctx, "frontend", None).await;
    assert!(runs.columns().is_visible(RUN_VERSION));

    let text = render(&COMMIT_COLUMNS, &st.visible_columns, &st.rows, st.has_next_page, 0);
    assert!(!text.contains("BRANCH"));
    assert_eq!(text.lines().count(), 1 + st.rows.len());
    let first = st.rows.first().expect("a commit");
    assert_eq!(first.cell("component", 0), "frontend");
}

#[tokio::test]
async fn pull_request_text_filter_matches() {
    let ctx = context(Arc::new(MemoryStore::new()));
    let mut commits = CommitsListView::open(&ctx, "frontend", None).await;
    commits.settle().await;
    commits.set_text("#42");
    assert_eq!(commits.state().rows.len(), 2);
    commits.set_text("#43");
    assert!(commits.state().rows.is_empty());
}
