use conveyor_core::columns::{COMMIT_COLUMNS, COMMIT_STATUS, PIPELINE_RUN_COLUMNS, RUN_NAME};
use conveyor_core::{PipelineRun, RunStatus};
use conveyor_view::{commit_rows, run_rows, FilterKey, FilterState, SortDirection, SortState};

fn run_raw(name: &str, sha: &str, kind: &str, component: &str, cond: (&str, &str), start: &str) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "name": name,
            "namespace": "team-a",
            "creationTimestamp": start,
            "labels": {
                "pipelinesascode.tekton.dev/sha": sha,
                "pipelines.appstudio.openshift.io/type": kind,
                "appstudio.openshift.io/component": component,
                "pipelinesascode.tekton.dev/pull-request": "42"
            },
            "annotations": { "pipelinesascode.tekton.dev/sha-title": format!("change {}", sha) }
        },
        "status": {
            "startTime": start,
            "conditions": [{ "type": "Succeeded", "status": cond.0, "reason": cond.1 }]
        }
    })
}

fn fixture() -> Vec<PipelineRun> {
    [
        run_raw("fe-build-1", "aaa", "build", "frontend", ("True", "Completed"), "2024-03-01T10:00:00Z"),
        run_raw("fe-build-2", "aaa", "build", "frontend", ("Unknown", "Running"), "2024-03-01T11:00:00Z"),
        run_raw("fe-test-1", "aaa", "test", "frontend", ("False", "Failed"), "2024-03-01T12:00:00Z"),
        run_raw("fe-build-3", "bbb", "build", "frontend", ("False", "Failed"), "2024-03-02T10:00:00Z"),
        run_raw("fe-build-4", "ccc", "build", "frontend", ("Weird", ""), "2024-03-03T10:00:00Z"),
        run_raw("be-build-1", "ddd", "build", "backend", ("True", "Completed"), "2024-03-04T10:00:00Z"),
    ]
    .iter()
    .map(|r| PipelineRun::from_raw(r).unwrap())
    .collect()
}

#[test]
fn commits_aggregate_over_all_runs_of_the_component() {
    let runs = fixture();
    let out = commit_rows(&runs, &["frontend"], &FilterState::default(), SortState::default_for(&COMMIT_COLUMNS, "committedAt"));
    // backend runs still produce a commit, but have no status in a frontend-scoped index
    assert_eq!(out.commits.len(), 4);
    // the failing test run belongs to commit aaa and dominates it
    assert_eq!(out.statuses.get("aaa"), Some(&RunStatus::Failed));
    assert_eq!(out.statuses.get("ccc"), Some(&RunStatus::Unknown));
    assert!(out.statuses.get("ddd").is_none());
    assert_eq!(out.rows.first().map(|c| c.sha.as_str()), Some("ddd"));
}

#[test]
fn filtered_rows_are_a_subset_satisfying_all_predicates() {
    let runs = fixture();
    let mut f = FilterState::default();
    f.set_text("#42");
    f.set_values(FilterKey::Status, ["Failed", "Unknown"]);
    let out = commit_rows(&runs, &["frontend"], &f, SortState::default_for(&COMMIT_COLUMNS, "committedAt"));
    assert!(out.rows.iter().all(|r| out.commits.contains(r)));
    let shas: Vec<_> = out.rows.iter().map(|c| c.sha.as_str()).collect();
    assert_eq!(shas, vec!["ddd", "ccc", "bbb", "aaa"]);
}

#[test]
fn status_sort_is_a_permutation_with_unknown_last() {
    let runs = fixture();
    let idx = COMMIT_COLUMNS.index_of(COMMIT_STATUS).unwrap();
    for dir in [SortDirection::Asc, SortDirection::Desc] {
        let out = commit_rows(&runs, &["frontend"], &FilterState::default(), SortState::new(idx, dir));
        assert_eq!(out.rows.len(), out.commits.len());
        let last_two: Vec<_> = out.rows[2..].iter().map(|c| c.sha.as_str()).collect();
        // ccc is explicitly Unknown, ddd has no status at all
        assert!(last_two.contains(&"ccc") && last_two.contains(&"ddd"), "{:?} {:?}", dir, last_two);
    }
}

#[test]
fn run_rows_default_order_and_filters() {
    let runs = fixture();
    let out = run_rows(&runs, Some("frontend"), &FilterState::default(), None);
    assert_eq!(out.runs.first().map(|r| r.name.as_str()), Some("be-build-1"));
    assert_eq!(out.rows.len(), 5);
    assert_eq!(out.rows.first().map(|r| r.name.as_str()), Some("fe-build-4"));

    let mut f = FilterState::default();
    f.set_values(FilterKey::Type, ["build"]);
    f.set_text("BUILD-1");
    let out = run_rows(&runs, Some("frontend"), &f, None);
    assert_eq!(out.rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["fe-build-1"]);

    let name_idx = PIPELINE_RUN_COLUMNS.index_of(RUN_NAME).unwrap();
    let out = run_rows(&runs, None, &FilterState::default(), Some(SortState::new(name_idx, SortDirection::Asc)));
    assert_eq!(out.rows.first().map(|r| r.name.as_str()), Some("be-build-1"));
    assert_eq!(out.rows.len(), runs.len());
}
