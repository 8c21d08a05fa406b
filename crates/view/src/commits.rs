//! Derived commit index: SHA → runs, and one aggregate status per commit.

use conveyor_core::labels;
use conveyor_core::{Commit, PipelineRun, RunStatus};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Commit SHA → aggregate status.
pub type StatusMap = FxHashMap<String, RunStatus>;

/// Reduce a group of runs to one status. Lowest rank wins; on equal ranks the
/// first run's status is kept. An empty group is `Unknown`.
pub fn aggregate_status<'a, I>(runs: I) -> RunStatus
where
    I: IntoIterator<Item = &'a PipelineRun>,
{
    let mut best = RunStatus::Unknown;
    for run in runs {
        if run.status.rank() < best.rank() {
            best = run.status;
        }
    }
    best
}

/// Group runs by commit SHA. Runs without a SHA are ignored.
#[derive(Debug, Default, Clone)]
pub struct CommitIndex {
    by_sha: FxHashMap<String, SmallVec<[PipelineRun; 4]>>,
}

impl CommitIndex {
    /// Index every run whose component is in `components` (all runs when empty).
    pub fn build(runs: &[PipelineRun], components: &[&str]) -> Self {
        let mut by_sha: FxHashMap<String, SmallVec<[PipelineRun; 4]>> = FxHashMap::default();
        for run in runs {
            if !components.is_empty() && !run.component().map(|c| components.contains(&c)).unwrap_or(false) {
                continue;
            }
            if let Some(sha) = run.commit_sha() {
                by_sha.entry(sha.to_string()).or_default().push(run.clone());
            }
        }
        metrics::gauge!("commit_index_shas", by_sha.len() as f64);
        Self { by_sha }
    }

    pub fn len(&self) -> usize { self.by_sha.len() }
    pub fn is_empty(&self) -> bool { self.by_sha.is_empty() }

    pub fn runs(&self, sha: &str) -> &[PipelineRun] {
        self.by_sha.get(sha).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn status_of(&self, sha: &str) -> RunStatus {
        aggregate_status(self.runs(sha))
    }

    pub fn statuses(&self) -> StatusMap {
        self.by_sha.iter().map(|(sha, runs)| (sha.clone(), aggregate_status(runs.iter()))).collect()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

fn commit_from_run(run: &PipelineRun, sha: &str) -> Commit {
    let branch = non_empty(run.annotation(labels::COMMIT_BRANCH_ANNOTATION))
        .or_else(|| non_empty(run.label(labels::COMMIT_BRANCH_LABEL)))
        .unwrap_or("");
    Commit {
        sha: sha.to_string(),
        sha_title: run.annotation(labels::COMMIT_SHA_TITLE_ANNOTATION).unwrap_or("").to_string(),
        branch: branch.trim_start_matches("refs/heads/").to_string(),
        user: run.label(labels::COMMIT_USER_LABEL).unwrap_or("").to_string(),
        pull_request_number: run.label(labels::PULL_REQUEST_NUMBER_LABEL).unwrap_or("").to_string(),
        event_type: run.event_type().unwrap_or("").to_string(),
        application: run.application().unwrap_or("").to_string(),
        components: run.component().map(|c| vec![c.to_string()]).unwrap_or_default(),
        creation_ts: run.creation_ts,
        pipeline_runs: vec![run.name.clone()],
    }
}

/// Commits built from *build* runs, unique by SHA, newest first.
///
/// Runs of the same commit merge their component names and run names; the commit
/// takes the latest creation time of its runs. Missing metadata is filled from
/// later runs of the same commit.
pub fn commits_from_runs(runs: &[PipelineRun]) -> Vec<Commit> {
    let mut order: Vec<String> = Vec::new();
    let mut by_sha: FxHashMap<String, Commit> = FxHashMap::default();
    for run in runs.iter().filter(|r| r.is_build()) {
        let Some(sha) = run.commit_sha() else { continue };
        match by_sha.get_mut(sha) {
            Some(commit) => {
                if let Some(c) = run.component() {
                    if !commit.components.iter().any(|x| x == c) {
                        commit.components.push(c.to_string());
                    }
                }
                commit.pipeline_runs.push(run.name.clone());
                commit.creation_ts = commit.creation_ts.max(run.creation_ts);
                let other = commit_from_run(run, sha);
                for (mine, theirs) in [
                    (&mut commit.sha_title, other.sha_title),
                    (&mut commit.branch, other.branch),
                    (&mut commit.user, other.user),
                    (&mut commit.pull_request_number, other.pull_request_number),
                    (&mut commit.event_type, other.event_type),
                    (&mut commit.application, other.application),
                ] {
                    if mine.is_empty() {
                        *mine = theirs;
                    }
                }
            }
            None => {
                order.push(sha.to_string());
                by_sha.insert(sha.to_string(), commit_from_run(run, sha));
            }
        }
    }
    let mut out: Vec<Commit> = order.into_iter().filter_map(|sha| by_sha.remove(&sha)).collect();
    out.sort_by(|a, b| b.creation_ts.cmp(&a.creation_ts));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, sha: &str, status: RunStatus, ts: i64) -> PipelineRun {
        PipelineRun {
            name: name.into(),
            namespace: Some("ns".into()),
            uid: None,
            creation_ts: ts,
            start_ts: Some(ts),
            completion_ts: None,
            labels: [
                (labels::COMMIT_LABEL.to_string(), sha.to_string()),
                (labels::PIPELINE_TYPE.to_string(), "build".to_string()),
                (labels::COMPONENT.to_string(), "frontend".to_string()),
            ]
            .into_iter()
            .collect(),
            annotations: Default::default(),
            status,
        }
    }

    #[test]
    fn groups_by_sha_and_aggregates() {
        let runs = vec![
            run("r1", "a", RunStatus::Succeeded, 1),
            run("r2", "a", RunStatus::Running, 2),
            run("r3", "b", RunStatus::Failed, 3),
        ];
        let idx = CommitIndex::build(&runs, &[]);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.status_of("a"), RunStatus::Running);
        assert_eq!(idx.status_of("b"), RunStatus::Failed);
        assert_eq!(idx.status_of("zzz"), RunStatus::Unknown);
    }

    #[test]
    fn failed_wins_and_empty_is_unknown() {
        let runs = vec![run("r1", "a", RunStatus::Running, 1), run("r2", "a", RunStatus::Failed, 2)];
        assert_eq!(aggregate_status(runs.iter()), RunStatus::Failed);
        assert_eq!(aggregate_status(std::iter::empty::<&PipelineRun>()), RunStatus::Unknown);
    }

    #[test]
    fn component_scope_excludes_other_components() {
        let mut other = run("r9", "c", RunStatus::Failed, 9);
        other.labels.retain(|kv| kv.0 != labels::COMPONENT);
        other.labels.push((labels::COMPONENT.to_string(), "backend".to_string()));
        let runs = vec![run("r1", "a", RunStatus::Succeeded, 1), other];
        let idx = CommitIndex::build(&runs, &["frontend"]);
        assert_eq!(idx.len(), 1);
        assert!(idx.runs("c").is_empty());
    }

    #[test]
    fn commits_unique_newest_first_build_only() {
        let mut test_run = run("t1", "z", RunStatus::Succeeded, 100);
        test_run.labels.retain(|kv| kv.0 != labels::PIPELINE_TYPE);
        test_run.labels.push((labels::PIPELINE_TYPE.to_string(), "test".to_string()));
        let runs = vec![
            run("r1", "a", RunStatus::Succeeded, 1),
            run("r2", "a", RunStatus::Running, 5),
            run("r3", "b", RunStatus::Failed, 3),
            test_run,
        ];
        let commits = commits_from_runs(&runs);
        assert_eq!(commits.iter().map(|c| c.sha.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(commits[0].pipeline_runs, vec!["r1".to_string(), "r2".to_string()]);
        assert_eq!(commits[0].components, vec!["frontend".to_string()]);
        assert_eq!(commits[0].creation_ts, 5);
    }
}
