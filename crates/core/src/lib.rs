//! Conveyor core types: pipeline runs, commits, components and run statuses.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod columns;
pub mod component;
pub mod error;
pub mod labels;
pub mod routes;

pub use component::{BuildPipeline, Component, ComponentVersion, PipelineDefinition};
pub use error::{error_state, ConsoleError, ConsoleResult, ErrorState};

/// Kubernetes labels as key/value pairs.
pub type LabelPairs = SmallVec<[(String, String); 8]>;
/// Kubernetes annotations as key/value pairs.
pub type AnnotationPairs = SmallVec<[(String, String); 4]>;

/// Rank given to statuses without a priority. Sorts after every ranked status.
pub const UNKNOWN_STATUS_RANK: u16 = 999;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Running,
    Pending,
    Cancelled,
    Cancelling,
    Skipped,
    TestWarning,
    TestFailed,
    FailedToStart,
    PipelineNotStarted,
    Unknown,
}

impl RunStatus {
    pub const ALL: [RunStatus; 12] = [
        RunStatus::Succeeded,
        RunStatus::Failed,
        RunStatus::Running,
        RunStatus::Pending,
        RunStatus::Cancelled,
        RunStatus::Cancelling,
        RunStatus::Skipped,
        RunStatus::TestWarning,
        RunStatus::TestFailed,
        RunStatus::FailedToStart,
        RunStatus::PipelineNotStarted,
        RunStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::Running => "Running",
            RunStatus::Pending => "Pending",
            RunStatus::Cancelled => "Cancelled",
            RunStatus::Cancelling => "Cancelling",
            RunStatus::Skipped => "Skipped",
            RunStatus::TestWarning => "Test Warnings",
            RunStatus::TestFailed => "Test Failures",
            RunStatus::FailedToStart => "Failed to Start",
            RunStatus::PipelineNotStarted => "PipelineNotStarted",
            RunStatus::Unknown => "Unknown",
        }
    }

    /// Case-insensitive parse of a display string (as produced by [`RunStatus::as_str`]).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.iter().copied().find(|st| st.as_str().eq_ignore_ascii_case(s))
    }

    /// Priority used when aggregating and sorting; lower comes first. `None` for Unknown.
    pub fn priority(&self) -> Option<u16> {
        match self {
            RunStatus::Failed => Some(1),
            RunStatus::FailedToStart => Some(2),
            RunStatus::TestFailed => Some(3),
            RunStatus::Cancelling => Some(4),
            RunStatus::Cancelled => Some(5),
            RunStatus::Running => Some(6),
            RunStatus::Pending => Some(7),
            RunStatus::TestWarning => Some(8),
            RunStatus::Succeeded => Some(9),
            RunStatus::Skipped => Some(10),
            RunStatus::PipelineNotStarted => Some(11),
            RunStatus::Unknown => None,
        }
    }

    pub fn rank(&self) -> u16 {
        self.priority().unwrap_or(UNKNOWN_STATUS_RANK)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a run status from a Tekton PipelineRun object (its `Succeeded` condition).
pub fn run_status_from_raw(raw: &serde_json::Value) -> RunStatus {
    let spec_status = raw.pointer("/spec/status").and_then(|v| v.as_str()).unwrap_or("");
    let cond = raw
        .pointer("/status/conditions")
        .and_then(|v| v.as_array())
        .and_then(|cs| cs.iter().find(|c| c.get("type").and_then(|v| v.as_str()) == Some("Succeeded")));
    let Some(cond) = cond else {
        return match spec_status {
            "Cancelled" | "CancelledRunFinally" | "StoppedRunFinally" => RunStatus::Cancelling,
            _ => RunStatus::Pending,
        };
    };
    let reason = cond.get("reason").and_then(|v| v.as_str()).unwrap_or("");
    match cond.get("status").and_then(|v| v.as_str()).unwrap_or("") {
        "True" => RunStatus::Succeeded,
        "False" => match reason {
            "Cancelled" | "PipelineRunCancelled" | "StoppedRunFinally" | "CancelledRunFinally" => RunStatus::Cancelled,
            "CouldntGetPipeline" | "CreateRunFailed" | "PipelineValidationFailed" | "InvalidTaskResultReference" => {
                RunStatus::FailedToStart
            }
            _ => RunStatus::Failed,
        },
        "Unknown" => match reason {
            "Pending" | "PipelineRunPending" => RunStatus::Pending,
            "CancelledRunningFinally" | "StoppedRunningFinally" => RunStatus::Cancelling,
            _ => RunStatus::Running,
        },
        _ => RunStatus::Unknown,
    }
}

/// Parse an RFC 3339 timestamp into seconds since epoch.
pub fn parse_ts(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp())
}

fn pairs_from(raw: Option<&serde_json::Value>) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = raw
        .and_then(|v| v.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    out.sort();
    out
}

/// A Tekton pipeline run reduced to the fields the console lists and filters on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRun {
    pub name: String,
    pub namespace: Option<String>,
    pub uid: Option<String>,
    pub creation_ts: i64,
    pub start_ts: Option<i64>,
    pub completion_ts: Option<i64>,
    pub labels: LabelPairs,
    pub annotations: AnnotationPairs,
    pub status: RunStatus,
}

impl PipelineRun {
    /// Shape a raw object into a run. Fails only when `metadata.name` is missing.
    pub fn from_raw(raw: &serde_json::Value) -> ConsoleResult<Self> {
        let meta = raw.get("metadata");
        let name = meta
            .and_then(|m| m.get("name"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConsoleError::Parse("pipeline run without metadata.name".into()))?
            .to_string();
        let namespace = meta.and_then(|m| m.get("namespace")).and_then(|v| v.as_str()).map(|s| s.to_string());
        let uid = meta.and_then(|m| m.get("uid")).and_then(|v| v.as_str()).map(|s| s.to_string());
        let creation_ts = meta
            .and_then(|m| m.get("creationTimestamp"))
            .and_then(|v| v.as_str())
            .and_then(parse_ts)
            .unwrap_or(0);
        let start_ts = raw.pointer("/status/startTime").and_then(|v| v.as_str()).and_then(parse_ts);
        let completion_ts = raw.pointer("/status/completionTime").and_then(|v| v.as_str()).and_then(parse_ts);
        Ok(Self {
            name,
            namespace,
            uid,
            creation_ts,
            start_ts,
            completion_ts,
            labels: pairs_from(meta.and_then(|m| m.get("labels"))).into_iter().collect(),
            annotations: pairs_from(meta.and_then(|m| m.get("annotations"))).into_iter().collect(),
            status: run_status_from_raw(raw),
        })
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Commit SHA from the pipelines-as-code label, else the annotation.
    pub fn commit_sha(&self) -> Option<&str> {
        self.label(labels::COMMIT_LABEL)
            .or_else(|| self.annotation(labels::COMMIT_ANNOTATION))
            .filter(|s| !s.is_empty())
    }

    pub fn pipeline_type(&self) -> Option<&str> {
        self.label(labels::PIPELINE_TYPE)
    }

    pub fn component(&self) -> Option<&str> {
        self.label(labels::COMPONENT)
    }

    pub fn component_version(&self) -> Option<&str> {
        self.label(labels::COMPONENT_VERSION)
    }

    pub fn application(&self) -> Option<&str> {
        self.label(labels::APPLICATION)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.label(labels::COMMIT_EVENT_TYPE_LABEL)
    }

    pub fn is_build(&self) -> bool {
        self.pipeline_type() == Some(labels::pipeline_type::BUILD)
    }

    pub fn snapshot(&self) -> Option<&str> {
        self.annotation(labels::SNAPSHOT).or_else(|| self.label(labels::SNAPSHOT))
    }

    /// Snapshot creation status annotation. Malformed JSON yields `None`.
    pub fn snapshot_creation_status(&self) -> Option<serde_json::Value> {
        let raw = self.annotation(labels::CREATE_SNAPSHOT_STATUS)?;
        serde_json::from_str(raw).ok()
    }

    /// Run duration in seconds; running runs are measured against `now`.
    pub fn duration_secs(&self, now: i64) -> Option<i64> {
        let start = self.start_ts?;
        let end = self.completion_ts.unwrap_or(now);
        Some((end - start).max(0))
    }
}

/// A source revision and the pipeline runs built from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Commit {
    pub sha: String,
    pub sha_title: String,
    pub branch: String,
    pub user: String,
    pub pull_request_number: String,
    pub event_type: String,
    pub application: String,
    pub components: Vec<String>,
    pub creation_ts: i64,
    pub pipeline_runs: Vec<String>,
}

impl Commit {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    pub fn is_pull_request(&self) -> bool {
        !self.pull_request_number.is_empty()
            || self.event_type == labels::event_type::PULL
    }
}

pub mod prelude {
    pub use super::{Commit, Component, ComponentVersion, ConsoleError, ConsoleResult, PipelineRun, RunStatus};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_json(cond_status: Option<(&str, &str)>) -> serde_json::Value {
        let mut v = serde_json::json!({
            "metadata": {
                "name": "build-abc",
                "namespace": "team-a",
                "creationTimestamp": "2024-03-01T10:00:00Z",
                "labels": {
                    "appstudio.openshift.io/component": "frontend",
                    "pipelines.appstudio.openshift.io/type": "build",
                    "pipelinesascode.tekton.dev/sha": "0123456789abcdef"
                },
                "annotations": {
                    "test.appstudio.openshift.io/create-snapshot-status": "{not json"
                }
            },
            "status": { "startTime": "2024-03-01T10:00:05Z" }
        });
        if let Some((status, reason)) = cond_status {
            v["status"]["conditions"] = serde_json::json!([{ "type": "Succeeded", "status": status, "reason": reason }]);
        }
        v
    }

    #[test]
    fn status_from_conditions() {
        assert_eq!(run_status_from_raw(&run_json(Some(("True", "Succeeded")))), RunStatus::Succeeded);
        assert_eq!(run_status_from_raw(&run_json(Some(("False", "Failed")))), RunStatus::Failed);
        assert_eq!(run_status_from_raw(&run_json(Some(("False", "PipelineRunCancelled")))), RunStatus::Cancelled);
        assert_eq!(run_status_from_raw(&run_json(Some(("False", "CouldntGetPipeline")))), RunStatus::FailedToStart);
        assert_eq!(run_status_from_raw(&run_json(Some(("Unknown", "Running")))), RunStatus::Running);
        assert_eq!(run_status_from_raw(&run_json(Some(("Unknown", "PipelineRunPending")))), RunStatus::Pending);
        assert_eq!(run_status_from_raw(&run_json(None)), RunStatus::Pending);
    }

    #[test]
    fn from_raw_reads_labels_and_times() {
        let run = PipelineRun::from_raw(&run_json(Some(("True", "Completed")))).unwrap();
        assert_eq!(run.name, "build-abc");
        assert_eq!(run.component(), Some("frontend"));
        assert!(run.is_build());
        assert_eq!(run.commit_sha(), Some("0123456789abcdef"));
        assert_eq!(run.duration_secs(run.creation_ts + 65), Some(60));
        // malformed annotation degrades to "absent"
        assert!(run.snapshot_creation_status().is_none());
    }

    #[test]
    fn from_raw_requires_name() {
        let err = PipelineRun::from_raw(&serde_json::json!({ "metadata": {} })).unwrap_err();
        assert!(matches!(err, ConsoleError::Parse(_)));
    }

    #[test]
    fn status_parse_and_rank() {
        assert_eq!(RunStatus::parse("test failures"), Some(RunStatus::TestFailed));
        assert_eq!(RunStatus::parse("nope"), None);
        assert!(RunStatus::Running.rank() < RunStatus::Succeeded.rank());
        assert_eq!(RunStatus::Unknown.rank(), UNKNOWN_STATUS_RANK);
    }

    #[test]
    fn pull_request_commits() {
        let mut c = Commit { sha: "0123456789".into(), ..Default::default() };
        assert_eq!(c.short_sha(), "0123456");
        assert!(!c.is_pull_request());
        c.event_type = labels::event_type::PULL.to_string();
        assert!(c.is_pull_request());
        let c = Commit { sha: "abc".into(), pull_request_number: "42".into(), ..Default::default() };
        assert_eq!(c.short_sha(), "abc");
        assert!(c.is_pull_request());
    }
}
