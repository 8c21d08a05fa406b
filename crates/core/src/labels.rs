//! Well-known label and annotation keys on pipeline runs and components.

pub const APPLICATION: &str = "appstudio.openshift.io/application";
pub const COMPONENT: &str = "appstudio.openshift.io/component";
pub const COMPONENT_VERSION: &str = "appstudio.openshift.io/component-version";
pub const SNAPSHOT: &str = "appstudio.openshift.io/snapshot";
pub const PIPELINE_TYPE: &str = "pipelines.appstudio.openshift.io/type";
pub const CREATE_SNAPSHOT_STATUS: &str = "test.appstudio.openshift.io/create-snapshot-status";

// pipelines-as-code
pub const COMMIT_LABEL: &str = "pipelinesascode.tekton.dev/sha";
pub const COMMIT_ANNOTATION: &str = "pipelinesascode.tekton.dev/sha";
pub const COMMIT_SHA_TITLE_ANNOTATION: &str = "pipelinesascode.tekton.dev/sha-title";
pub const COMMIT_BRANCH_ANNOTATION: &str = "pipelinesascode.tekton.dev/source-branch";
pub const COMMIT_BRANCH_LABEL: &str = "pipelinesascode.tekton.dev/branch";
pub const COMMIT_USER_LABEL: &str = "pipelinesascode.tekton.dev/sender";
pub const PULL_REQUEST_NUMBER_LABEL: &str = "pipelinesascode.tekton.dev/pull-request";
pub const COMMIT_EVENT_TYPE_LABEL: &str = "pipelinesascode.tekton.dev/event-type";

pub mod pipeline_type {
    pub const BUILD: &str = "build";
    pub const TEST: &str = "test";
    pub const RELEASE: &str = "release";
    pub const TENANT: &str = "tenant";
    pub const MANAGED: &str = "managed";

    pub const ALL: [&str; 5] = [BUILD, TEST, RELEASE, TENANT, MANAGED];
}

pub mod event_type {
    pub const PUSH: &str = "push";
    pub const PULL: &str = "pull_request";
}
