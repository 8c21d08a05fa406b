//! Component custom resources and their versions.

use serde::{Deserialize, Serialize};

use crate::{parse_ts, ConsoleError, ConsoleResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BundleRef {
    pub bundle: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GitPipelineRef {
    pub path_in_repo: String,
    pub revision: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PipelineDefinition {
    #[serde(rename = "pipelineref-by-git-resolver", default, skip_serializing_if = "Option::is_none")]
    pub by_git_resolver: Option<GitPipelineRef>,
    #[serde(rename = "pipelineref-by-name", default, skip_serializing_if = "Option::is_none")]
    pub by_name: Option<String>,
    #[serde(rename = "pipelinespec-from-bundle", default, skip_serializing_if = "Option::is_none")]
    pub from_bundle: Option<BundleRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BuildPipeline {
    #[serde(rename = "pull-and-push", default, skip_serializing_if = "Option::is_none")]
    pub pull_and_push: Option<PipelineDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<PipelineDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PipelineDefinition>,
}

impl BuildPipeline {
    /// Pipeline name: `pull-and-push`, else `push`, else `pull`; by-name ref, else bundle name.
    pub fn pipeline_name(&self) -> Option<&str> {
        let def = self.pull_and_push.as_ref().or(self.push.as_ref()).or(self.pull.as_ref())?;
        def.by_name
            .as_deref()
            .or_else(|| def.from_bundle.as_ref().map(|b| b.name.as_str()))
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ComponentVersion {
    pub name: String,
    pub revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "skip-builds", default)]
    pub skip_builds: bool,
    #[serde(rename = "build-pipeline", default, skip_serializing_if = "Option::is_none")]
    pub build_pipeline: Option<BuildPipeline>,
    #[serde(rename = "dockerfileUri", default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub url: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub dockerfile_url: Option<String>,
    #[serde(default)]
    pub devfile_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ComponentSource {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub git: Option<GitSource>,
    #[serde(default)]
    pub versions: Vec<ComponentVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default)]
    pub component_name: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub source: Option<ComponentSource>,
    #[serde(default)]
    pub container_image: Option<String>,
    #[serde(rename = "build-nudges-ref", default)]
    pub build_nudges_ref: Vec<String>,
    #[serde(rename = "default-build-pipeline", default)]
    pub default_build_pipeline: Option<BuildPipeline>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Component {
    pub name: String,
    pub namespace: Option<String>,
    pub creation_ts: i64,
    /// Raw RFC 3339 creation timestamp, kept for selectors.
    pub creation_timestamp: Option<String>,
    pub spec: ComponentSpec,
    /// Components that nudge this one (`status.build-nudged-by`).
    pub nudged_by: Vec<String>,
}

impl Component {
    pub fn from_raw(raw: &serde_json::Value) -> ConsoleResult<Self> {
        let meta = raw.get("metadata");
        let name = meta
            .and_then(|m| m.get("name"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConsoleError::Parse("component without metadata.name".into()))?
            .to_string();
        let namespace = meta.and_then(|m| m.get("namespace")).and_then(|v| v.as_str()).map(|s| s.to_string());
        let creation_timestamp = meta
            .and_then(|m| m.get("creationTimestamp"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let creation_ts = creation_timestamp.as_deref().and_then(parse_ts).unwrap_or(0);
        let spec: ComponentSpec = match raw.get("spec") {
            Some(s) => serde_json::from_value(s.clone())
                .map_err(|e| ConsoleError::Parse(format!("component {} spec: {}", name, e)))?,
            None => ComponentSpec::default(),
        };
        let nudged_by = raw
            .pointer("/status/build-nudged-by")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|s| s.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default();
        Ok(Self { name, namespace, creation_ts, creation_timestamp, spec, nudged_by })
    }

    pub fn versions(&self) -> &[ComponentVersion] {
        self.spec.source.as_ref().map(|s| s.versions.as_slice()).unwrap_or(&[])
    }

    /// Version whose revision (branch or tag) equals `revision`.
    pub fn version(&self, revision: &str) -> Option<&ComponentVersion> {
        self.versions().iter().find(|v| v.revision == revision)
    }

    pub fn git_url(&self) -> Option<&str> {
        let src = self.spec.source.as_ref()?;
        src.url.as_deref().or_else(|| src.git.as_ref().map(|g| g.url.as_str()))
    }

    /// Build pipeline name for a version, falling back to the component default.
    pub fn pipeline_name<'a>(&'a self, version: &'a ComponentVersion) -> Option<&'a str> {
        version
            .build_pipeline
            .as_ref()
            .or(self.spec.default_build_pipeline.as_ref())
            .and_then(|bp| bp.pipeline_name())
    }
}
