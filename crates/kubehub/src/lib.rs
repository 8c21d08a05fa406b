//! Conveyor kubehub – paged list and get against the cluster API, plus a keyed get cache.

#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use kube::{
    api::{Api, ListParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use metrics::{counter, histogram};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, info, warn};

/// Tekton pipeline runs.
pub const PIPELINE_RUN_GVK: &str = "tekton.dev/v1/PipelineRun";
/// Build components.
pub const COMPONENT_GVK: &str = "appstudio.redhat.com/v1alpha1/Component";

pub fn parse_gvk_key(key: &str) -> Result<GroupVersionKind> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] => Ok(GroupVersionKind { group: String::new(), version: version.to_string(), kind: kind.to_string() }),
        [group, version, kind] => Ok(GroupVersionKind { group: (*group).to_string(), version: (*version).to_string(), kind: (*kind).to_string() }),
        _ => Err(anyhow!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key)),
    }
}

/// One list request: GVK + namespace + label match + page size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListRequest {
    pub gvk_key: String,
    pub namespace: String,
    pub match_labels: SmallVec<[(String, String); 4]>,
    pub limit: Option<u32>,
}

impl ListRequest {
    pub fn new(gvk_key: &str, namespace: &str) -> Self {
        Self { gvk_key: gvk_key.to_string(), namespace: namespace.to_string(), match_labels: SmallVec::new(), limit: None }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.match_labels.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// `k=v,k2=v2` in insertion order; empty when unconstrained.
    pub fn label_selector(&self) -> String {
        self.match_labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(",")
    }
}

/// A page of raw objects and the continuation token for the next one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPage {
    pub items: Vec<serde_json::Value>,
    pub continue_token: Option<String>,
}

fn api_for(client: Client, gvk_key: &str, namespace: &str) -> Result<Api<DynamicObject>> {
    let gvk = parse_gvk_key(gvk_key)?;
    let ar = ApiResource::from_gvk(&gvk);
    Ok(Api::namespaced_with(client, namespace, &ar))
}

/// List one page. `cont` is the token returned by the previous page.
pub async fn list_page(req: &ListRequest, cont: Option<&str>) -> Result<RawPage> {
    let started = Instant::now();
    let client = Client::try_default().await.context("building kube client")?;
    let api = api_for(client, &req.gvk_key, &req.namespace)?;
    let mut lp = ListParams::default();
    let selector = req.label_selector();
    if !selector.is_empty() {
        lp = lp.labels(&selector);
    }
    if let Some(limit) = req.limit {
        lp = lp.limit(limit);
    }
    if let Some(token) = cont {
        lp = lp.continue_token(token);
    }
    let res = api.list(&lp).await;
    histogram!("fetch_page_ms", started.elapsed().as_secs_f64() * 1000.0);
    let list = match res {
        Ok(list) => list,
        Err(e) => {
            counter!("fetch_errors_total", 1u64);
            warn!(gvk = %req.gvk_key, ns = %req.namespace, error = %e, "list page failed");
            return Err(anyhow::Error::new(e).context(format!("listing {} in {}", req.gvk_key, req.namespace)));
        }
    };
    counter!("fetch_page_total", 1u64);
    let continue_token = list.metadata.continue_.clone().filter(|s| !s.is_empty());
    let mut items = Vec::with_capacity(list.items.len());
    for obj in list.items.iter() {
        let mut raw = serde_json::to_value(obj).context("serializing DynamicObject")?;
        strip_managed_fields(&mut raw);
        items.push(raw);
    }
    debug!(gvk = %req.gvk_key, ns = %req.namespace, selector = %selector, items = items.len(), more = continue_token.is_some(), took_ms = %started.elapsed().as_millis(), "list page ok");
    Ok(RawPage { items, continue_token })
}

/// Get a single object by name.
pub async fn get_object(gvk_key: &str, namespace: &str, name: &str) -> Result<serde_json::Value> {
    let started = Instant::now();
    let client = Client::try_default().await.context("building kube client")?;
    let api = api_for(client, gvk_key, namespace)?;
    let obj = api.get(name).await.map_err(|e| {
        counter!("fetch_errors_total", 1u64);
        anyhow::Error::new(e).context(format!("getting {} {}/{}", gvk_key, namespace, name))
    })?;
    let mut raw = serde_json::to_value(&obj).context("serializing DynamicObject")?;
    strip_managed_fields(&mut raw);
    info!(gvk = %gvk_key, ns = %namespace, name = %name, took_ms = %started.elapsed().as_millis(), "get ok");
    Ok(raw)
}

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata") {
        if let Some(obj) = meta.as_object_mut() {
            obj.remove("managedFields");
        }
    }
}

/// HTTP status carried by a kube API error somewhere in the chain.
pub fn http_code(err: &anyhow::Error) -> Option<u16> {
    err.chain().find_map(|cause| match cause.downcast_ref::<kube::Error>() {
        Some(kube::Error::Api(ae)) => Some(ae.code),
        _ => None,
    })
}

// ---------------- query keys + get cache ----------------

/// Cache key for resource gets: GVK, workspace/namespace and optional name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub workspace: Option<String>,
    pub name: Option<String>,
}

impl QueryKey {
    pub fn new(gvk_key: &str, workspace: Option<&str>, name: Option<&str>) -> Result<Self> {
        let gvk = parse_gvk_key(gvk_key)?;
        Ok(Self {
            group: gvk.group,
            version: gvk.version,
            kind: gvk.kind,
            workspace: workspace.map(|s| s.to_string()),
            name: name.map(|s| s.to_string()),
        })
    }

    /// True when `self` is a prefix of `other` (same GVK, and same workspace/name where set).
    pub fn covers(&self, other: &QueryKey) -> bool {
        self.group == other.group
            && self.version == other.version
            && self.kind == other.kind
            && (self.workspace.is_none() || self.workspace == other.workspace)
            && (self.name.is_none() || self.name == other.name)
    }
}

/// Keyed get cache with a freshness window. Stale entries are refetched.
pub struct GetCache {
    ttl: Duration,
    entries: Mutex<FxHashMap<QueryKey, (Instant, serde_json::Value)>>,
}

impl GetCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(FxHashMap::default()) }
    }

    pub fn from_env() -> Self {
        let secs = std::env::var("CONVEYOR_CACHE_TTL_SECS").ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(30);
        Self::new(Duration::from_secs(secs))
    }

    pub fn get(&self, key: &QueryKey) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((at, v)) if at.elapsed() < self.ttl => Some(v.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn put(&self, key: QueryKey, value: serde_json::Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, (Instant::now(), value));
        }
    }

    /// Drop every entry covered by `prefix`.
    pub fn invalidate(&self, prefix: &QueryKey) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|k, _| !prefix.covers(k));
        }
    }

    /// Return a fresh cached value or run `fetch` and remember its result.
    pub async fn fetch_with<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value>>,
    {
        if let Some(hit) = self.get(&key) {
            counter!("get_cache_hits_total", 1u64);
            return Ok(hit);
        }
        let value = fetch().await?;
        self.put(key, value.clone());
        Ok(value)
    }
}
