//! Conveyor public API façade (in-process).
//!
//! Frontends (the console views and the CLI) depend on [`ConsoleApi`] only. The
//! in-process implementation talks to the cluster through kubehub; [`MockApi`]
//! serves in-memory objects with the same list/continue semantics for tests.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use conveyor_core::{Component, ConsoleError, ConsoleResult, PipelineRun};
use conveyor_kubehub::{GetCache, QueryKey};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use conveyor_kubehub::{ListRequest, RawPage, COMPONENT_GVK, PIPELINE_RUN_GVK};
pub use conveyor_store::PageSource;

/// Object reference for raw access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRef {
    pub gvk_key: String,
    pub namespace: String,
    pub name: String,
}

/// Declarative console API surface. Paged lists come from the [`PageSource`] supertrait.
#[async_trait::async_trait]
pub trait ConsoleApi: PageSource {
    /// Fetch a raw object.
    async fn get_raw(&self, reference: ResourceRef) -> ConsoleResult<serde_json::Value>;

    async fn get_component(&self, namespace: &str, name: &str) -> ConsoleResult<Component> {
        let raw = self
            .get_raw(ResourceRef { gvk_key: COMPONENT_GVK.to_string(), namespace: namespace.to_string(), name: name.to_string() })
            .await?;
        Component::from_raw(&raw)
    }

    async fn get_pipeline_run(&self, namespace: &str, name: &str) -> ConsoleResult<PipelineRun> {
        let raw = self
            .get_raw(ResourceRef { gvk_key: PIPELINE_RUN_GVK.to_string(), namespace: namespace.to_string(), name: name.to_string() })
            .await?;
        PipelineRun::from_raw(&raw)
    }

    /// All components in a namespace, optionally restricted to one application.
    async fn list_components(&self, namespace: &str, application: Option<&str>) -> ConsoleResult<Vec<Component>> {
        let req = ListRequest::new(COMPONENT_GVK, namespace);
        let mut out = Vec::new();
        let mut cont = None;
        loop {
            let page = self.fetch_page(&req, cont.take()).await?;
            for raw in page.items.iter() {
                let c = Component::from_raw(raw)?;
                if application.map(|a| c.spec.application == a).unwrap_or(true) {
                    out.push(c);
                }
            }
            match page.continue_token {
                Some(t) => cont = Some(t),
                None => break,
            }
        }
        Ok(out)
    }
}

// ----------------- Mock implementation -----------------

/// In-memory mock: objects keyed by GVK, served with label matching and
/// offset continuation tokens.
#[derive(Default)]
pub struct MockApi {
    pub objects: FxHashMap<String, Vec<serde_json::Value>>,
    /// Overrides the request page size when set.
    pub page_size: Option<usize>,
    /// Fixed pages returned verbatim for every list, ignoring `objects`.
    pub scripted_pages: Option<Vec<Vec<serde_json::Value>>>,
    pub list_error: Option<ConsoleError>,
    list_calls: AtomicUsize,
    requests: Mutex<Vec<ListRequest>>,
}

impl MockApi {
    pub fn new() -> Self { Self::default() }

    pub fn with_object(mut self, gvk_key: &str, raw: serde_json::Value) -> Self {
        self.objects.entry(gvk_key.to_string()).or_default().push(raw);
        self
    }

    pub fn with_objects(mut self, gvk_key: &str, raws: impl IntoIterator<Item = serde_json::Value>) -> Self {
        self.objects.entry(gvk_key.to_string()).or_default().extend(raws);
        self
    }

    pub fn with_pages(mut self, pages: Vec<Vec<serde_json::Value>>) -> Self {
        self.scripted_pages = Some(pages);
        self
    }

    pub fn list_calls(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<ListRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn matches(raw: &serde_json::Value, req: &ListRequest) -> bool {
        let meta = raw.get("metadata");
        let ns_ok = meta
            .and_then(|m| m.get("namespace"))
            .and_then(|v| v.as_str())
            .map(|ns| ns == req.namespace)
            .unwrap_or(true);
        ns_ok
            && req.match_labels.iter().all(|(k, v)| {
                meta.and_then(|m| m.get("labels")).and_then(|l| l.get(k)).and_then(|x| x.as_str()) == Some(v.as_str())
            })
    }
}

#[async_trait::async_trait]
impl PageSource for MockApi {
    async fn fetch_page(&self, req: &ListRequest, cont: Option<String>) -> ConsoleResult<RawPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(req.clone());
        }
        if let Some(e) = self.list_error.clone() {
            return Err(e);
        }
        let offset: usize = match cont.as_deref() {
            Some(t) => t.parse().map_err(|_| ConsoleError::load(Some(410), format!("bad continue token {}", t)))?,
            None => 0,
        };
        if let Some(pages) = self.scripted_pages.as_ref() {
            let items = pages.get(offset).cloned().unwrap_or_default();
            let continue_token = (offset + 1 < pages.len()).then(|| (offset + 1).to_string());
            return Ok(RawPage { items, continue_token });
        }
        let all: Vec<&serde_json::Value> = self
            .objects
            .get(&req.gvk_key)
            .map(|v| v.iter().filter(|o| Self::matches(o, req)).collect())
            .unwrap_or_default();
        let size = self.page_size.or(req.limit.map(|l| l as usize)).unwrap_or(usize::MAX).max(1);
        let end = offset.saturating_add(size).min(all.len());
        let items = all.get(offset..end).map(|s| s.iter().map(|v| (*v).clone()).collect()).unwrap_or_default();
        let continue_token = (end < all.len()).then(|| end.to_string());
        Ok(RawPage { items, continue_token })
    }
}

#[async_trait::async_trait]
impl ConsoleApi for MockApi {
    async fn get_raw(&self, reference: ResourceRef) -> ConsoleResult<serde_json::Value> {
        self.objects
            .get(&reference.gvk_key)
            .and_then(|objs| {
                objs.iter().find(|o| {
                    let meta = o.get("metadata");
                    meta.and_then(|m| m.get("name")).and_then(|v| v.as_str()) == Some(reference.name.as_str())
                        && meta
                            .and_then(|m| m.get("namespace"))
                            .and_then(|v| v.as_str())
                            .map(|ns| ns == reference.namespace)
                            .unwrap_or(true)
                })
            })
            .cloned()
            .ok_or_else(|| ConsoleError::NotFound(format!("{} {}/{}", reference.gvk_key, reference.namespace, reference.name)))
    }
}

// ----------------- In-process implementation -----------------

/// In-process implementation that calls kubehub directly. Gets go through a TTL cache.
pub struct InProcApi {
    cache: GetCache,
}

impl Default for InProcApi {
    fn default() -> Self { Self::new() }
}

impl InProcApi {
    pub fn new() -> Self { Self { cache: GetCache::from_env() } }

    fn map_err(e: anyhow::Error) -> ConsoleError {
        match conveyor_kubehub::http_code(&e) {
            Some(404) => ConsoleError::NotFound(format!("{:#}", e)),
            code => ConsoleError::load(code, format!("{:#}", e)),
        }
    }

    /// Forget cached gets for a workspace, e.g. after the user asks for a refresh.
    pub fn invalidate(&self, gvk_key: &str, namespace: Option<&str>) {
        if let Ok(prefix) = QueryKey::new(gvk_key, namespace, None) {
            self.cache.invalidate(&prefix);
        }
    }
}

#[async_trait::async_trait]
impl PageSource for InProcApi {
    async fn fetch_page(&self, req: &ListRequest, cont: Option<String>) -> ConsoleResult<RawPage> {
        let t0 = Instant::now();
        let page = conveyor_kubehub::list_page(req, cont.as_deref()).await.map_err(Self::map_err)?;
        info!(gvk = %req.gvk_key, ns = %req.namespace, items = page.items.len(), took_ms = %t0.elapsed().as_millis(), "api: list page ok");
        Ok(page)
    }
}

#[async_trait::async_trait]
impl ConsoleApi for InProcApi {
    async fn get_raw(&self, reference: ResourceRef) -> ConsoleResult<serde_json::Value> {
        let key = QueryKey::new(&reference.gvk_key, Some(&reference.namespace), Some(&reference.name))
            .map_err(|e| ConsoleError::Parse(e.to_string()))?;
        self.cache
            .fetch_with(key, || conveyor_kubehub::get_object(&reference.gvk_key, &reference.namespace, &reference.name))
            .await
            .map_err(Self::map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, app: &str) -> serde_json::Value {
        serde_json::json!({
            "metadata": { "name": name, "namespace": "team-a" },
            "spec": { "componentName": name, "application": app }
        })
    }

    fn run(name: &str, component: &str) -> serde_json::Value {
        serde_json::json!({
            "metadata": { "name": name, "namespace": "team-a", "labels": { "appstudio.openshift.io/component": component } }
        })
    }

    #[tokio::test]
    async fn mock_pages_by_limit_and_labels() {
        let api = MockApi::new().with_objects(
            PIPELINE_RUN_GVK,
            vec![run("r1", "fe"), run("r2", "be"), run("r3", "fe"), run("r4", "fe")],
        );
        let req = ListRequest::new(PIPELINE_RUN_GVK, "team-a")
            .with_label("appstudio.openshift.io/component", "fe")
            .with_limit(Some(2));
        let p1 = api.fetch_page(&req, None).await.unwrap();
        assert_eq!(p1.items.len(), 2);
        let p2 = api.fetch_page(&req, p1.continue_token.clone()).await.unwrap();
        assert_eq!(p2.items.len(), 1);
        assert!(p2.continue_token.is_none());
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn list_components_walks_pages_and_filters_application() {
        let mut api = MockApi::new().with_objects(
            COMPONENT_GVK,
            vec![component("a", "shop"), component("b", "blog"), component("c", "shop")],
        );
        api.page_size = Some(1);
        let cs = api.list_components("team-a", Some("shop")).await.unwrap();
        assert_eq!(cs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(api.list_calls(), 3);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let api = MockApi::new().with_object(COMPONENT_GVK, component("a", "shop"));
        assert_eq!(api.get_component("team-a", "a").await.unwrap().spec.application, "shop");
        let err = api.get_component("team-a", "zzz").await.unwrap_err();
        assert_eq!(err.code(), Some(404));
    }
}
