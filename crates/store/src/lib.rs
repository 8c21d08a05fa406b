//! Conveyor store: resource loader and the paged collection state it publishes.
//!
//! A loader owns one continuation token and fetches pages strictly in order. Readers
//! see an immutable [`LoaderSnapshot`] swapped in after every state change and can
//! wait on the epoch channel for the next one.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use conveyor_core::{Component, ConsoleError, ConsoleResult, PipelineRun};
use conveyor_kubehub::{ListRequest, RawPage};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where pages come from. Implemented by the API façades.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, req: &ListRequest, cont: Option<String>) -> ConsoleResult<RawPage>;
}

/// Typed record a loader keeps. Shaping failures skip the object.
pub trait Shaped: Clone + Send + Sync + 'static {
    fn shape(raw: &serde_json::Value) -> ConsoleResult<Self>;
    fn name(&self) -> &str;
    fn created_ts(&self) -> i64;
}

impl Shaped for PipelineRun {
    fn shape(raw: &serde_json::Value) -> ConsoleResult<Self> { PipelineRun::from_raw(raw) }
    fn name(&self) -> &str { &self.name }
    fn created_ts(&self) -> i64 { self.creation_ts }
}

impl Shaped for Component {
    fn shape(raw: &serde_json::Value) -> ConsoleResult<Self> { Component::from_raw(raw) }
    fn name(&self) -> &str { &self.name }
    fn created_ts(&self) -> i64 { self.creation_ts }
}

/// Loader parameters. `namespace = None` suspends the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderParams {
    pub gvk_key: String,
    pub namespace: Option<String>,
    pub match_labels: Vec<(String, String)>,
    /// Case-insensitive substring of `metadata.name`.
    pub name_filter: Option<String>,
    /// Objects created before this (seconds since epoch) are dropped.
    pub created_after: Option<i64>,
    /// Total number of items kept across pages.
    pub limit: Option<usize>,
    pub page_size: u32,
}

impl LoaderParams {
    pub fn new(gvk_key: &str, namespace: Option<&str>) -> Self {
        Self {
            gvk_key: gvk_key.to_string(),
            namespace: namespace.map(|s| s.to_string()),
            match_labels: Vec::new(),
            name_filter: None,
            created_after: None,
            limit: None,
            page_size: page_size_from_env(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.match_labels.push((key.to_string(), value.to_string()));
        self
    }

    fn request(&self) -> Option<ListRequest> {
        let ns = self.namespace.as_deref()?;
        let mut req = ListRequest::new(&self.gvk_key, ns).with_limit(Some(self.page_size));
        for (k, v) in self.match_labels.iter() {
            req = req.with_label(k, v);
        }
        Some(req)
    }
}

pub fn page_size_from_env() -> u32 {
    std::env::var("CONVEYOR_PAGE_SIZE").ok().and_then(|s| s.parse::<u32>().ok()).filter(|n| *n > 0).unwrap_or(50)
}

/// What readers see. Replaced wholesale on every change.
#[derive(Debug, Clone)]
pub struct LoaderSnapshot<T> {
    pub epoch: u64,
    pub items: Vec<T>,
    pub loaded: bool,
    pub error: Option<ConsoleError>,
    pub has_next_page: bool,
    pub is_fetching_next_page: bool,
}

impl<T> Default for LoaderSnapshot<T> {
    fn default() -> Self {
        Self { epoch: 0, items: Vec::new(), loaded: false, error: None, has_next_page: false, is_fetching_next_page: false }
    }
}

/// Synchronous paging state: items, continuation token and fetch flags.
pub struct PagedCollection<T> {
    epoch: u64,
    items: Vec<T>,
    loaded: bool,
    error: Option<ConsoleError>,
    continue_token: Option<String>,
    fetching: bool,
    name_filter: Option<String>,
    created_after: Option<i64>,
    limit: Option<usize>,
    skipped: u64,
}

impl<T: Shaped> PagedCollection<T> {
    pub fn new(params: &LoaderParams) -> Self {
        Self {
            epoch: 0,
            items: Vec::new(),
            loaded: false,
            error: None,
            continue_token: None,
            fetching: false,
            name_filter: params.name_filter.as_deref().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()),
            created_after: params.created_after,
            limit: params.limit,
            skipped: 0,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.error.is_none() && self.continue_token.is_some() && !self.limit_reached()
    }

    fn limit_reached(&self) -> bool {
        self.limit.map(|l| self.items.len() >= l).unwrap_or(false)
    }

    /// Start a next-page fetch. Returns the token to use, or `None` when the
    /// guard (`has_next_page && !is_fetching_next_page`) does not hold.
    pub fn begin_next(&mut self) -> Option<String> {
        if self.fetching || !self.has_next_page() {
            return None;
        }
        self.fetching = true;
        self.epoch += 1;
        self.continue_token.clone()
    }

    fn keep(&self, item: &T) -> bool {
        if let Some(bound) = self.created_after {
            if item.created_ts() < bound {
                return false;
            }
        }
        match self.name_filter.as_deref() {
            Some(needle) => item.name().to_lowercase().contains(needle),
            None => true,
        }
    }

    /// Append a fetched page: shape, filter, cap at the limit.
    pub fn apply_page(&mut self, page: RawPage) {
        for raw in page.items.iter() {
            if self.limit_reached() {
                break;
            }
            match T::shape(raw) {
                Ok(item) if self.keep(&item) => self.items.push(item),
                Ok(_) => {}
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, "loader: skipping unshapeable object");
                }
            }
        }
        self.continue_token = page.continue_token;
        self.loaded = true;
        self.fetching = false;
        self.epoch += 1;
    }

    /// Record a failed fetch. The collection stops paging afterwards.
    pub fn apply_error(&mut self, err: ConsoleError) {
        self.error = Some(err);
        self.fetching = false;
        self.continue_token = None;
        self.epoch += 1;
    }

    pub fn skipped(&self) -> u64 { self.skipped }

    pub fn snapshot(&self) -> LoaderSnapshot<T> {
        LoaderSnapshot {
            epoch: self.epoch,
            items: self.items.clone(),
            loaded: self.loaded,
            error: self.error.clone(),
            has_next_page: self.has_next_page(),
            is_fetching_next_page: self.fetching,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoaderCmd {
    FetchNext,
}

/// Reader side of a loader. Dropping it stops the task; in-flight pages are discarded.
pub struct LoaderHandle<T> {
    snap: Arc<ArcSwap<LoaderSnapshot<T>>>,
    epoch_rx: watch::Receiver<u64>,
    cmd_tx: mpsc::Sender<LoaderCmd>,
    task: Option<JoinHandle<()>>,
}

impl<T> LoaderHandle<T> {
    pub fn current(&self) -> Arc<LoaderSnapshot<T>> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }

    /// Ask for the next page. The loader ignores it unless the paging guard holds.
    pub fn fetch_next_page(&self) {
        let _ = self.cmd_tx.try_send(LoaderCmd::FetchNext);
    }

    /// Wait until `pred` holds for the current snapshot or the loader stops.
    pub async fn wait_for<F>(&self, mut pred: F) -> Arc<LoaderSnapshot<T>>
    where
        F: FnMut(&LoaderSnapshot<T>) -> bool,
    {
        let mut rx = self.epoch_rx.clone();
        loop {
            let cur = self.current();
            if pred(&cur) {
                return cur;
            }
            if rx.changed().await.is_err() {
                return self.current();
            }
        }
    }

    /// Wait for the first page (or the first error).
    pub async fn settled(&self) -> Arc<LoaderSnapshot<T>> {
        self.wait_for(|s| (s.loaded || s.error.is_some()) && !s.is_fetching_next_page).await
    }
}

impl<T> Drop for LoaderHandle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn a loader task for `params`. With no namespace nothing is requested and
/// the snapshot stays `loaded = false`.
pub fn spawn_loader<T, S>(source: Arc<S>, params: LoaderParams) -> LoaderHandle<T>
where
    T: Shaped,
    S: PageSource + ?Sized + 'static,
{
    let snap = Arc::new(ArcSwap::from_pointee(LoaderSnapshot::<T>::default()));
    let (epoch_tx, epoch_rx) = watch::channel(0u64);
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<LoaderCmd>(8);

    let Some(req) = params.request() else {
        debug!(gvk = %params.gvk_key, "loader suspended: no namespace");
        return LoaderHandle { snap, epoch_rx, cmd_tx, task: None };
    };

    let snap_clone = Arc::clone(&snap);
    let task = tokio::spawn(async move {
        let mut coll = PagedCollection::<T>::new(&params);
        let publish = |coll: &PagedCollection<T>| {
            let next = coll.snapshot();
            let epoch = next.epoch;
            gauge!("loader_items", next.items.len() as f64);
            snap_clone.store(Arc::new(next));
            let _ = epoch_tx.send(epoch);
        };

        let mut cont: Option<String> = None;
        loop {
            let t0 = Instant::now();
            match source.fetch_page(&req, cont.take()).await {
                Ok(page) => {
                    let fetched = page.items.len();
                    coll.apply_page(page);
                    debug!(gvk = %req.gvk_key, ns = %req.namespace, fetched, kept = coll.items.len(), more = coll.has_next_page(), took_ms = %t0.elapsed().as_millis(), "loader: page applied");
                }
                Err(e) => {
                    counter!("loader_errors_total", 1u64);
                    warn!(gvk = %req.gvk_key, ns = %req.namespace, error = %e, "loader: fetch failed");
                    coll.apply_error(e);
                }
            }
            // Requests that arrived mid-fetch saw `is_fetching_next_page` and are dropped.
            while cmd_rx.try_recv().is_ok() {}
            publish(&coll);

            // Wait for a fetch-next that passes the guard.
            loop {
                match cmd_rx.recv().await {
                    Some(LoaderCmd::FetchNext) => {
                        if let Some(token) = coll.begin_next() {
                            publish(&coll);
                            cont = Some(token);
                            break;
                        }
                    }
                    None => {
                        info!(gvk = %req.gvk_key, ns = %req.namespace, items = coll.items.len(), "loader stopped");
                        return;
                    }
                }
            }
        }
    });

    LoaderHandle { snap, epoch_rx, cmd_tx, task: Some(task) }
}
