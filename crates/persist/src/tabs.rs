//! Last-selected activity tab, remembered per component.

use std::sync::Arc;

use tracing::warn;

use crate::Prefs;

const TAB_KEY_SUFFIX: &str = "activity-secondary-tab-v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityTab {
    LatestCommits,
    PipelineRuns,
}

impl ActivityTab {
    pub const DEFAULT: ActivityTab = ActivityTab::LatestCommits;

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityTab::LatestCommits => "latest-commits",
            ActivityTab::PipelineRuns => "pipelineruns",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "latest-commits" => Some(ActivityTab::LatestCommits),
            "pipelineruns" => Some(ActivityTab::PipelineRuns),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ActivityTab::LatestCommits => "Latest commits",
            ActivityTab::PipelineRuns => "Pipeline runs",
        }
    }
}

pub struct TabMemory {
    prefs: Arc<dyn Prefs>,
}

impl TabMemory {
    pub fn new(prefs: Arc<dyn Prefs>) -> Self {
        Self { prefs }
    }

    pub fn storage_key(component: &str) -> String {
        format!("{}_{}", component, TAB_KEY_SUFFIX)
    }

    /// Stored tab for a component. Read failures and junk read as "nothing stored".
    pub fn last(&self, component: &str) -> Option<String> {
        let key = Self::storage_key(component);
        match self.prefs.get(&key) {
            Ok(Some(raw)) => serde_json::from_str::<String>(&raw).ok().filter(|s| !s.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "reading activity tab failed");
                None
            }
        }
    }

    pub fn remember(&self, component: &str, tab: &str) {
        let key = Self::storage_key(component);
        let raw = serde_json::Value::String(tab.to_string()).to_string();
        if let Err(e) = self.prefs.put(&key, &raw) {
            warn!(key = %key, error = %e, "storing activity tab failed");
        }
    }
}
