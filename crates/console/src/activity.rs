//! Component activity tabs: route segment vs. remembered tab.

use std::sync::Arc;

use conveyor_core::routes::activity_tab_path;
use conveyor_persist::{ActivityTab, Prefs, TabMemory};
use serde::Serialize;
use tracing::debug;

/// A navigation the frontend should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub path: String,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabResolution {
    pub current: ActivityTabInfo,
    pub redirect: Option<Navigation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityTabInfo {
    pub key: &'static str,
    pub title: &'static str,
}

impl From<ActivityTab> for ActivityTabInfo {
    fn from(t: ActivityTab) -> Self {
        Self { key: t.as_str(), title: t.title() }
    }
}

/// Activity tab controller for one component page.
pub struct ActivityTabs {
    memory: TabMemory,
    workspace: String,
    component: String,
}

impl ActivityTabs {
    pub fn new(prefs: Arc<dyn Prefs>, workspace: &str, component: &str) -> Self {
        Self { memory: TabMemory::new(prefs), workspace: workspace.to_string(), component: component.to_string() }
    }

    pub fn tabs() -> [ActivityTabInfo; 2] {
        [ActivityTab::LatestCommits.into(), ActivityTab::PipelineRuns.into()]
    }

    fn stored(&self) -> Option<ActivityTab> {
        self.memory.last(&self.component).as_deref().and_then(ActivityTab::parse)
    }

    /// Tab to show for a route. An explicit route tab wins and is remembered; without
    /// one the remembered tab is used and the route is rewritten to it.
    /// Unrecognized route tabs are ignored.
    pub fn resolve(&self, route_tab: Option<&str>) -> TabResolution {
        let stored = self.stored();
        let route = route_tab.and_then(ActivityTab::parse);
        if let Some(tab) = route {
            if stored != Some(tab) {
                debug!(component = %self.component, tab = tab.as_str(), "activity: remembering route tab");
                self.memory.remember(&self.component, tab.as_str());
            }
            return TabResolution { current: tab.into(), redirect: None };
        }
        match stored {
            Some(tab) => TabResolution {
                current: tab.into(),
                redirect: Some(Navigation { path: self.path(tab), replace: true }),
            },
            None => TabResolution { current: ActivityTab::DEFAULT.into(), redirect: None },
        }
    }

    /// User picked `tab` while `current` is shown. Returns the navigation, if any.
    pub fn select(&self, current: &str, tab: &str) -> Option<Navigation> {
        let next = ActivityTab::parse(tab)?;
        if current == next.as_str() {
            return None;
        }
        self.memory.remember(&self.component, next.as_str());
        Some(Navigation { path: self.path(next), replace: false })
    }

    fn path(&self, tab: ActivityTab) -> String {
        activity_tab_path(&self.workspace, &self.component, tab.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_persist::MemoryStore;

    fn tabs() -> (ActivityTabs, Arc<dyn Prefs>) {
        let prefs: Arc<dyn Prefs> = Arc::new(MemoryStore::new());
        (ActivityTabs::new(prefs.clone(), "team-a", "frontend"), prefs)
    }

    #[test]
    fn defaults_to_latest_commits() {
        let (t, _) = tabs();
        let r = t.resolve(None);
        assert_eq!(r.current.key, "latest-commits");
        assert_eq!(r.redirect, None);
    }

    #[test]
    fn route_tab_wins_and_is_written_back() {
        let (t, prefs) = tabs();
        let r = t.resolve(Some("pipelineruns"));
        assert_eq!(r.current.key, "pipelineruns");
        assert_eq!(r.redirect, None);
        let stored = prefs.get("frontend_activity-secondary-tab-v2").unwrap();
        assert_eq!(stored.as_deref(), Some("\"pipelineruns\""));
    }

    #[test]
    fn stored_tab_redirects_with_replace() {
        let (t, _) = tabs();
        t.resolve(Some("pipelineruns"));
        let r = t.resolve(None);
        assert_eq!(r.current.key, "pipelineruns");
        assert_eq!(
            r.redirect,
            Some(Navigation { path: "/ns/team-a/components/frontend/activity/pipelineruns".into(), replace: true })
        );
    }

    #[test]
    fn select_pushes_and_remembers() {
        let (t, _) = tabs();
        assert_eq!(t.select("latest-commits", "latest-commits"), None);
        assert_eq!(t.select("latest-commits", "bogus"), None);
        let nav = t.select("latest-commits", "pipelineruns").unwrap();
        assert!(!nav.replace);
        assert!(nav.path.ends_with("/activity/pipelineruns"));
        assert_eq!(t.resolve(None).current.key, "pipelineruns");
    }
}
