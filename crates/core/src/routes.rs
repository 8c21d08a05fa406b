//! Routing surface: path templates and the page table they resolve to.

use serde::Serialize;

/// Typed router parameters. Absent segments stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteParams {
    pub workspace_name: Option<String>,
    pub application_name: Option<String>,
    pub component_name: Option<String>,
    pub version_revision: Option<String>,
    pub pipeline_run_name: Option<String>,
    pub commit_name: Option<String>,
    pub activity_tab: Option<String>,
}

impl RouteParams {
    pub fn workspace(ws: &str) -> Self {
        Self { workspace_name: Some(ws.to_string()), ..Default::default() }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "workspaceName" => self.workspace_name.as_deref(),
            "applicationName" => self.application_name.as_deref(),
            "componentName" => self.component_name.as_deref(),
            "versionRevision" => self.version_revision.as_deref(),
            "pipelineRunName" => self.pipeline_run_name.as_deref(),
            "commitName" => self.commit_name.as_deref(),
            "activityTab" => self.activity_tab.as_deref(),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "workspaceName" => &mut self.workspace_name,
            "applicationName" => &mut self.application_name,
            "componentName" => &mut self.component_name,
            "versionRevision" => &mut self.version_revision,
            "pipelineRunName" => &mut self.pipeline_run_name,
            "commitName" => &mut self.commit_name,
            "activityTab" => &mut self.activity_tab,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTemplate {
    pub path: &'static str,
}

impl PathTemplate {
    pub const fn new(path: &'static str) -> Self {
        Self { path }
    }

    /// Substitute `:param` segments; missing params render as empty segments.
    pub fn create_path(&self, params: &RouteParams) -> String {
        self.path
            .split('/')
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) => params.get(name).unwrap_or(""),
                None => seg,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Match a concrete path (no query string) and extract its params.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        match_template(self.path, path)
    }
}

fn match_template(template: &str, path: &str) -> Option<RouteParams> {
    let path = path.trim_end_matches('/');
    let want: Vec<&str> = template.split('/').collect();
    let got: Vec<&str> = path.split('/').collect();
    if want.len() != got.len() {
        return None;
    }
    let mut params = RouteParams::default();
    for (w, g) in want.iter().zip(got.iter()) {
        match w.strip_prefix(':') {
            Some(name) => {
                if g.is_empty() || !params.set(name, (*g).to_string()) {
                    return None;
                }
            }
            None if w == g => {}
            None => return None,
        }
    }
    Some(params)
}

pub const WORKSPACE_PATH: PathTemplate = PathTemplate::new("/ns/:workspaceName");
pub const APPLICATION_LIST_PATH: PathTemplate = PathTemplate::new("/ns/:workspaceName/applications");
pub const APPLICATION_DETAILS_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName");
pub const COMPONENT_LIST_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName/components");
pub const COMPONENT_DETAILS_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName/components/:componentName");
pub const COMPONENT_ACTIVITY_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName/components/:componentName/activity/:activityTab");
pub const COMPONENT_VERSIONS_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName/components/:componentName/versions");
pub const COMPONENT_VERSION_DETAILS_PATH: PathTemplate = PathTemplate::new(
    "/ns/:workspaceName/applications/:applicationName/components/:componentName/versions/:versionRevision",
);
pub const PIPELINE_RUN_DETAILS_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName/pipelineruns/:pipelineRunName");
pub const COMMIT_DETAILS_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/applications/:applicationName/commit/:commitName");
pub const COMPONENTS_PATH: PathTemplate = PathTemplate::new("/ns/:workspaceName/components");
pub const COMPONENT_DETAILS_V2_PATH: PathTemplate = PathTemplate::new("/ns/:workspaceName/components/:componentName");
pub const COMPONENT_ACTIVITY_V2_PATH: PathTemplate =
    PathTemplate::new("/ns/:workspaceName/components/:componentName/activity");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Page {
    Applications,
    ApplicationDetails,
    ComponentList,
    ComponentDetails,
    ComponentActivity,
    ComponentVersions,
    ComponentVersionDetails,
    ComponentVersionActivity,
    PipelineRunDetails,
    CommitDetails,
    Components,
    ComponentDetailsV2,
    ComponentActivityV2,
}

struct RouteEntry {
    template: PathTemplate,
    suffix: &'static str,
    page: Page,
}

const fn entry(template: PathTemplate, suffix: &'static str, page: Page) -> RouteEntry {
    RouteEntry { template, suffix, page }
}

// Most specific first; `suffix` is appended to the template before matching.
const ROUTES: &[RouteEntry] = &[
    entry(COMPONENT_VERSION_DETAILS_PATH, "/activity", Page::ComponentVersionActivity),
    entry(COMPONENT_VERSION_DETAILS_PATH, "", Page::ComponentVersionDetails),
    entry(COMPONENT_VERSIONS_PATH, "", Page::ComponentVersions),
    entry(COMPONENT_ACTIVITY_PATH, "", Page::ComponentActivity),
    entry(COMPONENT_DETAILS_PATH, "/activity", Page::ComponentActivity),
    entry(COMPONENT_DETAILS_PATH, "", Page::ComponentDetails),
    entry(COMPONENT_LIST_PATH, "", Page::ComponentList),
    entry(PIPELINE_RUN_DETAILS_PATH, "", Page::PipelineRunDetails),
    entry(COMMIT_DETAILS_PATH, "", Page::CommitDetails),
    entry(APPLICATION_DETAILS_PATH, "", Page::ApplicationDetails),
    entry(APPLICATION_LIST_PATH, "", Page::Applications),
    entry(COMPONENT_ACTIVITY_V2_PATH, "/:activityTab", Page::ComponentActivityV2),
    entry(COMPONENT_ACTIVITY_V2_PATH, "", Page::ComponentActivityV2),
    entry(COMPONENT_DETAILS_V2_PATH, "/versions", Page::ComponentVersions),
    entry(COMPONENT_DETAILS_V2_PATH, "", Page::ComponentDetailsV2),
    entry(COMPONENTS_PATH, "", Page::Components),
];

/// Resolve a path to the page it renders and its params.
pub fn resolve(path: &str) -> Option<(Page, RouteParams)> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    ROUTES.iter().find_map(|r| {
        let full = format!("{}{}", r.template.path, r.suffix);
        match_template(&full, path).map(|params| (r.page, params))
    })
}

/// Path of an activity tab on the component details page.
pub fn activity_tab_path(workspace: &str, component: &str, tab: &str) -> String {
    let params = RouteParams {
        workspace_name: Some(workspace.to_string()),
        component_name: Some(component.to_string()),
        ..Default::default()
    };
    format!("{}/{}", COMPONENT_ACTIVITY_V2_PATH.create_path(&params), tab)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_match_round_trip() {
        let params = RouteParams {
            workspace_name: Some("team-a".into()),
            application_name: Some("shop".into()),
            component_name: Some("frontend".into()),
            version_revision: Some("main".into()),
            ..Default::default()
        };
        let p = COMPONENT_VERSION_DETAILS_PATH.create_path(&params);
        assert_eq!(p, "/ns/team-a/applications/shop/components/frontend/versions/main");
        assert_eq!(COMPONENT_VERSION_DETAILS_PATH.matches(&p), Some(params));
    }

    #[test]
    fn resolve_picks_most_specific_page() {
        let (page, params) = resolve("/ns/team-a/components/frontend/activity/pipelineruns").unwrap();
        assert_eq!(page, Page::ComponentActivityV2);
        assert_eq!(params.activity_tab.as_deref(), Some("pipelineruns"));

        let (page, params) = resolve("/ns/team-a/components/frontend/activity").unwrap();
        assert_eq!(page, Page::ComponentActivityV2);
        assert_eq!(params.activity_tab, None);

        let (page, _) = resolve("/ns/team-a/applications/shop/components/frontend/versions/main/activity?x=1").unwrap();
        assert_eq!(page, Page::ComponentVersionActivity);

        assert!(resolve("/nope").is_none());
    }

    #[test]
    fn activity_tab_path_appends_tab() {
        assert_eq!(activity_tab_path("ws", "frontend", "latest-commits"), "/ns/ws/components/frontend/activity/latest-commits");
        assert_eq!(COMPONENTS_PATH.create_path(&RouteParams::workspace("ws")), "/ns/ws/components");
    }
}
