use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use conveyor_api::{ConsoleApi, InProcApi};
use conveyor_console::builds::{latest_build_run, latest_push_build_run, latest_successful_build_run};
use conveyor_console::table::render;
use conveyor_console::versions::NO_VERSIONS_MESSAGE;
use conveyor_console::{
    load_nudge_relations, now_ts, ActivityTabs, CommitsListView, ConsoleContext, PipelineRunsListView, VersionOverview,
    VersionsTab,
};
use conveyor_core::columns::{ColumnTable, COMMIT_COLUMNS, PIPELINE_RUN_COLUMNS};
use conveyor_core::routes::{self, Page};
use conveyor_core::{ErrorState, PipelineRun, RunStatus};
use conveyor_persist::{ColumnVisibility, MemoryStore, Prefs, SqliteStore};
use conveyor_view::{EmptyState, FilterKey, SortDirection};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "conveyorctl", version, about = "Conveyor CLI: commits, pipeline runs and versions")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Workspace namespace (default: current kube context)
    #[arg(long = "ns", global = true, env = "CONVEYOR_NAMESPACE")]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TableArg { Commits, Pipelineruns }

impl TableArg {
    fn table(self) -> ColumnTable {
        match self {
            TableArg::Commits => COMMIT_COLUMNS,
            TableArg::Pipelineruns => PIPELINE_RUN_COLUMNS,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Latest commits of a component, grouped from its build runs
    Commits {
        component: String,
        /// Restrict to one component version (branch or tag)
        #[arg(long = "version")]
        version: Option<String>,
        /// Text filter: SHA, component, #PR or title
        #[arg(long = "text")]
        text: Option<String>,
        /// Status filter (repeatable)
        #[arg(long = "status")]
        status: Vec<String>,
        /// Sort column key, e.g. "committedAt" or "status"
        #[arg(long = "sort")]
        sort: Option<String>,
        #[arg(long = "asc", action = ArgAction::SetTrue)]
        asc: bool,
        /// Pages to load
        #[arg(long = "pages", default_value_t = 1)]
        pages: usize,
    },
    /// Pipeline runs of a component
    Runs {
        component: String,
        #[arg(long = "version")]
        version: Option<String>,
        /// Name filter (applied while listing)
        #[arg(long = "name")]
        name: Option<String>,
        #[arg(long = "status")]
        status: Vec<String>,
        #[arg(long = "type")]
        types: Vec<String>,
        /// Version filter (repeatable; ignored with --version)
        #[arg(long = "filter-version")]
        versions: Vec<String>,
        #[arg(long = "sort")]
        sort: Option<String>,
        #[arg(long = "asc", action = ArgAction::SetTrue)]
        asc: bool,
        #[arg(long = "pages", default_value_t = 1)]
        pages: usize,
    },
    /// Versions of a component
    Versions {
        component: String,
        #[arg(long = "name")]
        name: Option<String>,
    },
    /// Overview of one component version
    Version {
        component: String,
        revision: String,
    },
    /// Latest build, push build and successful build of a component
    Latest {
        component: String,
    },
    /// Build-nudge relations between an application's components
    Nudges {
        application: String,
    },
    /// Show or change the visible columns of a list
    Columns {
        #[arg(value_enum)]
        table: TableArg,
        #[command(subcommand)]
        action: Option<ColumnsAction>,
    },
    /// Resolve a console path; activity paths also resolve their tab
    Route {
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum ColumnsAction {
    /// Flip one column
    Toggle { key: String },
    /// Replace the visible set
    Set { keys: Vec<String> },
    /// Restore the defaults
    Reset,
}

fn init_tracing() {
    let env = std::env::var("CONVEYOR_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("CONVEYOR_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid CONVEYOR_METRICS_ADDR; expected host:port");
        }
    }
}

fn open_prefs() -> Arc<dyn Prefs> {
    match SqliteStore::open_default() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "preferences db unavailable; keeping preferences in memory");
            Arc::new(MemoryStore::new())
        }
    }
}

async fn namespace(flag: Option<String>) -> Result<String> {
    if let Some(ns) = flag {
        return Ok(ns);
    }
    let config = kube::Config::infer().await.context("no --ns given and no kube config to take a namespace from")?;
    Ok(config.default_namespace)
}

async fn context(cli_ns: Option<String>, prefs: Arc<dyn Prefs>) -> Result<ConsoleContext> {
    let ns = namespace(cli_ns).await?;
    let api: Arc<dyn ConsoleApi> = Arc::new(InProcApi::new());
    Ok(ConsoleContext::new(api, prefs, ns))
}

/// Bound a cluster wait by CONVEYOR_WAIT_SECS (default 30).
async fn within<F: Future>(fut: F) -> Result<F::Output> {
    let secs = std::env::var("CONVEYOR_WAIT_SECS").ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(30);
    tokio::time::timeout(Duration::from_secs(secs), fut).await.map_err(|_| anyhow!("timed out after {}s", secs))
}

fn failed(err: &ErrorState) -> anyhow::Error {
    anyhow!("{}: {}", err.title, err.message)
}

fn direction(asc: bool) -> SortDirection {
    if asc { SortDirection::Asc } else { SortDirection::Desc }
}

/// Accept statuses case-insensitively and hand back their display names.
fn statuses(raw: &[String]) -> Result<Vec<String>> {
    raw.iter()
        .map(|s| RunStatus::parse(s).map(|st| st.as_str().to_string()).ok_or_else(|| anyhow!("unknown status {:?}", s)))
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn empty_message(empty: Option<EmptyState>, what: &str) -> Option<String> {
    match empty? {
        EmptyState::NoData => Some(format!("No {} found.", what)),
        EmptyState::NoResults => Some("No results match the current filters. Clear the filters and try again.".to_string()),
    }
}

fn run_line(label: &str, run: Option<&PipelineRun>) {
    match run {
        Some(r) => println!("{:<18} {}  {}", label, r.name, r.status),
        None => println!("{:<18} -", label),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let prefs = open_prefs();

    match cli.command {
        Commands::Commits { component, version, text, status, sort, asc, pages } => {
            let ctx = context(cli.namespace, prefs).await?;
            info!(ns = %ctx.namespace, component = %component, "commits invoked");
            let mut view = within(CommitsListView::open(&ctx, &component, version.as_deref())).await?;
            if let Some(t) = text {
                view.set_text(t);
            }
            view.set_statuses(statuses(&status)?);
            if let Some(key) = sort.as_deref() {
                if !view.sort_by(key, direction(asc)) {
                    bail!("cannot sort commits by {:?}", key);
                }
            }
            let mut st = within(view.settle()).await?;
            for _ in 1..pages.max(1) {
                if !st.has_next_page {
                    break;
                }
                st = within(view.load_more()).await?;
            }
            if let Some(err) = st.error.as_ref() {
                return Err(failed(err));
            }
            match cli.output {
                Output::Human => {
                    print!("{}", render(&COMMIT_COLUMNS, &st.visible_columns, &st.rows, st.has_next_page, now_ts()));
                    if let Some(msg) = empty_message(st.empty, "commits") {
                        println!("{}", msg);
                    }
                    println!("{} of {} commits{}", st.rows.len(), st.total, if st.has_next_page { " (more pages: --pages)" } else { "" });
                }
                Output::Json => print_json(&st)?,
            }
        }
        Commands::Runs { component, version, name, status, types, versions, sort, asc, pages } => {
            let ctx = context(cli.namespace, prefs).await?;
            info!(ns = %ctx.namespace, component = %component, "runs invoked");
            let mut view = within(PipelineRunsListView::open(&ctx, &component, version.as_deref())).await?;
            if let Some(n) = name {
                view.set_text(n);
            }
            view.set_values(FilterKey::Status, statuses(&status)?);
            view.set_values(FilterKey::Type, types);
            if version.is_none() {
                view.set_values(FilterKey::Version, versions);
            }
            if let Some(key) = sort.as_deref() {
                if !view.sort_by(key, direction(asc)) {
                    bail!("cannot sort pipeline runs by {:?}", key);
                }
            }
            let mut st = within(view.settle()).await?;
            for _ in 1..pages.max(1) {
                if !st.has_next_page {
                    break;
                }
                st = within(view.load_more()).await?;
            }
            if let Some(err) = st.error.as_ref() {
                return Err(failed(err));
            }
            match cli.output {
                Output::Human => {
                    print!("{}", render(&PIPELINE_RUN_COLUMNS, &st.visible_columns, &st.rows, st.has_next_page, now_ts()));
                    if let Some(msg) = empty_message(st.empty, "pipeline runs") {
                        println!("{}", msg);
                    }
                    println!("{} of {} pipeline runs{}", st.rows.len(), st.total, if st.has_next_page { " (more pages: --pages)" } else { "" });
                }
                Output::Json => print_json(&st)?,
            }
        }
        Commands::Versions { component, name } => {
            let ctx = context(cli.namespace, prefs).await?;
            let mut tab = within(VersionsTab::open(&ctx, &component)).await?;
            if let Some(n) = name {
                tab.set_filter(n);
            }
            let st = tab.state();
            if let Some(err) = st.error.as_ref() {
                return Err(failed(err));
            }
            match cli.output {
                Output::Human => {
                    println!("{:<24} {:<20} {:<24} {}", "NAME", "CONTEXT", "BRANCH OR TAG", "PIPELINE RUN");
                    for v in st.rows.iter() {
                        println!(
                            "{:<24} {:<20} {:<24} {}",
                            v.name,
                            v.context.as_deref().unwrap_or("-"),
                            v.git_revision.as_deref().unwrap_or("-"),
                            v.pipeline_run_name.as_deref().unwrap_or("-")
                        );
                    }
                    match st.empty {
                        Some(EmptyState::NoData) => println!("{}", NO_VERSIONS_MESSAGE),
                        other => {
                            if let Some(msg) = empty_message(other, "versions") {
                                println!("{}", msg);
                            }
                        }
                    }
                }
                Output::Json => print_json(&st)?,
            }
        }
        Commands::Version { component, revision } => {
            let ctx = context(cli.namespace, prefs).await?;
            let ov = within(VersionOverview::load(&ctx, &component, &revision)).await?.map_err(|e| failed(&e))?;
            match cli.output {
                Output::Human => {
                    println!("{:<18} {}", "Name", ov.name);
                    println!("{:<18} {}", "Git branch or tag", ov.revision);
                    println!("{:<18} {}", "Repository", ov.repo_url.as_deref().unwrap_or("-"));
                    println!("{:<18} {}", "Pipeline", ov.pipeline);
                    run_line("Latest build", ov.latest_successful_build.as_ref());
                }
                Output::Json => print_json(&ov)?,
            }
        }
        Commands::Latest { component } => {
            let ctx = context(cli.namespace, prefs).await?;
            let ns = ctx.namespace.clone();
            let build = within(latest_build_run(ctx.api.clone(), &ns, &component, None)).await??;
            let push = within(latest_push_build_run(ctx.api.clone(), &ns, &component)).await??;
            let ok = within(latest_successful_build_run(ctx.api.clone(), &ns, &component, None)).await??;
            match cli.output {
                Output::Human => {
                    run_line("Latest build", build.as_ref());
                    run_line("Latest push build", push.as_ref());
                    run_line("Latest successful", ok.as_ref());
                }
                Output::Json => print_json(&serde_json::json!({ "build": build, "push": push, "successful": ok }))?,
            }
        }
        Commands::Nudges { application } => {
            let ctx = context(cli.namespace, prefs).await?;
            let rel = within(load_nudge_relations(&ctx, &application)).await??;
            match cli.output {
                Output::Human => {
                    for r in rel.iter() {
                        let targets = if r.targets.is_empty() { "-".to_string() } else { r.targets.join(", ") };
                        println!("{} -> {}", r.source, targets);
                    }
                }
                Output::Json => print_json(&rel)?,
            }
        }
        Commands::Columns { table, action } => {
            let vis = ColumnVisibility::load(table.table(), prefs);
            match action {
                Some(ColumnsAction::Toggle { key }) => {
                    if vis.table().get(&key).is_none() {
                        bail!("unknown column {:?} for {}", key, vis.table().id);
                    }
                    vis.toggle(&key);
                }
                Some(ColumnsAction::Set { keys }) => {
                    vis.set(keys);
                }
                Some(ColumnsAction::Reset) => {
                    vis.reset();
                }
                None => {}
            }
            let visible = vis.get();
            match cli.output {
                Output::Human => {
                    for d in vis.table().defs.iter() {
                        let mark = if visible.contains(d.key) { "x" } else { " " };
                        let note = if d.non_hidable { "  (always shown)" } else { "" };
                        println!("[{}] {:<14} {}{}", mark, d.key, d.title, note);
                    }
                }
                Output::Json => print_json(&visible)?,
            }
        }
        Commands::Route { path } => {
            let Some((page, params)) = routes::resolve(&path) else {
                bail!("no page for {}", path);
            };
            let tab = match (page, params.workspace_name.as_deref(), params.component_name.as_deref()) {
                (Page::ComponentActivityV2, Some(ws), Some(comp)) => {
                    Some(ActivityTabs::new(prefs, ws, comp).resolve(params.activity_tab.as_deref()))
                }
                _ => None,
            };
            match cli.output {
                Output::Human => {
                    println!("page: {:?}", page);
                    println!("params: {}", serde_json::to_string(&params)?);
                    if let Some(t) = tab.as_ref() {
                        println!("tab: {} ({})", t.current.key, t.current.title);
                        if let Some(nav) = t.redirect.as_ref() {
                            println!("redirect: {}{}", nav.path, if nav.replace { " (replace)" } else { "" });
                        }
                    }
                }
                Output::Json => print_json(&serde_json::json!({ "page": page, "params": params, "tab": tab }))?,
            }
        }
    }

    Ok(())
}
