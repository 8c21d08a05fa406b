//! Build-nudge relations between the components of an application.

use rustc_hash::FxHashSet;
use serde::Serialize;

use conveyor_core::{Component, ConsoleResult};

use crate::ConsoleContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NudgeRelation {
    pub source: String,
    /// Components `source` nudges that actually exist in the namespace.
    pub targets: Vec<String>,
}

/// Relations for `components` that declare nudges, checked against `all`.
pub fn nudge_relations(components: &[Component], all: &[Component]) -> Vec<NudgeRelation> {
    let known: FxHashSet<&str> = all.iter().map(|c| c.name.as_str()).collect();
    components
        .iter()
        .filter(|c| !c.spec.build_nudges_ref.is_empty())
        .map(|c| NudgeRelation {
            source: c.name.clone(),
            targets: c.spec.build_nudges_ref.iter().filter(|t| known.contains(t.as_str())).cloned().collect(),
        })
        .collect()
}

/// Load an application's components and the whole namespace, then relate them.
pub async fn load_nudge_relations(ctx: &ConsoleContext, application: &str) -> ConsoleResult<Vec<NudgeRelation>> {
    let components = ctx.api.list_components(&ctx.namespace, Some(application)).await?;
    let all = ctx.api.list_components(&ctx.namespace, None).await?;
    Ok(nudge_relations(&components, &all))
}
