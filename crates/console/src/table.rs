//! Plain-text table rendering for the list views.
//!
//! Column widths come from the column tables; only visible columns are printed, in
//! table order. A trailing placeholder row marks that more pages exist.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use conveyor_core::columns::{self as cols, ColumnTable};
use conveyor_core::PipelineRun;

use crate::commits::CommitRow;

pub const MORE_ROW: &str = "…";

/// Cell text for one column of a row.
pub trait Cells {
    fn cell(&self, key: &str, now: i64) -> String;
}

impl Cells for CommitRow {
    fn cell(&self, key: &str, _now: i64) -> String {
        let c = &self.commit;
        match key {
            cols::COMMIT_NAME => {
                if c.sha_title.is_empty() { c.short_sha().to_string() } else { format!("{} {}", c.short_sha(), c.sha_title) }
            }
            cols::COMMIT_BRANCH => dash(&c.branch),
            cols::COMMIT_COMPONENT => dash(&c.components.join(", ")),
            cols::COMMIT_BY_USER => dash(&c.user),
            cols::COMMIT_COMMITTED_AT => timestamp(Some(c.creation_ts).filter(|t| *t > 0)),
            cols::COMMIT_STATUS => self.status.to_string(),
            _ => "-".to_string(),
        }
    }
}

impl Cells for PipelineRun {
    fn cell(&self, key: &str, now: i64) -> String {
        match key {
            cols::RUN_NAME => self.name.clone(),
            cols::RUN_STARTED => timestamp(self.start_ts),
            cols::RUN_DURATION => self.duration_secs(now).map(duration).unwrap_or_else(|| "-".to_string()),
            cols::RUN_STATUS => self.status.to_string(),
            cols::RUN_TYPE => dash(self.pipeline_type().unwrap_or("")),
            cols::RUN_VERSION => dash(self.component_version().unwrap_or("")),
            cols::RUN_TRIGGER => dash(self.event_type().unwrap_or("")),
            cols::RUN_REFERENCE => dash(self.commit_sha().map(|s| s.get(..7).unwrap_or(s)).unwrap_or("")),
            _ => "-".to_string(),
        }
    }
}

fn dash(s: &str) -> String {
    if s.is_empty() { "-".to_string() } else { s.to_string() }
}

/// Absolute UTC timestamp, or `-`.
fn timestamp(ts: Option<i64>) -> String {
    ts.and_then(|t| chrono::DateTime::<chrono::Utc>::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Compact duration: `2h5m`, `3m12s`, `40s`.
pub fn duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{}m", h, m)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

fn fit(s: &str, width: usize) -> String {
    let n = s.chars().count();
    if n <= width {
        format!("{:<width$}", s, width = width)
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Render `rows` under the visible columns of `table`.
pub fn render<T: Cells>(table: &ColumnTable, visible: &BTreeSet<String>, rows: &[T], has_more: bool, now: i64) -> String {
    let defs: Vec<_> = table.visible_defs(visible).map(|(_, d)| d).collect();
    let mut out = String::new();
    let header: Vec<String> = defs.iter().map(|d| fit(&d.title.to_uppercase(), d.width as usize)).collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());
    for row in rows {
        let line: Vec<String> = defs.iter().map(|d| fit(&row.cell(d.key, now), d.width as usize)).collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }
    if has_more {
        let _ = writeln!(out, "{}", MORE_ROW);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::columns::{COMMIT_COLUMNS, PIPELINE_RUN_COLUMNS};
    use conveyor_core::{Commit, RunStatus};

    #[test]
    fn durations() {
        assert_eq!(duration(40), "40s");
        assert_eq!(duration(192), "3m12s");
        assert_eq!(duration(7500), "2h5m");
    }

    #[test]
    fn renders_only_visible_columns_and_more_row() {
        let row = CommitRow {
            commit: Commit {
                sha: "0123456789abcdef".into(),
                sha_title: "fix login".into(),
                components: vec!["frontend".into()],
                ..Default::default()
            },
            status: RunStatus::Running,
        };
        let visible = COMMIT_COLUMNS.normalize([cols::COMMIT_STATUS]);
        let text = render(&COMMIT_COLUMNS, &visible, &[row], true, 0);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[0].contains("STATUS"));
        assert!(!lines[0].contains("BRANCH"));
        assert!(lines[1].starts_with("0123456 fix login"));
        assert!(lines[1].ends_with("Running"));
        assert_eq!(lines[2], MORE_ROW);
    }

    #[test]
    fn long_cells_are_truncated() {
        let run = PipelineRun::from_raw(&serde_json::json!({
            "metadata": { "name": "a-very-long-pipeline-run-name-that-will-not-fit-in-forty-chars" }
        }))
        .unwrap();
        let visible = PIPELINE_RUN_COLUMNS.non_hidable();
        let text = render(&PIPELINE_RUN_COLUMNS, &visible, &[run], false, 0);
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("a-very-long"));
        assert!(row.contains('…'));
    }
}
