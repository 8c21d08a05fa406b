#![forbid(unsafe_code)]

use std::sync::Arc;

use conveyor_core::columns::{PIPELINE_RUN_COLUMNS, RUN_NAME, RUN_REFERENCE, RUN_STATUS};
use conveyor_persist::{ColumnVisibility, Prefs, SqliteStore, TabMemory};

fn temp_db() -> String {
    let dir = std::env::temp_dir();
    let f = format!("conveyor-prefs-{}.db", std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos());
    dir.join(f).to_string_lossy().to_string()
}

#[test]
fn preferences_survive_reopen() {
    let path = temp_db();
    {
        let prefs: Arc<dyn Prefs> = Arc::new(SqliteStore::open(&path).unwrap());
        let cols = ColumnVisibility::load(PIPELINE_RUN_COLUMNS, prefs.clone());
        cols.set([RUN_REFERENCE]);
        TabMemory::new(prefs).remember("frontend", "pipelineruns");
    }
    let prefs: Arc<dyn Prefs> = Arc::new(SqliteStore::open(&path).unwrap());
    let cols = ColumnVisibility::load(PIPELINE_RUN_COLUMNS, prefs.clone());
    let visible = cols.get();
    assert!(visible.contains(RUN_REFERENCE));
    assert!(visible.contains(RUN_NAME));
    assert!(visible.contains(RUN_STATUS));
    assert_eq!(visible.len(), 3);
    assert_eq!(TabMemory::new(prefs).last("frontend").as_deref(), Some("pipelineruns"));
}
