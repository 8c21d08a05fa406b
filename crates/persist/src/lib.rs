//! Conveyor persistence: a small key/value preference store (SQLite or memory)
//! and the per-view preferences built on it.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use metrics::{counter, histogram};

pub mod columns;
pub mod tabs;

pub use columns::ColumnVisibility;
pub use tabs::{ActivityTab, TabMemory};

/// Namespaced key/value preferences. Values are JSON text.
pub trait Prefs: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// SQLite-backed store. Simple, synchronous; preference writes are tiny.
pub struct SqliteStore {
    db: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    pub fn open_default() -> Result<Self> {
        let path = std::env::var("CONVEYOR_DB_PATH").unwrap_or_else(|_| default_db_path());
        Self::open(&path)
    }

    pub fn open(path: &str) -> Result<Self> {
        let started = std::time::Instant::now();
        let db = rusqlite::Connection::open(path).with_context(|| format!("opening sqlite db at {}", path))?;
        db.pragma_update(None, "journal_mode", &"WAL").ok();
        db.pragma_update(None, "synchronous", &"NORMAL").ok();
        db.execute(
            "CREATE TABLE IF NOT EXISTS prefs (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                ts    INTEGER NOT NULL
            )",
            [],
        )
        .context("creating prefs table")?;
        histogram!("persist_open_ms", started.elapsed().as_secs_f64() * 1000.0);
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.db.lock().map_err(|_| anyhow!("prefs db mutex poisoned"))
    }
}

impl Prefs for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.conn()?;
        let mut stmt = db.prepare("SELECT value FROM prefs WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let started = std::time::Instant::now();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO prefs(key, value, ts) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, ts = excluded.ts",
            (key, value, now_ts()),
        )
        .with_context(|| format!("writing pref {}", key))?;
        histogram!("persist_put_ms", started.elapsed().as_secs_f64() * 1000.0);
        counter!("prefs_put_total", 1u64);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let db = self.conn()?;
        db.execute("DELETE FROM prefs WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// In-memory store for tests and for running without a writable home.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl Prefs for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.lock().map_err(|_| anyhow!("prefs mutex poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| anyhow!("prefs mutex poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        counter!("prefs_put_total", 1u64);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| anyhow!("prefs mutex poisoned"))?;
        map.remove(key);
        Ok(())
    }
}

fn default_db_path() -> String {
    if let Some(home) = std::env::var_os("HOME") {
        let mut p = std::path::PathBuf::from(home);
        p.push(".conveyor");
        let _ = std::fs::create_dir_all(&p);
        p.push("conveyor.db");
        return p.to_string_lossy().to_string();
    }
    // Fallback to current directory
    "conveyor.db".to_string()
}

pub fn now_ts() -> i64 {
    // seconds since epoch
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    now.as_secs() as i64
}
