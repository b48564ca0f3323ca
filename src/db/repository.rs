use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::db::json_store::JsonUserStore;

/// A registered bot user. The Telegram id is the key and lives outside the
/// record, matching the on-disk layout of `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Keys written by other tools; carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub trait UserRepository: Send + Sync {
    /// Inserts the user or refreshes its name fields and `updated_at`.
    /// `created_at` is only ever written on first insert.
    fn upsert_user(
        &self,
        user_id: i64,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<()>;

    fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    fn count_users(&self) -> Result<usize>;
}

/// Opens the user store at `path`. SQLite file extensions get the SQLite
/// backend, anything else is treated as a JSON document.
pub fn open(path: &Path) -> Result<Arc<dyn UserRepository>> {
    let is_sqlite = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "db" | "sqlite" | "sqlite3"));

    if is_sqlite {
        tracing::info!(path = %path.display(), "Using SQLite user store");
        Ok(Arc::new(SqliteUserStore::new(path)?))
    } else {
        tracing::info!(path = %path.display(), "Using JSON user store");
        Ok(Arc::new(JsonUserStore::open(path)?))
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    pub fn new(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(include_str!("../../migrations/001_init.sql"))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("user store lock poisoned"))
    }
}

fn parse_ts(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl UserRepository for SqliteUserStore {
    fn upsert_user(
        &self,
        user_id: i64,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO users (user_id, username, first_name, last_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                username=?2, first_name=?3, last_name=?4, updated_at=?5",
            params![user_id, username, first_name, last_name, now],
        )?;
        Ok(())
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT username, first_name, last_name, created_at, updated_at
             FROM users WHERE user_id=?1",
            params![user_id],
            |row| {
                Ok(User {
                    username: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    created_at: parse_ts(&row.get::<_, String>(3)?)?,
                    updated_at: parse_ts(&row.get::<_, String>(4)?)?,
                    extra: serde_json::Map::new(),
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    fn count_users(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sqlite_upsert_keeps_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteUserStore::new(&dir.path().join("users.db")).unwrap();

        store.upsert_user(42, "ali", "Ali", "Rezaei").unwrap();
        let first = store.get_user(42).unwrap().unwrap();
        assert_eq!(first.created_at, first.updated_at);

        std::thread::sleep(Duration::from_millis(5));
        store.upsert_user(42, "ali_r", "Ali", "Rezaei").unwrap();
        let second = store.get_user(42).unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.username, "ali_r");
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn sqlite_counts_distinct_users() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteUserStore::new(&dir.path().join("nested/users.sqlite")).unwrap();
        assert_eq!(store.count_users().unwrap(), 0);
        store.upsert_user(1, "", "Sara", "").unwrap();
        store.upsert_user(2, "reza", "", "").unwrap();
        store.upsert_user(1, "", "Sara", "K").unwrap();
        assert_eq!(store.count_users().unwrap(), 2);
        assert!(store.get_user(3).unwrap().is_none());
    }

    #[test]
    fn open_picks_backend_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = open(&dir.path().join("users.db")).unwrap();
        sqlite.upsert_user(7, "a", "b", "c").unwrap();
        assert!(dir.path().join("users.db").exists());

        let json = open(&dir.path().join("users.json")).unwrap();
        json.upsert_user(7, "a", "b", "c").unwrap();
        let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
        assert!(raw.contains("\"7\""));
    }
}
