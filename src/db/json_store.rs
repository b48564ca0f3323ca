use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::repository::{ensure_parent_dir, User, UserRepository};

type UserMap = BTreeMap<String, User>;

/// Whole-file JSON user store: `{ "<user id>": { ...profile } }`.
///
/// Every operation loads the file from disk and every mutation rewrites it,
/// so external edits are picked up immediately. Readers share the lock,
/// read-modify-write holds it exclusively. The file is replaced atomically
/// through a sibling temp file, so a reader never sees a truncated document.
pub struct JsonUserStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonUserStore {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)?;
        if !path.exists() {
            std::fs::write(path, "{}")
                .with_context(|| format!("creating {}", path.display()))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(()),
        })
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.lock.read().map_err(|_| anyhow!("user store lock poisoned"))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.lock.write().map_err(|_| anyhow!("user store lock poisoned"))
    }

    fn load(&self) -> Result<UserMap> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(UserMap::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn save(&self, users: &UserMap) -> Result<()> {
        // serde_json leaves non-ASCII names as-is
        let json = serde_json::to_string_pretty(users)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

impl UserRepository for JsonUserStore {
    fn upsert_user(
        &self,
        user_id: i64,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<()> {
        let _guard = self.write_guard()?;

        let mut users = self.load()?;
        let now = Utc::now();
        users
            .entry(user_id.to_string())
            .and_modify(|u| {
                u.username = username.to_string();
                u.first_name = first_name.to_string();
                u.last_name = last_name.to_string();
                u.updated_at = now;
            })
            .or_insert_with(|| User {
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                created_at: now,
                updated_at: now,
                extra: serde_json::Map::new(),
            });
        self.save(&users)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let _guard = self.read_guard()?;
        Ok(self.load()?.remove(&user_id.to_string()))
    }

    fn count_users(&self) -> Result<usize> {
        let _guard = self.read_guard()?;
        Ok(self.load()?.len())
    }
}
