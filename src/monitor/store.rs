//! 监控历史的外部持久化：追加后裁剪到上限
//!
//! - JsonFileHistoryStore：单个 JSON 文件，每次追加整体重写
//! - SqliteHistoryStore：rusqlite 表，插入后删除超出上限的最旧行

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::core::HiveError;
use crate::monitor::HealthSample;

pub trait HistoryStore: Send + Sync {
    /// 按时间顺序加载全部样本
    fn load(&self) -> Result<Vec<HealthSample>, HiveError>;

    /// 追加一条样本，并只保留最新的 cap 条
    fn append(&self, sample: &HealthSample, cap: usize) -> Result<(), HiveError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl HistoryStore for JsonFileHistoryStore {
    /// 文件不存在时返回空
    fn load(&self) -> Result<Vec<HealthSample>, HiveError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn append(&self, sample: &HealthSample, cap: usize) -> Result<(), HiveError> {
        let mut samples = self.load()?;
        samples.push(sample.clone());
        if samples.len() > cap {
            samples.drain(0..samples.len() - cap);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // 写临时文件后 rename 替换
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&samples)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HiveError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, HiveError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, HiveError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS monitor_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                total_agents INTEGER NOT NULL,
                active_agents INTEGER NOT NULL,
                total_executions INTEGER NOT NULL,
                recent_executions INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load(&self) -> Result<Vec<HealthSample>, HiveError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT timestamp, total_agents, active_agents, total_executions, recent_executions
             FROM monitor_history ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HealthSample {
                timestamp: row.get::<_, DateTime<Utc>>(0)?,
                total_agents: row.get::<_, i64>(1)? as usize,
                active_agents: row.get::<_, i64>(2)? as usize,
                total_executions: row.get::<_, i64>(3)? as u64,
                recent_executions: row.get::<_, i64>(4)? as usize,
            })
        })?;
        let mut samples = Vec::new();
        for row in rows {
            samples.push(row?);
        }
        Ok(samples)
    }

    fn append(&self, sample: &HealthSample, cap: usize) -> Result<(), HiveError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO monitor_history
             (timestamp, total_agents, active_agents, total_executions, recent_executions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.timestamp,
                sample.total_agents as i64,
                sample.active_agents as i64,
                sample.total_executions as i64,
                sample.recent_executions as i64,
            ],
        )?;
        tx.execute(
            "DELETE FROM monitor_history WHERE id NOT IN
             (SELECT id FROM monitor_history ORDER BY id DESC LIMIT ?1)",
            params![cap as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample(i: usize) -> HealthSample {
        HealthSample {
            timestamp: Utc::now() + Duration::seconds(i as i64),
            total_agents: i,
            active_agents: i,
            total_executions: i as u64 * 10,
            recent_executions: 0,
        }
    }

    fn exercise(store: &dyn HistoryStore) {
        assert!(store.load().unwrap().is_empty());
        for i in 0..5 {
            store.append(&sample(i), 3).unwrap();
        }
        let loaded = store.load().unwrap();
        let totals: Vec<usize> = loaded.iter().map(|s| s.total_agents).collect();
        assert_eq!(totals, vec![2, 3, 4]);
        assert_eq!(loaded[2].total_executions, 40);
    }

    #[test]
    fn test_json_store_append_then_trim() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileHistoryStore::new(dir.path().join("nested/history.json"));
        exercise(&store);
    }

    #[test]
    fn test_sqlite_store_append_then_trim() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        exercise(&store);
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = SqliteHistoryStore::open(&path).unwrap();
            store.append(&sample(1), 10).unwrap();
        }
        let store = SqliteHistoryStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
