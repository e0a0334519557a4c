// ==========================================
// 列车投运排程 - 模型训练数据仓储
// ==========================================
// 职责: 追加写入 ai_training_data（输入特征 + 最终推荐 + 模型版本）
// 说明: 只追加，不更新
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 训练数据记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDataRecord {
    pub schedule_date: NaiveDate,
    pub input_features: Value,
    pub ai_recommendation: Value,
    pub model_version: String,
}

pub struct TrainingDataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TrainingDataRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条训练数据，返回记录 ID
    pub fn insert(&self, record: &TrainingDataRecord) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        let input_json = serde_json::to_string(&record.input_features)?;
        let output_json = serde_json::to_string(&record.ai_recommendation)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO ai_training_data (
                id, schedule_date, input_features, ai_recommendation, model_version
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                id,
                record.schedule_date.to_string(),
                input_json,
                output_json,
                record.model_version,
            ],
        )?;
        Ok(id)
    }

    /// 查询某日训练数据（按写入顺序）
    pub fn find_by_date(
        &self,
        schedule_date: NaiveDate,
    ) -> RepositoryResult<Vec<TrainingDataRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT input_features, ai_recommendation, model_version
            FROM ai_training_data
            WHERE schedule_date = ?1
            ORDER BY created_at, rowid
            "#,
        )?;
        let raw_rows = stmt
            .query_map(params![schedule_date.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows
            .into_iter()
            .map(|(input, output, model_version)| {
                Ok(TrainingDataRecord {
                    schedule_date,
                    input_features: serde_json::from_str(&input)?,
                    ai_recommendation: serde_json::from_str(&output)?,
                    model_version,
                })
            })
            .collect()
    }

    /// 统计某日训练数据条数
    pub fn count_by_date(&self, schedule_date: NaiveDate) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ai_training_data WHERE schedule_date = ?1",
            params![schedule_date.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
