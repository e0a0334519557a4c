// ==========================================
// 列车投运排程 - 每日排程数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: daily_schedules 表读写
// 语义: 主键 (schedule_date, trainset_id)，重复写入为替换而非合并
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::recommendation::{ScheduleReasoning, ScheduleRow};
use crate::domain::types::TrainsetStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fleet_repo::parse_date;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// DailyScheduleRepository - 每日排程仓储
// ==========================================
/// 每日排程仓储
/// 职责: 管理 daily_schedules 表的 upsert 与查询
pub struct DailyScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DailyScheduleRepository {
    /// 创建新的 DailyScheduleRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入单行排程（upsert）
    ///
    /// # 说明
    /// - 单行独立提交，一行失败不影响其它行
    /// - 已存在的行被整体替换
    pub fn upsert(&self, row: &ScheduleRow) -> RepositoryResult<()> {
        let reasoning_json = serde_json::to_string(&row.reasoning)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO daily_schedules (
                schedule_date, trainset_id, planned_status, ai_confidence_score, reasoning,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'), datetime('now'))
            ON CONFLICT(schedule_date, trainset_id) DO UPDATE SET
                planned_status = excluded.planned_status,
                ai_confidence_score = excluded.ai_confidence_score,
                reasoning = excluded.reasoning,
                updated_at = excluded.updated_at
            "#,
            params![
                row.schedule_date.to_string(),
                row.trainset_id,
                row.planned_status.as_str(),
                row.ai_confidence_score,
                reasoning_json,
            ],
        )?;
        Ok(())
    }

    /// 查询某日全部排程行（按 trainset_id 排序）
    pub fn find_by_date(&self, schedule_date: NaiveDate) -> RepositoryResult<Vec<ScheduleRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT schedule_date, trainset_id, planned_status, ai_confidence_score, reasoning
            FROM daily_schedules
            WHERE schedule_date = ?1
            ORDER BY trainset_id
            "#,
        )?;

        let raw_rows = stmt
            .query_map(params![schedule_date.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows
            .into_iter()
            .map(|(date, trainset_id, status, confidence, reasoning)| {
                let planned_status = status.parse::<TrainsetStatus>().map_err(|message| {
                    RepositoryError::FieldValueError {
                        field: "daily_schedules.planned_status".to_string(),
                        message,
                    }
                })?;
                let reasoning = match reasoning {
                    Some(raw) => serde_json::from_str::<ScheduleReasoning>(&raw)
                        .unwrap_or_else(|e| {
                            warn!(trainset_id = %trainset_id, error = %e, "reasoning 列无法解析，按空值读取");
                            ScheduleReasoning::default()
                        }),
                    None => ScheduleReasoning::default(),
                };
                Ok(ScheduleRow {
                    schedule_date: parse_date("daily_schedules.schedule_date", &date)?,
                    trainset_id,
                    planned_status,
                    ai_confidence_score: confidence.unwrap_or(0.5),
                    reasoning,
                })
            })
            .collect()
    }

    /// 统计某日已落库行数
    pub fn count_by_date(&self, schedule_date: NaiveDate) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM daily_schedules WHERE schedule_date = ?1",
            params![schedule_date.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
