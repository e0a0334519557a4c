// ==========================================
// 列车投运排程 - 车队数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 读取 trainsets + fitness_certificates + job_cards，组装车队快照
// 约束: 所有查询使用参数化
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::trainset::{FitnessCertificate, FleetSnapshot, JobCard, Trainset, TrainsetRecord};
use crate::domain::types::{CertificateType, JobCardStatus, TrainsetStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// FleetRepository - 车队仓储
// ==========================================
pub struct FleetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FleetRepository {
    /// 创建新的 FleetRepository 实例
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

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 快照读取
    // ==========================================

    /// 读取完整车队快照
    ///
    /// # 参数
    /// - taken_at: 快照时刻（即本次排程的评估时刻）
    ///
    /// # 说明
    /// - 可用率越界值钳制到 [0,100]，广告优先级钳制到 [1,10]
    /// - 证书不按 is_valid 过滤，过期判定交给安全校验
    pub fn load_snapshot(&self, taken_at: DateTime<Utc>) -> RepositoryResult<FleetSnapshot> {
        let conn = self.get_conn()?;

        let mut certificates = self.load_certificates(&conn)?;
        let mut job_cards = self.load_job_cards(&conn)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, number, status, bay_position, mileage, last_cleaning,
                   branding_priority, availability_percentage
            FROM trainsets
            ORDER BY number
            "#,
        )?;

        let raw_rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(raw_rows.len());
        for (id, number, status, bay_position, mileage, last_cleaning, branding, availability) in
            raw_rows
        {
            let status = status
                .parse::<TrainsetStatus>()
                .map_err(|message| RepositoryError::FieldValueError {
                    field: "trainsets.status".to_string(),
                    message,
                })?;

            let availability_percentage = if (0.0..=100.0).contains(&availability) {
                availability
            } else {
                warn!(trainset_id = %id, availability, "可用率越界，已钳制到 [0,100]");
                if availability.is_nan() { 0.0 } else { availability.clamp(0.0, 100.0) }
            };

            let trainset = Trainset {
                last_cleaning: parse_timestamp("trainsets.last_cleaning", &last_cleaning)?,
                status,
                bay_position,
                mileage: u64::try_from(mileage).unwrap_or(0),
                branding_priority: branding.clamp(1, 10) as u8,
                availability_percentage,
                number,
                id,
            };

            records.push(TrainsetRecord {
                certificates: certificates.remove(&trainset.id).unwrap_or_default(),
                job_cards: job_cards.remove(&trainset.id).unwrap_or_default(),
                trainset,
            });
        }

        Ok(FleetSnapshot::new(taken_at, records))
    }

    fn load_certificates(
        &self,
        conn: &Connection,
    ) -> RepositoryResult<HashMap<String, Vec<FitnessCertificate>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, trainset_id, certificate_type, issue_date, expiry_date
            FROM fitness_certificates
            ORDER BY trainset_id, expiry_date
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut grouped: HashMap<String, Vec<FitnessCertificate>> = HashMap::new();
        for (id, trainset_id, cert_type, issue_date, expiry_date) in rows {
            let certificate_type = cert_type.parse::<CertificateType>().map_err(|message| {
                RepositoryError::FieldValueError {
                    field: "fitness_certificates.certificate_type".to_string(),
                    message,
                }
            })?;
            let cert = FitnessCertificate {
                issue_date: parse_date("fitness_certificates.issue_date", &issue_date)?,
                expiry_date: parse_date("fitness_certificates.expiry_date", &expiry_date)?,
                certificate_type,
                trainset_id: trainset_id.clone(),
                id,
            };
            grouped.entry(trainset_id).or_default().push(cert);
        }
        Ok(grouped)
    }

    fn load_job_cards(&self, conn: &Connection) -> RepositoryResult<HashMap<String, Vec<JobCard>>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, trainset_id, status, priority, description
            FROM job_cards
            ORDER BY trainset_id, created_at
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i32>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut grouped: HashMap<String, Vec<JobCard>> = HashMap::new();
        for (id, trainset_id, status, priority, description) in rows {
            let status = status.parse::<JobCardStatus>().map_err(|message| {
                RepositoryError::FieldValueError {
                    field: "job_cards.status".to_string(),
                    message,
                }
            })?;
            grouped.entry(trainset_id.clone()).or_default().push(JobCard {
                id,
                trainset_id,
                status,
                priority,
                description,
            });
        }
        Ok(grouped)
    }

    // ==========================================
    // 写入（演示库初始化/测试用）
    // ==========================================

    /// 新增或更新列车
    pub fn upsert_trainset(&self, trainset: &Trainset) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO trainsets (
                id, number, status, bay_position, mileage, last_cleaning,
                branding_priority, availability_percentage, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                number = excluded.number,
                status = excluded.status,
                bay_position = excluded.bay_position,
                mileage = excluded.mileage,
                last_cleaning = excluded.last_cleaning,
                branding_priority = excluded.branding_priority,
                availability_percentage = excluded.availability_percentage,
                updated_at = excluded.updated_at
            "#,
            params![
                trainset.id,
                trainset.number,
                trainset.status.as_str(),
                trainset.bay_position,
                i64::try_from(trainset.mileage).unwrap_or(i64::MAX),
                trainset.last_cleaning.to_rfc3339(),
                i64::from(trainset.branding_priority),
                trainset.availability_percentage,
            ],
        )?;
        Ok(())
    }

    /// 新增证书
    pub fn insert_certificate(&self, cert: &FitnessCertificate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO fitness_certificates (
                id, trainset_id, certificate_type, issue_date, expiry_date
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                cert.id,
                cert.trainset_id,
                cert.certificate_type.as_str(),
                cert.issue_date.to_string(),
                cert.expiry_date.to_string(),
            ],
        )?;
        Ok(())
    }

    /// 新增工单
    pub fn insert_job_card(&self, job: &JobCard) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO job_cards (id, trainset_id, status, priority, description)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                job.id,
                job.trainset_id,
                job.status.as_str(),
                job.priority,
                job.description,
            ],
        )?;
        Ok(())
    }
}

// ==========================================
// 时间字段解析
// ==========================================
// 兼容: RFC3339 / "YYYY-MM-DD HH:MM:SS" / "YYYY-MM-DD"

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.and_utc());
    }
    parse_date(field, s).map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

pub(crate) fn parse_date(field: &str, raw: &str) -> RepositoryResult<NaiveDate> {
    let s = raw.trim();
    // 带时间部分的日期只取日期
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("无法解析日期 '{}': {}", raw, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("f", "2026-03-01T06:30:00Z").unwrap();
        let b = parse_timestamp("f", "2026-03-01 06:30:00").unwrap();
        assert_eq!(a, b);

        let c = parse_timestamp("f", "2026-03-01").unwrap();
        assert_eq!(c.to_rfc3339(), "2026-03-01T00:00:00+00:00");

        assert!(parse_timestamp("f", "yesterday").is_err());
    }

    #[test]
    fn test_parse_date_ignores_time_part() {
        let d = parse_date("f", "2026-04-02T00:00:00+05:30").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 4, 2).unwrap());
    }
}
