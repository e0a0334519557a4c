// ==========================================
// 列车投运排程 - KPI 指标仓储
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::kpi::KpiMetric;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fleet_repo::parse_date;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 预测模型上下文默认取最近 30 条
pub const DEFAULT_KPI_HISTORY_LIMIT: usize = 30;

pub struct KpiMetricRepository {
    conn: Arc<Mutex<Connection>>,
}

impl KpiMetricRepository {
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

    /// 按 metric_date 倒序取最近 limit 条
    pub fn recent(&self, limit: usize) -> RepositoryResult<Vec<KpiMetric>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT metric_date, punctuality_percentage, fleet_availability,
                   maintenance_cost, energy_consumption, passenger_satisfaction
            FROM kpi_metrics
            ORDER BY metric_date DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, punctuality, availability, cost, energy, satisfaction)| {
                Ok(KpiMetric {
                    metric_date: parse_date("kpi_metrics.metric_date", &date)?,
                    punctuality_percentage: punctuality,
                    fleet_availability: availability,
                    maintenance_cost: cost,
                    energy_consumption: energy,
                    passenger_satisfaction: satisfaction,
                })
            })
            .collect()
    }

    /// 新增 KPI 记录
    pub fn insert(&self, metric: &KpiMetric) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO kpi_metrics (
                id, metric_date, punctuality_percentage, fleet_availability,
                maintenance_cost, energy_consumption, passenger_satisfaction
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                Uuid::new_v4().to_string(),
                metric.metric_date.to_string(),
                metric.punctuality_percentage,
                metric.fleet_availability,
                metric.maintenance_cost,
                metric.energy_consumption,
                metric.passenger_satisfaction,
            ],
        )?;
        Ok(())
    }
}
