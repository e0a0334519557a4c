// ==========================================
// 列车投运排程 - 引擎层仓储聚合
// ==========================================
// 职责: 定义引擎所需的存储能力（读快照 / 写排程），并由 SQLite 仓储实现
// 说明: 引擎只依赖 FleetStore / ScheduleStore 两个 trait，测试可替换
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::kpi::KpiMetric;
use crate::domain::recommendation::ScheduleRow;
use crate::domain::trainset::FleetSnapshot;
use crate::repository::{
    DailyScheduleRepository, FleetRepository, KpiMetricRepository, RepositoryResult,
    TrainingDataRecord, TrainingDataRepository,
};

/// 车队数据读取能力
pub trait FleetStore: Send + Sync {
    /// 读取完整车队快照（列车 + 证书 + 工单）
    fn load_snapshot(&self, taken_at: DateTime<Utc>) -> RepositoryResult<FleetSnapshot>;

    /// 最近 KPI 记录（按日期倒序）
    fn recent_kpis(&self, limit: usize) -> RepositoryResult<Vec<KpiMetric>>;
}

/// 排程结果写入能力
pub trait ScheduleStore: Send + Sync {
    /// 按 (schedule_date, trainset_id) 幂等覆盖
    fn upsert_row(&self, row: &ScheduleRow) -> RepositoryResult<()>;

    fn rows_for_date(&self, schedule_date: NaiveDate) -> RepositoryResult<Vec<ScheduleRow>>;

    fn record_training_data(&self, record: &TrainingDataRecord) -> RepositoryResult<String>;
}

/// 排程引擎仓储集合
///
/// # 包含的仓储
/// - `fleet_repo`: 列车/证书/工单
/// - `schedule_repo`: 每日排程
/// - `kpi_repo`: KPI 历史
/// - `training_repo`: 训练数据
#[derive(Clone)]
pub struct SchedulingRepositories {
    pub fleet_repo: Arc<FleetRepository>,
    pub schedule_repo: Arc<DailyScheduleRepository>,
    pub kpi_repo: Arc<KpiMetricRepository>,
    pub training_repo: Arc<TrainingDataRepository>,
}

impl SchedulingRepositories {
    pub fn new(
        fleet_repo: Arc<FleetRepository>,
        schedule_repo: Arc<DailyScheduleRepository>,
        kpi_repo: Arc<KpiMetricRepository>,
        training_repo: Arc<TrainingDataRepository>,
    ) -> Self {
        Self {
            fleet_repo,
            schedule_repo,
            kpi_repo,
            training_repo,
        }
    }
}

impl FleetStore for SchedulingRepositories {
    fn load_snapshot(&self, taken_at: DateTime<Utc>) -> RepositoryResult<FleetSnapshot> {
        self.fleet_repo.load_snapshot(taken_at)
    }

    fn recent_kpis(&self, limit: usize) -> RepositoryResult<Vec<KpiMetric>> {
        self.kpi_repo.recent(limit)
    }
}

impl ScheduleStore for SchedulingRepositories {
    fn upsert_row(&self, row: &ScheduleRow) -> RepositoryResult<()> {
        self.schedule_repo.upsert(row)
    }

    fn rows_for_date(&self, schedule_date: NaiveDate) -> RepositoryResult<Vec<ScheduleRow>> {
        self.schedule_repo.find_by_date(schedule_date)
    }

    fn record_training_data(&self, record: &TrainingDataRecord) -> RepositoryResult<String> {
        self.training_repo.insert(record)
    }
}
