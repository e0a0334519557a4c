// ==========================================
// 列车投运排程 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod fleet_repo;
pub mod kpi_repo;
pub mod schedule_repo;
pub mod training_data_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use fleet_repo::FleetRepository;
pub use kpi_repo::{KpiMetricRepository, DEFAULT_KPI_HISTORY_LIMIT};
pub use schedule_repo::DailyScheduleRepository;
pub use training_data_repo::{TrainingDataRecord, TrainingDataRepository};
