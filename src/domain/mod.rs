// ==========================================
// 列车投运排程 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod constraints;
pub mod kpi;
pub mod recommendation;
pub mod trainset;
pub mod types;

// 重导出核心类型
pub use constraints::SchedulingConstraints;
pub use kpi::KpiMetric;
pub use recommendation::{
    CandidateOrigin, RawCandidate, Recommendation, RunSummary, ScheduleReasoning, ScheduleRow,
};
pub use trainset::{FitnessCertificate, FleetSnapshot, JobCard, Trainset, TrainsetRecord};
pub use types::{CertificateType, JobCardStatus, TrainsetStatus};
