// ==========================================
// 列车投运排程 - 引擎层
// ==========================================
// 职责: 推荐源 / 安全校验 / 字段规整 / 汇总 / 编排
// 红线: Engine 不拼 SQL；安全规则与推荐来源解耦，任何来源都必须经过校验
// ==========================================

pub mod cancel;
pub mod error;
pub mod features;
pub mod heuristic;
pub mod normalizer;
pub mod orchestrator;
pub mod remote_model;
pub mod repositories;
pub mod safety;
pub mod source;
pub mod summary;

// 重导出核心引擎
pub use cancel::{cancellation_pair, CancelHandle, RunCancellation};
pub use error::{PersistenceFailure, SchedulingError, SourceError};
pub use features::{ModelInput, TrainsetFeatures};
pub use heuristic::HeuristicFallback;
pub use normalizer::RecommendationNormalizer;
pub use orchestrator::{RunOutcome, SchedulingEngine, SchedulingRun};
pub use remote_model::RemoteModelAdapter;
pub use repositories::{FleetStore, ScheduleStore, SchedulingRepositories};
pub use safety::{SafetyRule, SafetyValidator, SafetyVerdict};
pub use source::{RecommendationSource, SourceRequest};
pub use summary::SummaryAggregator;
