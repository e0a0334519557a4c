// ==========================================
// 列车投运排程 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + tokio
// 系统定位: 决策支持系统（安全规则不可绕过）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 推荐源 / 安全校验 / 汇总
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 依赖组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CertificateType, JobCardStatus, TrainsetStatus};

// 领域实体
pub use domain::{
    FleetSnapshot, Recommendation, RunSummary, SchedulingConstraints, Trainset, TrainsetRecord,
};

// 引擎
pub use engine::{
    HeuristicFallback, RecommendationNormalizer, RecommendationSource, RemoteModelAdapter,
    SafetyValidator, SchedulingEngine, SummaryAggregator,
};

// API
pub use api::{ScheduleApi, ScheduleRequest, ScheduleResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "列车每日投运排程";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
