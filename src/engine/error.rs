// ==========================================
// 列车投运排程 - 引擎层错误类型
// ==========================================
// SourceError: 推荐源错误（UpstreamUnavailable 非致命，触发兜底）
// SchedulingError: 排程致命错误（短路返回 success=false）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 推荐源错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// 传输失败/超时/非成功响应/响应无法解析
    #[error("预测服务不可用: {0}")]
    UpstreamUnavailable(String),

    /// 凭据或接口地址未配置
    #[error("推荐源配置缺失: {0}")]
    ConfigurationMissing(String),

    #[error("推荐请求已取消")]
    Cancelled,
}

/// 排程致命错误
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("配置缺失: {0}")]
    ConfigurationMissing(String),

    #[error("车队快照读取失败: {0}")]
    SnapshotFetchFailure(String),

    #[error("本次排程未产生任何推荐")]
    EmptyRun,

    #[error("排程已取消")]
    Cancelled,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 单车落库失败（不中断其余写入）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    pub trainset_id: String,
    pub message: String,
}
