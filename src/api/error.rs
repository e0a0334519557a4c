// ==========================================
// 列车投运排程 - API层错误类型
// ==========================================
// 职责: 将仓储层/引擎层错误转换为用户可读的错误消息
// ==========================================

use crate::engine::error::SchedulingError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 排程错误（致命）
    // ==========================================
    #[error("{0}")]
    ConfigurationMissing(String),

    #[error("车队快照读取失败: {0}")]
    SnapshotFetchFailure(String),

    #[error("本次排程未产生任何推荐")]
    EmptyRun,

    #[error("排程已取消")]
    Cancelled,

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 SchedulingError 转换
// ==========================================
impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::ConfigurationMissing(msg) => ApiError::ConfigurationMissing(msg),
            SchedulingError::SnapshotFetchFailure(msg) => ApiError::SnapshotFetchFailure(msg),
            SchedulingError::EmptyRun => ApiError::EmptyRun,
            SchedulingError::Cancelled => ApiError::Cancelled,
            SchedulingError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduling_errors_map_one_to_one() {
        assert!(matches!(ApiError::from(SchedulingError::EmptyRun), ApiError::EmptyRun));
        assert!(matches!(
            ApiError::from(SchedulingError::ConfigurationMissing("no key".into())),
            ApiError::ConfigurationMissing(_)
        ));
        assert!(matches!(
            ApiError::from(SchedulingError::Repository(RepositoryError::LockError("x".into()))),
            ApiError::DatabaseConnectionError(_)
        ));
    }

    #[test]
    fn test_configuration_message_is_passed_through() {
        let e = ApiError::from(SchedulingError::ConfigurationMissing(
            "DeepSeek API key not found".into(),
        ));
        assert_eq!(e.to_string(), "DeepSeek API key not found");
    }
}
