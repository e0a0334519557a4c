// ==========================================
// 列车投运排程 - API 层
// ==========================================
// 职责: 提供排程生成/查询接口，供命令行与外部调用
// ==========================================

pub mod dto;
pub mod error;
pub mod schedule_api;

// 重导出核心类型
pub use dto::{ScheduleRequest, ScheduleResponse};
pub use error::{ApiError, ApiResult};
pub use schedule_api::ScheduleApi;
