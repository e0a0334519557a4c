// ==========================================
// 列车投运排程 - 请求/响应结构
// ==========================================
// 请求: { schedule_date, constraints, force_recompute }（兼容 camelCase）
// 响应: 成功 { success, recommendations, summary, timestamp }
//       失败 { success: false, error }
// ==========================================

use crate::domain::constraints::SchedulingConstraints;
use crate::domain::recommendation::{Recommendation, RunSummary};
use crate::engine::orchestrator::RunOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// YYYY-MM-DD（允许带时间部分）
    #[serde(alias = "scheduleDate")]
    pub schedule_date: String,

    #[serde(default)]
    pub constraints: SchedulingConstraints,

    #[serde(default, alias = "forceRecompute")]
    pub force_recompute: bool,
}

impl ScheduleRequest {
    pub fn new(schedule_date: impl Into<String>) -> Self {
        Self {
            schedule_date: schedule_date.into(),
            constraints: SchedulingConstraints::default(),
            force_recompute: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force_recompute = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduleResponse {
    /// 由排程结果构造响应
    ///
    /// 有单车落库失败或中途取消时 success=false，但仍返回推荐
    pub fn from_outcome(outcome: RunOutcome, timestamp: DateTime<Utc>) -> Self {
        let success = outcome.is_success();
        let error = if outcome.cancelled {
            Some("排程已取消，仅保存了已完成校验的列车".to_string())
        } else if !outcome.persistence_failures.is_empty() {
            let ids: Vec<&str> = outcome
                .persistence_failures
                .iter()
                .map(|f| f.trainset_id.as_str())
                .collect();
            Some(format!("{} 条排程落库失败: {}", ids.len(), ids.join(", ")))
        } else {
            None
        };

        Self {
            success,
            recommendations: Some(outcome.recommendations),
            summary: Some(outcome.summary),
            timestamp: Some(timestamp),
            error,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            recommendations: None,
            summary: None,
            timestamp: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_camel_case() {
        let req: ScheduleRequest =
            serde_json::from_str(r#"{"scheduleDate": "2026-06-01", "forceRecompute": true}"#)
                .unwrap();
        assert_eq!(req.schedule_date, "2026-06-01");
        assert!(req.force_recompute);
        assert_eq!(req.constraints, SchedulingConstraints::default());
    }

    #[test]
    fn test_failure_shape() {
        let v = serde_json::to_value(ScheduleResponse::failure("boom")).unwrap();
        assert_eq!(v, serde_json::json!({"success": false, "error": "boom"}));
    }
}
