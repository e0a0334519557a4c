// ==========================================
// 列车投运排程 - 推荐结果领域模型
// ==========================================
// RawCandidate: 推荐源原始输出（未校验，字段可能缺失/畸形）
// Recommendation: 经安全校验与归一化后的最终结果
// ScheduleRow: daily_schedules 持久化行
// ==========================================

use crate::domain::types::TrainsetStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// 候选来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    #[default]
    Model,     // 远程预测模型
    Heuristic, // 本地兜底规则
    Stored,    // 复用已落库排程
}

impl CandidateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateOrigin::Model => "model",
            CandidateOrigin::Heuristic => "heuristic",
            CandidateOrigin::Stored => "stored",
        }
    }
}

impl fmt::Display for CandidateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// RawCandidate - 原始候选
// ==========================================
// 除 trainset_id 外均保留原始 JSON 值，统一交给 RecommendationNormalizer 处理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub trainset_id: String,

    #[serde(skip_deserializing, default)]
    pub origin: CandidateOrigin,

    #[serde(default)]
    pub recommended_status: Value,

    #[serde(default)]
    pub confidence_score: Value,

    #[serde(default)]
    pub priority_score: Value,

    #[serde(default)]
    pub reasoning: Value,

    #[serde(default)]
    pub risk_factors: Value,
}

impl RawCandidate {
    /// 创建只有 ID 的空候选（其余字段走归一化默认值）
    pub fn empty(trainset_id: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            trainset_id: trainset_id.into(),
            origin,
            recommended_status: Value::Null,
            confidence_score: Value::Null,
            priority_score: Value::Null,
            reasoning: Value::Null,
            risk_factors: Value::Null,
        }
    }
}

// ==========================================
// Recommendation - 最终推荐
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub trainset_id: String,
    pub recommended_status: TrainsetStatus,
    pub confidence_score: f64,   // [0,1]
    pub reasoning: Vec<String>,  // 决策理由（有序）
    pub priority_score: u8,      // [1,10]
    pub risk_factors: Vec<String>,

    #[serde(skip)]
    pub origin: CandidateOrigin,
}

impl Recommendation {
    pub fn has_risk(&self) -> bool {
        !self.risk_factors.is_empty()
    }

    /// 转为持久化行
    pub fn to_schedule_row(&self, schedule_date: NaiveDate) -> ScheduleRow {
        ScheduleRow {
            schedule_date,
            trainset_id: self.trainset_id.clone(),
            planned_status: self.recommended_status,
            ai_confidence_score: self.confidence_score,
            reasoning: ScheduleReasoning {
                factors: Value::from(self.reasoning.clone()),
                risk_factors: Value::from(self.risk_factors.clone()),
                priority_score: Value::from(self.priority_score),
            },
        }
    }
}

// ==========================================
// RunSummary - 排程汇总（不单独持久化）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_trainsets: usize,
    pub recommendations: BTreeMap<TrainsetStatus, usize>,
    pub average_confidence: f64,
    pub high_risk_count: usize,
    pub optimization_timestamp: DateTime<Utc>,
}

impl RunSummary {
    pub fn count_of(&self, status: TrainsetStatus) -> usize {
        self.recommendations.get(&status).copied().unwrap_or(0)
    }
}

// ==========================================
// ScheduleRow - daily_schedules 行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub schedule_date: NaiveDate,
    pub trainset_id: String,
    pub planned_status: TrainsetStatus,
    pub ai_confidence_score: f64,
    pub reasoning: ScheduleReasoning,
}

/// reasoning 列的 JSON 结构
///
/// 字段保留原始 JSON 值，读回时交给 RecommendationNormalizer 规整
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReasoning {
    #[serde(default)]
    pub factors: Value,
    #[serde(default)]
    pub risk_factors: Value,
    #[serde(default)]
    pub priority_score: Value,
}
