// ==========================================
// 列车投运排程 - 汇总统计
// ==========================================
// 输出: 各状态计数 / 平均置信度（两位小数）/ 风险车数 / 时间戳
// 空推荐集 → EmptyRun（不产生 NaN）
// ==========================================

use crate::domain::recommendation::{Recommendation, RunSummary};
use crate::engine::error::SchedulingError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryAggregator;

impl SummaryAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 汇总推荐集
    ///
    /// # 参数
    /// - total_trainsets: 快照中的列车数
    /// - at: 本次排程时间戳
    pub fn aggregate(
        &self,
        recommendations: &[Recommendation],
        total_trainsets: usize,
        at: DateTime<Utc>,
    ) -> Result<RunSummary, SchedulingError> {
        if recommendations.is_empty() {
            return Err(SchedulingError::EmptyRun);
        }

        let mut counts = BTreeMap::new();
        for rec in recommendations {
            *counts.entry(rec.recommended_status).or_insert(0usize) += 1;
        }

        let sum: f64 = recommendations.iter().map(|r| r.confidence_score).sum();
        let mean = sum / recommendations.len() as f64;

        Ok(RunSummary {
            total_trainsets,
            recommendations: counts,
            average_confidence: round2(mean),
            high_risk_count: recommendations.iter().filter(|r| r.has_risk()).count(),
            optimization_timestamp: at,
        })
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::CandidateOrigin;
    use crate::domain::types::TrainsetStatus;

    fn rec(id: &str, status: TrainsetStatus, confidence: f64, risks: &[&str]) -> Recommendation {
        Recommendation {
            trainset_id: id.to_string(),
            recommended_status: status,
            confidence_score: confidence,
            reasoning: vec!["r".to_string()],
            priority_score: 5,
            risk_factors: risks.iter().map(|s| s.to_string()).collect(),
            origin: CandidateOrigin::Model,
        }
    }

    #[test]
    fn test_empty_run_is_error() {
        let err = SummaryAggregator::new()
            .aggregate(&[], 0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::EmptyRun));
    }

    #[test]
    fn test_counts_mean_and_risk() {
        let recs = vec![
            rec("T1", TrainsetStatus::Ready, 0.9, &[]),
            rec("T2", TrainsetStatus::Ready, 0.8, &["cleaning overdue"]),
            rec("T3", TrainsetStatus::Critical, 0.555, &["expired"]),
        ];
        let at = Utc::now();
        let s = SummaryAggregator::new().aggregate(&recs, 4, at).unwrap();
        assert_eq!(s.total_trainsets, 4);
        assert_eq!(s.count_of(TrainsetStatus::Ready), 2);
        assert_eq!(s.count_of(TrainsetStatus::Critical), 1);
        assert_eq!(s.count_of(TrainsetStatus::Standby), 0);
        assert_eq!(s.recommendations.values().sum::<usize>(), 3);
        assert_eq!(s.average_confidence, 0.75);
        assert_eq!(s.high_risk_count, 2);
        assert_eq!(s.optimization_timestamp, at);
    }

    #[test]
    fn test_summary_json_keys_are_status_names() {
        let recs = vec![rec("T1", TrainsetStatus::Maintenance, 0.5, &[])];
        let s = SummaryAggregator::new().aggregate(&recs, 1, Utc::now()).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["recommendations"]["maintenance"], 1);
    }
}
