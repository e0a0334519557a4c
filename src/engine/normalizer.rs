// ==========================================
// 列车投运排程 - 推荐字段规整
// ==========================================
// 职责: 任意来源的候选 → 合约安全的 Recommendation
// 规则（集中于此，不抛错）:
//   - confidence_score: 截断到 [0,1]；缺失/非数值 → 0.5
//   - priority_score: 四舍五入后截断到 [1,10]；缺失/非数值 → 5
//   - reasoning: 仅保留字符串元素；为空 → ["AI recommendation"]
//   - risk_factors: 仅保留字符串元素；缺失 → []
//   - recommended_status: 无法识别 → standby
// 已落库行: 剥离上次追加的安全说明后还原为候选，重新进入安全校验
// ==========================================

use crate::domain::recommendation::{CandidateOrigin, RawCandidate, Recommendation, ScheduleRow};
use crate::domain::types::TrainsetStatus;
use crate::engine::safety::SafetyVerdict;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_PRIORITY: u8 = 5;
pub const DEFAULT_REASON: &str = "AI recommendation";
pub const FALLBACK_STATUS: TrainsetStatus = TrainsetStatus::Standby;

const SAFETY_OVERRIDE_PREFIX: &str = "Safety override: ";
const SAFETY_CONFIRMED_PREFIX: &str = "Safety rule confirmed: ";
const CANDIDATE_WAS_MARKER: &str = " (candidate was ";

const MIN_PRIORITY: f64 = 1.0;
const MAX_PRIORITY: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationNormalizer;

impl RecommendationNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// 解析候选状态（进入安全校验前）
    pub fn candidate_status(&self, candidate: &RawCandidate) -> TrainsetStatus {
        match candidate.recommended_status.as_str() {
            Some(s) => s.parse().unwrap_or_else(|e: String| {
                debug!(trainset_id = %candidate.trainset_id, error = %e, "候选状态无法识别，按 standby 处理");
                FALLBACK_STATUS
            }),
            None => FALLBACK_STATUS,
        }
    }

    pub fn confidence(&self, value: &Value) -> f64 {
        match value.as_f64() {
            Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
            _ => DEFAULT_CONFIDENCE,
        }
    }

    pub fn priority(&self, value: &Value) -> u8 {
        match value.as_f64() {
            Some(v) if v.is_finite() => v.round().clamp(MIN_PRIORITY, MAX_PRIORITY) as u8,
            _ => DEFAULT_PRIORITY,
        }
    }

    pub fn reasoning(&self, value: &Value) -> Vec<String> {
        let items = string_items(value);
        if items.is_empty() {
            vec![DEFAULT_REASON.to_string()]
        } else {
            items
        }
    }

    pub fn risk_factors(&self, value: &Value) -> Vec<String> {
        string_items(value)
    }

    /// 生成最终推荐
    ///
    /// 安全规则命中时追加一条说明（状态改变 → override；未改变 → confirmed）
    pub fn normalize(&self, candidate: RawCandidate, verdict: &SafetyVerdict) -> Recommendation {
        let mut reasoning = self.reasoning(&candidate.reasoning);

        if let SafetyVerdict::Enforced { rule, candidate: proposed } = verdict {
            if verdict.overrode_candidate() {
                reasoning.push(format!(
                    "{}{}{}{})",
                    SAFETY_OVERRIDE_PREFIX,
                    rule.reason(),
                    CANDIDATE_WAS_MARKER,
                    proposed
                ));
            } else {
                reasoning.push(format!("{}{}", SAFETY_CONFIRMED_PREFIX, rule.reason()));
            }
        }

        Recommendation {
            recommended_status: verdict.status(),
            confidence_score: self.confidence(&candidate.confidence_score),
            priority_score: self.priority(&candidate.priority_score),
            risk_factors: self.risk_factors(&candidate.risk_factors),
            reasoning,
            origin: candidate.origin,
            trainset_id: candidate.trainset_id,
        }
    }

    /// 已落库行 → 候选
    ///
    /// 安全说明不作为理由保留；被安全规则覆盖过的行还原为覆盖前的候选状态
    pub fn stored_candidate(&self, row: ScheduleRow) -> RawCandidate {
        let mut status = row.planned_status;
        let factors: Vec<Value> = match row.reasoning.factors {
            Value::Array(items) => items
                .into_iter()
                .filter(|item| match item.as_str() {
                    Some(note) if note.starts_with(SAFETY_OVERRIDE_PREFIX) => {
                        if let Some(proposed) = overridden_candidate(note) {
                            status = proposed;
                        }
                        false
                    }
                    Some(note) => !note.starts_with(SAFETY_CONFIRMED_PREFIX),
                    None => true,
                })
                .collect(),
            _ => Vec::new(),
        };

        RawCandidate {
            trainset_id: row.trainset_id,
            origin: CandidateOrigin::Stored,
            recommended_status: Value::from(status.as_str()),
            confidence_score: Value::from(row.ai_confidence_score),
            priority_score: row.reasoning.priority_score,
            reasoning: Value::Array(factors),
            risk_factors: row.reasoning.risk_factors,
        }
    }

    /// 已落库行 → 推荐（只读查询，保留落库时的状态与说明）
    pub fn stored_recommendation(&self, row: ScheduleRow) -> Recommendation {
        Recommendation {
            recommended_status: row.planned_status,
            confidence_score: self.confidence(&Value::from(row.ai_confidence_score)),
            priority_score: self.priority(&row.reasoning.priority_score),
            reasoning: self.reasoning(&row.reasoning.factors),
            risk_factors: self.risk_factors(&row.reasoning.risk_factors),
            origin: CandidateOrigin::Stored,
            trainset_id: row.trainset_id,
        }
    }
}

fn overridden_candidate(note: &str) -> Option<TrainsetStatus> {
    let start = note.rfind(CANDIDATE_WAS_MARKER)? + CANDIDATE_WAS_MARKER.len();
    note[start..].strip_suffix(')')?.parse().ok()
}

fn string_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::ScheduleReasoning;
    use crate::engine::safety::SafetyRule;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(status: Value) -> RawCandidate {
        let mut c = RawCandidate::empty("T1", CandidateOrigin::Model);
        c.recommended_status = status;
        c
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let n = RecommendationNormalizer::new();
        let rec = n.normalize(raw(json!("ready")), &SafetyVerdict::Accepted(TrainsetStatus::Ready));
        assert_eq!(rec.confidence_score, 0.5);
        assert_eq!(rec.priority_score, 5);
        assert_eq!(rec.reasoning, vec!["AI recommendation".to_string()]);
        assert!(rec.risk_factors.is_empty());
    }

    #[test]
    fn test_candidate_status_parsing() {
        let n = RecommendationNormalizer::new();
        assert_eq!(n.candidate_status(&raw(json!("service"))), TrainsetStatus::Ready);
        assert_eq!(n.candidate_status(&raw(json!("MAINTENANCE"))), TrainsetStatus::Maintenance);
        assert_eq!(n.candidate_status(&raw(json!("retire"))), TrainsetStatus::Standby);
        assert_eq!(n.candidate_status(&raw(json!(3))), TrainsetStatus::Standby);
        assert_eq!(n.candidate_status(&raw(Value::Null)), TrainsetStatus::Standby);
    }

    #[test]
    fn test_numeric_coercion() {
        let n = RecommendationNormalizer::new();
        assert_eq!(n.confidence(&json!(1.7)), 1.0);
        assert_eq!(n.confidence(&json!(-0.2)), 0.0);
        assert_eq!(n.confidence(&json!(0)), 0.0);
        assert_eq!(n.confidence(&json!("0.9")), 0.5);
        assert_eq!(n.priority(&json!(0)), 1);
        assert_eq!(n.priority(&json!(42)), 10);
        assert_eq!(n.priority(&json!(6.6)), 7);
        assert_eq!(n.priority(&json!(true)), 5);
    }

    #[test]
    fn test_list_coercion() {
        let n = RecommendationNormalizer::new();
        assert_eq!(n.reasoning(&json!("single string")), vec![DEFAULT_REASON.to_string()]);
        assert_eq!(n.reasoning(&json!(["a", 1, null, "b"])), vec!["a", "b"]);
        assert_eq!(n.risk_factors(&json!({"x": 1})), Vec::<String>::new());
    }

    #[test]
    fn test_safety_note_appended() {
        let n = RecommendationNormalizer::new();
        let mut c = raw(json!("ready"));
        c.reasoning = json!(["high availability"]);

        let overridden = n.normalize(
            c.clone(),
            &SafetyVerdict::Enforced {
                rule: SafetyRule::AvailabilityCritical,
                candidate: TrainsetStatus::Ready,
            },
        );
        assert_eq!(overridden.recommended_status, TrainsetStatus::Critical);
        assert_eq!(overridden.reasoning.len(), 2);
        assert_eq!(
            overridden.reasoning[1],
            "Safety override: availability below 75% (candidate was ready)"
        );

        let confirmed = n.normalize(
            c,
            &SafetyVerdict::Enforced {
                rule: SafetyRule::AvailabilityDegraded,
                candidate: TrainsetStatus::Maintenance,
            },
        );
        assert!(confirmed.reasoning[1].starts_with("Safety rule confirmed"));
    }

    fn stored_row(status: TrainsetStatus, factors: Value, priority: Value) -> ScheduleRow {
        ScheduleRow {
            schedule_date: NaiveDate::from_ymd_opt(2026, 6, 2).unwrap(),
            trainset_id: "T1".to_string(),
            planned_status: status,
            ai_confidence_score: 0.8,
            reasoning: ScheduleReasoning {
                factors,
                risk_factors: json!(["low availability"]),
                priority_score: priority,
            },
        }
    }

    #[test]
    fn test_stored_candidate_restores_overridden_status() {
        let n = RecommendationNormalizer::new();
        let row = stored_row(
            TrainsetStatus::Critical,
            json!([
                "high availability",
                "Safety override: availability below 75% (candidate was ready)"
            ]),
            json!(4),
        );

        let c = n.stored_candidate(row);
        assert_eq!(c.origin, CandidateOrigin::Stored);
        assert_eq!(n.candidate_status(&c), TrainsetStatus::Ready);
        assert_eq!(c.reasoning, json!(["high availability"]));
        assert_eq!(c.priority_score, json!(4));

        // 重新校验后只保留一条说明
        let again = n.normalize(
            c,
            &SafetyVerdict::Enforced {
                rule: SafetyRule::AvailabilityCritical,
                candidate: TrainsetStatus::Ready,
            },
        );
        assert_eq!(again.reasoning.len(), 2);
        assert_eq!(
            again.reasoning.iter().filter(|r| r.starts_with("Safety")).count(),
            1
        );
    }

    #[test]
    fn test_stored_candidate_drops_confirmed_note() {
        let n = RecommendationNormalizer::new();
        let row = stored_row(
            TrainsetStatus::Maintenance,
            json!(["degraded", "Safety rule confirmed: availability below 90%"]),
            json!(6),
        );

        let c = n.stored_candidate(row);
        assert_eq!(n.candidate_status(&c), TrainsetStatus::Maintenance);
        assert_eq!(c.reasoning, json!(["degraded"]));
    }

    #[test]
    fn test_stored_recommendation_coerces_priority() {
        let n = RecommendationNormalizer::new();
        let high = n.stored_recommendation(stored_row(TrainsetStatus::Ready, json!(["x"]), json!(999)));
        assert_eq!(high.priority_score, 10);
        let negative = n.stored_recommendation(stored_row(TrainsetStatus::Ready, json!(["x"]), json!(-3)));
        assert_eq!(negative.priority_score, 1);
        let missing = n.stored_recommendation(stored_row(TrainsetStatus::Ready, Value::Null, Value::Null));
        assert_eq!(missing.priority_score, 5);
        assert_eq!(missing.reasoning, vec![DEFAULT_REASON.to_string()]);
        assert_eq!(missing.origin, CandidateOrigin::Stored);
    }

    fn any_json_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|v| json!(v)),
            (-1.0e12f64..1.0e12).prop_map(|v| json!(v)),
            "[a-z ]{0,12}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn prop_numeric_fields_always_in_range(conf in any_json_scalar(), prio in any_json_scalar()) {
            let n = RecommendationNormalizer::new();
            let mut c = raw(json!("standby"));
            c.confidence_score = conf;
            c.priority_score = prio;
            let rec = n.normalize(c, &SafetyVerdict::Accepted(TrainsetStatus::Standby));
            prop_assert!((0.0..=1.0).contains(&rec.confidence_score));
            prop_assert!((1..=10).contains(&rec.priority_score));
            prop_assert!(!rec.reasoning.is_empty());
        }
    }
}
