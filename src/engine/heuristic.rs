// ==========================================
// 列车投运排程 - 兜底规则推荐源
// ==========================================
// 触发: 远程模型不可用或被配置关闭
// 规则:
//   - 当前状态为 maintenance → maintenance
//   - 可用率 > 95 且无未关闭工单 → ready
//   - 其他 → standby
// 置信度: 以 (seed, 列车ID) 为种子在 [min,max]% 内取值，可复现
// ==========================================

use crate::config::model_settings::FallbackSettings;
use crate::domain::recommendation::{CandidateOrigin, RawCandidate};
use crate::domain::trainset::TrainsetRecord;
use crate::domain::types::TrainsetStatus;
use crate::engine::error::SourceError;
use crate::engine::source::{RecommendationSource, SourceRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// 可用率高于此值且无工单才可直接投运
pub const READY_AVAILABILITY_THRESHOLD: f64 = 95.0;
/// 证书临期提示窗口（天）
pub const EXPIRY_WARNING_DAYS: i64 = 7;
/// 超过此天数未清洁提示风险
pub const CLEANING_OVERDUE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicFallback {
    settings: FallbackSettings,
}

impl HeuristicFallback {
    pub fn new(settings: FallbackSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FallbackSettings {
        &self.settings
    }

    /// 候选状态（纯规则，不含安全校验）
    pub fn candidate_status(record: &TrainsetRecord) -> TrainsetStatus {
        if record.trainset.status == TrainsetStatus::Maintenance {
            TrainsetStatus::Maintenance
        } else if record.trainset.availability_percentage > READY_AVAILABILITY_THRESHOLD
            && record.open_job_card_count() == 0
        {
            TrainsetStatus::Ready
        } else {
            TrainsetStatus::Standby
        }
    }

    /// 置信度（0~1，两位小数）
    pub fn confidence_for(&self, trainset_id: &str) -> f64 {
        let (lo, hi) = self.settings.confidence_bounds();
        let mut rng = StdRng::seed_from_u64(self.settings.seed ^ fnv1a(trainset_id));
        let pct: u8 = rng.random_range(lo..=hi);
        f64::from(pct) / 100.0
    }

    /// 生成单车候选
    pub fn candidate_for(&self, record: &TrainsetRecord, now: DateTime<Utc>) -> RawCandidate {
        let status = Self::candidate_status(record);
        let priority = match status {
            TrainsetStatus::Maintenance => 7,
            TrainsetStatus::Standby => 5,
            _ => 3,
        };

        let mut reasoning: Vec<String> = vec!["Fallback rule-based assessment".to_string()];
        match status {
            TrainsetStatus::Maintenance => {
                reasoning.push("Trainset is currently in maintenance".to_string())
            }
            TrainsetStatus::Ready => reasoning.push(format!(
                "Availability {:.1}% with no open job cards",
                record.trainset.availability_percentage
            )),
            _ => reasoning.push("Held in reserve pending further assessment".to_string()),
        }

        let mut risks: Vec<String> = Vec::new();
        if let Some(days) = record
            .certificates
            .iter()
            .map(|c| c.days_to_expiry(now))
            .min()
        {
            if days <= EXPIRY_WARNING_DAYS {
                risks.push(format!("Fitness certificate expires in {} days", days));
            }
        }
        let open = record.open_job_card_count();
        if open > 0 {
            risks.push(format!("{} open job card(s)", open));
        }
        let cleaning = record.trainset.days_since_cleaning(now);
        if cleaning > CLEANING_OVERDUE_DAYS {
            risks.push(format!("Cleaning overdue ({} days)", cleaning));
        }

        RawCandidate {
            trainset_id: record.id().to_string(),
            origin: CandidateOrigin::Heuristic,
            recommended_status: Value::String(status.as_str().to_string()),
            confidence_score: json!(self.confidence_for(record.id())),
            priority_score: json!(priority),
            reasoning: json!(reasoning),
            risk_factors: json!(risks),
        }
    }

    /// 为整个快照生成候选
    pub fn generate_all(&self, request: &SourceRequest<'_>) -> Vec<RawCandidate> {
        let now = request.snapshot.taken_at;
        request
            .snapshot
            .trainsets
            .iter()
            .map(|r| self.candidate_for(r, now))
            .collect()
    }
}

#[async_trait]
impl RecommendationSource for HeuristicFallback {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn generate(&self, request: &SourceRequest<'_>) -> Result<Vec<RawCandidate>, SourceError> {
        Ok(self.generate_all(request))
    }
}

/// FNV-1a 64 位哈希（跨平台、跨版本稳定）
fn fnv1a(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    s.bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trainset::{JobCard, Trainset};
    use crate::domain::types::JobCardStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 6, 0, 0).unwrap()
    }

    fn record(id: &str, status: TrainsetStatus, availability: f64) -> TrainsetRecord {
        TrainsetRecord {
            trainset: Trainset {
                id: id.to_string(),
                number: format!("KMRL-{}", id),
                status,
                bay_position: 1,
                mileage: 120_000,
                last_cleaning: now() - chrono::Duration::days(2),
                branding_priority: 5,
                availability_percentage: availability,
            },
            certificates: vec![],
            job_cards: vec![],
        }
    }

    #[test]
    fn test_status_rules() {
        let m = record("T1", TrainsetStatus::Maintenance, 99.0);
        assert_eq!(HeuristicFallback::candidate_status(&m), TrainsetStatus::Maintenance);

        let r = record("T2", TrainsetStatus::Standby, 96.0);
        assert_eq!(HeuristicFallback::candidate_status(&r), TrainsetStatus::Ready);

        let edge = record("T3", TrainsetStatus::Ready, 95.0);
        assert_eq!(HeuristicFallback::candidate_status(&edge), TrainsetStatus::Standby);

        let mut with_card = record("T4", TrainsetStatus::Ready, 99.0);
        with_card.job_cards.push(JobCard {
            id: "J1".to_string(),
            trainset_id: "T4".to_string(),
            status: JobCardStatus::Open,
            priority: Some(1),
            description: None,
        });
        assert_eq!(
            HeuristicFallback::candidate_status(&with_card),
            TrainsetStatus::Standby
        );
    }

    #[test]
    fn test_confidence_is_seeded_and_bounded() {
        let a = HeuristicFallback::default();
        let b = HeuristicFallback::default();
        for id in ["T1", "T2", "T-0042", ""] {
            let c = a.confidence_for(id);
            assert_eq!(c, b.confidence_for(id));
            assert!((0.80..=0.99).contains(&c), "{} -> {}", id, c);
        }
    }

    #[test]
    fn test_confidence_pinned_bounds() {
        let f = HeuristicFallback::new(FallbackSettings {
            seed: 7,
            min_confidence_pct: 85,
            max_confidence_pct: 85,
        });
        assert_eq!(f.confidence_for("anything"), 0.85);
    }

    #[test]
    fn test_candidate_carries_origin_and_risks() {
        let mut r = record("T9", TrainsetStatus::Ready, 97.0);
        r.trainset.last_cleaning = now() - chrono::Duration::days(10);
        let c = HeuristicFallback::default().candidate_for(&r, now());
        assert_eq!(c.origin, CandidateOrigin::Heuristic);
        assert_eq!(c.recommended_status, json!("ready"));
        assert_eq!(c.priority_score, json!(3));
        let risks = c.risk_factors.as_array().unwrap();
        assert_eq!(risks.len(), 1);
        assert!(risks[0].as_str().unwrap().starts_with("Cleaning overdue"));
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }
}
