// ==========================================
// 列车投运排程 - 安全校验器
// ==========================================
// 红线: 硬性安全规则优先于任何候选状态（来源无关）
// 顺序（首条命中即止）:
//   1. 存在证书到期时间 <= 评估时间 → critical
//   2. 存在未关闭且 priority >= 4 的工单 → critical
//   3. 可用率 < 75 → critical
//   4. 可用率 < 90 → maintenance
//   5. 否则采纳候选状态
// 不返回错误，每车必定得到四态之一
// ==========================================

use crate::domain::trainset::TrainsetRecord;
use crate::domain::types::TrainsetStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub const AVAILABILITY_CRITICAL_BELOW: f64 = 75.0;
pub const AVAILABILITY_MAINTENANCE_BELOW: f64 = 90.0;

// ==========================================
// SafetyRule - 硬性规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyRule {
    ExpiredCertificate,
    CriticalJobCard,
    AvailabilityCritical,
    AvailabilityDegraded,
}

impl SafetyRule {
    /// 按优先级排列
    pub const ORDERED: [SafetyRule; 4] = [
        SafetyRule::ExpiredCertificate,
        SafetyRule::CriticalJobCard,
        SafetyRule::AvailabilityCritical,
        SafetyRule::AvailabilityDegraded,
    ];

    pub fn forced_status(&self) -> TrainsetStatus {
        match self {
            SafetyRule::AvailabilityDegraded => TrainsetStatus::Maintenance,
            _ => TrainsetStatus::Critical,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            SafetyRule::ExpiredCertificate => "fitness certificate expired",
            SafetyRule::CriticalJobCard => "open job card with priority >= 4",
            SafetyRule::AvailabilityCritical => "availability below 75%",
            SafetyRule::AvailabilityDegraded => "availability below 90%",
        }
    }
}

impl fmt::Display for SafetyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

// ==========================================
// SafetyVerdict - 校验结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// 无规则命中，采纳候选
    Accepted(TrainsetStatus),
    /// 规则命中，强制状态
    Enforced {
        rule: SafetyRule,
        candidate: TrainsetStatus,
    },
}

impl SafetyVerdict {
    pub fn status(&self) -> TrainsetStatus {
        match self {
            SafetyVerdict::Accepted(s) => *s,
            SafetyVerdict::Enforced { rule, .. } => rule.forced_status(),
        }
    }

    pub fn rule(&self) -> Option<SafetyRule> {
        match self {
            SafetyVerdict::Accepted(_) => None,
            SafetyVerdict::Enforced { rule, .. } => Some(*rule),
        }
    }

    /// 规则命中且改变了候选状态
    pub fn overrode_candidate(&self) -> bool {
        match self {
            SafetyVerdict::Accepted(_) => false,
            SafetyVerdict::Enforced { rule, candidate } => rule.forced_status() != *candidate,
        }
    }
}

// ==========================================
// SafetyValidator
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyValidator;

impl SafetyValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn first_matching_rule(
        &self,
        record: &TrainsetRecord,
        now: DateTime<Utc>,
    ) -> Option<SafetyRule> {
        let availability = record.trainset.availability_percentage;

        if record.has_expired_certificate(now) {
            Some(SafetyRule::ExpiredCertificate)
        } else if record.has_critical_open_job_card() {
            Some(SafetyRule::CriticalJobCard)
        } else if !(availability >= AVAILABILITY_CRITICAL_BELOW) {
            // NaN 同样落入此分支
            Some(SafetyRule::AvailabilityCritical)
        } else if availability < AVAILABILITY_MAINTENANCE_BELOW {
            Some(SafetyRule::AvailabilityDegraded)
        } else {
            None
        }
    }

    pub fn evaluate(
        &self,
        record: &TrainsetRecord,
        candidate: TrainsetStatus,
        now: DateTime<Utc>,
    ) -> SafetyVerdict {
        match self.first_matching_rule(record, now) {
            Some(rule) => SafetyVerdict::Enforced { rule, candidate },
            None => SafetyVerdict::Accepted(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trainset::{FitnessCertificate, JobCard, Trainset};
    use crate::domain::types::{CertificateType, JobCardStatus};
    use chrono::{Duration, NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 6, 0, 0).unwrap()
    }

    fn record(availability: f64) -> TrainsetRecord {
        TrainsetRecord {
            trainset: Trainset {
                id: "T1".to_string(),
                number: "KMRL-001".to_string(),
                status: TrainsetStatus::Ready,
                bay_position: 3,
                mileage: 50_000,
                last_cleaning: now() - Duration::days(1),
                branding_priority: 4,
                availability_percentage: availability,
            },
            certificates: vec![],
            job_cards: vec![],
        }
    }

    fn cert(expiry: NaiveDate) -> FitnessCertificate {
        FitnessCertificate {
            id: "C1".to_string(),
            trainset_id: "T1".to_string(),
            certificate_type: CertificateType::Signalling,
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            expiry_date: expiry,
        }
    }

    fn card(status: JobCardStatus, priority: Option<i32>) -> JobCard {
        JobCard {
            id: "J1".to_string(),
            trainset_id: "T1".to_string(),
            status,
            priority,
            description: Some("brake inspection".to_string()),
        }
    }

    #[test]
    fn test_expired_certificate_wins_over_everything() {
        let mut r = record(99.0);
        r.certificates.push(cert(NaiveDate::from_ymd_opt(2026, 5, 31).unwrap()));
        r.job_cards.push(card(JobCardStatus::Open, Some(5)));
        let v = SafetyValidator::new().evaluate(&r, TrainsetStatus::Ready, now());
        assert_eq!(v.rule(), Some(SafetyRule::ExpiredCertificate));
        assert_eq!(v.status(), TrainsetStatus::Critical);
        assert!(v.overrode_candidate());
    }

    #[test]
    fn test_certificate_expiring_today_counts_as_expired() {
        let mut r = record(99.0);
        r.certificates.push(cert(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
        let v = SafetyValidator::new().evaluate(&r, TrainsetStatus::Ready, now());
        assert_eq!(v.status(), TrainsetStatus::Critical);
    }

    #[test]
    fn test_closed_or_low_priority_cards_do_not_trigger() {
        let mut r = record(99.0);
        r.job_cards.push(card(JobCardStatus::Closed, Some(9)));
        r.job_cards.push(card(JobCardStatus::Open, Some(3)));
        r.job_cards.push(card(JobCardStatus::Open, None));
        let v = SafetyValidator::new().evaluate(&r, TrainsetStatus::Standby, now());
        assert_eq!(v, SafetyVerdict::Accepted(TrainsetStatus::Standby));
    }

    #[test]
    fn test_availability_thresholds() {
        let validator = SafetyValidator::new();
        let cases = [
            (74.99, TrainsetStatus::Critical),
            (75.0, TrainsetStatus::Maintenance),
            (89.99, TrainsetStatus::Maintenance),
            (90.0, TrainsetStatus::Ready),
            (f64::NAN, TrainsetStatus::Critical),
        ];
        for (availability, expected) in cases {
            let v = validator.evaluate(&record(availability), TrainsetStatus::Ready, now());
            assert_eq!(v.status(), expected, "availability={}", availability);
        }
    }

    #[test]
    fn test_confirmed_rule_is_not_an_override() {
        let v = SafetyValidator::new().evaluate(&record(80.0), TrainsetStatus::Maintenance, now());
        assert_eq!(v.rule(), Some(SafetyRule::AvailabilityDegraded));
        assert!(!v.overrode_candidate());
    }

    fn any_status() -> impl Strategy<Value = TrainsetStatus> {
        prop::sample::select(TrainsetStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_expired_certificate_never_deployable(
            availability in 0.0f64..=100.0,
            days_ago in 0i64..400,
            candidate in any_status(),
        ) {
            let mut r = record(availability);
            r.certificates.push(cert(now().date_naive() - Duration::days(days_ago)));
            let v = SafetyValidator::new().evaluate(&r, candidate, now());
            prop_assert_eq!(v.status(), TrainsetStatus::Critical);
        }

        #[test]
        fn prop_severe_open_card_never_deployable(
            availability in 0.0f64..=100.0,
            priority in 4i32..=10,
            candidate in any_status(),
        ) {
            let mut r = record(availability);
            r.job_cards.push(card(JobCardStatus::Open, Some(priority)));
            let v = SafetyValidator::new().evaluate(&r, candidate, now());
            prop_assert_eq!(v.status(), TrainsetStatus::Critical);
        }

        #[test]
        fn prop_healthy_trainset_keeps_candidate(
            availability in 90.0f64..=100.0,
            candidate in any_status(),
        ) {
            let v = SafetyValidator::new().evaluate(&record(availability), candidate, now());
            prop_assert_eq!(v, SafetyVerdict::Accepted(candidate));
        }
    }
}
