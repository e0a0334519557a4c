// ==========================================
// 列车投运排程 - 列车/证书/工单领域模型
// ==========================================
// 职责: 单次排程使用的只读车队快照
// 红线: 不含数据访问逻辑,不含排程规则
// ==========================================

use crate::domain::types::{CertificateType, JobCardStatus, TrainsetStatus};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// 严重工单阈值: 未关闭且 priority >= 4 视为安全相关
pub const CRITICAL_JOB_PRIORITY: i32 = 4;

/// 工单缺失 priority 时的默认值
pub const DEFAULT_JOB_PRIORITY: i32 = 3;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ==========================================
// Trainset - 列车
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trainset {
    pub id: String,                   // 列车ID
    pub number: String,               // 车号
    pub status: TrainsetStatus,       // 当前状态 (仅供参考)
    pub bay_position: i32,            // 股道位置 (调车距离推算)
    pub mileage: u64,                 // 累计里程
    pub last_cleaning: DateTime<Utc>, // 最近清洁时间
    pub branding_priority: u8,        // 广告优先级 [1,10]
    pub availability_percentage: f64, // 近期可用率 [0,100]
}

impl Trainset {
    /// 距上次清洁天数（向上取整）
    pub fn days_since_cleaning(&self, now: DateTime<Utc>) -> i64 {
        ceil_days((now - self.last_cleaning).num_milliseconds())
    }
}

// ==========================================
// FitnessCertificate - 适用性证书
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessCertificate {
    pub id: String,
    pub trainset_id: String,
    pub certificate_type: CertificateType,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
}

impl FitnessCertificate {
    /// 到期时刻（到期日 00:00 UTC）
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expiry_date.and_time(NaiveTime::MIN).and_utc()
    }

    /// 是否已过期（到期时刻 <= 评估时刻）
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }

    /// 距到期天数（向上取整，已过期为负）
    pub fn days_to_expiry(&self, now: DateTime<Utc>) -> i64 {
        ceil_days((self.expires_at() - now).num_milliseconds())
    }
}

// ==========================================
// JobCard - 工单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCard {
    pub id: String,
    pub trainset_id: String,
    pub status: JobCardStatus,
    pub priority: Option<i32>, // 越大越严重
    pub description: Option<String>,
}

impl JobCard {
    pub fn is_open(&self) -> bool {
        self.status == JobCardStatus::Open
    }

    pub fn is_safety_significant(&self) -> bool {
        self.is_open() && self.priority.unwrap_or(0) >= CRITICAL_JOB_PRIORITY
    }
}

// ==========================================
// TrainsetRecord - 列车 + 关联证书/工单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainsetRecord {
    pub trainset: Trainset,
    pub certificates: Vec<FitnessCertificate>,
    pub job_cards: Vec<JobCard>,
}

impl TrainsetRecord {
    pub fn id(&self) -> &str {
        &self.trainset.id
    }

    pub fn has_expired_certificate(&self, now: DateTime<Utc>) -> bool {
        self.certificates.iter().any(|c| c.is_expired(now))
    }

    pub fn nearest_expiry(&self) -> Option<NaiveDate> {
        self.certificates.iter().map(|c| c.expiry_date).min()
    }

    pub fn open_job_cards(&self) -> impl Iterator<Item = &JobCard> {
        self.job_cards.iter().filter(|j| j.is_open())
    }

    pub fn open_job_card_count(&self) -> usize {
        self.open_job_cards().count()
    }

    pub fn has_critical_open_job_card(&self) -> bool {
        self.job_cards.iter().any(|j| j.is_safety_significant())
    }

    /// 工单优先级合计（全部工单，缺失按 3 计）
    pub fn maintenance_priority_sum(&self) -> i64 {
        self.job_cards
            .iter()
            .map(|j| i64::from(j.priority.unwrap_or(DEFAULT_JOB_PRIORITY)))
            .sum()
    }
}

// ==========================================
// FleetSnapshot - 单次排程的车队快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub taken_at: DateTime<Utc>,
    pub trainsets: Vec<TrainsetRecord>,
}

impl FleetSnapshot {
    pub fn new(taken_at: DateTime<Utc>, trainsets: Vec<TrainsetRecord>) -> Self {
        Self { taken_at, trainsets }
    }

    pub fn len(&self) -> usize {
        self.trainsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trainsets.is_empty()
    }

    pub fn get(&self, trainset_id: &str) -> Option<&TrainsetRecord> {
        self.trainsets.iter().find(|r| r.id() == trainset_id)
    }
}

fn ceil_days(millis: i64) -> i64 {
    (millis as f64 / MILLIS_PER_DAY).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap()
    }

    fn cert(expiry: NaiveDate) -> FitnessCertificate {
        FitnessCertificate {
            id: "C1".to_string(),
            trainset_id: "T1".to_string(),
            certificate_type: CertificateType::Telecom,
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            expiry_date: expiry,
        }
    }

    #[test]
    fn test_certificate_expiring_today_is_expired() {
        // 到期日零点已过
        let c = cert(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert!(c.is_expired(now()));
        assert_eq!(c.days_to_expiry(now()), 0);

        let c = cert(NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert!(!c.is_expired(now()));
        assert_eq!(c.days_to_expiry(now()), 1);
    }

    #[test]
    fn test_maintenance_priority_sum_defaults_missing_priority() {
        let record = TrainsetRecord {
            trainset: Trainset {
                id: "T1".to_string(),
                number: "TS-01".to_string(),
                status: TrainsetStatus::Ready,
                bay_position: 1,
                mileage: 1000,
                last_cleaning: now() - chrono::Duration::hours(30),
                branding_priority: 5,
                availability_percentage: 97.0,
            },
            certificates: vec![],
            job_cards: vec![
                JobCard {
                    id: "J1".to_string(),
                    trainset_id: "T1".to_string(),
                    status: JobCardStatus::Closed,
                    priority: Some(5),
                    description: None,
                },
                JobCard {
                    id: "J2".to_string(),
                    trainset_id: "T1".to_string(),
                    status: JobCardStatus::Open,
                    priority: None,
                    description: None,
                },
            ],
        };

        assert_eq!(record.maintenance_priority_sum(), 8);
        assert_eq!(record.open_job_card_count(), 1);
        // 已关闭的 5 级工单不算安全相关
        assert!(!record.has_critical_open_job_card());
        assert_eq!(record.trainset.days_since_cleaning(now()), 2);
    }
}
