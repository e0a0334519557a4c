// ==========================================
// 列车投运排程 - 模型输入特征
// ==========================================
// 职责: 由车队快照派生每车特征，组装预测模型请求体
// 说明: 同一份输入也写入 ai_training_data
// ==========================================

use crate::domain::constraints::SchedulingConstraints;
use crate::domain::kpi::KpiMetric;
use crate::domain::trainset::{FleetSnapshot, TrainsetRecord};
use crate::domain::types::{CertificateType, TrainsetStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单车特征
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainsetFeatures {
    pub id: String,
    pub number: String,
    pub current_status: TrainsetStatus,
    pub bay_position: i32,
    pub mileage: u64,
    pub last_cleaning_days: i64,
    pub branding_priority: u8,
    pub availability: f64,
    /// 每张证书距到期天数
    pub fitness_expiry_days: Vec<i64>,
    /// 按证书类型取最近到期天数
    pub fitness_expiry_by_type: BTreeMap<CertificateType, i64>,
    pub open_job_cards: usize,
    /// 工单优先级合计（缺失按 3 计）
    pub maintenance_priority: i64,
}

impl TrainsetFeatures {
    pub fn derive(record: &TrainsetRecord, now: DateTime<Utc>) -> Self {
        let ts = &record.trainset;

        let mut by_type: BTreeMap<CertificateType, i64> = BTreeMap::new();
        let expiry_days: Vec<i64> = record
            .certificates
            .iter()
            .map(|c| {
                let days = c.days_to_expiry(now);
                by_type
                    .entry(c.certificate_type)
                    .and_modify(|d| *d = (*d).min(days))
                    .or_insert(days);
                days
            })
            .collect();

        Self {
            id: ts.id.clone(),
            number: ts.number.clone(),
            current_status: ts.status,
            bay_position: ts.bay_position,
            mileage: ts.mileage,
            last_cleaning_days: ts.days_since_cleaning(now),
            branding_priority: ts.branding_priority,
            availability: ts.availability_percentage,
            fitness_expiry_days: expiry_days,
            fitness_expiry_by_type: by_type,
            open_job_cards: record.open_job_card_count(),
            maintenance_priority: record.maintenance_priority_sum(),
        }
    }
}

/// 模型输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub trainsets: Vec<TrainsetFeatures>,
    pub constraints: SchedulingConstraints,
    pub schedule_date: NaiveDate,
    pub historical_kpis: Vec<KpiMetric>,
}

impl ModelInput {
    pub fn build(
        snapshot: &FleetSnapshot,
        constraints: &SchedulingConstraints,
        schedule_date: NaiveDate,
        historical_kpis: Vec<KpiMetric>,
    ) -> Self {
        Self {
            trainsets: snapshot
                .trainsets
                .iter()
                .map(|r| TrainsetFeatures::derive(r, snapshot.taken_at))
                .collect(),
            constraints: constraints.clone(),
            schedule_date,
            historical_kpis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trainset::{FitnessCertificate, Trainset};
    use chrono::TimeZone;

    #[test]
    fn test_expiry_by_type_keeps_nearest() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let cert = |id: &str, t: CertificateType, d: u32| FitnessCertificate {
            id: id.to_string(),
            trainset_id: "T1".to_string(),
            certificate_type: t,
            issue_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 5, d).unwrap(),
        };
        let record = TrainsetRecord {
            trainset: Trainset {
                id: "T1".to_string(),
                number: "TS-01".to_string(),
                status: TrainsetStatus::Standby,
                bay_position: 4,
                mileage: 120_000,
                last_cleaning: now,
                branding_priority: 7,
                availability_percentage: 93.5,
            },
            certificates: vec![
                cert("C1", CertificateType::Telecom, 21),
                cert("C2", CertificateType::Telecom, 11),
                cert("C3", CertificateType::Signalling, 31),
            ],
            job_cards: vec![],
        };

        let f = TrainsetFeatures::derive(&record, now);
        assert_eq!(f.fitness_expiry_days, vec![20, 10, 30]);
        assert_eq!(f.fitness_expiry_by_type[&CertificateType::Telecom], 10);
        assert_eq!(f.fitness_expiry_by_type[&CertificateType::Signalling], 30);
        assert!(!f.fitness_expiry_by_type.contains_key(&CertificateType::RollingStock));
        assert_eq!(f.last_cleaning_days, 0);
    }
}
