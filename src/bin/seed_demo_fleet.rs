// Seed a demo fleet (25 trainsets with certificates, job cards and 30 days of KPIs).
//
// Usage:
//   cargo run --bin seed_demo_fleet -- [db_path]
//
// Re-running updates trainsets in place; certificates/job cards/KPIs are only
// inserted into an empty database.

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trainset_induction::app::{get_default_db_path, AppState};
use trainset_induction::domain::{
    CertificateType, FitnessCertificate, JobCard, JobCardStatus, KpiMetric, Trainset,
    TrainsetStatus,
};
use trainset_induction::logging;

const FLEET_SIZE: usize = 25;
const SEED: u64 = 2024;

fn main() -> anyhow::Result<()> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path.clone())
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let fleet = &state.repositories.fleet_repo;
    let kpis = &state.repositories.kpi_repo;
    let already_seeded = !fleet
        .load_snapshot(Utc::now())
        .context("读取现有车队失败")?
        .is_empty();

    let mut rng = StdRng::seed_from_u64(SEED);
    let now = Utc::now();
    let today = now.date_naive();

    for i in 1..=FLEET_SIZE {
        let id = format!("TS-{:02}", i);
        let status = match i % 7 {
            0 => TrainsetStatus::Maintenance,
            3 => TrainsetStatus::Standby,
            _ => TrainsetStatus::Ready,
        };

        fleet
            .upsert_trainset(&Trainset {
                id: id.clone(),
                number: format!("KMRL-{:03}", i),
                status,
                bay_position: i as i32,
                mileage: rng.random_range(80_000..=240_000),
                last_cleaning: now - Duration::hours(rng.random_range(6..=240)),
                branding_priority: rng.random_range(1..=10),
                availability_percentage: f64::from(rng.random_range(650..=1000u16)) / 10.0,
            })
            .with_context(|| format!("写入列车 {} 失败", id))?;

        if already_seeded {
            continue;
        }

        for (k, certificate_type) in [
            CertificateType::RollingStock,
            CertificateType::Signalling,
            CertificateType::Telecom,
        ]
        .into_iter()
        .enumerate()
        {
            // 每 9 列车中有一列存在已过期证书
            let days_left: i64 = if i % 9 == 0 && k == 0 {
                -2
            } else {
                rng.random_range(3..=180)
            };
            fleet.insert_certificate(&FitnessCertificate {
                id: format!("{}-C{}", id, k + 1),
                trainset_id: id.clone(),
                certificate_type,
                issue_date: today - Duration::days(365),
                expiry_date: today + Duration::days(days_left),
            })?;
        }

        let open_cards = rng.random_range(0..=2);
        for n in 0..open_cards {
            fleet.insert_job_card(&JobCard {
                id: format!("{}-J{}", id, n + 1),
                trainset_id: id.clone(),
                status: JobCardStatus::Open,
                priority: Some(rng.random_range(1..=5)),
                description: Some("Routine inspection follow-up".to_string()),
            })?;
        }
    }

    if !already_seeded {
        for d in 0..30 {
            kpis.insert(&KpiMetric {
                metric_date: today - Duration::days(d),
                punctuality_percentage: Some(f64::from(rng.random_range(970..=999u16)) / 10.0),
                fleet_availability: Some(f64::from(rng.random_range(850..=980u16)) / 10.0),
                maintenance_cost: Some(f64::from(rng.random_range(40_000..=90_000u32))),
                energy_consumption: Some(f64::from(rng.random_range(12_000..=18_000u32))),
                passenger_satisfaction: Some(f64::from(rng.random_range(80..=98u8)) / 20.0),
            })?;
        }
    }

    tracing::info!(
        db_path = %db_path,
        trainsets = FLEET_SIZE,
        already_seeded,
        "演示车队数据写入完成"
    );
    println!("seeded {} trainsets into {}", FLEET_SIZE, db_path);
    Ok(())
}
