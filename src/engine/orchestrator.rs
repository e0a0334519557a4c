// ==========================================
// 列车投运排程 - 排程编排器
// ==========================================
// 主流程: 快照 → 候选（已落库行 / 远程，失败则兜底）→ 安全校验 → 字段规整
//         → 汇总 → 逐车落库 → 训练数据
// 致命: ConfigurationMissing / SnapshotFetchFailure / EmptyRun / Cancelled
// 非致命: UpstreamUnavailable（兜底）、单车落库失败（记入结果）
// ==========================================

use crate::domain::constraints::SchedulingConstraints;
use crate::domain::recommendation::{CandidateOrigin, RawCandidate, Recommendation, RunSummary};
use crate::domain::trainset::FleetSnapshot;
use crate::engine::cancel::RunCancellation;
use crate::engine::error::{PersistenceFailure, SchedulingError, SourceError};
use crate::engine::features::ModelInput;
use crate::engine::heuristic::HeuristicFallback;
use crate::engine::normalizer::RecommendationNormalizer;
use crate::engine::repositories::{FleetStore, ScheduleStore};
use crate::engine::safety::SafetyValidator;
use crate::engine::source::{RecommendationSource, SourceRequest};
use crate::engine::summary::SummaryAggregator;
use crate::repository::{TrainingDataRecord, DEFAULT_KPI_HISTORY_LIMIT};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// ==========================================
// SchedulingRun - 单次排程参数
// ==========================================
pub struct SchedulingRun {
    pub schedule_date: NaiveDate,
    pub constraints: SchedulingConstraints,
    /// false 且当日已有排程时以已落库行为候选（仍重新校验）
    pub force_recompute: bool,
    /// None 表示远程模型已关闭
    pub remote: Option<Arc<dyn RecommendationSource>>,
    pub fallback: HeuristicFallback,
    /// 训练数据中记录的模型版本（走兜底时记为 heuristic）
    pub model_version: String,
    /// 评估时间（None = 当前时间）
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl SchedulingRun {
    pub fn new(schedule_date: NaiveDate, constraints: SchedulingConstraints) -> Self {
        Self {
            schedule_date,
            constraints,
            force_recompute: false,
            remote: None,
            fallback: HeuristicFallback::default(),
            model_version: "heuristic".to_string(),
            evaluated_at: None,
        }
    }
}

// ==========================================
// RunOutcome - 排程结果
// ==========================================
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub recommendations: Vec<Recommendation>,
    pub summary: RunSummary,
    /// 实际采用的候选主要来源（Model / Heuristic / Stored）
    pub primary_origin: CandidateOrigin,
    pub reused_stored: bool,
    pub persistence_failures: Vec<PersistenceFailure>,
    /// 校验过程中被取消（已校验部分仍已落库）
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

impl RunOutcome {
    /// 全部落库成功且未被取消
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.persistence_failures.is_empty()
    }
}

// ==========================================
// SchedulingEngine - 排程编排器
// ==========================================
pub struct SchedulingEngine {
    fleet: Arc<dyn FleetStore>,
    schedules: Arc<dyn ScheduleStore>,
    validator: SafetyValidator,
    normalizer: RecommendationNormalizer,
    aggregator: SummaryAggregator,
}

impl SchedulingEngine {
    pub fn new(fleet: Arc<dyn FleetStore>, schedules: Arc<dyn ScheduleStore>) -> Self {
        Self {
            fleet,
            schedules,
            validator: SafetyValidator::new(),
            normalizer: RecommendationNormalizer::new(),
            aggregator: SummaryAggregator::new(),
        }
    }

    /// 执行一次排程
    pub async fn run(
        &self,
        run: SchedulingRun,
        cancel: RunCancellation,
    ) -> Result<RunOutcome, SchedulingError> {
        let started_at = run.evaluated_at.unwrap_or_else(Utc::now);
        info!(
            schedule_date = %run.schedule_date,
            force_recompute = run.force_recompute,
            remote_enabled = run.remote.is_some(),
            "开始执行排程"
        );

        if cancel.is_cancelled() {
            return Err(SchedulingError::Cancelled);
        }

        // ==========================================
        // 步骤1: 读取车队快照
        // ==========================================
        debug!("步骤1: 读取车队快照");
        let snapshot = self
            .fleet
            .load_snapshot(started_at)
            .map_err(|e| SchedulingError::SnapshotFetchFailure(e.to_string()))?;
        info!(trainsets = snapshot.len(), "车队快照读取完成");

        // ==========================================
        // 步骤2: 获取候选
        // ==========================================
        // 已落库行作为候选（不再请求推荐源）；否则远程优先，失败兜底
        debug!("步骤2: 获取推荐候选");
        let stored = if run.force_recompute {
            Vec::new()
        } else {
            self.stored_candidates(&snapshot, run.schedule_date)?
        };

        let (candidates, sourced_origin, input) = if !stored.is_empty() {
            info!(rows = stored.len(), "当日排程已存在，按当前车队数据重新校验");
            (stored, CandidateOrigin::Stored, None)
        } else {
            let kpis = self
                .fleet
                .recent_kpis(DEFAULT_KPI_HISTORY_LIMIT)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "KPI 历史读取失败，按空历史继续");
                    Vec::new()
                });
            let input = ModelInput::build(&snapshot, &run.constraints, run.schedule_date, kpis);
            let request = SourceRequest {
                snapshot: &snapshot,
                input: &input,
            };
            let (candidates, origin) = self.source_candidates(&run, &request, &cancel).await?;
            (candidates, origin, Some(input))
        };
        info!(
            candidates = candidates.len(),
            origin = %sourced_origin,
            "推荐候选获取完成"
        );

        // ==========================================
        // 步骤3: 安全校验 + 字段规整
        // ==========================================
        debug!("步骤3: 安全校验与字段规整");
        let (recommendations, cancelled) =
            self.validate_all(&snapshot, candidates, &run.fallback, &cancel);

        if cancelled && recommendations.is_empty() {
            return Err(SchedulingError::Cancelled);
        }

        let primary_origin = effective_origin(sourced_origin, &recommendations);
        if primary_origin != sourced_origin {
            warn!(
                sourced = %sourced_origin,
                "推荐源候选未匹配任何快照列车，按兜底来源记录"
            );
        }

        // ==========================================
        // 步骤4: 汇总（空推荐集在落库前失败）
        // ==========================================
        let summary = self
            .aggregator
            .aggregate(&recommendations, snapshot.len(), started_at)?;
        info!(
            total = summary.total_trainsets,
            average_confidence = summary.average_confidence,
            high_risk = summary.high_risk_count,
            "汇总完成"
        );

        // ==========================================
        // 步骤5: 逐车落库
        // ==========================================
        debug!("步骤5: 写入每日排程");
        let persistence_failures = self.persist(run.schedule_date, &recommendations);

        // ==========================================
        // 步骤6: 训练数据（复用已落库排程时不记录）
        // ==========================================
        if let (false, Some(input)) = (cancelled, &input) {
            let model_version = match primary_origin {
                CandidateOrigin::Heuristic => "heuristic".to_string(),
                _ => run.model_version.clone(),
            };
            self.record_training_data(run.schedule_date, input, &recommendations, model_version);
        }

        info!(
            recommendations = recommendations.len(),
            persistence_failures = persistence_failures.len(),
            cancelled,
            "排程执行完成"
        );

        Ok(RunOutcome {
            recommendations,
            summary,
            primary_origin,
            reused_stored: sourced_origin == CandidateOrigin::Stored,
            persistence_failures,
            cancelled,
            started_at,
        })
    }

    /// 当日已落库且仍在快照中的列车 → 候选
    fn stored_candidates(
        &self,
        snapshot: &FleetSnapshot,
        schedule_date: NaiveDate,
    ) -> Result<Vec<RawCandidate>, SchedulingError> {
        let rows = self.schedules.rows_for_date(schedule_date)?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                let known = snapshot.get(&row.trainset_id).is_some();
                if !known {
                    debug!(trainset_id = %row.trainset_id, "已落库列车不在快照中，忽略");
                }
                known
            })
            .map(|row| self.normalizer.stored_candidate(row))
            .collect())
    }

    /// 远程推荐源至多请求一次；不可用时整车队走兜底
    async fn source_candidates(
        &self,
        run: &SchedulingRun,
        request: &SourceRequest<'_>,
        cancel: &RunCancellation,
    ) -> Result<(Vec<RawCandidate>, CandidateOrigin), SchedulingError> {
        if let Some(remote) = &run.remote {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SourceError::Cancelled),
                r = remote.generate(request) => r,
            };

            match result {
                Ok(candidates) => return Ok((candidates, CandidateOrigin::Model)),
                Err(SourceError::Cancelled) => {
                    info!("远程推荐请求已取消");
                    return Err(SchedulingError::Cancelled);
                }
                Err(SourceError::ConfigurationMissing(msg)) => {
                    return Err(SchedulingError::ConfigurationMissing(msg));
                }
                Err(SourceError::UpstreamUnavailable(msg)) => {
                    warn!(source = remote.name(), error = %msg, "远程推荐不可用，切换兜底规则");
                }
            }
        }

        Ok((run.fallback.generate_all(request), CandidateOrigin::Heuristic))
    }

    /// 逐车校验；返回 (推荐, 是否中途取消)
    fn validate_all(
        &self,
        snapshot: &FleetSnapshot,
        candidates: Vec<RawCandidate>,
        fallback: &HeuristicFallback,
        cancel: &RunCancellation,
    ) -> (Vec<Recommendation>, bool) {
        let now = snapshot.taken_at;

        let mut by_id: HashMap<String, RawCandidate> = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            if snapshot.get(&candidate.trainset_id).is_none() {
                warn!(trainset_id = %candidate.trainset_id, "候选列车不在快照中，已丢弃");
                continue;
            }
            by_id.entry(candidate.trainset_id.clone()).or_insert(candidate);
        }

        let mut recommendations = Vec::with_capacity(snapshot.len());
        for record in &snapshot.trainsets {
            if cancel.is_cancelled() {
                info!(validated = recommendations.len(), "排程在校验阶段被取消");
                return (recommendations, true);
            }

            let candidate = by_id.remove(record.id()).unwrap_or_else(|| {
                debug!(trainset_id = %record.id(), "推荐源未覆盖该列车，使用兜底候选");
                fallback.candidate_for(record, now)
            });

            let proposed = self.normalizer.candidate_status(&candidate);
            let verdict = self.validator.evaluate(record, proposed, now);
            if verdict.overrode_candidate() {
                info!(
                    trainset_id = %record.id(),
                    candidate = %proposed,
                    enforced = %verdict.status(),
                    rule = ?verdict.rule(),
                    "安全规则覆盖候选状态"
                );
            }

            recommendations.push(self.normalizer.normalize(candidate, &verdict));
        }

        (recommendations, false)
    }

    fn persist(
        &self,
        schedule_date: NaiveDate,
        recommendations: &[Recommendation],
    ) -> Vec<PersistenceFailure> {
        let mut failures = Vec::new();
        for rec in recommendations {
            if let Err(e) = self.schedules.upsert_row(&rec.to_schedule_row(schedule_date)) {
                error!(trainset_id = %rec.trainset_id, error = %e, "排程落库失败");
                failures.push(PersistenceFailure {
                    trainset_id: rec.trainset_id.clone(),
                    message: e.to_string(),
                });
            }
        }
        failures
    }

    fn record_training_data(
        &self,
        schedule_date: NaiveDate,
        input: &ModelInput,
        recommendations: &[Recommendation],
        model_version: String,
    ) {
        let tagged: Result<Vec<Value>, serde_json::Error> = recommendations
            .iter()
            .map(|rec| {
                let mut v = serde_json::to_value(rec)?;
                if let Value::Object(map) = &mut v {
                    map.insert("origin".to_string(), Value::from(rec.origin.as_str()));
                }
                Ok(v)
            })
            .collect();

        let record = match (serde_json::to_value(input), tagged) {
            (Ok(input_features), Ok(items)) => TrainingDataRecord {
                schedule_date,
                input_features,
                ai_recommendation: Value::Array(items),
                model_version,
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "训练数据序列化失败，跳过");
                return;
            }
        };

        if let Err(e) = self.schedules.record_training_data(&record) {
            warn!(error = %e, "训练数据写入失败");
        }
    }
}

/// 推荐源候选一条都未被采用时，结果实际全部来自兜底
fn effective_origin(
    sourced: CandidateOrigin,
    recommendations: &[Recommendation],
) -> CandidateOrigin {
    if recommendations.iter().any(|rec| rec.origin == sourced) {
        sourced
    } else {
        CandidateOrigin::Heuristic
    }
}
