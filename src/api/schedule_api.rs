// ==========================================
// 列车投运排程 - 排程 API
// ==========================================
// 职责: 解析请求 → 读取配置 → 选择推荐源 → 调用 SchedulingEngine → 组装响应
// 约束: 远程模型启用但缺少凭据 → ConfigurationMissing（不产生任何推荐）
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::api::dto::{ScheduleRequest, ScheduleResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::config::model_settings::ModelSettings;
use crate::domain::recommendation::Recommendation;
use crate::engine::cancel::RunCancellation;
use crate::engine::error::SourceError;
use crate::engine::heuristic::HeuristicFallback;
use crate::engine::normalizer::RecommendationNormalizer;
use crate::engine::orchestrator::{RunOutcome, SchedulingEngine, SchedulingRun};
use crate::engine::remote_model::RemoteModelAdapter;
use crate::engine::source::RecommendationSource;
use crate::repository::DailyScheduleRepository;

// ==========================================
// ScheduleApi - 排程 API
// ==========================================
pub struct ScheduleApi {
    engine: Arc<SchedulingEngine>,
    config_manager: Arc<ConfigManager>,
    schedule_repo: Arc<DailyScheduleRepository>,
    /// 替换远程模型（测试或外部接入）
    source_override: Option<Arc<dyn RecommendationSource>>,
    /// 固定评估时间（None = 当前时间）
    evaluated_at: Option<DateTime<Utc>>,
}

impl ScheduleApi {
    pub fn new(
        engine: Arc<SchedulingEngine>,
        config_manager: Arc<ConfigManager>,
        schedule_repo: Arc<DailyScheduleRepository>,
    ) -> Self {
        Self {
            engine,
            config_manager,
            schedule_repo,
            source_override: None,
            evaluated_at: None,
        }
    }

    /// 使用指定推荐源代替远程模型（凭据检查随之跳过）
    pub fn with_source_override(mut self, source: Arc<dyn RecommendationSource>) -> Self {
        self.source_override = Some(source);
        self
    }

    pub fn with_evaluation_time(mut self, at: DateTime<Utc>) -> Self {
        self.evaluated_at = Some(at);
        self
    }

    // ==========================================
    // 排程生成
    // ==========================================

    /// 生成排程（错误折叠为 success=false 响应）
    pub async fn generate_schedule(&self, request: ScheduleRequest) -> ScheduleResponse {
        self.generate_schedule_with_cancel(request, RunCancellation::never())
            .await
    }

    pub async fn generate_schedule_with_cancel(
        &self,
        request: ScheduleRequest,
        cancel: RunCancellation,
    ) -> ScheduleResponse {
        match self.run_schedule(request, cancel).await {
            Ok(outcome) => ScheduleResponse::from_outcome(outcome, Utc::now()),
            Err(e) => {
                warn!(error = %e, "排程失败");
                ScheduleResponse::failure(e.to_string())
            }
        }
    }

    /// 执行排程并返回完整结果
    ///
    /// # 返回
    /// - Ok(RunOutcome): 排程完成（可能含单车落库失败）
    /// - Err(ApiError): 输入非法或致命错误
    pub async fn run_schedule(
        &self,
        request: ScheduleRequest,
        cancel: RunCancellation,
    ) -> ApiResult<RunOutcome> {
        let schedule_date = parse_schedule_date(&request.schedule_date)?;

        // 已配置的车队约束优先于请求约束
        let constraints = match self.config_manager.get_fleet_constraints()? {
            Some(stored) => {
                info!("使用已配置的车队约束");
                stored
            }
            None => request.constraints,
        };
        constraints.validate().map_err(ApiError::InvalidInput)?;

        let model_settings = self.config_manager.get_model_settings()?;
        let fallback = HeuristicFallback::new(self.config_manager.get_fallback_settings()?);
        let remote = self.resolve_remote(&model_settings)?;

        let run = SchedulingRun {
            schedule_date,
            constraints,
            force_recompute: request.force_recompute,
            remote,
            fallback,
            model_version: model_settings.model_version.clone(),
            evaluated_at: self.evaluated_at,
        };

        Ok(self.engine.run(run, cancel).await?)
    }

    /// 处理 JSON 请求体，返回 JSON 响应体
    pub async fn handle_json(&self, body: &str) -> String {
        let response = match serde_json::from_str::<ScheduleRequest>(body) {
            Ok(request) => self.generate_schedule(request).await,
            Err(e) => ScheduleResponse::failure(
                ApiError::InvalidInput(format!("请求体解析失败: {}", e)).to_string(),
            ),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"响应序列化失败: {}"}}"#, e)
        })
    }

    // ==========================================
    // 排程查询
    // ==========================================

    /// 查询已落库的当日排程
    pub fn get_schedule(&self, schedule_date: &str) -> ApiResult<Vec<Recommendation>> {
        let date = parse_schedule_date(schedule_date)?;
        let rows = self.schedule_repo.find_by_date(date)?;
        let normalizer = RecommendationNormalizer::new();
        Ok(rows
            .into_iter()
            .map(|r| normalizer.stored_recommendation(r))
            .collect())
    }

    // ==========================================
    // 推荐源选择
    // ==========================================

    fn resolve_remote(
        &self,
        settings: &ModelSettings,
    ) -> ApiResult<Option<Arc<dyn RecommendationSource>>> {
        if let Some(source) = &self.source_override {
            return Ok(Some(source.clone()));
        }

        if !settings.enabled {
            info!("远程模型已关闭，直接使用兜底规则");
            return Ok(None);
        }

        let api_key = self.config_manager.get_model_api_key()?;
        match RemoteModelAdapter::new(settings.clone(), api_key) {
            Ok(adapter) => {
                let source: Arc<dyn RecommendationSource> = Arc::new(adapter);
                Ok(Some(source))
            }
            Err(SourceError::ConfigurationMissing(msg)) => Err(ApiError::ConfigurationMissing(msg)),
            Err(e) => {
                warn!(error = %e, "远程模型客户端初始化失败，使用兜底规则");
                Ok(None)
            }
        }
    }
}

/// 解析排程日期（取前 10 位 YYYY-MM-DD）
pub fn parse_schedule_date(raw: &str) -> ApiResult<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|e| ApiError::InvalidInput(format!("排程日期格式错误 ({}): {}", raw, e)))
}
