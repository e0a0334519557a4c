// ==========================================
// 列车投运排程 - 推荐源抽象
// ==========================================
// 职责: 为车队快照生成每车原始候选（尽力而为）
// 实现者: RemoteModelAdapter（远程预测模型）/ HeuristicFallback（本地兜底）
// 红线: 推荐源无副作用；安全校验不在此层
// ==========================================

use crate::domain::recommendation::RawCandidate;
use crate::domain::trainset::FleetSnapshot;
use crate::engine::error::SourceError;
use crate::engine::features::ModelInput;
use async_trait::async_trait;

/// 推荐源输入
pub struct SourceRequest<'a> {
    pub snapshot: &'a FleetSnapshot,
    pub input: &'a ModelInput,
}

/// 推荐源 Trait
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// 推荐源名称（日志用）
    fn name(&self) -> &'static str;

    /// 生成原始候选
    ///
    /// # 返回
    /// - Ok: 候选列表（可能缺车、可能含畸形字段）
    /// - Err(UpstreamUnavailable): 调用方转入兜底
    async fn generate(&self, request: &SourceRequest<'_>) -> Result<Vec<RawCandidate>, SourceError>;
}
