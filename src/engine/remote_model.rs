// ==========================================
// 列车投运排程 - 远程预测模型适配器
// ==========================================
// 职责: 整车队一次批量请求 chat-completions 接口，解析每车候选
// 失败: 传输错误/超时/非 2xx/响应无法解析 → UpstreamUnavailable
// 约束: 每次排程最多请求一次，不重试
// ==========================================

use crate::config::model_settings::ModelSettings;
use crate::domain::recommendation::{CandidateOrigin, RawCandidate};
use crate::engine::error::SourceError;
use crate::engine::features::ModelInput;
use crate::engine::source::{RecommendationSource, SourceRequest};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 系统提示词
pub const SYSTEM_PROMPT: &str = r#"You are an optimization expert for metro rail train induction planning.

Recommend which trainsets should be:
1. Ready for service (maximum revenue generation)
2. On standby (backup for service disruptions)
3. In maintenance (preventive/corrective maintenance)
4. Critical status (immediate attention required)

Consider: fitness certificate expiry (safety critical), open job cards, mileage balancing,
branding priority, cleaning schedule, bay position efficiency (minimize shunting),
the target punctuality and fleet availability.

Respond with a JSON object {"recommendations": [...]}, each entry containing:
- trainset_id: string
- recommended_status: "ready" | "standby" | "maintenance" | "critical"
- confidence_score: number (0-1)
- reasoning: string[] (key decision factors)
- priority_score: number (1-10, higher = more critical)
- risk_factors: string[] (potential issues)"#;

// ==========================================
// RemoteModelAdapter
// ==========================================
pub struct RemoteModelAdapter {
    endpoint: String,
    api_key: String,
    settings: ModelSettings,
    client: Client,
}

impl RemoteModelAdapter {
    /// 创建适配器
    ///
    /// # 返回
    /// - Err(ConfigurationMissing): 凭据或接口地址为空
    /// - Err(UpstreamUnavailable): HTTP 客户端无法构建
    pub fn new(settings: ModelSettings, api_key: Option<String>) -> Result<Self, SourceError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SourceError::ConfigurationMissing(
                    "DeepSeek API key not found. Please add it to the configuration secrets."
                        .to_string(),
                )
            })?;

        let endpoint = settings.endpoint.trim().to_string();
        if endpoint.is_empty() {
            return Err(SourceError::ConfigurationMissing(
                "prediction endpoint is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs.max(1)))
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| SourceError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            endpoint,
            api_key,
            settings,
            client,
        })
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// 组装请求体
    pub fn build_body(&self, input: &ModelInput) -> Result<Value, SourceError> {
        let input_json = serde_json::to_string(input)
            .map_err(|e| SourceError::UpstreamUnavailable(format!("输入序列化失败: {}", e)))?;

        Ok(json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "Optimize train scheduling for {}: {}",
                        input.schedule_date, input_json
                    )
                }
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "response_format": { "type": "json_object" }
        }))
    }
}

#[async_trait]
impl RecommendationSource for RemoteModelAdapter {
    fn name(&self) -> &'static str {
        "remote_model"
    }

    async fn generate(&self, request: &SourceRequest<'_>) -> Result<Vec<RawCandidate>, SourceError> {
        let body = self.build_body(request.input)?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| SourceError::ConfigurationMissing("invalid API key".to_string()))?;

        info!(
            endpoint = %self.endpoint,
            model = %self.settings.model,
            trainsets = request.input.trainsets.len(),
            "请求预测模型"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::UpstreamUnavailable(format!(
                "prediction service error: status {}",
                status
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SourceError::UpstreamUnavailable(format!("响应体解析失败: {}", e)))?;

        let candidates = parse_completion(&payload)?;
        debug!(count = candidates.len(), "预测模型返回候选");
        Ok(candidates)
    }
}

// ==========================================
// 响应解析
// ==========================================

/// 解析 chat-completions 响应
///
/// # 规则
/// - choices[0].message.content 必须是 JSON 文本
/// - 内容为 {"recommendations": [...]} 或直接为数组
/// - 非对象条目、缺 trainset_id 的条目丢弃（不报错）
pub fn parse_completion(payload: &Value) -> Result<Vec<RawCandidate>, SourceError> {
    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SourceError::UpstreamUnavailable("响应缺少 choices[0].message.content".to_string())
        })?;

    let parsed: Value = serde_json::from_str(content)
        .map_err(|e| SourceError::UpstreamUnavailable(format!("模型输出不是合法 JSON: {}", e)))?;

    let entries = match &parsed {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("recommendations") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(SourceError::UpstreamUnavailable(
                    "模型输出缺少 recommendations 数组".to_string(),
                ))
            }
        },
        _ => {
            return Err(SourceError::UpstreamUnavailable(
                "模型输出既不是对象也不是数组".to_string(),
            ))
        }
    };

    let mut candidates = Vec::with_capacity(entries.len());
    for entry in entries {
        match candidate_from_entry(entry) {
            Some(c) => candidates.push(c),
            None => warn!(entry = %entry, "丢弃无法识别的模型候选"),
        }
    }
    Ok(candidates)
}

fn candidate_from_entry(entry: &Value) -> Option<RawCandidate> {
    let obj = entry.as_object()?;
    let trainset_id = match obj.get("trainset_id")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let field = |name: &str| obj.get(name).cloned().unwrap_or(Value::Null);
    Some(RawCandidate {
        trainset_id,
        origin: CandidateOrigin::Model,
        recommended_status: field("recommended_status"),
        confidence_score: field("confidence_score"),
        priority_score: field("priority_score"),
        reasoning: field("reasoning"),
        risk_factors: field("risk_factors"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(content: &str) -> Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[test]
    fn test_parse_recommendations_object() {
        let payload = completion(
            r#"{"recommendations": [
                {"trainset_id": "T1", "recommended_status": "ready", "confidence_score": 0.91,
                 "reasoning": ["fit"], "priority_score": 2, "risk_factors": []},
                {"trainset_id": "T2", "recommended_status": "standby"}
            ]}"#,
        );
        let c = parse_completion(&payload).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].trainset_id, "T1");
        assert_eq!(c[0].confidence_score, json!(0.91));
        assert!(c[1].reasoning.is_null());
        assert!(c.iter().all(|x| x.origin == CandidateOrigin::Model));
    }

    #[test]
    fn test_parse_bare_array_and_skip_garbage_entries() {
        let payload = completion(r#"[{"trainset_id": "T1"}, 42, {"status": "ready"}, {"trainset_id": ""}]"#);
        let c = parse_completion(&payload).unwrap();
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_unparsable_payload_is_upstream_unavailable() {
        let err = parse_completion(&completion("I think T1 should run")).unwrap_err();
        assert!(matches!(err, SourceError::UpstreamUnavailable(_)));

        let err = parse_completion(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, SourceError::UpstreamUnavailable(_)));

        let err = parse_completion(&completion(r#"{"result": "ok"}"#)).unwrap_err();
        assert!(matches!(err, SourceError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_missing_api_key_is_configuration_missing() {
        let err = RemoteModelAdapter::new(ModelSettings::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::ConfigurationMissing(_)));

        let err = RemoteModelAdapter::new(ModelSettings::default(), Some("  ".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::ConfigurationMissing(_)));

        let settings = ModelSettings {
            endpoint: String::new(),
            ..ModelSettings::default()
        };
        let err = RemoteModelAdapter::new(settings, Some("sk".to_string())).err().unwrap();
        assert!(matches!(err, SourceError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_request_body_carries_settings() {
        let adapter =
            RemoteModelAdapter::new(ModelSettings::default(), Some("sk-test".to_string())).unwrap();
        let input = ModelInput {
            trainsets: vec![],
            constraints: Default::default(),
            schedule_date: chrono::NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            historical_kpis: vec![],
        };
        let body = adapter.build_body(&input).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["response_format"]["type"], "json_object");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.starts_with("Optimize train scheduling for 2026-06-01"));
    }
}
