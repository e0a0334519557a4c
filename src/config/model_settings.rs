use serde::{Deserialize, Serialize};

/// 预测模型接入配置
///
/// 存储位置：config_kv（scope_id='global'，key='ai_model_settings'）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 是否启用远程模型（关闭时直接走兜底规则）
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// chat-completions 接口地址
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// 整体请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 建连超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// 写入训练数据时记录的模型版本
    #[serde(default = "default_model_version")]
    pub model_version: String,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.deepseek.com/chat/completions".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_model_version() -> String {
    "deepseek-v1".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            model_version: default_model_version(),
        }
    }
}

/// 兜底规则配置
///
/// 存储位置：config_kv（key='fallback_settings'）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// 置信度随机种子（同种子同输入 → 同输出）
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// 置信度下限（百分数）
    #[serde(default = "default_min_confidence_pct")]
    pub min_confidence_pct: u8,

    /// 置信度上限（百分数）
    #[serde(default = "default_max_confidence_pct")]
    pub max_confidence_pct: u8,
}

fn default_seed() -> u64 {
    20_240_601
}

fn default_min_confidence_pct() -> u8 {
    80
}

fn default_max_confidence_pct() -> u8 {
    99
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            min_confidence_pct: default_min_confidence_pct(),
            max_confidence_pct: default_max_confidence_pct(),
        }
    }
}

impl FallbackSettings {
    /// 规整后的置信度区间（保证 min <= max <= 100）
    pub fn confidence_bounds(&self) -> (u8, u8) {
        let max = self.max_confidence_pct.min(100);
        let min = self.min_confidence_pct.min(max);
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_model_settings_json() {
        let s: ModelSettings =
            serde_json::from_str(r#"{"enabled": false, "model": "deepseek-reasoner"}"#).unwrap();
        assert!(!s.enabled);
        assert_eq!(s.model, "deepseek-reasoner");
        assert_eq!(s.max_tokens, 4000);
        assert_eq!(s.model_version, "deepseek-v1");
    }

    #[test]
    fn test_confidence_bounds_are_ordered() {
        let s = FallbackSettings {
            seed: 1,
            min_confidence_pct: 120,
            max_confidence_pct: 110,
        };
        assert_eq!(s.confidence_bounds(), (100, 100));
        assert_eq!(FallbackSettings::default().confidence_bounds(), (80, 99));
    }
}
