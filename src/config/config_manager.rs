// ==========================================
// 列车投运排程 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 缺失键使用类型默认值；JSON 格式错误记 warn 后同样回落默认值
// ==========================================

use crate::config::model_settings::{FallbackSettings, ModelSettings};
use crate::db::open_sqlite_connection;
use crate::domain::constraints::SchedulingConstraints;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    /// 车队排程约束（JSON SchedulingConstraints）
    pub const FLEET_CONSTRAINTS: &str = "fleet_constraints";
    /// 广告曝光权重（JSON map）
    pub const BRANDING_WEIGHTS: &str = "branding_weights";
    /// 预测模型接入配置（JSON ModelSettings）
    pub const AI_MODEL_SETTINGS: &str = "ai_model_settings";
    /// 兜底规则配置（JSON FallbackSettings）
    pub const FALLBACK_SETTINGS: &str = "fallback_settings";
    /// 预测模型凭据
    pub const MODEL_API_KEY: &str = "secret/DEEPSEEK_API_KEY";
    /// 凭据环境变量（优先于 config_kv）
    pub const MODEL_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    read_env_secrets: bool,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            read_env_secrets: true,
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self {
            conn,
            read_env_secrets: true,
        })
    }

    /// 凭据只从 config_kv 读取，忽略环境变量（测试隔离用）
    pub fn without_env_secrets(mut self) -> Self {
        self.read_env_secrets = false;
        self
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取 JSON 配置；格式错误时记 warn 并返回 None
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> RepositoryResult<Option<T>> {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(key, error = %e, "配置 JSON 解析失败，使用默认值");
                Ok(None)
            }
        }
    }

    // ===== 排程约束 =====

    /// 获取已配置的车队约束
    ///
    /// # 返回
    /// - Some: 已配置（若未带广告权重，则合并 branding_weights 键）
    /// - None: 未配置，调用方使用请求中的约束
    pub fn get_fleet_constraints(&self) -> RepositoryResult<Option<SchedulingConstraints>> {
        let mut constraints = match self.get_json::<SchedulingConstraints>(config_keys::FLEET_CONSTRAINTS)? {
            Some(c) => c,
            None => return Ok(None),
        };

        if constraints.branding_weights.is_empty() {
            if let Some(weights) = self.get_branding_weights()? {
                constraints.branding_weights = weights;
            }
        }
        Ok(Some(constraints))
    }

    /// 获取广告曝光权重
    pub fn get_branding_weights(&self) -> RepositoryResult<Option<BTreeMap<String, f64>>> {
        self.get_json(config_keys::BRANDING_WEIGHTS)
    }

    // ===== 推荐源配置 =====

    /// 获取预测模型配置（未配置时使用默认值）
    pub fn get_model_settings(&self) -> RepositoryResult<ModelSettings> {
        Ok(self
            .get_json::<ModelSettings>(config_keys::AI_MODEL_SETTINGS)?
            .unwrap_or_default())
    }

    /// 获取兜底规则配置（未配置时使用默认值）
    pub fn get_fallback_settings(&self) -> RepositoryResult<FallbackSettings> {
        Ok(self
            .get_json::<FallbackSettings>(config_keys::FALLBACK_SETTINGS)?
            .unwrap_or_default())
    }

    /// 获取预测模型凭据
    ///
    /// # 顺序
    /// 1. 环境变量 DEEPSEEK_API_KEY（非空）
    /// 2. config_kv: secret/DEEPSEEK_API_KEY（非空）
    pub fn get_model_api_key(&self) -> RepositoryResult<Option<String>> {
        if self.read_env_secrets {
            if let Ok(v) = std::env::var(config_keys::MODEL_API_KEY_ENV) {
                if !v.trim().is_empty() {
                    return Ok(Some(v.trim().to_string()));
                }
            }
        }

        Ok(self
            .get_global_config_value(config_keys::MODEL_API_KEY)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
            .unwrap()
            .without_env_secrets()
    }

    #[test]
    fn test_defaults_when_unconfigured() {
        let cm = manager();
        assert!(cm.get_fleet_constraints().unwrap().is_none());
        assert_eq!(cm.get_model_settings().unwrap(), ModelSettings::default());
        assert_eq!(cm.get_fallback_settings().unwrap(), FallbackSettings::default());
        assert!(cm.get_model_api_key().unwrap().is_none());
    }

    #[test]
    fn test_fleet_constraints_merge_branding_weights() {
        let cm = manager();
        cm.set_config(config_keys::FLEET_CONSTRAINTS, r#"{"target_punctuality": 98.0}"#)
            .unwrap();
        cm.set_config(config_keys::BRANDING_WEIGHTS, r#"{"acme": 1.5}"#).unwrap();

        let c = cm.get_fleet_constraints().unwrap().unwrap();
        assert_eq!(c.target_punctuality, 98.0);
        assert_eq!(c.branding_weights.get("acme"), Some(&1.5));
    }

    #[test]
    fn test_malformed_json_falls_back_to_default() {
        let cm = manager();
        cm.set_config(config_keys::AI_MODEL_SETTINGS, "{not json").unwrap();
        assert_eq!(cm.get_model_settings().unwrap(), ModelSettings::default());
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let cm = manager();
        cm.set_config(config_keys::MODEL_API_KEY, "   ").unwrap();
        assert!(cm.get_model_api_key().unwrap().is_none());

        cm.set_config(config_keys::MODEL_API_KEY, "sk-test").unwrap();
        assert_eq!(cm.get_model_api_key().unwrap().as_deref(), Some("sk-test"));
    }
}
