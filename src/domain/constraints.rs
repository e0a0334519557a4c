// ==========================================
// 列车投运排程 - 排程约束
// ==========================================
// 每次排程传入，引擎只读不改
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// SchedulingConstraints - 排程约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConstraints {
    /// 目标准点率 (%)
    #[serde(default = "default_target_punctuality")]
    pub target_punctuality: f64,

    /// 单车单日最大运营小时
    #[serde(default = "default_max_service_hours")]
    pub max_service_hours: f64,

    /// 两次检修窗口最小间隔（小时）
    #[serde(default = "default_min_maintenance_interval")]
    pub min_maintenance_interval: f64,

    /// 广告曝光权重（广告商 -> 权重）
    #[serde(default)]
    pub branding_weights: BTreeMap<String, f64>,
}

fn default_target_punctuality() -> f64 {
    99.5
}

fn default_max_service_hours() -> f64 {
    18.0
}

fn default_min_maintenance_interval() -> f64 {
    72.0
}

impl Default for SchedulingConstraints {
    fn default() -> Self {
        Self {
            target_punctuality: default_target_punctuality(),
            max_service_hours: default_max_service_hours(),
            min_maintenance_interval: default_min_maintenance_interval(),
            branding_weights: BTreeMap::new(),
        }
    }
}

impl SchedulingConstraints {
    /// 校验约束取值
    ///
    /// # 返回
    /// - Ok(()): 合法
    /// - Err(String): 第一个不合法字段及原因
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.target_punctuality) {
            return Err(format!(
                "target_punctuality 超出范围 [0,100]: {}",
                self.target_punctuality
            ));
        }
        if !(self.max_service_hours > 0.0 && self.max_service_hours <= 24.0) {
            return Err(format!(
                "max_service_hours 超出范围 (0,24]: {}",
                self.max_service_hours
            ));
        }
        if !(self.min_maintenance_interval >= 0.0) {
            return Err(format!(
                "min_maintenance_interval 不能为负: {}",
                self.min_maintenance_interval
            ));
        }
        if let Some((name, w)) = self.branding_weights.iter().find(|(_, w)| !(**w >= 0.0)) {
            return Err(format!("branding_weights[{}] 不能为负: {}", name, w));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let c: SchedulingConstraints = serde_json::from_str(r#"{"max_service_hours": 16}"#).unwrap();
        assert_eq!(c.max_service_hours, 16.0);
        assert_eq!(c.target_punctuality, 99.5);
        assert!(c.branding_weights.is_empty());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let c = SchedulingConstraints {
            target_punctuality: 120.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());

        let mut c = SchedulingConstraints::default();
        c.branding_weights.insert("acme".to_string(), -1.0);
        assert!(c.validate().unwrap_err().contains("acme"));
    }
}
