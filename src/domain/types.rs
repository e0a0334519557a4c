// ==========================================
// 列车投运排程 - 领域类型定义
// ==========================================
// 序列化格式: snake_case (与数据库、前端一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 列车运营状态 (Trainset Status)
// ==========================================
// 四态之间无"仅允许从某态迁移"的限制，每次排程独立判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainsetStatus {
    Ready,       // 可投入运营
    Standby,     // 备用
    Maintenance, // 检修
    Critical,    // 需立即处置
}

impl TrainsetStatus {
    pub const ALL: [TrainsetStatus; 4] = [
        TrainsetStatus::Ready,
        TrainsetStatus::Standby,
        TrainsetStatus::Maintenance,
        TrainsetStatus::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainsetStatus::Ready => "ready",
            TrainsetStatus::Standby => "standby",
            TrainsetStatus::Maintenance => "maintenance",
            TrainsetStatus::Critical => "critical",
        }
    }

    /// 是否为可上线状态（运营或备用）
    pub fn is_deployable(&self) -> bool {
        matches!(self, TrainsetStatus::Ready | TrainsetStatus::Standby)
    }
}

impl fmt::Display for TrainsetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainsetStatus {
    type Err = String;

    /// 解析状态字符串
    ///
    /// 兼容: 旧版兜底逻辑输出的 "service" 视为 ready
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ready" | "service" | "in_service" => Ok(TrainsetStatus::Ready),
            "standby" => Ok(TrainsetStatus::Standby),
            "maintenance" => Ok(TrainsetStatus::Maintenance),
            "critical" => Ok(TrainsetStatus::Critical),
            other => Err(format!("未知列车状态: {}", other)),
        }
    }
}

// ==========================================
// 适用性证书类型 (Certificate Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    RollingStock, // 车辆
    Signalling,   // 信号
    Telecom,      // 通信
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::RollingStock => "rolling_stock",
            CertificateType::Signalling => "signalling",
            CertificateType::Telecom => "telecom",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "rolling_stock" => Ok(CertificateType::RollingStock),
            "signalling" | "signaling" => Ok(CertificateType::Signalling),
            "telecom" => Ok(CertificateType::Telecom),
            other => Err(format!("未知证书类型: {}", other)),
        }
    }
}

// ==========================================
// 工单状态 (Job Card Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCardStatus {
    Open,
    Closed,
}

impl JobCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCardStatus::Open => "open",
            JobCardStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for JobCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobCardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(JobCardStatus::Open),
            "closed" => Ok(JobCardStatus::Closed),
            other => Err(format!("未知工单状态: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accepts_service_alias() {
        assert_eq!("service".parse::<TrainsetStatus>().unwrap(), TrainsetStatus::Ready);
        assert_eq!(" Standby ".parse::<TrainsetStatus>().unwrap(), TrainsetStatus::Standby);
        assert!("retired".parse::<TrainsetStatus>().is_err());
    }

    #[test]
    fn test_status_serde_is_snake_case() {
        let json = serde_json::to_string(&TrainsetStatus::Maintenance).unwrap();
        assert_eq!(json, "\"maintenance\"");
    }

    #[test]
    fn test_certificate_type_spellings() {
        assert_eq!(
            "rolling-stock".parse::<CertificateType>().unwrap(),
            CertificateType::RollingStock
        );
        assert_eq!(
            "signaling".parse::<CertificateType>().unwrap(),
            CertificateType::Signalling
        );
    }
}
