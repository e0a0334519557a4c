// ==========================================
// 列车投运排程 - 历史 KPI
// ==========================================
// 用途: 作为预测模型的上下文输入（最近 30 天）
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMetric {
    pub metric_date: NaiveDate,
    pub punctuality_percentage: Option<f64>,
    pub fleet_availability: Option<f64>,
    pub maintenance_cost: Option<f64>,
    pub energy_consumption: Option<f64>,
    pub passenger_satisfaction: Option<f64>,
}
