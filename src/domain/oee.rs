// ==========================================
// SCADA 物料消耗对账系统 - OEE 汇总领域模型
// ==========================================
// 红线: 每个 MO 至多一条 OeeSummary
// 红线: 偏差等级是偏差百分比的纯函数
// ==========================================

use crate::domain::types::DeviationLevel;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// OeeSummary - 订单级 OEE 汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OeeSummary {
    pub mo_id: i64,
    pub mo_name: String,
    pub equipment_id: Option<i64>,
    pub date_done: NaiveDateTime,

    // ===== 产量 =====
    pub qty_planned: f64,
    pub qty_finished: f64,
    pub variance_finished: f64,

    // ===== 消耗 =====
    pub qty_bom_consumption: f64,
    pub qty_actual_consumption: f64,
    pub variance_consumption: f64,

    // ===== KPI =====
    pub yield_percent: f64,
    pub consumption_ratio: f64,
    pub avg_efficiency_score: f64,
    pub max_abs_deviation_pct: f64,
    pub deviation_alert_count: u32,

    pub lines: Vec<OeeLine>,
}

// ==========================================
// OeeLine - 通道级偏差行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OeeLine {
    pub channel: String,
    pub to_consume: f64,
    pub consumed: f64,
    pub variance: f64,
    pub consumption_ratio: f64,
    pub deviation_pct: f64,
    pub efficiency_score: f64,
    pub deviation_level: DeviationLevel,
}
