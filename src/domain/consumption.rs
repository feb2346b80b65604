// ==========================================
// SCADA 物料消耗对账系统 - 消耗台账领域模型
// ==========================================
// 红线: 台账只追加，写入后不可修改
// ==========================================

use crate::domain::types::{AllocationMode, ConsumptionSource};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ConsumptionEvent - 设备物料消耗事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionEvent {
    pub event_id: String,
    pub equipment_id: Option<i64>, // 完工自动补齐时可能没有设备
    pub product_id: i64,
    pub mo_id: i64,
    pub consumed_qty: f64,   // 实际分配量（非原始请求量）
    pub requested_qty: f64,  // 原始请求量
    pub bom_target_qty: f64, // 该产品 BOM 目标量
    pub mode: AllocationMode,
    pub source: ConsumptionSource,
    pub timestamp: NaiveDateTime,   // 设备上报时间 (UTC)
    pub recorded_at: NaiveDateTime, // 入账时间 (UTC)
}

// ==========================================
// MoWeightRecord - MO 重量记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoWeightRecord {
    pub id: i64,
    pub mo_id: i64,
    pub target_weight: f64,
    pub actual_weight: f64,
    pub timestamp: NaiveDateTime,
    pub notes: Option<String>,
}
