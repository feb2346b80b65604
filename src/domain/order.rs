// ==========================================
// SCADA 物料消耗对账系统 - 制造订单领域模型
// ==========================================
// 需求行 / 产出行归 MO 所有，生命周期与 MO 一致
// 需求行 fulfilled_qty 只允许由消耗分配引擎修改
// ==========================================

use crate::domain::types::{DemandLineState, MoState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ManufacturingOrder - 制造订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingOrder {
    pub id: i64,
    pub name: String,
    pub product_id: i64,
    pub planned_qty: f64,
    pub bom_id: Option<i64>,
    pub equipment_id: Option<i64>, // 已解析（MO 指定或 BOM 默认）
    pub state: MoState,
    /// 完工时间（UTC），完工前为空
    #[serde(default)]
    pub date_finished: Option<NaiveDateTime>,
    /// 完工备注
    #[serde(default)]
    pub done_note: Option<String>,
}

// ==========================================
// DemandLine - 原料需求行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandLine {
    pub id: i64,
    pub mo_id: i64,
    pub product_id: i64,
    pub planned_qty: f64,
    pub fulfilled_qty: f64,
    pub channel: Option<String>,
    pub state: DemandLineState,
}

impl DemandLine {
    /// 剩余可消耗量（不小于 0）
    pub fn remaining_qty(&self) -> f64 {
        (self.planned_qty - self.fulfilled_qty).max(0.0)
    }

    pub fn is_open(&self) -> bool {
        self.state == DemandLineState::Open
    }
}

// ==========================================
// OutputLine - 成品产出行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLine {
    pub id: i64,
    pub mo_id: i64,
    pub product_id: i64,
    pub planned_qty: f64,
    pub fulfilled_qty: f64,
    pub cancelled: bool,
}

// ==========================================
// MoRef - MO 引用（数字ID 或 订单名称）
// ==========================================
// 纯数字字符串按 ID 解释，其余按名称精确匹配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMoRef", into = "RawMoRef")]
pub enum MoRef {
    Id(i64),
    Name(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawMoRef {
    Id(i64),
    Text(String),
}

impl From<RawMoRef> for MoRef {
    fn from(raw: RawMoRef) -> Self {
        match raw {
            RawMoRef::Id(id) => MoRef::Id(id),
            RawMoRef::Text(s) => MoRef::parse(&s),
        }
    }
}

impl From<MoRef> for RawMoRef {
    fn from(mo_ref: MoRef) -> Self {
        match mo_ref {
            MoRef::Id(id) => RawMoRef::Id(id),
            MoRef::Name(name) => RawMoRef::Text(name),
        }
    }
}

impl MoRef {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse::<i64>() {
                return MoRef::Id(id);
            }
        }
        MoRef::Name(trimmed.to_string())
    }

    /// 是否为空引用（空名称）
    pub fn is_blank(&self) -> bool {
        matches!(self, MoRef::Name(name) if name.is_empty())
    }
}

impl fmt::Display for MoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoRef::Id(id) => write!(f, "{}", id),
            MoRef::Name(name) => write!(f, "{}", name),
        }
    }
}
