// ==========================================
// SCADA 物料消耗对账系统 - OEE 对账引擎
// ==========================================
// 职责: 按设备通道合并 BOM 目标量与实际消耗，生成偏差/效率指标
// 输入: MO + BOM 目标量 + 需求行 + 完工数量
// 输出: OeeSummary（通道行按通道编码排序）
// 红线: 纯函数，偏差等级只由偏差百分比决定
// ==========================================

use crate::domain::types::{DemandLineState, DeviationLevel};
use crate::domain::{DemandLine, ManufacturingOrder, OeeLine, OeeSummary};
use crate::engine::bom_target::BomTargets;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// 偏差阈值
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationThresholds {
    pub normal_pct: f64,  // |偏差| <= normal_pct 为 normal
    pub warning_pct: f64, // |偏差| <= warning_pct 为 warning，否则 critical
}

impl Default for DeviationThresholds {
    fn default() -> Self {
        Self {
            normal_pct: 2.0,
            warning_pct: 5.0,
        }
    }
}

impl DeviationThresholds {
    pub fn level(&self, deviation_pct: f64) -> DeviationLevel {
        let abs = deviation_pct.abs();
        if abs <= self.normal_pct {
            DeviationLevel::Normal
        } else if abs <= self.warning_pct {
            DeviationLevel::Warning
        } else {
            DeviationLevel::Critical
        }
    }
}

// ==========================================
// 指标公式
// ==========================================

/// 偏差百分比: 目标为 0 时，实际也为 0 记 0，否则记 100
pub fn deviation_pct(target: f64, actual: f64) -> f64 {
    if target == 0.0 {
        if actual == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (actual - target) / target * 100.0
    }
}

pub fn efficiency_score(deviation_pct: f64) -> f64 {
    (100.0 - deviation_pct.abs()).max(0.0)
}

/// 比率（百分比），分母为 0 时记 0
fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

// ==========================================
// OeeReconciler
// ==========================================
pub struct OeeReconciler {
    thresholds: DeviationThresholds,
}

/// 对账输入
pub struct ReconcileInput<'a> {
    pub mo: &'a ManufacturingOrder,
    pub targets: &'a BomTargets,
    pub demand_lines: &'a [DemandLine],
    pub finished_qty: f64,
    pub date_done: NaiveDateTime,
}

impl OeeReconciler {
    pub fn new(thresholds: DeviationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> DeviationThresholds {
        self.thresholds
    }

    /// 构建单个通道行
    pub fn build_line(&self, channel: &str, to_consume: f64, consumed: f64) -> OeeLine {
        let deviation = deviation_pct(to_consume, consumed);
        OeeLine {
            channel: channel.to_string(),
            to_consume,
            consumed,
            variance: consumed - to_consume,
            consumption_ratio: ratio_pct(consumed, to_consume),
            deviation_pct: deviation,
            efficiency_score: efficiency_score(deviation),
            deviation_level: self.thresholds.level(deviation),
        }
    }

    /// 构建 MO 的 OEE 汇总
    ///
    /// 说明:
    /// - 目标侧: BOM 带通道的组件行按通道汇总
    /// - 实际侧: 非取消需求行的 fulfilled 按通道汇总
    /// - 两侧按通道编码合并，任一侧出现的通道都生成一行
    /// - 订单级 BOM/实际消耗总量包含无通道的行
    pub fn build_summary(&self, input: &ReconcileInput<'_>) -> OeeSummary {
        let live_lines = || {
            input
                .demand_lines
                .iter()
                .filter(|l| l.state != DemandLineState::Cancelled)
        };

        // (目标, 实际)
        let mut channels: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for (channel, target) in input.targets.by_channel() {
            channels.entry(channel).or_insert((0.0, 0.0)).0 += target;
        }
        for line in live_lines() {
            if let Some(channel) = line.channel.as_deref().filter(|c| !c.is_empty()) {
                channels.entry(channel.to_string()).or_insert((0.0, 0.0)).1 += line.fulfilled_qty;
            }
        }

        let lines: Vec<OeeLine> = channels
            .iter()
            .map(|(channel, (target, actual))| self.build_line(channel, *target, *actual))
            .collect();

        let qty_planned = input.mo.planned_qty;
        let qty_finished = input.finished_qty;
        let qty_bom_consumption = input.targets.total();
        let qty_actual_consumption: f64 = live_lines().map(|l| l.fulfilled_qty).sum();

        let avg_efficiency_score = if lines.is_empty() {
            0.0
        } else {
            lines.iter().map(|l| l.efficiency_score).sum::<f64>() / lines.len() as f64
        };
        let max_abs_deviation_pct = lines
            .iter()
            .map(|l| l.deviation_pct.abs())
            .fold(0.0, f64::max);
        let deviation_alert_count = lines
            .iter()
            .filter(|l| l.deviation_pct.abs() > self.thresholds.normal_pct)
            .count() as u32;

        OeeSummary {
            mo_id: input.mo.id,
            mo_name: input.mo.name.clone(),
            equipment_id: input.mo.equipment_id,
            date_done: input.date_done,
            qty_planned,
            qty_finished,
            variance_finished: qty_finished - qty_planned,
            qty_bom_consumption,
            qty_actual_consumption,
            variance_consumption: qty_actual_consumption - qty_bom_consumption,
            yield_percent: ratio_pct(qty_finished, qty_planned),
            consumption_ratio: ratio_pct(qty_actual_consumption, qty_bom_consumption),
            avg_efficiency_score,
            max_abs_deviation_pct,
            deviation_alert_count,
            lines,
        }
    }
}

impl Default for OeeReconciler {
    fn default() -> Self {
        Self::new(DeviationThresholds::default())
    }
}
