// ==========================================
// SCADA 物料消耗对账系统 - 消耗分配引擎
// ==========================================
// 职责: 将上报数量分配到产品的开放需求行
// 模式: add（按计划量比例注水，逐行封顶）/ replace（清零后按计划量比例重分配）
// 红线: 纯函数，不读写存储；不回读台账
// ==========================================

use crate::domain::types::AllocationMode;
use crate::domain::DemandLine;
use crate::engine::error::{ConsumptionError, ConsumptionResult};

/// 数量比较容差
pub const QTY_EPSILON: f64 = 1e-9;

/// 单行分配结果
#[derive(Debug, Clone, PartialEq)]
pub struct LineAllocation {
    pub line_id: i64,
    pub previous_qty: f64,
    pub fulfilled_qty: f64,
}

/// 分配结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationOutcome {
    pub applied_qty: f64,
    pub affected_line_ids: Vec<i64>,
    pub updates: Vec<LineAllocation>, // 需写回存储的行（fulfilled 有变化或被 replace 清零重置）
}

// ==========================================
// ConsumptionAllocator - 无状态分配引擎
// ==========================================
pub struct ConsumptionAllocator;

impl ConsumptionAllocator {
    /// 分配消耗数量
    ///
    /// # 参数
    /// - `lines`: 产品在 MO 上的需求行（非开放行会被忽略）
    /// - `quantity`: 请求数量
    /// - `mode`: add / replace
    /// - `allow_overconsume`: 是否允许超出计划量
    ///
    /// # 返回
    /// - Ok: 实际分配量与受影响行（applied < quantity 属于正常结果）
    /// - Err(Allocation): 没有开放需求行
    pub fn allocate(
        lines: &[DemandLine],
        quantity: f64,
        mode: AllocationMode,
        allow_overconsume: bool,
    ) -> ConsumptionResult<AllocationOutcome> {
        let open: Vec<&DemandLine> = lines.iter().filter(|l| l.is_open()).collect();
        if open.is_empty() {
            return Err(ConsumptionError::Allocation(
                "产品在该 MO 上没有开放的需求行".to_string(),
            ));
        }

        let quantity = quantity.max(0.0);
        let fulfilled = match mode {
            AllocationMode::Add => allocate_add(&open, quantity, allow_overconsume),
            AllocationMode::Replace => {
                let planned: Vec<f64> = open.iter().map(|l| l.planned_qty.max(0.0)).collect();
                planned_shares(&planned, quantity, !allow_overconsume)
            }
        };

        let mut outcome = AllocationOutcome::default();
        for (line, new_qty) in open.iter().zip(fulfilled) {
            let delta = new_qty - line.fulfilled_qty;
            let touched = match mode {
                AllocationMode::Add => delta > QTY_EPSILON,
                AllocationMode::Replace => true,
            };
            if !touched {
                continue;
            }
            outcome.applied_qty += match mode {
                AllocationMode::Add => delta,
                AllocationMode::Replace => new_qty,
            };
            outcome.affected_line_ids.push(line.id);
            outcome.updates.push(LineAllocation {
                line_id: line.id,
                previous_qty: line.fulfilled_qty,
                fulfilled_qty: new_qty,
            });
        }
        Ok(outcome)
    }
}

/// add 模式: 按计划量比例注水
///
/// 每轮在仍有余量的行之间按计划量分摊，超过余量的行封顶并退出，
/// 剩余数量在下一轮重新分摊，直到分完或全部行饱和
fn allocate_add(lines: &[&DemandLine], quantity: f64, allow_overconsume: bool) -> Vec<f64> {
    let mut fulfilled: Vec<f64> = lines.iter().map(|l| l.fulfilled_qty).collect();
    let mut left = quantity;

    while left > QTY_EPSILON {
        let active: Vec<usize> = (0..lines.len())
            .filter(|&i| lines[i].planned_qty - fulfilled[i] > QTY_EPSILON)
            .collect();
        if active.is_empty() {
            break;
        }

        let total_planned: f64 = active.iter().map(|&i| lines[i].planned_qty).sum();
        let mut given = 0.0;
        let mut saturated = false;
        for &i in &active {
            let capacity = lines[i].planned_qty - fulfilled[i];
            let share = left * lines[i].planned_qty / total_planned;
            let take = if share >= capacity - QTY_EPSILON {
                saturated = true;
                capacity
            } else {
                share
            };
            fulfilled[i] += take;
            given += take;
        }

        if !saturated {
            // 本轮已全部分完（剩余仅为浮点误差）
            left = 0.0;
            break;
        }
        left -= given;
    }

    if allow_overconsume && left > QTY_EPSILON {
        let planned: Vec<f64> = lines.iter().map(|l| l.planned_qty.max(0.0)).collect();
        for (f, extra) in fulfilled.iter_mut().zip(planned_shares(&planned, left, false)) {
            *f += extra;
        }
    }

    fulfilled
}

/// 按计划量比例拆分数量
///
/// - 计划总量为 0 时平均分配
/// - `cap_at_planned = true`: 每份不超过该行计划量
/// - `cap_at_planned = false`: 最后一行吸收舍入余数，总和严格等于 quantity
pub fn planned_shares(planned: &[f64], quantity: f64, cap_at_planned: bool) -> Vec<f64> {
    let n = planned.len();
    if n == 0 {
        return Vec::new();
    }

    let total: f64 = planned.iter().sum();
    let raw_share = |p: f64| {
        if total > QTY_EPSILON {
            quantity * p / total
        } else {
            quantity / n as f64
        }
    };

    if cap_at_planned {
        return planned.iter().map(|&p| raw_share(p).min(p)).collect();
    }

    let mut shares: Vec<f64> = planned[..n - 1].iter().map(|&p| raw_share(p)).collect();
    let assigned: f64 = shares.iter().sum();
    shares.push(quantity - assigned);
    shares
}
