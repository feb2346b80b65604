// ==========================================
// SCADA 物料消耗对账系统 - MO 重量记录
// ==========================================
// 目标重量 = Σ 组件单位重量 × 组件目标量（按 MO 计划量缩放）
// 要求: MO 关联 BOM 且 BOM 参考数量非 0
// ==========================================

use crate::domain::{ManufacturingOrder, MoRef, MoWeightRecord, ProductLookup, ProductRef};
use crate::engine::bom_target::BomTargetResolver;
use crate::engine::error::{ConsumptionError, ConsumptionResult};
use crate::engine::validation_gate::{parse_payload_timestamp, ValidationIssue};
use crate::repository::{MoWeightStore, OrderStore};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordWeightRequest {
    pub mo: MoRef,
    pub weight_actual: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct MoWeightService;

impl MoWeightService {
    /// 计算 MO 目标重量
    pub fn target_weight<S: OrderStore + ?Sized>(
        store: &S,
        mo: &ManufacturingOrder,
    ) -> ConsumptionResult<f64> {
        let bom = store.get_bom(mo)?.ok_or_else(|| {
            ConsumptionError::Configuration(format!("MO {} 未关联 BOM，无法计算目标重量", mo.name))
        })?;
        let targets = BomTargetResolver::resolve(Some(&bom), mo.planned_qty);
        if targets.degraded {
            return Err(ConsumptionError::Configuration(format!(
                "BOM {} 参考数量为 0，无法计算目标重量",
                bom.id
            )));
        }

        let mut total = 0.0;
        for component in &targets.components {
            match store.lookup_product(&ProductRef::Variant(component.product_id))? {
                ProductLookup::Found(product) => total += product.weight_kg * component.target_qty,
                _ => warn!(product_id = component.product_id, "BOM 组件产品不存在，重量按 0 计"),
            }
        }
        Ok(total)
    }

    /// 记录 MO 实际重量
    ///
    /// # 参数
    /// - now: 当前 UTC 时间（timestamp 缺省时使用）
    pub fn record_weight<S>(
        store: &S,
        request: &RecordWeightRequest,
        now: NaiveDateTime,
    ) -> ConsumptionResult<MoWeightRecord>
    where
        S: OrderStore + MoWeightStore,
    {
        let mut issues = Vec::new();
        if !(request.weight_actual.is_finite() && request.weight_actual >= 0.0) {
            issues.push(ValidationIssue::NegativeWeight {
                weight: request.weight_actual,
            });
        }
        let timestamp = match request.timestamp.as_deref().map(str::trim) {
            None | Some("") => Some(now),
            Some(raw) => {
                let parsed = parse_payload_timestamp(raw);
                if parsed.is_none() {
                    issues.push(ValidationIssue::InvalidTimestamp {
                        raw: raw.to_string(),
                    });
                }
                parsed
            }
        };
        let mo = store.lookup_mo(&request.mo)?;
        if mo.is_none() {
            issues.push(ValidationIssue::MoNotFound {
                mo: request.mo.to_string(),
            });
        }

        let (mo, timestamp) = match (mo, timestamp) {
            (Some(mo), Some(ts)) if issues.is_empty() => (mo, ts),
            _ => return Err(ConsumptionError::from_issues(issues)),
        };

        let target_weight = Self::target_weight(store, &mo)?;
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let id = store.insert_weight(mo.id, target_weight, request.weight_actual, timestamp, notes)?;

        info!(
            mo = %mo.name,
            target = target_weight,
            actual = request.weight_actual,
            "MO 重量已记录"
        );

        Ok(MoWeightRecord {
            id,
            mo_id: mo.id,
            target_weight,
            actual_weight: request.weight_actual,
            timestamp,
            notes: notes.map(str::to_string),
        })
    }

    /// 重量记录（按时间倒序）
    pub fn list_weights<S>(
        store: &S,
        mo_ref: Option<&MoRef>,
        limit: u32,
        offset: u32,
    ) -> ConsumptionResult<Vec<MoWeightRecord>>
    where
        S: OrderStore + MoWeightStore,
    {
        let mo_id = match mo_ref {
            Some(r) => Some(
                store
                    .lookup_mo(r)?
                    .ok_or_else(|| {
                        ConsumptionError::single_issue(ValidationIssue::MoNotFound {
                            mo: r.to_string(),
                        })
                    })?
                    .id,
            ),
            None => None,
        };
        Ok(store.list_weights(mo_id, limit, offset)?)
    }
}
