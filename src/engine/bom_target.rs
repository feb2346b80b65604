// ==========================================
// SCADA 物料消耗对账系统 - BOM 目标量解析
// ==========================================
// 公式: target = qty_per_bom_unit / bom.reference_qty * mo.planned_qty
// 降级: reference_qty 为 0 时目标量全部为 0，并标记 degraded
// ==========================================

use crate::domain::BillOfMaterials;
use std::collections::BTreeMap;
use tracing::warn;

/// 单个组件行的目标量
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTarget {
    pub component_line_id: i64,
    pub product_id: i64,
    pub channel: Option<String>,
    pub target_qty: f64,
}

/// BOM 按 MO 计划量缩放后的目标量集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BomTargets {
    pub components: Vec<ComponentTarget>,
    pub degraded: bool, // reference_qty 为 0，目标量不可信
}

impl BomTargets {
    /// 订单级 BOM 消耗总量（含无通道组件）
    pub fn total(&self) -> f64 {
        self.components.iter().map(|c| c.target_qty).sum()
    }

    /// 单个产品的目标量（同一产品多行时求和）
    pub fn for_product(&self, product_id: i64) -> f64 {
        self.components
            .iter()
            .filter(|c| c.product_id == product_id)
            .map(|c| c.target_qty)
            .sum()
    }

    /// 按通道汇总（无通道组件不参与）
    pub fn by_channel(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for c in &self.components {
            if let Some(channel) = c.channel.as_deref().filter(|ch| !ch.is_empty()) {
                *map.entry(channel.to_string()).or_insert(0.0) += c.target_qty;
            }
        }
        map
    }

    /// 按产品汇总，保持 BOM 行的首次出现顺序
    pub fn by_product(&self) -> Vec<(i64, f64)> {
        let mut result: Vec<(i64, f64)> = Vec::new();
        for c in &self.components {
            match result.iter_mut().find(|(pid, _)| *pid == c.product_id) {
                Some((_, qty)) => *qty += c.target_qty,
                None => result.push((c.product_id, c.target_qty)),
            }
        }
        result
    }
}

pub struct BomTargetResolver;

impl BomTargetResolver {
    /// 计算 BOM 各组件行的目标量
    ///
    /// # 参数
    /// - `bom`: MO 引用的 BOM（None 时返回空集合）
    /// - `planned_qty`: MO 计划产量
    pub fn resolve(bom: Option<&BillOfMaterials>, planned_qty: f64) -> BomTargets {
        let bom = match bom {
            Some(b) => b,
            None => return BomTargets::default(),
        };

        let degraded = !(bom.reference_qty.is_finite() && bom.reference_qty > 0.0);
        if degraded {
            warn!(
                bom_id = bom.id,
                reference_qty = bom.reference_qty,
                "BOM 参考数量为 0，目标量按 0 处理"
            );
        }

        let components = bom
            .components
            .iter()
            .map(|line| ComponentTarget {
                component_line_id: line.id,
                product_id: line.product_id,
                channel: line.channel.clone(),
                target_qty: if degraded {
                    0.0
                } else {
                    line.qty_per_bom_unit / bom.reference_qty * planned_qty
                },
            })
            .collect();

        BomTargets {
            components,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComponentLine;

    fn bom(reference_qty: f64, lines: &[(i64, f64, Option<&str>)]) -> BillOfMaterials {
        BillOfMaterials {
            id: 1,
            reference_qty,
            default_equipment_id: None,
            components: lines
                .iter()
                .enumerate()
                .map(|(i, (product_id, qty, channel))| ComponentLine {
                    id: i as i64 + 1,
                    product_id: *product_id,
                    qty_per_bom_unit: *qty,
                    channel: channel.map(|c| c.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_target_scaled_to_planned_qty() {
        let b = bom(1.0, &[(200, 0.5, Some("CH-A"))]);
        let targets = BomTargetResolver::resolve(Some(&b), 2000.0);
        assert!(!targets.degraded);
        assert_eq!(targets.for_product(200), 1000.0);
    }

    #[test]
    fn test_untagged_lines_count_in_total_only() {
        let b = bom(
            10.0,
            &[
                (200, 5.0, Some("CH-A")),
                (300, 1.0, None),
                (301, 2.0, Some("CH-A")),
            ],
        );
        let targets = BomTargetResolver::resolve(Some(&b), 100.0);
        assert_eq!(targets.total(), 80.0);
        let channels = targets.by_channel();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels["CH-A"], 70.0);
    }

    #[test]
    fn test_by_product_merges_duplicate_products() {
        let b = bom(1.0, &[(300, 1.0, Some("CH-B")), (200, 2.0, None), (300, 3.0, Some("CH-C"))]);
        let targets = BomTargetResolver::resolve(Some(&b), 10.0);
        assert_eq!(targets.by_product(), vec![(300, 40.0), (200, 20.0)]);
    }

    #[test]
    fn test_zero_reference_qty_degrades_to_zero() {
        let b = bom(0.0, &[(200, 5.0, Some("CH-A"))]);
        let targets = BomTargetResolver::resolve(Some(&b), 100.0);
        assert!(targets.degraded);
        assert_eq!(targets.total(), 0.0);
        assert_eq!(targets.components.len(), 1);
    }

    #[test]
    fn test_missing_bom_yields_empty_targets() {
        let targets = BomTargetResolver::resolve(None, 100.0);
        assert!(targets.components.is_empty());
        assert!(!targets.degraded);
    }
}
