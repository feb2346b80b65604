// ==========================================
// SCADA 物料消耗对账系统 - BOM 领域模型
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// BillOfMaterials - 物料清单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub id: i64,
    pub reference_qty: f64,               // BOM 基准产量 (bom_qty)
    pub default_equipment_id: Option<i64>, // MO 未指定设备时的默认设备
    pub components: Vec<ComponentLine>,
}

// ==========================================
// ComponentLine - BOM 组件行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentLine {
    pub id: i64,
    pub product_id: i64,
    pub qty_per_bom_unit: f64,
    pub channel: Option<String>, // 设备通道（设备编码），None 表示不参与通道级 OEE
}
