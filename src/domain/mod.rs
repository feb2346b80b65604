// ==========================================
// SCADA 物料消耗对账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、状态机
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod bom;
pub mod consumption;
pub mod equipment;
pub mod oee;
pub mod order;
pub mod product;
pub mod types;

// 重导出核心类型
pub use bom::{BillOfMaterials, ComponentLine};
pub use consumption::{ConsumptionEvent, MoWeightRecord};
pub use equipment::Equipment;
pub use oee::{OeeLine, OeeSummary};
pub use order::{DemandLine, ManufacturingOrder, MoRef, OutputLine};
pub use product::{Product, ProductLookup, ProductRef};
pub use types::{
    AllocationMode, ConsumptionSource, DemandLineState, DeviationLevel, MoState, ReplaceScope,
};
