// ==========================================
// SCADA 物料消耗对账系统 - 引擎层
// ==========================================
// 职责: 校验、目标量、分配、对账规则
// 红线: Engine 不拼 SQL，存储通过接口显式传入
// ==========================================

pub mod allocator;
pub mod bom_target;
pub mod error;
pub mod mo_weight;
pub mod oee_reconciler;
pub mod orchestrator;
pub mod validation_gate;

// 重导出核心引擎
pub use allocator::{AllocationOutcome, ConsumptionAllocator, LineAllocation};
pub use bom_target::{BomTargetResolver, BomTargets, ComponentTarget};
pub use error::{ConsumptionError, ConsumptionResult};
pub use mo_weight::{MoWeightService, RecordWeightRequest};
pub use oee_reconciler::{DeviationThresholds, OeeReconciler, ReconcileInput};
pub use orchestrator::{
    ApplyConsumptionOutcome, ApplyConsumptionRequest, ConsumedMaterial, ConsumptionOrchestrator,
    MarkDoneOutcome, MarkDoneRequest,
};
pub use validation_gate::{ConsumptionPayload, ValidatedConsumption, ValidationGate, ValidationIssue};
