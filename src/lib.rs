// ==========================================
// SCADA 物料消耗对账系统 - 核心库
// ==========================================
// 职责: 设备物料消耗上报 -> 需求行分配 -> BOM 计划对账 -> OEE 偏差分析
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态组装
pub mod app;

#[cfg(test)]
mod test_support;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AllocationMode, DeviationLevel, MoState, ReplaceScope};

// 领域实体
pub use domain::{
    BillOfMaterials, ConsumptionEvent, DemandLine, ManufacturingOrder, MoRef, MoWeightRecord,
    OeeLine, OeeSummary,
};

// 引擎
pub use engine::{
    BomTargetResolver, ConsumptionAllocator, ConsumptionOrchestrator, OeeReconciler,
    ValidationGate,
};

// API
pub use api::{ConsumptionApi, OrderApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "SCADA 物料消耗对账系统";
