// ==========================================
// SCADA 物料消耗对账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 定义外部订单系统/台账/汇总的存储接口，并提供 SQLite 实现
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 事务边界由调用方（API 层）决定
// ==========================================

pub mod consumption_ledger;
pub mod error;
pub mod oee_store;
pub mod order_store;
pub mod sqlite_store;
pub mod weight_store;

// 重导出存储接口与实现
pub use consumption_ledger::ConsumptionLedger;
pub use error::{RepositoryError, RepositoryResult};
pub use oee_store::OeeSummaryStore;
pub use order_store::OrderStore;
pub use sqlite_store::SqliteStore;
pub use weight_store::MoWeightStore;
