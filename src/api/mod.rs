// ==========================================
// SCADA 物料消耗对账系统 - API 层
// ==========================================
// 职责: 对外业务接口，负责事务边界、配置加载与错误码转换
// ==========================================

pub mod consumption_api;
pub mod error;
pub mod order_api;

mod support;

// 重导出
pub use consumption_api::{ConsumptionApi, PayloadCheck};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use order_api::{MoListQuery, OrderApi};
