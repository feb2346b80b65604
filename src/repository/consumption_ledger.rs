// ==========================================
// SCADA 物料消耗对账系统 - 消耗台账接口
// ==========================================
// 红线: 只追加，不提供更新/删除
// 红线: 分配引擎不回读台账
// ==========================================

use crate::domain::ConsumptionEvent;
use crate::repository::error::RepositoryResult;

// ==========================================
// ConsumptionLedger Trait
// ==========================================
pub trait ConsumptionLedger {
    /// 追加一条消耗事件
    fn append_event(&self, event: &ConsumptionEvent) -> RepositoryResult<()>;

    /// MO 的消耗事件（按入账顺序）
    fn list_events_by_mo(&self, mo_id: i64) -> RepositoryResult<Vec<ConsumptionEvent>>;

    /// 全部消耗事件（可选 MO 过滤），用于导出
    fn list_events(&self, mo_id: Option<i64>) -> RepositoryResult<Vec<ConsumptionEvent>>;

    /// MO 上该产品是否已有消耗记录（完工自动补齐判定）
    fn has_event_for(&self, mo_id: i64, product_id: i64) -> RepositoryResult<bool>;
}
