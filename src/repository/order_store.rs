// ==========================================
// SCADA 物料消耗对账系统 - 订单存储接口
// ==========================================
// 职责: 定义核心逻辑所消费的外部订单管理系统接口（不包含实现）
// 实现者: SqliteStore（repository::sqlite_store）
// 红线: 接口显式传入每个操作，不依赖隐式会话/事务上下文
// ==========================================

use crate::domain::{
    BillOfMaterials, DemandLine, Equipment, ManufacturingOrder, MoRef, MoState, OutputLine,
    ProductLookup, ProductRef,
};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;

// ==========================================
// OrderStore Trait
// ==========================================
pub trait OrderStore {
    // ===== 查询 =====

    /// 按设备编码查找设备
    fn lookup_equipment_by_code(&self, code: &str) -> RepositoryResult<Option<Equipment>>;

    /// 按设备ID查找设备
    fn lookup_equipment_by_id(&self, equipment_id: i64) -> RepositoryResult<Option<Equipment>>;

    /// 按 ID 或名称查找 MO
    fn lookup_mo(&self, mo_ref: &MoRef) -> RepositoryResult<Option<ManufacturingOrder>>;

    /// 解析产品引用（变体ID，或模板ID -> 唯一变体）
    fn lookup_product(&self, product_ref: &ProductRef) -> RepositoryResult<ProductLookup>;

    /// MO 上指定产品的开放需求行（按行ID升序）
    fn get_open_demand_lines(&self, mo_id: i64, product_id: i64)
        -> RepositoryResult<Vec<DemandLine>>;

    /// MO 的全部需求行（含已完成/已取消）
    fn get_demand_lines(&self, mo_id: i64) -> RepositoryResult<Vec<DemandLine>>;

    /// MO 的全部产出行
    fn get_output_lines(&self, mo_id: i64) -> RepositoryResult<Vec<OutputLine>>;

    /// MO 引用的 BOM（含组件行）
    fn get_bom(&self, mo: &ManufacturingOrder) -> RepositoryResult<Option<BillOfMaterials>>;

    /// 设备关联的 MO 列表（可选状态过滤，分页）
    fn list_mos_for_equipment(
        &self,
        equipment_id: i64,
        state: Option<MoState>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<ManufacturingOrder>>;

    // ===== 写入 =====

    /// 在当前事务内排他锁定 MO
    fn lock_order(&self, mo_id: i64) -> RepositoryResult<()>;

    fn set_demand_fulfilled(&self, line_id: i64, fulfilled_qty: f64) -> RepositoryResult<()>;

    fn set_output_fulfilled(&self, line_id: i64, fulfilled_qty: f64) -> RepositoryResult<()>;

    fn set_mo_state(&self, mo_id: i64, state: MoState) -> RepositoryResult<()>;

    /// MO 转为完工: 状态置 done，记录完工时间与备注，开放需求行置 done
    fn transition_mo_to_done(
        &self,
        mo_id: i64,
        finished_at: NaiveDateTime,
        note: Option<&str>,
    ) -> RepositoryResult<()>;
}
