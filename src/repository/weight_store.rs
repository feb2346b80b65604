// ==========================================
// SCADA 物料消耗对账系统 - MO 重量记录存储接口
// ==========================================

use crate::domain::MoWeightRecord;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;

pub trait MoWeightStore {
    /// 新增重量记录，返回记录ID
    fn insert_weight(
        &self,
        mo_id: i64,
        target_weight: f64,
        actual_weight: f64,
        timestamp: NaiveDateTime,
        notes: Option<&str>,
    ) -> RepositoryResult<i64>;

    /// 重量记录（按时间倒序）
    fn list_weights(
        &self,
        mo_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<MoWeightRecord>>;
}
