// ==========================================
// SCADA 物料消耗对账系统 - OEE 汇总存储接口
// ==========================================
// 红线: 每个 MO 至多一条汇总
// 红线: 重建时整体删除并重建通道行，不允许部分覆盖
// ==========================================

use crate::domain::OeeSummary;
use crate::repository::error::RepositoryResult;

pub trait OeeSummaryStore {
    /// 写入汇总（已存在则整体替换）
    fn replace_summary(&self, summary: &OeeSummary) -> RepositoryResult<()>;

    fn find_summary(&self, mo_id: i64) -> RepositoryResult<Option<OeeSummary>>;
}
