// ==========================================
// SCADA 物料消耗对账系统 - 制造订单 API
// ==========================================
// 职责: MO 完工、OEE 汇总重建/查询、设备 MO 列表、重量记录
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::support::{load_orchestrator, with_store, with_store_transaction};
use crate::config::ConfigManager;
use crate::domain::{ManufacturingOrder, MoRef, MoState, MoWeightRecord, OeeSummary};
use crate::engine::{MarkDoneOutcome, MarkDoneRequest, MoWeightService, RecordWeightRequest};
use crate::perf::PerfGuard;

// ==========================================
// MoListQuery - 设备 MO 列表查询条件
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoListQuery {
    pub equipment_code: String,
    /// 状态过滤（draft/confirmed/progress/done/cancel）
    pub state: Option<String>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

// ==========================================
// OrderApi - 制造订单 API
// ==========================================

/// 制造订单API
///
/// 职责：
/// 1. 完工（产出行、BOM 自动补齐、OEE 汇总）
/// 2. OEE 汇总重建与查询
/// 3. 设备 MO 列表
/// 4. MO 重量记录
pub struct OrderApi {
    conn: Arc<Mutex<Connection>>,
    config_manager: Arc<ConfigManager>,
}

impl OrderApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            conn,
            config_manager,
        }
    }

    // ==========================================
    // 完工与 OEE
    // ==========================================

    /// 标记 MO 完工
    ///
    /// # 返回
    /// - Ok(MarkDoneOutcome): 自动补齐的物料与新生成的 OEE 汇总
    /// - Err(ApiError::StateError): MO 已完工或已取消
    /// - Err(ApiError::ValidationError): 完工数量为负 / MO 不存在
    pub fn mark_order_done(&self, request: &MarkDoneRequest) -> ApiResult<MarkDoneOutcome> {
        let _perf = PerfGuard::new("api.mark_order_done");
        let orchestrator = load_orchestrator(&self.config_manager)?;
        let now = Utc::now().naive_utc();

        let outcome = with_store_transaction(&self.conn, |store| {
            Ok(orchestrator.mark_order_done(store, request, now)?)
        })?;

        info!(
            mo = %outcome.mo_name,
            finished = outcome.finished_qty,
            auto_consumed = outcome.consumed_materials.len(),
            "MO 已完工"
        );
        Ok(outcome)
    }

    /// 重建 OEE 汇总（幂等，每个 MO 至多一条）
    pub fn rebuild_oee_summary(&self, mo_ref: &MoRef) -> ApiResult<OeeSummary> {
        let _perf = PerfGuard::new("api.rebuild_oee_summary");
        let orchestrator = load_orchestrator(&self.config_manager)?;
        let now = Utc::now().naive_utc();

        with_store_transaction(&self.conn, |store| {
            Ok(orchestrator.rebuild_oee_summary(store, mo_ref, now)?)
        })
    }

    /// 读取已生成的 OEE 汇总
    ///
    /// # 返回
    /// - Ok(None): 尚未生成汇总
    pub fn get_oee_summary(&self, mo_ref: &MoRef) -> ApiResult<Option<OeeSummary>> {
        let _perf = PerfGuard::new("api.get_oee_summary");
        let orchestrator = load_orchestrator(&self.config_manager)?;

        with_store(&self.conn, |store| Ok(orchestrator.get_oee_summary(store, mo_ref)?))
    }

    // ==========================================
    // MO 列表
    // ==========================================

    /// 设备关联的 MO 列表（按 ID 升序分页）
    pub fn get_mo_list(&self, query: &MoListQuery) -> ApiResult<Vec<ManufacturingOrder>> {
        let _perf = PerfGuard::new("api.get_mo_list");
        let state = parse_state_filter(query.state.as_deref())?;
        let orchestrator = load_orchestrator(&self.config_manager)?;

        with_store(&self.conn, |store| {
            Ok(orchestrator.list_orders(
                store,
                &query.equipment_code,
                state,
                query.limit,
                query.offset,
            )?)
        })
    }

    // ==========================================
    // 重量记录
    // ==========================================

    /// 记录 MO 实际重量（目标重量按 BOM 计算）
    pub fn record_mo_weight(&self, request: &RecordWeightRequest) -> ApiResult<MoWeightRecord> {
        let _perf = PerfGuard::new("api.record_mo_weight");
        let now = Utc::now().naive_utc();

        with_store_transaction(&self.conn, |store| {
            Ok(MoWeightService::record_weight(store, request, now)?)
        })
    }

    /// 重量记录（按时间倒序）
    ///
    /// # 参数
    /// - mo_ref: None 时返回全部 MO 的记录
    /// - limit: None/0 取默认分页大小
    pub fn get_mo_weights(
        &self,
        mo_ref: Option<&MoRef>,
        limit: Option<u32>,
        offset: u32,
    ) -> ApiResult<Vec<MoWeightRecord>> {
        let _perf = PerfGuard::new("api.get_mo_weights");
        let orchestrator = load_orchestrator(&self.config_manager)?;
        let limit = orchestrator.config().clamp_limit(limit);

        with_store(&self.conn, |store| {
            Ok(MoWeightService::list_weights(store, mo_ref, limit, offset)?)
        })
    }
}

/// 解析状态过滤（空串视为不过滤）
fn parse_state_filter(raw: Option<&str>) -> ApiResult<Option<MoState>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => MoState::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知的 MO 状态: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_filter() {
        assert_eq!(parse_state_filter(None).unwrap(), None);
        assert_eq!(parse_state_filter(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_state_filter(Some("Progress")).unwrap(),
            Some(MoState::Progress)
        );

        let err = parse_state_filter(Some("planned")).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
