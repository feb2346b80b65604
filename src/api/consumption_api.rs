// ==========================================
// SCADA 物料消耗对账系统 - 消耗上报 API
// ==========================================
// 职责: 设备消耗上报、载荷预校验、消耗台账查询与导出
// 红线: 校验失败不产生任何写入
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::support::{load_orchestrator, with_store, with_store_transaction};
use crate::config::ConfigManager;
use crate::db::format_ts;
use crate::domain::{ConsumptionEvent, MoRef};
use crate::engine::{ApplyConsumptionOutcome, ApplyConsumptionRequest, ConsumptionPayload};
use crate::perf::PerfGuard;
use crate::repository::ConsumptionLedger;

// ==========================================
// PayloadCheck - 载荷预校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadCheck {
    pub ok: bool,
    pub message: String,
}

// ==========================================
// LedgerCsvRow - 台账导出行
// ==========================================
#[derive(Debug, Serialize)]
struct LedgerCsvRow<'a> {
    event_id: &'a str,
    mo_id: i64,
    product_id: i64,
    equipment_id: Option<i64>,
    mode: &'static str,
    source: &'static str,
    requested_qty: f64,
    consumed_qty: f64,
    bom_target_qty: f64,
    timestamp: String,
    recorded_at: String,
}

impl<'a> From<&'a ConsumptionEvent> for LedgerCsvRow<'a> {
    fn from(event: &'a ConsumptionEvent) -> Self {
        Self {
            event_id: &event.event_id,
            mo_id: event.mo_id,
            product_id: event.product_id,
            equipment_id: event.equipment_id,
            mode: event.mode.to_db_str(),
            source: event.source.to_db_str(),
            requested_qty: event.requested_qty,
            consumed_qty: event.consumed_qty,
            bom_target_qty: event.bom_target_qty,
            timestamp: format_ts(&event.timestamp),
            recorded_at: format_ts(&event.recorded_at),
        }
    }
}

// ==========================================
// ConsumptionApi - 消耗上报 API
// ==========================================

/// 消耗上报API
///
/// 职责：
/// 1. 设备消耗上报（add / replace）
/// 2. 载荷预校验（只读）
/// 3. 消耗台账查询与 CSV 导出
pub struct ConsumptionApi {
    conn: Arc<Mutex<Connection>>,
    config_manager: Arc<ConfigManager>,
}

impl ConsumptionApi {
    /// 创建新的ConsumptionApi实例
    ///
    /// # 参数
    /// - conn: 共享数据库连接
    /// - config_manager: 配置管理器（每次调用读取最新配置）
    pub fn new(conn: Arc<Mutex<Connection>>, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            conn,
            config_manager,
        }
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 应用设备消耗上报
    ///
    /// # 返回
    /// - Ok(ApplyConsumptionOutcome): 实际分配量、受影响需求行、MO 最新状态
    /// - Err(ApiError::ValidationError): 载荷校验失败
    /// - Err(ApiError::StateError): MO 已完工或已取消
    /// - Err(ApiError::AllocationError): 该产品在 MO 上没有开放需求行
    pub fn apply_consumption(
        &self,
        request: &ApplyConsumptionRequest,
    ) -> ApiResult<ApplyConsumptionOutcome> {
        let _perf = PerfGuard::new("api.apply_consumption");
        let orchestrator = load_orchestrator(&self.config_manager)?;
        let now = Utc::now().naive_utc();

        let outcome = with_store_transaction(&self.conn, |store| {
            Ok(orchestrator.apply_consumption(store, request, now)?)
        })?;

        info!(
            event_id = %outcome.event_id,
            mo = %outcome.mo_name,
            applied = outcome.applied_qty,
            "消耗上报完成"
        );
        Ok(outcome)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 仅执行载荷校验，不写入
    ///
    /// # 返回
    /// - ok=false 时 message 为全部校验问题的汇总
    pub fn validate_payload(&self, payload: &ConsumptionPayload) -> ApiResult<PayloadCheck> {
        let _perf = PerfGuard::new("api.validate_payload");
        let orchestrator = load_orchestrator(&self.config_manager)?;
        let now = Utc::now().naive_utc();

        let (ok, message) = with_store(&self.conn, |store| {
            Ok(orchestrator.validate_payload(store, payload, now)?)
        })?;
        debug!(ok, message = %message, "载荷预校验");
        Ok(PayloadCheck { ok, message })
    }

    /// MO 的消耗事件（按入账顺序）
    pub fn list_consumption_events(&self, mo_ref: &MoRef) -> ApiResult<Vec<ConsumptionEvent>> {
        let _perf = PerfGuard::new("api.list_consumption_events");
        let orchestrator = load_orchestrator(&self.config_manager)?;

        with_store(&self.conn, |store| {
            let mo = orchestrator.find_mo(store, mo_ref)?;
            Ok(store.list_events_by_mo(mo.id)?)
        })
    }

    /// 导出消耗台账为 CSV（含表头）
    ///
    /// # 参数
    /// - mo_ref: None 时导出全部事件
    pub fn export_ledger_csv(&self, mo_ref: Option<&MoRef>) -> ApiResult<String> {
        let _perf = PerfGuard::new("api.export_ledger_csv");
        let orchestrator = load_orchestrator(&self.config_manager)?;

        let events = with_store(&self.conn, |store| {
            let mo_id = match mo_ref {
                Some(r) => Some(orchestrator.find_mo(store, r)?.id),
                None => None,
            };
            Ok(store.list_events(mo_id)?)
        })?;

        let csv = write_ledger_csv(&events)?;
        info!(rows = events.len(), "消耗台账已导出");
        Ok(csv)
    }
}

/// 事件列表写为 CSV 文本
///
/// 空列表时仍输出表头
fn write_ledger_csv(events: &[ConsumptionEvent]) -> ApiResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record([
            "event_id",
            "mo_id",
            "product_id",
            "equipment_id",
            "mode",
            "source",
            "requested_qty",
            "consumed_qty",
            "bom_target_qty",
            "timestamp",
            "recorded_at",
        ])
        .map_err(|e| ApiError::ExportError(e.to_string()))?;

    for event in events {
        writer
            .serialize(LedgerCsvRow::from(event))
            .map_err(|e| ApiError::ExportError(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::ExportError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ApiError::ExportError(e.to_string()))
}
