// ==========================================
// SCADA 物料消耗对账系统 - 引擎编排器
// ==========================================
// 用途: 协调校验门、BOM 目标量、分配引擎、台账与 OEE 对账
// 约定: 存储接口由调用方显式传入，事务与锁范围由调用方决定
// 红线: Engine 不拼 SQL
// ==========================================

use crate::config::ConsumptionConfig;
use crate::domain::types::{AllocationMode, ConsumptionSource, MoState};
use crate::domain::{
    ConsumptionEvent, ManufacturingOrder, MoRef, OeeSummary, ProductLookup, ProductRef,
};
use crate::engine::allocator::{planned_shares, AllocationOutcome, ConsumptionAllocator, QTY_EPSILON};
use crate::engine::bom_target::{BomTargetResolver, BomTargets};
use crate::engine::error::{ConsumptionError, ConsumptionResult};
use crate::engine::oee_reconciler::{OeeReconciler, ReconcileInput};
use crate::engine::validation_gate::{
    ConsumptionPayload, ValidatedConsumption, ValidationGate, ValidationIssue,
};
use crate::repository::{ConsumptionLedger, OeeSummaryStore, OrderStore, RepositoryError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 请求 / 结果
// ==========================================

/// 消耗上报请求（mode / allow_overconsume 缺省取配置）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyConsumptionRequest {
    #[serde(flatten)]
    pub payload: ConsumptionPayload,
    #[serde(default)]
    pub mode: Option<AllocationMode>,
    #[serde(default)]
    pub allow_overconsume: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConsumptionOutcome {
    pub event_id: String,
    pub mo_id: i64,
    pub mo_name: String,
    pub product_id: i64,
    pub equipment_id: i64,
    pub mode: AllocationMode,
    pub requested_qty: f64,
    pub applied_qty: f64,
    pub affected_line_ids: Vec<i64>,
    pub mo_state: MoState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkDoneRequest {
    pub mo: MoRef,
    pub finished_qty: f64,
    #[serde(default)]
    pub auto_consume: Option<bool>,
    /// 实际完工时间（RFC 3339 或 YYYY-MM-DD HH:MM:SS），缺省取当前时间
    #[serde(default)]
    pub date_end_actual: Option<String>,
    /// 完工备注，记录在 MO 上
    #[serde(default)]
    pub message: Option<String>,
}

/// 完工自动补齐的单个物料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumedMaterial {
    pub product_id: i64,
    pub product_code: String,
    pub target_qty: f64,
    pub applied_qty: f64,
    pub affected_line_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkDoneOutcome {
    pub mo_id: i64,
    pub mo_name: String,
    pub finished_qty: f64,
    pub consumed_materials: Vec<ConsumedMaterial>,
    pub summary: OeeSummary,
}

// ==========================================
// ConsumptionOrchestrator - 消耗对账编排器
// ==========================================
pub struct ConsumptionOrchestrator {
    config: ConsumptionConfig,
    gate: ValidationGate,
    reconciler: OeeReconciler,
}

impl ConsumptionOrchestrator {
    /// # 参数
    /// - config: 消耗对账配置（通常由 ConfigManager 加载）
    pub fn new(config: ConsumptionConfig) -> Self {
        Self {
            gate: ValidationGate::new(config.future_tolerance_secs),
            reconciler: OeeReconciler::new(config.deviation_thresholds),
            config,
        }
    }

    pub fn config(&self) -> &ConsumptionConfig {
        &self.config
    }

    // ==========================================
    // 载荷校验（只读）
    // ==========================================

    pub fn validate_payload<S: OrderStore>(
        &self,
        store: &S,
        payload: &ConsumptionPayload,
        now: NaiveDateTime,
    ) -> ConsumptionResult<(bool, String)> {
        self.gate.check(store, payload, now)
    }

    // ==========================================
    // 消耗上报
    // ==========================================

    /// 应用设备消耗上报
    ///
    /// 流程:
    /// 1) 校验载荷（失败时不产生任何写入）
    /// 2) 锁定 MO 并在锁内复核状态
    /// 3) 按模式分配到开放需求行
    /// 4) 追加台账事件（使用实际分配量）
    /// 5) confirmed MO 有实际分配时转为 progress
    ///
    /// # 返回
    /// 实际分配量可能小于请求量（未开启超耗时），不视为错误
    #[instrument(skip(self, store, request), fields(
        equipment = ?request.payload.equipment_code,
        mo = ?request.payload.mo,
        quantity = ?request.payload.quantity
    ))]
    pub fn apply_consumption<S>(
        &self,
        store: &S,
        request: &ApplyConsumptionRequest,
        now: NaiveDateTime,
    ) -> ConsumptionResult<ApplyConsumptionOutcome>
    where
        S: OrderStore + ConsumptionLedger,
    {
        let ValidatedConsumption {
            equipment,
            product,
            mo,
            quantity,
            timestamp,
        } = self.gate.validate(store, &request.payload, now)?;

        let mode = request.mode.unwrap_or(self.config.default_mode);
        let allow_overconsume = request
            .allow_overconsume
            .unwrap_or(self.config.allow_overconsume);

        let mo = self.lock_and_reload(store, &mo)?;
        if !mo.state.can_allocate() {
            warn!(mo = %mo.name, state = %mo.state, "MO 已处于终态，拒绝消耗分配");
            return Err(state_error(&mo));
        }

        let open_lines = store.get_open_demand_lines(mo.id, product.id)?;
        if open_lines.is_empty() {
            return Err(ConsumptionError::Allocation(format!(
                "产品 {} 在 MO {} 上没有开放的需求行",
                product.display_code(),
                mo.name
            )));
        }

        let scoped_lines = if mode == AllocationMode::Replace {
            self.replace_scope_lines(open_lines, &equipment.code)
        } else {
            open_lines
        };

        let outcome =
            ConsumptionAllocator::allocate(&scoped_lines, quantity, mode, allow_overconsume)?;
        write_allocation(store, &outcome)?;

        let bom = store.get_bom(&mo)?;
        let bom_target_qty =
            BomTargetResolver::resolve(bom.as_ref(), mo.planned_qty).for_product(product.id);

        let event = ConsumptionEvent {
            event_id: Uuid::new_v4().to_string(),
            equipment_id: Some(equipment.id),
            product_id: product.id,
            mo_id: mo.id,
            consumed_qty: outcome.applied_qty,
            requested_qty: quantity,
            bom_target_qty,
            mode,
            source: ConsumptionSource::Api,
            timestamp,
            recorded_at: now,
        };
        store.append_event(&event)?;

        let mut mo_state = mo.state;
        if outcome.applied_qty > QTY_EPSILON
            && mo.state == MoState::Confirmed
            && self.config.promote_confirmed_to_progress
            && mo.state.can_transition_to(MoState::Progress)
        {
            store.set_mo_state(mo.id, MoState::Progress)?;
            mo_state = MoState::Progress;
            debug!(mo = %mo.name, "MO 状态 confirmed -> progress");
        }

        if outcome.applied_qty + QTY_EPSILON < quantity {
            info!(
                requested = quantity,
                applied = outcome.applied_qty,
                "部分分配：需求行剩余容量不足"
            );
        }
        info!(
            event_id = %event.event_id,
            mode = %mode,
            applied = outcome.applied_qty,
            lines = outcome.affected_line_ids.len(),
            "消耗已分配"
        );

        Ok(ApplyConsumptionOutcome {
            event_id: event.event_id,
            mo_id: mo.id,
            mo_name: mo.name,
            product_id: product.id,
            equipment_id: equipment.id,
            mode,
            requested_qty: quantity,
            applied_qty: outcome.applied_qty,
            affected_line_ids: outcome.affected_line_ids,
            mo_state,
        })
    }

    /// replace 清零范围
    ///
    /// channel 范围只取通道与上报设备编码一致的行，无匹配时回退到产品全部开放行
    fn replace_scope_lines(
        &self,
        lines: Vec<crate::domain::DemandLine>,
        equipment_code: &str,
    ) -> Vec<crate::domain::DemandLine> {
        use crate::domain::types::ReplaceScope;

        if self.config.replace_scope != ReplaceScope::Channel {
            return lines;
        }
        let matched: Vec<_> = lines
            .iter()
            .filter(|l| l.channel.as_deref() == Some(equipment_code))
            .cloned()
            .collect();
        if matched.is_empty() {
            debug!(equipment_code, "无匹配通道的需求行，回退到产品范围");
            lines
        } else {
            matched
        }
    }

    // ==========================================
    // 完工
    // ==========================================

    /// 标记 MO 完工
    ///
    /// 流程:
    /// 1) 完工数量按计划量比例写入产出行
    /// 2) （可选）按 BOM 自动补齐尚无消耗记录的物料
    /// 3) MO 转为 done
    /// 4) 重建 OEE 汇总
    #[instrument(skip(self, store, request), fields(mo = %request.mo, finished_qty = request.finished_qty))]
    pub fn mark_order_done<S>(
        &self,
        store: &S,
        request: &MarkDoneRequest,
        now: NaiveDateTime,
    ) -> ConsumptionResult<MarkDoneOutcome>
    where
        S: OrderStore + ConsumptionLedger + OeeSummaryStore,
    {
        let finished_qty = request.finished_qty;
        let mut issues = Vec::new();
        if !(finished_qty.is_finite() && finished_qty >= 0.0) {
            issues.push(ValidationIssue::NegativeFinishedQuantity {
                quantity: finished_qty,
            });
        }
        let date_done = match self
            .gate
            .resolve_timestamp(request.date_end_actual.as_deref(), now)
        {
            Ok(ts) => Some(ts),
            Err(issue) => {
                issues.push(issue);
                None
            }
        };
        let date_done = match date_done {
            Some(ts) if issues.is_empty() => ts,
            _ => return Err(ConsumptionError::from_issues(issues)),
        };
        let note = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let mo = self.find_mo(store, &request.mo)?;
        let mo = self.lock_and_reload(store, &mo)?;
        if !mo.state.can_transition_to(MoState::Done) {
            warn!(mo = %mo.name, state = %mo.state, "MO 已处于终态，拒绝完工");
            return Err(state_error(&mo));
        }

        // 1. 产出行
        let outputs: Vec<_> = store
            .get_output_lines(mo.id)?
            .into_iter()
            .filter(|o| !o.cancelled)
            .collect();
        if outputs.is_empty() {
            warn!(mo = %mo.name, "MO 没有有效产出行，完工数量仅计入 OEE 汇总");
        }
        let planned: Vec<f64> = outputs.iter().map(|o| o.planned_qty.max(0.0)).collect();
        for (output, qty) in outputs.iter().zip(planned_shares(&planned, finished_qty, false)) {
            store.set_output_fulfilled(output.id, qty)?;
        }

        // 2. 自动补齐
        let bom = store.get_bom(&mo)?;
        let targets = BomTargetResolver::resolve(bom.as_ref(), mo.planned_qty);
        let auto_consume = request
            .auto_consume
            .unwrap_or(self.config.mark_done_auto_consume);
        let consumed_materials = if auto_consume {
            self.auto_consume_from_bom(store, &mo, &targets, now)?
        } else {
            Vec::new()
        };

        // 3. 状态转换（完工时间与 OEE 汇总一致）
        store.transition_mo_to_done(mo.id, date_done, note)?;

        // 4. OEE
        let demand_lines = store.get_demand_lines(mo.id)?;
        let summary = self.reconciler.build_summary(&ReconcileInput {
            mo: &mo,
            targets: &targets,
            demand_lines: &demand_lines,
            finished_qty,
            date_done,
        });
        store.replace_summary(&summary)?;

        info!(
            mo = %mo.name,
            auto_consumed = consumed_materials.len(),
            oee_lines = summary.lines.len(),
            alerts = summary.deviation_alert_count,
            "MO 已完工"
        );

        Ok(MarkDoneOutcome {
            mo_id: mo.id,
            mo_name: mo.name,
            finished_qty,
            consumed_materials,
            summary,
        })
    }

    /// 按 BOM 目标量补齐消耗
    ///
    /// 规则:
    /// - 已有任何台账记录的产品跳过（以设备上报为准）
    /// - 没有开放需求行的产品跳过
    /// - replace + 超耗，使需求行最终恰好等于目标量
    fn auto_consume_from_bom<S>(
        &self,
        store: &S,
        mo: &ManufacturingOrder,
        targets: &BomTargets,
        now: NaiveDateTime,
    ) -> ConsumptionResult<Vec<ConsumedMaterial>>
    where
        S: OrderStore + ConsumptionLedger,
    {
        if targets.degraded {
            warn!(mo = %mo.name, "BOM 参考数量为 0，跳过自动补齐");
            return Ok(Vec::new());
        }

        let mut consumed = Vec::new();
        for (product_id, target_qty) in targets.by_product() {
            if store.has_event_for(mo.id, product_id)? {
                debug!(product_id, "已有消耗记录，跳过自动补齐");
                continue;
            }

            let lines = store.get_open_demand_lines(mo.id, product_id)?;
            if lines.is_empty() {
                warn!(mo = %mo.name, product_id, "BOM 物料没有开放需求行，跳过自动补齐");
                continue;
            }

            let outcome =
                ConsumptionAllocator::allocate(&lines, target_qty, AllocationMode::Replace, true)?;
            write_allocation(store, &outcome)?;

            store.append_event(&ConsumptionEvent {
                event_id: Uuid::new_v4().to_string(),
                equipment_id: mo.equipment_id,
                product_id,
                mo_id: mo.id,
                consumed_qty: outcome.applied_qty,
                requested_qty: target_qty,
                bom_target_qty: target_qty,
                mode: AllocationMode::Replace,
                source: ConsumptionSource::AutoBom,
                timestamp: now,
                recorded_at: now,
            })?;

            let product_code = match store.lookup_product(&ProductRef::Variant(product_id))? {
                ProductLookup::Found(p) => p.display_code().to_string(),
                _ => product_id.to_string(),
            };
            consumed.push(ConsumedMaterial {
                product_id,
                product_code,
                target_qty,
                applied_qty: outcome.applied_qty,
                affected_line_ids: outcome.affected_line_ids,
            });
        }
        Ok(consumed)
    }

    // ==========================================
    // OEE 汇总
    // ==========================================

    /// 重建 OEE 汇总（取消状态的 MO 除外）
    ///
    /// 完工日期沿用已有汇总，其次取 MO 完工时间，都没有时取当前时间
    #[instrument(skip(self, store), fields(mo = %mo_ref))]
    pub fn rebuild_oee_summary<S>(
        &self,
        store: &S,
        mo_ref: &MoRef,
        now: NaiveDateTime,
    ) -> ConsumptionResult<OeeSummary>
    where
        S: OrderStore + OeeSummaryStore,
    {
        let mo = self.find_mo(store, mo_ref)?;
        let mo = self.lock_and_reload(store, &mo)?;
        if mo.state == MoState::Cancel {
            return Err(state_error(&mo));
        }

        let bom = store.get_bom(&mo)?;
        let targets = BomTargetResolver::resolve(bom.as_ref(), mo.planned_qty);
        let demand_lines = store.get_demand_lines(mo.id)?;
        let finished_qty: f64 = store
            .get_output_lines(mo.id)?
            .iter()
            .filter(|o| !o.cancelled)
            .map(|o| o.fulfilled_qty)
            .sum();
        let date_done = match store.find_summary(mo.id)? {
            Some(existing) => existing.date_done,
            None => mo.date_finished.unwrap_or(now),
        };

        let summary = self.reconciler.build_summary(&ReconcileInput {
            mo: &mo,
            targets: &targets,
            demand_lines: &demand_lines,
            finished_qty,
            date_done,
        });
        store.replace_summary(&summary)?;

        info!(mo = %mo.name, oee_lines = summary.lines.len(), "OEE 汇总已重建");
        Ok(summary)
    }

    pub fn get_oee_summary<S>(&self, store: &S, mo_ref: &MoRef) -> ConsumptionResult<Option<OeeSummary>>
    where
        S: OrderStore + OeeSummaryStore,
    {
        let mo = self.find_mo(store, mo_ref)?;
        Ok(store.find_summary(mo.id)?)
    }

    // ==========================================
    // MO 列表
    // ==========================================

    /// 设备关联的 MO 列表
    ///
    /// # 参数
    /// - limit: None/0 取默认分页大小，超过上限按上限截断
    pub fn list_orders<S: OrderStore>(
        &self,
        store: &S,
        equipment_code: &str,
        state: Option<MoState>,
        limit: Option<u32>,
        offset: u32,
    ) -> ConsumptionResult<Vec<ManufacturingOrder>> {
        let code = equipment_code.trim();
        if code.is_empty() {
            return Err(ConsumptionError::single_issue(ValidationIssue::MissingField {
                field: "equipment_code".to_string(),
            }));
        }
        let equipment = store.lookup_equipment_by_code(code)?.ok_or_else(|| {
            ConsumptionError::single_issue(ValidationIssue::EquipmentNotFound {
                code: code.to_string(),
            })
        })?;

        let limit = self.config.clamp_limit(limit);
        Ok(store.list_mos_for_equipment(equipment.id, state, limit, offset)?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    pub(crate) fn find_mo<S: OrderStore + ?Sized>(
        &self,
        store: &S,
        mo_ref: &MoRef,
    ) -> ConsumptionResult<ManufacturingOrder> {
        store.lookup_mo(mo_ref)?.ok_or_else(|| {
            ConsumptionError::single_issue(ValidationIssue::MoNotFound {
                mo: mo_ref.to_string(),
            })
        })
    }

    /// 锁定 MO 并重新读取（锁内状态为准）
    fn lock_and_reload<S: OrderStore + ?Sized>(
        &self,
        store: &S,
        mo: &ManufacturingOrder,
    ) -> ConsumptionResult<ManufacturingOrder> {
        store.lock_order(mo.id)?;
        store.lookup_mo(&MoRef::Id(mo.id))?.ok_or_else(|| {
            ConsumptionError::Repository(RepositoryError::NotFound {
                entity: "ManufacturingOrder".to_string(),
                id: mo.id.to_string(),
            })
        })
    }
}

fn state_error(mo: &ManufacturingOrder) -> ConsumptionError {
    ConsumptionError::State {
        mo_name: mo.name.clone(),
        state: mo.state,
    }
}

fn write_allocation<S: OrderStore + ?Sized>(
    store: &S,
    outcome: &AllocationOutcome,
) -> ConsumptionResult<()> {
    for update in &outcome.updates {
        store.set_demand_fulfilled(update.line_id, update.fulfilled_qty)?;
    }
    Ok(())
}
