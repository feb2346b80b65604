use super::{conversion_error, SqliteStore};
use crate::db::{format_ts, parse_ts};
use crate::domain::types::{AllocationMode, ConsumptionSource};
use crate::domain::ConsumptionEvent;
use crate::repository::consumption_ledger::ConsumptionLedger;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Result as SqliteResult, Row};

const EVENT_SELECT: &str = r#"
    SELECT
        event_id, equipment_id, product_id, mo_id,
        consumed_qty, requested_qty, bom_target_qty,
        mode, source, event_ts, recorded_at
    FROM consumption_event
"#;

fn map_event(row: &Row<'_>) -> SqliteResult<ConsumptionEvent> {
    let mode_raw: String = row.get(7)?;
    let event_ts_raw: String = row.get(9)?;
    let recorded_raw: String = row.get(10)?;
    Ok(ConsumptionEvent {
        event_id: row.get(0)?,
        equipment_id: row.get(1)?,
        product_id: row.get(2)?,
        mo_id: row.get(3)?,
        consumed_qty: row.get(4)?,
        requested_qty: row.get(5)?,
        bom_target_qty: row.get(6)?,
        mode: AllocationMode::parse(&mode_raw)
            .ok_or_else(|| conversion_error(7, format!("未知的分配模式: {}", mode_raw)))?,
        source: ConsumptionSource::from_db_str(&row.get::<_, String>(8)?),
        timestamp: parse_ts(&event_ts_raw)
            .ok_or_else(|| conversion_error(9, format!("时间戳格式错误: {}", event_ts_raw)))?,
        recorded_at: parse_ts(&recorded_raw)
            .ok_or_else(|| conversion_error(10, format!("时间戳格式错误: {}", recorded_raw)))?,
    })
}

impl<'c> ConsumptionLedger for SqliteStore<'c> {
    fn append_event(&self, event: &ConsumptionEvent) -> RepositoryResult<()> {
        self.conn().execute(
            r#"
            INSERT INTO consumption_event (
                event_id, equipment_id, product_id, mo_id,
                consumed_qty, requested_qty, bom_target_qty,
                mode, source, event_ts, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                event.event_id,
                event.equipment_id,
                event.product_id,
                event.mo_id,
                event.consumed_qty,
                event.requested_qty,
                event.bom_target_qty,
                event.mode.to_db_str(),
                event.source.to_db_str(),
                format_ts(&event.timestamp),
                format_ts(&event.recorded_at),
            ],
        )?;
        Ok(())
    }

    fn list_events_by_mo(&self, mo_id: i64) -> RepositoryResult<Vec<ConsumptionEvent>> {
        self.list_events(Some(mo_id))
    }

    fn list_events(&self, mo_id: Option<i64>) -> RepositoryResult<Vec<ConsumptionEvent>> {
        let sql = format!("{} WHERE (?1 IS NULL OR mo_id = ?1) ORDER BY seq ASC", EVENT_SELECT);
        let mut stmt = self.conn().prepare(&sql)?;
        let events = stmt
            .query_map(params![mo_id], map_event)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(events)
    }

    fn has_event_for(&self, mo_id: i64, product_id: i64) -> RepositoryResult<bool> {
        let exists: i64 = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM consumption_event WHERE mo_id = ?1 AND product_id = ?2)",
            params![mo_id, product_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }
}
