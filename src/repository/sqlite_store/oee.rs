use super::{conversion_error, SqliteStore};
use crate::db::{format_ts, parse_ts};
use crate::domain::types::DeviationLevel;
use crate::domain::{OeeLine, OeeSummary};
use crate::repository::error::RepositoryResult;
use crate::repository::oee_store::OeeSummaryStore;
use rusqlite::{params, OptionalExtension, Result as SqliteResult};

impl<'c> OeeSummaryStore for SqliteStore<'c> {
    fn replace_summary(&self, summary: &OeeSummary) -> RepositoryResult<()> {
        self.in_savepoint("oee_replace", || {
            let conn = self.conn();

            // 先清空旧通道行，避免旧 BOM 版本的通道残留
            conn.execute("DELETE FROM oee_line WHERE mo_id = ?1", params![summary.mo_id])?;

            conn.execute(
                r#"
                INSERT INTO oee_summary (
                    mo_id, equipment_id, date_done,
                    qty_planned, qty_finished, variance_finished,
                    qty_bom_consumption, qty_actual_consumption, variance_consumption,
                    yield_percent, consumption_ratio,
                    avg_efficiency_score, max_abs_deviation_pct, deviation_alert_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(mo_id) DO UPDATE SET
                    equipment_id = excluded.equipment_id,
                    date_done = excluded.date_done,
                    qty_planned = excluded.qty_planned,
                    qty_finished = excluded.qty_finished,
                    variance_finished = excluded.variance_finished,
                    qty_bom_consumption = excluded.qty_bom_consumption,
                    qty_actual_consumption = excluded.qty_actual_consumption,
                    variance_consumption = excluded.variance_consumption,
                    yield_percent = excluded.yield_percent,
                    consumption_ratio = excluded.consumption_ratio,
                    avg_efficiency_score = excluded.avg_efficiency_score,
                    max_abs_deviation_pct = excluded.max_abs_deviation_pct,
                    deviation_alert_count = excluded.deviation_alert_count
                "#,
                params![
                    summary.mo_id,
                    summary.equipment_id,
                    format_ts(&summary.date_done),
                    summary.qty_planned,
                    summary.qty_finished,
                    summary.variance_finished,
                    summary.qty_bom_consumption,
                    summary.qty_actual_consumption,
                    summary.variance_consumption,
                    summary.yield_percent,
                    summary.consumption_ratio,
                    summary.avg_efficiency_score,
                    summary.max_abs_deviation_pct,
                    summary.deviation_alert_count,
                ],
            )?;

            let mut stmt = conn.prepare(
                r#"
                INSERT INTO oee_line (
                    mo_id, channel, to_consume, consumed, variance,
                    consumption_ratio, deviation_pct, efficiency_score, deviation_level
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for line in &summary.lines {
                stmt.execute(params![
                    summary.mo_id,
                    line.channel,
                    line.to_consume,
                    line.consumed,
                    line.variance,
                    line.consumption_ratio,
                    line.deviation_pct,
                    line.efficiency_score,
                    line.deviation_level.to_db_str(),
                ])?;
            }
            Ok(())
        })
    }

    fn find_summary(&self, mo_id: i64) -> RepositoryResult<Option<OeeSummary>> {
        let conn = self.conn();
        let header = conn
            .query_row(
                r#"
                SELECT
                    s.mo_id, mo.name, s.equipment_id, s.date_done,
                    s.qty_planned, s.qty_finished, s.variance_finished,
                    s.qty_bom_consumption, s.qty_actual_consumption, s.variance_consumption,
                    s.yield_percent, s.consumption_ratio,
                    s.avg_efficiency_score, s.max_abs_deviation_pct, s.deviation_alert_count
                FROM oee_summary s
                JOIN manufacturing_order mo ON mo.id = s.mo_id
                WHERE s.mo_id = ?1
                "#,
                params![mo_id],
                |row| {
                    let date_raw: String = row.get(3)?;
                    Ok(OeeSummary {
                        mo_id: row.get(0)?,
                        mo_name: row.get(1)?,
                        equipment_id: row.get(2)?,
                        date_done: parse_ts(&date_raw).ok_or_else(|| {
                            conversion_error(3, format!("时间戳格式错误: {}", date_raw))
                        })?,
                        qty_planned: row.get(4)?,
                        qty_finished: row.get(5)?,
                        variance_finished: row.get(6)?,
                        qty_bom_consumption: row.get(7)?,
                        qty_actual_consumption: row.get(8)?,
                        variance_consumption: row.get(9)?,
                        yield_percent: row.get(10)?,
                        consumption_ratio: row.get(11)?,
                        avg_efficiency_score: row.get(12)?,
                        max_abs_deviation_pct: row.get(13)?,
                        deviation_alert_count: row.get(14)?,
                        lines: Vec::new(),
                    })
                },
            )
            .optional()?;

        let mut summary = match header {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT channel, to_consume, consumed, variance,
                   consumption_ratio, deviation_pct, efficiency_score, deviation_level
            FROM oee_line
            WHERE mo_id = ?1
            ORDER BY channel ASC
            "#,
        )?;
        summary.lines = stmt
            .query_map(params![mo_id], |row| {
                Ok(OeeLine {
                    channel: row.get(0)?,
                    to_consume: row.get(1)?,
                    consumed: row.get(2)?,
                    variance: row.get(3)?,
                    consumption_ratio: row.get(4)?,
                    deviation_pct: row.get(5)?,
                    efficiency_score: row.get(6)?,
                    deviation_level: DeviationLevel::from_db_str(&row.get::<_, String>(7)?),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(summary))
    }
}
