use super::{conversion_error, SqliteStore};
use crate::db::{format_ts, parse_ts};
use crate::domain::MoWeightRecord;
use crate::repository::error::RepositoryResult;
use crate::repository::weight_store::MoWeightStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult};

impl<'c> MoWeightStore for SqliteStore<'c> {
    fn insert_weight(
        &self,
        mo_id: i64,
        target_weight: f64,
        actual_weight: f64,
        timestamp: NaiveDateTime,
        notes: Option<&str>,
    ) -> RepositoryResult<i64> {
        self.conn().execute(
            r#"
            INSERT INTO mo_weight (mo_id, target_weight, actual_weight, weight_ts, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![mo_id, target_weight, actual_weight, format_ts(&timestamp), notes],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    fn list_weights(
        &self,
        mo_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<MoWeightRecord>> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, mo_id, target_weight, actual_weight, weight_ts, notes
            FROM mo_weight
            WHERE (?1 IS NULL OR mo_id = ?1)
            ORDER BY weight_ts DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;
        let records = stmt
            .query_map(params![mo_id, limit, offset], |row| {
                let ts_raw: String = row.get(4)?;
                Ok(MoWeightRecord {
                    id: row.get(0)?,
                    mo_id: row.get(1)?,
                    target_weight: row.get(2)?,
                    actual_weight: row.get(3)?,
                    timestamp: parse_ts(&ts_raw).ok_or_else(|| {
                        conversion_error(4, format!("时间戳格式错误: {}", ts_raw))
                    })?,
                    notes: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}
