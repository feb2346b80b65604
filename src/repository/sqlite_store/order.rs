use super::{conversion_error, SqliteStore};
use crate::domain::{
    BillOfMaterials, ComponentLine, DemandLine, DemandLineState, Equipment, ManufacturingOrder,
    MoRef, MoState, OutputLine, Product, ProductLookup, ProductRef,
};
use crate::domain::types::{ConnectionStatus, EquipmentType, SyncStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_store::OrderStore;
use crate::db::{format_ts, parse_ts};
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const MO_SELECT: &str = r#"
    SELECT
        mo.id, mo.name, mo.product_id, mo.planned_qty, mo.bom_id,
        COALESCE(mo.equipment_id, bom.equipment_id), mo.state,
        mo.date_finished, mo.done_note
    FROM manufacturing_order mo
    LEFT JOIN bom ON bom.id = mo.bom_id
"#;

const EQUIPMENT_SELECT: &str = r#"
    SELECT id, code, name, equipment_type, connection_status, sync_status, is_active
    FROM equipment
"#;

const PRODUCT_SELECT: &str = r#"
    SELECT id, template_id, default_code, name, weight_kg
    FROM product
"#;

const DEMAND_SELECT: &str = r#"
    SELECT id, mo_id, product_id, planned_qty, fulfilled_qty, channel, state
    FROM demand_line
"#;

fn map_mo(row: &Row<'_>) -> SqliteResult<ManufacturingOrder> {
    let state_raw: String = row.get(6)?;
    let state = MoState::parse(&state_raw)
        .ok_or_else(|| conversion_error(6, format!("未知的 MO 状态: {}", state_raw)))?;
    let date_finished = match row.get::<_, Option<String>>(7)? {
        Some(raw) => Some(
            parse_ts(&raw)
                .ok_or_else(|| conversion_error(7, format!("时间戳格式错误: {}", raw)))?,
        ),
        None => None,
    };
    Ok(ManufacturingOrder {
        id: row.get(0)?,
        name: row.get(1)?,
        product_id: row.get(2)?,
        planned_qty: row.get(3)?,
        bom_id: row.get(4)?,
        equipment_id: row.get(5)?,
        state,
        date_finished,
        done_note: row.get(8)?,
    })
}

fn map_equipment(row: &Row<'_>) -> SqliteResult<Equipment> {
    Ok(Equipment {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        equipment_type: EquipmentType::from_db_str(&row.get::<_, String>(3)?),
        connection_status: ConnectionStatus::from_db_str(&row.get::<_, String>(4)?),
        sync_status: SyncStatus::from_db_str(&row.get::<_, String>(5)?),
        is_active: row.get::<_, i64>(6)? != 0,
    })
}

fn map_product(row: &Row<'_>) -> SqliteResult<Product> {
    Ok(Product {
        id: row.get(0)?,
        template_id: row.get(1)?,
        default_code: row.get(2)?,
        name: row.get(3)?,
        weight_kg: row.get(4)?,
    })
}

fn map_demand(row: &Row<'_>) -> SqliteResult<DemandLine> {
    Ok(DemandLine {
        id: row.get(0)?,
        mo_id: row.get(1)?,
        product_id: row.get(2)?,
        planned_qty: row.get(3)?,
        fulfilled_qty: row.get(4)?,
        channel: row.get(5)?,
        state: DemandLineState::from_db_str(&row.get::<_, String>(6)?),
    })
}

impl<'c> SqliteStore<'c> {
    fn find_product_by_id(&self, product_id: i64) -> RepositoryResult<Option<Product>> {
        let sql = format!("{} WHERE id = ?1", PRODUCT_SELECT);
        let product = self
            .conn()
            .query_row(&sql, params![product_id], map_product)
            .optional()?;
        Ok(product)
    }

    fn ensure_updated(rows: usize, entity: &str, id: i64) -> RepositoryResult<()> {
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

impl<'c> OrderStore for SqliteStore<'c> {
    fn lookup_equipment_by_code(&self, code: &str) -> RepositoryResult<Option<Equipment>> {
        let sql = format!("{} WHERE code = ?1", EQUIPMENT_SELECT);
        let equipment = self
            .conn()
            .query_row(&sql, params![code], map_equipment)
            .optional()?;
        Ok(equipment)
    }

    fn lookup_equipment_by_id(&self, equipment_id: i64) -> RepositoryResult<Option<Equipment>> {
        let sql = format!("{} WHERE id = ?1", EQUIPMENT_SELECT);
        let equipment = self
            .conn()
            .query_row(&sql, params![equipment_id], map_equipment)
            .optional()?;
        Ok(equipment)
    }

    fn lookup_mo(&self, mo_ref: &MoRef) -> RepositoryResult<Option<ManufacturingOrder>> {
        let mo = match mo_ref {
            MoRef::Id(id) => {
                let sql = format!("{} WHERE mo.id = ?1", MO_SELECT);
                self.conn().query_row(&sql, params![id], map_mo).optional()?
            }
            MoRef::Name(name) => {
                let sql = format!("{} WHERE mo.name = ?1 LIMIT 1", MO_SELECT);
                self.conn().query_row(&sql, params![name], map_mo).optional()?
            }
        };
        Ok(mo)
    }

    fn lookup_product(&self, product_ref: &ProductRef) -> RepositoryResult<ProductLookup> {
        match *product_ref {
            ProductRef::Variant(product_id) => Ok(match self.find_product_by_id(product_id)? {
                Some(product) => ProductLookup::Found(product),
                None => ProductLookup::ProductNotFound,
            }),
            ProductRef::Template(template_id) => {
                let template_exists: bool = self
                    .conn()
                    .query_row(
                        "SELECT 1 FROM product_template WHERE id = ?1",
                        params![template_id],
                        |_row| Ok(true),
                    )
                    .optional()?
                    .unwrap_or(false);
                if !template_exists {
                    return Ok(ProductLookup::TemplateNotFound);
                }

                let sql = format!("{} WHERE template_id = ?1 ORDER BY id", PRODUCT_SELECT);
                let mut stmt = self.conn().prepare(&sql)?;
                let mut variants = stmt
                    .query_map(params![template_id], map_product)?
                    .collect::<SqliteResult<Vec<_>>>()?;

                Ok(match variants.len() {
                    0 => ProductLookup::TemplateHasNoVariant,
                    1 => ProductLookup::Found(variants.remove(0)),
                    n => ProductLookup::TemplateAmbiguous(n),
                })
            }
        }
    }

    fn get_open_demand_lines(
        &self,
        mo_id: i64,
        product_id: i64,
    ) -> RepositoryResult<Vec<DemandLine>> {
        let sql = format!(
            "{} WHERE mo_id = ?1 AND product_id = ?2 AND state = 'open' ORDER BY id",
            DEMAND_SELECT
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let lines = stmt
            .query_map(params![mo_id, product_id], map_demand)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    fn get_demand_lines(&self, mo_id: i64) -> RepositoryResult<Vec<DemandLine>> {
        let sql = format!("{} WHERE mo_id = ?1 ORDER BY id", DEMAND_SELECT);
        let mut stmt = self.conn().prepare(&sql)?;
        let lines = stmt
            .query_map(params![mo_id], map_demand)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    fn get_output_lines(&self, mo_id: i64) -> RepositoryResult<Vec<OutputLine>> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, mo_id, product_id, planned_qty, fulfilled_qty, cancelled
            FROM output_line
            WHERE mo_id = ?1
            ORDER BY id
            "#,
        )?;
        let lines = stmt
            .query_map(params![mo_id], |row| {
                Ok(OutputLine {
                    id: row.get(0)?,
                    mo_id: row.get(1)?,
                    product_id: row.get(2)?,
                    planned_qty: row.get(3)?,
                    fulfilled_qty: row.get(4)?,
                    cancelled: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    fn get_bom(&self, mo: &ManufacturingOrder) -> RepositoryResult<Option<BillOfMaterials>> {
        let bom_id = match mo.bom_id {
            Some(id) => id,
            None => return Ok(None),
        };

        let header = self
            .conn()
            .query_row(
                "SELECT id, reference_qty, equipment_id FROM bom WHERE id = ?1",
                params![bom_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        let (id, reference_qty, default_equipment_id) = match header {
            Some(h) => h,
            None => return Ok(None),
        };

        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, product_id, qty_per_bom_unit, channel
            FROM bom_line
            WHERE bom_id = ?1
            ORDER BY sequence, id
            "#,
        )?;
        let components = stmt
            .query_map(params![id], |row| {
                Ok(ComponentLine {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    qty_per_bom_unit: row.get(2)?,
                    channel: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(BillOfMaterials {
            id,
            reference_qty,
            default_equipment_id,
            components,
        }))
    }

    fn list_mos_for_equipment(
        &self,
        equipment_id: i64,
        state: Option<MoState>,
        limit: u32,
        offset: u32,
    ) -> RepositoryResult<Vec<ManufacturingOrder>> {
        let sql = format!(
            r#"{}
            WHERE COALESCE(mo.equipment_id, bom.equipment_id) = ?1
              AND (?2 IS NULL OR mo.state = ?2)
            ORDER BY mo.id ASC
            LIMIT ?3 OFFSET ?4
            "#,
            MO_SELECT
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let mos = stmt
            .query_map(
                params![equipment_id, state.map(|s| s.to_db_str()), limit, offset],
                map_mo,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(mos)
    }

    fn lock_order(&self, mo_id: i64) -> RepositoryResult<()> {
        let rows = self.conn().execute(
            "UPDATE manufacturing_order SET lock_seq = lock_seq + 1 WHERE id = ?1",
            params![mo_id],
        )?;
        Self::ensure_updated(rows, "ManufacturingOrder", mo_id)
    }

    fn set_demand_fulfilled(&self, line_id: i64, fulfilled_qty: f64) -> RepositoryResult<()> {
        let rows = self.conn().execute(
            "UPDATE demand_line SET fulfilled_qty = ?1 WHERE id = ?2",
            params![fulfilled_qty, line_id],
        )?;
        Self::ensure_updated(rows, "DemandLine", line_id)
    }

    fn set_output_fulfilled(&self, line_id: i64, fulfilled_qty: f64) -> RepositoryResult<()> {
        let rows = self.conn().execute(
            "UPDATE output_line SET fulfilled_qty = ?1 WHERE id = ?2",
            params![fulfilled_qty, line_id],
        )?;
        Self::ensure_updated(rows, "OutputLine", line_id)
    }

    fn set_mo_state(&self, mo_id: i64, state: MoState) -> RepositoryResult<()> {
        let rows = self.conn().execute(
            "UPDATE manufacturing_order SET state = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![state.to_db_str(), mo_id],
        )?;
        Self::ensure_updated(rows, "ManufacturingOrder", mo_id)
    }

    fn transition_mo_to_done(
        &self,
        mo_id: i64,
        finished_at: NaiveDateTime,
        note: Option<&str>,
    ) -> RepositoryResult<()> {
        let rows = self.conn().execute(
            r#"
            UPDATE manufacturing_order
            SET state = 'done', date_finished = ?2, done_note = ?3, updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![mo_id, format_ts(&finished_at), note],
        )?;
        Self::ensure_updated(rows, "ManufacturingOrder", mo_id)?;

        self.conn().execute(
            "UPDATE demand_line SET state = 'done' WHERE mo_id = ?1 AND state = 'open'",
            params![mo_id],
        )?;
        Ok(())
    }
}
