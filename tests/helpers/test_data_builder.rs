// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use rusqlite::{params, Connection};
use scada_consumption::domain::MoState;

// ==========================================
// 主数据
// ==========================================

pub struct TestDataBuilder<'c> {
    conn: &'c Connection,
}

impl<'c> TestDataBuilder<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn equipment(&self, code: &str) -> i64 {
        self.conn
            .execute(
                "INSERT INTO equipment (code, name, equipment_type) VALUES (?1, ?1, 'injector')",
                params![code],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn template(&self, name: &str) -> i64 {
        self.conn
            .execute("INSERT INTO product_template (name) VALUES (?1)", params![name])
            .unwrap();
        self.conn.last_insert_rowid()
    }

    /// 新建单变体产品（模板与产品同名）
    pub fn product(&self, code: &str, weight_kg: f64) -> i64 {
        let template_id = self.template(code);
        self.variant(template_id, code, weight_kg)
    }

    pub fn variant(&self, template_id: i64, code: &str, weight_kg: f64) -> i64 {
        self.conn
            .execute(
                "INSERT INTO product (template_id, default_code, name, weight_kg) VALUES (?1, ?2, ?2, ?3)",
                params![template_id, code, weight_kg],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn template_of(&self, product_id: i64) -> i64 {
        self.conn
            .query_row(
                "SELECT template_id FROM product WHERE id = ?1",
                [product_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    pub fn bom(&self, reference_qty: f64) -> BomBuilder<'c> {
        BomBuilder {
            conn: self.conn,
            reference_qty,
            equipment_id: None,
            lines: Vec::new(),
        }
    }

    pub fn mo(&self, name: &str, product_id: i64, planned_qty: f64) -> MoBuilder<'c> {
        MoBuilder {
            conn: self.conn,
            name: name.to_string(),
            product_id,
            planned_qty,
            bom_id: None,
            equipment_id: None,
            state: MoState::Confirmed,
            demand: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

// ==========================================
// BOM 构建器
// ==========================================

pub struct BomBuilder<'c> {
    conn: &'c Connection,
    reference_qty: f64,
    equipment_id: Option<i64>,
    lines: Vec<(i64, f64, Option<String>)>,
}

impl<'c> BomBuilder<'c> {
    pub fn equipment(mut self, equipment_id: i64) -> Self {
        self.equipment_id = Some(equipment_id);
        self
    }

    pub fn line(mut self, product_id: i64, qty_per_bom_unit: f64, channel: &str) -> Self {
        self.lines
            .push((product_id, qty_per_bom_unit, Some(channel.to_string())));
        self
    }

    pub fn insert(self) -> i64 {
        self.conn
            .execute(
                "INSERT INTO bom (reference_qty, equipment_id) VALUES (?1, ?2)",
                params![self.reference_qty, self.equipment_id],
            )
            .unwrap();
        let bom_id = self.conn.last_insert_rowid();

        for (seq, (product_id, qty, channel)) in self.lines.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO bom_line (bom_id, product_id, qty_per_bom_unit, channel, sequence)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![bom_id, product_id, qty, channel, seq as i64 + 1],
                )
                .unwrap();
        }
        bom_id
    }
}

// ==========================================
// MO 构建器
// ==========================================

pub struct MoBuilder<'c> {
    conn: &'c Connection,
    name: String,
    product_id: i64,
    planned_qty: f64,
    bom_id: Option<i64>,
    equipment_id: Option<i64>,
    state: MoState,
    demand: Vec<(i64, f64, Option<String>)>,
    outputs: Vec<(i64, f64)>,
}

/// 插入后的 MO 及其需求行ID（按添加顺序）
pub struct SeededMo {
    pub mo_id: i64,
    pub demand_line_ids: Vec<i64>,
}

impl<'c> MoBuilder<'c> {
    pub fn bom(mut self, bom_id: i64) -> Self {
        self.bom_id = Some(bom_id);
        self
    }

    pub fn equipment(mut self, equipment_id: i64) -> Self {
        self.equipment_id = Some(equipment_id);
        self
    }

    pub fn state(mut self, state: MoState) -> Self {
        self.state = state;
        self
    }

    pub fn demand(mut self, product_id: i64, planned_qty: f64, channel: &str) -> Self {
        self.demand
            .push((product_id, planned_qty, Some(channel.to_string())));
        self
    }

    pub fn output(mut self, product_id: i64, planned_qty: f64) -> Self {
        self.outputs.push((product_id, planned_qty));
        self
    }

    pub fn insert(self) -> SeededMo {
        self.conn
            .execute(
                "INSERT INTO manufacturing_order (name, product_id, planned_qty, bom_id, equipment_id, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.name,
                    self.product_id,
                    self.planned_qty,
                    self.bom_id,
                    self.equipment_id,
                    self.state.to_db_str()
                ],
            )
            .unwrap();
        let mo_id = self.conn.last_insert_rowid();

        let mut demand_line_ids = Vec::new();
        for (product_id, planned, channel) in &self.demand {
            self.conn
                .execute(
                    "INSERT INTO demand_line (mo_id, product_id, planned_qty, channel) VALUES (?1, ?2, ?3, ?4)",
                    params![mo_id, product_id, planned, channel],
                )
                .unwrap();
            demand_line_ids.push(self.conn.last_insert_rowid());
        }

        for (product_id, planned) in &self.outputs {
            self.conn
                .execute(
                    "INSERT INTO output_line (mo_id, product_id, planned_qty) VALUES (?1, ?2, ?3)",
                    params![mo_id, product_id, planned],
                )
                .unwrap();
        }

        SeededMo {
            mo_id,
            demand_line_ids,
        }
    }
}

// ==========================================
// 标准场景
// ==========================================

/// 注塑标准场景
///
/// - 设备 INJ-01（BOM 默认设备，MO 未显式指定）
/// - BOM 参考量 1000: 树脂 500 (CH-A) + 颜料 10 (CH-B)
/// - MO/0001 计划 2000: 树脂需求 600 + 400（均为 CH-A），颜料需求 20 (CH-B)
/// - BOM 目标: 树脂 1000，颜料 20
pub struct Scenario {
    pub equipment_id: i64,
    pub finished_id: i64,
    pub resin_id: i64,
    pub pigment_id: i64,
    pub bom_id: i64,
    pub mo_id: i64,
    pub resin_lines: [i64; 2],
    pub pigment_line: i64,
}

pub const MO_NAME: &str = "MO/0001";
pub const EQUIPMENT_CODE: &str = "INJ-01";

pub fn seed_standard_scenario(conn: &Connection) -> Scenario {
    let builder = TestDataBuilder::new(conn);

    let equipment_id = builder.equipment(EQUIPMENT_CODE);
    let finished_id = builder.product("FP-100", 0.25);
    let resin_id = builder.product("RS-200", 1.0);
    let pigment_id = builder.product("PG-RED", 0.5);

    let bom_id = builder
        .bom(1000.0)
        .equipment(equipment_id)
        .line(resin_id, 500.0, "CH-A")
        .line(pigment_id, 10.0, "CH-B")
        .insert();

    let mo = builder
        .mo(MO_NAME, finished_id, 2000.0)
        .bom(bom_id)
        .demand(resin_id, 600.0, "CH-A")
        .demand(resin_id, 400.0, "CH-A")
        .demand(pigment_id, 20.0, "CH-B")
        .output(finished_id, 2000.0)
        .insert();

    Scenario {
        equipment_id,
        finished_id,
        resin_id,
        pigment_id,
        bom_id,
        mo_id: mo.mo_id,
        resin_lines: [mo.demand_line_ids[0], mo.demand_line_ids[1]],
        pigment_line: mo.demand_line_ids[2],
    }
}
