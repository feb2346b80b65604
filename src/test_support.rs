// ==========================================
// 单元测试共享数据
// ==========================================
// 设备: INJ-01(1) / PRS-01(2)
// 产品: 成品 100；树脂 200（模板 20 唯一变体）；颜料 300/301（模板 30 两个变体）
// BOM 1: 参考量 1000 -> 树脂 500 (CH-A) + 颜料 10 (CH-B)，默认设备 INJ-01
// 单位重量: 树脂 1.0kg，红颜料 0.5kg
// MO/0001: 计划 2000，confirmed；MO/0002: 计划 500，done，设备 PRS-01
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema};
use rusqlite::Connection;

pub fn seeded_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    configure_sqlite_connection(&conn).unwrap();
    init_schema(&conn).unwrap();

    conn.execute_batch(
        r#"
        INSERT INTO equipment (id, code, name, equipment_type) VALUES (1, 'INJ-01', 'Injector 1', 'injector');
        INSERT INTO equipment (id, code, name) VALUES (2, 'PRS-01', 'Press 1');

        INSERT INTO product_template (id, name) VALUES (10, 'Finished Part');
        INSERT INTO product_template (id, name) VALUES (20, 'Resin');
        INSERT INTO product_template (id, name) VALUES (30, 'Pigment');
        INSERT INTO product_template (id, name) VALUES (40, 'Empty Template');

        INSERT INTO product (id, template_id, default_code, name, weight_kg) VALUES (100, 10, 'FP-100', 'Finished Part', 0.25);
        INSERT INTO product (id, template_id, default_code, name, weight_kg) VALUES (200, 20, 'RS-200', 'Resin', 1.0);
        INSERT INTO product (id, template_id, default_code, name, weight_kg) VALUES (300, 30, 'PG-RED', 'Pigment Red', 0.5);
        INSERT INTO product (id, template_id, default_code, name) VALUES (301, 30, 'PG-BLU', 'Pigment Blue');

        INSERT INTO bom (id, product_template_id, reference_qty, equipment_id) VALUES (1, 10, 1000, 1);
        INSERT INTO bom_line (id, bom_id, product_id, qty_per_bom_unit, channel, sequence) VALUES (2, 1, 300, 10, 'CH-B', 2);
        INSERT INTO bom_line (id, bom_id, product_id, qty_per_bom_unit, channel, sequence) VALUES (1, 1, 200, 500, 'CH-A', 1);

        INSERT INTO manufacturing_order (id, name, product_id, planned_qty, bom_id, state)
        VALUES (1, 'MO/0001', 100, 2000, 1, 'confirmed');
        INSERT INTO manufacturing_order (id, name, product_id, planned_qty, equipment_id, state)
        VALUES (2, 'MO/0002', 100, 500, 2, 'done');

        INSERT INTO demand_line (id, mo_id, product_id, planned_qty, fulfilled_qty, channel) VALUES (1, 1, 200, 600, 0, 'CH-A');
        INSERT INTO demand_line (id, mo_id, product_id, planned_qty, fulfilled_qty, channel) VALUES (2, 1, 200, 400, 0, 'CH-A2');
        INSERT INTO demand_line (id, mo_id, product_id, planned_qty, fulfilled_qty, channel, state) VALUES (3, 1, 200, 50, 0, 'CH-A3', 'cancelled');
        INSERT INTO demand_line (id, mo_id, product_id, planned_qty, fulfilled_qty, channel) VALUES (4, 1, 300, 20, 0, 'CH-B');

        INSERT INTO output_line (id, mo_id, product_id, planned_qty) VALUES (1, 1, 100, 2000);
        "#,
    )
    .unwrap();

    conn
}

