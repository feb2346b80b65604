// ==========================================
// SCADA 物料消耗对账系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表脚本与时间戳格式
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库时间戳格式（UTC）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 在 IMMEDIATE 事务中执行闭包
///
/// 说明：
/// - BEGIN IMMEDIATE 立即获取写锁，读取-修改-写入期间排除其他写者
/// - 闭包返回 Err 时事务随 Transaction drop 自动回滚
pub fn with_immediate_transaction<T, E, F>(conn: &mut Connection, f: F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// 解析数据库时间戳（兼容带小数秒/ISO 'T' 分隔）
pub fn parse_ts(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.trim().replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// 初始化数据库 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    let version = read_schema_version(conn)?;
    if version != Some(CURRENT_SCHEMA_VERSION) {
        tracing::warn!(
            expected = CURRENT_SCHEMA_VERSION,
            actual = ?version,
            "schema_version 与代码期望不一致"
        );
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS equipment (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    equipment_type TEXT NOT NULL DEFAULT 'other',
    connection_status TEXT NOT NULL DEFAULT 'disconnected',
    sync_status TEXT NOT NULL DEFAULT 'pending',
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS product_template (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS product (
    id INTEGER PRIMARY KEY,
    template_id INTEGER NOT NULL REFERENCES product_template(id),
    default_code TEXT,
    name TEXT NOT NULL,
    weight_kg REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS bom (
    id INTEGER PRIMARY KEY,
    product_template_id INTEGER REFERENCES product_template(id),
    reference_qty REAL NOT NULL DEFAULT 1,
    equipment_id INTEGER REFERENCES equipment(id)
);

CREATE TABLE IF NOT EXISTS bom_line (
    id INTEGER PRIMARY KEY,
    bom_id INTEGER NOT NULL REFERENCES bom(id) ON DELETE CASCADE,
    product_id INTEGER NOT NULL REFERENCES product(id),
    qty_per_bom_unit REAL NOT NULL,
    channel TEXT,
    sequence INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS manufacturing_order (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    product_id INTEGER NOT NULL REFERENCES product(id),
    planned_qty REAL NOT NULL,
    bom_id INTEGER REFERENCES bom(id),
    equipment_id INTEGER REFERENCES equipment(id),
    state TEXT NOT NULL DEFAULT 'draft',
    lock_seq INTEGER NOT NULL DEFAULT 0,
    date_finished TEXT,
    done_note TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS demand_line (
    id INTEGER PRIMARY KEY,
    mo_id INTEGER NOT NULL REFERENCES manufacturing_order(id) ON DELETE CASCADE,
    product_id INTEGER NOT NULL REFERENCES product(id),
    planned_qty REAL NOT NULL,
    fulfilled_qty REAL NOT NULL DEFAULT 0,
    channel TEXT,
    state TEXT NOT NULL DEFAULT 'open'
);

CREATE INDEX IF NOT EXISTS idx_demand_line_mo_product ON demand_line(mo_id, product_id);

CREATE TABLE IF NOT EXISTS output_line (
    id INTEGER PRIMARY KEY,
    mo_id INTEGER NOT NULL REFERENCES manufacturing_order(id) ON DELETE CASCADE,
    product_id INTEGER NOT NULL REFERENCES product(id),
    planned_qty REAL NOT NULL DEFAULT 0,
    fulfilled_qty REAL NOT NULL DEFAULT 0,
    cancelled INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS consumption_event (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL UNIQUE,
    equipment_id INTEGER REFERENCES equipment(id),
    product_id INTEGER NOT NULL REFERENCES product(id),
    mo_id INTEGER NOT NULL REFERENCES manufacturing_order(id),
    consumed_qty REAL NOT NULL,
    requested_qty REAL NOT NULL,
    bom_target_qty REAL NOT NULL DEFAULT 0,
    mode TEXT NOT NULL,
    source TEXT NOT NULL,
    event_ts TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_consumption_event_mo_product ON consumption_event(mo_id, product_id);

CREATE TRIGGER IF NOT EXISTS trg_consumption_event_no_update
BEFORE UPDATE ON consumption_event
BEGIN
    SELECT RAISE(ABORT, 'consumption_event is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_consumption_event_no_delete
BEFORE DELETE ON consumption_event
BEGIN
    SELECT RAISE(ABORT, 'consumption_event is append-only');
END;

CREATE TABLE IF NOT EXISTS oee_summary (
    mo_id INTEGER PRIMARY KEY REFERENCES manufacturing_order(id),
    equipment_id INTEGER REFERENCES equipment(id),
    date_done TEXT NOT NULL,
    qty_planned REAL NOT NULL,
    qty_finished REAL NOT NULL,
    variance_finished REAL NOT NULL,
    qty_bom_consumption REAL NOT NULL,
    qty_actual_consumption REAL NOT NULL,
    variance_consumption REAL NOT NULL,
    yield_percent REAL NOT NULL,
    consumption_ratio REAL NOT NULL,
    avg_efficiency_score REAL NOT NULL,
    max_abs_deviation_pct REAL NOT NULL,
    deviation_alert_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS oee_line (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mo_id INTEGER NOT NULL REFERENCES oee_summary(mo_id) ON DELETE CASCADE,
    channel TEXT NOT NULL,
    to_consume REAL NOT NULL,
    consumed REAL NOT NULL,
    variance REAL NOT NULL,
    consumption_ratio REAL NOT NULL,
    deviation_pct REAL NOT NULL,
    efficiency_score REAL NOT NULL,
    deviation_level TEXT NOT NULL,
    UNIQUE(mo_id, channel)
);

CREATE TABLE IF NOT EXISTS mo_weight (
    id INTEGER PRIMARY KEY,
    mo_id INTEGER NOT NULL REFERENCES manufacturing_order(id),
    target_weight REAL NOT NULL,
    actual_weight REAL NOT NULL,
    weight_ts TEXT NOT NULL,
    notes TEXT
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_parse_ts_accepts_iso_and_fraction() {
        let a = parse_ts("2026-01-18 08:30:00").unwrap();
        let b = parse_ts("2026-01-18T08:30:00").unwrap();
        let c = parse_ts("2026-01-18 08:30:00.250").unwrap();
        assert_eq!(a, b);
        assert_eq!(format_ts(&c), "2026-01-18 08:30:00");
        assert!(parse_ts("not-a-date").is_none());
    }
}
