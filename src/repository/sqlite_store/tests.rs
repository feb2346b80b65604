use super::SqliteStore;
use crate::db::parse_ts;
use crate::domain::types::{AllocationMode, ConsumptionSource, DeviationLevel};
use crate::domain::{
    ConsumptionEvent, MoRef, MoState, OeeLine, OeeSummary, ProductLookup, ProductRef,
};
use crate::repository::consumption_ledger::ConsumptionLedger;
use crate::repository::error::RepositoryError;
use crate::repository::oee_store::OeeSummaryStore;
use crate::repository::order_store::OrderStore;
use crate::repository::weight_store::MoWeightStore;
use crate::test_support::seeded_connection;
use rusqlite::Connection;

fn setup_test_db() -> Connection {
    seeded_connection()
}

fn make_event(event_id: &str, mo_id: i64, product_id: i64, consumed: f64) -> ConsumptionEvent {
    let ts = parse_ts("2026-01-18 08:30:00").unwrap();
    ConsumptionEvent {
        event_id: event_id.to_string(),
        equipment_id: Some(1),
        product_id,
        mo_id,
        consumed_qty: consumed,
        requested_qty: consumed,
        bom_target_qty: 1000.0,
        mode: AllocationMode::Add,
        source: ConsumptionSource::Api,
        timestamp: ts,
        recorded_at: ts,
    }
}

fn make_summary(mo_id: i64, channels: &[&str]) -> OeeSummary {
    OeeSummary {
        mo_id,
        mo_name: String::new(),
        equipment_id: Some(1),
        date_done: parse_ts("2026-01-19 17:00:00").unwrap(),
        qty_planned: 2000.0,
        qty_finished: 1900.0,
        variance_finished: -100.0,
        qty_bom_consumption: 1020.0,
        qty_actual_consumption: 1000.0,
        variance_consumption: -20.0,
        yield_percent: 95.0,
        consumption_ratio: 98.04,
        avg_efficiency_score: 97.0,
        max_abs_deviation_pct: 3.0,
        deviation_alert_count: 1,
        lines: channels
            .iter()
            .map(|ch| OeeLine {
                channel: ch.to_string(),
                to_consume: 100.0,
                consumed: 97.0,
                variance: -3.0,
                consumption_ratio: 97.0,
                deviation_pct: -3.0,
                efficiency_score: 97.0,
                deviation_level: DeviationLevel::Warning,
            })
            .collect(),
    }
}

// ==========================================
// OrderStore
// ==========================================

#[test]
fn test_lookup_mo_by_id_and_name() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    let by_id = store.lookup_mo(&MoRef::Id(1)).unwrap().unwrap();
    let by_name = store.lookup_mo(&MoRef::Name("MO/0001".to_string())).unwrap().unwrap();
    assert_eq!(by_id, by_name);
    assert_eq!(by_id.state, MoState::Confirmed);
    // 未指定设备时取 BOM 默认设备
    assert_eq!(by_id.equipment_id, Some(1));

    assert!(store.lookup_mo(&MoRef::Id(999)).unwrap().is_none());
}

#[test]
fn test_lookup_product_template_resolution() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    match store.lookup_product(&ProductRef::Template(20)).unwrap() {
        ProductLookup::Found(p) => assert_eq!(p.id, 200),
        other => panic!("unexpected lookup: {:?}", other),
    }
    assert_eq!(
        store.lookup_product(&ProductRef::Template(30)).unwrap(),
        ProductLookup::TemplateAmbiguous(2)
    );
    assert_eq!(
        store.lookup_product(&ProductRef::Template(40)).unwrap(),
        ProductLookup::TemplateHasNoVariant
    );
    assert_eq!(
        store.lookup_product(&ProductRef::Template(99)).unwrap(),
        ProductLookup::TemplateNotFound
    );
    assert_eq!(
        store.lookup_product(&ProductRef::Variant(999)).unwrap(),
        ProductLookup::ProductNotFound
    );
}

#[test]
fn test_open_demand_lines_exclude_cancelled() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    let lines = store.get_open_demand_lines(1, 200).unwrap();
    let ids: Vec<i64> = lines.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(store.get_demand_lines(1).unwrap().len(), 4);
}

#[test]
fn test_get_bom_orders_components_by_sequence() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    let mo = store.lookup_mo(&MoRef::Id(1)).unwrap().unwrap();
    let bom = store.get_bom(&mo).unwrap().unwrap();
    assert_eq!(bom.reference_qty, 1000.0);
    assert_eq!(bom.default_equipment_id, Some(1));
    let products: Vec<i64> = bom.components.iter().map(|c| c.product_id).collect();
    assert_eq!(products, vec![200, 300]);

    let mo2 = store.lookup_mo(&MoRef::Id(2)).unwrap().unwrap();
    assert!(store.get_bom(&mo2).unwrap().is_none());
}

#[test]
fn test_list_mos_for_equipment_with_state_filter() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    assert_eq!(store.list_mos_for_equipment(1, None, 50, 0).unwrap().len(), 1);
    assert_eq!(
        store.list_mos_for_equipment(2, Some(MoState::Done), 50, 0).unwrap().len(),
        1
    );
    assert!(store
        .list_mos_for_equipment(2, Some(MoState::Progress), 50, 0)
        .unwrap()
        .is_empty());
    assert!(store.list_mos_for_equipment(2, None, 50, 1).unwrap().is_empty());
}

#[test]
fn test_update_missing_row_returns_not_found() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    let err = store.set_demand_fulfilled(999, 1.0).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
    assert!(matches!(
        store.lock_order(999).unwrap_err(),
        RepositoryError::NotFound { .. }
    ));
}

#[test]
fn test_transition_to_done_closes_open_lines() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    let finished = parse_ts("2026-01-19 17:00:00").unwrap();
    store
        .transition_mo_to_done(1, finished, Some("提前完工"))
        .unwrap();
    let mo = store.lookup_mo(&MoRef::Id(1)).unwrap().unwrap();
    assert_eq!(mo.state, MoState::Done);
    assert_eq!(mo.date_finished, Some(finished));
    assert_eq!(mo.done_note.as_deref(), Some("提前完工"));
    assert!(store.get_open_demand_lines(1, 200).unwrap().is_empty());

    // 已取消的行保持不变
    let cancelled = store
        .get_demand_lines(1)
        .unwrap()
        .into_iter()
        .find(|l| l.id == 3)
        .unwrap();
    assert_eq!(cancelled.state.to_db_str(), "cancelled");
}

// ==========================================
// ConsumptionLedger
// ==========================================

#[test]
fn test_ledger_append_and_list_in_order() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    store.append_event(&make_event("e-2", 1, 200, 5.0)).unwrap();
    store.append_event(&make_event("e-1", 1, 300, 3.0)).unwrap();

    let events = store.list_events_by_mo(1).unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["e-2", "e-1"]);
    assert!(store.has_event_for(1, 300).unwrap());
    assert!(!store.has_event_for(2, 300).unwrap());
    assert_eq!(store.list_events(None).unwrap().len(), 2);
}

#[test]
fn test_ledger_is_append_only() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);
    store.append_event(&make_event("e-1", 1, 200, 5.0)).unwrap();

    let update = conn.execute("UPDATE consumption_event SET consumed_qty = 0", []);
    assert!(update.is_err());
    let delete = conn.execute("DELETE FROM consumption_event", []);
    assert!(delete.is_err());

    // 重复事件ID被唯一约束拒绝
    let dup = store.append_event(&make_event("e-1", 1, 200, 5.0));
    assert!(matches!(
        dup,
        Err(RepositoryError::UniqueConstraintViolation(_))
    ));
}

// ==========================================
// OeeSummaryStore
// ==========================================

#[test]
fn test_replace_summary_keeps_single_row_and_drops_stale_lines() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    store.replace_summary(&make_summary(1, &["CH-B", "CH-A"])).unwrap();
    store.replace_summary(&make_summary(1, &["CH-C"])).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM oee_summary WHERE mo_id = 1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);

    let summary = store.find_summary(1).unwrap().unwrap();
    assert_eq!(summary.mo_name, "MO/0001");
    let channels: Vec<&str> = summary.lines.iter().map(|l| l.channel.as_str()).collect();
    assert_eq!(channels, vec!["CH-C"]);
    assert_eq!(summary.lines[0].deviation_level, DeviationLevel::Warning);
}

#[test]
fn test_replace_summary_rolls_back_on_duplicate_channel() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    store.replace_summary(&make_summary(1, &["CH-A"])).unwrap();
    let result = store.replace_summary(&make_summary(1, &["CH-X", "CH-X"]));
    assert!(result.is_err());

    // 保存点回滚后旧汇总完整保留
    let summary = store.find_summary(1).unwrap().unwrap();
    let channels: Vec<&str> = summary.lines.iter().map(|l| l.channel.as_str()).collect();
    assert_eq!(channels, vec!["CH-A"]);
}

#[test]
fn test_find_summary_missing_returns_none() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);
    assert!(store.find_summary(1).unwrap().is_none());
}

// ==========================================
// MoWeightStore
// ==========================================

#[test]
fn test_weights_listed_newest_first() {
    let conn = setup_test_db();
    let store = SqliteStore::new(&conn);

    let t1 = parse_ts("2026-01-18 08:00:00").unwrap();
    let t2 = parse_ts("2026-01-18 09:00:00").unwrap();
    let first = store.insert_weight(1, 500.0, 498.5, t1, None).unwrap();
    let second = store.insert_weight(1, 500.0, 501.0, t2, Some("shift 2")).unwrap();
    assert!(second > first);

    let records = store.list_weights(Some(1), 10, 0).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, second);
    assert_eq!(records[0].notes.as_deref(), Some("shift 2"));
    assert!(store.list_weights(Some(2), 10, 0).unwrap().is_empty());
}
