// ==========================================
// 消耗上报 API 集成测试
// ==========================================
// 职责: 验证 add/replace 分配、校验失败无写入、状态推进、台账查询与导出
// ==========================================

mod helpers;

use helpers::test_data_builder::{seed_standard_scenario, EQUIPMENT_CODE, MO_NAME};
use scada_consumption::config::config_keys;
use scada_consumption::domain::{AllocationMode, MoRef, MoState};
use scada_consumption::engine::{ApplyConsumptionRequest, ConsumptionPayload};
use test_helpers::{assert_close, count_rows, create_app, create_test_db, fulfilled_of, open_conn};

fn request(product_id: i64, qty: f64, mode: Option<AllocationMode>) -> ApplyConsumptionRequest {
    ApplyConsumptionRequest {
        payload: ConsumptionPayload {
            equipment_code: Some(EQUIPMENT_CODE.to_string()),
            product_id: Some(product_id),
            product_tmpl_id: None,
            quantity: Some(qty),
            mo: Some(MoRef::Name(MO_NAME.to_string())),
            timestamp: None,
        },
        mode,
        allow_overconsume: None,
    }
}

#[test]
fn test_add_mode_splits_by_planned_share_and_promotes_mo() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    let outcome = app
        .consumption_api
        .apply_consumption(&request(s.resin_id, 300.0, None))
        .unwrap();

    assert_eq!(outcome.mode, AllocationMode::Add);
    assert_close(outcome.applied_qty, 300.0);
    assert_eq!(outcome.affected_line_ids, s.resin_lines.to_vec());
    assert_eq!(outcome.equipment_id, s.equipment_id);
    assert_eq!(outcome.mo_state, MoState::Progress);

    assert_close(fulfilled_of(&conn, s.resin_lines[0]), 180.0);
    assert_close(fulfilled_of(&conn, s.resin_lines[1]), 120.0);
    assert_close(fulfilled_of(&conn, s.pigment_line), 0.0);

    let events = app
        .consumption_api
        .list_consumption_events(&MoRef::Id(s.mo_id))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_close(events[0].consumed_qty, 300.0);
    assert_close(events[0].bom_target_qty, 1000.0);
    assert_eq!(events[0].event_id, outcome.event_id);
}

#[test]
fn test_add_mode_caps_at_remaining_capacity() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    app.consumption_api
        .apply_consumption(&request(s.resin_id, 300.0, None))
        .unwrap();
    let outcome = app
        .consumption_api
        .apply_consumption(&request(s.resin_id, 1200.0, None))
        .unwrap();

    // 部分分配不是错误
    assert_close(outcome.applied_qty, 700.0);
    assert_close(fulfilled_of(&conn, s.resin_lines[0]), 600.0);
    assert_close(fulfilled_of(&conn, s.resin_lines[1]), 400.0);

    let events = app
        .consumption_api
        .list_consumption_events(&MoRef::Id(s.mo_id))
        .unwrap();
    assert_close(events[1].requested_qty, 1200.0);
    assert_close(events[1].consumed_qty, 700.0);
}

#[test]
fn test_overconsume_exceeds_planned() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    let mut req = request(s.resin_id, 1200.0, None);
    req.allow_overconsume = Some(true);
    let outcome = app.consumption_api.apply_consumption(&req).unwrap();

    assert_close(outcome.applied_qty, 1200.0);
    assert_close(
        fulfilled_of(&conn, s.resin_lines[0]) + fulfilled_of(&conn, s.resin_lines[1]),
        1200.0,
    );
}

#[test]
fn test_replace_mode_is_idempotent() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    app.consumption_api
        .apply_consumption(&request(s.resin_id, 300.0, None))
        .unwrap();

    for _ in 0..2 {
        let outcome = app
            .consumption_api
            .apply_consumption(&request(s.resin_id, 500.0, Some(AllocationMode::Replace)))
            .unwrap();
        assert_close(outcome.applied_qty, 500.0);
        assert_close(fulfilled_of(&conn, s.resin_lines[0]), 300.0);
        assert_close(fulfilled_of(&conn, s.resin_lines[1]), 200.0);
    }

    // 每次成功调用都追加一条事件
    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM consumption_event"), 3);
}

#[test]
fn test_default_mode_follows_config() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    app.config_manager
        .set_global_config_value(config_keys::DEFAULT_MODE, "replace")
        .unwrap();

    app.consumption_api
        .apply_consumption(&request(s.resin_id, 100.0, None))
        .unwrap();
    let outcome = app
        .consumption_api
        .apply_consumption(&request(s.resin_id, 100.0, None))
        .unwrap();

    assert_eq!(outcome.mode, AllocationMode::Replace);
    assert_close(
        fulfilled_of(&conn, s.resin_lines[0]) + fulfilled_of(&conn, s.resin_lines[1]),
        100.0,
    );
}

#[test]
fn test_validation_failure_writes_nothing() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    let mut req = request(s.resin_id, -5.0, None);
    req.payload.equipment_code = Some("UNKNOWN".to_string());
    let err = app.consumption_api.apply_consumption(&req).unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
    let response = err.to_response();
    let issues = response.details.unwrap()["issues"].as_array().unwrap().len();
    assert_eq!(issues, 2);

    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM consumption_event"), 0);
    assert_close(fulfilled_of(&conn, s.resin_lines[0]), 0.0);
    let state: String = conn
        .query_row(
            "SELECT state FROM manufacturing_order WHERE id = ?1",
            [s.mo_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(state, "confirmed");
}

#[test]
fn test_product_without_demand_line_is_allocation_error() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    let err = app
        .consumption_api
        .apply_consumption(&request(s.finished_id, 10.0, None))
        .unwrap_err();
    assert_eq!(err.code(), "ALLOCATION_ERROR");
    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM consumption_event"), 0);
}

#[test]
fn test_template_reference_resolves_sole_variant() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);
    let builder = helpers::test_data_builder::TestDataBuilder::new(&conn);

    let mut req = request(s.pigment_id, 8.0, None);
    req.payload.product_id = None;
    req.payload.product_tmpl_id = Some(builder.template_of(s.pigment_id));
    let outcome = app.consumption_api.apply_consumption(&req).unwrap();
    assert_eq!(outcome.product_id, s.pigment_id);
    assert_close(fulfilled_of(&conn, s.pigment_line), 8.0);

    // 第二个变体出现后模板引用不再唯一
    builder.variant(builder.template_of(s.pigment_id), "PG-BLU", 0.5);
    let err = app.consumption_api.apply_consumption(&req).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn test_validate_payload_does_not_write() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    let ok = app
        .consumption_api
        .validate_payload(&request(s.resin_id, 10.0, None).payload)
        .unwrap();
    assert!(ok.ok);

    let mut payload = request(s.resin_id, 10.0, None).payload;
    payload.mo = Some(MoRef::Name("MO/9999".to_string()));
    payload.timestamp = Some("2999-01-01 00:00:00".to_string());
    let bad = app.consumption_api.validate_payload(&payload).unwrap();
    assert!(!bad.ok);
    assert!(bad.message.contains("MO/9999"));

    assert_eq!(count_rows(&conn, "SELECT COUNT(*) FROM consumption_event"), 0);
    assert_close(fulfilled_of(&conn, s.resin_lines[0]), 0.0);
}

#[test]
fn test_export_ledger_csv() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_conn(&db_path);
    let s = seed_standard_scenario(&conn);
    let app = create_app(&db_path);

    let empty = app.consumption_api.export_ledger_csv(None).unwrap();
    assert_eq!(empty.lines().count(), 1);

    app.consumption_api
        .apply_consumption(&request(s.resin_id, 300.0, None))
        .unwrap();
    app.consumption_api
        .apply_consumption(&request(s.pigment_id, 5.0, None))
        .unwrap();

    let csv = app
        .consumption_api
        .export_ledger_csv(Some(&MoRef::Name(MO_NAME.to_string())))
        .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("event_id,"));
    assert!(lines[1].contains(",add,api,300.0,300.0,1000.0,"));
    assert!(lines[2].contains(",add,api,5.0,5.0,20.0,"));

    let err = app
        .consumption_api
        .export_ledger_csv(Some(&MoRef::Name("MO/9999".to_string())))
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}
