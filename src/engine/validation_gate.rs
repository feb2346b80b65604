// ==========================================
// SCADA 物料消耗对账系统 - 载荷校验门
// ==========================================
// 职责: 在任何写入之前校验设备上报载荷
// 检查顺序: 必填字段 -> 设备 -> 产品 -> MO -> 数量 -> 时间戳
// 红线: 只读，不修改任何状态
// ==========================================

use crate::domain::{Equipment, ManufacturingOrder, MoRef, Product, ProductLookup, ProductRef};
use crate::engine::error::{ConsumptionError, ConsumptionResult};
use crate::repository::order_store::OrderStore;
use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ConsumptionPayload - 设备消耗上报载荷
// ==========================================
// product_id 优先；仅给出 product_tmpl_id 时解析为模板的唯一变体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionPayload {
    pub equipment_code: Option<String>,
    pub product_id: Option<i64>,
    pub product_tmpl_id: Option<i64>,
    pub quantity: Option<f64>,
    pub mo: Option<MoRef>,
    pub timestamp: Option<String>,
}

impl ConsumptionPayload {
    pub fn product_ref(&self) -> Option<ProductRef> {
        self.product_id
            .map(ProductRef::Variant)
            .or_else(|| self.product_tmpl_id.map(ProductRef::Template))
    }

    fn equipment_code(&self) -> Option<&str> {
        self.equipment_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    fn mo_ref(&self) -> Option<&MoRef> {
        self.mo.as_ref().filter(|m| !m.is_blank())
    }
}

// ==========================================
// ValidationIssue - 单项校验失败
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    MissingField { field: String },
    EquipmentNotFound { code: String },
    ProductNotFound { product_id: i64 },
    TemplateNotFound { template_id: i64 },
    TemplateHasNoVariant { template_id: i64 },
    TemplateAmbiguous { template_id: i64, variants: usize },
    MoNotFound { mo: String },
    NonPositiveQuantity { quantity: f64 },
    InvalidTimestamp { raw: String },
    FutureTimestamp { timestamp: String },
    NegativeFinishedQuantity { quantity: f64 },
    NegativeWeight { weight: f64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => write!(f, "缺少必填字段: {}", field),
            ValidationIssue::EquipmentNotFound { code } => {
                write!(f, "设备编码 {} 不存在", code)
            }
            ValidationIssue::ProductNotFound { product_id } => {
                write!(f, "产品 ID {} 不存在", product_id)
            }
            ValidationIssue::TemplateNotFound { template_id } => {
                write!(f, "产品模板 ID {} 不存在", template_id)
            }
            ValidationIssue::TemplateHasNoVariant { template_id } => {
                write!(f, "产品模板 ID {} 没有可用变体", template_id)
            }
            ValidationIssue::TemplateAmbiguous {
                template_id,
                variants,
            } => write!(
                f,
                "产品模板 ID {} 有 {} 个变体，无法确定唯一产品",
                template_id, variants
            ),
            ValidationIssue::MoNotFound { mo } => write!(f, "制造订单 {} 不存在", mo),
            ValidationIssue::NonPositiveQuantity { quantity } => {
                write!(f, "数量必须大于 0 (quantity={})", quantity)
            }
            ValidationIssue::InvalidTimestamp { raw } => write!(f, "时间戳格式错误: {}", raw),
            ValidationIssue::FutureTimestamp { timestamp } => {
                write!(f, "时间戳不能晚于当前时间: {}", timestamp)
            }
            ValidationIssue::NegativeFinishedQuantity { quantity } => {
                write!(f, "完工数量不能为负 (finished_qty={})", quantity)
            }
            ValidationIssue::NegativeWeight { weight } => {
                write!(f, "实际重量不能为负 (weight={})", weight)
            }
        }
    }
}

// ==========================================
// ValidatedConsumption - 校验通过后的解析结果
// ==========================================
#[derive(Debug, Clone)]
pub struct ValidatedConsumption {
    pub equipment: Equipment,
    pub product: Product,
    pub mo: ManufacturingOrder,
    pub quantity: f64,
    pub timestamp: NaiveDateTime,
}

// ==========================================
// ValidationGate
// ==========================================
pub struct ValidationGate {
    future_tolerance: Duration,
}

impl ValidationGate {
    /// # 参数
    /// - `future_tolerance_secs`: 时钟偏差容忍秒数（限制在 0 ~ 1 天）
    pub fn new(future_tolerance_secs: i64) -> Self {
        Self {
            future_tolerance: Duration::seconds(future_tolerance_secs.clamp(0, 86_400)),
        }
    }

    /// 解析可选时间戳：缺省取 now，不得晚于 now + 容忍偏差
    pub fn resolve_timestamp(
        &self,
        raw: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<NaiveDateTime, ValidationIssue> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(now),
            Some(raw) => raw,
        };
        match parse_payload_timestamp(raw) {
            Some(ts) if ts > now + self.future_tolerance => Err(ValidationIssue::FutureTimestamp {
                timestamp: raw.to_string(),
            }),
            Some(ts) => Ok(ts),
            None => Err(ValidationIssue::InvalidTimestamp {
                raw: raw.to_string(),
            }),
        }
    }

    /// 校验并解析载荷
    ///
    /// # 参数
    /// - `store`: 订单存储（只读使用）
    /// - `payload`: 上报载荷
    /// - `now`: 当前 UTC 时间（由调用方注入）
    ///
    /// # 返回
    /// - Ok: 解析后的设备/产品/MO
    /// - Err(Validation): 全部失败项
    pub fn validate<S: OrderStore + ?Sized>(
        &self,
        store: &S,
        payload: &ConsumptionPayload,
        now: NaiveDateTime,
    ) -> ConsumptionResult<ValidatedConsumption> {
        let mut issues = Vec::new();

        // 1. 必填字段
        let equipment_code = payload.equipment_code();
        let product_ref = payload.product_ref();
        let mo_ref = payload.mo_ref();
        if equipment_code.is_none() {
            issues.push(missing("equipment_code"));
        }
        if product_ref.is_none() {
            issues.push(missing("product_id"));
        }
        if payload.quantity.is_none() {
            issues.push(missing("quantity"));
        }
        if mo_ref.is_none() {
            issues.push(missing("mo"));
        }

        // 2. 设备
        let mut equipment = None;
        if let Some(code) = equipment_code {
            equipment = store.lookup_equipment_by_code(code)?;
            if equipment.is_none() {
                issues.push(ValidationIssue::EquipmentNotFound {
                    code: code.to_string(),
                });
            }
        }

        // 3. 产品
        let mut product = None;
        if let Some(product_ref) = product_ref {
            match store.lookup_product(&product_ref)? {
                ProductLookup::Found(p) => product = Some(p),
                lookup => issues.push(lookup_issue(product_ref, lookup)),
            }
        }

        // 4. MO
        let mut mo = None;
        if let Some(mo_ref) = mo_ref {
            mo = store.lookup_mo(mo_ref)?;
            if mo.is_none() {
                issues.push(ValidationIssue::MoNotFound {
                    mo: mo_ref.to_string(),
                });
            }
        }

        // 5. 数量
        if let Some(quantity) = payload.quantity {
            if !(quantity.is_finite() && quantity > 0.0) {
                issues.push(ValidationIssue::NonPositiveQuantity { quantity });
            }
        }

        // 6. 时间戳（可选）
        let timestamp = match self.resolve_timestamp(payload.timestamp.as_deref(), now) {
            Ok(ts) => Some(ts),
            Err(issue) => {
                issues.push(issue);
                None
            }
        };

        match (equipment, product, mo, payload.quantity, timestamp) {
            (Some(equipment), Some(product), Some(mo), Some(quantity), Some(timestamp))
                if issues.is_empty() =>
            {
                Ok(ValidatedConsumption {
                    equipment,
                    product,
                    mo,
                    quantity,
                    timestamp,
                })
            }
            _ => {
                tracing::debug!(issue_count = issues.len(), "载荷校验未通过");
                Err(ConsumptionError::from_issues(issues))
            }
        }
    }

    /// 仅返回 (是否通过, 错误消息)，不产生任何写入
    pub fn check<S: OrderStore + ?Sized>(
        &self,
        store: &S,
        payload: &ConsumptionPayload,
        now: NaiveDateTime,
    ) -> ConsumptionResult<(bool, String)> {
        match self.validate(store, payload, now) {
            Ok(_) => Ok((true, String::new())),
            Err(ConsumptionError::Validation { message, .. }) => Ok((false, message)),
            Err(e) => Err(e),
        }
    }
}

fn missing(field: &str) -> ValidationIssue {
    ValidationIssue::MissingField {
        field: field.to_string(),
    }
}

fn lookup_issue(product_ref: ProductRef, lookup: ProductLookup) -> ValidationIssue {
    match (product_ref, lookup) {
        (_, ProductLookup::TemplateAmbiguous(variants)) => ValidationIssue::TemplateAmbiguous {
            template_id: ref_id(product_ref),
            variants,
        },
        (_, ProductLookup::TemplateHasNoVariant) => ValidationIssue::TemplateHasNoVariant {
            template_id: ref_id(product_ref),
        },
        (ProductRef::Template(template_id), _) => ValidationIssue::TemplateNotFound { template_id },
        (ProductRef::Variant(product_id), _) => ValidationIssue::ProductNotFound { product_id },
    }
}

fn ref_id(product_ref: ProductRef) -> i64 {
    match product_ref {
        ProductRef::Variant(id) | ProductRef::Template(id) => id,
    }
}

/// 解析上报时间戳
///
/// 支持 RFC 3339（Z 或时区偏移，换算为 UTC）与无时区 ISO-8601（按 UTC 解释）
pub fn parse_payload_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqliteStore;
    use crate::test_support::seeded_connection;

    fn now() -> NaiveDateTime {
        parse_payload_timestamp("2026-01-18T12:00:00").unwrap()
    }

    fn valid_payload() -> ConsumptionPayload {
        ConsumptionPayload {
            equipment_code: Some("INJ-01".to_string()),
            product_id: Some(200),
            product_tmpl_id: None,
            quantity: Some(12.5),
            mo: Some(MoRef::Name("MO/0001".to_string())),
            timestamp: Some("2026-01-18T11:59:00Z".to_string()),
        }
    }

    #[test]
    fn test_valid_payload_resolves_entities() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);
        let gate = ValidationGate::new(0);

        let v = gate.validate(&store, &valid_payload(), now()).unwrap();
        assert_eq!(v.equipment.code, "INJ-01");
        assert_eq!(v.product.id, 200);
        assert_eq!(v.mo.id, 1);
        assert_eq!(v.quantity, 12.5);
    }

    #[test]
    fn test_template_resolves_to_sole_variant() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);
        let gate = ValidationGate::new(0);

        let payload = ConsumptionPayload {
            product_id: None,
            product_tmpl_id: Some(20),
            mo: Some(MoRef::parse("1")),
            ..valid_payload()
        };
        let v = gate.validate(&store, &payload, now()).unwrap();
        assert_eq!(v.product.id, 200);
    }

    #[test]
    fn test_issues_collected_in_check_order() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);
        let gate = ValidationGate::new(0);

        let payload = ConsumptionPayload {
            equipment_code: Some("NOPE".to_string()),
            product_id: None,
            product_tmpl_id: Some(40),
            quantity: Some(0.0),
            mo: Some(MoRef::Name("MO/9999".to_string())),
            timestamp: None,
        };
        match gate.validate(&store, &payload, now()).unwrap_err() {
            ConsumptionError::Validation { message, issues } => {
                assert_eq!(issues.len(), 4);
                assert!(matches!(issues[0], ValidationIssue::EquipmentNotFound { .. }));
                assert!(matches!(issues[1], ValidationIssue::TemplateHasNoVariant { .. }));
                assert!(matches!(issues[2], ValidationIssue::MoNotFound { .. }));
                assert!(matches!(issues[3], ValidationIssue::NonPositiveQuantity { .. }));
                assert_eq!(message.matches("; ").count(), 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_reported() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);
        let gate = ValidationGate::new(0);

        let (ok, message) = gate
            .check(&store, &ConsumptionPayload::default(), now())
            .unwrap();
        assert!(!ok);
        assert!(message.contains("equipment_code"));
        assert!(message.contains("quantity"));
    }

    #[test]
    fn test_ambiguous_template_rejected() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);
        let gate = ValidationGate::new(0);

        let payload = ConsumptionPayload {
            product_id: None,
            product_tmpl_id: Some(30),
            ..valid_payload()
        };
        let (ok, message) = gate.check(&store, &payload, now()).unwrap();
        assert!(!ok);
        assert!(message.contains("2 个变体"));
    }

    #[test]
    fn test_future_timestamp_respects_tolerance() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);

        let payload = ConsumptionPayload {
            timestamp: Some("2026-01-18T12:00:30+00:00".to_string()),
            ..valid_payload()
        };
        assert!(!ValidationGate::new(0).check(&store, &payload, now()).unwrap().0);
        assert!(ValidationGate::new(60).check(&store, &payload, now()).unwrap().0);

        // 时区偏移换算为 UTC 后不在未来
        let offset = ConsumptionPayload {
            timestamp: Some("2026-01-18T13:30:00+02:00".to_string()),
            ..valid_payload()
        };
        assert!(ValidationGate::new(0).check(&store, &offset, now()).unwrap().0);
    }

    #[test]
    fn test_unparseable_timestamp_rejected() {
        let conn = seeded_connection();
        let store = SqliteStore::new(&conn);

        let payload = ConsumptionPayload {
            timestamp: Some("yesterday".to_string()),
            ..valid_payload()
        };
        let (ok, message) = ValidationGate::new(0).check(&store, &payload, now()).unwrap();
        assert!(!ok);
        assert!(message.contains("yesterday"));
    }

    #[test]
    fn test_parse_payload_timestamp_formats() {
        let a = parse_payload_timestamp("2026-01-18T08:30:00Z").unwrap();
        let b = parse_payload_timestamp("2026-01-18 08:30:00").unwrap();
        let c = parse_payload_timestamp("2026-01-18T08:30:00.500").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.format("%H:%M:%S").to_string(), "08:30:00");
    }
}
