// ==========================================
// SCADA 物料消耗对账系统 - 产品领域模型
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Product - 产品变体
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub template_id: i64,
    pub default_code: Option<String>,
    pub name: String,
    pub weight_kg: f64, // 单位重量，用于 MO 目标重量计算
}

impl Product {
    /// 展示用编码: 优先 default_code，否则名称
    pub fn display_code(&self) -> &str {
        self.default_code.as_deref().unwrap_or(&self.name)
    }
}

// ==========================================
// ProductRef - 上报载荷中的产品引用
// ==========================================
// 直接给出变体ID，或给出模板ID（需解析为唯一变体）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRef {
    Variant(i64),
    Template(i64),
}

// ==========================================
// ProductLookup - 产品引用解析结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum ProductLookup {
    Found(Product),
    ProductNotFound,
    TemplateNotFound,
    TemplateHasNoVariant,
    TemplateAmbiguous(usize), // 模板下存在多个变体
}
