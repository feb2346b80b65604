// ==========================================
// SCADA 物料消耗对账系统 - 领域类型定义
// ==========================================
// 职责: 状态机、枚举类型、数据库字符串映射
// 约定: 数据库存储值统一为小写 snake_case
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 制造订单状态 (MO State)
// ==========================================
// 终态: done / cancel，不可再转出
// draft -> confirmed -> progress 可经 API 多次往返
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoState {
    Draft,     // 草稿
    Confirmed, // 已确认
    Progress,  // 生产中
    Done,      // 已完工
    Cancel,    // 已取消
}

impl MoState {
    /// 是否终态
    pub fn is_terminal(self) -> bool {
        matches!(self, MoState::Done | MoState::Cancel)
    }

    /// 是否允许分配消耗（唯一的分配守卫谓词）
    pub fn can_allocate(self) -> bool {
        !self.is_terminal()
    }

    /// 状态转换是否合法
    ///
    /// # 规则
    /// - 终态不可转出
    /// - 非终态之间: draft -> confirmed, confirmed <-> progress, 同状态幂等
    /// - 任意非终态 -> done / cancel
    pub fn can_transition_to(self, to: MoState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (_, MoState::Done) | (_, MoState::Cancel) => true,
            (from, to) if from == to => true,
            (MoState::Draft, MoState::Confirmed) => true,
            (MoState::Confirmed, MoState::Progress) => true,
            (MoState::Progress, MoState::Confirmed) => true,
            _ => false,
        }
    }

    pub fn to_db_str(self) -> &'static str {
        match self {
            MoState::Draft => "draft",
            MoState::Confirmed => "confirmed",
            MoState::Progress => "progress",
            MoState::Done => "done",
            MoState::Cancel => "cancel",
        }
    }

    /// 从字符串解析状态（未知值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(MoState::Draft),
            "confirmed" => Some(MoState::Confirmed),
            "progress" => Some(MoState::Progress),
            "done" => Some(MoState::Done),
            "cancel" => Some(MoState::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for MoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 需求行状态 (Demand Line State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLineState {
    Open,      // 待消耗
    Done,      // 已完成
    Cancelled, // 已取消
}

impl DemandLineState {
    pub fn to_db_str(self) -> &'static str {
        match self {
            DemandLineState::Open => "open",
            DemandLineState::Done => "done",
            DemandLineState::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "done" => DemandLineState::Done,
            "cancelled" => DemandLineState::Cancelled,
            _ => DemandLineState::Open,
        }
    }
}

impl fmt::Display for DemandLineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 分配模式 (Allocation Mode)
// ==========================================
// Add: 增量累加
// Replace: 清零后按计划量重分配（幂等，可安全重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    #[default]
    Add,
    Replace,
}

impl AllocationMode {
    pub fn to_db_str(self) -> &'static str {
        match self {
            AllocationMode::Add => "add",
            AllocationMode::Replace => "replace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "add" => Some(AllocationMode::Add),
            "replace" => Some(AllocationMode::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// Replace 清零范围 (Replace Scope)
// ==========================================
// Product: 清零该产品在 MO 上的全部开放需求行（现网行为）
// Channel: 仅清零上报设备通道对应的需求行，无匹配时回退到 Product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceScope {
    #[default]
    Product,
    Channel,
}

impl ReplaceScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "product" => Some(ReplaceScope::Product),
            "channel" => Some(ReplaceScope::Channel),
            _ => None,
        }
    }
}

// ==========================================
// 消耗来源 (Consumption Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionSource {
    Api,     // 设备上报
    AutoBom, // 完工时按 BOM 自动补齐
}

impl ConsumptionSource {
    pub fn to_db_str(self) -> &'static str {
        match self {
            ConsumptionSource::Api => "api",
            ConsumptionSource::AutoBom => "auto_bom",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "auto_bom" => ConsumptionSource::AutoBom,
            _ => ConsumptionSource::Api,
        }
    }
}

impl fmt::Display for ConsumptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 偏差等级 (Deviation Level)
// ==========================================
// 顺序: Normal < Warning < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationLevel {
    Normal,
    Warning,
    Critical,
}

impl DeviationLevel {
    pub fn to_db_str(self) -> &'static str {
        match self {
            DeviationLevel::Normal => "normal",
            DeviationLevel::Warning => "warning",
            DeviationLevel::Critical => "critical",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "warning" => DeviationLevel::Warning,
            "critical" => DeviationLevel::Critical,
            _ => DeviationLevel::Normal,
        }
    }
}

impl fmt::Display for DeviationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 设备类型 / 连接状态 / 同步状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Plc,
    Sensor,
    Controller,
    Injector,
    Press,
    Other,
}

impl EquipmentType {
    pub fn to_db_str(self) -> &'static str {
        match self {
            EquipmentType::Plc => "plc",
            EquipmentType::Sensor => "sensor",
            EquipmentType::Controller => "controller",
            EquipmentType::Injector => "injector",
            EquipmentType::Press => "press",
            EquipmentType::Other => "other",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "plc" => EquipmentType::Plc,
            "sensor" => EquipmentType::Sensor,
            "controller" => EquipmentType::Controller,
            "injector" => EquipmentType::Injector,
            "press" => EquipmentType::Press,
            _ => EquipmentType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn to_db_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "connected" => ConnectionStatus::Connected,
            "error" => ConnectionStatus::Error,
            _ => ConnectionStatus::Disconnected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Error,
    Failed,
}

impl SyncStatus {
    pub fn to_db_str(self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "synced" => SyncStatus::Synced,
            "error" => SyncStatus::Error,
            "failed" => SyncStatus::Failed,
            _ => SyncStatus::Pending,
        }
    }
}
