// ==========================================
// SCADA 物料消耗对账系统 - 设备领域模型
// ==========================================
// 设备只被引用，不被任何实体拥有
// ==========================================

use crate::domain::types::{ConnectionStatus, EquipmentType, SyncStatus};
use serde::{Deserialize, Serialize};

// ==========================================
// Equipment - SCADA 设备 / PLC
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: i64,
    pub code: String, // 设备编码（唯一，亦作为消耗通道标识）
    pub name: String,
    pub equipment_type: EquipmentType,
    pub connection_status: ConnectionStatus,
    pub sync_status: SyncStatus,
    pub is_active: bool,
}
