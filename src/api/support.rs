// ==========================================
// SCADA 物料消耗对账系统 - API 层数据访问辅助
// ==========================================
// 职责: 统一连接加锁、IMMEDIATE 事务与配置加载
// 红线: 所有写操作必须在 IMMEDIATE 事务内完成
// ==========================================

use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::with_immediate_transaction;
use crate::engine::ConsumptionOrchestrator;
use crate::repository::SqliteStore;

/// 获取共享连接（锁中毒视为连接错误）
pub(crate) fn lock_connection(conn: &Mutex<Connection>) -> ApiResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
}

/// 在 IMMEDIATE 事务中执行写操作
///
/// # 说明
/// 闭包返回 Err 时整个事务回滚，不会留下部分写入
pub(crate) fn with_store_transaction<T, F>(conn: &Mutex<Connection>, f: F) -> ApiResult<T>
where
    F: FnOnce(&SqliteStore<'_>) -> ApiResult<T>,
{
    let mut guard = lock_connection(conn)?;
    with_immediate_transaction(&mut guard, |tx| {
        let store = SqliteStore::new(tx);
        f(&store)
    })
}

/// 只读访问（不开启显式事务）
pub(crate) fn with_store<T, F>(conn: &Mutex<Connection>, f: F) -> ApiResult<T>
where
    F: FnOnce(&SqliteStore<'_>) -> ApiResult<T>,
{
    let guard = lock_connection(conn)?;
    let store = SqliteStore::new(&guard);
    f(&store)
}

/// 按当前配置构建编排器（每次调用重新读取，配置修改即时生效）
pub(crate) fn load_orchestrator(config_manager: &ConfigManager) -> ApiResult<ConsumptionOrchestrator> {
    let config = config_manager
        .load_consumption_config()
        .map_err(|e| ApiError::ConfigurationError(format!("加载消耗配置失败: {}", e)))?;
    Ok(ConsumptionOrchestrator::new(config))
}
