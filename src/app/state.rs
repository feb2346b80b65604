// ==========================================
// SCADA 物料消耗对账系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ConsumptionApi, OrderApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::perf::install_sqlite_tracing;

/// 数据库路径环境变量
pub const ENV_DB_PATH: &str = "SCADA_CONSUMPTION_DB_PATH";

/// 默认数据库文件名
const DB_FILE_NAME: &str = "scada_consumption.db";

/// 应用状态
///
/// 所有API共享同一个数据库连接；写操作由 API 层在 IMMEDIATE 事务中串行化
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 消耗上报API
    pub consumption_api: Arc<ConsumptionApi>,

    /// 制造订单API
    pub order_api: Arc<OrderApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并统一 PRAGMA
    /// 2. 建表（幂等）
    /// 3. 安装 SQL 性能埋点
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        install_sqlite_tracing(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let consumption_api = Arc::new(ConsumptionApi::new(conn.clone(), config_manager.clone()));
        let order_api = Arc::new(OrderApi::new(conn, config_manager.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            consumption_api,
            order_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级：
/// 1. 环境变量 SCADA_CONSUMPTION_DB_PATH
/// 2. 用户数据目录（Debug 与 Release 使用不同子目录）
/// 3. 当前目录 ./scada_consumption.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let Some(data_dir) = dirs::data_dir() else {
        return format!("./{}", DB_FILE_NAME);
    };

    let dir = if cfg!(debug_assertions) {
        data_dir.join("scada-consumption-dev")
    } else {
        data_dir.join("scada-consumption")
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!("无法创建数据目录 {}: {}，改用当前目录", dir.display(), e);
        return format!("./{}", DB_FILE_NAME);
    }

    dir.join(DB_FILE_NAME).to_string_lossy().into_owned()
}
