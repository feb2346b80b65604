// ==========================================
// SCADA 物料消耗对账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id='global')
// 约定: 非法配置值记录告警并回退默认值，不中断业务
// ==========================================

use crate::config::consumption_config::ConsumptionConfig;
use crate::db::open_sqlite_connection;
use crate::domain::types::{AllocationMode, ReplaceScope};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（已存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式，按键排序）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 消耗对账配置 =====

    /// 加载消耗对账配置
    ///
    /// # 说明
    /// - 缺失键使用默认值
    /// - 无法解析的值记录告警后使用默认值
    /// - warning 阈值小于 normal 阈值时两者都回退默认值
    pub fn load_consumption_config(&self) -> Result<ConsumptionConfig, Box<dyn Error>> {
        let defaults = ConsumptionConfig::default();

        let default_mode = self.parse_or_default(
            config_keys::DEFAULT_MODE,
            defaults.default_mode,
            AllocationMode::parse,
        )?;
        let replace_scope = self.parse_or_default(
            config_keys::REPLACE_SCOPE,
            defaults.replace_scope,
            ReplaceScope::parse,
        )?;
        let allow_overconsume = self.parse_or_default(
            config_keys::ALLOW_OVERCONSUME,
            defaults.allow_overconsume,
            parse_bool,
        )?;
        let promote_confirmed_to_progress = self.parse_or_default(
            config_keys::PROMOTE_CONFIRMED_TO_PROGRESS,
            defaults.promote_confirmed_to_progress,
            parse_bool,
        )?;
        let mark_done_auto_consume = self.parse_or_default(
            config_keys::MARK_DONE_AUTO_CONSUME,
            defaults.mark_done_auto_consume,
            parse_bool,
        )?;
        let future_tolerance_secs = self.parse_or_default(
            config_keys::FUTURE_TOLERANCE_SECS,
            defaults.future_tolerance_secs,
            parse_num::<i64>,
        )?;
        let mo_list_default_limit = self.parse_or_default(
            config_keys::MO_LIST_DEFAULT_LIMIT,
            defaults.mo_list_default_limit,
            parse_num::<u32>,
        )?;
        let mo_list_max_limit = self.parse_or_default(
            config_keys::MO_LIST_MAX_LIMIT,
            defaults.mo_list_max_limit,
            parse_num::<u32>,
        )?;

        let mut thresholds = defaults.deviation_thresholds;
        thresholds.normal_pct = self.parse_or_default(
            config_keys::OEE_NORMAL_THRESHOLD_PCT,
            thresholds.normal_pct,
            parse_non_negative,
        )?;
        thresholds.warning_pct = self.parse_or_default(
            config_keys::OEE_WARNING_THRESHOLD_PCT,
            thresholds.warning_pct,
            parse_non_negative,
        )?;
        if thresholds.warning_pct < thresholds.normal_pct {
            warn!(
                normal = thresholds.normal_pct,
                warning = thresholds.warning_pct,
                "OEE 偏差阈值顺序错误，回退默认值"
            );
            thresholds = defaults.deviation_thresholds;
        }

        Ok(ConsumptionConfig {
            default_mode,
            allow_overconsume,
            replace_scope,
            future_tolerance_secs,
            promote_confirmed_to_progress,
            deviation_thresholds: thresholds,
            mark_done_auto_consume,
            mo_list_default_limit,
            mo_list_max_limit,
        })
    }

    fn parse_or_default<T, F>(&self, key: &str, default: T, parse: F) -> Result<T, Box<dyn Error>>
    where
        T: std::fmt::Debug,
        F: Fn(&str) -> Option<T>,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match parse(raw.trim()) {
            Some(v) => Ok(v),
            None => {
                warn!(key, value = %raw, default = ?default, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_num<T: FromStr>(raw: &str) -> Option<T> {
    raw.parse::<T>().ok()
}

fn parse_non_negative(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 消耗分配
    pub const DEFAULT_MODE: &str = "consumption/default_mode";
    pub const ALLOW_OVERCONSUME: &str = "consumption/allow_overconsume";
    pub const REPLACE_SCOPE: &str = "consumption/replace_scope";
    pub const FUTURE_TOLERANCE_SECS: &str = "consumption/future_tolerance_secs";
    pub const PROMOTE_CONFIRMED_TO_PROGRESS: &str = "consumption/promote_confirmed_to_progress";

    // OEE 偏差等级
    pub const OEE_NORMAL_THRESHOLD_PCT: &str = "oee/normal_threshold_pct";
    pub const OEE_WARNING_THRESHOLD_PCT: &str = "oee/warning_threshold_pct";

    // 完工
    pub const MARK_DONE_AUTO_CONSUME: &str = "mark_done/auto_consume";

    // MO 列表分页
    pub const MO_LIST_DEFAULT_LIMIT: &str = "mo_list/default_limit";
    pub const MO_LIST_MAX_LIMIT: &str = "mo_list/max_limit";
}
