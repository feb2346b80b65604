// ==========================================
// SCADA 物料消耗对账系统 - 性能埋点
// ==========================================
// 职责: API 调用耗时、SQL 语句计数、慢 SQL 告警
// 开关: 环境变量，进程内只读取一次（安装时）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 强制开启/关闭 SQL 统计
pub const ENV_PERF_SQL: &str = "SCADA_CONSUMPTION_PERF_SQL";
/// 慢 SQL 阈值（毫秒）
pub const ENV_SLOW_SQL_MS: &str = "SCADA_CONSUMPTION_SLOW_SQL_MS";

/// 慢 SQL 日志中 SQL 文本的最大字符数
const SQL_LOG_MAX_CHARS: usize = 420;

static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = const { Cell::new(0) };
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

// ==========================================
// PerfSettings - 埋点开关
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSettings {
    pub enabled: bool,
    pub slow_sql_ms: u64,
}

impl PerfSettings {
    /// 从环境变量读取
    ///
    /// - Debug 默认开启；Release 默认关闭
    /// - 慢 SQL 阈值默认: Debug 50ms / Release 200ms
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(ENV_PERF_SQL).ok().as_deref(),
            std::env::var(ENV_SLOW_SQL_MS).ok().as_deref(),
        )
    }

    fn from_values(perf_sql: Option<&str>, slow_ms: Option<&str>) -> Self {
        let enabled = perf_sql.map(is_true).unwrap_or(cfg!(debug_assertions));
        let slow_sql_ms = slow_ms
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_sql_ms,
        }
    }
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// 压缩为单行并按字符截断（SQL 中可能含中文字面量）
fn truncate_sql(sql: &str, max_chars: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &s[..byte_idx]),
        None => s,
    }
}

/// 安装 SQLite 语句 profile 回调（SQL 计数 + 慢查询日志）
///
/// 只挂 profile：sqlite3_profile 会清掉旧式 trace 回调，计数放在 profile 里做
pub fn install_sqlite_tracing(conn: &mut Connection) {
    install_with_settings(conn, PerfSettings::from_env());
}

pub fn install_with_settings(conn: &mut Connection, settings: PerfSettings) {
    if !settings.enabled {
        // 复用连接时清理残留回调
        conn.profile(None);
        return;
    }

    SLOW_SQL_THRESHOLD_MS.store(settings.slow_sql_ms, Ordering::Relaxed);
    conn.profile(Some(sql_profile_callback));
}

fn guard_active() -> bool {
    PERF_DEPTH.with(|d| d.get() > 0)
}

/// 每条语句执行结束回调一次（未开启时连接上不挂回调）
fn sql_profile_callback(sql: &str, duration: Duration) {
    if guard_active() {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %truncate_sql(sql, SQL_LOG_MAX_CHARS),
        "slow sql"
    );
    if guard_active() {
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 调用级性能统计：耗时 + SQL 语句数 + 慢 SQL 数
///
/// ```ignore
/// let _perf = scada_consumption::perf::PerfGuard::new("api.apply_consumption");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            sql_count,
            slow_sql_count,
            "done"
        );

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
