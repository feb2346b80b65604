// ==========================================
// SCADA 物料消耗对账系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 映射: 按 SQLite 扩展错误码区分约束/繁忙/行映射失败
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 台账触发器的中止消息（见 db::SCHEMA_SQL）
const APPEND_ONLY_MARKER: &str = "append-only";

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 连接 / 锁 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    /// busy_timeout 耗尽仍未拿到写锁
    #[error("数据库繁忙: {0}")]
    DatabaseBusy(String),

    // ===== 约束 =====
    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    /// 试图修改或删除台账记录
    #[error("消耗台账只允许追加: {0}")]
    AppendOnlyViolation(String),

    // ===== 查询 / 映射 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("行映射失败 (column={column}): {message}")]
    RowMappingError { column: usize, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi_err, msg) => {
                let msg = msg.unwrap_or_else(|| ffi_err.to_string());
                match ffi_err.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        RepositoryError::DatabaseBusy(msg)
                    }
                    ErrorCode::ConstraintViolation if msg.contains(APPEND_ONLY_MARKER) => {
                        RepositoryError::AppendOnlyViolation(msg)
                    }
                    ErrorCode::ConstraintViolation if msg.contains("UNIQUE") => {
                        RepositoryError::UniqueConstraintViolation(msg)
                    }
                    ErrorCode::ConstraintViolation if msg.contains("FOREIGN KEY") => {
                        RepositoryError::ForeignKeyViolation(msg)
                    }
                    ErrorCode::CannotOpen | ErrorCode::NotADatabase => {
                        RepositoryError::DatabaseConnectionError(msg)
                    }
                    _ => RepositoryError::DatabaseQueryError(msg),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                RepositoryError::RowMappingError {
                    column,
                    message: source.to_string(),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
