// ==========================================
// SCADA 物料消耗对账系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为调用方可识别的错误码
// ==========================================

use crate::engine::error::ConsumptionError;
use crate::engine::validation_gate::ValidationIssue;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    /// 载荷校验失败（不重试）
    #[error("数据验证失败: {message}")]
    ValidationError {
        message: String,
        issues: Vec<ValidationIssue>,
    },

    /// MO 状态不允许该操作
    #[error("状态错误: {0}")]
    StateError(String),

    /// 没有可分配的需求行
    #[error("分配失败: {0}")]
    AllocationError(String),

    #[error("配置错误: {0}")]
    ConfigurationError(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("导出失败: {0}")]
    ExportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码（供调用方分支判断）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::StateError(_) => "STATE_ERROR",
            ApiError::AllocationError(_) => "ALLOCATION_ERROR",
            ApiError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::ExportError(_) => "EXPORT_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 转换为错误响应
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: match self {
                ApiError::ValidationError { issues, .. } => {
                    Some(serde_json::json!({ "issues": issues }))
                }
                _ => None,
            },
        }
    }
}

/// 错误响应（序列化输出给调用方）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseBusy(msg) => {
                ApiError::DatabaseTransactionError(format!("写锁等待超时: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::AppendOnlyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("消耗台账只允许追加: {}", msg))
            }
            RepositoryError::RowMappingError { column, message } => {
                ApiError::InternalError(format!("第{}列数据无法解析: {}", column, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ConsumptionError 转换
// ==========================================
impl From<ConsumptionError> for ApiError {
    fn from(err: ConsumptionError) -> Self {
        match err {
            ConsumptionError::Validation { message, issues } => {
                ApiError::ValidationError { message, issues }
            }
            err @ ConsumptionError::State { .. } => ApiError::StateError(err.to_string()),
            ConsumptionError::Allocation(msg) => ApiError::AllocationError(msg),
            ConsumptionError::Configuration(msg) => ApiError::ConfigurationError(msg),
            ConsumptionError::Repository(err) => err.into(),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
