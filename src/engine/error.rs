// ==========================================
// SCADA 物料消耗对账系统 - 引擎层错误类型
// ==========================================
// 分类: 校验 / 状态 / 分配 / 配置 / 存储
// 约定: 引擎内部不做重试，错误原样上抛
// ==========================================

use crate::domain::MoState;
use crate::engine::validation_gate::ValidationIssue;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumptionError {
    /// 载荷缺失/非法字段、实体不存在、数量非正、未来时间戳
    #[error("校验失败: {message}")]
    Validation {
        message: String,
        issues: Vec<ValidationIssue>,
    },

    /// MO 处于不允许该操作的状态
    #[error("MO {mo_name} 处于 {state} 状态，不允许该操作")]
    State { mo_name: String, state: MoState },

    /// 产品在 MO 上没有开放需求行
    #[error("分配失败: {0}")]
    Allocation(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ConsumptionError {
    /// 由校验问题列表构造校验错误（消息按检查顺序以 "; " 拼接）
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let message = issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        ConsumptionError::Validation { message, issues }
    }

    pub fn single_issue(issue: ValidationIssue) -> Self {
        Self::from_issues(vec![issue])
    }
}

impl From<rusqlite::Error> for ConsumptionError {
    fn from(err: rusqlite::Error) -> Self {
        ConsumptionError::Repository(err.into())
    }
}

pub type ConsumptionResult<T> = Result<T, ConsumptionError>;
