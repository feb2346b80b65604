use crate::domain::types::{AllocationMode, ReplaceScope};
use crate::engine::oee_reconciler::DeviationThresholds;
use serde::{Deserialize, Serialize};

/// 消耗对账配置（由 config_kv 加载，缺失/非法值回退默认）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionConfig {
    /// 请求未指定模式时的默认分配模式
    pub default_mode: AllocationMode,

    /// 请求未指定时是否允许超耗
    pub allow_overconsume: bool,

    /// replace 模式清零范围
    pub replace_scope: ReplaceScope,

    /// 未来时间戳容忍秒数
    pub future_tolerance_secs: i64,

    /// 分配成功后 confirmed -> progress
    pub promote_confirmed_to_progress: bool,

    pub deviation_thresholds: DeviationThresholds,

    /// 完工时默认是否按 BOM 自动补齐消耗
    pub mark_done_auto_consume: bool,

    pub mo_list_default_limit: u32,
    pub mo_list_max_limit: u32,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            default_mode: AllocationMode::Add,
            allow_overconsume: false,
            replace_scope: ReplaceScope::Product,
            future_tolerance_secs: 0,
            promote_confirmed_to_progress: true,
            deviation_thresholds: DeviationThresholds::default(),
            mark_done_auto_consume: true,
            mo_list_default_limit: 50,
            mo_list_max_limit: 500,
        }
    }
}

impl ConsumptionConfig {
    /// 分页上限裁剪: 0 或缺省取默认值，超过上限取上限
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        match requested {
            None | Some(0) => self.mo_list_default_limit.min(self.mo_list_max_limit),
            Some(n) => n.min(self.mo_list_max_limit),
        }
    }
}
