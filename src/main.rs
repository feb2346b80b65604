// ==========================================
// SCADA 物料消耗对账系统 - 命令行入口
// ==========================================
// 职责: 解析命令行参数，调用 API，结果以 JSON 输出到 stdout
// 约定: 失败时输出 ErrorResponse JSON 并以非零码退出
// ==========================================

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use scada_consumption::api::{ApiError, ApiResult, MoListQuery};
use scada_consumption::app::{get_default_db_path, AppState};
use scada_consumption::domain::{AllocationMode, MoRef};
use scada_consumption::engine::{
    ApplyConsumptionRequest, ConsumptionPayload, MarkDoneRequest, RecordWeightRequest,
};
use scada_consumption::logging;

#[derive(Parser)]
#[command(name = "scada-consumption")]
#[command(version, about = "SCADA 物料消耗对账系统")]
struct Cli {
    /// 数据库文件路径
    #[arg(long, global = true, env = "SCADA_CONSUMPTION_DB_PATH")]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// 设备消耗上报载荷参数
#[derive(clap::Args)]
struct PayloadArgs {
    /// 设备编码
    #[arg(long)]
    equipment: Option<String>,

    /// 物料（产品变体）ID
    #[arg(long)]
    product_id: Option<i64>,

    /// 产品模板ID（解析为唯一变体）
    #[arg(long)]
    product_tmpl_id: Option<i64>,

    /// 消耗数量
    #[arg(long)]
    qty: Option<f64>,

    /// MO（数字ID 或 订单名称）
    #[arg(long)]
    mo: Option<String>,

    /// 上报时间（RFC 3339 或 YYYY-MM-DD HH:MM:SS，UTC）
    #[arg(long)]
    timestamp: Option<String>,
}

impl PayloadArgs {
    fn into_payload(self) -> ConsumptionPayload {
        ConsumptionPayload {
            equipment_code: self.equipment,
            product_id: self.product_id,
            product_tmpl_id: self.product_tmpl_id,
            quantity: self.qty,
            mo: self.mo.as_deref().map(MoRef::parse),
            timestamp: self.timestamp,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化数据库（建表）
    Init,

    /// 上报设备物料消耗
    Apply {
        #[command(flatten)]
        payload: PayloadArgs,

        /// 分配模式（add / replace），缺省取配置
        #[arg(long, value_parser = parse_mode)]
        mode: Option<AllocationMode>,

        /// 允许超耗（缺省取配置）
        #[arg(long)]
        allow_overconsume: Option<bool>,
    },

    /// 仅校验上报载荷，不写入
    Validate {
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// 标记 MO 完工
    Done {
        #[arg(long)]
        mo: String,

        /// 完工数量
        #[arg(long)]
        finished_qty: f64,

        /// 按 BOM 自动补齐消耗（缺省取配置）
        #[arg(long)]
        auto_consume: Option<bool>,

        /// 实际完工时间（缺省取当前时间）
        #[arg(long)]
        date_end: Option<String>,

        /// 完工备注
        #[arg(long)]
        message: Option<String>,
    },

    /// 重建 OEE 汇总
    Rebuild {
        #[arg(long)]
        mo: String,
    },

    /// 查看 OEE 汇总
    Summary {
        #[arg(long)]
        mo: String,
    },

    /// 设备关联的 MO 列表
    List {
        #[arg(long)]
        equipment: String,

        /// 状态过滤
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// MO 的消耗事件
    Events {
        #[arg(long)]
        mo: String,
    },

    /// 导出消耗台账 CSV
    Export {
        /// 仅导出该 MO
        #[arg(long)]
        mo: Option<String>,

        /// 输出文件（缺省输出到 stdout）
        #[arg(long)]
        out: Option<std::path::PathBuf>,
    },

    /// 记录 MO 实际重量
    Weigh {
        #[arg(long)]
        mo: String,

        /// 实际重量（kg）
        #[arg(long)]
        actual: f64,

        #[arg(long)]
        timestamp: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// 重量记录（按时间倒序）
    Weights {
        #[arg(long)]
        mo: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// 查看全部全局配置
    ConfigShow,

    /// 设置全局配置项
    ConfigSet { key: String, value: String },
}

fn parse_mode(raw: &str) -> Result<AllocationMode, String> {
    AllocationMode::parse(raw).ok_or_else(|| format!("未知的分配模式: {}", raw))
}

fn main() -> ExitCode {
    logging::init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            print_error(&ApiError::DatabaseConnectionError(e));
            return ExitCode::FAILURE;
        }
    };

    match execute(&state, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::warn!(code = e.code(), "命令执行失败: {}", e);
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn execute(state: &AppState, command: Commands) -> ApiResult<()> {
    match command {
        Commands::Init => print_json(&serde_json::json!({ "db_path": state.db_path })),
        Commands::Apply {
            payload,
            mode,
            allow_overconsume,
        } => {
            let request = ApplyConsumptionRequest {
                payload: payload.into_payload(),
                mode,
                allow_overconsume,
            };
            print_json(&state.consumption_api.apply_consumption(&request)?)
        }
        Commands::Validate { payload } => print_json(
            &state
                .consumption_api
                .validate_payload(&payload.into_payload())?,
        ),
        Commands::Done {
            mo,
            finished_qty,
            auto_consume,
            date_end,
            message,
        } => {
            let request = MarkDoneRequest {
                mo: MoRef::parse(&mo),
                finished_qty,
                auto_consume,
                date_end_actual: date_end,
                message,
            };
            print_json(&state.order_api.mark_order_done(&request)?)
        }
        Commands::Rebuild { mo } => {
            print_json(&state.order_api.rebuild_oee_summary(&MoRef::parse(&mo))?)
        }
        Commands::Summary { mo } => {
            print_json(&state.order_api.get_oee_summary(&MoRef::parse(&mo))?)
        }
        Commands::List {
            equipment,
            state: state_filter,
            limit,
            offset,
        } => {
            let query = MoListQuery {
                equipment_code: equipment,
                state: state_filter,
                limit,
                offset,
            };
            print_json(&state.order_api.get_mo_list(&query)?)
        }
        Commands::Events { mo } => print_json(
            &state
                .consumption_api
                .list_consumption_events(&MoRef::parse(&mo))?,
        ),
        Commands::Export { mo, out } => {
            let mo_ref = mo.as_deref().map(MoRef::parse);
            let csv = state.consumption_api.export_ledger_csv(mo_ref.as_ref())?;
            match out {
                Some(path) => std::fs::write(&path, csv).map_err(|e| {
                    ApiError::ExportError(format!("写入{}失败: {}", path.display(), e))
                }),
                None => {
                    print!("{}", csv);
                    Ok(())
                }
            }
        }
        Commands::Weigh {
            mo,
            actual,
            timestamp,
            notes,
        } => {
            let request = RecordWeightRequest {
                mo: MoRef::parse(&mo),
                weight_actual: actual,
                timestamp,
                notes,
            };
            print_json(&state.order_api.record_mo_weight(&request)?)
        }
        Commands::Weights { mo, limit, offset } => {
            let mo_ref = mo.as_deref().map(MoRef::parse);
            print_json(
                &state
                    .order_api
                    .get_mo_weights(mo_ref.as_ref(), limit, offset)?,
            )
        }
        Commands::ConfigShow => {
            let snapshot = state
                .config_manager
                .get_config_snapshot()
                .map_err(|e| ApiError::ConfigurationError(e.to_string()))?;
            println!("{}", snapshot);
            Ok(())
        }
        Commands::ConfigSet { key, value } => {
            state
                .config_manager
                .set_global_config_value(&key, &value)
                .map_err(|e| ApiError::ConfigurationError(e.to_string()))?;
            print_json(&serde_json::json!({ "key": key, "value": value }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> ApiResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InternalError(format!("JSON序列化失败: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn print_error(err: &ApiError) {
    match serde_json::to_string_pretty(&err.to_response()) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{}", err),
    }
}
