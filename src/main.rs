//! Civitai 模型下载器。
//!
//! 按模型 ID 抓取页面，解析标题/类型/主下载文件，按类型放入本地
//! Stable Diffusion 目录结构。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/ID 解析等基础设施
//! - `network_parser`：会话 Cookie、HTTP 请求、页面字段提取
//! - `download`：目录归类、文件下载、批处理编排

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{ArgGroup, Parser};
use tracing::{debug, error, info, warn};

mod base_system;
mod download;
mod network_parser;

use base_system::config::{load_or_create, load_or_create_at};
use base_system::context::{Config, CookieConfig};
use base_system::logging::{LogOptions, LogSystem};
use base_system::model_id::{collect_ids, parse_model_id_arg};
use download::batch::BatchRunner;
use network_parser::auth::AuthState;
use network_parser::network::CivitaiWeb;

const INVALID_INPUT_EXIT_CODE: u8 = 2;
const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";

#[derive(Debug, Parser)]
#[command(name = "civitai-fetch", version)]
#[command(about = "Download Civitai models into a Stable Diffusion directory tree")]
#[command(group(ArgGroup::new("input").required(true).args(["ids", "file"])))]
struct Cli {
    /// 模型 ID 或模型页面链接，可重复
    #[arg(short = 'i', long = "id", value_parser = parse_model_id_arg)]
    ids: Vec<u64>,

    /// 每行一个模型 ID 的文件
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// 为第一个模型指定下载 ID，跳过页面上的下载按钮解析
    #[arg(short = 'd', long)]
    download_id: Option<u64>,

    /// 覆盖配置中的 sd_base_directory（也可用环境变量 SD_BASE_DIRECTORY）
    #[arg(long)]
    base_dir: Option<String>,

    /// 数据目录路径（存放 config.yml、cookies.yml 和 logs）
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 关闭下载进度条
    #[arg(long, default_value_t = false)]
    no_progress: bool,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 控制台日志不使用 ANSI 颜色
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// 控制台不输出日志，仍写入 logs/latest.log
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// 退出时保留 latest.log，不归档为 zip
    #[arg(long, default_value_t = false)]
    keep_log: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();
    let _log = init_logging(log_options(&cli), data_dir)?;

    // 输入校验在任何网络请求之前完成
    let ids = match collect_ids(&cli.ids, cli.file.as_deref()) {
        Ok(ids) => ids,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::from(INVALID_INPUT_EXIT_CODE));
        }
    };
    debug!("待处理模型: {:?}", ids);

    let mut config: Config = load_or_create(data_dir).context("load config.yml")?;
    config.override_base_directory(
        cli.base_dir
            .or_else(|| std::env::var("SD_BASE_DIRECTORY").ok()),
    );

    let cookie_path = match data_dir {
        Some(dir) => dir.join(&config.cookie_file),
        None => PathBuf::from(&config.cookie_file),
    };
    let cookies: CookieConfig = load_or_create_at(&cookie_path)
        .with_context(|| format!("load {}", cookie_path.display()))?;
    let auth = AuthState::new(cookies.pairs());
    if auth.get(SESSION_COOKIE).is_none() {
        warn!("未配置 {SESSION_COOKIE}，需要登录才能查看的模型将解析失败");
    }

    let source = CivitaiWeb::new(&config).context("init http client")?;
    let mut runner = BatchRunner::new(
        source,
        auth,
        config.output_root(),
        config.show_progress && !cli.no_progress,
    );
    info!("输出根目录: {}", runner.output_root().display());

    let report = runner.run(&ids, cli.download_id);
    debug!("会话 Cookie 数量: {}", runner.auth().cookies().len());

    for item in report.items.iter().filter(|i| i.state.is_failure()) {
        if let Some(err) = &item.error {
            error!("模型 {} ({:?}): {}", item.model.id, item.state, err);
        }
    }

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn log_options(cli: &Cli) -> LogOptions {
    LogOptions {
        debug: cli.debug,
        use_color: !cli.no_color,
        archive_on_exit: !cli.keep_log,
        console: !cli.quiet,
    }
}

fn init_logging(opts: LogOptions, base_dir: Option<&Path>) -> Result<LogSystem> {
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
