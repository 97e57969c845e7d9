//! bvh2mimic - 将目录中的 BVH 动作批量转换为 DeepMimic 关键帧文件
//!
//! 用法：bvh2mimic --input bvh/ --output mimic/ --settings settings.json [--loop wrap] [--clean] [--parallel]
//!
//! 日志级别由 RUST_LOG 控制，例如 `RUST_LOG=debug`。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use mocap_retarget::{convert_directory, BatchOptions, LoopMode, RetargetConfig};

#[derive(Parser, Debug)]
#[command(name = "bvh2mimic", version, about = "BVH 动作捕捉 → DeepMimic humanoid 关键帧")]
struct Args {
    /// BVH 输入目录
    #[arg(short, long, default_value = "bvh")]
    input: PathBuf,

    /// 输出目录（不存在时创建）
    #[arg(short, long, default_value = "mimic")]
    output: PathBuf,

    /// JSON 设置文件；缺省使用内置默认映射
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// 覆盖设置文件中的循环模式
    #[arg(long = "loop", value_enum)]
    loop_mode: Option<LoopArg>,

    /// 转换前清空输出目录
    #[arg(long)]
    clean: bool,

    /// 按帧并行求解
    #[arg(long)]
    parallel: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoopArg {
    None,
    Wrap,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::None => LoopMode::None,
            LoopArg::Wrap => LoopMode::Wrap,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match &args.settings {
        Some(path) => match RetargetConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("[Batch] 无法读取设置 {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => RetargetConfig::default(),
    };

    let options = BatchOptions {
        config,
        loop_mode: args.loop_mode.map(LoopMode::from),
        clean: args.clean,
        parallel: args.parallel,
    };

    match convert_directory(&args.input, &args.output, &options) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            for (path, reason) in &report.failed {
                eprintln!("{}: {}", path.display(), reason);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("[Batch] {}", e);
            ExitCode::FAILURE
        }
    }
}
