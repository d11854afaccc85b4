//! # 图片反色工具 — 应用入口
//!
//! 本文件仅负责日志初始化、参数解析与退出码。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::process::ExitCode;

use clap::Parser;
use image_manipulation::cli::{self, CliArgs};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    log::info!("startup: input={} ops={:?}", args.input.chars().take(64).collect::<String>(), args.operations);

    let outcome = match cli::run(&args).await {
        Ok(report) => cli::print_report(&args, &report),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("处理失败: {err}");
            cli::print_error(&args, &err);
            ExitCode::FAILURE
        }
    }
}
