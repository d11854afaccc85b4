// ============================================================================
// 命令行入口 — 选择图片并执行像素操作
// ============================================================================
//
// 用法示例：
//   image-manipulation photo.png -o inverted.png
//   image-manipulation photo.png --op grayscale --op rotate90 --output-dir out/
//   image-manipulation photo.jpg --data-uri                (打印结果 Data URI)
//   image-manipulation "data:image/png;base64,..." --json  (JSON 摘要)
//
// 未指定 --op 时默认执行 invert。多个 --op 按顺序串联执行，只编码一次。

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use chrono::Local;
use clap::Parser;
use serde::Serialize;

use crate::error::AppError;
use crate::image_handler::{
    EncodedImage, ImageConfig, ImageLimitsConfig, ImageServiceState, ImageSource, OutputFormat,
    PixelOperation, commands,
};
use crate::settings::load_app_settings;

/// 图片反色 / 像素操作工具。
#[derive(Parser, Debug, Clone)]
#[command(
    name = "image-manipulation",
    about = "Invert an image (or run other pixel operations) and export the result",
    long_about = "Select an image (file path, data URI or raw base64), apply pixel operations\n\
                  in order and export the result as PNG (default), JPEG, WEBP or BMP.\n\n\
                  Operations: invert, grayscale, rotate90|rotate180|rotate270, scale:WxH,\n\
                  denoise, equalize."
)]
pub struct CliArgs {
    /// 输入：本地文件路径、`data:image/...;base64,` Data URI 或纯 Base64。
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// 像素操作，可重复，按顺序执行。
    #[arg(short = 'p', long = "op", value_name = "OP", default_value = "invert")]
    pub operations: Vec<String>,

    /// 输出文件路径。未指定 --format 时按扩展名推断格式。
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// 输出目录，文件名为 `<操作>_<时间戳>.<扩展名>`。
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// 输出格式：png, jpeg, webp, bmp。
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG 质量（1–100）。
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// JSON 设置文件。
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 在标准输出打印结果 Data URI。
    #[arg(long)]
    pub data_uri: bool,

    /// 以 JSON 输出处理摘要（或错误）。
    #[arg(long)]
    pub json: bool,
}

/// 一次运行的摘要。
#[derive(Debug, Clone, Serialize)]
pub struct CliReport {
    pub source: String,
    pub operations: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub encoded_bytes: usize,
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
    /// 本次运行生效的配置（设置文件 + 命令行覆盖）。
    pub config: ImageConfig,
}

#[derive(Debug, Serialize)]
struct CliErrorReport<'a> {
    code: &'static str,
    error: &'a AppError,
}

/// 执行一次完整处理：读取设置 → 选择 → 变换 → 写出。
pub async fn run(args: &CliArgs) -> Result<CliReport, AppError> {
    let config = resolve_config(args)?;
    let service = ImageServiceState::with_config(config.clone());

    // 设置文件中的上限与运行时调整走同一套校验
    commands::set_image_limits(&service, ImageLimitsConfig::from(&config))
        .map_err(|e| AppError::Settings(format!("资源上限无效: {}", e)))?;

    if let Some(format) = requested_format(args)? {
        commands::set_output_format(&service, format.as_str().to_string())?;
    }

    let selected = if looks_like_inline_data(&args.input) {
        commands::select_image_data(&service, args.input.clone())?
    } else {
        commands::select_image_file(&service, args.input.clone())?
    };

    let encoded = commands::manipulate_image(&service, &args.operations).await?;

    let output = match (&args.output, &args.output_dir) {
        (Some(path), _) => Some(write_output(path, &encoded)?),
        (None, Some(dir)) => {
            let path = dir.join(default_file_name(&args.operations, encoded.format));
            Some(write_output(&path, &encoded)?)
        }
        (None, None) => None,
    };

    let source = match &selected.source {
        ImageSource::FilePath(path) => path.clone(),
        other => other.hint(),
    };

    Ok(CliReport {
        source,
        operations: args.operations.clone(),
        width: encoded.width,
        height: encoded.height,
        format: encoded.format,
        encoded_bytes: encoded.bytes.len(),
        output: output.map(|p| p.to_string_lossy().to_string()),
        data_uri: args.data_uri.then(|| encoded.data_uri()),
        config: commands::get_image_config(&service)?,
    })
}

/// 打印成功摘要。
pub fn print_report(args: &CliArgs, report: &CliReport) -> Result<(), AppError> {
    if args.json {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| AppError::Output(format!("序列化摘要失败: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    if let Some(data_uri) = &report.data_uri {
        println!("{}", data_uri);
    }

    match &report.output {
        Some(path) => eprintln!(
            "{} → {} ({}x{}, {}, {} bytes)",
            report.operations.join(" + "),
            path,
            report.width,
            report.height,
            report.format.as_str(),
            report.encoded_bytes
        ),
        None if report.data_uri.is_none() => eprintln!(
            "{}: {}x{} {} ({} bytes)，未写出文件（使用 --output / --output-dir / --data-uri）",
            report.operations.join(" + "),
            report.width,
            report.height,
            report.format.as_str(),
            report.encoded_bytes
        ),
        None => {}
    }

    Ok(())
}

/// 打印错误（JSON 模式输出到标准输出，便于脚本解析）。
pub fn print_error(args: &CliArgs, error: &AppError) {
    if args.json {
        let report = CliErrorReport {
            code: error.code(),
            error,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(_) => eprintln!("error: {}", error),
        }
        return;
    }

    eprintln!("error: {}", error);
}

fn resolve_config(args: &CliArgs) -> Result<ImageConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => load_app_settings(path)?
            .ok_or_else(|| AppError::Settings(format!("设置文件不存在: {}", path.display())))?
            .image,
        None => ImageConfig::default(),
    };

    if let Some(quality) = args.quality {
        if !(1..=100).contains(&quality) {
            return Err(AppError::Output(format!("JPEG 质量必须在 1~100 之间: {}", quality)));
        }
        config.jpeg_quality = quality;
    }

    Ok(config)
}

/// 命令行指定的输出格式：`--format` 优先，其次 `--output` 的扩展名。
fn requested_format(args: &CliArgs) -> Result<Option<OutputFormat>, AppError> {
    match (&args.format, &args.output) {
        (Some(format), _) => Ok(Some(OutputFormat::from_str(format)?)),
        (None, Some(path)) => Ok(format_from_extension(path)),
        (None, None) => Ok(None),
    }
}

fn format_from_extension(path: &Path) -> Option<OutputFormat> {
    let ext = path.extension()?.to_str()?;
    match OutputFormat::from_str(ext) {
        Ok(format) => Some(format),
        Err(_) => {
            log::warn!("⚠️ 无法从扩展名推断输出格式: {}，使用设置中的格式", ext);
            None
        }
    }
}

/// `data:` 开头，或不存在的路径且前 16 个 Base64 字符解码后带图片签名，才按内联数据处理。
fn looks_like_inline_data(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.starts_with("data:") {
        return true;
    }
    if Path::new(trimmed).exists() {
        return false;
    }

    let head: String = trimmed
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .take(16)
        .collect();
    if head.len() < 16 {
        return false;
    }

    general_purpose::STANDARD
        .decode(&head)
        .is_ok_and(|bytes| infer::is_image(&bytes))
}

fn default_file_name(operations: &[String], format: OutputFormat) -> String {
    let label = operations
        .iter()
        .map(|op| PixelOperation::from_str(op).map(|parsed| parsed.label()).unwrap_or_else(|_| op.clone()))
        .collect::<Vec<_>>()
        .join("-");
    let timestamp = Local::now().format("%Y%m%d%H%M%S%f");
    format!("{}_{}.{}", label, timestamp, format.extension())
}

fn write_output(path: &Path, encoded: &EncodedImage) -> Result<PathBuf, AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(path, &encoded.bytes)?;
    log::info!("💾 已写出结果: {}", path.display());
    Ok(path.to_path_buf())
}
