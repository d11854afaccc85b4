//! 设置文件模块
//!
//! # 设计思路
//!
//! 设置文件为 JSON，只需写出想覆盖的字段，其余使用默认值。
//! 优先级：CLI 参数 > 设置文件 > `ImageConfig::default()`。
//!
//! ```json
//! { "image": { "output_format": "jpeg", "jpeg_quality": 80, "load_timeout_ms": 5000 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::image_handler::ImageConfig;

/// 应用设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub image: ImageConfig,
}

/// 从 JSON 字符串解析设置
pub fn parse_app_settings(content: &str) -> Result<AppSettings, AppError> {
    serde_json::from_str::<AppSettings>(content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))
}

/// 读取设置文件；文件不存在时返回 `None`
pub fn load_app_settings(path: &Path) -> Result<Option<AppSettings>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let settings = parse_app_settings(&content)?;
    log::info!("⚙️ 已加载设置文件: {}", path.display());

    Ok(Some(settings))
}

/// 写出设置文件（格式化 JSON）
pub fn save_app_settings(path: &Path, settings: &AppSettings) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}
