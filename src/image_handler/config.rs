//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ImageConfig`，保证运行时行为可观测、可调整、可测试。
//! 输出格式（png / jpeg / webp / bmp）作为高层语义，映射到 `image` crate 的编码器。
//!
//! ## 实现思路
//!
//! - `Default` 提供可直接使用的配置（PNG 输出，与浏览器 `canvas.toDataURL()` 默认一致）。
//! - `#[serde(default)]` 允许设置文件只覆盖部分字段。
//! - `OutputFormat` 负责格式字符串解析、MIME 与扩展名输出。

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use super::ImageError;

/// 图片处理配置。
///
/// 字段覆盖了读取、解码、等待与编码四个阶段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 等待“加载 + 解码”完成的最长时间（毫秒）。
    pub load_timeout_ms: u64,
    /// 结果图片的编码格式。
    pub output_format: OutputFormat,
    /// JPEG 编码质量（1~100），其余格式忽略。
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            load_timeout_ms: 30_000,
            output_format: OutputFormat::Png,
            jpeg_quality: 90,
        }
    }
}

/// 结果图片编码格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl OutputFormat {
    /// 从外部字符串解析格式。
    ///
    /// # 示例
    /// ```rust
    /// use image_manipulation::image_handler::OutputFormat;
    ///
    /// let f = OutputFormat::from_str("JPG")?;
    /// assert_eq!(f.as_str(), "jpeg");
    /// # Ok::<(), image_manipulation::image_handler::ImageError>(())
    /// ```
    pub fn from_str(format: &str) -> Result<Self, ImageError> {
        match format.trim().to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "bmp" => Ok(Self::Bmp),
            other => Err(ImageError::InvalidFormat(format!(
                "未知输出格式：{}（可选：png / jpeg / webp / bmp）",
                other
            ))),
        }
    }

    /// 稳定字符串，供日志、JSON 输出与持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Webp => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
        }
    }

    /// 是否能保留 alpha 通道。
    pub fn keeps_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

/// 可在运行时调整的资源上限（命令层出入参）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLimitsConfig {
    pub max_file_size: u64,
    pub max_decoded_pixels: u64,
    pub max_decoded_bytes: u64,
    pub load_timeout_ms: u64,
}

impl ImageLimitsConfig {
    /// 范围校验，失败返回 `InvalidFormat`。
    pub(crate) fn validate(&self) -> Result<(), ImageError> {
        if self.max_file_size < 1024 {
            return Err(ImageError::InvalidFormat("max_file_size 不能小于 1KB".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ImageError::InvalidFormat("max_decoded_pixels 必须大于 0".to_string()));
        }
        if self.max_decoded_bytes < 4 {
            return Err(ImageError::InvalidFormat("max_decoded_bytes 至少容纳 1 个像素".to_string()));
        }
        if !(100..=600_000).contains(&self.load_timeout_ms) {
            return Err(ImageError::InvalidFormat(
                "load_timeout_ms 必须在 100~600000 毫秒之间".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&ImageConfig> for ImageLimitsConfig {
    fn from(config: &ImageConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_decoded_pixels: config.max_decoded_pixels,
            max_decoded_bytes: config.max_decoded_bytes,
            load_timeout_ms: config.load_timeout_ms,
        }
    }
}
