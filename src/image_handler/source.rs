//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `ImageRef` 表示一次“选择”产生的不透明引用（最新选择覆盖旧选择）
//! - `RawImageData` 表示已加载但未解码的字节
//! - `DecodedRaster` 表示完全解码后的 RGBA 像素网格
//! - `EncodedImage` 表示可直接展示的编码结果（Data URI）

use base64::{Engine as _, engine::general_purpose};
use image::RgbaImage;
use serde::Serialize;

use super::{ImageError, OutputFormat};

/// 图片输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 本地文件路径来源。
    FilePath(String),
    /// `data:image/*;base64,` 形式的 Data URI。
    DataUri(String),
    /// 纯 Base64 字符串。
    Base64(String),
    /// 已在内存中的原始字节。
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// 日志用的短描述，不输出完整 Base64 内容。
    pub(crate) fn hint(&self) -> String {
        match self {
            Self::FilePath(path) => format!("file:{}", path),
            Self::DataUri(uri) => format!("data-uri:{}B", uri.len()),
            Self::Base64(data) => format!("base64:{}B", data.len()),
            Self::Bytes(bytes) => format!("bytes:{}B", bytes.len()),
        }
    }
}

/// 一次选择产生的源图片引用。
///
/// `id` 在会话内单调递增，用于判断结果是否仍对应当前选择。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub id: u64,
    pub source: ImageSource,
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 解码阶段输出：RGBA 像素网格。
///
/// 不变量：`pixels.len() == width * height * 4`，行优先，通道顺序 R,G,B,A。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRaster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedRaster {
    /// 从原始 RGBA 字节构建，长度不匹配时返回 `Decode` 错误。
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(4))
            .ok_or_else(|| ImageError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

        if pixels.len() != expected_len {
            return Err(ImageError::Decode(format!(
                "像素数据长度异常：期望 {} 字节，实际 {} 字节",
                expected_len,
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// 读取单个像素；越界返回 `None`。
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(rgba)
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub(crate) fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub(crate) fn to_rgba_image(&self) -> Result<RgbaImage, ImageError> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| ImageError::Decode("构建 RGBA 缓冲失败".to_string()))
    }
}

/// 编码阶段输出：可直接展示的结果图片。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    /// 产生该结果的源引用 id。
    pub source_id: u64,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    /// 编码后的文件字节。
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// 自包含的 Data URI（`data:<mime>;base64,<payload>`）。
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_rejects_mismatched_buffer_length() {
        let result = DecodedRaster::new(2, 2, vec![0; 15]);
        assert!(matches!(result, Err(ImageError::Decode(_))));
    }

    #[test]
    fn raster_pixel_reads_row_major() {
        let raster = DecodedRaster::new(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(raster.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(raster.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(raster.pixel(2, 0), None);
    }

    #[test]
    fn encoded_image_data_uri_uses_format_mime() {
        let encoded = EncodedImage {
            source_id: 1,
            width: 1,
            height: 1,
            format: OutputFormat::Png,
            bytes: vec![1, 2, 3],
        };

        assert_eq!(encoded.data_uri(), "data:image/png;base64,AQID");
    }
}
