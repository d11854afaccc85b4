//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（本地文件 / Data URI / Base64 / 内存字节）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验。目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - Data URI / Base64：格式解析 + 解码前体积预估 + 解码后体积限制。
//! - 所有来源最终都经过文件签名（magic bytes）校验。
//!
//! 这里的函数都是同步的，由 `handler` 放到阻塞线程池中执行。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::source::RawImageData;
use super::{ImageConfig, ImageError, ImageHandler, ImageSource};

impl ImageHandler {
    /// 按来源加载原始字节。
    pub(super) fn load_raw(
        source: &ImageSource,
        config: &ImageConfig,
    ) -> Result<RawImageData, ImageError> {
        match source {
            ImageSource::FilePath(path) => Self::load_from_file(path, config),
            ImageSource::DataUri(data) => Self::load_from_base64(data, config, "data-uri"),
            ImageSource::Base64(data) => Self::load_from_base64(data, config, "base64"),
            ImageSource::Bytes(bytes) => Self::load_from_bytes(bytes, config),
        }
    }

    /// 从 Data URI 或纯 Base64 字符串加载图片原始字节。
    fn load_from_base64(
        data: &str,
        config: &ImageConfig,
        source_hint: &'static str,
    ) -> Result<RawImageData, ImageError> {
        log::info!("📝 开始处理 {} 图片", source_hint);

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;

        if bytes.len() as u64 > config.max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData { bytes, source_hint })
    }

    /// 从本地路径加载图片原始字节。
    fn load_from_file(path: &str, config: &ImageConfig) -> Result<RawImageData, ImageError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(ImageError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| ImageError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if !metadata.is_file() {
            return Err(ImageError::FileSystem(format!("不是普通文件：{}", path)));
        }

        if metadata.len() > config.max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| ImageError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    fn load_from_bytes(bytes: &[u8], config: &ImageConfig) -> Result<RawImageData, ImageError> {
        if bytes.len() as u64 > config.max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "图片数据过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Self::validate_image_signature(bytes)?;

        Ok(RawImageData {
            bytes: bytes.to_vec(),
            source_hint: "memory",
        })
    }

    /// 解析 Base64 输入（支持 Data URL / 纯 Base64）。
    #[cfg(test)]
    pub(crate) fn parse_base64(data: &str) -> Result<Vec<u8>, ImageError> {
        Self::parse_base64_with_limit(data, u64::MAX)
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ImageError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| ImageError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| ImageError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, ImageError> {
        let normalized = data.trim();

        let base64_data = if normalized.starts_with("data:") {
            if !normalized.starts_with("data:image/") {
                return Err(ImageError::InvalidFormat("Data URI 不是图片类型".to_string()));
            }
            let base64_start = normalized
                .find(";base64,")
                .ok_or_else(|| ImageError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[base64_start + 8..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(base64_data)?;
        if estimated_len > max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        // MIME 风格的 Base64 会按行折断，解码前去掉所有空白
        let base64_data: String = base64_data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        general_purpose::STANDARD
            .decode(&base64_data)
            .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::InvalidFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| ImageError::InvalidFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ImageError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 12] = [137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13];

    #[test]
    fn load_from_base64_rejects_non_image_payload() {
        let config = ImageConfig::default();

        let result = ImageHandler::load_raw(&ImageSource::Base64("SGVsbG8=".into()), &config);

        assert!(matches!(result, Err(ImageError::InvalidFormat(_))));
    }

    #[test]
    fn parse_base64_with_limit_rejects_large_payload_before_decode() {
        let huge = "A".repeat(1024 * 1024);
        let result = ImageHandler::parse_base64_with_limit(&huge, 32);

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn parse_base64_accepts_data_uri_and_bare_payload() {
        let encoded = general_purpose::STANDARD.encode(PNG_SIGNATURE);

        let from_uri = ImageHandler::parse_base64(&format!("data:image/png;base64,{}", encoded))
            .expect("data uri should parse");
        let bare = ImageHandler::parse_base64(&format!("  {}\n", encoded)).expect("bare base64 should parse");

        assert_eq!(from_uri, PNG_SIGNATURE);
        assert_eq!(bare, PNG_SIGNATURE);
    }

    #[test]
    fn parse_base64_accepts_line_wrapped_payload() {
        let encoded = general_purpose::STANDARD.encode(PNG_SIGNATURE);
        let (head, tail) = encoded.split_at(8);

        let wrapped = ImageHandler::parse_base64(&format!("{}\r\n{}\n", head, tail))
            .expect("wrapped base64 should parse");

        assert_eq!(wrapped, PNG_SIGNATURE);
    }

    #[test]
    fn parse_base64_rejects_non_image_data_uri() {
        let result = ImageHandler::parse_base64("data:text/plain;base64,SGVsbG8=");
        assert!(matches!(result, Err(ImageError::InvalidFormat(_))));

        let missing_marker = ImageHandler::parse_base64("data:image/png,raw");
        assert!(matches!(missing_marker, Err(ImageError::InvalidFormat(_))));
    }

    #[test]
    fn load_from_file_reports_missing_file() {
        let config = ImageConfig::default();
        let result = ImageHandler::load_raw(
            &ImageSource::FilePath("/definitely/not/here.png".into()),
            &config,
        );

        assert!(matches!(result, Err(ImageError::FileSystem(_))));
    }

    #[test]
    fn load_from_bytes_checks_signature_and_size() {
        let config = ImageConfig::default();
        let raw = ImageHandler::load_raw(&ImageSource::Bytes(PNG_SIGNATURE.to_vec()), &config)
            .expect("png signature should pass");
        assert_eq!(raw.source_hint, "memory");

        let html = ImageHandler::load_raw(&ImageSource::Bytes(b"<html></html>".to_vec()), &config);
        assert!(matches!(html, Err(ImageError::InvalidFormat(_))));

        let mut tiny = ImageConfig::default();
        tiny.max_file_size = 4;
        let too_big = ImageHandler::load_raw(&ImageSource::Bytes(PNG_SIGNATURE.to_vec()), &tiny);
        assert!(matches!(too_big, Err(ImageError::ResourceLimit(_))));
    }
}
