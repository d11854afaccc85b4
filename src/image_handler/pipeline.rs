//! # 解码与编码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA 栅格”与“RGBA 栅格 → 编码字节”的过程集中管理，
//! 并在关键节点增加资源上限控制。优先做尺寸检查，再进行完整解码，
//! 降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 解码：
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限、内存上限快速拒绝
//! 3. 完整解码并转换为 RGBA8
//! 4. 校验字节长度一致性
//!
//! 编码：按 `OutputFormat` 选择编码器；不支持 alpha 的格式（JPEG）先转 RGB8。

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

use super::source::RawImageData;
use super::{DecodedRaster, EncodedImage, ImageConfig, ImageError, ImageHandler, OutputFormat};

impl ImageHandler {
    /// 将原始字节完整解码为 RGBA 栅格。
    pub(super) fn decode_raster(
        raw: RawImageData,
        config: &ImageConfig,
    ) -> Result<DecodedRaster, ImageError> {
        let format: ImageFormat = image::guess_format(&raw.bytes)
            .map_err(|e| ImageError::InvalidFormat(format!("不支持的图片格式：{}", e)))?;

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory_with_format(&raw.bytes, format)
            .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        Self::validate_pixel_limits(config, width, height)?;
        Self::validate_decoded_memory_limits(config, width, height)?;

        let raster = DecodedRaster::new(width, height, decoded.to_rgba8().into_raw())?;

        log::info!(
            "✅ 图片解码成功 - 来源: {} 格式: {:?} 尺寸: {}x{}",
            raw.source_hint,
            format,
            width,
            height
        );

        Ok(raster)
    }

    /// 将 RGBA 栅格编码为配置指定的格式。
    pub(super) fn encode_raster(
        raster: &DecodedRaster,
        source_id: u64,
        config: &ImageConfig,
    ) -> Result<EncodedImage, ImageError> {
        let format = config.output_format;
        let rgba = DynamicImage::ImageRgba8(raster.to_rgba_image()?);
        let image = if format.keeps_alpha() {
            rgba
        } else {
            DynamicImage::ImageRgb8(rgba.to_rgb8())
        };
        let mut cursor = Cursor::new(Vec::new());

        match format {
            OutputFormat::Jpeg => {
                let quality = config.jpeg_quality.clamp(1, 100);
                let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e)))?;
            }
            other => {
                image
                    .write_to(&mut cursor, other.image_format())
                    .map_err(|e| {
                        ImageError::Encode(format!("{} 编码失败：{}", other.as_str(), e))
                    })?;
            }
        }

        let bytes = cursor.into_inner();
        log::debug!(
            "📦 编码完成 - 格式: {} 尺寸: {}x{} 大小: {} bytes",
            format.as_str(),
            raster.width(),
            raster.height(),
            bytes.len()
        );

        Ok(EncodedImage {
            source_id,
            width: raster.width(),
            height: raster.height(),
            format,
            bytes,
        })
    }

    /// 仅通过内存中的图片头信息读取宽高。
    ///
    /// 用于在完整解码前做像素限制检查。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
        let cursor = Cursor::new(bytes);
        let reader = ImageReader::new(cursor)
            .with_guessed_format()
            .map_err(|e| ImageError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(config: &ImageConfig, width: u32, height: u32) -> Result<(), ImageError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(ImageError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &ImageConfig,
        width: u32,
        height: u32,
    ) -> Result<(), ImageError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(ImageError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 200])
        });

        let dyn_img = DynamicImage::ImageRgba8(img);
        let mut cursor = Cursor::new(Vec::new());
        dyn_img
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn raw(bytes: Vec<u8>) -> RawImageData {
        RawImageData {
            bytes,
            source_hint: "test",
        }
    }

    #[test]
    fn decode_produces_rgba_raster_with_natural_dimensions() {
        let config = ImageConfig::default();
        let raster = ImageHandler::decode_raster(raw(create_png_bytes(17, 9)), &config)
            .expect("decode should succeed");

        assert_eq!(raster.dimensions(), (17, 9));
        assert_eq!(raster.pixels().len(), 17 * 9 * 4);
        assert_eq!(raster.pixel(3, 2), Some([3, 2, 5, 200]));
    }

    #[test]
    fn decode_rejects_too_many_pixels() {
        let mut config = ImageConfig::default();
        config.max_decoded_pixels = 1_000;

        let result = ImageHandler::decode_raster(raw(create_png_bytes(100, 100)), &config);

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn decode_rejects_decoded_memory_over_limit() {
        let mut config = ImageConfig::default();
        config.max_decoded_bytes = 64 * 64 * 4 - 1;

        let result = ImageHandler::decode_raster(raw(create_png_bytes(64, 64)), &config);

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn decode_reports_truncated_image_instead_of_hanging() {
        let config = ImageConfig::default();
        let mut bytes = create_png_bytes(32, 32);
        bytes.truncate(40);

        let result = ImageHandler::decode_raster(raw(bytes), &config);

        assert!(matches!(
            result,
            Err(ImageError::Decode(_)) | Err(ImageError::InvalidFormat(_))
        ));
    }

    #[test]
    fn png_encoding_keeps_pixels_and_alpha() {
        let config = ImageConfig::default();
        let raster = DecodedRaster::new(2, 1, vec![245, 235, 225, 255, 255, 0, 127, 0]).unwrap();

        let encoded = ImageHandler::encode_raster(&raster, 7, &config).expect("png encode");
        assert_eq!(encoded.source_id, 7);
        assert_eq!((encoded.width, encoded.height), (2, 1));
        assert!(encoded.data_uri().starts_with("data:image/png;base64,"));

        let decoded = ImageHandler::decode_raster(raw(encoded.bytes), &config).expect("decode back");
        assert_eq!(decoded, raster);
    }

    #[test]
    fn jpeg_encoding_drops_alpha_but_keeps_dimensions() {
        let mut config = ImageConfig::default();
        config.output_format = OutputFormat::Jpeg;
        let raster = DecodedRaster::new(8, 4, vec![120; 8 * 4 * 4]).unwrap();

        let encoded = ImageHandler::encode_raster(&raster, 1, &config).expect("jpeg encode");
        assert!(encoded.data_uri().starts_with("data:image/jpeg;base64,"));

        let decoded = ImageHandler::decode_raster(raw(encoded.bytes), &config).expect("decode back");
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.pixel(0, 0).map(|p| p[3]), Some(255));
    }
}
