//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageHandler` 只负责流程编排与配置管理，不持有会话状态。
//! 处理链路拆成两个阶段，各自只有一个完成点：
//! 1. `load`：读取配置快照 → 按来源加载原始字节 → 完整解码为 RGBA 栅格
//! 2. `transform_and_encode`：依次执行像素操作 → 编码为结果图片
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<ImageConfig>>` 支持运行时调整。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 加载与解码、变换与编码都放到阻塞线程池，避免阻塞 async 运行时。
//! - 加载阶段受 `load_timeout_ms` 约束，解码失败直接返回错误而不是无限等待。
//! - 记录 `load/transform/encode/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::{
    DecodedRaster, EncodedImage, ImageConfig, ImageError, ImageLimitsConfig, ImageSource,
    OutputFormat, PixelOperation,
};

/// 图片处理器。
///
/// 封装了配置状态，并编排各子模块实现完整流程。
pub struct ImageHandler {
    pub(super) config: Arc<RwLock<ImageConfig>>,
}

impl ImageHandler {
    /// 根据初始配置创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use image_manipulation::image_handler::{ImageConfig, ImageHandler};
    ///
    /// let handler = ImageHandler::new(ImageConfig::default());
    /// assert_eq!(handler.config_snapshot()?.output_format.as_str(), "png");
    /// # Ok::<(), image_manipulation::image_handler::ImageError>(())
    /// ```
    pub fn new(config: ImageConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<ImageConfig, ImageError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ImageError::State("配置读取锁已中毒".to_string()))
    }

    /// 切换结果编码格式。
    pub fn set_output_format(&self, format: OutputFormat) -> Result<(), ImageError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ImageError::State("配置写入锁已中毒".to_string()))?;
        config.output_format = format;

        log::info!("⚙️ 已切换输出格式：{}", format.as_str());
        Ok(())
    }

    /// 设置资源上限，先做范围校验。
    pub fn set_limits(&self, limits: ImageLimitsConfig) -> Result<(), ImageError> {
        limits.validate()?;

        let mut config = self
            .config
            .write()
            .map_err(|_| ImageError::State("配置写入锁已中毒".to_string()))?;

        config.max_file_size = limits.max_file_size;
        config.max_decoded_pixels = limits.max_decoded_pixels;
        config.max_decoded_bytes = limits.max_decoded_bytes;
        config.load_timeout_ms = limits.load_timeout_ms;

        log::info!(
            "⚙️ 已更新资源上限：max_file_size={} max_pixels={} max_bytes={} timeout={}ms",
            limits.max_file_size,
            limits.max_decoded_pixels,
            limits.max_decoded_bytes,
            limits.load_timeout_ms
        );

        Ok(())
    }

    /// 第一阶段：加载并完整解码。
    ///
    /// 挂起直到解码完成、失败或超时。
    pub async fn load(&self, source: ImageSource) -> Result<DecodedRaster, ImageError> {
        let config = self.config_snapshot()?;
        let timeout = Duration::from_millis(config.load_timeout_ms);
        let hint = source.hint();
        let load_start = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            let raw = Self::load_raw(&source, &config)?;
            Self::decode_raster(raw, &config)
        });

        let raster = match tokio::time::timeout(timeout, task).await {
            Err(_) => {
                return Err(ImageError::Timeout(format!(
                    "图片加载超时（{}ms）",
                    timeout.as_millis()
                )));
            }
            Ok(Err(join_err)) => {
                return Err(ImageError::Decode(format!("解码任务异常退出：{}", join_err)));
            }
            Ok(Ok(result)) => result?,
        };

        log::info!(
            "✅ 图片加载完成 - 来源: {} 尺寸: {}x{} load={}ms",
            hint,
            raster.width(),
            raster.height(),
            load_start.elapsed().as_millis()
        );

        Ok(raster)
    }

    /// 第二阶段：依次执行像素操作并编码。
    pub async fn transform_and_encode(
        &self,
        raster: DecodedRaster,
        operations: Vec<PixelOperation>,
        source_id: u64,
    ) -> Result<EncodedImage, ImageError> {
        let config = self.config_snapshot()?;

        tokio::task::spawn_blocking(move || {
            Self::transform_and_encode_blocking(&raster, &operations, source_id, &config)
        })
        .await
        .map_err(|e| ImageError::Encode(format!("变换任务异常退出：{}", e)))?
    }

    /// 同步执行像素操作（不编码）。
    ///
    /// 空操作列表返回输入的副本。
    pub fn apply_operations(
        raster: &DecodedRaster,
        operations: &[PixelOperation],
    ) -> Result<DecodedRaster, ImageError> {
        let mut current = raster.clone();
        for operation in operations {
            current = operation.apply(&current)?;
        }
        Ok(current)
    }

    fn transform_and_encode_blocking(
        raster: &DecodedRaster,
        operations: &[PixelOperation],
        source_id: u64,
        config: &ImageConfig,
    ) -> Result<EncodedImage, ImageError> {
        let total_start = Instant::now();

        let transform_start = Instant::now();
        let transformed = Self::apply_operations(raster, operations)?;
        let transform_elapsed = transform_start.elapsed();

        let encode_start = Instant::now();
        let encoded = Self::encode_raster(&transformed, source_id, config)?;
        let encode_elapsed = encode_start.elapsed();

        let labels: Vec<String> = operations.iter().map(PixelOperation::label).collect();
        log::info!(
            "✅ 图片处理完成 - ops=[{}] 输出: {}x{} {} transform={}ms encode={}ms total={}ms",
            labels.join(","),
            encoded.width,
            encoded.height,
            encoded.format.as_str(),
            transform_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[tokio::test]
    async fn load_then_invert_round_trip_through_data_uri() {
        let handler = ImageHandler::new(ImageConfig::default());
        let data_uri = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(create_png_bytes(4, 3))
        );

        let raster = handler
            .load(ImageSource::DataUri(data_uri))
            .await
            .expect("load should succeed");
        let encoded = handler
            .transform_and_encode(raster.clone(), vec![PixelOperation::Invert], 1)
            .await
            .expect("transform should succeed");

        assert_eq!((encoded.width, encoded.height), (4, 3));

        let result = handler
            .load(ImageSource::DataUri(encoded.data_uri()))
            .await
            .expect("result should decode");
        assert_eq!(result.pixel(2, 1), Some([253, 254, 252, 255]));
        assert_eq!(raster.pixel(2, 1), Some([2, 1, 3, 255]));
    }

    #[tokio::test]
    async fn load_surfaces_decode_failure() {
        let handler = ImageHandler::new(ImageConfig::default());
        let mut bytes = create_png_bytes(16, 16);
        bytes.truncate(bytes.len() / 2);

        let result = handler.load(ImageSource::Bytes(bytes)).await;

        assert!(matches!(
            result,
            Err(ImageError::Decode(_)) | Err(ImageError::InvalidFormat(_))
        ));
    }

    #[test]
    fn apply_operations_chains_in_order() {
        let raster = DecodedRaster::new(2, 1, vec![10, 20, 30, 255, 0, 255, 128, 0]).unwrap();

        let chained = ImageHandler::apply_operations(
            &raster,
            &[
                PixelOperation::Invert,
                PixelOperation::Rotate(crate::image_handler::Rotation::Deg90),
            ],
        )
        .unwrap();

        assert_eq!(chained.dimensions(), (1, 2));
        assert_eq!(chained.pixel(0, 0), Some([245, 235, 225, 255]));
        assert_eq!(chained.pixel(0, 1), Some([255, 0, 127, 0]));

        let untouched = ImageHandler::apply_operations(&raster, &[]).unwrap();
        assert_eq!(untouched, raster);
    }

    #[test]
    fn limits_reject_invalid_values_and_accept_valid_ones() {
        let handler = ImageHandler::new(ImageConfig::default());

        let mut limits = ImageLimitsConfig::from(&handler.config_snapshot().unwrap());
        limits.max_decoded_pixels = 0;
        assert!(matches!(handler.set_limits(limits), Err(ImageError::InvalidFormat(_))));

        let limits = ImageLimitsConfig {
            max_file_size: 4 * 1024 * 1024,
            max_decoded_pixels: 1_000_000,
            max_decoded_bytes: 4_000_000,
            load_timeout_ms: 2_000,
        };
        handler.set_limits(limits.clone()).expect("valid limits");
        assert_eq!(ImageLimitsConfig::from(&handler.config_snapshot().unwrap()), limits);
    }

    #[test]
    fn output_format_switch_is_visible_in_snapshot() {
        let handler = ImageHandler::new(ImageConfig::default());

        handler.set_output_format(OutputFormat::Webp).unwrap();

        assert_eq!(handler.config_snapshot().unwrap().output_format, OutputFormat::Webp);
    }
}
