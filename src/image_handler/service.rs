//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `ImageServiceState` 作为调用方持有的状态对象，替代全局单例。
//! 好处：
//! 1. 生命周期清晰（由 `main.rs` / 调用方统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 后续可扩展多会话
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `select_source`：选择图片（最新选择覆盖旧选择）
//! - `manipulate`：签发票据 → 加载解码 → 变换编码 → 仅在票据仍最新时提交
//! - `snapshot`：读取当前状态
//! - 输出格式 / 资源上限的读写
//!
//! 状态锁只在签发票据与提交结果时短暂持有，耗时阶段不持锁。

use std::sync::Mutex;

use super::{
    EncodedImage, ImageConfig, ImageError, ImageHandler, ImageLimitsConfig, ImageRef,
    ImageSource, ImageState, OutputFormat, PixelOperation,
};

/// 图片处理服务状态。
pub struct ImageServiceState {
    handler: ImageHandler,
    state: Mutex<ImageState>,
}

impl ImageServiceState {
    /// 使用默认配置创建服务状态。
    pub fn new() -> Self {
        Self::with_config(ImageConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    ///
    /// # 示例
    /// ```rust
    /// use image_manipulation::image_handler::{ImageConfig, ImageServiceState, OutputFormat};
    ///
    /// let mut config = ImageConfig::default();
    /// config.output_format = OutputFormat::Jpeg;
    /// let service = ImageServiceState::with_config(config);
    /// assert_eq!(service.get_config()?.output_format, OutputFormat::Jpeg);
    /// # Ok::<(), image_manipulation::image_handler::ImageError>(())
    /// ```
    pub fn with_config(config: ImageConfig) -> Self {
        Self {
            handler: ImageHandler::new(config),
            state: Mutex::new(ImageState::default()),
        }
    }

    /// 选择图片，返回新的源引用。
    ///
    /// 选择本身不加载图片，加载发生在 `manipulate` 中。
    pub fn select_source(&self, source: ImageSource) -> Result<ImageRef, ImageError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| ImageError::State("会话状态锁已中毒".to_string()))?;

        log::info!("🖼️ 选择图片 - {}", source.hint());
        let next = std::mem::take(&mut *guard).on_select(source);
        let selected = next
            .source
            .clone()
            .ok_or_else(|| ImageError::State("选择后源引用缺失".to_string()))?;
        *guard = next;

        Ok(selected)
    }

    /// 对当前选择执行像素操作，并在仍为最新请求时提交结果。
    ///
    /// - 未选择图片：返回 `NoSource`，结果保持不变。
    /// - 处理期间有更新的选择或请求：返回 `Superseded`，结果保持不变。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_manipulation::image_handler::{ImageServiceState, ImageSource, PixelOperation};
    ///
    /// # async fn demo() -> Result<(), image_manipulation::image_handler::ImageError> {
    /// let service = ImageServiceState::new();
    /// service.select_source(ImageSource::FilePath("photo.png".into()))?;
    /// let result = service.manipulate(&[PixelOperation::Invert]).await?;
    /// println!("{}", result.data_uri());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn manipulate(
        &self,
        operations: &[PixelOperation],
    ) -> Result<EncodedImage, ImageError> {
        let ticket = {
            let mut guard = self
                .state
                .lock()
                .map_err(|_| ImageError::State("会话状态锁已中毒".to_string()))?;
            let (next, ticket) = std::mem::take(&mut *guard).begin_transform();
            *guard = next;
            ticket
        };

        let Some(ticket) = ticket else {
            log::debug!("🚫 未选择图片，忽略本次变换请求");
            return Err(ImageError::NoSource);
        };

        let raster = self.handler.load(ticket.source.source.clone()).await?;
        let encoded = self
            .handler
            .transform_and_encode(raster, operations.to_vec(), ticket.source.id)
            .await?;

        let mut guard = self
            .state
            .lock()
            .map_err(|_| ImageError::State("会话状态锁已中毒".to_string()))?;
        let (next, committed) = std::mem::take(&mut *guard).on_transform(&ticket, encoded.clone());
        *guard = next;

        if !committed {
            log::debug!(
                "♻️ 丢弃过期结果 - generation={} source_id={}",
                ticket.generation,
                ticket.source.id
            );
            return Err(ImageError::Superseded(format!(
                "请求 {} 完成时已有更新的选择或请求",
                ticket.generation
            )));
        }

        Ok(encoded)
    }

    /// 当前状态快照。
    pub fn snapshot(&self) -> Result<ImageState, ImageError> {
        self.state
            .lock()
            .map(|state| state.clone())
            .map_err(|_| ImageError::State("会话状态锁已中毒".to_string()))
    }

    pub fn get_config(&self) -> Result<ImageConfig, ImageError> {
        self.handler.config_snapshot()
    }

    pub fn set_output_format(&self, format: &str) -> Result<(), ImageError> {
        let format = OutputFormat::from_str(format)?;
        self.handler.set_output_format(format)
    }

    pub fn set_limits(&self, limits: ImageLimitsConfig) -> Result<(), ImageError> {
        self.handler.set_limits(limits)
    }
}

impl Default for ImageServiceState {
    fn default() -> Self {
        Self::new()
    }
}
