//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做入参解析与结果返回，不承载业务逻辑。
//! 所有实际处理交由 `ImageServiceState`，保持命令函数薄、稳定、易测试。
//! 变换类命令返回结构化的 `ImageCommandError`，便于 CLI 以 JSON 输出错误。

use serde::Serialize;

use super::{
    EncodedImage, ImageConfig, ImageError, ImageLimitsConfig, ImageRef, ImageServiceState,
    ImageSource, PixelOperation,
};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct ImageCommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<ImageError> for ImageCommandError {
    fn from(error: ImageError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ImageCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ImageCommandError {}

/// 选择本地图片文件。
pub fn select_image_file(
    state: &ImageServiceState,
    path: String,
) -> Result<ImageRef, ImageCommandError> {
    Ok(state.select_source(ImageSource::FilePath(path))?)
}

/// 选择 Data URI 或纯 Base64 图片。
pub fn select_image_data(
    state: &ImageServiceState,
    data: String,
) -> Result<ImageRef, ImageCommandError> {
    let source = if data.trim_start().starts_with("data:") {
        ImageSource::DataUri(data)
    } else {
        ImageSource::Base64(data)
    };
    Ok(state.select_source(source)?)
}

/// 对当前选择执行一组像素操作（按字符串解析）。
pub async fn manipulate_image(
    state: &ImageServiceState,
    operations: &[String],
) -> Result<EncodedImage, ImageCommandError> {
    let parsed = operations
        .iter()
        .map(|op| PixelOperation::from_str(op))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(state.manipulate(&parsed).await?)
}

/// 反色当前选择（默认操作）。
pub async fn invert_image(state: &ImageServiceState) -> Result<EncodedImage, ImageCommandError> {
    Ok(state.manipulate(&[PixelOperation::Invert]).await?)
}

/// 切换输出格式。
pub fn set_output_format(state: &ImageServiceState, format: String) -> Result<(), AppError> {
    state.set_output_format(&format)?;
    Ok(())
}

pub fn get_image_config(state: &ImageServiceState) -> Result<ImageConfig, AppError> {
    Ok(state.get_config()?)
}

pub fn set_image_limits(
    state: &ImageServiceState,
    limits: ImageLimitsConfig,
) -> Result<(), AppError> {
    state.set_limits(limits)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manipulate_rejects_unknown_operation_before_loading() {
        let state = ImageServiceState::new();

        let err = manipulate_image(&state, &["sharpen".to_string()])
            .await
            .expect_err("unknown op must fail");

        assert_eq!(err.code, "E_INVALID_OPERATION");
        assert_eq!(err.stage, "transform");
        assert!(state.snapshot().unwrap().result.is_none());
    }

    #[tokio::test]
    async fn bad_scale_size_is_a_transform_stage_error() {
        let state = ImageServiceState::new();

        let err = manipulate_image(&state, &["scale:0x10".to_string()])
            .await
            .expect_err("zero-sized scale must fail");

        assert_eq!(err.code, "E_INVALID_OPERATION");
        assert_eq!(err.stage, "transform");
    }

    #[test]
    fn config_commands_update_and_validate() {
        let state = ImageServiceState::new();

        set_output_format(&state, "jpg".to_string()).unwrap();
        assert!(matches!(
            set_output_format(&state, "tiff".to_string()),
            Err(AppError::Image(ImageError::InvalidFormat(_)))
        ));

        let mut limits = ImageLimitsConfig::from(&get_image_config(&state).unwrap());
        limits.load_timeout_ms = 0;
        assert!(set_image_limits(&state, limits.clone()).is_err());

        limits.load_timeout_ms = 2_000;
        set_image_limits(&state, limits).unwrap();

        let config = get_image_config(&state).unwrap();
        assert_eq!(config.output_format, crate::image_handler::OutputFormat::Jpeg);
        assert_eq!(config.load_timeout_ms, 2_000);
    }

    #[tokio::test]
    async fn invert_without_selection_reports_no_source() {
        let state = ImageServiceState::new();

        let err = invert_image(&state).await.expect_err("no source selected");

        assert_eq!(err.code, "E_NO_SOURCE");
        assert_eq!(err.stage, "select");
        assert!(state.snapshot().unwrap().result.is_none());
    }

    #[test]
    fn select_image_data_detects_data_uri() {
        let state = ImageServiceState::new();

        let selected = select_image_data(&state, "data:image/png;base64,AAAA".into()).unwrap();
        assert!(matches!(selected.source, ImageSource::DataUri(_)));

        let selected = select_image_data(&state, "AAAA".into()).unwrap();
        assert!(matches!(selected.source, ImageSource::Base64(_)));
    }

    #[test]
    fn command_error_serializes_code_stage_and_message() {
        let err = ImageCommandError::from(ImageError::Timeout("图片加载超时（100ms）".into()));

        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "E_TIMEOUT");
        assert_eq!(json["stage"], "load");
        assert!(json["message"].as_str().unwrap().contains("100ms"));
    }
}
