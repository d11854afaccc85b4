//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载“选择 → 加载 → 解码 → 变换 → 编码 → 提交”链路中的所有错误来源，
//! 避免字符串拼接式错误处理。通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! `code()` / `stage()` 给命令层与 CLI 的 JSON 输出提供稳定的机器可读字段。

/// 图片处理统一错误类型。
///
/// 该类型会在命令层被转换为 `ImageCommandError` 或上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("尚未选择图片")]
    NoSource,

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    /// 像素操作无法解析或参数无效。
    #[error("操作错误：{0}")]
    InvalidOperation(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("状态错误：{0}")]
    State(String),

    /// 请求完成时已有更新的选择或请求，结果被丢弃。
    #[error("结果已过期：{0}")]
    Superseded(String),
}

impl ImageError {
    /// 稳定错误码，供前端/脚本匹配。
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSource => "E_NO_SOURCE",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::InvalidOperation(_) => "E_INVALID_OPERATION",
            Self::Encode(_) => "E_ENCODE",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::State(_) => "E_STATE",
            Self::Superseded(_) => "E_SUPERSEDED",
        }
    }

    /// 出错所在的处理阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NoSource => "select",
            Self::FileSystem(_) | Self::Timeout(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::InvalidOperation(_) => "transform",
            Self::Encode(_) => "encode",
            Self::State(_) | Self::Superseded(_) => "commit",
        }
    }
}
