//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! 配置类命令与 CLI 入口统一返回 `Result<T, AppError>`，
//! `--json` 输出时通过 `Serialize` 获得字符串形式的错误信息。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError` / `ImageCommandError` / `io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串。

use serde::Serialize;

use crate::image_handler::{ImageCommandError, ImageError};

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片处理流水线错误（加载 / 解码 / 变换 / 编码）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 命令层返回的结构化图片错误
    #[error("{0}")]
    Command(#[from] ImageCommandError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件读取或解析失败
    #[error("设置错误: {0}")]
    Settings(String),

    /// 输出写入失败或参数组合不合法
    #[error("输出错误: {0}")]
    Output(String),
}

impl AppError {
    /// 稳定错误码（图片类错误沿用图片错误码）。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Image(err) => err.code(),
            Self::Command(err) => err.code,
            Self::Io(_) => "E_IO",
            Self::Settings(_) => "E_SETTINGS",
            Self::Output(_) => "E_OUTPUT",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
