//! # 图片处理模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“图片选择 → 加载校验 → 解码 → 像素变换 → 编码导出 → 结果提交”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `commands`：仅做入参/出参适配（薄封装）
//! - `service`：承载可注入状态（`ImageServiceState`）
//! - `state`：会话状态记录与纯函数状态迁移（票据 / generation）
//! - `handler`：编排两阶段流水线（load → transform_and_encode）
//! - `loader`：负责文件 / Data URI / Base64 / 内存字节加载与安全校验
//! - `pipeline`：负责解码、像素限制、编码
//! - `transform`：反色及其余像素操作
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! CLI / 调用方
//!    ↓
//! commands.rs（参数适配）
//!    ↓
//! service.rs（签发票据 → 调用 handler → 提交结果）
//!    ├─ state.rs（on_select / begin_transform / on_transform）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + 体积/签名校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + 编码）
//!    └─ transform.rs（反色 / 灰度 / 旋转 / 缩放 / 降噪 / 均衡）
//!    ↓
//! 返回 EncodedImage（Data URI）或 ImageError
//! ```

pub mod commands;
mod config;
mod error;
mod handler;
mod loader;
mod pipeline;
mod service;
mod source;
mod state;
mod transform;

pub use commands::ImageCommandError;
pub use config::{ImageConfig, ImageLimitsConfig, OutputFormat};
pub use error::ImageError;
pub use handler::ImageHandler;
pub use service::ImageServiceState;
pub use source::{DecodedRaster, EncodedImage, ImageRef, ImageSource};
pub use state::{ImageState, TransformTicket};
pub use transform::{PixelOperation, Rotation, invert, invert_rgba_in_place};
