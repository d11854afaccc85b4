//! # 图片反色工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    CLI (clap)                            │
//! │                                                          │
//! │  CliArgs ── settings (JSON) ── CliReport / --json        │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            image_handler                         │
//! │                                                          │
//! │  commands ── ImageServiceState ── ImageState (票据提交)   │
//! │                     │                                    │
//! │               ImageHandler                               │
//! │   loader (文件/Data URI/Base64) → pipeline (解码/编码)   │
//! │                     └─ transform (反色 + 其余像素操作)   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 与配置类命令的返回类型 |
//! | [`image_handler`] | 图片选择、加载、解码、反色等像素操作、编码为 Data URI |
//! | [`settings`] | JSON 设置文件的读取与写出 |
//! | [`cli`] | 命令行参数解析、执行与结果输出 |

pub mod cli;
pub mod error;
pub mod image_handler;
pub mod settings;
