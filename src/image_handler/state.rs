//! # 会话状态
//!
//! ## 设计思路
//!
//! 用一个显式的状态记录 `{ source, result }` 取代分散的可变字段，
//! 所有状态变更都是纯函数：输入旧状态，返回新状态。
//!
//! ## 实现思路
//!
//! - 每次选择、每次发起变换都会递增 `generation`。
//! - 发起变换时签发 `TransformTicket`，记录当时的 generation 与源引用。
//! - 变换完成后仅当票据仍是“最新请求”且源引用未变时才提交结果，
//!   过期结果直接丢弃，不会覆盖更新的选择或更新的请求。
//! - 重新选择不清空已有结果（与原页面行为一致：旧结果继续展示，直到新的变换提交）。

use super::{EncodedImage, ImageRef, ImageSource};

/// 会话状态记录。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageState {
    /// 当前选择的源图片。
    pub source: Option<ImageRef>,
    /// 最近一次成功提交的结果。
    pub result: Option<EncodedImage>,
    generation: u64,
}

/// 一次变换请求的票据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformTicket {
    pub generation: u64,
    pub source: ImageRef,
}

impl ImageState {
    /// 选择新图片：最新选择覆盖旧选择，并使在途请求失效。
    pub fn on_select(self, source: ImageSource) -> Self {
        let generation = self.generation + 1;
        Self {
            source: Some(ImageRef {
                id: generation,
                source,
            }),
            result: self.result,
            generation,
        }
    }

    /// 发起变换：无源图片时返回 `None`（不产生任何结果）。
    pub fn begin_transform(self) -> (Self, Option<TransformTicket>) {
        let Some(source) = self.source.clone() else {
            return (self, None);
        };

        let generation = self.generation + 1;
        let ticket = TransformTicket { generation, source };
        (Self { generation, ..self }, Some(ticket))
    }

    /// 提交变换结果；票据过期时状态不变并返回 `false`。
    pub fn on_transform(self, ticket: &TransformTicket, result: EncodedImage) -> (Self, bool) {
        let source_matches = self
            .source
            .as_ref()
            .is_some_and(|current| current.id == ticket.source.id);

        if ticket.generation != self.generation || !source_matches || result.source_id != ticket.source.id {
            return (self, false);
        }

        (
            Self {
                result: Some(result),
                ..self
            },
            true,
        )
    }
}
