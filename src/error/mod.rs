//! 统一错误处理模块
//!
//! 按关注点拆分的结构化错误类型，全部通过 thiserror 派生。

mod app;
mod audio;
mod loop_player;

pub use app::{AppError, SettingsError};
pub use audio::AudioError;
pub use loop_player::LoopError;
