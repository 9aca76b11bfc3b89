//! 循环播放器构建相关错误

use std::time::Duration;

use super::AudioError;

/// 构建交叉淡入淡出播放器时的错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoopError {
    /// 音源时长不超过淡入淡出时长，无法交替循环
    #[error("音源时长过短: duration={duration:?}, fade={fade:?}")]
    DurationTooShort { duration: Duration, fade: Duration },

    /// 能解码但无法得知总时长（例如没有 Xing/Info 头的 MP3）
    #[error("无法获取音源时长({title})")]
    UnknownDuration { title: String },

    /// 没有可用的音源文件
    #[error("找不到可播放的音源({title})")]
    SourceMissing { title: String },

    /// 底层播放器创建失败
    #[error("创建播放器失败({title}): {reason}")]
    SourceConstructionFailed { title: String, reason: String },
}

impl LoopError {
    /// 可以用无淡入淡出的循环播放器降级替代
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LoopError::DurationTooShort { .. }
                | LoopError::UnknownDuration { .. }
                | LoopError::SourceMissing { .. }
        )
    }

    pub(crate) fn construction(title: &str, err: AudioError) -> Self {
        match err {
            AudioError::UnknownDuration(_) => LoopError::UnknownDuration {
                title: title.to_owned(),
            },
            err => LoopError::SourceConstructionFailed {
                title: title.to_owned(),
                reason: err.to_string(),
            },
        }
    }
}
