//! 应用通用错误

use super::AudioError;

/// 应用通用错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 设置错误
    #[error("设置错误: {0}")]
    Settings(#[from] SettingsError),

    /// 音频错误
    #[error("音频错误: {0}")]
    Audio(#[from] AudioError),
}

/// 设置相关错误
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// 保存设置失败
    #[error("保存设置失败: {source}")]
    Save {
        #[source]
        source: std::io::Error,
    },

    /// 序列化设置失败
    #[error("序列化设置失败: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    /// 设置值无效
    #[error("设置值无效: {0}")]
    InvalidValue(String),
}
