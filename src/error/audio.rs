//! 音频播放相关错误

use std::path::PathBuf;

/// 音频播放错误类型
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// 打开音频文件失败
    #[error("打开音频文件失败({}): {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 解码音频失败
    #[error("解码音频失败({}): {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    /// 解码器无法给出总时长
    #[error("无法获取音频时长: {0}")]
    UnknownDuration(PathBuf),

    /// 音频输出流创建失败
    #[error("创建音频输出流失败: {0}")]
    OutputStream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::OutputStream("无法初始化音频设备".to_string());
        assert_eq!(err.to_string(), "创建音频输出流失败: 无法初始化音频设备");
    }

    #[test]
    fn test_open_file_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件未找到");
        let err = AudioError::OpenFile {
            path: PathBuf::from("/tmp/rain.mp3"),
            source: io_err,
        };
        assert!(err.to_string().contains("rain.mp3"));
        assert!(err.to_string().contains("文件未找到"));

        use std::error::Error;
        assert!(err.source().is_some());
    }
}
