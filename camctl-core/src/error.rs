use crate::settings::{DevicePosition, MediaType};
use thiserror::Error;

/// 控制器对外暴露的全部错误种类
///
/// 需要 `Clone`：同一个错误既可能交给 completion，也可能同时推给 delegate 的
/// `session_did_error`。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// 相机/麦克风权限未授予
    #[error("Not authorized to capture {0}")]
    Unauthorized(MediaType),

    /// 请求的位置没有对应硬件 (只会在构造阶段出现)
    #[error("No capture device available for position {0}")]
    NoDeviceAvailable(DevicePosition),

    #[error("Capture session is not running")]
    SessionNotRunning,

    #[error("Device busy: a capture or recording is already in progress")]
    DeviceBusy,

    /// 底层硬件返回的错误
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// 写入相册失败
    #[error("Failed to persist asset: {0}")]
    PersistFailed(String),

    /// Input/Output 接线或设备锁定配置失败
    #[error("Session configuration failed: {0}")]
    Configuration(String),
}

impl CameraError {
    /// 把硬件拍照路径上的错误收敛到拍照结果允许的种类，其余一律视为 CaptureFailed
    pub fn into_capture(self) -> Self {
        match self {
            Self::Unauthorized(_)
            | Self::SessionNotRunning
            | Self::DeviceBusy
            | Self::CaptureFailed(_) => self,
            other => Self::CaptureFailed(other.to_string()),
        }
    }

    /// 把任意错误收敛成持久化错误，已经是 PersistFailed 的保持原样
    pub fn into_persist(self) -> Self {
        match self {
            Self::PersistFailed(_) => self,
            other => Self::PersistFailed(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(e: std::io::Error) -> Self {
        Self::CaptureFailed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_position() {
        let err = CameraError::NoDeviceAvailable(DevicePosition::Front);
        assert_eq!(err.to_string(), "No capture device available for position front");
    }

    #[test]
    fn into_persist_wraps_foreign_errors_once() {
        let wrapped = CameraError::CaptureFailed("disk".into()).into_persist();
        assert_eq!(wrapped, CameraError::PersistFailed("Capture failed: disk".into()));

        let kept = CameraError::PersistFailed("full".into()).into_persist();
        assert_eq!(kept, CameraError::PersistFailed("full".into()));
    }

    #[test]
    fn into_capture_keeps_capture_kinds() {
        for kept in [
            CameraError::Unauthorized(MediaType::Video),
            CameraError::SessionNotRunning,
            CameraError::DeviceBusy,
            CameraError::CaptureFailed("lens".into()),
        ] {
            assert_eq!(kept.clone().into_capture(), kept);
        }

        let wrapped =
            CameraError::Configuration("Still output is not installed".into()).into_capture();
        assert_eq!(
            wrapped,
            CameraError::CaptureFailed(
                "Session configuration failed: Still output is not installed".into()
            )
        );
    }
}
