use crate::settings::{DevicePosition, ExposureMode, FocusMode, SessionPreset, WhiteBalanceMode};
use std::path::PathBuf;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// 控制器的构造参数
///
/// 所有字段在构造后都不可变 (位置和闪光灯只是初始值)。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ControllerConfig {
    /// 初始镜头位置，默认后置
    pub position: DevicePosition,
    /// 循环闪光灯时是否包含 Auto
    pub auto_flash_enabled: bool,
    /// 是否监听画面主体区域变化
    pub subject_area_change_monitoring: bool,
    pub preset: SessionPreset,
    /// 是否安装静态照片 Output
    pub stills_enabled: bool,
    /// 录像开始时先抓一张缩略图 (仅视频控制器)
    pub thumbnail_capture_enabled: bool,
    /// 录像文件目录，None 时使用系统临时目录
    pub movie_directory: Option<PathBuf>,
    /// 写入相册时的 JPEG 质量 (1-100)
    pub jpeg_quality: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self {
            position: DevicePosition::Back,
            auto_flash_enabled: false,
            subject_area_change_monitoring: false,
            preset: SessionPreset::Photo,
            stills_enabled: true,
            thumbnail_capture_enabled: false,
            movie_directory: None,
            jpeg_quality: 90,
        }
    }

    pub fn position(mut self, position: DevicePosition) -> Self {
        self.position = position;
        self
    }

    pub fn auto_flash(mut self, enabled: bool) -> Self {
        self.auto_flash_enabled = enabled;
        self
    }

    pub fn subject_area_change_monitoring(mut self, enabled: bool) -> Self {
        self.subject_area_change_monitoring = enabled;
        self
    }

    pub fn preset(mut self, preset: SessionPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn stills(mut self, enabled: bool) -> Self {
        self.stills_enabled = enabled;
        self
    }

    pub fn thumbnail_capture(mut self, enabled: bool) -> Self {
        self.thumbnail_capture_enabled = enabled;
        self
    }

    pub fn movie_directory<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.movie_directory = Some(dir.into());
        self
    }

    /// 超出 1-100 的值会被截断
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// 导出配置快照 (用于持久化)
    #[cfg(feature = "serialize")]
    pub fn export(&self) -> crate::error::Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| crate::error::CameraError::Configuration(e.to_string()))
    }

    #[cfg(feature = "serialize")]
    pub fn import(value: serde_json::Value) -> crate::error::Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| crate::error::CameraError::Configuration(e.to_string()))
    }
}

/// 自动调整时要应用的三种模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct AdjustmentModes {
    pub exposure: ExposureMode,
    pub focus: FocusMode,
    pub white_balance: WhiteBalanceMode,
}

impl AdjustmentModes {
    pub fn new(exposure: ExposureMode, focus: FocusMode, white_balance: WhiteBalanceMode) -> Self {
        Self {
            exposure,
            focus,
            white_balance,
        }
    }
}
