//! 视频会话控制器
//!
//! 在相机控制器之上增加录像 Output、可选的缩略图 Output 和录像状态机。

use crate::completion::Completion;
use crate::controller::{CameraController, ControllerOptions};
use crate::imgcodecs::StillImage;
use camctl_core::builder::ControllerConfig;
use camctl_core::settings::{DevicePosition, SessionPreset};
use camctl_core::traits::Driver;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

/// 一次录像请求的两个结果
#[derive(Debug)]
pub struct MovieCapture {
    /// 未开启缩略图时为 None
    pub thumbnail: Option<Completion<StillImage>>,
    /// finalize 完成后交付文件路径
    pub movie: Completion<PathBuf>,
}

/// 视频控制器，基础操作通过 `Deref` 使用 [`CameraController`]
#[derive(Debug)]
pub struct VideoController {
    inner: CameraController,
}

impl VideoController {
    pub fn new(
        driver: Arc<dyn Driver>,
        position: DevicePosition,
        thumbnail_capture_enabled: bool,
        subject_area_change_monitoring_enabled: bool,
    ) -> Self {
        let config = ControllerConfig::new()
            .position(position)
            .preset(SessionPreset::High)
            .thumbnail_capture(thumbnail_capture_enabled)
            .subject_area_change_monitoring(subject_area_change_monitoring_enabled);
        Self::with_options(driver, config, ControllerOptions::default())
    }

    /// 完整配置；preset 以 config 为准
    pub fn with_options(
        driver: Arc<dyn Driver>,
        config: ControllerConfig,
        options: ControllerOptions,
    ) -> Self {
        Self {
            inner: CameraController::build(driver, config, options, true),
        }
    }

    pub fn thumbnail_capture_enabled(&self) -> bool {
        self.inner.config().thumbnail_capture_enabled
    }

    /// Starting / Recording / Stopping 都算正在录像
    pub fn is_recording(&self) -> bool {
        self.inner.state().recording.is_recording()
    }

    /// 开始录像；开启缩略图时先抓一张缩略图
    ///
    /// 已经在录像时两个结果都是 `DeviceBusy`，进行中的录像不受影响。
    pub fn capture_with_thumbnail(&self) -> MovieCapture {
        let (thumbnail, movie) = self
            .inner
            .start_recording(self.thumbnail_capture_enabled());
        MovieCapture { thumbnail, movie }
    }

    /// 请求结束录像，文件在 `MovieCapture::movie` 上交付
    pub fn stop_recording(&self) -> Completion<()> {
        self.inner.stop_recording()
    }
}

impl Deref for VideoController {
    type Target = CameraController;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
