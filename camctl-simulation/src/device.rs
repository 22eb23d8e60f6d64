use crate::Shared;
use camctl_core::error::{CameraError, Result};
use camctl_core::geometry::Point;
use camctl_core::settings::{Capabilities, ExposureMode, FlashMode, FocusMode, WhiteBalanceMode};
use camctl_core::traits::{CaptureDevice, DeviceInfo};
use std::sync::Arc;

/// 模拟镜头
///
/// 与真实硬件一致：不支持的模式直接报错，所以控制器必须先查能力再下发。
pub(crate) struct SimDevice {
    info: DeviceInfo,
    capabilities: Capabilities,
    shared: Arc<Shared>,
}

impl SimDevice {
    pub(crate) fn new(info: DeviceInfo, capabilities: Capabilities, shared: Arc<Shared>) -> Self {
        Self {
            info,
            capabilities,
            shared,
        }
    }

    /// 模拟 lockForConfiguration
    fn lock_for_configuration(&self) -> Result<()> {
        match self.shared.lock().lock_failure.take() {
            Some(err) => {
                tracing::warn!("{}: lockForConfiguration failed: {}", self.info.name, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn require(&self, needed: Capabilities, what: &str) -> Result<()> {
        if self.capabilities.contains(needed) {
            Ok(())
        } else {
            Err(CameraError::Configuration(format!(
                "{} does not support {}",
                self.info.name, what
            )))
        }
    }
}

impl CaptureDevice for SimDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn set_flash_mode(&mut self, mode: FlashMode) -> Result<()> {
        self.require(mode.capability(), "this flash mode")?;
        self.lock_for_configuration()?;
        self.shared.lock().log.flash_modes.push(mode);
        Ok(())
    }

    fn set_focus(&mut self, mode: FocusMode, point: Option<Point>) -> Result<()> {
        self.require(mode.capability(), "this focus mode")?;
        if point.is_some() {
            self.require(Capabilities::FOCUS_POINT_OF_INTEREST, "a focus point of interest")?;
        }
        self.lock_for_configuration()?;
        self.shared.lock().log.focus.push((mode, point));
        Ok(())
    }

    fn set_exposure(&mut self, mode: ExposureMode, point: Option<Point>) -> Result<()> {
        self.require(mode.capability(), "this exposure mode")?;
        if point.is_some() {
            self.require(
                Capabilities::EXPOSURE_POINT_OF_INTEREST,
                "an exposure point of interest",
            )?;
        }
        self.lock_for_configuration()?;
        self.shared.lock().log.exposure.push((mode, point));
        Ok(())
    }

    fn set_white_balance(&mut self, mode: WhiteBalanceMode) -> Result<()> {
        self.require(mode.capability(), "this white balance mode")?;
        self.lock_for_configuration()?;
        self.shared.lock().log.white_balance.push(mode);
        Ok(())
    }

    fn set_subject_area_change_monitoring(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            self.require(Capabilities::SUBJECT_AREA_MONITORING, "subject area monitoring")?;
        }
        self.lock_for_configuration()?;
        self.shared.lock().log.subject_area_monitoring.push(enabled);
        Ok(())
    }
}
