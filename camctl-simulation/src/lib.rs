//! 纯内存的相机硬件实现
//!
//! 实现了 `camctl-core` 的全部 Facade Trait，用于测试与演示：
//! - 可以让拍照请求"悬空" (Manual 模式)，模拟硬件尚未回调的在途状态
//! - 可以卡住 begin_configuration，制造"正在切换镜头"的窗口
//! - 可以注入中断、运行时错误、权限变化
//! - `HardwareLog` 记录控制器对硬件做过的所有事情

mod device;
mod library;
mod session;

pub use library::{SavedAsset, SimLibrary};

use camctl_core::error::{CameraError, Result};
use camctl_core::frame::{Orientation, SampleBuffer, SampleMetadata};
use camctl_core::geometry::Point;
use camctl_core::pixel_format::FourCC;
use camctl_core::settings::{
    AuthorizationStatus, Capabilities, DevicePosition, ExposureMode, FlashMode, FocusMode,
    MediaType, SessionPreset, WhiteBalanceMode,
};
use camctl_core::traits::{
    CaptureDevice, CaptureSession, DeviceInfo, Driver, MediaLibrary, NotificationSink,
    OutputKind, SessionNotification, StillRequest,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// 模拟帧尺寸，刻意很小以保证测试速度
pub const SAMPLE_WIDTH: u32 = 32;
pub const SAMPLE_HEIGHT: u32 = 24;

/// 拍照结果的交付方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// 请求发出后立即交付
    #[default]
    Immediate,
    /// 结果挂起，直到测试调用 `complete_pending_stills` / `finish_recording`
    Manual,
}

/// 控制器对硬件的全部调用记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HardwareLog {
    pub sessions_created: usize,
    pub start_calls: usize,
    pub stop_calls: usize,
    pub configurations_committed: usize,
    pub still_captures: usize,
    pub recordings_started: usize,
    /// 当前挂在会话上的 Input (设备 ID)
    pub attached_inputs: Vec<String>,
    pub outputs: Vec<OutputKind>,
    pub flash_modes: Vec<FlashMode>,
    pub focus: Vec<(FocusMode, Option<Point>)>,
    pub exposure: Vec<(ExposureMode, Option<Point>)>,
    pub white_balance: Vec<WhiteBalanceMode>,
    pub subject_area_monitoring: Vec<bool>,
}

#[derive(Debug, Clone)]
struct DeviceSpec {
    info: DeviceInfo,
    capabilities: Capabilities,
}

pub(crate) struct Inner {
    devices: Vec<DeviceSpec>,
    authorization: HashMap<MediaType, AuthorizationStatus>,
    capture_mode: CaptureMode,
    pub(crate) pending_stills: VecDeque<(StillRequest, oneshot::Sender<Result<SampleBuffer>>)>,
    pub(crate) pending_movie: Option<(PathBuf, oneshot::Sender<Result<PathBuf>>)>,
    notifications: Option<NotificationSink>,
    pub(crate) capture_failure: Option<CameraError>,
    pub(crate) start_failure: Option<CameraError>,
    pub(crate) lock_failure: Option<CameraError>,
    pub(crate) running: bool,
    next_session_id: u64,
    pub(crate) log: HardwareLog,
}

impl Inner {
    pub(crate) fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    // begin_configuration 的闸门：true 表示被测试卡住
    gate: Mutex<bool>,
    gate_cv: Condvar,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait_for_gate(&self) {
        let mut held = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .gate_cv
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn set_gate(&self, held: bool) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = held;
        self.gate_cv.notify_all();
    }
}

/// 生成一帧灰色 RGBA 样本
pub(crate) fn synthetic_sample(request: StillRequest) -> SampleBuffer {
    let shade = match request.output {
        OutputKind::Thumbnail => 0x40,
        _ => 0x80,
    };
    let len = (SAMPLE_WIDTH * SAMPLE_HEIGHT * 4) as usize;
    let data = vec![shade; len];
    let metadata = SampleMetadata {
        orientation: Orientation::Right,
        flash_fired: request.flash_mode == FlashMode::On,
        exposure_us: Some(16_666),
        iso: Some(100.0),
        ..SampleMetadata::default()
    }
    .exif_tag("Make", "camctl")
    .exif_tag("Model", "Simulated Camera");

    SampleBuffer::packed(data, SAMPLE_WIDTH, SAMPLE_HEIGHT, FourCC::RGBA.into())
        .with_metadata(metadata)
}

/// 模拟驱动
///
/// `Clone` 只复制句柄，所有副本共享同一份硬件状态。
#[derive(Clone)]
pub struct SimDriver {
    shared: Arc<Shared>,
    library: Option<Arc<SimLibrary>>,
}

impl std::fmt::Debug for SimDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("SimDriver")
            .field("devices", &inner.devices.len())
            .field("running", &inner.running)
            .field("pending_stills", &inner.pending_stills.len())
            .finish()
    }
}

impl SimDriver {
    pub fn builder() -> SimDriverBuilder {
        SimDriverBuilder::default()
    }

    /// 典型手机：后置镜头能力齐全，前置没有闪光灯也不支持兴趣点
    pub fn phone() -> Self {
        Self::builder()
            .device("Back Camera", DevicePosition::Back, Capabilities::all())
            .device(
                "Front Camera",
                DevicePosition::Front,
                Capabilities::FLASH_OFF
                    | Capabilities::FOCUS_CONTINUOUS
                    | Capabilities::EXPOSURE_CONTINUOUS
                    | Capabilities::WHITE_BALANCE_CONTINUOUS,
            )
            .build()
    }

    pub fn log(&self) -> HardwareLog {
        self.shared.lock().log.clone()
    }

    pub fn library(&self) -> Option<Arc<SimLibrary>> {
        self.library.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn set_authorization(&self, media: MediaType, status: AuthorizationStatus) {
        self.shared.lock().authorization.insert(media, status);
    }

    pub fn set_capture_mode(&self, mode: CaptureMode) {
        self.shared.lock().capture_mode = mode;
    }

    /// 下一次拍照由硬件回调错误
    pub fn fail_next_capture(&self, error: CameraError) {
        self.shared.lock().capture_failure = Some(error);
    }

    pub fn fail_next_start(&self, error: CameraError) {
        self.shared.lock().start_failure = Some(error);
    }

    /// 下一次设备 lockForConfiguration 失败
    pub fn fail_next_device_lock(&self, error: CameraError) {
        self.shared.lock().lock_failure = Some(error);
    }

    pub fn pending_still_count(&self) -> usize {
        self.shared.lock().pending_stills.len()
    }

    /// 交付全部挂起的拍照请求，返回交付数量
    pub fn complete_pending_stills(&self) -> usize {
        let pending: Vec<_> = self.shared.lock().pending_stills.drain(..).collect();
        let count = pending.len();
        for (request, tx) in pending {
            let _ = tx.send(Ok(synthetic_sample(request)));
        }
        count
    }

    /// Manual 模式下结束 finalize，交付录像结果
    pub fn finish_recording(&self) -> bool {
        let pending = self.shared.lock().pending_movie.take();
        match pending {
            Some((path, tx)) => {
                let _ = tx.send(Ok(path));
                true
            }
            None => false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.shared.lock().pending_movie.is_some()
    }

    /// 卡住后续的 begin_configuration，直到返回值被 drop
    pub fn hold_configuration(&self) -> ConfigurationHold {
        self.shared.set_gate(true);
        ConfigurationHold {
            shared: self.shared.clone(),
        }
    }

    /// 以硬件的身份推送一条会话通知
    pub fn notify(&self, notification: SessionNotification) -> bool {
        let sink = self.shared.lock().notifications.clone();
        match sink {
            Some(sink) => sink.send(notification).is_ok(),
            None => false,
        }
    }

    pub fn interrupt(&self) -> bool {
        self.notify(SessionNotification::WasInterrupted)
    }

    pub fn end_interruption(&self) -> bool {
        self.notify(SessionNotification::InterruptionEnded)
    }

    pub fn change_subject_area(&self) -> bool {
        self.notify(SessionNotification::SubjectAreaDidChange)
    }

    pub fn raise_runtime_error(&self, error: CameraError) -> bool {
        self.notify(SessionNotification::RuntimeError(error))
    }
}

impl Driver for SimDriver {
    fn authorization_status(&self, media: MediaType) -> AuthorizationStatus {
        self.shared
            .lock()
            .authorization
            .get(&media)
            .copied()
            .unwrap_or_default()
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .shared
            .lock()
            .devices
            .iter()
            .map(|spec| spec.info.clone())
            .collect())
    }

    fn open(&self, id: &str) -> Result<Box<dyn CaptureDevice>> {
        let spec = self
            .shared
            .lock()
            .devices
            .iter()
            .find(|spec| spec.info.id == id)
            .cloned()
            .ok_or_else(|| CameraError::Configuration(format!("unknown device: {id}")))?;

        tracing::debug!("Simulated device opened: {}", spec.info.name);
        Ok(Box::new(device::SimDevice::new(
            spec.info,
            spec.capabilities,
            self.shared.clone(),
        )))
    }

    fn create_session(
        &self,
        preset: SessionPreset,
        notifications: NotificationSink,
    ) -> Result<Box<dyn CaptureSession>> {
        let id = {
            let mut inner = self.shared.lock();
            inner.notifications = Some(notifications);
            inner.log.sessions_created += 1;
            inner.next_session_id += 1;
            inner.next_session_id
        };
        tracing::info!("Simulated session #{} created ({:?})", id, preset);
        Ok(Box::new(session::SimSession::new(
            id,
            preset,
            self.shared.clone(),
        )))
    }

    fn media_library(&self) -> Option<Arc<dyn MediaLibrary>> {
        self.library
            .clone()
            .map(|library| library as Arc<dyn MediaLibrary>)
    }
}

/// 配置闸门，drop 时放行
pub struct ConfigurationHold {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConfigurationHold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConfigurationHold")
    }
}

impl ConfigurationHold {
    pub fn release(self) {}
}

impl Drop for ConfigurationHold {
    fn drop(&mut self) {
        self.shared.set_gate(false);
    }
}

#[derive(Debug)]
pub struct SimDriverBuilder {
    devices: Vec<DeviceSpec>,
    authorization: HashMap<MediaType, AuthorizationStatus>,
    capture_mode: CaptureMode,
    library: bool,
}

impl Default for SimDriverBuilder {
    fn default() -> Self {
        let authorization = HashMap::from([
            (MediaType::Video, AuthorizationStatus::Authorized),
            (MediaType::Audio, AuthorizationStatus::Authorized),
        ]);
        Self {
            devices: Vec::new(),
            authorization,
            capture_mode: CaptureMode::Immediate,
            library: true,
        }
    }
}

impl SimDriverBuilder {
    /// 添加一个内置镜头
    pub fn device(mut self, name: &str, position: DevicePosition, caps: Capabilities) -> Self {
        let id = format!("sim:{}:{}", position, self.devices.len());
        self.devices.push(DeviceSpec {
            info: DeviceInfo {
                name: name.to_string(),
                id,
                backend: "Simulation".to_string(),
                position: Some(position),
            },
            capabilities: caps,
        });
        self
    }

    /// 添加一个外接设备 (没有位置)
    pub fn external_device(mut self, name: &str, caps: Capabilities) -> Self {
        let id = format!("sim:external:{}", self.devices.len());
        self.devices.push(DeviceSpec {
            info: DeviceInfo {
                name: name.to_string(),
                id,
                backend: "Simulation".to_string(),
                position: None,
            },
            capabilities: caps,
        });
        self
    }

    pub fn authorization(mut self, media: MediaType, status: AuthorizationStatus) -> Self {
        self.authorization.insert(media, status);
        self
    }

    pub fn capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = mode;
        self
    }

    pub fn without_library(mut self) -> Self {
        self.library = false;
        self
    }

    pub fn build(self) -> SimDriver {
        let inner = Inner {
            devices: self.devices,
            authorization: self.authorization,
            capture_mode: self.capture_mode,
            pending_stills: VecDeque::new(),
            pending_movie: None,
            notifications: None,
            capture_failure: None,
            start_failure: None,
            lock_failure: None,
            running: false,
            next_session_id: 0,
            log: HardwareLog::default(),
        };
        SimDriver {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                gate: Mutex::new(false),
                gate_cv: Condvar::new(),
            }),
            library: self.library.then(|| Arc::new(SimLibrary::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn phone_has_front_and_back() {
        let sim = SimDriver::phone();
        let back = sim.device_for_position(DevicePosition::Back).unwrap().unwrap();
        let front = sim.device_for_position(DevicePosition::Front).unwrap().unwrap();
        assert_ne!(back.id, front.id);
        assert!(sim.open(&back.id).unwrap().capabilities().is_flash_capable());
        assert!(!sim.open(&front.id).unwrap().capabilities().is_flash_capable());
    }

    #[test]
    fn missing_position_resolves_to_none() {
        let sim = SimDriver::builder()
            .device("Back Camera", DevicePosition::Back, Capabilities::all())
            .build();
        assert!(sim.device_for_position(DevicePosition::Front).unwrap().is_none());
        assert!(sim.open("sim:nope").is_err());
    }

    #[test]
    fn default_authorization_is_granted() {
        let sim = SimDriver::phone();
        assert!(sim.authorization_status(MediaType::Video).is_authorized());
        sim.set_authorization(MediaType::Video, AuthorizationStatus::Denied);
        assert_eq!(
            sim.authorization_status(MediaType::Video),
            AuthorizationStatus::Denied
        );
    }

    #[tokio::test]
    async fn manual_capture_stays_pending_until_completed() {
        let sim = SimDriver::builder()
            .device("Back Camera", DevicePosition::Back, Capabilities::all())
            .capture_mode(CaptureMode::Manual)
            .build();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = sim.create_session(SessionPreset::Photo, tx).unwrap();
        session.add_output(OutputKind::Still).unwrap();
        session.start_running().unwrap();

        let pending = session
            .capture_still(StillRequest {
                output: OutputKind::Still,
                flash_mode: FlashMode::On,
            })
            .unwrap();
        assert_eq!(sim.pending_still_count(), 1);
        assert_eq!(sim.complete_pending_stills(), 1);

        let sample = pending.await.unwrap().unwrap();
        assert_eq!((sample.width, sample.height), (SAMPLE_WIDTH, SAMPLE_HEIGHT));
        assert!(sample.metadata.flash_fired);
    }

    #[tokio::test]
    async fn notifications_reach_the_session_sink() {
        let sim = SimDriver::phone();
        assert!(!sim.interrupt(), "no session yet");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _session = sim.create_session(SessionPreset::Photo, tx).unwrap();
        assert!(sim.interrupt());
        assert_eq!(rx.recv().await, Some(SessionNotification::WasInterrupted));
    }
}
