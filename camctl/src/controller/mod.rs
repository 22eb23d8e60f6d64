//! 相机会话控制器
//!
//! 所有公开操作都是"入队 + 立即返回 Completion"：调用方线程只做参数换算，
//! 真正的硬件操作在私有 worker 线程上按提交顺序串行执行。

mod worker;

use crate::completion::{Completer, Completion};
use crate::delegate::{self, ControllerDelegate, DelegateSlot};
use crate::imgcodecs::StillImage;
use crate::internal::runtime;
use crate::simulator::SimulatorOverrides;
use camctl_core::builder::{AdjustmentModes, ControllerConfig};
use camctl_core::error::CameraError;
use camctl_core::geometry::{Point, PreviewGeometry};
use camctl_core::settings::{AuthorizationStatus, DevicePosition, FlashMode, MediaType};
use camctl_core::traits::{AssetId, Driver, MediaLibrary, SessionHandle};
use crossbeam_channel::Sender;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use worker::{Command, StillJob, Worker, WorkerParts};

/// 录像状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingStatus {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl RecordingStatus {
    /// 除 Idle 之外都算"正在录像"
    pub fn is_recording(self) -> bool {
        self != Self::Idle
    }
}

/// 控制器的只读状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub position: DevicePosition,
    pub flash_mode: FlashMode,
    /// 会话初始化之前为 false
    pub flash_capable: bool,
    pub authorization: AuthorizationStatus,
    pub session_running: bool,
    pub recording: RecordingStatus,
    pub initialized: bool,
    pub session: Option<SessionHandle>,
}

/// `cycle_position` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 切换完成后的位置
    Cycled(DevicePosition),
    /// 上一次切换尚未完成，本次请求被丢弃
    Ignored,
}

/// 构造时可注入的协作方
#[derive(Clone, Default)]
pub struct ControllerOptions {
    /// 不设置时使用 `SimulatorOverrides::global()`
    pub simulator: Option<SimulatorOverrides>,
    /// 不设置时使用 `Driver::media_library()`
    pub library: Option<Arc<dyn MediaLibrary>>,
    /// 完成上下文，不设置时使用当前 tokio runtime 或全局后台 runtime
    pub completion: Option<Handle>,
}

impl ControllerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn simulator(mut self, overrides: SimulatorOverrides) -> Self {
        self.simulator = Some(overrides);
        self
    }

    pub fn library(mut self, library: Arc<dyn MediaLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn completion(mut self, handle: Handle) -> Self {
        self.completion = Some(handle);
        self
    }
}

impl fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("simulator", &self.simulator)
            .field("library", &self.library.is_some())
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

/// 相机会话控制器
///
/// 持有一个硬件会话、一个活动镜头 Input 以及它的 Output。
/// 构造永远成功：找不到设备时控制器处于惰性状态，见 [`CameraController::setup_error`]。
pub struct CameraController {
    commands: Sender<Command>,
    state: watch::Receiver<ControllerState>,
    delegate: DelegateSlot,
    cycling: Arc<AtomicBool>,
    geometry: RwLock<Option<PreviewGeometry>>,
    config: ControllerConfig,
    setup_error: Option<CameraError>,
    handle: Handle,
}

impl CameraController {
    pub fn new(driver: Arc<dyn Driver>, config: ControllerConfig) -> Self {
        Self::with_options(driver, config, ControllerOptions::default())
    }

    pub fn with_options(
        driver: Arc<dyn Driver>,
        config: ControllerConfig,
        options: ControllerOptions,
    ) -> Self {
        Self::build(driver, config, options, false)
    }

    pub(crate) fn build(
        driver: Arc<dyn Driver>,
        config: ControllerConfig,
        options: ControllerOptions,
        video: bool,
    ) -> Self {
        let handle = options
            .completion
            .unwrap_or_else(runtime::completion_handle);
        let library = options.library.or_else(|| driver.media_library());
        let simulator = options
            .simulator
            .unwrap_or_else(|| SimulatorOverrides::global().clone());
        let authorization = driver.authorization_status(MediaType::Video);

        let mut setup_error = match driver.device_for_position(config.position) {
            Ok(Some(info)) => {
                log::debug!("Found {} for the {} position", info.name, config.position);
                None
            }
            Ok(None) => Some(CameraError::NoDeviceAvailable(config.position)),
            Err(e) => Some(e),
        };
        if let Some(e) = &setup_error {
            log::warn!("Camera controller is inert: {}", e);
        }

        let (state_tx, state_rx) = watch::channel(ControllerState {
            position: config.position,
            flash_mode: FlashMode::Off,
            flash_capable: false,
            authorization,
            session_running: false,
            recording: RecordingStatus::Idle,
            initialized: false,
            session: None,
        });
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (note_tx, note_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let delegate = DelegateSlot::default();
        let cycling = Arc::new(AtomicBool::new(false));

        delegate::spawn_dispatcher(
            &handle,
            delegate.clone(),
            event_rx,
            note_rx,
            config.subject_area_change_monitoring,
        );

        let worker = Worker::new(WorkerParts {
            driver,
            config: config.clone(),
            video,
            setup_error: setup_error.clone(),
            authorization,
            state: state_tx,
            events: event_tx,
            notifications: note_tx,
            cycling: cycling.clone(),
            simulator,
            library,
            handle: handle.clone(),
            commands: cmd_tx.clone(),
        });
        if let Err(e) = worker.spawn(cmd_rx) {
            log::error!("Failed to spawn session worker: {}", e);
            setup_error = Some(CameraError::Configuration(format!(
                "failed to spawn session worker: {e}"
            )));
        }

        Self {
            commands: cmd_tx,
            state: state_rx,
            delegate,
            cycling,
            geometry: RwLock::new(None),
            config,
            setup_error,
            handle,
        }
    }

    // --- Delegate ---

    /// 只保存弱引用，调用方负责让 delegate 活着
    pub fn set_delegate<D: ControllerDelegate + 'static>(&self, delegate: &Arc<D>) {
        let delegate: Arc<dyn ControllerDelegate> = delegate.clone();
        self.delegate.set(Arc::downgrade(&delegate));
    }

    pub fn clear_delegate(&self) {
        self.delegate.clear();
    }

    // --- 只读状态 ---

    /// 构造阶段发现的问题 (没有设备等)，有值时控制器不会启动任何硬件
    pub fn setup_error(&self) -> Option<&CameraError> {
        self.setup_error.as_ref()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.clone()
    }

    pub fn position(&self) -> DevicePosition {
        self.state.borrow().position
    }

    pub fn flash_mode(&self) -> FlashMode {
        self.state.borrow().flash_mode
    }

    pub fn flash_capable(&self) -> bool {
        self.state.borrow().flash_capable
    }

    pub fn subject_area_change_monitoring_enabled(&self) -> bool {
        self.config.subject_area_change_monitoring
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.state.borrow().authorization
    }

    pub fn is_session_running(&self) -> bool {
        self.state.borrow().session_running
    }

    /// 给预览层用的会话句柄，初始化前为 None
    pub fn session_handle(&self) -> Option<SessionHandle> {
        self.state.borrow().session.clone()
    }

    // --- 预览协作 ---

    pub fn set_preview_geometry(&self, geometry: Option<PreviewGeometry>) {
        *self
            .geometry
            .write()
            .unwrap_or_else(PoisonError::into_inner) = geometry;
    }

    /// 视图坐标 -> 设备兴趣点；没有预览几何时视为已经归一化
    pub fn point_of_interest(&self, view_point: Point) -> Point {
        match *self.geometry.read().unwrap_or_else(PoisonError::into_inner) {
            Some(geometry) => geometry.point_of_interest(view_point),
            None => view_point.clamped(),
        }
    }

    // --- 操作 ---

    fn submit<T>(&self, command: impl FnOnce(Completer<T>) -> Command) -> Completion<T> {
        let (completer, completion) = Completion::channel(self.handle.clone());
        if self.commands.send(command(completer)).is_err() {
            // 指令连同 completer 一起被丢弃，completion 会得到 SessionNotRunning
            log::error!("Session worker is gone");
        }
        completion
    }

    pub fn start_capture_session(&self) -> Completion<()> {
        self.submit(Command::Start)
    }

    pub fn stop_capture_session(&self) -> Completion<()> {
        self.submit(Command::Stop)
    }

    /// 以默认模式对焦/曝光到视图上的一点
    pub fn auto_adjust_to_point(&self, view_point: Point) -> Completion<()> {
        self.auto_adjust_to_point_with_modes(view_point, AdjustmentModes::default())
    }

    pub fn auto_adjust_to_point_with_modes(
        &self,
        view_point: Point,
        modes: AdjustmentModes,
    ) -> Completion<()> {
        let point = self.point_of_interest(view_point);
        self.submit(|done| Command::AutoAdjust { point, modes, done })
    }

    /// 切到下一个闪光灯模式，结果为新模式
    pub fn cycle_flash_mode(&self) -> Completion<FlashMode> {
        self.submit(Command::CycleFlash)
    }

    /// 前后镜头互换
    ///
    /// 上一次切换还没结束时立即返回 `CycleOutcome::Ignored`，不会产生任何事件。
    pub fn cycle_position(&self) -> Completion<CycleOutcome> {
        if self
            .cycling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Position cycle already in progress, ignoring");
            return Completion::ready_on(self.handle.clone(), Ok(CycleOutcome::Ignored));
        }
        self.submit(Command::CyclePosition)
    }

    /// 拍照并写入相册
    pub fn capture_asset(&self) -> Completion<AssetId> {
        self.submit(|done| Command::CaptureStill(StillJob::Asset(done)))
    }

    /// 拍照并解码成 RGBA
    pub fn capture_sample(&self) -> Completion<StillImage> {
        self.submit(|done| Command::CaptureStill(StillJob::Sample(done)))
    }

    pub(crate) fn start_recording(
        &self,
        with_thumbnail: bool,
    ) -> (Option<Completion<StillImage>>, Completion<PathBuf>) {
        let (movie_done, movie) = Completion::channel(self.handle.clone());
        let (thumbnail_done, thumbnail) = if with_thumbnail {
            let (done, completion) = Completion::channel(self.handle.clone());
            (Some(done), Some(completion))
        } else {
            (None, None)
        };

        let command = Command::StartRecording {
            thumbnail: thumbnail_done,
            movie: movie_done,
        };
        if self.commands.send(command).is_err() {
            log::error!("Session worker is gone");
        }
        (thumbnail, movie)
    }

    pub(crate) fn stop_recording(&self) -> Completion<()> {
        self.submit(Command::StopRecording)
    }
}

impl fmt::Debug for CameraController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraController")
            .field("state", &*self.state.borrow())
            .field("setup_error", &self.setup_error)
            .finish_non_exhaustive()
    }
}

// 析构函数：通知后台线程退出
impl Drop for CameraController {
    fn drop(&mut self) {
        // worker 可能已经退出了，忽略错误
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_status_collapses_to_bool() {
        assert!(!RecordingStatus::Idle.is_recording());
        for status in [
            RecordingStatus::Starting,
            RecordingStatus::Recording,
            RecordingStatus::Stopping,
        ] {
            assert!(status.is_recording());
        }
    }

    #[test]
    fn options_builder() {
        let overrides = SimulatorOverrides::new();
        let options = ControllerOptions::new().simulator(overrides.clone());
        overrides.set_fake_image_color_rgba(1.0, 1.0, 1.0, 1.0);
        assert!(options.simulator.unwrap().is_active());
        assert!(options.library.is_none());
    }
}
