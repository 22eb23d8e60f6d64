//! 串行 worker
//!
//! 每个控制器独占一个 OS 线程，按 FIFO 顺序消费指令。会话、设备、Input/Output 只在这里被触碰。
//! 硬件的异步结果不在这里等待：worker 只负责发起，然后把 receiver 交给完成上下文上的任务。

use super::{ControllerState, CycleOutcome, RecordingStatus};
use crate::completion::Completer;
use crate::delegate::{ControllerEvent, EventSender};
use crate::imgcodecs::{self, StillImage};
use crate::simulator::SimulatorOverrides;
use camctl_core::builder::{AdjustmentModes, ControllerConfig};
use camctl_core::error::{CameraError, Result};
use camctl_core::frame::{SampleBuffer, SampleMetadata};
use camctl_core::geometry::Point;
use camctl_core::settings::{
    AuthorizationStatus, Capabilities, DevicePosition, FlashMode, MediaType,
};
use camctl_core::traits::{
    AssetId, CaptureDevice, CaptureSession, Driver, EncodedImage, MediaLibrary, NotificationSink,
    OutputKind, PendingSample, StillRequest,
};
use crossbeam_channel::{Receiver, Sender};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::{io, mem, thread};
use tokio::runtime::Handle;
use tokio::sync::watch;

// 进程内所有控制器共享，保证录像文件名不冲突
static MOVIE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 调用方 -> worker 的指令
pub(crate) enum Command {
    Start(Completer<()>),
    Stop(Completer<()>),
    AutoAdjust {
        point: Point,
        modes: AdjustmentModes,
        done: Completer<()>,
    },
    CycleFlash(Completer<FlashMode>),
    CyclePosition(Completer<CycleOutcome>),
    CaptureStill(StillJob),
    StartRecording {
        thumbnail: Option<Completer<StillImage>>,
        movie: Completer<PathBuf>,
    },
    StopRecording(Completer<()>),
    /// 录像 finalize 结束，由转发任务发回
    RecordingFinished {
        id: u64,
        result: Result<PathBuf>,
    },
    Shutdown,
}

/// 静态拍照的两种交付形式
pub(crate) enum StillJob {
    Sample(Completer<StillImage>),
    Asset(Completer<AssetId>),
}

impl StillJob {
    fn fail(self, error: CameraError) {
        match self {
            Self::Sample(done) => {
                done.complete(Err(error));
            }
            Self::Asset(done) => {
                done.complete(Err(error));
            }
        }
    }
}

/// 会话纪元：每次启动 generation + 1，停止时 running = false
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Epoch {
    generation: u64,
    running: bool,
}

/// 初始化完成后的硬件
struct Active {
    session: Box<dyn CaptureSession>,
    device: Box<dyn CaptureDevice>,
}

enum Recording {
    Idle,
    Active { id: u64, done: Completer<PathBuf> },
    Finalizing { id: u64, done: Completer<PathBuf> },
}

impl Default for Recording {
    fn default() -> Self {
        Self::Idle
    }
}

impl Recording {
    fn status(&self) -> RecordingStatus {
        match self {
            Self::Idle => RecordingStatus::Idle,
            Self::Active { .. } => RecordingStatus::Recording,
            Self::Finalizing { .. } => RecordingStatus::Stopping,
        }
    }
}

/// 清除 cycle 标志，无论 cycle 以何种方式结束
struct CycleGuard(Arc<AtomicBool>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 构造 worker 所需的全部部件
pub(crate) struct WorkerParts {
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) config: ControllerConfig,
    pub(crate) video: bool,
    pub(crate) setup_error: Option<CameraError>,
    pub(crate) authorization: AuthorizationStatus,
    pub(crate) state: watch::Sender<ControllerState>,
    pub(crate) events: EventSender,
    pub(crate) notifications: NotificationSink,
    pub(crate) cycling: Arc<AtomicBool>,
    pub(crate) simulator: SimulatorOverrides,
    pub(crate) library: Option<Arc<dyn MediaLibrary>>,
    pub(crate) handle: Handle,
    pub(crate) commands: Sender<Command>,
}

pub(crate) struct Worker {
    driver: Arc<dyn Driver>,
    config: ControllerConfig,
    video: bool,
    setup_error: Option<CameraError>,

    active: Option<Active>,
    position: DevicePosition,
    flash_mode: FlashMode,
    flash_capable: bool,
    authorization: AuthorizationStatus,
    recording: Recording,

    state: watch::Sender<ControllerState>,
    epoch: watch::Sender<Epoch>,
    events: EventSender,
    notifications: NotificationSink,
    cycling: Arc<AtomicBool>,
    simulator: SimulatorOverrides,
    library: Option<Arc<dyn MediaLibrary>>,
    handle: Handle,
    commands: Sender<Command>,
    next_recording_id: u64,
}

impl Worker {
    pub(crate) fn new(parts: WorkerParts) -> Self {
        let (epoch, _) = watch::channel(Epoch::default());
        Self {
            position: parts.config.position,
            driver: parts.driver,
            config: parts.config,
            video: parts.video,
            setup_error: parts.setup_error,
            active: None,
            flash_mode: FlashMode::Off,
            flash_capable: false,
            authorization: parts.authorization,
            recording: Recording::Idle,
            state: parts.state,
            epoch,
            events: parts.events,
            notifications: parts.notifications,
            cycling: parts.cycling,
            simulator: parts.simulator,
            library: parts.library,
            handle: parts.handle,
            commands: parts.commands,
            next_recording_id: 0,
        }
    }

    pub(crate) fn spawn(self, commands: Receiver<Command>) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("camctl-session".into())
            .spawn(move || self.run(commands))
    }

    fn run(mut self, commands: Receiver<Command>) {
        log::debug!("Session worker started ({} camera)", self.position);

        while let Ok(command) = commands.recv() {
            match command {
                Command::Start(done) => {
                    let result = self.start();
                    self.report(&result);
                    done.complete(result);
                }
                Command::Stop(done) => {
                    self.stop();
                    done.complete(Ok(()));
                }
                Command::AutoAdjust { point, modes, done } => {
                    let result = self.auto_adjust(point, modes);
                    self.report(&result);
                    done.complete(result);
                }
                Command::CycleFlash(done) => {
                    done.complete(self.cycle_flash());
                }
                Command::CyclePosition(done) => {
                    done.complete(self.cycle_position());
                }
                Command::CaptureStill(job) => self.capture_still(job),
                Command::StartRecording { thumbnail, movie } => {
                    self.start_recording(thumbnail, movie);
                }
                Command::StopRecording(done) => {
                    self.stop_recording();
                    done.complete(Ok(()));
                }
                Command::RecordingFinished { id, result } => self.recording_finished(id, result),
                Command::Shutdown => break,
            }
        }

        self.teardown();
        log::debug!("Session worker finished");
    }

    // --- 状态 ---

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    /// 把失败同时推给 session_did_error
    fn report<T>(&self, result: &Result<T>) {
        if let Err(e) = result {
            log::warn!("Session error: {}", e);
            self.emit(ControllerEvent::SessionDidError(e.clone()));
        }
    }

    fn publish(&self) {
        let running = self.epoch.borrow().running;
        let snapshot = ControllerState {
            position: self.position,
            flash_mode: self.flash_mode,
            flash_capable: self.flash_capable,
            authorization: self.authorization,
            session_running: running,
            recording: self.recording.status(),
            initialized: self.active.is_some(),
            session: self.active.as_ref().map(|a| a.session.handle()),
        };
        self.state.send_if_modified(|state| {
            if *state == snapshot {
                false
            } else {
                *state = snapshot;
                true
            }
        });
    }

    fn is_running(&self) -> bool {
        self.epoch.borrow().running
    }

    /// 重新查询权限，视频控制器还需要麦克风
    fn check_authorization(&mut self) -> Result<()> {
        let required: &[MediaType] = if self.video {
            &[MediaType::Video, MediaType::Audio]
        } else {
            &[MediaType::Video]
        };

        let mut outcome = Ok(());
        for &media in required {
            let status = self.driver.authorization_status(media);
            if media == MediaType::Video {
                self.authorization = status;
            }
            if !status.is_authorized() {
                log::warn!("{} capture not authorized: {:?}", media, status);
                outcome = Err(CameraError::Unauthorized(media));
                break;
            }
        }
        self.publish();
        outcome
    }

    // --- 初始化 ---

    /// 惰性创建会话并接线，只会成功一次
    fn ensure_initialized(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }
        if let Some(e) = &self.setup_error {
            return Err(e.clone());
        }

        let info = self
            .driver
            .device_for_position(self.position)?
            .ok_or(CameraError::NoDeviceAvailable(self.position))?;
        let mut device = self.driver.open(&info.id)?;
        let mut session = self
            .driver
            .create_session(self.config.preset, self.notifications.clone())?;

        session.begin_configuration();
        let wired = session
            .add_input(&info)
            .and_then(|_| self.install_outputs(session.as_mut()));
        session.commit_configuration();
        wired?;

        self.configure_device(device.as_mut());
        log::info!(
            "Session initialized with {} ({}), flash capable: {}",
            info.name,
            self.position,
            self.flash_capable
        );

        self.active = Some(Active { session, device });
        self.publish();
        Ok(())
    }

    fn install_outputs(&self, session: &mut dyn CaptureSession) -> Result<()> {
        if self.config.stills_enabled {
            session.add_output(OutputKind::Still)?;
        }
        if self.video {
            session.add_output(OutputKind::Movie)?;
            if self.config.thumbnail_capture_enabled {
                session.add_output(OutputKind::Thumbnail)?;
            }
        }
        Ok(())
    }

    /// 新设备接入后：闪光灯收敛到设备支持的模式，按需开启主体区域监控
    ///
    /// 这里的失败不影响接线本身，只上报给 delegate。
    fn configure_device(&mut self, device: &mut dyn CaptureDevice) {
        let caps = device.capabilities();

        if self.config.subject_area_change_monitoring
            && caps.contains(Capabilities::SUBJECT_AREA_MONITORING)
        {
            let result = device.set_subject_area_change_monitoring(true);
            self.report(&result);
        }

        let mode = self
            .flash_mode
            .normalized(caps, self.config.auto_flash_enabled);
        if caps.contains(mode.capability()) {
            let result = device.set_flash_mode(mode);
            self.report(&result);
        }
        self.flash_mode = mode;
        self.flash_capable = caps.is_flash_capable();
    }

    // --- 会话生命周期 ---

    fn start(&mut self) -> Result<()> {
        self.check_authorization()?;
        self.ensure_initialized()?;

        let active = self.active.as_mut().ok_or(CameraError::SessionNotRunning)?;
        if self.epoch.borrow().running && active.session.is_running() {
            return Ok(());
        }
        active.session.start_running()?;

        self.epoch.send_modify(|epoch| {
            epoch.generation += 1;
            epoch.running = true;
        });
        log::info!("Capture session started");
        self.publish();
        self.emit(ControllerEvent::SessionDidStartRunning);
        Ok(())
    }

    fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.fail_recording(CameraError::SessionNotRunning);
        if let Some(active) = self.active.as_mut() {
            active.session.stop_running();
        }
        self.epoch.send_modify(|epoch| epoch.running = false);

        log::info!("Capture session stopped");
        self.publish();
        self.emit(ControllerEvent::SessionDidStopRunning);
    }

    fn teardown(&mut self) {
        self.fail_recording(CameraError::SessionNotRunning);
        if let Some(mut active) = self.active.take() {
            if active.session.is_running() {
                active.session.stop_running();
            }
            let id = active.device.info().id.clone();
            active.session.remove_input(&id);
        }
        self.epoch.send_modify(|epoch| epoch.running = false);
        self.publish();
    }

    // --- 设备调整 ---

    fn auto_adjust(&mut self, point: Point, modes: AdjustmentModes) -> Result<()> {
        self.ensure_initialized()?;
        let monitoring = self.config.subject_area_change_monitoring;
        let active = self.active.as_mut().ok_or(CameraError::SessionNotRunning)?;
        let device = active.device.as_mut();
        let caps = device.capabilities();

        if caps.contains(modes.focus.capability()) {
            let poi = caps
                .contains(Capabilities::FOCUS_POINT_OF_INTEREST)
                .then_some(point);
            device.set_focus(modes.focus, poi)?;
        }

        if caps.contains(modes.exposure.capability()) {
            let poi = caps
                .contains(Capabilities::EXPOSURE_POINT_OF_INTEREST)
                .then_some(point);
            device.set_exposure(modes.exposure, poi)?;
        }

        if caps.contains(modes.white_balance.capability()) {
            device.set_white_balance(modes.white_balance)?;
        }

        if monitoring && caps.contains(Capabilities::SUBJECT_AREA_MONITORING) {
            device.set_subject_area_change_monitoring(true)?;
        }

        log::debug!("Adjusted {:?} at ({:.3}, {:.3})", modes, point.x, point.y);
        Ok(())
    }

    fn cycle_flash(&mut self) -> Result<FlashMode> {
        self.ensure_initialized()?;
        let auto = self.config.auto_flash_enabled;
        let current = self.flash_mode;
        let active = self.active.as_mut().ok_or(CameraError::SessionNotRunning)?;
        let caps = active.device.capabilities();

        let next = match current.next_in(caps, auto) {
            Some(next) => {
                active.device.set_flash_mode(next)?;
                next
            }
            None => FlashMode::Off,
        };

        self.flash_mode = next;
        self.flash_capable = caps.is_flash_capable();
        self.publish();
        Ok(next)
    }

    fn cycle_position(&mut self) -> Result<CycleOutcome> {
        let _guard = CycleGuard(self.cycling.clone());

        self.emit(ControllerEvent::WillCyclePosition);
        let result = self.swap_input();
        self.report(&result);
        self.emit(ControllerEvent::DidCyclePosition(self.position));

        result.map(CycleOutcome::Cycled)
    }

    /// 在一次配置事务里把 Input 换成对面的镜头，失败时恢复旧 Input
    fn swap_input(&mut self) -> Result<DevicePosition> {
        self.ensure_initialized()?;
        let mut active = self.active.take().ok_or(CameraError::SessionNotRunning)?;
        let target = self.position.opposite();

        active.session.begin_configuration();
        let old = active.device.info().clone();
        active.session.remove_input(&old.id);

        let attached = self
            .driver
            .device_for_position(target)
            .and_then(|info| info.ok_or(CameraError::NoDeviceAvailable(target)))
            .and_then(|info| {
                let device = self.driver.open(&info.id)?;
                active.session.add_input(&info)?;
                Ok(device)
            });

        let result = match attached {
            Ok(mut device) => {
                self.configure_device(device.as_mut());
                active.device = device;
                self.position = target;
                log::info!("Switched to the {} camera", target);
                Ok(target)
            }
            Err(e) => {
                if let Err(restore) = active.session.add_input(&old) {
                    log::error!("Failed to restore {}: {}", old.name, restore);
                }
                Err(e)
            }
        };

        active.session.commit_configuration();
        self.active = Some(active);
        self.publish();
        result
    }

    // --- 拍照 ---

    fn capture_still(&mut self, job: StillJob) {
        // 快照只读一次，整个拍照过程以它为准
        if let Some(fake) = self.simulator.snapshot() {
            log::debug!("Simulator override active, skipping hardware capture");
            match job {
                StillJob::Sample(done) => {
                    done.complete(fake.render());
                }
                StillJob::Asset(done) => {
                    let quality = self.config.jpeg_quality;
                    let encoded = fake.render().and_then(|still| {
                        let image = still.to_jpeg(quality).map_err(CameraError::from)?;
                        Ok((image, still.metadata().clone()))
                    });
                    match encoded {
                        Ok((image, metadata)) => {
                            self.handle
                                .spawn(persist(self.library.clone(), image, metadata, done));
                        }
                        Err(e) => {
                            done.complete(Err(e));
                        }
                    }
                }
            }
            return;
        }

        let (pending, ended) = match self.begin_still(OutputKind::Still) {
            Ok(started) => started,
            Err(e) => return job.fail(e),
        };

        match job {
            StillJob::Sample(done) => {
                self.handle.spawn(async move {
                    let result = await_sample(pending, ended).await.and_then(|sample| {
                        StillImage::from_sample(&sample).map_err(CameraError::from)
                    });
                    done.complete(result);
                });
            }
            StillJob::Asset(done) => {
                let quality = self.config.jpeg_quality;
                let library = self.library.clone();
                self.handle.spawn(async move {
                    let sample = match await_sample(pending, ended).await {
                        Ok(sample) => sample,
                        Err(e) => {
                            done.complete(Err(e));
                            return;
                        }
                    };
                    match imgcodecs::encode_sample(&sample, quality) {
                        Ok(image) => persist(library, image, sample.metadata, done).await,
                        Err(e) => {
                            done.complete(Err(e.into()));
                        }
                    }
                });
            }
        }
    }

    /// 发起一次硬件拍照，返回结果 receiver 与"会话已结束"信号
    fn begin_still(
        &mut self,
        output: OutputKind,
    ) -> Result<(PendingSample, impl Future<Output = ()> + Send + 'static)> {
        if let Some(e) = &self.setup_error {
            return Err(e.clone());
        }
        if !self.driver.authorization_status(MediaType::Video).is_authorized() {
            return Err(CameraError::Unauthorized(MediaType::Video));
        }
        if output == OutputKind::Still && !self.config.stills_enabled {
            return Err(CameraError::CaptureFailed(
                "still capture is disabled for this controller".into(),
            ));
        }

        let epoch = *self.epoch.borrow();
        let active = match self.active.as_mut() {
            Some(active) if epoch.running => active,
            _ => return Err(CameraError::SessionNotRunning),
        };

        let pending = active
            .session
            .capture_still(StillRequest {
                output,
                flash_mode: self.flash_mode,
            })
            .map_err(CameraError::into_capture)?;
        Ok((pending, session_ended(self.epoch.subscribe(), epoch.generation)))
    }

    // --- 录像 ---

    fn start_recording(
        &mut self,
        thumbnail: Option<Completer<StillImage>>,
        movie: Completer<PathBuf>,
    ) {
        if !matches!(self.recording, Recording::Idle) {
            log::warn!("Recording already in progress");
            if let Some(done) = thumbnail {
                done.complete(Err(CameraError::DeviceBusy));
            }
            movie.complete(Err(CameraError::DeviceBusy));
            return;
        }

        self.state
            .send_modify(|state| state.recording = RecordingStatus::Starting);

        // 缩略图失败不影响录像
        if let Some(done) = thumbnail {
            match self.begin_still(OutputKind::Thumbnail) {
                Ok((pending, ended)) => {
                    self.handle.spawn(async move {
                        let result = await_sample(pending, ended).await.and_then(|sample| {
                            StillImage::from_sample(&sample).map_err(CameraError::from)
                        });
                        done.complete(result);
                    });
                }
                Err(e) => {
                    log::warn!("Thumbnail capture failed: {}", e);
                    done.complete(Err(e));
                }
            }
        }

        let destination = self.next_movie_path();
        let pending = match self.active.as_mut() {
            Some(active) if self.epoch.borrow().running => {
                active.session.start_recording(destination)
            }
            _ => Err(self
                .setup_error
                .clone()
                .unwrap_or(CameraError::SessionNotRunning)),
        };

        let pending = match pending {
            Ok(pending) => pending,
            Err(e) => {
                log::warn!("Failed to start recording: {}", e);
                self.publish();
                movie.complete(Err(e));
                return;
            }
        };

        self.next_recording_id += 1;
        let id = self.next_recording_id;
        self.recording = Recording::Active { id, done: movie };

        let commands = self.commands.clone();
        self.handle.spawn(async move {
            let result = pending.await.unwrap_or_else(|_| {
                Err(CameraError::CaptureFailed(
                    "movie output dropped the recording".into(),
                ))
            });
            let _ = commands.send(Command::RecordingFinished { id, result });
        });

        log::info!("Recording started");
        self.publish();
        self.emit(ControllerEvent::DidStartRecording);
    }

    fn stop_recording(&mut self) {
        match mem::take(&mut self.recording) {
            Recording::Active { id, done } => {
                if let Some(active) = self.active.as_mut() {
                    active.session.stop_recording();
                }
                self.recording = Recording::Finalizing { id, done };
                self.publish();
            }
            other => self.recording = other,
        }
    }

    fn recording_finished(&mut self, id: u64, result: Result<PathBuf>) {
        match mem::take(&mut self.recording) {
            Recording::Active { id: current, done } | Recording::Finalizing { id: current, done }
                if current == id =>
            {
                match &result {
                    Ok(path) => log::info!("Recording finished: {}", path.display()),
                    Err(e) => log::warn!("Recording failed: {}", e),
                }
                done.complete(result);
                self.publish();
                self.emit(ControllerEvent::DidStopRecording);
            }
            // 会话停止时已经交付过的录像
            other => self.recording = other,
        }
    }

    /// 会话停止或 worker 退出时终止进行中的录像
    fn fail_recording(&mut self, error: CameraError) {
        match mem::take(&mut self.recording) {
            Recording::Idle => {}
            Recording::Active { done, .. } => {
                if let Some(active) = self.active.as_mut() {
                    active.session.stop_recording();
                }
                done.complete(Err(error));
                self.emit(ControllerEvent::DidStopRecording);
            }
            Recording::Finalizing { done, .. } => {
                done.complete(Err(error));
                self.emit(ControllerEvent::DidStopRecording);
            }
        }
    }

    fn next_movie_path(&self) -> PathBuf {
        let dir = self
            .config
            .movie_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let n = MOVIE_COUNTER.fetch_add(1, Ordering::Relaxed);
        dir.join(format!("camctl-{}-{}.mov", std::process::id(), n))
    }
}

/// 纪元变化 (停止或重新启动) 或 worker 退出时返回
async fn session_ended(mut epoch: watch::Receiver<Epoch>, generation: u64) {
    loop {
        let current = *epoch.borrow_and_update();
        if !current.running || current.generation != generation {
            return;
        }
        if epoch.changed().await.is_err() {
            return;
        }
    }
}

/// 硬件结果与会话停止赛跑，先到者决定结果
async fn await_sample(
    pending: PendingSample,
    ended: impl Future<Output = ()>,
) -> Result<SampleBuffer> {
    tokio::select! {
        biased;
        delivered = pending => delivered
            .unwrap_or_else(|_| {
                Err(CameraError::CaptureFailed("still output dropped the request".into()))
            })
            .map_err(CameraError::into_capture),
        _ = ended => Err(CameraError::SessionNotRunning),
    }
}

async fn persist(
    library: Option<Arc<dyn MediaLibrary>>,
    image: EncodedImage,
    metadata: SampleMetadata,
    done: Completer<AssetId>,
) {
    let result = match library {
        Some(library) => library
            .save_image(image, metadata)
            .await
            .map_err(CameraError::into_persist),
        None => Err(CameraError::PersistFailed(
            "no media library available".into(),
        )),
    };
    if let Ok(id) = &result {
        log::debug!("Asset saved: {}", id);
    }
    done.complete(result);
}
