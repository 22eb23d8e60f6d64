use crate::error::{CameraError, Result};
use crate::frame::{SampleBuffer, SampleMetadata};
use crate::geometry::Point;
use crate::pixel_format::PixelFormat;
use crate::settings::{
    AuthorizationStatus, Capabilities, DevicePosition, ExposureMode, FlashMode, FocusMode,
    MediaType, SessionPreset, WhiteBalanceMode,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// 设备基本信息
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// 对用户友好的显示名称 (e.g. "Back Camera")
    pub name: String,

    /// 唯一硬件 ID，用于 Driver::open 的参数
    pub id: String,

    /// 后端类型标识 (e.g. "AVFoundation", "Simulation")
    pub backend: String,

    /// 内置镜头的位置，外接设备为 None
    pub position: Option<DevicePosition>,
}

/// 会话句柄，提供给预览层做只读渲染
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: u64,
    pub preset: SessionPreset,
}

/// 会话上挂载的输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// 静态照片
    Still,
    /// 录像文件
    Movie,
    /// 录像开始时的缩略图
    Thumbnail,
}

/// 单次静态拍照请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillRequest {
    pub output: OutputKind,
    pub flash_mode: FlashMode,
}

/// 硬件异步交付的拍照结果
pub type PendingSample = oneshot::Receiver<Result<SampleBuffer>>;

/// 硬件在录像结束 (finalize) 后交付的文件路径
pub type PendingMovie = oneshot::Receiver<Result<PathBuf>>;

/// 会话在任意时刻上报的通知
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    RuntimeError(CameraError),
    /// 外部中断 (e.g. 来电)
    WasInterrupted,
    InterruptionEnded,
    SubjectAreaDidChange,
}

/// 会话通知的发送端，由控制器在创建会话时交给后端
pub type NotificationSink = mpsc::UnboundedSender<SessionNotification>;

// --- 硬件 Facade ---

/// 1. 驱动入口：权限、设备枚举与会话创建
pub trait Driver: Send + Sync {
    /// 查询系统权限状态
    fn authorization_status(&self, media: MediaType) -> AuthorizationStatus;

    /// 枚举设备 (含位置)
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// 打开设备，返回可配置的设备句柄
    fn open(&self, id: &str) -> Result<Box<dyn CaptureDevice>>;

    /// 创建硬件会话
    fn create_session(
        &self,
        preset: SessionPreset,
        notifications: NotificationSink,
    ) -> Result<Box<dyn CaptureSession>>;

    /// 系统相册，没有则无法保存 asset
    fn media_library(&self) -> Option<Arc<dyn MediaLibrary>> {
        None
    }

    /// 按位置查找第一个设备
    fn device_for_position(&self, position: DevicePosition) -> Result<Option<DeviceInfo>> {
        Ok(self
            .list_devices()?
            .into_iter()
            .find(|info| info.position == Some(position)))
    }
}

/// 2. 设备控制面
///
/// 每个 setter 内部负责硬件层的 lock/unlock configuration。
pub trait CaptureDevice: Send {
    fn info(&self) -> &DeviceInfo;

    fn capabilities(&self) -> Capabilities;

    fn set_flash_mode(&mut self, mode: FlashMode) -> Result<()>;

    /// point 为 None 时只切换模式
    fn set_focus(&mut self, mode: FocusMode, point: Option<Point>) -> Result<()>;

    fn set_exposure(&mut self, mode: ExposureMode, point: Option<Point>) -> Result<()>;

    fn set_white_balance(&mut self, mode: WhiteBalanceMode) -> Result<()>;

    fn set_subject_area_change_monitoring(&mut self, enabled: bool) -> Result<()>;
}

/// 3. 会话数据面
///
/// 只会在控制器的私有 worker 线程上被调用。
pub trait CaptureSession: Send {
    fn handle(&self) -> SessionHandle;

    fn is_running(&self) -> bool;

    fn start_running(&mut self) -> Result<()>;

    fn stop_running(&mut self);

    /// 批量修改 Input/Output 前调用，与 commit 成对出现
    fn begin_configuration(&mut self);

    fn commit_configuration(&mut self);

    fn add_input(&mut self, device: &DeviceInfo) -> Result<()>;

    fn remove_input(&mut self, device_id: &str);

    fn add_output(&mut self, output: OutputKind) -> Result<()>;

    /// 发起拍照，结果稍后从返回的 receiver 交付
    fn capture_still(&mut self, request: StillRequest) -> Result<PendingSample>;

    fn start_recording(&mut self, destination: PathBuf) -> Result<PendingMovie>;

    /// 请求结束录像，finalize 完成后 PendingMovie 才会交付
    fn stop_recording(&mut self);
}

/// 编码后的图片 (写入相册用)
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// 相册中资源的定位符
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetId(pub String);

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 4. 系统相册的"保存"原语
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// 保存图片及其 EXIF，返回资源定位符
    async fn save_image(&self, image: EncodedImage, metadata: SampleMetadata) -> Result<AssetId>;
}
