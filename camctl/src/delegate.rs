//! 生命周期事件的 delegate 分发
//!
//! worker 线程只负责把事件塞进 channel，真正调用 delegate 的是完成上下文上的一个分发任务，
//! 所以 delegate 永远不会在 worker 线程上被回调，事件顺序与发出顺序一致。

use camctl_core::error::CameraError;
use camctl_core::settings::DevicePosition;
use camctl_core::traits::SessionNotification;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 控制器的观察者
///
/// 所有方法都有空的默认实现，只需覆盖关心的事件。
/// 控制器只持有弱引用，调用方负责让 delegate 活着。
pub trait ControllerDelegate: Send + Sync {
    fn will_cycle_position(&self) {}

    fn did_cycle_position(&self, _position: DevicePosition) {}

    fn subject_area_did_change(&self) {}

    fn session_did_start_running(&self) {}

    fn session_did_stop_running(&self) {}

    fn session_did_error(&self, _error: &CameraError) {}

    fn session_was_interrupted(&self) {}

    fn session_interruption_ended(&self) {}

    fn did_start_recording(&self) {}

    fn did_stop_recording(&self) {}
}

/// 分发给 delegate 的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    WillCyclePosition,
    DidCyclePosition(DevicePosition),
    SubjectAreaDidChange,
    SessionDidStartRunning,
    SessionDidStopRunning,
    SessionDidError(CameraError),
    SessionWasInterrupted,
    SessionInterruptionEnded,
    DidStartRecording,
    DidStopRecording,
}

impl ControllerEvent {
    fn deliver(&self, delegate: &dyn ControllerDelegate) {
        match self {
            Self::WillCyclePosition => delegate.will_cycle_position(),
            Self::DidCyclePosition(position) => delegate.did_cycle_position(*position),
            Self::SubjectAreaDidChange => delegate.subject_area_did_change(),
            Self::SessionDidStartRunning => delegate.session_did_start_running(),
            Self::SessionDidStopRunning => delegate.session_did_stop_running(),
            Self::SessionDidError(error) => delegate.session_did_error(error),
            Self::SessionWasInterrupted => delegate.session_was_interrupted(),
            Self::SessionInterruptionEnded => delegate.session_interruption_ended(),
            Self::DidStartRecording => delegate.did_start_recording(),
            Self::DidStopRecording => delegate.did_stop_recording(),
        }
    }

    /// 硬件通知 -> 事件；未开启监控时丢弃 subject-area 通知
    fn from_notification(notification: SessionNotification, monitoring: bool) -> Option<Self> {
        match notification {
            SessionNotification::RuntimeError(error) => Some(Self::SessionDidError(error)),
            SessionNotification::WasInterrupted => Some(Self::SessionWasInterrupted),
            SessionNotification::InterruptionEnded => Some(Self::SessionInterruptionEnded),
            SessionNotification::SubjectAreaDidChange if monitoring => {
                Some(Self::SubjectAreaDidChange)
            }
            SessionNotification::SubjectAreaDidChange => None,
        }
    }
}

pub(crate) type EventSender = mpsc::UnboundedSender<ControllerEvent>;

/// 可替换的弱引用槽位
#[derive(Clone, Default)]
pub(crate) struct DelegateSlot(Arc<RwLock<Option<Weak<dyn ControllerDelegate>>>>);

impl DelegateSlot {
    pub(crate) fn set(&self, delegate: Weak<dyn ControllerDelegate>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(delegate);
    }

    pub(crate) fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<dyn ControllerDelegate>> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for DelegateSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateSlot")
            .field("attached", &self.upgrade().is_some())
            .finish()
    }
}

/// 启动分发任务
///
/// 事件 channel 关闭 (控制器和 worker 都已退出) 时任务结束；
/// 硬件通知 channel 可能比控制器活得更久，不影响退出。
pub(crate) fn spawn_dispatcher(
    handle: &Handle,
    slot: DelegateSlot,
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
    mut notifications: mpsc::UnboundedReceiver<SessionNotification>,
    subject_area_monitoring: bool,
) -> JoinHandle<()> {
    handle.spawn(async move {
        loop {
            // 控制器事件优先，保证同一时刻就绪时的先后顺序
            let event = tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => Some(event),
                    None => break,
                },
                Some(notification) = notifications.recv() => {
                    ControllerEvent::from_notification(notification, subject_area_monitoring)
                }
            };
            let Some(event) = event else { continue };

            match slot.upgrade() {
                Some(delegate) => event.deliver(delegate.as_ref()),
                None => log::trace!("No delegate attached, dropping {:?}", event),
            }
        }
        log::debug!("Delegate dispatcher finished");
    })
}
