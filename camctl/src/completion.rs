//! 一次性完成通知
//!
//! 每个控制器操作都会立刻返回一个 `Completion<T>`，结果由 worker 或在途的硬件任务稍后填充。
//! 可以 `.await`，可以 `on_complete` 注册回调，也可以在同步代码里 `wait()`。
//! 丢弃 Completion 是合法的，结果会被静默丢弃。

use crate::internal::runtime;
use camctl_core::error::{CameraError, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// 操作结果的接收端
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
    // 完成上下文：on_complete 回调在这里执行
    handle: Handle,
}

/// 操作结果的发送端，只在 crate 内部流转
pub(crate) struct Completer<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn channel(handle: Handle) -> (Completer<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (Completer { tx }, Self { rx, handle })
    }

    pub(crate) fn ready_on(handle: Handle, result: Result<T>) -> Self {
        let (completer, completion) = Self::channel(handle);
        completer.complete(result);
        completion
    }

    /// 已经有结果的 Completion
    pub fn ready(result: Result<T>) -> Self {
        Self::ready_on(runtime::completion_handle(), result)
    }

    /// 阻塞当前线程直到结果到达
    ///
    /// 不能在异步上下文里调用 (会 panic)，异步代码请直接 `.await`。
    pub fn wait(self) -> Result<T> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(CameraError::SessionNotRunning))
    }

    /// 非阻塞地查看结果，尚未完成时返回 None
    pub fn try_result(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(CameraError::SessionNotRunning)),
        }
    }
}

impl<T: Send + 'static> Completion<T> {
    /// 结果到达后在完成上下文上执行回调
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let handle = self.handle.clone();
        handle.spawn(async move {
            callback(self.await);
        });
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // 发送端被丢弃意味着 worker 已经退出
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CameraError::SessionNotRunning)))
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

impl<T> Completer<T> {
    /// 交付结果；调用方已经丢弃 Completion 时返回 false
    pub(crate) fn complete(self, result: Result<T>) -> bool {
        self.tx.send(result).is_ok()
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
