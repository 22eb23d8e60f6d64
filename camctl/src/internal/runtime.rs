use std::sync::OnceLock;
use tokio::runtime::{Handle, Runtime};

// 全局单例 Runtime
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// 获取全局 Runtime，如果不存在则创建
/// 这允许用户不写 #[tokio::main] 也能拿到 Completion 和 delegate 回调
pub(crate) fn get_runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2) // 只做结果交付和事件分发，2个线程足矣
            .thread_name("camctl-bg-worker")
            .build()
            .expect("Failed to create camctl background runtime")
    })
}

/// 完成上下文：优先使用调用方所在的 runtime，否则退回全局 runtime
pub(crate) fn completion_handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| get_runtime().handle().clone())
}
