//! 即发即忘的后台任务

use std::future::Future;
use tokio::task::{JoinError, JoinHandle};

/// 后台任务句柄
///
/// 触发方不需要 join，丢弃句柄不会取消任务。任务结果对触发方不可见，
/// 只能通过日志或广播观察。
#[derive(Debug)]
pub struct Detached {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Detached {
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(task = name, "Spawning detached task");
        Self {
            name,
            handle: tokio::spawn(future),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待任务结束（仅诊断/测试使用）
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}
