//! 应用状态

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::ExecutionReport;
use crate::infra::{CommandRunner, SystemCommandRunner};

/// 执行报告广播容量，慢订阅者会丢失旧报告
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// 应用状态
///
/// 请求之间没有共享的可变状态，只有命令执行器和报告广播
pub struct AppState {
    /// 命令执行器
    pub runner: Arc<dyn CommandRunner>,
    /// 命令执行完成报告
    pub reports: broadcast::Sender<ExecutionReport>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self { runner, reports }
    }

    /// 订阅执行报告
    pub fn subscribe_reports(&self) -> broadcast::Receiver<ExecutionReport> {
        self.reports.subscribe()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }
}
