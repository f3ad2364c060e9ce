//! 工作指令的后台执行

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{ExecutionReport, WorkInstruction};
use crate::infra::command::{combined_output, shell_invocation, CommandRunner};
use crate::infra::Detached;

/// 通过本地 shell 执行 `instruction.command`，不等待结束
///
/// 结果只写日志并广播到 `reports`，触发方看不到。没有超时，也不会被终止
pub fn spawn_execution(
    runner: Arc<dyn CommandRunner>,
    instruction: WorkInstruction,
    reports: broadcast::Sender<ExecutionReport>,
) -> (Uuid, Detached) {
    let execution_id = Uuid::new_v4();

    let task = Detached::spawn("command", async move {
        let command = instruction.command;
        let (shell, args) = shell_invocation(&command);

        let result = runner.output(shell, &args, None).await;

        let report = match result {
            Ok(output) => {
                let text = combined_output(&output);
                if output.status.success() {
                    info!(execution_id = %execution_id, output = %text, "Command executed successfully");
                } else {
                    warn!(
                        execution_id = %execution_id,
                        status = %output.status,
                        output = %text,
                        "Error executing command"
                    );
                }
                ExecutionReport {
                    execution_id,
                    command,
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    output: text,
                }
            }
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "Failed to start command");
                ExecutionReport {
                    execution_id,
                    command,
                    success: false,
                    exit_code: None,
                    output: e.to_string(),
                }
            }
        };

        // 没有订阅者时发送失败，忽略
        let _ = reports.send(report);
    });

    (execution_id, task)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::infra::SystemCommandRunner;
    use std::time::Duration;

    async fn run(command: &str) -> ExecutionReport {
        let (tx, mut rx) = broadcast::channel(4);
        let (id, _task) = spawn_execution(
            Arc::new(SystemCommandRunner),
            WorkInstruction::new("http://x", "", command),
            tx,
        );

        let report = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.execution_id, id);
        report
    }

    #[tokio::test]
    async fn test_successful_command_reports_output() {
        let report = run("echo hi").await;
        assert!(report.success);
        assert_eq!(report.exit_code, Some(0));
        assert!(report.output.contains("hi"));
        assert_eq!(report.command, "echo hi");
    }

    #[tokio::test]
    async fn test_failing_command_reports_exit_code_and_stderr() {
        let report = run("echo broken >&2; exit 7").await;
        assert!(!report.success);
        assert_eq!(report.exit_code, Some(7));
        assert!(report.output.contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_program_is_reported_not_panicked() {
        let report = run("definitely_not_a_real_program_12345").await;
        assert!(!report.success);
        assert_eq!(report.exit_code, Some(127));
    }
}
