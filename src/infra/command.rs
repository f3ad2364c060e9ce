//! 命令执行器
//!
//! 外部命令（git、shell）统一经过 `CommandRunner`，便于在测试中替换：
//! - 捕获 stdout/stderr
//! - 非零退出码转为错误
//! - 平台相关的 shell 调用

use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Output};
use thiserror::Error;
use tokio::process::Command;

/// 命令执行错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 命令启动失败
    #[error("Failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 命令以非零状态退出
    #[error("`{command}` exited with {status}. Output: {output}")]
    Failed {
        command: String,
        status: ExitStatus,
        output: String,
    },
}

/// 执行外部命令并等待结束
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 运行命令并捕获输出，不检查退出码
    ///
    /// `work_dir` 为 None 时继承当前目录
    async fn output(
        &self,
        program: &str,
        args: &[&str],
        work_dir: Option<&Path>,
    ) -> Result<Output, CommandError>;
}

/// 基于 tokio::process 的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn output(
        &self,
        program: &str,
        args: &[&str],
        work_dir: Option<&Path>,
    ) -> Result<Output, CommandError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = work_dir {
            cmd.current_dir(dir);
        }

        cmd.output().await.map_err(|source| CommandError::SpawnFailed {
            program: program.to_string(),
            source,
        })
    }
}

/// 运行命令，非零退出视为失败
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    work_dir: Option<&Path>,
) -> Result<Output, CommandError> {
    let output = runner.output(program, args, work_dir).await?;
    if !output.status.success() {
        return Err(CommandError::Failed {
            command: display_command(program, args),
            status: output.status,
            output: combined_output(&output),
        });
    }
    Ok(output)
}

/// 本地 shell 调用方式: Unix 用 `sh -c`，Windows 用 `cmd /C`
pub fn shell_invocation(command: &str) -> (&'static str, [&str; 2]) {
    if cfg!(windows) {
        ("cmd", ["/C", command])
    } else {
        ("sh", ["-c", command])
    }
}

/// stdout 在前、stderr 在后的合并输出
///
/// 两个流分别缓冲后拼接，不保留它们之间的交错顺序
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
