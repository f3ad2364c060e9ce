//! ngrok 隧道启动
//!
//! 启动 `<program> http <port>`，固定等待一段时间，然后向本地控制 API
//! 查询分配到的公网地址。不做进程监管，只有一个后台任务记录进程的退出。
//!
//! stdout/stderr 从启动起就持续读入同一个有界行缓冲，输出多的子进程
//! 不会因管道写满而阻塞。

use std::{collections::VecDeque, process::Stdio, sync::Arc};

use reqwest::Client;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::RwLock,
    time::sleep,
};
use tracing::{error, info, warn};

use crate::{config::env::TunnelConfig, domain::tunnel::TunnelsResponse, infra::Detached};

/// 输出缓冲保留的最大行数
const MAX_OUTPUT_LINES: usize = 2000;

/// 隧道进程的输出行，stdout 与 stderr 按到达顺序交错
type OutputLines = Arc<RwLock<VecDeque<String>>>;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to get tunnel public URL: {0}")]
    ControlApi(#[from] reqwest::Error),

    #[error("failed to unmarshal tunnel API response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("no tunnels found")]
    NoTunnels,
}

/// 当前隧道。只有 `public_url` 会经发布的配置离开本进程
#[derive(Debug)]
pub struct TunnelInfo {
    pub public_url: String,
    /// 退出等待任务，可以不 join
    pub waiter: Detached,
    output: OutputLines,
}

impl TunnelInfo {
    /// 最近的 `tail` 行进程输出
    pub async fn tail_output(&self, tail: usize) -> Vec<String> {
        let lines = self.output.read().await;
        let skip = lines.len().saturating_sub(tail);
        lines.iter().skip(skip).cloned().collect()
    }
}

pub struct TunnelLauncher {
    config: TunnelConfig,
    port: u16,
    client: Client,
}

impl TunnelLauncher {
    pub fn new(config: TunnelConfig, port: u16) -> Self {
        Self {
            config,
            port,
            client: Client::new(),
        }
    }

    pub async fn launch(&self) -> Result<TunnelInfo, TunnelError> {
        let port = self.port.to_string();
        let mut child = Command::new(&self.config.program)
            .args(["http", port.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 任务被丢弃（运行时关闭）时一并结束隧道
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let output: OutputLines = Arc::new(RwLock::new(VecDeque::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(drain("tunnel-stdout", stdout, "stdout", output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(drain("tunnel-stderr", stderr, "stderr", output.clone()));
        }

        info!(
            program = %self.config.program,
            port = self.port,
            pid = ?child.id(),
            settle_ms = self.config.settle_delay.as_millis() as u64,
            "Tunnel process started, waiting for control API"
        );

        sleep(self.config.settle_delay).await;

        let public_url = match self.query_public_url().await {
            Ok(url) => url,
            Err(e) => {
                // 没人会发布这个隧道，结束它
                if let Err(kill_err) = child.start_kill() {
                    warn!(program = %self.config.program, error = %kill_err, "Failed to kill tunnel process");
                }
                // 仍由 waiter 回收进程
                self.spawn_waiter(child, readers, output);
                return Err(e);
            }
        };

        let waiter = self.spawn_waiter(child, readers, output.clone());

        info!(public_url = %public_url, "Tunnel started successfully");
        Ok(TunnelInfo {
            public_url,
            waiter,
            output,
        })
    }

    /// 等待进程退出，读完剩余输出后记录退出状态
    fn spawn_waiter(&self, mut child: Child, readers: Vec<Detached>, output: OutputLines) -> Detached {
        let program = self.config.program.clone();
        Detached::spawn("tunnel-waiter", async move {
            let status = child.wait().await;
            for reader in readers {
                let _ = reader.join().await;
            }
            let output = output.read().await.iter().cloned().collect::<Vec<_>>().join("\n");

            match status {
                Ok(status) if status.success() => {
                    info!(program = %program, output = %output, "Tunnel process exited");
                }
                Ok(status) => {
                    warn!(
                        program = %program,
                        status = %status,
                        output = %output,
                        "Tunnel process exited with error"
                    );
                }
                Err(e) => {
                    error!(program = %program, error = %e, "Failed to wait for tunnel process");
                }
            }
        })
    }

    /// `GET <api_url>` 返回的第一条隧道
    pub async fn query_public_url(&self) -> Result<String, TunnelError> {
        let body = self
            .client
            .get(&self.config.api_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: TunnelsResponse = serde_json::from_str(&body)?;
        response
            .first_public_url()
            .map(str::to_string)
            .ok_or(TunnelError::NoTunnels)
    }
}

/// 持续读取一个输出管道，直到 EOF
fn drain<R>(name: &'static str, stream: R, label: &'static str, lines: OutputLines) -> Detached
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Detached::spawn(name, async move {
        let mut reader = BufReader::new(stream).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            let mut buf = lines.write().await;
            buf.push_back(format!("[{}] {}", label, line));
            while buf.len() > MAX_OUTPUT_LINES {
                buf.pop_front();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use std::time::Duration;

    async fn control_api(body: &'static str) -> String {
        let router = Router::new().route(
            "/api/tunnels",
            get(move || async move { ([("content-type", "application/json")], body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/tunnels", addr)
    }

    fn launcher(program: &str, api_url: String) -> TunnelLauncher {
        TunnelLauncher::new(
            TunnelConfig {
                program: program.to_string(),
                api_url,
                settle_delay: Duration::from_millis(10),
            },
            8080,
        )
    }

    #[tokio::test]
    async fn test_query_picks_first_tunnel() {
        let url = control_api(
            r#"{"tunnels":[{"public_url":"https://first.ngrok.io"},{"public_url":"https://second.ngrok.io"}]}"#,
        )
        .await;

        let public_url = launcher("true", url).query_public_url().await.unwrap();
        assert_eq!(public_url, "https://first.ngrok.io");
    }

    #[tokio::test]
    async fn test_query_zero_tunnels_fails() {
        let url = control_api(r#"{"tunnels":[]}"#).await;
        let result = launcher("true", url).query_public_url().await;
        assert!(matches!(result, Err(TunnelError::NoTunnels)));
    }

    #[tokio::test]
    async fn test_query_unparseable_response() {
        let url = control_api("<html>ngrok</html>").await;
        let result = launcher("true", url).query_public_url().await;
        assert!(matches!(result, Err(TunnelError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_query_unreachable_api() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = launcher("true", format!("http://{}/api/tunnels", addr))
            .query_public_url()
            .await;
        assert!(matches!(result, Err(TunnelError::ControlApi(_))));
    }

    #[tokio::test]
    async fn test_launch_returns_public_url_and_waiter() {
        let url = control_api(r#"{"tunnels":[{"public_url":"https://abc.ngrok.io"}]}"#).await;

        let info = launcher("true", url).launch().await.unwrap();
        assert_eq!(info.public_url, "https://abc.ngrok.io");
        assert_eq!(info.waiter.name(), "tunnel-waiter");

        tokio::time::timeout(Duration::from_secs(5), info.waiter.join())
            .await
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_drained_while_waiting_for_control_api() {
        let url = control_api(r#"{"tunnels":[{"public_url":"https://abc.ngrok.io"}]}"#).await;
        let mut launcher = launcher("yes", url);
        launcher.config.settle_delay = Duration::from_millis(200);

        // `yes http 8080` 不停输出，远超管道容量
        let info = launcher.launch().await.unwrap();
        let tail = info.tail_output(3).await;

        assert_eq!(tail.len(), 3);
        assert!(tail.iter().all(|line| line == "[stdout] http 8080"));
        assert!(info.output.read().await.len() <= MAX_OUTPUT_LINES);
        assert!(!info.waiter.is_finished());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_captures_exited_process_output() {
        let url = control_api(r#"{"tunnels":[{"public_url":"https://abc.ngrok.io"}]}"#).await;
        let launcher = launcher("echo", url);

        let info = launcher.launch().await.unwrap();
        let output = info.output.clone();
        tokio::time::timeout(Duration::from_secs(5), info.waiter.join())
            .await
            .unwrap()
            .unwrap();

        let lines: Vec<String> = output.read().await.iter().cloned().collect();
        assert_eq!(lines, vec!["[stdout] http 8080".to_string()]);
    }

    #[tokio::test]
    async fn test_launch_zero_tunnels_yields_no_url() {
        let url = control_api(r#"{"tunnels":[]}"#).await;
        let result = launcher("true", url).launch().await;
        assert!(matches!(result, Err(TunnelError::NoTunnels)));
    }

    #[tokio::test]
    async fn test_launch_spawn_failure() {
        let result = launcher("nonexistent_tunnel_12345", "http://127.0.0.1:1/api/tunnels".into())
            .launch()
            .await;
        assert!(matches!(result, Err(TunnelError::Spawn { .. })));
    }
}
