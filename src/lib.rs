//! exec-relay - 隧道后的远程命令执行器
//!
//! 两个独立进程通过共享仓库中的配置记录协作：
//! - executor: 启动隧道 → 发布配置 → 提供 `POST /execute`
//! - sender: 读取配置 → 向公网地址发送指令

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

use anyhow::Context;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{EnvConfig, ExecutorConfig, SenderConfig};
use crate::domain::WorkInstruction;
use crate::infra::{CommandRunner, ConfigFetcher, InstructionSender, SystemCommandRunner};
use crate::services::{ConfigPublisher, TunnelLauncher};
use crate::state::AppState;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// 隧道 + 发布 + 命令服务
    #[default]
    Executor,
    /// 读取配置并发送指令
    Sender,
}

/// 命令行给出的运行时参数
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub mode: Mode,
    /// 覆盖 RELAY_PORT
    pub port_override: Option<u16>,
}

/// 初始化日志，RUST_LOG 未设置时默认 info
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// 按运行模式加载环境配置并执行
pub async fn run_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    let mut env = EnvConfig::from_env();
    if let Some(port) = runtime.port_override {
        env.executor.port = port;
    }

    match runtime.mode {
        Mode::Executor => run_executor(env.executor).await,
        Mode::Sender => run_sender(env.sender).await,
    }
}

/// executor 端: 启动隧道、发布配置，然后提供命令服务直到 Ctrl-C
pub async fn run_executor(config: ExecutorConfig) -> anyhow::Result<()> {
    info!(
        port = config.port,
        tunnel_program = %config.tunnel.program,
        repo = %config.publish.repo_path.display(),
        "Starting executor"
    );
    warn!("POST /execute runs arbitrary commands without authentication; expose it only through a trusted tunnel");

    let tunnel = TunnelLauncher::new(config.tunnel.clone(), config.port)
        .launch()
        .await
        .context("Error starting tunnel")?;

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);

    // Publish failures are logged only; the endpoint stays reachable through the tunnel.
    let publisher = ConfigPublisher::new(config.publish.clone(), config.port, runner.clone());
    if let Err(e) = publisher.publish(&tunnel.public_url).await {
        error!(error = %e, "Failed to publish config");
    }

    let app = api::router(Arc::new(AppState::new(runner)));
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, public_url = %tunnel.public_url, "Server is running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    info!(
        tunnel_exited = tunnel.waiter.is_finished(),
        "Server stopped"
    );
    debug!(
        output = %tunnel.tail_output(20).await.join("\n"),
        "Recent tunnel output"
    );
    Ok(())
}

/// sender 端: 读取共享配置，把示例指令发到 executor
pub async fn run_sender(config: SenderConfig) -> anyhow::Result<()> {
    config.warn_if_anonymous();

    let published = ConfigFetcher::new(config)
        .context("Failed to create HTTP client")?
        .fetch()
        .await
        .context("Error fetching config file")?;

    let instruction = WorkInstruction::training_example();
    InstructionSender::new()
        .send(&published.public_url, &instruction)
        .await
        .context("Error sending instructions")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PublishedConfig;
    use axum::{routing::{get, post}, Json, Router};
    use base64::Engine;
    use tokio::sync::mpsc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_sender_delivers_instruction_to_published_url() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = serve(Router::new().route(
            "/execute",
            post(move |Json(body): Json<WorkInstruction>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    Json(serde_json::json!({"status": "success"}))
                }
            }),
        ))
        .await;

        let published = PublishedConfig::new("10.0.0.2", 8080, executor);
        let content =
            base64::engine::general_purpose::STANDARD.encode(published.to_json().unwrap());
        let github = serve(Router::new().route(
            "/repos/:owner/:repo/contents/*path",
            get(move || {
                let content = content.clone();
                async move { Json(serde_json::json!({ "content": content })) }
            }),
        ))
        .await;

        let config = SenderConfig {
            api_url: github,
            token: Some("token-value".to_string()),
            ..SenderConfig::default()
        };
        run_sender(config).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), WorkInstruction::training_example());
    }

    #[tokio::test]
    async fn test_sender_fails_when_config_missing() {
        let github = serve(Router::new()).await;
        let config = SenderConfig {
            api_url: github,
            ..SenderConfig::default()
        };

        let err = run_sender(config).await.unwrap_err();
        assert!(format!("{:#}", err).contains("404"));
    }
}
