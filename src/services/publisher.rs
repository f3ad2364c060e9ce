//! 配置发布
//!
//! 生成 `PublishedConfig`，写入本地文件，再经 git 推送到共享仓库：
//! - 探测本机出站地址
//! - 原子写入配置文件（整体覆盖）
//! - pull → add → commit → push，任何一步失败即中止
//!
//! 非事务性：本地写入成功但推送失败时，本地与远端不一致，不回滚。

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::{fs, net::UdpSocket};
use tracing::info;

use crate::config::env::PublishConfig;
use crate::domain::PublishedConfig;
use crate::infra::command::{run_checked, CommandError, CommandRunner};

/// 远端同步步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Pull,
    Add,
    Commit,
    Push,
}

impl SyncStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::Pull => "pull",
            SyncStep::Add => "add",
            SyncStep::Commit => "commit",
            SyncStep::Push => "push",
        }
    }
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 发布错误
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Error getting IP address: {0}")]
    LocalIp(#[source] std::io::Error),

    #[error("Error marshalling config JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Error writing config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository path {0} does not exist")]
    RepoMissing(PathBuf),

    #[error("git {step} failed: {source}")]
    Git {
        step: SyncStep,
        #[source]
        source: CommandError,
    },
}

/// 配置发布器
pub struct ConfigPublisher {
    config: PublishConfig,
    port: u16,
    runner: Arc<dyn CommandRunner>,
}

impl ConfigPublisher {
    pub fn new(config: PublishConfig, port: u16, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            port,
            runner,
        }
    }

    /// 完整发布流程，返回写入的记录
    pub async fn publish(&self, public_url: &str) -> Result<PublishedConfig, PublishError> {
        let ip = outbound_ip(&self.config.probe_addr)
            .await
            .map_err(PublishError::LocalIp)?;

        let record = PublishedConfig::new(ip.to_string(), self.port, public_url);
        let config_path = self.config_path()?;
        write_record(&config_path, &record).await?;

        info!(
            path = %config_path.display(),
            ip = %record.ip,
            public_url = %record.public_url,
            "Wrote config file"
        );

        self.sync_remote().await?;

        info!("Config update and push completed successfully");
        Ok(record)
    }

    /// 把配置文件同步到远端仓库
    pub async fn sync_remote(&self) -> Result<(), PublishError> {
        let repo = self.config.repo_path.as_path();
        if !repo.is_dir() {
            return Err(PublishError::RepoMissing(repo.to_path_buf()));
        }

        self.git(SyncStep::Pull, &["pull", self.config.remote.as_str(), self.config.branch.as_str()])
            .await?;
        info!(repo = %repo.display(), "Pulled latest changes successfully");

        // 仓库目录与 cwd 不同时，相对路径会指向另一个文件
        let config_path = self.config_path()?.to_string_lossy().into_owned();
        self.git(SyncStep::Add, &["add", config_path.as_str()]).await?;
        self.git(SyncStep::Commit, &["commit", "-m", self.config.commit_message.as_str()])
            .await?;
        self.git(SyncStep::Push, &["push", self.config.remote.as_str(), self.config.branch.as_str()])
            .await?;

        Ok(())
    }

    /// 配置文件的绝对路径，相对路径按进程 cwd 解析
    ///
    /// 写入与 `git add` 都使用这个路径
    fn config_path(&self) -> Result<PathBuf, PublishError> {
        std::path::absolute(&self.config.config_path).map_err(|source| PublishError::Write {
            path: self.config.config_path.clone(),
            source,
        })
    }

    async fn git(&self, step: SyncStep, args: &[&str]) -> Result<(), PublishError> {
        run_checked(
            self.runner.as_ref(),
            "git",
            args,
            Some(self.config.repo_path.as_path()),
        )
        .await
        .map(|_| ())
        .map_err(|source| PublishError::Git { step, source })
    }
}

/// 本机出站方向的地址
///
/// UDP connect 只确定路由，不会发送数据
pub async fn outbound_ip(probe_addr: &str) -> std::io::Result<IpAddr> {
    let target = tokio::net::lookup_host(probe_addr)
        .await?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "probe address did not resolve"))?;

    let bind_addr = match target {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(target).await?;
    Ok(socket.local_addr()?.ip())
}

/// 写入配置文件（原子写入）
pub async fn write_record(path: &Path, record: &PublishedConfig) -> Result<(), PublishError> {
    let content = record.to_json()?;
    let temp_path = path.with_extension("json.tmp");

    let write_err = |source| PublishError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    fs::write(&temp_path, &content).await.map_err(write_err)?;
    fs::rename(&temp_path, path).await.map_err(write_err)?;

    Ok(())
}
