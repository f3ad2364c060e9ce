//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// 环境配置
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// executor 端配置
    pub executor: ExecutorConfig,
    /// sender 端配置
    pub sender: SenderConfig,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            executor: ExecutorConfig::from_env(),
            sender: SenderConfig::from_env(),
        }
    }
}

/// executor 端配置: 隧道 + 发布 + 命令服务
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// 服务监听端口，同时是隧道转发的本地端口
    pub port: u16,
    pub tunnel: TunnelConfig,
    pub publish: PublishConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            port: defaults::PORT,
            tunnel: TunnelConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn from_env() -> Self {
        let port = env::var("RELAY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::PORT);

        Self {
            port,
            tunnel: TunnelConfig::from_env(),
            publish: PublishConfig::from_env(),
        }
    }
}

/// 隧道进程配置
#[derive(Clone, Debug)]
pub struct TunnelConfig {
    /// 隧道程序，以 `<program> http <port>` 启动
    pub program: String,
    /// 本地控制 API
    pub api_url: String,
    /// 启动后固定等待时间
    pub settle_delay: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            program: defaults::TUNNEL_PROGRAM.to_string(),
            api_url: defaults::TUNNEL_API_URL.to_string(),
            settle_delay: Duration::from_millis(defaults::TUNNEL_SETTLE_MS),
        }
    }
}

impl TunnelConfig {
    pub fn from_env() -> Self {
        let program =
            env::var("RELAY_TUNNEL_PROGRAM").unwrap_or_else(|_| defaults::TUNNEL_PROGRAM.to_string());
        let api_url =
            env::var("RELAY_TUNNEL_API_URL").unwrap_or_else(|_| defaults::TUNNEL_API_URL.to_string());
        let settle_ms = env::var("RELAY_TUNNEL_SETTLE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::TUNNEL_SETTLE_MS);

        Self {
            program,
            api_url,
            settle_delay: Duration::from_millis(settle_ms),
        }
    }
}

/// 配置发布（本地文件 + git 远端）
#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// 探测出站地址用的外部地址，不会真正发包
    pub probe_addr: String,
    /// 本地配置文件路径
    pub config_path: PathBuf,
    /// git 仓库目录
    pub repo_path: PathBuf,
    pub remote: String,
    pub branch: String,
    pub commit_message: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            probe_addr: defaults::PROBE_ADDR.to_string(),
            config_path: PathBuf::from(defaults::CONFIG_PATH),
            repo_path: PathBuf::from(defaults::REPO_PATH),
            remote: defaults::GIT_REMOTE.to_string(),
            branch: defaults::GIT_BRANCH.to_string(),
            commit_message: defaults::COMMIT_MESSAGE.to_string(),
        }
    }
}

impl PublishConfig {
    pub fn from_env() -> Self {
        Self {
            probe_addr: env::var("RELAY_PROBE_ADDR")
                .unwrap_or_else(|_| defaults::PROBE_ADDR.to_string()),
            config_path: env::var("RELAY_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::CONFIG_PATH)),
            repo_path: env::var("RELAY_REPO_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(defaults::REPO_PATH)),
            remote: env::var("RELAY_GIT_REMOTE").unwrap_or_else(|_| defaults::GIT_REMOTE.to_string()),
            branch: env::var("RELAY_GIT_BRANCH").unwrap_or_else(|_| defaults::GIT_BRANCH.to_string()),
            commit_message: env::var("RELAY_COMMIT_MESSAGE")
                .unwrap_or_else(|_| defaults::COMMIT_MESSAGE.to_string()),
        }
    }
}

/// sender 端配置: 从 GitHub contents API 读取共享配置
#[derive(Clone, Debug)]
pub struct SenderConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// 仓库内配置文件路径
    pub path: String,
    /// 访问令牌，未设置时不带 Authorization
    pub token: Option<String>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::GITHUB_API_URL.to_string(),
            owner: defaults::GITHUB_OWNER.to_string(),
            repo: defaults::GITHUB_REPO.to_string(),
            path: defaults::GITHUB_PATH.to_string(),
            token: None,
        }
    }
}

impl SenderConfig {
    pub fn from_env() -> Self {
        let token = load_with_fallback("RELAY_GITHUB_TOKEN", "GITHUB_TOKEN").filter(|s| !s.is_empty());

        Self {
            api_url: env::var("RELAY_GITHUB_API_URL")
                .unwrap_or_else(|_| defaults::GITHUB_API_URL.to_string()),
            owner: env::var("RELAY_GITHUB_OWNER")
                .unwrap_or_else(|_| defaults::GITHUB_OWNER.to_string()),
            repo: env::var("RELAY_GITHUB_REPO").unwrap_or_else(|_| defaults::GITHUB_REPO.to_string()),
            path: env::var("RELAY_GITHUB_PATH").unwrap_or_else(|_| defaults::GITHUB_PATH.to_string()),
            token,
        }
    }

    /// 启动时提示缺失的令牌
    pub fn warn_if_anonymous(&self) {
        if self.token.is_none() {
            warn!(
                owner = %self.owner,
                repo = %self.repo,
                "No RELAY_GITHUB_TOKEN set, fetching config anonymously"
            );
        }
    }
}

/// 加载环境变量，支持 fallback
fn load_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

/// 默认值
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const TUNNEL_PROGRAM: &str = "ngrok";
    pub const TUNNEL_API_URL: &str = "http://localhost:4040/api/tunnels";
    pub const TUNNEL_SETTLE_MS: u64 = 2000;
    pub const PROBE_ADDR: &str = "8.8.8.8:80";
    pub const CONFIG_PATH: &str = "config.json";
    pub const REPO_PATH: &str = ".";
    pub const GIT_REMOTE: &str = "origin";
    pub const GIT_BRANCH: &str = "main";
    pub const COMMIT_MESSAGE: &str = "Update config with public URL and timestamp";
    pub const GITHUB_API_URL: &str = "https://api.github.com";
    pub const GITHUB_OWNER: &str = "github_user";
    pub const GITHUB_REPO: &str = "repo";
    pub const GITHUB_PATH: &str = "config.json";
}

/// 常量
pub mod constants {
    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
