//! GitHub contents API 客户端
//!
//! 读取 executor 发布到共享仓库的配置记录

use base64::Engine;
use reqwest::{header, Client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::env::{constants::VERSION, SenderConfig};
use crate::domain::PublishedConfig;

/// 配置获取错误
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("error fetching config from GitHub: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to fetch config: {status}, Response: {body}")]
    Status { status: u16, body: String },

    #[error("error decoding GitHub response: {0}")]
    InvalidResponse(#[source] reqwest::Error),

    #[error("error decoding base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("error unmarshalling config JSON: {0}")]
    Config(#[from] serde_json::Error),
}

/// contents API 响应，只取 content 字段
#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
}

/// 共享配置读取器
#[derive(Clone)]
pub struct ConfigFetcher {
    client: Client,
    config: SenderConfig,
}

impl ConfigFetcher {
    /// 创建带 User-Agent 的默认客户端
    pub fn new(config: SenderConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(format!("exec-relay/{}", VERSION))
            .build()
            .map_err(FetchError::Transport)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: SenderConfig) -> Self {
        Self { client, config }
    }

    /// `<api>/repos/<owner>/<repo>/contents/<path>`
    pub fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            self.config.path.trim_start_matches('/')
        )
    }

    /// 读取并解析配置记录
    pub async fn fetch(&self) -> Result<PublishedConfig, FetchError> {
        let url = self.contents_url();
        debug!(url = %url, "Fetching published config");

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.config.token {
            request = request.header(header::AUTHORIZATION, format!("token {}", token));
        }

        let response = request.send().await.map_err(FetchError::Transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let contents: ContentsResponse =
            response.json().await.map_err(FetchError::InvalidResponse)?;
        let config = decode_content(&contents.content)?;

        info!(
            public_url = %config.public_url,
            ip = %config.ip,
            timestamp = %config.timestamp,
            "Fetched published config"
        );
        Ok(config)
    }
}

/// 解码 contents API 的 base64 字段
///
/// GitHub 每 60 个字符插入换行，解码前去掉所有空白
fn decode_content(content: &str) -> Result<PublishedConfig, FetchError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    Ok(PublishedConfig::from_json(&bytes)?)
}
