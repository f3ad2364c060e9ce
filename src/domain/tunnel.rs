//! 隧道 (ngrok) 本地控制 API 的数据类型
//!
//! 纯数据类型，无 tokio/axum 依赖

use serde::Deserialize;

/// `GET /api/tunnels` 响应
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TunnelsResponse {
    #[serde(default)]
    pub tunnels: Vec<TunnelEntry>,
}

/// 单条隧道，只关心公网地址
#[derive(Clone, Debug, Deserialize)]
pub struct TunnelEntry {
    pub public_url: String,
}

impl TunnelsResponse {
    /// 第一条隧道的公网地址
    pub fn first_public_url(&self) -> Option<&str> {
        self.tunnels.first().map(|t| t.public_url.as_str())
    }
}
