//! 共享配置记录
//!
//! executor 发布、sender 读取，用于发现 executor 当前的公网地址

use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use serde::{Deserialize, Serialize};

/// 发布到共享仓库的配置记录
///
/// 文件格式: `{"ip": "..", "port": "..", "timestamp": RFC3339, "public_url": ".."}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedConfig {
    /// 本机出站方向的局域网地址
    pub ip: String,
    /// 监听端口（文件中为字符串）
    pub port: String,
    /// 生成时间，带本地时区偏移
    pub timestamp: DateTime<FixedOffset>,
    /// 隧道公网地址
    pub public_url: String,
}

impl PublishedConfig {
    /// 以当前时间创建记录，精确到秒
    pub fn new(ip: impl Into<String>, port: u16, public_url: impl Into<String>) -> Self {
        let now: DateTime<FixedOffset> = Local::now().into();
        Self {
            ip: ip.into(),
            port: port.to_string(),
            timestamp: now.trunc_subsecs(0),
            public_url: public_url.into(),
        }
    }

    /// 序列化为紧凑 JSON
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
