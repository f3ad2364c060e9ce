//! executor `/execute` 端点的 HTTP 客户端

use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::domain::WorkInstruction;

/// 指令发送错误
#[derive(Debug, Error)]
pub enum SendError {
    #[error("error sending instructions: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to send instructions: {status}, Response: {body}")]
    Status { status: u16, body: String },
}

/// 指令发送器
#[derive(Clone, Default)]
pub struct InstructionSender {
    client: Client,
}

impl InstructionSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// `POST <public_url>/execute`
    ///
    /// 只检查状态码，不解析响应体
    pub async fn send(
        &self,
        public_url: &str,
        instruction: &WorkInstruction,
    ) -> Result<(), SendError> {
        let url = execute_url(public_url);

        let response = self.client.post(&url).json(instruction).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Status { status, body });
        }

        info!(url = %url, command = %instruction.command, "Instructions sent successfully");
        Ok(())
    }
}

fn execute_url(public_url: &str) -> String {
    format!("{}/execute", public_url.trim_end_matches('/'))
}
