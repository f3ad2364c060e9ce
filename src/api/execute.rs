//! 命令执行 API
//!
//! 只有 POST /execute 一个端点。解码成功即返回成功，命令在后台执行，
//! 响应不反映命令结果。端点无认证、无白名单，只应暴露在受信任的隧道后面。

use axum::{body::Bytes, extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::domain::WorkInstruction;
use crate::error::{ApiError, ApiResult};
use crate::services::spawn_execution;
use crate::state::AppState;

/// 固定响应体 `{"status":"success"}`
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub status: &'static str,
}

/// 创建命令执行路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/execute", post(execute))
}

/// 接收指令并在后台执行
///
/// POST /execute
///
/// 请求体按 JSON 宽松解码（见 [`WorkInstruction::decode`]），不检查 Content-Type
async fn execute(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let instruction = WorkInstruction::decode(&body)
        .map_err(|e| ApiError::bad_request(format!("Error decoding JSON: {}", e)))?;

    info!(
        data_url = %instruction.data_url,
        model_url = %instruction.model_url,
        command = %instruction.command,
        "Received instructions"
    );

    let (execution_id, _task) =
        spawn_execution(state.runner.clone(), instruction, state.reports.clone());
    info!(execution_id = %execution_id, "Command dispatched");

    Ok(Json(ExecuteResponse { status: "success" }))
}
