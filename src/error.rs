//! 统一错误处理
//!
//! `ApiError` 实现 `IntoResponse`，业务模块各自定义 thiserror 错误类型

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 400 - 请求无效，响应体为纯文本
    BadRequest(String),
}

impl ApiError {
    /// 创建请求无效错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_request_is_plain_text() {
        let response = ApiError::bad_request("Error decoding JSON: EOF").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Error decoding JSON: EOF");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::bad_request("nope").to_string(),
            "Bad request: nope"
        );
    }
}
