//! 食谱 API 错误类型
//!
//! 上游错误的细节只写日志，返回给客户端的只有通用信息。

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::llm::LlmError;

use super::types::{ErrorResponse, FieldError};

#[derive(Debug, Error)]
pub enum RecipeError {
    /// API Key 缺失或不匹配
    #[error("invalid or missing API key")]
    Auth,

    /// 请求体无法解析或未通过校验
    #[error("request body failed validation")]
    Validation(Vec<FieldError>),

    /// LLM 上游失败（网络、非 2xx、超时、空回复）
    #[error("recipe generation failed: {0}")]
    Upstream(#[from] LlmError),
}

impl RecipeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecipeError::Auth => StatusCode::FORBIDDEN,
            RecipeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecipeError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RecipeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            RecipeError::Auth => {
                let mut response = (status, Json(ErrorResponse::authentication_error())).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("API key"));
                response
            }
            RecipeError::Validation(details) => {
                (status, Json(ErrorResponse::validation_error(details))).into_response()
            }
            RecipeError::Upstream(_) => (status, Json(ErrorResponse::upstream_error())).into_response(),
        }
    }
}
