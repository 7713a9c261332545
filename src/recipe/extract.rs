//! 请求体提取器
//!
//! 解析失败和语义校验失败统一返回 422 及字段级错误

use std::marker::PhantomData;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, header},
};

use super::error::RecipeError;
use super::types::{FieldError, RecipeQuery, RecipeRequest};

/// 已解析并校验的请求体
///
/// `T` 决定按哪种请求格式（simple / detailed）解析
pub struct RecipeJson<T>(pub RecipeQuery, pub PhantomData<fn() -> T>);

impl<S, T> FromRequest<S> for RecipeJson<T>
where
    S: Send + Sync,
    T: RecipeRequest + Send,
{
    type Rejection = RecipeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_json_content_type(req.headers()) {
            return Err(RecipeError::Validation(vec![FieldError::new(
                "body",
                "expected request with `Content-Type: application/json`",
            )]));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| RecipeError::Validation(vec![FieldError::new("body", e.body_text())]))?;

        let payload: T = serde_json::from_slice(&bytes)
            .map_err(|e| RecipeError::Validation(vec![json_error_detail(&e)]))?;

        let query = payload.into_query().map_err(RecipeError::Validation)?;
        Ok(Self(query, PhantomData))
    }
}

/// application/json 或 application/*+json
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// 将 serde_json 错误转换为字段级错误
///
/// 能从 "missing field `x`" 这类信息中识别字段名时使用该字段，否则归为 body
fn json_error_detail(e: &serde_json::Error) -> FieldError {
    let message = e.to_string();
    let field = message
        .split_once('`')
        .filter(|(prefix, _)| {
            prefix.ends_with("missing field ") || prefix.ends_with("duplicate field ")
        })
        .and_then(|(_, rest)| rest.split_once('`'))
        .map(|(name, _)| name)
        .unwrap_or("body")
        .to_string();
    FieldError::new(field, message)
}
