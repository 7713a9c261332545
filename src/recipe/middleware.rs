//! 食谱 API 中间件

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::common::auth;

use super::error::RecipeError;
use super::service::RecipeService;

/// 应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 服务端 API 密钥，与 X-Recipe-API-Key 比对
    pub api_key: String,
    pub service: Arc<RecipeService>,
}

impl AppState {
    pub fn new(api_key: impl Into<String>, service: RecipeService) -> Self {
        Self {
            api_key: api_key.into(),
            service: Arc::new(service),
        }
    }
}

/// API Key 认证中间件
///
/// 在读取请求体之前执行，认证失败的请求不会触发参数校验
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match auth::extract_api_key(&request) {
        Some(key) if auth::constant_time_eq(&key, &state.api_key) => next.run(request).await,
        _ => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "API Key 校验失败"
            );
            RecipeError::Auth.into_response()
        }
    }
}

/// CORS 中间件层
///
/// 允许任意来源、方法和请求头
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
