//! 食谱 API 请求处理器

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use futures::Stream;
use serde_json::json;
use uuid::Uuid;

use super::error::RecipeError;
use super::extract::RecipeJson;
use super::middleware::AppState;
use super::stream::into_events;
use super::types::{RecipeRequest, RecipeResponse};

/// GET /
///
/// 公开的欢迎信息，无需认证
pub async fn root(request: Request) -> impl IntoResponse {
    let client_host = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    Json(json!({
        "message": "Selamat datang ke 'Biar Kami Masak API'!",
        "version": env!("CARGO_PKG_VERSION"),
        "client_host": client_host,
    }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// POST /v1/recipe/simple 与 /v1/recipe/detailed
///
/// 等待完整回复后返回结构化食谱
pub async fn recipe<T>(
    State(state): State<AppState>,
    RecipeJson(query, _): RecipeJson<T>,
) -> Result<Json<RecipeResponse>, RecipeError>
where
    T: RecipeRequest + Send + 'static,
{
    let request_id = Uuid::new_v4();
    tracing::info!(
        request_id = %request_id,
        kind = T::KIND,
        ingredients = query.ingredients.len(),
        servings = query.servings,
        "收到食谱请求"
    );

    let recipe = state
        .service
        .generate(&query, request_id)
        .await
        .inspect_err(|e| tracing::error!(request_id = %request_id, error = %e, "食谱生成失败"))?;

    Ok(Json(recipe))
}

/// POST /v1/recipe/simple/stream 与 /v1/recipe/detailed/stream
///
/// 以 SSE 逐段转发模型输出
pub async fn recipe_stream<T>(
    State(state): State<AppState>,
    RecipeJson(query, _): RecipeJson<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send>
where
    T: RecipeRequest + Send + 'static,
{
    let request_id = Uuid::new_v4();
    tracing::info!(
        request_id = %request_id,
        kind = T::KIND,
        ingredients = query.ingredients.len(),
        servings = query.servings,
        "收到流式食谱请求"
    );

    Sse::new(into_events(state.service.generate_stream(&query, request_id)))
}
