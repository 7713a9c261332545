//! 食谱 API 路由配置

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::{
    handlers::{health, recipe, recipe_stream, root},
    middleware::{AppState, auth_middleware, cors_layer},
    types::{DetailedRecipeRequest, SimpleRecipeRequest},
};

/// 创建食谱 API 路由
///
/// # 端点
/// - `GET /` - 欢迎信息（公开）
/// - `GET /health` - 健康检查
/// - `POST /v1/recipe/simple` - 按食材生成食谱
/// - `POST /v1/recipe/detailed` - 按食材和偏好生成食谱
/// - `POST /v1/recipe/simple/stream` - 流式版本
/// - `POST /v1/recipe/detailed/stream` - 流式版本
///
/// # 认证
/// 除 `/` 外均需要 `X-Recipe-API-Key` header
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/health", get(health))
        .route("/v1/recipe/simple", post(recipe::<SimpleRecipeRequest>))
        .route("/v1/recipe/detailed", post(recipe::<DetailedRecipeRequest>))
        .route(
            "/v1/recipe/simple/stream",
            post(recipe_stream::<SimpleRecipeRequest>),
        )
        .route(
            "/v1/recipe/detailed/stream",
            post(recipe_stream::<DetailedRecipeRequest>),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .route("/", get(root))
        .merge(protected)
        .layer(cors_layer())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{HeaderMap, Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::llm::fake::FakeProvider;
    use crate::recipe::service::RecipeService;
    use crate::recipe::types::RecipeResponse;

    const KEY: &str = "test-secret-key-9f2c";

    const REPLY: &str = r#"{
        "title": "Chicken Rice Ha-Ha",
        "ingredients": ["300g chicken breast", "2 cups rice", "1 onion, diced"],
        "instructions": ["Rinse the rice", "Fry the onion and chicken", "Simmer everything together"],
        "cooking_time": "30 minutes",
        "difficulty": "Easy",
        "notes": "Rice to meet you!"
    }"#;

    fn app_with(provider: Arc<FakeProvider>) -> Router {
        create_router(AppState::new(KEY, RecipeService::new(provider)))
    }

    fn app(provider: FakeProvider) -> Router {
        app_with(Arc::new(provider))
    }

    fn post_json(uri: &str, body: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("X-Recipe-API-Key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-Recipe-API-Key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// 解析 SSE 响应体为 (event, data) 列表
    fn parse_sse(body: &str) -> Vec<(String, Value)> {
        body.split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                let mut event = String::new();
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        event = v.trim().to_string();
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data.push_str(v.strip_prefix(' ').unwrap_or(v));
                    }
                }
                (event, serde_json::from_str(&data).unwrap())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let (status, _, body) = send(app(FakeProvider::with_reply(REPLY)), get_request("/", None)).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["message"], "Selamat datang ke 'Biar Kami Masak API'!");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["client_host"].is_null());
    }

    #[tokio::test]
    async fn test_health_requires_key() {
        let (status, headers, body) =
            send(app(FakeProvider::with_reply(REPLY)), get_request("/health", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "API key");
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["message"], "Could not validate API Key");

        let (status, _, body) =
            send(app(FakeProvider::with_reply(REPLY)), get_request("/health", Some(KEY))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"healthy"}"#);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected_without_leaking() {
        let provider = Arc::new(FakeProvider::with_reply(REPLY));
        let request = post_json(
            "/v1/recipe/simple",
            r#"{"ingredients": ["chicken"]}"#,
            Some("test-secret-key-9f2d"),
        );
        let (status, _, body) = send(app_with(provider.clone()), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.contains(KEY));
        assert!(!body.contains("title"));
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_auth_runs_before_validation() {
        let request = post_json("/v1/recipe/simple", r#"{"ingredients": []}"#, None);
        let (status, _, _) = send(app(FakeProvider::with_reply(REPLY)), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_simple_recipe() {
        let provider = Arc::new(FakeProvider::with_reply(REPLY));
        let request = post_json(
            "/v1/recipe/simple",
            r#"{"ingredients": ["chicken", "rice", "onion"], "servings": 2}"#,
            Some(KEY),
        );
        let (status, headers, body) = send(app_with(provider.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");

        let recipe: RecipeResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(recipe.title, "Chicken Rice Ha-Ha");
        assert!(recipe.ingredients.len() >= 3);
        for wanted in ["chicken", "rice", "onion"] {
            assert!(recipe.ingredients.iter().any(|i| i.contains(wanted)));
        }
        assert!(!recipe.instructions.is_empty());
        assert_eq!(recipe.cooking_time, "30 minutes");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("chicken, rice, onion"));
    }

    #[tokio::test]
    async fn test_detailed_recipe_passes_preferences() {
        let provider = Arc::new(FakeProvider::with_reply(REPLY));
        let request = post_json(
            "/v1/recipe/detailed",
            r#"{
                "ingredients": ["chicken", "rice"],
                "servings": 4,
                "dietary_restrictions": ["halal"],
                "cuisine_preference": "asian",
                "cooking_time": 30
            }"#,
            Some(KEY),
        );
        let (status, _, _) = send(app_with(provider.clone()), request).await;
        assert_eq!(status, StatusCode::OK);

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("Servings: 4"));
        assert!(prompt.contains("Dietary restrictions: halal"));
        assert!(prompt.contains("Cuisine preference: asian"));
        assert!(prompt.contains("Maximum cooking time: 30 minutes"));
    }

    #[tokio::test]
    async fn test_validation_errors_are_422() {
        let cases = [
            (r#"{"ingredients": []}"#, "ingredients"),
            (r#"{"ingredients": ["chicken"], "servings": 0}"#, "servings"),
            (r#"{"ingredients": ["chicken", "  "]}"#, "ingredients[1]"),
            (r#"{"servings": 2}"#, "ingredients"),
            ("{not json", "body"),
        ];
        for (body, field) in cases {
            let provider = Arc::new(FakeProvider::with_reply(REPLY));
            let request = post_json("/v1/recipe/simple", body, Some(KEY));
            let (status, _, response) = send(app_with(provider.clone()), request).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {}", body);

            let json: Value = serde_json::from_str(&response).unwrap();
            assert_eq!(json["error"]["type"], "validation_error");
            let fields: Vec<&str> = json["details"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|d| d["field"].as_str())
                .collect();
            assert!(fields.contains(&field), "body: {}, fields: {:?}", body, fields);
            assert!(provider.prompts().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_content_type_is_422() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/recipe/simple")
            .header("X-Recipe-API-Key", KEY)
            .body(Body::from(r#"{"ingredients": ["chicken"]}"#))
            .unwrap();
        let (status, _, body) = send(app(FakeProvider::with_reply(REPLY)), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("Content-Type"));
    }

    #[tokio::test]
    async fn test_detailed_rejects_zero_cooking_time() {
        let request = post_json(
            "/v1/recipe/detailed",
            r#"{"ingredients": ["tofu"], "cooking_time": 0}"#,
            Some(KEY),
        );
        let (status, _, body) = send(app(FakeProvider::with_reply(REPLY)), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("cooking_time"));
    }

    #[tokio::test]
    async fn test_upstream_timeout_is_generic_500() {
        let request = post_json(
            "/v1/recipe/simple",
            r#"{"ingredients": ["chicken"]}"#,
            Some(KEY),
        );
        let (status, _, body) = send(app(FakeProvider::timing_out()), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["message"], "recipe generation failed");
        assert!(!body.contains("timed out"));
        assert!(!body.contains(KEY));
    }

    #[tokio::test]
    async fn test_unstructured_reply_still_succeeds() {
        let reply = "Just boil everything together and hope for the best.";
        let request = post_json(
            "/v1/recipe/simple",
            r#"{"ingredients": ["chicken", "rice"]}"#,
            Some(KEY),
        );
        let (status, _, body) = send(app(FakeProvider::with_reply(reply)), request).await;
        assert_eq!(status, StatusCode::OK);

        let recipe: RecipeResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(recipe.notes, reply);
        assert_eq!(recipe.ingredients, vec!["chicken", "rice"]);
        assert!(!recipe.instructions.is_empty());
    }

    #[tokio::test]
    async fn test_stream_relays_fragments_in_order() {
        let request = post_json(
            "/v1/recipe/simple/stream",
            r#"{"ingredients": ["chicken", "rice", "onion"]}"#,
            Some(KEY),
        );
        let (status, headers, body) = send(
            app(FakeProvider::with_reply(REPLY).with_fragment_chars(5)),
            request,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let events = parse_sse(&body);
        let (last_event, last_data) = events.last().unwrap();
        assert_eq!(last_event, "done");

        let chunks: Vec<&Value> = events
            .iter()
            .filter(|(event, _)| event == "chunk")
            .map(|(_, data)| data)
            .collect();
        assert_eq!(last_data["chunks"], chunks.len());

        let text: String = chunks
            .iter()
            .map(|c| c["content"].as_str().unwrap())
            .collect();
        assert_eq!(text, REPLY);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk["index"], i);
            assert_eq!(chunk["timestamp"], chunks[0]["timestamp"]);
        }
    }

    #[tokio::test]
    async fn test_stream_failure_ends_with_error_event() {
        let request = post_json(
            "/v1/recipe/detailed/stream",
            r#"{"ingredients": ["chicken"]}"#,
            Some(KEY),
        );
        let (status, _, body) = send(app(FakeProvider::failing_mid_stream(REPLY, 3)), request).await;
        assert_eq!(status, StatusCode::OK);

        let events = parse_sse(&body);
        assert_eq!(events.len(), 4);
        assert!(events[..3].iter().all(|(event, _)| event == "chunk"));
        let (event, data) = &events[3];
        assert_eq!(event, "error");
        assert_eq!(data["message"], "recipe generation failed");
        assert!(!body.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_stream_requires_key_and_valid_body() {
        let request = post_json(
            "/v1/recipe/simple/stream",
            r#"{"ingredients": ["chicken"]}"#,
            None,
        );
        let (status, _, _) = send(app(FakeProvider::with_reply(REPLY)), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let request = post_json("/v1/recipe/simple/stream", r#"{"ingredients": []}"#, Some(KEY));
        let (status, _, _) = send(app(FakeProvider::with_reply(REPLY)), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
