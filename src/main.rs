mod common;
mod http_client;
mod llm;
mod model;
mod recipe;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use crate::llm::{LlmProvider, OpenAiProvider};
use crate::model::arg::Args;
use crate::model::config::{Config, Secrets};
use crate::recipe::{AppState, RecipeService};

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let args = Args::parse();

    // .env 文件可选，不存在时忽略
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("启动失败: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // 加载配置
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    // 机密只从环境变量读取，缺失即退出
    let secrets = Secrets::from_env()?;

    let client = http_client::build_client(&config)?;
    let provider = OpenAiProvider::new(&config, secrets.provider_api_key, client);
    tracing::info!(
        provider = provider.provider_name(),
        model = provider.model_name(),
        base_url = %config.base_url,
        "LLM 上游已配置"
    );

    let service = RecipeService::new(Arc::new(provider));
    let app = recipe::create_router(AppState::new(secrets.service_api_key, service));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听 {} 失败", addr))?;

    tracing::info!("启动食谱 API 服务: {}", addr);
    tracing::info!("可用 API:");
    tracing::info!("  GET  /");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /v1/recipe/simple");
    tracing::info!("  POST /v1/recipe/detailed");
    tracing::info!("  POST /v1/recipe/simple/stream");
    tracing::info!("  POST /v1/recipe/detailed/stream");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP 服务异常退出")?;

    Ok(())
}
