//! 食谱 API 模块
//!
//! 认证、请求校验、prompt 构建、结构化整理与流式转发

mod error;
mod extract;
mod handlers;
mod middleware;
mod prompt;
mod router;
mod service;
mod shaper;
mod stream;
pub mod types;

pub use middleware::AppState;
pub use router::create_router;
pub use service::RecipeService;
