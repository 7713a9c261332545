//! LLM 上游适配层
//!
//! 通过 [`LlmProvider`] trait 屏蔽具体的模型服务商，
//! 提供阻塞式（完整 completion）和流式（增量分片）两种调用方式。

#[cfg(test)]
pub mod fake;
mod openai;
mod sse;

pub use openai::OpenAiProvider;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

/// LLM 调用错误
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("request to provider timed out")]
    Timeout,

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("provider returned an empty completion")]
    EmptyCompletion,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::RequestFailed(e.to_string())
        }
    }
}

/// 增量文本分片流
///
/// 有限、不可重启；drop 即关闭，底层连接随之释放
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 服务商抽象
///
/// 实现必须是线程安全的：同一个实例被所有请求共享
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// 发送 prompt，等待完整的文本回复
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// 发送 prompt，返回按到达顺序产出的文本分片流
    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError>;

    /// 服务商名称（如 "openai"）
    fn provider_name(&self) -> &'static str;

    /// 模型名称（如 "gpt-4o-mini"）
    fn model_name(&self) -> &str;
}
