//! 食谱生成服务
//!
//! 串联 Prompt Builder、LLM 上游与 Response Shaper

use std::sync::Arc;

use chrono::Utc;
use futures::Stream;
use uuid::Uuid;

use crate::llm::{LlmError, LlmProvider};

use super::prompt::build_prompt;
use super::shaper::{ShapeTier, shape};
use super::stream::{StreamFrame, relay};
use super::types::{RecipeQuery, RecipeResponse};

pub struct RecipeService {
    provider: Arc<dyn LlmProvider>,
}

impl RecipeService {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// 阻塞式生成：等待完整回复后整理为结构化食谱
    pub async fn generate(
        &self,
        query: &RecipeQuery,
        request_id: Uuid,
    ) -> Result<RecipeResponse, LlmError> {
        let prompt = build_prompt(query);
        #[cfg(feature = "sensitive-logs")]
        tracing::debug!(request_id = %request_id, prompt = %prompt, "发送 prompt");

        let raw = self.provider.complete(&prompt).await?;
        #[cfg(feature = "sensitive-logs")]
        tracing::debug!(request_id = %request_id, completion = %raw, "收到 completion");

        let (recipe, tier) = shape(&raw, query, Utc::now());
        if tier == ShapeTier::Fallback {
            tracing::warn!(
                request_id = %request_id,
                "模型回复不符合约定格式，使用原文兜底"
            );
        } else {
            tracing::info!(request_id = %request_id, tier = tier.as_str(), "食谱生成完成");
        }
        Ok(recipe)
    }

    /// 流式生成：返回按上游顺序转发的帧流
    pub fn generate_stream(
        &self,
        query: &RecipeQuery,
        request_id: Uuid,
    ) -> impl Stream<Item = StreamFrame> + Send + use<> {
        let prompt = build_prompt(query);
        #[cfg(feature = "sensitive-logs")]
        tracing::debug!(request_id = %request_id, prompt = %prompt, "发送流式 prompt");

        relay(self.provider.clone(), prompt, request_id)
    }
}
