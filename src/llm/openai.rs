//! OpenAI 兼容的 Chat Completions 服务商

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::sse::{SseDecoder, SseLine};
use super::{LlmError, LlmProvider, TextStream};
use crate::common::truncate_for_log;
use crate::model::config::Config;

/// 日志中保留的上游错误响应体长度
const MAX_LOGGED_BODY_BYTES: usize = 512;

/// OpenAI 兼容服务商
#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    completions_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: &Config, api_key: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            completions_url: config.completions_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            stream_idle_timeout: Duration::from_secs(config.stream_idle_timeout_secs),
        }
    }

    fn build_request(&self, prompt: &str, stream: bool) -> reqwest::RequestBuilder {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        };

        self.client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&body)
    }
}

/// Chat Completions 请求体
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// 非流式响应
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 流式响应中的一个事件
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChunkChoice>,
    /// 部分服务商在流中途以 `{"error": {...}}` 事件报告失败
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

/// 上游错误响应
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// 将非 2xx 响应转换为 [`LlmError`]
async fn check_status(response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(LlmError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => truncate_for_log(&body, MAX_LOGGED_BODY_BYTES).into_owned(),
    };
    Err(LlmError::ApiError {
        status: status.as_u16(),
        message,
    })
}

/// 解析一条流式事件，返回其中的文本增量
fn parse_delta(payload: &str) -> Result<Option<String>, LlmError> {
    let chunk: ChatChunk = serde_json::from_str(payload).map_err(|e| {
        LlmError::ParseError(format!(
            "{}: {}",
            e,
            truncate_for_log(payload, MAX_LOGGED_BODY_BYTES)
        ))
    })?;

    if let Some(error) = chunk.error {
        // 响应头已是 200，错误只能从事件体得知
        return Err(LlmError::ApiError {
            status: StatusCode::OK.as_u16(),
            message: error.message,
        });
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty()))
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// 流式转发状态
struct DeltaState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    idle_timeout: Duration,
    done: bool,
}

impl DeltaState {
    fn absorb(&mut self, lines: Vec<SseLine>) {
        for line in lines {
            if self.done {
                break;
            }
            match line {
                SseLine::Done => self.done = true,
                SseLine::Data(payload) => match parse_delta(&payload) {
                    Ok(Some(text)) => self.pending.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(e) => {
                        self.pending.push_back(Err(e));
                        self.done = true;
                    }
                },
            }
        }
    }

    fn fail(&mut self, error: LlmError) {
        self.pending.push_back(Err(error));
        self.done = true;
    }
}

/// 将上游字节流转换为文本分片流
///
/// 结束条件：`[DONE]`、body 结束、出错或分片间隔超时。
/// 结束后不再读取上游，返回 None 时字节流随状态一起释放。
fn delta_stream(bytes: ByteStream, idle_timeout: Duration) -> TextStream {
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        idle_timeout,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }

            match tokio::time::timeout(st.idle_timeout, st.bytes.next()).await {
                Err(_) => st.fail(LlmError::Timeout),
                Ok(None) => {
                    let lines = st.decoder.finish();
                    st.absorb(lines);
                    st.done = true;
                }
                Ok(Some(Err(e))) => st.fail(e.into()),
                Ok(Some(Ok(chunk))) => {
                    let lines = st.decoder.push(&chunk);
                    st.absorb(lines);
                }
            }
        }
    }))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .build_request(prompt, false)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::ParseError(format!(
                "{}: {}",
                e,
                truncate_for_log(&body, MAX_LOGGED_BODY_BYTES)
            ))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        // 流式请求不设整体超时：等待响应头和分片之间都受间隔超时约束
        let response =
            tokio::time::timeout(self.stream_idle_timeout, self.build_request(prompt, true).send())
                .await
                .map_err(|_| LlmError::Timeout)??;
        let response = check_status(response).await?;

        Ok(delta_stream(
            Box::pin(response.bytes_stream()),
            self.stream_idle_timeout,
        ))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
