//! 流式转发
//!
//! 上游分片按到达顺序逐个封装成帧，不做结构化解析。
//! 上游连接在第一次拉取时才建立；客户端断开时整个流被 drop，
//! 上游连接随之释放。

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::{LlmError, LlmProvider, TextStream};

use super::types::ErrorResponse;

/// 单个分片帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub index: usize,
    pub content: String,
    /// 流开始时计算一次，同一个流的所有帧共享
    pub timestamp: DateTime<Utc>,
}

/// 正常结束帧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDone {
    pub chunks: usize,
    pub timestamp: DateTime<Utc>,
}

/// 转发过程中产出的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Chunk(StreamChunk),
    Done(StreamDone),
    /// 上游失败，流在此帧后结束
    Failed,
}

impl StreamFrame {
    /// 转换为 SSE 事件
    pub fn into_event(self) -> Event {
        match self {
            StreamFrame::Chunk(chunk) => Event::default()
                .event("chunk")
                .data(serde_json::to_string(&chunk).unwrap_or_default()),
            StreamFrame::Done(done) => Event::default()
                .event("done")
                .data(serde_json::to_string(&done).unwrap_or_default()),
            StreamFrame::Failed => Event::default()
                .event("error")
                .data(serde_json::to_string(&ErrorResponse::upstream_error().error).unwrap_or_default()),
        }
    }
}

/// 转发守卫：流在未结束前被 drop，说明客户端已断开
struct RelayGuard {
    request_id: Uuid,
    finished: bool,
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(request_id = %self.request_id, "客户端已断开，停止转发并释放上游连接");
        }
    }
}

enum Phase {
    Connecting {
        provider: Arc<dyn LlmProvider>,
        prompt: String,
    },
    Relaying(TextStream),
    Finished,
}

struct RelayState {
    phase: Phase,
    index: usize,
    timestamp: DateTime<Utc>,
    guard: RelayGuard,
}

impl RelayState {
    fn fail(&mut self, error: &LlmError) -> StreamFrame {
        tracing::error!(
            request_id = %self.guard.request_id,
            forwarded = self.index,
            error = %error,
            "流式生成失败，结束流"
        );
        self.guard.finished = true;
        StreamFrame::Failed
    }
}

/// 建立上游流并逐帧转发
///
/// 帧序列：若干 `Chunk`，然后恰好一个 `Done` 或 `Failed`
pub fn relay(
    provider: Arc<dyn LlmProvider>,
    prompt: String,
    request_id: Uuid,
) -> impl Stream<Item = StreamFrame> + Send {
    let state = RelayState {
        phase: Phase::Connecting { provider, prompt },
        index: 0,
        timestamp: Utc::now(),
        guard: RelayGuard {
            request_id,
            finished: false,
        },
    };

    stream::unfold(state, |mut st| async move {
        loop {
            match std::mem::replace(&mut st.phase, Phase::Finished) {
                Phase::Connecting { provider, prompt } => match provider.stream(&prompt).await {
                    Ok(inner) => st.phase = Phase::Relaying(inner),
                    Err(e) => {
                        let frame = st.fail(&e);
                        return Some((frame, st));
                    }
                },
                Phase::Relaying(mut inner) => match inner.next().await {
                    Some(Ok(fragment)) => {
                        st.phase = Phase::Relaying(inner);
                        if fragment.is_empty() {
                            continue;
                        }
                        let chunk = StreamChunk {
                            index: st.index,
                            content: fragment,
                            timestamp: st.timestamp,
                        };
                        st.index += 1;
                        return Some((StreamFrame::Chunk(chunk), st));
                    }
                    Some(Err(e)) => {
                        let frame = st.fail(&e);
                        return Some((frame, st));
                    }
                    None => {
                        st.guard.finished = true;
                        tracing::info!(
                            request_id = %st.guard.request_id,
                            chunks = st.index,
                            "流式生成完成"
                        );
                        let done = StreamDone {
                            chunks: st.index,
                            timestamp: st.timestamp,
                        };
                        return Some((StreamFrame::Done(done), st));
                    }
                },
                Phase::Finished => return None,
            }
        }
    })
}

/// 转换为 axum SSE 所需的事件流
pub fn into_events(
    frames: impl Stream<Item = StreamFrame> + Send,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    frames.map(|frame| Ok(frame.into_event()))
}
