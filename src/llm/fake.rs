//! 测试用的假 LLM 服务商
//!
//! 返回固定文本，流式模式下按固定字符数切分成分片，
//! 并记录收到的每个 prompt，便于断言 prompt 内容。
//! 同时统计尚未释放的上游流，用于验证客户端断开后连接被释放。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{StreamExt, stream};

use super::{LlmError, LlmProvider, TextStream};

#[derive(Debug, Clone)]
enum Behavior {
    /// 正常返回固定文本
    Reply(String),
    /// 模拟上游超时
    Timeout,
    /// 流式模式下先产出前若干个分片，然后连接中断
    FailMidStream { text: String, fragments: usize },
}

#[derive(Debug)]
pub struct FakeProvider {
    behavior: Behavior,
    fragment_chars: usize,
    prompts: Mutex<Vec<String>>,
    open_streams: Arc<AtomicUsize>,
}

/// 随上游流一起 drop，drop 时计数减一
struct OpenStream(Arc<AtomicUsize>);

impl OpenStream {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeProvider {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            fragment_chars: 7,
            prompts: Mutex::new(Vec::new()),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_reply(text: &str) -> Self {
        Self::with_behavior(Behavior::Reply(text.to_string()))
    }

    pub fn timing_out() -> Self {
        Self::with_behavior(Behavior::Timeout)
    }

    pub fn failing_mid_stream(text: &str, fragments: usize) -> Self {
        Self::with_behavior(Behavior::FailMidStream {
            text: text.to_string(),
            fragments,
        })
    }

    pub fn with_fragment_chars(mut self, chars: usize) -> Self {
        self.fragment_chars = chars.max(1);
        self
    }

    /// 按调用顺序返回收到的 prompt
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// 已打开但尚未 drop 的流数量
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn tracked(&self, items: Vec<Result<String, LlmError>>) -> TextStream {
        let guard = OpenStream::new(&self.open_streams);
        Box::pin(stream::iter(items).map(move |item| {
            let _held = &guard;
            item
        }))
    }

    fn record(&self, prompt: &str) {
        self.prompts.lock().unwrap().push(prompt.to_string());
    }

    fn fragments(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.fragment_chars)
            .map(|c| c.iter().collect())
            .collect()
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.record(prompt);
        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Timeout => Err(LlmError::Timeout),
            Behavior::FailMidStream { .. } => {
                Err(LlmError::RequestFailed("connection reset by peer".to_string()))
            }
        }
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        self.record(prompt);
        match &self.behavior {
            Behavior::Reply(text) => {
                let items: Vec<Result<String, LlmError>> =
                    self.fragments(text).into_iter().map(Ok).collect();
                Ok(self.tracked(items))
            }
            Behavior::Timeout => Err(LlmError::Timeout),
            Behavior::FailMidStream { text, fragments } => {
                let mut items: Vec<Result<String, LlmError>> = self
                    .fragments(text)
                    .into_iter()
                    .take(*fragments)
                    .map(Ok)
                    .collect();
                items.push(Err(LlmError::RequestFailed(
                    "connection reset by peer".to_string(),
                )));
                Ok(self.tracked(items))
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_fragments_reassemble() {
        let provider = FakeProvider::with_reply("Nasi lemak istimewa").with_fragment_chars(4);
        let parts: Vec<String> = provider
            .stream("p")
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.concat(), "Nasi lemak istimewa");
    }

    #[tokio::test]
    async fn test_open_streams_counts_until_drop() {
        let provider = FakeProvider::with_reply("roti canai");
        let stream = provider.stream("p").await.unwrap();
        assert_eq!(provider.open_streams(), 1);
        drop(stream);
        assert_eq!(provider.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_records_prompts() {
        let provider = FakeProvider::timing_out();
        assert!(provider.complete("first").await.is_err());
        assert!(provider.stream("second").await.is_err());
        assert_eq!(provider.prompts(), vec!["first", "second"]);
    }
}
