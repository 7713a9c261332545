//! SSE 行解码
//!
//! 上游以 `data: <json>` 行推送增量，网络分片可能在任意字节处切断一行，
//! 因此先缓冲到换行符再解析。

use bytes::{Buf, BytesMut};

/// 一行有意义的 SSE 内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `data:` 字段的负载
    Data(String),
    /// `data: [DONE]`，上游结束标记
    Done,
}

/// 按行缓冲的 SSE 解码器
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个网络分片，返回其中已完整的行
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseLine> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);
            if let Some(parsed) = parse_line(&line) {
                lines.push(parsed);
            }
        }
        lines
    }

    /// 上游 body 结束时冲刷最后一行（可能没有换行符）
    pub fn finish(&mut self) -> Vec<SseLine> {
        let rest = self.buffer.split();
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    // '\n' 不会出现在 UTF-8 多字节序列内部，整行解码是安全的
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');

    // 注释行、event/id 等字段都忽略
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(SseLine::Done);
    }
    Some(SseLine::Data(payload.to_string()))
}
