//! 公共工具模块

pub mod auth;

use std::borrow::Cow;

const ELLIPSIS: &str = "...";

/// 截断写入日志的上游文本（错误响应体、无法解析的事件）
///
/// 结果不超过 `max_bytes` 字节（含省略号；预算小于省略号时只剩省略号），
/// 且不会切在多字节字符中间。
pub fn truncate_for_log(text: &str, max_bytes: usize) -> Cow<'_, str> {
    if text.len() <= max_bytes {
        return Cow::Borrowed(text);
    }

    let budget = max_bytes.saturating_sub(ELLIPSIS.len());
    let end = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= budget)
        .last()
        .unwrap_or(0);
    Cow::Owned(format!("{}{}", &text[..end], ELLIPSIS))
}
