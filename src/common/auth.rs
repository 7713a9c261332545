//! API Key 认证工具
//!
//! 提取请求头中的 API Key，并以常量时间与配置值比较

use axum::{body::Body, http::Request};
use subtle::ConstantTimeEq;

/// 服务 API Key 所在的请求头
pub const API_KEY_HEADER: &str = "x-recipe-api-key";

/// 从请求中提取 API Key
///
/// 空白值视为未提供
pub fn extract_api_key(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// 常量时间字符串比较，防止时序攻击
///
/// 长度不同时直接返回 false（长度本身不视为机密）
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
