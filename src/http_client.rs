//! LLM 上游共用的 HTTP 客户端

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Proxy, Url};

use crate::model::config::Config;

/// 按配置构建上游 HTTP 客户端
///
/// 客户端只带连接超时。阻塞请求的整体超时和流式请求的分片间隔超时
/// 由 provider 按请求设置，长回复不会被一个全局超时截断。
pub fn build_client(config: &Config) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));

    if let Some(url) = config.proxy_url.as_deref() {
        let proxy = Proxy::all(url).with_context(|| format!("代理地址无效: {}", redact_proxy(url)))?;
        builder = builder.proxy(proxy);
        tracing::info!("上游请求经由代理: {}", redact_proxy(url));
    }

    builder.build().context("构建 HTTP Client 失败")
}

/// 隐藏代理地址中的用户名和密码，用于日志
fn redact_proxy(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("***");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Ok(_) => url.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}
