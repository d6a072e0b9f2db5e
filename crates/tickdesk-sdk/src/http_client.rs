//! HTTP 客户端模块 - 封装后端 API 调用
//!
//! 本模块提供 JSON GET/POST 封装，使用 reqwest 作为底层 HTTP 客户端。
//! 支持 Bearer 认证头、`X-User-ID` 等自定义头和按请求覆盖的超时。

use std::time::Duration;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Result, TickdeskSDKError};
use crate::sdk::HttpClientConfig;

/// 后端 API 客户端
#[derive(Debug, Clone)]
pub struct ApiHttpClient {
    client: Client,
    base_url: String,
}

impl ApiHttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new(config: &HttpClientConfig, base_url: String) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| TickdeskSDKError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        debug!("HTTP 客户端已创建 (base_url: {})", base_url);

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// GET 请求并解析 JSON 响应
    ///
    /// * `bearer` - 认证 token（存在即带 `Authorization: Bearer` 头）
    /// * `headers` - 额外请求头（如 `X-User-ID`）
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(map_request_error)?;
        parse_json_response(path, response).await
    }

    /// POST JSON 请求并解析 JSON 响应
    ///
    /// * `timeout` - 按请求覆盖的超时（保存路径用 5 秒取消保护）
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(duration) = timeout {
            request = request.timeout(duration);
        }

        let response = request.send().await.map_err(map_request_error)?;
        parse_json_response(path, response).await
    }
}

/// reqwest 错误映射到 SDK 错误分类
fn map_request_error(e: reqwest::Error) -> TickdeskSDKError {
    if e.is_timeout() {
        TickdeskSDKError::Timeout(format!("请求超时: {}", e))
    } else {
        TickdeskSDKError::Transport(format!("请求失败: {}", e))
    }
}

async fn parse_json_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "无法读取错误信息".to_string());
        error!("❌ 请求失败: path={}, status={}, error={}", path, status, error_text);
        return Err(TickdeskSDKError::Http(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| TickdeskSDKError::Serialization(format!("解析响应失败 ({}): {}", path, e)))
}
