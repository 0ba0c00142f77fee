use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::{AssetRequest, AssetResponse, ResponseKind};
use crate::error::Result;

/// 网络回源接口
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse>;
}

/// 基于 reqwest 的回源实现
///
/// 最终地址与 `origin` 同源的响应标记为 Basic，其余为 Cors
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: Url) -> Self {
        Self::with_client(Client::new(), origin)
    }

    pub fn with_client(client: Client, origin: Url) -> Self {
        Self { client, origin }
    }

    fn classify(&self, final_url: &Url) -> ResponseKind {
        if final_url.origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(method = %request.method, url = %url, status, "网络请求完成");

        Ok(AssetResponse {
            kind: self.classify(&url),
            url,
            status,
            headers,
            body,
        })
    }
}
