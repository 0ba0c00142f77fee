// 离线资源缓存
// 安装时预缓存静态资源，之后以缓存优先的方式响应 GET 请求

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

pub mod cache_storage;
pub mod fetcher;
pub mod worker;


pub use cache_storage::CacheStorage;
pub use fetcher::{Fetcher, HttpFetcher};
pub use worker::OfflineWorker;

/// 响应类型
///
/// 只有同源（Basic）的成功响应会被写入缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Basic,
    Cors,
    Opaque,
    Error,
}

impl ResponseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "basic" => ResponseKind::Basic,
            "cors" => ResponseKind::Cors,
            "opaque" => ResponseKind::Opaque,
            _ => ResponseKind::Error,
        }
    }
}

/// 资源请求
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    pub method: Method,
    pub url: Url,
}

impl AssetRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }
}

/// 资源响应
#[derive(Debug, Clone, PartialEq)]
pub struct AssetResponse {
    /// 最终响应地址（跟随重定向后）
    pub url: Url,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    /// 状态码 200 且同源才允许缓存
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseKind::Basic
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
