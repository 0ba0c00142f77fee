use futures::future::join_all;
use reqwest::{Method, Url};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AssetRequest, AssetResponse, CacheStorage, Fetcher};
use crate::config::CacheConfig;
use crate::error::{ReaderError, Result};

/// 离线资源处理器
///
/// 生命周期分三步：
/// 1. install：预缓存清单中的全部资源，任一失败则整体失败
/// 2. activate：删除名称不是当前缓存名的旧缓存
/// 3. handle_fetch：GET 请求缓存优先，未命中时回源并按条件写入缓存
pub struct OfflineWorker {
    cache_name: String,
    origin: Url,
    precache: Vec<String>,
    storage: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl OfflineWorker {
    pub fn new(
        config: &CacheConfig,
        storage: Arc<CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| ReaderError::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        Ok(Self {
            cache_name: config.cache_name.clone(),
            origin,
            precache: config.precache.clone(),
            storage,
            fetcher,
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// 将路径或完整地址解析为基于 origin 的 URL
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| ReaderError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// 安装：预缓存清单中的全部资源
    ///
    /// # 返回
    /// 写入缓存的条目数
    pub async fn install(&self) -> Result<usize> {
        let urls = self
            .precache
            .iter()
            .map(|p| self.resolve(p))
            .collect::<Result<Vec<_>>>()?;

        let fetcher = &self.fetcher;
        let results = join_all(urls.iter().map(|url| {
            let request = AssetRequest::get(url.clone());
            async move { fetcher.fetch(&request).await }
        }))
        .await;

        let mut entries = Vec::with_capacity(urls.len());
        for (url, result) in urls.into_iter().zip(results) {
            let response = result?;
            if !response.is_ok() {
                warn!(url = %url, status = response.status, "预缓存资源请求失败");
                return Err(ReaderError::Precache {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            entries.push((url, response));
        }

        self.storage.put_all(&self.cache_name, &entries)?;
        info!(cache = %self.cache_name, count = entries.len(), "预缓存完成");
        Ok(entries.len())
    }

    /// 激活：清除旧版本缓存
    ///
    /// # 返回
    /// 被删除的缓存名称
    pub fn activate(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.storage.cache_names()? {
            if name != self.cache_name {
                self.storage.delete_cache(&name)?;
                info!(cache = %name, "删除旧缓存");
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// 处理一次资源请求
    ///
    /// 非 GET 请求直接回源且不缓存；GET 请求命中缓存时不访问网络
    pub async fn handle_fetch(&self, request: AssetRequest) -> Result<AssetResponse> {
        if request.method != Method::GET {
            debug!(method = %request.method, url = %request.url, "非 GET 请求，直接回源");
            return self.fetcher.fetch(&request).await;
        }

        if let Some(cached) = self.storage.lookup(&request.url, &self.cache_name)? {
            debug!(url = %request.url, "命中缓存");
            return Ok(cached);
        }

        debug!(url = %request.url, "缓存未命中，回源");
        let response = self.fetcher.fetch(&request).await?;

        if response.is_cacheable() {
            if let Err(e) = self.storage.put(&self.cache_name, &request.url, &response) {
                warn!(url = %request.url, error = %e, "写入缓存失败");
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_cache::ResponseKind;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 按地址返回预设响应，并统计调用次数
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Mutex<HashMap<String, (u16, ResponseKind, String)>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn with(self, url: &str, status: u16, kind: ResponseKind, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), (status, kind, body.to_string()));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self
                .responses
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned();
            let (status, kind, body) =
                scripted.unwrap_or((404, ResponseKind::Basic, String::new()));
            Ok(AssetResponse {
                url: request.url.clone(),
                status,
                kind,
                headers: Vec::new(),
                body: body.into_bytes(),
            })
        }
    }

    fn config(precache: &[&str]) -> CacheConfig {
        CacheConfig {
            cache_name: "reader-v2".to_string(),
            origin: "http://localhost:3000".to_string(),
            precache: precache.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn worker(config: &CacheConfig, fetcher: Arc<ScriptedFetcher>) -> (OfflineWorker, Arc<CacheStorage>) {
        let storage = Arc::new(CacheStorage::new(Connection::open_in_memory().unwrap()).unwrap());
        let worker = OfflineWorker::new(config, storage.clone(), fetcher).unwrap();
        (worker, storage)
    }

    const INDEX: &str = "http://localhost:3000/index.html";

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let (worker, storage) = worker(&config(&[]), fetcher.clone());
        let url = Url::parse(INDEX).unwrap();
        storage
            .put(
                "reader-v2",
                &url,
                &AssetResponse {
                    url: url.clone(),
                    status: 200,
                    kind: ResponseKind::Basic,
                    headers: Vec::new(),
                    body: b"cached".to_vec(),
                },
            )
            .unwrap();

        let response = worker.handle_fetch(AssetRequest::get(url)).await.unwrap();
        assert_eq!(response.body, b"cached");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_caches() {
        let fetcher = Arc::new(ScriptedFetcher::default().with(
            INDEX,
            200,
            ResponseKind::Basic,
            "fresh",
        ));
        let (worker, storage) = worker(&config(&[]), fetcher.clone());
        let url = Url::parse(INDEX).unwrap();

        let first = worker.handle_fetch(AssetRequest::get(url.clone())).await.unwrap();
        assert_eq!(first.body, b"fresh");
        assert_eq!(fetcher.calls(), 1);
        assert!(storage.get("reader-v2", &url).unwrap().is_some());

        let second = worker.handle_fetch(AssetRequest::get(url)).await.unwrap();
        assert_eq!(second.body, b"fresh");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_error_response_not_cached() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let (worker, storage) = worker(&config(&[]), fetcher.clone());
        let url = Url::parse("http://localhost:3000/missing.js").unwrap();

        let response = worker.handle_fetch(AssetRequest::get(url.clone())).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(storage.get("reader-v2", &url).unwrap().is_none());

        worker.handle_fetch(AssetRequest::get(url)).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_cross_origin_not_cached() {
        let cdn = "https://cdn.example.com/font.woff2";
        let fetcher =
            Arc::new(ScriptedFetcher::default().with(cdn, 200, ResponseKind::Cors, "font"));
        let (worker, storage) = worker(&config(&[]), fetcher.clone());
        let url = Url::parse(cdn).unwrap();

        let response = worker.handle_fetch(AssetRequest::get(url.clone())).await.unwrap();
        assert_eq!(response.body, b"font");
        assert!(storage.get("reader-v2", &url).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_get_passthrough_never_cached() {
        let fetcher = Arc::new(ScriptedFetcher::default().with(
            INDEX,
            200,
            ResponseKind::Basic,
            "posted",
        ));
        let (worker, storage) = worker(&config(&[]), fetcher.clone());
        let url = Url::parse(INDEX).unwrap();

        let response = worker
            .handle_fetch(AssetRequest::new(Method::POST, url.clone()))
            .await
            .unwrap();
        assert_eq!(response.body, b"posted");
        assert_eq!(fetcher.calls(), 1);
        assert!(storage.get("reader-v2", &url).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with("http://localhost:3000/", 200, ResponseKind::Basic, "root")
                .with(INDEX, 200, ResponseKind::Basic, "index"),
        );
        let (worker, storage) = worker(&config(&["/", "/index.html"]), fetcher.clone());

        assert_eq!(worker.install().await.unwrap(), 2);
        assert_eq!(storage.entry_count("reader-v2").unwrap(), 2);

        worker
            .handle_fetch(AssetRequest::get(Url::parse(INDEX).unwrap()))
            .await
            .unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::default().with(
            INDEX,
            200,
            ResponseKind::Basic,
            "index",
        ));
        let (worker, storage) = worker(&config(&["/index.html", "/logo512.png"]), fetcher);

        let result = worker.install().await;
        assert!(matches!(result, Err(ReaderError::Precache { status: 404, .. })));
        assert_eq!(storage.entry_count("reader-v2").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_activate_removes_stale_caches() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let (worker, storage) = worker(&config(&[]), fetcher);
        let url = Url::parse(INDEX).unwrap();
        let entry = AssetResponse {
            url: url.clone(),
            status: 200,
            kind: ResponseKind::Basic,
            headers: Vec::new(),
            body: Vec::new(),
        };
        storage.put("reader-v1", &url, &entry).unwrap();
        storage.put("reader-v2", &url, &entry).unwrap();

        let removed = worker.activate().unwrap();
        assert_eq!(removed, vec!["reader-v1"]);
        assert_eq!(storage.cache_names().unwrap(), vec!["reader-v2"]);
    }

    #[test]
    fn test_resolve_paths() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let (worker, _) = worker(&config(&[]), fetcher);
        assert_eq!(worker.resolve("/logo192.png").unwrap().as_str(), "http://localhost:3000/logo192.png");
        assert_eq!(
            worker.resolve("https://cdn.example.com/a.css").unwrap().as_str(),
            "https://cdn.example.com/a.css"
        );
    }

    #[test]
    fn test_invalid_origin() {
        let mut cfg = config(&[]);
        cfg.origin = "::nope".to_string();
        let storage = Arc::new(CacheStorage::new(Connection::open_in_memory().unwrap()).unwrap());
        let result = OfflineWorker::new(&cfg, storage, Arc::new(ScriptedFetcher::default()));
        assert!(matches!(result, Err(ReaderError::InvalidUrl(_))));
    }
}
