//! HTTP fetch / HTTP 抓取
//!
//! Every fetch issues two requests in parallel: a GET that follows redirects
//! (body) and a probe that does not (true status code of the link itself).

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{redirect, Client};
use std::time::Duration;

use crate::config::IndexingConfig;
use crate::error::Result;

/// Result of one fetch / 单次抓取结果
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// Probe status, else GET status, else 0 (no response) / 状态码（尽力而为）
    pub status: u16,
    /// Body of the GET response when it could be read / 响应正文
    pub body: Option<String>,
    /// Error text when the GET or its body read failed / 错误信息
    pub error: Option<String>,
}

impl FetchedPage {
    /// Status below 400 with a readable body / 可以解析的页面
    pub fn is_indexable(&self) -> bool {
        self.status != 0 && self.status < 400 && self.body.is_some()
    }
}

pub struct HttpFetcher {
    client: Client,
    probe_client: Client,
}

impl HttpFetcher {
    /// Build both clients from the indexing config / 根据配置创建客户端
    pub fn new(config: &IndexingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Ok(referrer) = HeaderValue::from_str(&config.referrer) {
            headers.insert(REFERER, referrer);
        }
        let timeout = Duration::from_millis(config.request_timeout_ms);

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers.clone())
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        let probe_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { client, probe_client })
    }

    /// Fetch one url, never fails / 抓取单个链接
    pub async fn fetch(&self, url: &str) -> FetchedPage {
        let (page, probe) = tokio::join!(self.get(url), self.probe(url));

        let mut fetched = FetchedPage::default();
        match page {
            Ok((status, body)) => {
                fetched.status = status;
                match body {
                    Ok(body) => fetched.body = Some(body),
                    Err(e) => {
                        tracing::warn!("Failed to read body of {}: {}", url, e);
                        fetched.error = Some(format!("failed to read body: {}", e));
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Fetch failed {}: {}", url, e);
                fetched.error = Some(e.to_string());
            }
        }
        match probe {
            Ok(status) => fetched.status = status,
            Err(e) => tracing::debug!("Status probe failed {}: {}", url, e),
        }
        fetched
    }

    /// Status of the response and the outcome of reading its body / 状态码与正文读取结果
    async fn get(&self, url: &str) -> Result<(u16, reqwest::Result<String>)> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        // 正文读取失败时仍然保留状态码
        Ok((status, response.text().await))
    }

    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self.probe_client.get(url).send().await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&IndexingConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok_page() {
        let base = serve(Router::new().route("/", get(|| async { "<p>Привет</p>" }))).await;
        let page = fetcher().fetch(&format!("{}/", base)).await;
        assert_eq!(page.status, 200);
        assert_eq!(page.body.as_deref(), Some("<p>Привет</p>"));
        assert!(page.error.is_none());
        assert!(page.is_indexable());
    }

    #[tokio::test]
    async fn test_probe_reports_redirect_status() {
        let app = Router::new()
            .route("/old", get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/new")]) }))
            .route("/new", get(|| async { "<p>Новая</p>" }));
        let base = serve(app).await;

        let page = fetcher().fetch(&format!("{}/old", base)).await;
        assert_eq!(page.status, 301);
        assert_eq!(page.body.as_deref(), Some("<p>Новая</p>"));
    }

    #[tokio::test]
    async fn test_missing_page_keeps_status() {
        let base = serve(Router::new()).await;
        let page = fetcher().fetch(&format!("{}/missing", base)).await;
        assert_eq!(page.status, 404);
        assert!(!page.is_indexable());
    }

    /// Answers every request with a 200 whose body stops short of its Content-Length
    pub(crate) async fn serve_truncated() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 1000\r\n\r\n<p>Обрыв</p>";
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let base = serve_truncated().await;
        let page = fetcher().fetch(&format!("{}/", base)).await;
        assert_eq!(page.status, 200);
        assert!(page.body.is_none());
        assert!(page.error.as_deref().unwrap().starts_with("failed to read body"));
        assert!(!page.is_indexable());
    }

    #[tokio::test]
    async fn test_unreachable_host_has_no_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let page = fetcher().fetch(&format!("http://{}/", addr)).await;
        assert_eq!(page.status, 0);
        assert!(page.body.is_none());
        assert!(page.error.is_some());
    }
}
