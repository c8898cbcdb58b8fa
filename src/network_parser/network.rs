use std::io::Read;

use reqwest::blocking::{Client, Response};
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, CONNECTION, CONTENT_DISPOSITION, COOKIE, HeaderMap, HeaderValue,
    USER_AGENT,
};
use tracing::{debug, warn};

use super::auth::AuthState;
use crate::base_system::context::Config;
use crate::download::models::DownloadError;

pub fn page_url(base_url: &str, model_id: u64) -> String {
    format!("{}/models/{model_id}", base_url.trim_end_matches('/'))
}

pub fn download_url(base_url: &str, download_id: u64) -> String {
    format!(
        "{}/api/download/models/{download_id}",
        base_url.trim_end_matches('/')
    )
}

/// 已返回响应头、尚未读取正文的下载。
pub struct DownloadStream {
    pub url: String,
    pub content_disposition: Option<String>,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read>,
}

/// 管线与 HTTP 之间的接缝：一次调用只发一个请求，不重试。
pub trait ModelSource {
    fn base_url(&self) -> &str;

    /// GET 模型页面，返回 HTML 正文。响应 Cookie 合并进 `auth`。
    fn fetch_page(&self, model_id: u64, auth: &mut AuthState) -> Result<String, DownloadError>;

    /// GET 下载地址，只等待响应头。响应 Cookie 合并进 `auth`。
    fn open_download(
        &self,
        download_id: u64,
        auth: &mut AuthState,
    ) -> Result<DownloadStream, DownloadError>;
}

pub struct CivitaiWeb {
    client: Client,
    base_url: String,
    user_agent: String,
    request_timeout: std::time::Duration,
    download_timeout: std::time::Duration,
}

impl CivitaiWeb {
    pub fn new(config: &Config) -> Result<Self, DownloadError> {
        let mut default_headers = HeaderMap::new();
        // reqwest 未启用解压 feature，要求服务端直接返回原始字节
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        // 总超时按请求单独设置：页面请求短，文件下载长
        let client = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(config.connect_timeout())
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout(),
            download_timeout: config.download_timeout(),
        })
    }

    fn headers(&self, accept: &'static str, auth: &AuthState) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );
        if let Some(cookie) = auth.header_value() {
            match HeaderValue::from_str(&cookie) {
                Ok(v) => {
                    headers.insert(COOKIE, v);
                }
                Err(_) => warn!("Cookie 含有非法字符，本次请求不携带 Cookie"),
            }
        }
        headers
    }

    fn send(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: std::time::Duration,
        auth: &mut AuthState,
    ) -> Result<Response, DownloadError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .map_err(|e| DownloadError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        // 错误页同样可能轮换 Cookie，先合并再检查状态码
        let rotated: Vec<(String, String)> = resp
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        if !rotated.is_empty() {
            debug!("合并了 {} 个响应 Cookie", rotated.len());
            auth.merge(rotated);
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

impl ModelSource for CivitaiWeb {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fetch_page(&self, model_id: u64, auth: &mut AuthState) -> Result<String, DownloadError> {
        let url = page_url(&self.base_url, model_id);
        let headers = self.headers(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            auth,
        );
        let resp = self.send(&url, headers, self.request_timeout, auth)?;
        resp.text().map_err(|e| DownloadError::Fetch {
            url,
            reason: e.to_string(),
        })
    }

    fn open_download(
        &self,
        download_id: u64,
        auth: &mut AuthState,
    ) -> Result<DownloadStream, DownloadError> {
        let url = download_url(&self.base_url, download_id);
        let headers = self.headers("*/*", auth);
        let resp = self.send(&url, headers, self.download_timeout, auth)?;

        // 文件名常含非 ASCII 字符，按字节宽松解码
        let content_disposition = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let content_length = resp.content_length();
        // 重定向后的最终地址（通常是 CDN）
        let final_url = resp.url().to_string();
        debug!("下载响应: {} (length={:?})", final_url, content_length);

        Ok(DownloadStream {
            url: final_url,
            content_disposition,
            content_length,
            body: Box::new(resp),
        })
    }
}
