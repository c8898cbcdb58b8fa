//! 测试用的内存 ModelSource。

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};

use crate::download::models::DownloadError;
use crate::network_parser::auth::AuthState;
use crate::network_parser::network::{DownloadStream, ModelSource, download_url, page_url};

pub(crate) const BASE_URL: &str = "https://civitai.test";

struct FakeFile {
    disposition: Option<String>,
    body: Vec<u8>,
    broken: bool,
}

/// 先返回全部数据，再返回错误。
struct BrokenReader {
    inner: Cursor<Vec<u8>>,
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            0 => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            n => Ok(n),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    pages: HashMap<u64, String>,
    files: HashMap<u64, FakeFile>,
    requests: RefCell<Vec<String>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, model_id: u64, html: String) -> Self {
        self.pages.insert(model_id, html);
        self
    }

    pub(crate) fn with_file(mut self, download_id: u64, name: &str, body: Vec<u8>) -> Self {
        self.files.insert(
            download_id,
            FakeFile {
                disposition: Some(format!("attachment; filename=\"{name}\"")),
                body,
                broken: false,
            },
        );
        self
    }

    pub(crate) fn with_anonymous_file(mut self, download_id: u64, body: Vec<u8>) -> Self {
        self.files.insert(
            download_id,
            FakeFile {
                disposition: None,
                body,
                broken: false,
            },
        );
        self
    }

    pub(crate) fn with_broken_file(mut self, download_id: u64, name: &str, body: Vec<u8>) -> Self {
        self.files.insert(
            download_id,
            FakeFile {
                disposition: Some(format!("attachment; filename=\"{name}\"")),
                body,
                broken: true,
            },
        );
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl ModelSource for FakeSource {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn fetch_page(&self, model_id: u64, auth: &mut AuthState) -> Result<String, DownloadError> {
        self.requests.borrow_mut().push(format!("page:{model_id}"));
        auth.merge([("page-session", model_id.to_string())]);
        self.pages
            .get(&model_id)
            .cloned()
            .ok_or_else(|| DownloadError::Status {
                url: page_url(BASE_URL, model_id),
                status: 404,
            })
    }

    fn open_download(
        &self,
        download_id: u64,
        auth: &mut AuthState,
    ) -> Result<DownloadStream, DownloadError> {
        self.requests
            .borrow_mut()
            .push(format!("download:{download_id}"));
        auth.merge([("download-session", download_id.to_string())]);
        let url = download_url(BASE_URL, download_id);
        let file = self
            .files
            .get(&download_id)
            .ok_or_else(|| DownloadError::Status {
                url: url.clone(),
                status: 404,
            })?;

        let body: Box<dyn Read> = if file.broken {
            Box::new(BrokenReader {
                inner: Cursor::new(file.body.clone()),
            })
        } else {
            Box::new(Cursor::new(file.body.clone()))
        };
        Ok(DownloadStream {
            url,
            content_disposition: file.disposition.clone(),
            content_length: Some(file.body.len() as u64),
            body,
        })
    }
}
