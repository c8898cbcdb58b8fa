//! 模型页面解析：标题、类型、主下载 ID。
//!
//! 页面标记不是稳定接口，每个字段单独提取、单独失败，
//! 错误中带字段名，便于定位是哪一处结构变化。

use scraper::{ElementRef, Html, Selector};

use super::network::download_url;
use crate::download::models::DownloadError;

const TITLE_SELECTOR: &str = "h1";
const TYPE_ROW_SELECTOR: &str = "div.mantine-Stack-root div tbody > tr";
const PRIMARY_DOWNLOAD_SELECTOR: &str =
    ".mantine-Stack-root .mantine-UnstyledButton-root.mantine-Button-root";

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

/// 已解析的模型页面。
pub struct ModelPage {
    document: Html,
}

impl ModelPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    fn first_text(&self, css: &'static str) -> Option<String> {
        self.document
            .select(&selector(css))
            .map(element_text)
            .find(|text| !text.is_empty())
    }
}

/// 元素内全部文本，空白折叠为单个空格。
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn extract_title(page: &ModelPage) -> Result<String, DownloadError> {
    page.first_text(TITLE_SELECTOR).ok_or_else(|| {
        DownloadError::parse(
            "title",
            "no <h1> heading (login wall or error page instead of a model page?)",
        )
    })
}

/// 详情面板表格第一行的第二个单元格。
pub fn extract_type(page: &ModelPage) -> Result<String, DownloadError> {
    let row = page
        .document
        .select(&selector(TYPE_ROW_SELECTOR))
        .next()
        .ok_or_else(|| DownloadError::parse("type", "details table not found"))?;

    let cell = row
        .children()
        .filter_map(ElementRef::wrap)
        .nth(1)
        .ok_or_else(|| DownloadError::parse("type", "details row has no second cell"))?;

    let text = element_text(cell);
    if text.is_empty() {
        return Err(DownloadError::parse("type", "type cell is empty"));
    }
    Ok(text)
}

/// 主下载按钮的链接：返回 (绝对 URL, 下载 ID)。
pub fn extract_download_id(
    page: &ModelPage,
    base_url: &str,
) -> Result<(String, u64), DownloadError> {
    let href = page
        .document
        .select(&selector(PRIMARY_DOWNLOAD_SELECTOR))
        .find_map(|el| el.value().attr("href"))
        .ok_or_else(|| {
            DownloadError::parse(
                "download",
                "primary download button not found (content may be gated without login)",
            )
        })?;

    let id = trailing_id(href).ok_or_else(|| {
        DownloadError::parse("download", format!("link '{href}' does not end in a numeric id"))
    })?;

    Ok((absolute_url(base_url, href), id))
}

/// 有覆盖 ID 时直接构造 URL，不查询页面。
pub fn resolve_download(
    base_url: &str,
    override_id: Option<u64>,
    page: &ModelPage,
) -> Result<(String, u64), DownloadError> {
    match override_id {
        Some(id) => Ok((download_url(base_url, id), id)),
        None => extract_download_id(page, base_url),
    }
}

fn trailing_id(href: &str) -> Option<u64> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}
