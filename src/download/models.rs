//! 下载相关的数据模型定义。
//!
//! 包含单个模型的解析状态、下载结果、批处理状态与错误类型。

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {reason}")]
    Fetch { url: String, reason: String },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not find {field} on the model page: {reason}")]
    Parse { field: &'static str, reason: String },
    #[error("download response from {url} has no usable filename")]
    MissingFilename { url: String },
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("transfer to {path} failed after {written} bytes (partial file left on disk): {source}")]
    Transfer {
        path: PathBuf,
        written: u64,
        source: io::Error,
    },
}

impl DownloadError {
    pub(crate) fn parse(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            field,
            reason: reason.into(),
        }
    }
}

/// 单个模型在一次批处理中的全部状态。每个 ID 使用一个全新的值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub id: u64,
    pub name: String,
    pub model_type: String,
    pub download_id: Option<u64>,
    pub download_url: String,
    pub already_exists: bool,
}

impl Model {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] - {}", self.name, self.id, self.model_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { path: PathBuf, bytes: u64 },
    Skipped { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Resolving,
    Resolved,
    ResolveFailed,
    Downloading,
    Completed,
    Skipped,
    DownloadFailed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemState::ResolveFailed
                | ItemState::Completed
                | ItemState::Skipped
                | ItemState::DownloadFailed
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(self, ItemState::ResolveFailed | ItemState::DownloadFailed)
    }
}

#[derive(Debug)]
pub struct ItemReport {
    pub model: Model,
    pub state: ItemState,
    pub path: Option<PathBuf>,
    pub bytes: u64,
    pub error: Option<DownloadError>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for item in &self.items {
            match item.state {
                ItemState::Completed => summary.completed += 1,
                ItemState::Skipped => summary.skipped += 1,
                s if s.is_failure() => summary.failed += 1,
                _ => {}
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|i| i.state.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_model_carries_only_the_id() {
        let populated = Model {
            id: 111,
            name: "Detail Tweaker".to_string(),
            model_type: "LORA".to_string(),
            download_id: Some(62833),
            download_url: "https://civitai.com/api/download/models/62833".to_string(),
            already_exists: true,
        };
        let next = Model::new(222);
        assert_eq!(next, Model { id: 222, ..Model::default() });
        assert_ne!(next.name, populated.name);
        assert!(next.download_id.is_none());
        assert!(!next.already_exists);
    }

    #[test]
    fn summary_counts_terminal_states() {
        let item = |state| ItemReport {
            model: Model::new(1),
            state,
            path: None,
            bytes: 0,
            error: None,
        };
        let report = BatchReport {
            items: vec![
                item(ItemState::Completed),
                item(ItemState::Skipped),
                item(ItemState::ResolveFailed),
                item(ItemState::DownloadFailed),
            ],
        };
        assert_eq!(
            report.summary(),
            BatchSummary {
                completed: 1,
                skipped: 1,
                failed: 2
            }
        );
        assert!(report.has_failures());
    }
}
