//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（Model / Outcome / BatchReport / DownloadError）
//! - `classifier`  — 模型类型到目标目录的映射
//! - `downloader`  — 单个文件的流式下载
//! - `progress`    — CLI 进度条
//! - `batch`       — 批处理编排

pub mod batch;
pub mod classifier;
pub mod downloader;
pub mod models;
pub(crate) mod progress;

#[cfg(test)]
pub(crate) mod testing;
