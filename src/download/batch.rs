//! 批处理编排：逐个 ID 解析页面、归类目录、下载文件。
//!
//! 单线程顺序执行；每个 ID 使用全新的 `Model`，单个失败只记录不中断。

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use super::classifier::resolve_directory;
use super::downloader::download;
use super::models::{BatchReport, DownloadError, ItemReport, ItemState, Model, Outcome};
use crate::network_parser::auth::AuthState;
use crate::network_parser::network::ModelSource;
use crate::network_parser::parser::{ModelPage, extract_title, extract_type, resolve_download};

pub struct BatchRunner<S: ModelSource> {
    source: S,
    auth: AuthState,
    output_root: PathBuf,
    show_progress: bool,
}

impl<S: ModelSource> BatchRunner<S> {
    pub fn new(source: S, auth: AuthState, output_root: PathBuf, show_progress: bool) -> Self {
        Self {
            source,
            auth,
            output_root,
            show_progress,
        }
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// `override_id` 只作用于列表中的第一个 ID。
    pub fn run(&mut self, ids: &[u64], override_id: Option<u64>) -> BatchReport {
        let mut report = BatchReport::default();
        for (idx, &id) in ids.iter().enumerate() {
            let item_override = if idx == 0 { override_id } else { None };
            info!("[{}/{}] 处理模型 {}", idx + 1, ids.len(), id);
            report.items.push(self.process(id, item_override));
        }

        let summary = report.summary();
        info!(
            "批处理结束: 完成 {}，跳过 {}，失败 {}",
            summary.completed, summary.skipped, summary.failed
        );
        report
    }

    fn process(&mut self, id: u64, override_id: Option<u64>) -> ItemReport {
        let mut model = Model::new(id);
        let mut state = ItemState::Pending;

        advance(&mut state, ItemState::Resolving, id);
        if let Err(e) = self.resolve(&mut model, override_id) {
            advance(&mut state, ItemState::ResolveFailed, id);
            error!("模型 {} 解析失败: {}", id, e);
            return finish(model, state, None, 0, Some(e));
        }
        advance(&mut state, ItemState::Resolved, id);
        info!("已解析: {}", model);

        let target_dir = resolve_directory(&self.output_root, &model.model_type);
        advance(&mut state, ItemState::Downloading, id);
        match download(
            &self.source,
            &mut self.auth,
            &mut model,
            &target_dir,
            self.show_progress,
        ) {
            Ok(Outcome::Completed { path, bytes }) => {
                advance(&mut state, ItemState::Completed, id);
                info!(
                    "已下载 {} 模型 {} ({}) 到 {}",
                    model.model_type,
                    model.name,
                    model.download_id.unwrap_or_default(),
                    path.display()
                );
                finish(model, state, Some(path), bytes, None)
            }
            Ok(Outcome::Skipped { path }) => {
                advance(&mut state, ItemState::Skipped, id);
                finish(model, state, Some(path), 0, None)
            }
            Err(e) => {
                advance(&mut state, ItemState::DownloadFailed, id);
                error!("模型 {} 下载失败: {}", id, e);
                finish(model, state, None, 0, Some(e))
            }
        }
    }

    fn resolve(&mut self, model: &mut Model, override_id: Option<u64>) -> Result<(), DownloadError> {
        let html = self.source.fetch_page(model.id, &mut self.auth)?;
        let page = ModelPage::parse(&html);

        model.name = extract_title(&page)?;
        model.model_type = extract_type(&page)?;
        if let Some(id) = override_id {
            info!("使用指定的下载 ID {}", id);
        }
        let (url, download_id) = resolve_download(self.source.base_url(), override_id, &page)?;
        model.download_url = url;
        model.download_id = Some(download_id);
        Ok(())
    }
}

fn advance(state: &mut ItemState, next: ItemState, id: u64) {
    debug!("模型 {}: {:?} -> {:?}", id, state, next);
    *state = next;
}

fn finish(
    model: Model,
    state: ItemState,
    path: Option<PathBuf>,
    bytes: u64,
    error: Option<DownloadError>,
) -> ItemReport {
    debug_assert!(state.is_terminal());
    ItemReport {
        model,
        state,
        path,
        bytes,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::testing::FakeSource;
    use crate::network_parser::parser::tests::model_page_html;
    use std::fs;

    fn source() -> FakeSource {
        FakeSource::new()
            .with_page(111, model_page_html("Detail Tweaker", "LORA", 1001))
            .with_page(222, model_page_html("Mystery", "Unknown Type", 2002))
            .with_file(1001, "detail_tweaker.safetensors", b"lora-bytes".to_vec())
            .with_file(2002, "mystery.bin", b"mystery-bytes".to_vec())
    }

    #[test]
    fn files_land_in_classified_directories_and_rerun_skips() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = BatchRunner::new(
            source(),
            AuthState::default(),
            root.path().to_path_buf(),
            false,
        );

        let report = runner.run(&[111, 222], None);
        let states: Vec<_> = report.items.iter().map(|i| i.state).collect();
        assert_eq!(states, vec![ItemState::Completed, ItemState::Completed]);

        let lora = root.path().join("models/Lora/detail_tweaker.safetensors");
        let mystery = root.path().join("mystery.bin");
        assert_eq!(fs::read(&lora).unwrap(), b"lora-bytes");
        assert_eq!(fs::read(&mystery).unwrap(), b"mystery-bytes");
        assert_eq!(report.items[0].path.as_deref(), Some(lora.as_path()));
        assert_eq!(report.items[0].bytes, 10);
        assert_eq!(report.items[1].model.model_type, "Unknown Type");

        let again = runner.run(&[111], None);
        assert_eq!(again.items[0].state, ItemState::Skipped);
        assert!(again.items[0].model.already_exists);
        assert_eq!(fs::read(&lora).unwrap(), b"lora-bytes");
        assert!(!again.has_failures());
    }

    #[test]
    fn failures_are_reported_and_do_not_leak_into_next_model() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = BatchRunner::new(
            source(),
            AuthState::default(),
            root.path().to_path_buf(),
            false,
        );

        let report = runner.run(&[111, 333, 222], None);
        let failed = &report.items[1];
        assert_eq!(failed.state, ItemState::ResolveFailed);
        assert_eq!(failed.model, Model::new(333));
        assert!(matches!(
            failed.error,
            Some(DownloadError::Status { status: 404, .. })
        ));

        assert_eq!(report.items[2].state, ItemState::Completed);
        assert_eq!(report.items[2].model.name, "Mystery");
        assert_eq!(report.summary().failed, 1);
        assert_eq!(report.summary().completed, 2);
    }

    #[test]
    fn override_applies_to_first_id_only() {
        let root = tempfile::tempdir().unwrap();
        let src = source().with_file(5005, "pinned.safetensors", b"pinned".to_vec());
        let mut runner = BatchRunner::new(src, AuthState::default(), root.path().to_path_buf(), false);

        let report = runner.run(&[111, 222], Some(5005));
        assert_eq!(report.items[0].model.download_id, Some(5005));
        assert_eq!(
            report.items[0].model.download_url,
            "https://civitai.test/api/download/models/5005"
        );
        assert_eq!(report.items[1].model.download_id, Some(2002));
        assert!(root.path().join("models/Lora/pinned.safetensors").exists());
        assert_eq!(
            runner.source.requests(),
            vec!["page:111", "download:5005", "page:222", "download:2002"]
        );
    }

    #[test]
    fn download_failure_is_reported_and_batch_continues() {
        let root = tempfile::tempdir().unwrap();
        let src = source().with_page(444, model_page_html("No File", "Hypernetwork", 4004));
        let mut runner = BatchRunner::new(src, AuthState::default(), root.path().to_path_buf(), false);

        let report = runner.run(&[444, 111], None);
        assert_eq!(report.items[0].state, ItemState::DownloadFailed);
        assert_eq!(report.items[0].model.name, "No File");
        assert_eq!(report.items[1].state, ItemState::Completed);
    }

    #[test]
    fn auth_state_is_threaded_through_every_call() {
        let root = tempfile::tempdir().unwrap();
        let mut runner = BatchRunner::new(
            source(),
            AuthState::new([("cf_clearance", "abc")]),
            root.path().to_path_buf(),
            false,
        );

        runner.run(&[111, 222], None);
        let auth = runner.auth();
        assert_eq!(auth.get("cf_clearance"), Some("abc"));
        assert_eq!(auth.get("page-session"), Some("222"));
        assert_eq!(auth.get("download-session"), Some("2002"));
    }
}
