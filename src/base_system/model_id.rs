//! 模型 ID/链接解析与批量 ID 文件读取。

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::download::models::DownloadError;

static RE_MODEL_URL: OnceLock<Regex> = OnceLock::new();

fn re_model_url() -> &'static Regex {
    RE_MODEL_URL
        .get_or_init(|| Regex::new(r"/models/(\d+)(?:[/?#]|$)").expect("compile RE_MODEL_URL"))
}

/// 接受纯数字或模型页面链接（`https://civitai.com/models/1234/some-slug`）。
pub fn parse_model_id(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(id) = trimmed.parse::<u64>() {
        return Some(id);
    }

    re_model_url()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// clap 的 value_parser。
pub fn parse_model_id_arg(input: &str) -> Result<u64, String> {
    parse_model_id(input).ok_or_else(|| format!("'{input}' 不是有效的模型 ID 或链接"))
}

/// 逐行解析 ID 列表。空行跳过；任一非整数行使整批失败。
pub fn parse_id_lines(text: &str) -> Result<Vec<u64>, DownloadError> {
    let mut ids = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line.parse::<u64>().map_err(|_| {
            DownloadError::InvalidInput(format!("第 {} 行不是整数: '{}'", idx + 1, line))
        })?;
        ids.push(id);
    }
    Ok(ids)
}

pub fn read_id_file(path: &Path) -> Result<Vec<u64>, DownloadError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        DownloadError::InvalidInput(format!("无法读取 ID 文件 {}: {}", path.display(), e))
    })?;
    parse_id_lines(&raw)
}

/// 合并命令行 ID 与 ID 文件：二者必须且只能提供其一，且结果非空。
pub fn collect_ids(ids: &[u64], file: Option<&Path>) -> Result<Vec<u64>, DownloadError> {
    let collected = match (ids.is_empty(), file) {
        (false, None) => ids.to_vec(),
        (true, Some(path)) => read_id_file(path)?,
        (false, Some(_)) => {
            return Err(DownloadError::InvalidInput(
                "--id 与 --file 不能同时使用".to_string(),
            ));
        }
        (true, None) => {
            return Err(DownloadError::InvalidInput(
                "需要提供 --id 或 --file".to_string(),
            ));
        }
    };

    if collected.is_empty() {
        return Err(DownloadError::InvalidInput("没有可处理的模型 ID".to_string()));
    }
    Ok(collected)
}
