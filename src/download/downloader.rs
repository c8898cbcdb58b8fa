//! 单个模型文件的下载：取文件名、防覆盖、占位、流式写盘。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::models::{DownloadError, Model, Outcome};
use super::progress::make_download_bar;
use crate::network_parser::auth::AuthState;
use crate::network_parser::network::{DownloadStream, ModelSource};

const CHUNK_SIZE: usize = 8 * 1024;

/// 从 `Content-Disposition` 取文件名。优先 RFC 5987 的 `filename*=`，否则取
/// `filename=` 之后到下一个 `;` 并去掉引号。只保留最后一段路径，避免写出目标目录。
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let raw = param_value(header, "filename*=")
        .and_then(decode_extended_value)
        .or_else(|| param_value(header, "filename=").map(str::to_string))?;
    let value = raw.replace('"', "");
    let name = value.trim().rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

// 小写化只改 ASCII 字节，下标与原串一致
fn param_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header.to_ascii_lowercase().find(key)? + key.len();
    header[start..].split(';').next()
}

/// `charset'lang'percent-encoded`；非 UTF-8 字符集按 ISO-8859-1 解释。
fn decode_extended_value(value: &str) -> Option<String> {
    let mut parts = value.trim().trim_matches('"').splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let bytes = urlencoding::decode_binary(parts.next()?.as_bytes());
    if charset.eq_ignore_ascii_case("utf-8") {
        Some(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Some(bytes.iter().map(|&b| char::from(b)).collect())
    }
}

pub fn download<S: ModelSource + ?Sized>(
    source: &S,
    auth: &mut AuthState,
    model: &mut Model,
    target_dir: &Path,
    show_progress: bool,
) -> Result<Outcome, DownloadError> {
    let download_id = model
        .download_id
        .ok_or_else(|| DownloadError::parse("download", "no download id resolved"))?;

    let stream = source.open_download(download_id, auth)?;
    let filename = stream
        .content_disposition
        .as_deref()
        .and_then(filename_from_disposition)
        .ok_or_else(|| DownloadError::MissingFilename {
            url: stream.url.clone(),
        })?;

    fs::create_dir_all(target_dir).map_err(|source| DownloadError::Io {
        path: target_dir.to_path_buf(),
        source,
    })?;
    let path = target_dir.join(&filename);

    if path.exists() {
        info!("{} 已存在，跳过下载", path.display());
        model.already_exists = true;
        return Ok(Outcome::Skipped { path });
    }

    // 先创建空文件占住路径，再开始传输
    let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            info!("{} 已被其他进程占用，跳过下载", path.display());
            model.already_exists = true;
            return Ok(Outcome::Skipped { path });
        }
        Err(source) => return Err(DownloadError::Io { path, source }),
    };
    debug!("已创建占位文件 {}", path.display());

    info!(
        "开始下载 {} 模型 {} ({}) -> {}",
        model.model_type,
        model.name,
        model.id,
        path.display()
    );

    match write_body(stream, file, &path, show_progress) {
        Ok(bytes) => Ok(Outcome::Completed { path, bytes }),
        Err((written, source)) => {
            if written == 0 {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("无法删除空占位文件 {}: {}", path.display(), e);
                }
            } else {
                warn!(
                    "下载中断，已写入 {} 字节的不完整文件保留在 {}",
                    written,
                    path.display()
                );
            }
            Err(DownloadError::Transfer {
                path,
                written,
                source,
            })
        }
    }
}

/// 按块复制正文；失败时返回已写入的字节数。
fn write_body(
    stream: DownloadStream,
    mut file: File,
    path: &Path,
    show_progress: bool,
) -> Result<u64, (u64, io::Error)> {
    let total = stream.content_length.unwrap_or(0);
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bar = make_download_bar(total, &label, show_progress);

    let mut reader = stream.body;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                bar.abandon();
                return Err((written, e));
            }
        };
        if let Err(e) = file.write_all(&buf[..n]) {
            bar.abandon();
            return Err((written, e));
        }
        written += n as u64;
        bar.inc(n as u64);
    }
    if let Err(e) = file.flush() {
        bar.abandon();
        return Err((written, e));
    }
    bar.finish_and_clear();
    Ok(written)
}
