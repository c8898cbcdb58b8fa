//! YAML 配置文件读写与带注释生成。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// 在 `dir`（缺省为当前目录）下读取 `T::FILE_NAME`，不存在则写出默认配置。
pub fn load_or_create<T: ConfigSpec>(dir: Option<&Path>) -> Result<T, ConfigError> {
    let path = match dir {
        Some(dir) => dir.join(T::FILE_NAME),
        None => PathBuf::from(T::FILE_NAME),
    };
    load_or_create_at(&path)
}

/// 读取指定路径的配置文件。
///
/// 用户文件中的键覆盖默认值；未知键原样保留。若缺少任何已知字段，
/// 则以合并后的结果重写文件（带注释），方便用户看到新增配置项。
pub fn load_or_create_at<T: ConfigSpec>(path: &Path) -> Result<T, ConfigError> {
    ensure_parent(path)?;

    if !path.exists() {
        let default_config = T::default();
        write_with_comments(&default_config, path)?;
        info!("已生成默认配置文件: {}", path.display());
        return Ok(default_config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let user_yaml: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let missing = missing_fields::<T>(&user_yaml);

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_yaml);

    let config: T =
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;

    if !missing.is_empty() {
        debug!("{} 缺少字段 {:?}，补全后重写", path.display(), missing);
        write_with_comments(&config, path)?;
    }

    Ok(config)
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    ensure_parent(path)?;
    let yaml = generate_yaml_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut lines = Vec::new();
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }
    lines.push(String::new());

    Ok(lines.join("\n"))
}

fn missing_fields<T: ConfigSpec>(user: &Value) -> Vec<&'static str> {
    let Value::Mapping(map) = user else {
        return T::fields().iter().map(|f| f.name).collect();
    };
    T::fields()
        .iter()
        .filter(|f| !map.contains_key(Value::String(f.name.to_string())))
        .map(|f| f.name)
        .collect()
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                match dest.get_mut(&key) {
                    Some(dest_val) => merge_values(dest_val, user_val),
                    None => {
                        dest.insert(key, user_val);
                    }
                }
            }
        }
        // 空文件解析为 Null：保留默认值
        (_, Value::Null) => {}
        (dest, other) => {
            *dest = other;
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::{Config, CookieConfig};

    #[test]
    fn creates_commented_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: Config = load_or_create(Some(dir.path())).unwrap();
        assert_eq!(cfg.base_url, "https://civitai.com");

        let written = fs::read_to_string(dir.path().join("config.yml")).unwrap();
        assert!(written.contains("# 站点地址"));
        assert!(written.contains("request_timeout: 30"));
    }

    #[test]
    fn user_values_override_defaults_and_missing_fields_are_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "sd_base_directory: /srv/sd\nrequest_timeout: 5\n").unwrap();

        let cfg: Config = load_or_create_at(&path).unwrap();
        assert_eq!(cfg.sd_base_directory, "/srv/sd");
        assert_eq!(cfg.request_timeout, 5);
        assert_eq!(cfg.download_timeout, 3600);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("download_timeout: 3600"));
        assert!(rewritten.contains("sd_base_directory: /srv/sd"));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.yml");
        fs::write(&path, "").unwrap();
        let cookies: CookieConfig = load_or_create_at(&path).unwrap();
        assert!(cookies.pairs().is_empty());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "base_url: [unterminated\n").unwrap();
        let err = load_or_create_at::<Config>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
