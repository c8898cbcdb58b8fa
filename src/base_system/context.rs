//! 全局配置结构（Config / CookieConfig）与默认值。
//!
//! 该模块同时提供生成 `config.yml` / `cookies.yml` 的字段元信息。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::{ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 路径配置
    #[serde(default)]
    pub sd_base_directory: String,
    #[serde(default)]
    pub sd_fallback_directory: String,

    // 网络配置
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 程序配置
    #[serde(default = "default_true")]
    pub show_progress: bool,
    #[serde(default = "default_cookie_file")]
    pub cookie_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sd_base_directory: String::new(),
            sd_fallback_directory: String::new(),
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            show_progress: default_true(),
            cookie_file: default_cookie_file(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 9] = [
            FieldMeta {
                name: "sd_base_directory",
                description: "Stable Diffusion 根目录（模型按类型放入其子目录）",
            },
            FieldMeta {
                name: "sd_fallback_directory",
                description: "未设置根目录时使用的目录（留空则为 下载目录/stable-diffusion）",
            },
            FieldMeta {
                name: "base_url",
                description: "站点地址",
            },
            FieldMeta {
                name: "request_timeout",
                description: "页面请求超时时间（秒）",
            },
            FieldMeta {
                name: "download_timeout",
                description: "单个文件下载超时时间（秒）",
            },
            FieldMeta {
                name: "connect_timeout",
                description: "连接超时时间（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "show_progress",
                description: "是否显示下载进度条",
            },
            FieldMeta {
                name: "cookie_file",
                description: "Cookie 配置文件名（相对数据目录）",
            },
        ];
        &FIELDS
    }
}

impl Config {
    /// 覆盖根目录（命令行参数或环境变量）。空字符串不生效。
    pub fn override_base_directory(&mut self, dir: Option<String>) {
        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            debug!("根目录被覆盖为 {}", dir);
            self.sd_base_directory = dir;
        }
    }

    pub fn fallback_directory(&self) -> PathBuf {
        if !self.sd_fallback_directory.trim().is_empty() {
            return PathBuf::from(self.sd_fallback_directory.trim());
        }
        dirs::download_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stable-diffusion")
    }

    /// 模型文件的输出根目录：优先 `sd_base_directory`，否则回退目录。
    pub fn output_root(&self) -> PathBuf {
        let base = self.sd_base_directory.trim();
        if !base.is_empty() {
            info!("使用根目录: {}", base);
            return PathBuf::from(base);
        }
        let fallback = self.fallback_directory();
        warn!(
            "未设置 sd_base_directory，使用回退目录: {}",
            fallback.display()
        );
        fallback
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.max(1))
    }
}

/// 会话 Cookie（从浏览器复制）。字段名即 Cookie 名。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(rename = "__Host-next-auth.csrf-token", default)]
    pub csrf_token: String,
    #[serde(rename = "__Secure-civitai-token", default)]
    pub civitai_token: String,
    #[serde(rename = "__Secure-next-auth.callback-url", default)]
    pub callback_url: String,
    #[serde(rename = "__Secure-next-auth.session-token", default)]
    pub session_token: String,
    #[serde(rename = "cf_clearance", default)]
    pub cf_clearance: String,
    #[serde(rename = "f_period", default)]
    pub f_period: String,
    #[serde(rename = "mantine-color-scheme", default)]
    pub color_scheme: String,
}

impl ConfigSpec for CookieConfig {
    const FILE_NAME: &'static str = "cookies.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 7] = [
            FieldMeta {
                name: "__Host-next-auth.csrf-token",
                description: "以下值从已登录浏览器的 Cookie 中复制；留空则不发送",
            },
            FieldMeta {
                name: "__Secure-civitai-token",
                description: "",
            },
            FieldMeta {
                name: "__Secure-next-auth.callback-url",
                description: "",
            },
            FieldMeta {
                name: "__Secure-next-auth.session-token",
                description: "登录会话，缺失时受限内容无法解析",
            },
            FieldMeta {
                name: "cf_clearance",
                description: "",
            },
            FieldMeta {
                name: "f_period",
                description: "",
            },
            FieldMeta {
                name: "mantine-color-scheme",
                description: "",
            },
        ];
        &FIELDS
    }
}

impl CookieConfig {
    /// 非空的 (name, value) 对，按字段顺序。
    pub fn pairs(&self) -> Vec<(String, String)> {
        let all = [
            ("__Host-next-auth.csrf-token", &self.csrf_token),
            ("__Secure-civitai-token", &self.civitai_token),
            ("__Secure-next-auth.callback-url", &self.callback_url),
            ("__Secure-next-auth.session-token", &self.session_token),
            ("cf_clearance", &self.cf_clearance),
            ("f_period", &self.f_period),
            ("mantine-color-scheme", &self.color_scheme),
        ];

        let mut out = Vec::new();
        for (name, value) in all {
            let value = value.trim();
            if value.is_empty() {
                debug!("Cookie {} 为空，跳过", name);
                continue;
            }
            out.push((name.to_string(), value.to_string()));
        }
        if out.is_empty() {
            warn!("未配置任何 Cookie，请求将以未登录状态发送");
        }
        out
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://civitai.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    3600
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}

fn default_cookie_file() -> String {
    "cookies.yml".to_string()
}
