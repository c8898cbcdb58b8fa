//! 模型类型 → 目标子目录。按顺序匹配，首个命中生效；均未命中时回退到根目录。

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// (整串匹配的正则, 相对根目录的子路径)，顺序即优先级。
const RULES: [(&str, &str); 5] = [
    (r"^LORA$", "models/Lora"),
    (r"^Textual Inversion$", "embeddings"),
    (r"^\s*Checkpoint.*$", "models/Stable-diffusion"),
    (r"^Hypernetwork$", "models/hypernetworks"),
    (r"^Aesthetic Gradient$", "models/aesthetic_embeddings"),
];

fn compiled_rules() -> &'static [(Regex, &'static str)] {
    static R: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    R.get_or_init(|| {
        RULES
            .iter()
            .map(|(pattern, dir)| (Regex::new(pattern).expect("compile directory rule"), *dir))
            .collect()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Matched(&'static str),
    Fallback,
}

pub fn classify(model_type: &str) -> Classification {
    let trimmed = model_type.trim();
    compiled_rules()
        .iter()
        .find(|(re, _)| re.is_match(trimmed))
        .map(|(_, dir)| Classification::Matched(dir))
        .unwrap_or(Classification::Fallback)
}

/// 纯路径计算，不访问文件系统。
pub fn resolve_directory(base: &Path, model_type: &str) -> PathBuf {
    match classify(model_type) {
        Classification::Matched(dir) => {
            debug!("类型 '{}' 归入 {}", model_type, dir);
            base.join(dir)
        }
        Classification::Fallback => {
            warn!(
                "未识别的模型类型 '{}'，直接保存到 {}",
                model_type,
                base.display()
            );
            base.to_path_buf()
        }
    }
}
