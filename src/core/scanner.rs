use crate::core::path::RelativePath;
use crate::error::{SyncError, SyncResult};
use crate::storage::{DirRef, FileRef};
use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 文件扫描器配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// 排除规则（glob patterns），区分大小写
    pub exclude_patterns: Vec<String>,
    /// 最大文件大小（0 表示不限制）
    pub max_file_size: u64,
    /// 仅包含的扩展名（空表示不限制）
    pub include_extensions: Vec<String>,
}

impl ScanConfig {
    /// 常见的排除模式
    pub fn common_excludes() -> Self {
        Self {
            exclude_patterns: vec![
                ".git/**".to_string(),
                ".svn/**".to_string(),
                "node_modules/**".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "*.tmp".to_string(),
                "*.temp".to_string(),
                "~*".to_string(),
            ],
            ..Default::default()
        }
    }
}

/// 预编译的排除规则
#[derive(Debug, Clone)]
enum Pattern {
    /// `prefix/**/suffix` 形式
    Recursive { prefix: String, suffix: String },
    /// 含 `*` 的通配，匹配完整路径或文件名
    Wildcard(Regex),
    /// 精确匹配完整路径或末尾若干段
    Exact(String),
}

impl Pattern {
    fn compile(pattern: &str) -> SyncResult<Self> {
        if let Some((prefix, suffix)) = pattern.split_once("**") {
            return Ok(Pattern::Recursive {
                prefix: prefix.trim_end_matches('/').to_string(),
                suffix: suffix.trim_start_matches('/').to_string(),
            });
        }

        if pattern.contains('*') {
            let regex_pattern = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let re = Regex::new(&format!("^{}$", regex_pattern))
                .map_err(|e| SyncError::Config(format!("排除规则 {:?} 无效: {}", pattern, e)))?;
            return Ok(Pattern::Wildcard(re));
        }

        Ok(Pattern::Exact(pattern.to_string()))
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Recursive { prefix, suffix } => {
                if prefix.is_empty() && suffix.is_empty() {
                    return true;
                }
                if !prefix.is_empty()
                    && path != prefix
                    && !path.starts_with(&format!("{}/", prefix))
                {
                    return false;
                }
                suffix.is_empty() || path.ends_with(suffix.as_str())
            }
            Pattern::Wildcard(re) => {
                let name = path.rsplit('/').next().unwrap_or(path);
                re.is_match(path) || re.is_match(name)
            }
            Pattern::Exact(p) => path == p || path.ends_with(&format!("/{}", p)),
        }
    }
}

/// 文件扫描器：递归列出目录下的文件，按相对路径建立索引
pub struct FileScanner {
    max_concurrent: usize,
    config: ScanConfig,
    patterns: Vec<Pattern>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl FileScanner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            config: ScanConfig::default(),
            patterns: Vec::new(),
            cancel_flag: None,
        }
    }

    pub fn with_config(max_concurrent: usize, config: ScanConfig) -> SyncResult<Self> {
        let patterns = config
            .exclude_patterns
            .iter()
            .map(|p| Pattern::compile(p))
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self {
            max_concurrent: max_concurrent.max(1),
            config,
            patterns,
            cancel_flag: None,
        })
    }

    /// 设置取消标志
    pub fn with_cancel(mut self, cancel_flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(cancel_flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// 检查相对路径是否应该被排除
    fn should_exclude(&self, path: &RelativePath) -> bool {
        let path = path.as_str();

        if self.patterns.iter().any(|p| p.matches(path)) {
            return true;
        }

        if !self.config.include_extensions.is_empty() {
            let ext = std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();

            if !self
                .config
                .include_extensions
                .iter()
                .any(|e| e.trim_start_matches('.') == ext)
            {
                return true;
            }
        }

        false
    }

    /// 扫描目录并返回 相对路径 -> 文件 的映射；目录不存在时返回空映射
    pub async fn scan(&self, root: &DirRef) -> SyncResult<BTreeMap<RelativePath, FileRef>> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let contents = root.contents(true).await?;
        let listed = contents.files.len();

        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut candidates = Vec::with_capacity(listed);
        let mut excluded_count = 0usize;
        for file in contents.files {
            let relative = match file.relative_to(root.path()) {
                Ok(relative) => relative,
                Err(e) => {
                    warn!("跳过无法表示的路径 {:?}: {}", file.path(), e);
                    excluded_count += 1;
                    continue;
                }
            };
            if self.should_exclude(&relative) {
                debug!("排除文件: {}", relative);
                excluded_count += 1;
                continue;
            }
            candidates.push((relative, file));
        }

        // 检查文件大小需要逐个 stat，限制并发
        if self.config.max_file_size > 0 {
            let max_size = self.config.max_file_size;
            let before = candidates.len();
            candidates = stream::iter(candidates)
                .map(|(relative, file)| async move {
                    let keep = match file.stat().await? {
                        Some(meta) => meta.size <= max_size,
                        None => false,
                    };
                    if !keep {
                        debug!("跳过大文件: {}", relative);
                    }
                    Ok::<_, SyncError>(keep.then_some((relative, file)))
                })
                .buffer_unordered(self.max_concurrent)
                .try_filter_map(|entry| async move { Ok(entry) })
                .try_collect()
                .await?;
            excluded_count += before - candidates.len();
        }

        let tree: BTreeMap<RelativePath, FileRef> = candidates.into_iter().collect();

        info!(
            "扫描完成 {:?}: {} 个文件, {} 个被排除",
            root.path(),
            tree.len(),
            excluded_count
        );

        Ok(tree)
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(8)
    }
}
