use super::file::FileRef;
use crate::error::{SyncError, SyncResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 目录列举结果
#[derive(Debug, Clone, Default)]
pub struct DirContents {
    pub files: Vec<FileRef>,
    pub subdirs: Vec<DirRef>,
}

/// 目录引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirRef {
    path: PathBuf,
}

impl DirRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        matches!(fs::metadata(&self.path).await, Ok(meta) if meta.is_dir())
    }

    /// 列出目录内容；目录不存在时返回空结果
    ///
    /// 只收集普通文件，不跟随符号链接。结果按文件名排序。
    pub async fn contents(&self, recursive: bool) -> SyncResult<DirContents> {
        if !self.exists().await {
            return Ok(DirContents::default());
        }

        let base = self.path.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let contents = tokio::task::spawn_blocking(move || {
            let mut walker = WalkDir::new(&base)
                .follow_links(false)
                .min_depth(1)
                .sort_by_file_name();
            if !recursive {
                walker = walker.max_depth(1);
            }

            let mut contents = DirContents::default();
            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!("遍历目录时出错 {:?}: {}", base, e);
                        continue;
                    }
                };

                let file_type = entry.file_type();
                if file_type.is_file() {
                    contents.files.push(FileRef::new(entry.into_path()));
                } else if file_type.is_dir() {
                    contents.subdirs.push(DirRef::new(entry.into_path()));
                }
            }
            contents
        })
        .await?;

        debug!(
            "列出目录 {:?}: {} 个文件, {} 个子目录",
            self.path,
            contents.files.len(),
            contents.subdirs.len()
        );

        Ok(contents)
    }

    /// 确保目录存在
    pub async fn ensure(&self) -> SyncResult<()> {
        fs::create_dir_all(&self.path)
            .await
            .map_err(|e| SyncError::io(&self.path, e))
    }

    /// 清空目录内容，保留目录本身
    pub async fn empty(&self) -> SyncResult<()> {
        let mut entries = match fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::io(&self.path, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SyncError::io(&path, e))?;
            let result = if file_type.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            result.map_err(|e| SyncError::io(&path, e))?;
        }

        Ok(())
    }

    /// 递归删除目录；本就不存在时返回 false
    pub async fn delete(&self) -> SyncResult<bool> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::io(&self.path, e)),
        }
    }
}

impl From<PathBuf> for DirRef {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for DirRef {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}
