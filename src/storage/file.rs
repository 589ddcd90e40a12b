use super::hash::{hash_file, HashAlgorithm};
use crate::core::path::RelativePath;
use crate::error::{SyncError, SyncResult};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

/// 文件元数据（用于快速比较）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size: u64,
    pub modified: SystemTime,
}

/// 文件引用：只保存路径，每次操作都重新访问文件系统
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    path: PathBuf,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 路径上是否存在普通文件（目录不算）
    pub async fn exists(&self) -> bool {
        matches!(fs::metadata(&self.path).await, Ok(meta) if meta.is_file())
    }

    /// 获取元数据，文件不存在时返回 None
    pub async fn stat(&self) -> SyncResult<Option<FileMeta>> {
        match fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {
                let modified = meta.modified().map_err(|e| SyncError::io(&self.path, e))?;
                Ok(Some(FileMeta {
                    size: meta.len(),
                    modified,
                }))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::io(&self.path, e)),
        }
    }

    /// 计算内容哈希
    pub async fn hash(&self, algorithm: HashAlgorithm) -> SyncResult<String> {
        hash_file(&self.path, algorithm).await
    }

    pub async fn read(&self) -> SyncResult<Vec<u8>> {
        fs::read(&self.path)
            .await
            .map_err(|e| SyncError::io(&self.path, e))
    }

    /// 写入整个文件，自动创建父目录
    pub async fn write(&self, data: impl AsRef<[u8]>) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        fs::write(&self.path, data)
            .await
            .map_err(|e| SyncError::io(&self.path, e))
    }

    /// 复制到目标路径，保留修改时间，返回复制的字节数
    ///
    /// 先写入目标目录下唯一命名的临时文件再重命名，目标要么是旧内容要么是
    /// 完整的新内容。任何一步失败临时文件都会被删除。
    pub async fn copy_to(&self, dest: &FileRef) -> SyncResult<u64> {
        let meta = self
            .stat()
            .await?
            .ok_or_else(|| SyncError::NotFound(self.path.clone()))?;

        if let Some(parent) = dest.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }

        let src = self.path.clone();
        let dest_path = dest.path.clone();
        let mtime = FileTime::from_system_time(meta.modified);
        let bytes =
            tokio::task::spawn_blocking(move || copy_via_temp(&src, &dest_path, mtime)).await??;

        debug!("复制: {:?} -> {:?} ({}字节)", self.path, dest.path, bytes);
        Ok(bytes)
    }

    /// 删除文件；文件本就不存在时返回 false
    pub async fn delete(&self) -> SyncResult<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("删除: {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::io(&self.path, e)),
        }
    }

    /// 相对某个根目录的路径
    pub fn relative_to(&self, root: &Path) -> SyncResult<RelativePath> {
        RelativePath::from_paths(root, &self.path)
    }
}

/// 阻塞实现：复制内容和权限到临时文件，设置修改时间后原子替换目标
fn copy_via_temp(src: &Path, dest: &Path, mtime: FileTime) -> SyncResult<u64> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));

    // NamedTempFile 在 drop 时删除自身，失败路径不会留下临时文件
    let mut temp = tempfile::Builder::new()
        .prefix(".treesync-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| SyncError::io(parent, e))?;

    let mut source = std::fs::File::open(src).map_err(|e| SyncError::io(src, e))?;
    let permissions = source
        .metadata()
        .map_err(|e| SyncError::io(src, e))?
        .permissions();
    let bytes =
        std::io::copy(&mut source, temp.as_file_mut()).map_err(|e| SyncError::io(src, e))?;

    std::fs::set_permissions(temp.path(), permissions)
        .map_err(|e| SyncError::io(temp.path(), e))?;
    filetime::set_file_mtime(temp.path(), mtime).map_err(|e| SyncError::io(temp.path(), e))?;

    temp.persist(dest)
        .map_err(|e| SyncError::io(dest, e.error))?;
    Ok(bytes)
}

impl From<PathBuf> for FileRef {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}
