//! 文件相等性判断
//!
//! 默认策略 [`MetadataThenHash`]：先比较大小和修改时间，任一不同即认为不同，
//! 不再计算哈希；两者都相同时才比较内容哈希。因此内容相同但修改时间不同的
//! 两个文件会被判为不同。需要纯内容比较时使用 [`ContentHash`]。
//!
//! 两种策略都不缓存结果，每次调用都会重新 stat，必要时重新计算哈希。

use crate::error::{SyncError, SyncResult};
use crate::storage::{FileMeta, FileRef, HashAlgorithm};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// 可插拔的文件相等性策略
#[async_trait]
pub trait FileEquality: fmt::Debug + Send + Sync {
    /// 任一文件不存在时返回 NotFound
    async fn equals(&self, a: &FileRef, b: &FileRef) -> SyncResult<bool>;
}

/// 两侧都存在时才继续比较
async fn stat_both(a: &FileRef, b: &FileRef) -> SyncResult<(FileMeta, FileMeta)> {
    let (meta_a, meta_b) = tokio::try_join!(a.stat(), b.stat())?;
    let meta_a = meta_a.ok_or_else(|| SyncError::NotFound(a.path().to_path_buf()))?;
    let meta_b = meta_b.ok_or_else(|| SyncError::NotFound(b.path().to_path_buf()))?;
    Ok((meta_a, meta_b))
}

async fn hashes_equal(a: &FileRef, b: &FileRef, algorithm: HashAlgorithm) -> SyncResult<bool> {
    let (hash_a, hash_b) = tokio::try_join!(a.hash(algorithm), b.hash(algorithm))?;
    Ok(hash_a == hash_b)
}

/// 元数据快速路径 + 内容哈希
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataThenHash {
    pub algorithm: HashAlgorithm,
}

#[async_trait]
impl FileEquality for MetadataThenHash {
    async fn equals(&self, a: &FileRef, b: &FileRef) -> SyncResult<bool> {
        let (meta_a, meta_b) = stat_both(a, b).await?;

        if meta_a.size != meta_b.size {
            debug!(
                "文件大小不同: {:?} (a={}, b={})",
                a.path(),
                meta_a.size,
                meta_b.size
            );
            return Ok(false);
        }

        if meta_a.modified != meta_b.modified {
            debug!("文件时间不同: {:?}", a.path());
            return Ok(false);
        }

        hashes_equal(a, b, self.algorithm).await
    }
}

/// 纯内容比较，忽略修改时间
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHash {
    pub algorithm: HashAlgorithm,
}

#[async_trait]
impl FileEquality for ContentHash {
    async fn equals(&self, a: &FileRef, b: &FileRef) -> SyncResult<bool> {
        let (meta_a, meta_b) = stat_both(a, b).await?;

        // 大小不同时内容一定不同
        if meta_a.size != meta_b.size {
            return Ok(false);
        }

        hashes_equal(a, b, self.algorithm).await
    }
}

/// 相等性策略选择（用于配置）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqualityKind {
    #[default]
    Fingerprint,
    Content,
}

impl EqualityKind {
    pub fn strategy(self, algorithm: HashAlgorithm) -> Arc<dyn FileEquality> {
        match self {
            EqualityKind::Fingerprint => Arc::new(MetadataThenHash { algorithm }),
            EqualityKind::Content => Arc::new(ContentHash { algorithm }),
        }
    }
}

impl FromStr for EqualityKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fingerprint" => Ok(EqualityKind::Fingerprint),
            "content" => Ok(EqualityKind::Content),
            other => Err(SyncError::Unsupported(format!("相等性策略 {}", other))),
        }
    }
}

/// 单个文件的指纹
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    file: FileRef,
    algorithm: HashAlgorithm,
}

impl FileFingerprint {
    pub fn new(file: FileRef) -> Self {
        Self::with_algorithm(file, HashAlgorithm::default())
    }

    pub fn with_algorithm(file: FileRef, algorithm: HashAlgorithm) -> Self {
        Self { file, algorithm }
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    /// 与另一个指纹比较，失败以值的形式返回
    pub async fn equals(&self, other: &FileFingerprint) -> SyncResult<bool> {
        MetadataThenHash {
            algorithm: self.algorithm,
        }
        .equals(&self.file, &other.file)
        .await
    }
}
