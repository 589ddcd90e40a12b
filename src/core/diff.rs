//! 目录树差异
//!
//! [`TreeDiff::create`] 递归列出两棵树，按相对路径合并成 [`DiffItem`] 列表。
//! 只有文件会成为差异项，子目录本身不参与比较。

use crate::core::action::Action;
use crate::core::engine::{SyncEngine, SyncReport};
use crate::core::fingerprint::{EqualityKind, FileEquality, FileFingerprint};
use crate::core::path::RelativePath;
use crate::core::policy::{action_kinds, DiffState, SyncPriority};
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::error::{SyncError, SyncResult};
use crate::storage::{DirRef, FileRef, HashAlgorithm};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 差异项的一侧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSide {
    /// 文件存在
    Extant {
        root: DirRef,
        file: FileRef,
        fingerprint: FileFingerprint,
    },
    /// 文件不存在，`would_be` 是它在这一侧应有的位置
    Nonextant { root: DirRef, would_be: FileRef },
}

impl DiffSide {
    pub fn extant(root: DirRef, file: FileRef, algorithm: HashAlgorithm) -> Self {
        let fingerprint = FileFingerprint::with_algorithm(file.clone(), algorithm);
        DiffSide::Extant {
            root,
            file,
            fingerprint,
        }
    }

    pub fn nonextant(root: DirRef, relative: &RelativePath) -> Self {
        let would_be = FileRef::new(relative.join_onto(root.path()));
        DiffSide::Nonextant { root, would_be }
    }

    pub fn root(&self) -> &DirRef {
        match self {
            DiffSide::Extant { root, .. } | DiffSide::Nonextant { root, .. } => root,
        }
    }

    /// 这一侧的文件路径（不存在时为应有的路径）
    pub fn file(&self) -> &FileRef {
        match self {
            DiffSide::Extant { file, .. } => file,
            DiffSide::Nonextant { would_be, .. } => would_be,
        }
    }

    pub fn fingerprint(&self) -> Option<&FileFingerprint> {
        match self {
            DiffSide::Extant { fingerprint, .. } => Some(fingerprint),
            DiffSide::Nonextant { .. } => None,
        }
    }

    pub fn is_extant(&self) -> bool {
        matches!(self, DiffSide::Extant { .. })
    }
}

/// 单个相对路径上的一对文件
#[derive(Debug, Clone)]
pub struct DiffItem {
    path: RelativePath,
    x: DiffSide,
    y: DiffSide,
    equality: Arc<dyn FileEquality>,
}

impl DiffItem {
    /// 两侧都不存在的差异项没有意义，返回 InvalidInput
    pub fn new(
        path: RelativePath,
        x: DiffSide,
        y: DiffSide,
        equality: Arc<dyn FileEquality>,
    ) -> SyncResult<Self> {
        if !x.is_extant() && !y.is_extant() {
            return Err(SyncError::InvalidInput(format!(
                "差异项两侧都不存在: {}",
                path
            )));
        }

        Ok(Self {
            path,
            x,
            y,
            equality,
        })
    }

    pub fn path(&self) -> &RelativePath {
        &self.path
    }

    pub fn x(&self) -> &DiffSide {
        &self.x
    }

    pub fn y(&self) -> &DiffSide {
        &self.y
    }

    pub fn equality(&self) -> &Arc<dyn FileEquality> {
        &self.equality
    }

    pub fn is_x_only(&self) -> bool {
        self.x.is_extant() && !self.y.is_extant()
    }

    pub fn is_y_only(&self) -> bool {
        !self.x.is_extant() && self.y.is_extant()
    }

    pub fn is_both(&self) -> bool {
        self.x.is_extant() && self.y.is_extant()
    }

    /// 交换两侧
    pub fn flip(&self) -> Self {
        Self {
            path: self.path.clone(),
            x: self.y.clone(),
            y: self.x.clone(),
            equality: self.equality.clone(),
        }
    }

    /// 两侧都存在时，按相等性策略比较当前磁盘上的文件
    pub async fn sides_equal(&self) -> SyncResult<bool> {
        self.equality.equals(self.x.file(), self.y.file()).await
    }

    /// 计算状态；两侧都存在时会重新比较磁盘上的文件
    pub async fn state(&self) -> SyncResult<DiffState> {
        match (&self.x, &self.y) {
            (DiffSide::Extant { .. }, DiffSide::Nonextant { .. }) => Ok(DiffState::XOnly),
            (DiffSide::Nonextant { .. }, DiffSide::Extant { .. }) => Ok(DiffState::YOnly),
            (DiffSide::Extant { .. }, DiffSide::Extant { .. }) => {
                if self.sides_equal().await? {
                    Ok(DiffState::BothEqual)
                } else {
                    Ok(DiffState::BothDifferent)
                }
            }
            (DiffSide::Nonextant { .. }, DiffSide::Nonextant { .. }) => Err(
                SyncError::InvalidInput(format!("差异项两侧都不存在: {}", self.path)),
            ),
        }
    }

    /// 按优先级给出候选动作，第一个是推荐动作
    pub async fn actions(&self, priority: SyncPriority) -> SyncResult<Vec<Action>> {
        let state = self.state().await?;
        Ok(action_kinds(state, priority)
            .iter()
            .map(|kind| Action::new(*kind, self.clone()))
            .collect())
    }
}

impl PartialEq for DiffItem {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.x == other.x && self.y == other.y
    }
}

/// 构建差异时的选项
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub equality: EqualityKind,
    pub algorithm: HashAlgorithm,
    pub scan: ScanConfig,
    /// 比较文件时的最大并发数
    pub max_concurrent: usize,
    /// 扫描时检查的取消标志，通常来自 [`SyncEngine::cancel_flag`]
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            equality: EqualityKind::default(),
            algorithm: HashAlgorithm::default(),
            scan: ScanConfig::default(),
            max_concurrent: 8,
            cancel: None,
        }
    }
}

/// 两棵目录树的差异，构建后不再修改
#[derive(Debug, Clone)]
pub struct TreeDiff {
    x_root: DirRef,
    y_root: DirRef,
    items: Vec<DiffItem>,
}

impl TreeDiff {
    pub async fn create(x_root: &DirRef, y_root: &DirRef) -> SyncResult<Self> {
        Self::create_with(x_root, y_root, &DiffOptions::default()).await
    }

    /// 扫描两棵树并按相对路径合并
    ///
    /// 不存在的根目录视为空树。输出顺序：先是 X 侧的路径（有序），然后是
    /// 只在 Y 侧出现的路径（有序）。
    pub async fn create_with(
        x_root: &DirRef,
        y_root: &DirRef,
        options: &DiffOptions,
    ) -> SyncResult<Self> {
        info!("开始比较: {:?} <-> {:?}", x_root.path(), y_root.path());

        let mut scanner = FileScanner::with_config(options.max_concurrent, options.scan.clone())?;
        if let Some(flag) = &options.cancel {
            scanner = scanner.with_cancel(flag.clone());
        }
        let (x_tree, mut y_tree) = tokio::try_join!(scanner.scan(x_root), scanner.scan(y_root))?;
        let equality = options.equality.strategy(options.algorithm);

        let mut items = Vec::with_capacity(x_tree.len() + y_tree.len());
        for (relative, x_file) in x_tree {
            let x = DiffSide::extant(x_root.clone(), x_file, options.algorithm);
            let y = match y_tree.remove(&relative) {
                Some(y_file) => DiffSide::extant(y_root.clone(), y_file, options.algorithm),
                None => DiffSide::nonextant(y_root.clone(), &relative),
            };
            items.push(DiffItem::new(relative, x, y, equality.clone())?);
        }

        for (relative, y_file) in y_tree {
            let x = DiffSide::nonextant(x_root.clone(), &relative);
            let y = DiffSide::extant(y_root.clone(), y_file, options.algorithm);
            items.push(DiffItem::new(relative, x, y, equality.clone())?);
        }

        debug!("比较完成: {} 个差异项", items.len());

        Ok(Self {
            x_root: x_root.clone(),
            y_root: y_root.clone(),
            items,
        })
    }

    pub fn x_root(&self) -> &DirRef {
        &self.x_root
    }

    pub fn y_root(&self) -> &DirRef {
        &self.y_root
    }

    pub fn items(&self) -> &[DiffItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<DiffItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 交换 X/Y，不访问文件系统
    pub fn flip(&self) -> Self {
        Self {
            x_root: self.y_root.clone(),
            y_root: self.x_root.clone(),
            items: self.items.iter().map(DiffItem::flip).collect(),
        }
    }

    /// 以默认配置把 X 同步到 Y
    pub async fn sync_x_to_y(&self) -> SyncResult<SyncReport> {
        SyncEngine::default().sync_x_to_y(self).await
    }

    /// 以默认配置把 Y 同步到 X
    pub async fn sync_y_to_x(&self) -> SyncResult<SyncReport> {
        SyncEngine::default().sync_y_to_x(self).await
    }

    /// 每个不相同的差异项的推荐动作（不执行）
    pub async fn plan(&self, priority: SyncPriority) -> SyncResult<Vec<Action>> {
        let mut plan = Vec::new();
        for item in &self.items {
            if let Some(first) = item.actions(priority).await?.into_iter().next() {
                plan.push(first);
            }
        }
        Ok(plan)
    }
}

/// 比较两个目录，返回按相对路径排序的差异项
///
/// `include_identical` 为 false 时省略两侧相等的文件。
pub async fn diff_files(
    left: &Path,
    right: &Path,
    include_identical: bool,
) -> SyncResult<Vec<DiffItem>> {
    diff_files_with(left, right, include_identical, &DiffOptions::default()).await
}

pub async fn diff_files_with(
    left: &Path,
    right: &Path,
    include_identical: bool,
    options: &DiffOptions,
) -> SyncResult<Vec<DiffItem>> {
    let diff = TreeDiff::create_with(&DirRef::new(left), &DirRef::new(right), options).await?;

    let kept: Vec<Option<DiffItem>> = stream::iter(diff.into_items())
        .map(|item| async move {
            if include_identical || !item.is_both() {
                return Some(item);
            }
            match item.sides_equal().await {
                Ok(true) => None,
                Ok(false) => Some(item),
                Err(e) => {
                    warn!("比较文件失败，保留差异项 {}: {}", item.path(), e);
                    Some(item)
                }
            }
        })
        .buffered(options.max_concurrent.max(1))
        .collect()
        .await;

    let unique: BTreeMap<RelativePath, DiffItem> = kept
        .into_iter()
        .flatten()
        .map(|item| (item.path().clone(), item))
        .collect();

    Ok(unique.into_values().collect())
}
