use crate::core::diff::{DiffItem, DiffSide, TreeDiff};
use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 每个批次内的最大并发操作数
    pub max_concurrent_ops: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_ops: 8,
        }
    }
}

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Deleting,
    Copying,
    Completed,
}

impl SyncPhase {
    fn as_str(self) -> &'static str {
        match self {
            SyncPhase::Deleting => "delete",
            SyncPhase::Copying => "copy",
            SyncPhase::Completed => "completed",
        }
    }
}

/// 进度更新，在每个批次开始和结束时发送
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// 同步报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// 毫秒时间戳
    pub start_time: i64,
    pub end_time: i64,
    pub files_deleted: u32,
    pub files_copied: u32,
    pub files_unchanged: u32,
    pub bytes_copied: u64,
}

/// 单个操作的结果
#[derive(Debug, Clone, Copy)]
enum OpResult {
    Deleted(bool),
    Copied(u64),
    Unchanged,
}

/// 同步引擎
///
/// 整树同步分两个批次：先删除 Y 独有的文件，全部完成后再复制/比较其余文件。
/// 批次内的操作作用于不同路径，互不依赖，并发数受信号量限制。
pub struct SyncEngine {
    config: SyncConfig,
    cancelled: Arc<AtomicBool>,
    progress_tx: Option<mpsc::Sender<SyncProgress>>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress_tx: None,
        }
    }

    /// 设置进度通道
    pub fn with_progress(mut self, tx: mpsc::Sender<SyncProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// 取消同步：已开始的批次会执行完，之后的批次不再开始
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 取消标志，可交给其他任务
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 把 Y 同步成 X 的样子
    pub async fn sync_x_to_y(&self, diff: &TreeDiff) -> SyncResult<SyncReport> {
        let start_time = chrono::Utc::now().timestamp_millis();

        info!(
            "开始同步: {:?} -> {:?} ({} 个差异项)",
            diff.x_root().path(),
            diff.y_root().path(),
            diff.len()
        );

        let (y_only, rest): (Vec<DiffItem>, Vec<DiffItem>) = diff
            .items()
            .iter()
            .cloned()
            .partition(|item| !item.x().is_extant());

        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // 第一阶段：删除 Y 独有的文件
        let deletes = y_only.into_iter().map(|item| async move {
            let deleted = item.y().file().delete().await?;
            Ok::<_, SyncError>(OpResult::Deleted(deleted))
        });
        let delete_results = self.run_batch(SyncPhase::Deleting, deletes).await?;

        if self.is_cancelled() {
            info!("同步已取消，跳过复制阶段");
            return Err(SyncError::Cancelled);
        }

        // 第二阶段：复制缺失或不同的文件
        let copies = rest.into_iter().map(Self::copy_if_changed);
        let copy_results = self.run_batch(SyncPhase::Copying, copies).await?;

        let mut report = SyncReport {
            start_time,
            ..Default::default()
        };
        for result in delete_results.into_iter().chain(copy_results) {
            match result {
                OpResult::Deleted(true) => report.files_deleted += 1,
                OpResult::Deleted(false) => {}
                OpResult::Copied(bytes) => {
                    report.files_copied += 1;
                    report.bytes_copied += bytes;
                }
                OpResult::Unchanged => report.files_unchanged += 1,
            }
        }
        report.end_time = chrono::Utc::now().timestamp_millis();

        self.send_progress(SyncProgress {
            phase: SyncPhase::Completed,
            total: diff.len(),
            completed: diff.len(),
            failed: 0,
        })
        .await;

        info!(
            "同步完成: 复制 {}, 删除 {}, 未变化 {}",
            report.files_copied, report.files_deleted, report.files_unchanged
        );

        Ok(report)
    }

    /// 把 X 同步成 Y 的样子，通过交换两侧复用 `sync_x_to_y`
    pub async fn sync_y_to_x(&self, diff: &TreeDiff) -> SyncResult<SyncReport> {
        self.sync_x_to_y(&diff.flip()).await
    }

    /// Y 不存在则复制；Y 存在时比较，不同或比较失败则复制
    async fn copy_if_changed(item: DiffItem) -> SyncResult<OpResult> {
        let x = item.x().file();
        let y = item.y().file();

        match item.y() {
            DiffSide::Nonextant { .. } => {}
            DiffSide::Extant { .. } => match item.sides_equal().await {
                Ok(true) => {
                    debug!("文件相同，跳过: {}", item.path());
                    return Ok(OpResult::Unchanged);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("比较失败，直接复制 {}: {}", item.path(), e);
                }
            },
        }

        let bytes = x.copy_to(y).await?;
        Ok(OpResult::Copied(bytes))
    }

    /// 并发执行一个批次，等待全部完成
    ///
    /// 批次内任何操作失败都不会中断其他操作；批次结束后若有失败，返回
    /// `SyncError::Batch`，调用方不再开始后续批次。
    async fn run_batch<I, F>(&self, phase: SyncPhase, ops: I) -> SyncResult<Vec<OpResult>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = SyncResult<OpResult>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_ops.max(1)));
        let mut handles = Vec::new();

        for op in ops {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| SyncError::Cancelled)?;

            handles.push(tokio::spawn(async move {
                let result = op.await;
                drop(permit);
                result
            }));
        }

        let total = handles.len();
        debug!("{} 阶段: {} 个操作", phase.as_str(), total);
        self.send_progress(SyncProgress {
            phase,
            total,
            completed: 0,
            failed: 0,
        })
        .await;

        // 等待所有任务完成
        let mut results = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    warn!("{} 操作失败: {}", phase.as_str(), e);
                    errors.push(e);
                }
                Err(e) => {
                    warn!("任务失败: {}", e);
                    errors.push(SyncError::Task(e));
                }
            }
        }

        self.send_progress(SyncProgress {
            phase,
            total,
            completed: results.len(),
            failed: errors.len(),
        })
        .await;

        let failed = errors.len();
        match errors.into_iter().next() {
            Some(first) => Err(SyncError::Batch {
                phase: phase.as_str(),
                failed,
                first: Box::new(first),
            }),
            None => Ok(results),
        }
    }

    /// 发送进度更新
    async fn send_progress(&self, progress: SyncProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(progress).await;
        }
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}
