use crate::core::diff::DiffItem;
use crate::core::path::RelativePath;
use crate::core::policy::ActionKind;
use crate::error::{SyncError, SyncResult};
use tracing::debug;

/// 可执行的动作，绑定到具体的一对文件
#[derive(Debug, Clone)]
pub struct Action {
    kind: ActionKind,
    item: DiffItem,
}

/// 动作执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    pub path: RelativePath,
    /// 复制的字节数
    pub bytes: u64,
    /// 是否实际修改了文件系统
    pub changed: bool,
}

impl Action {
    pub fn new(kind: ActionKind, item: DiffItem) -> Self {
        Self { kind, item }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn item(&self) -> &DiffItem {
        &self.item
    }

    /// 执行动作
    ///
    /// 前置条件在执行时重新检查：差异计算之后文件可能已经变化。
    pub async fn execute(&self) -> SyncResult<ActionOutcome> {
        let x = self.item.x().file();
        let y = self.item.y().file();

        debug!("执行 {}: {}", self.kind, self.item.path());

        let (bytes, changed) = match self.kind {
            ActionKind::CopyToY => {
                let bytes = x.copy_to(y).await?;
                (bytes, true)
            }
            ActionKind::CopyToX => {
                let bytes = y.copy_to(x).await?;
                (bytes, true)
            }
            ActionKind::DeleteX => (0, x.delete().await?),
            ActionKind::DeleteY => (0, y.delete().await?),
            ActionKind::DeleteBoth => {
                let (x_exists, y_exists) = tokio::join!(x.exists(), y.exists());
                if !x_exists {
                    return Err(SyncError::NotFound(x.path().to_path_buf()));
                }
                if !y_exists {
                    return Err(SyncError::NotFound(y.path().to_path_buf()));
                }
                tokio::try_join!(x.delete(), y.delete())?;
                (0, true)
            }
            ActionKind::Skip => (0, false),
        };

        Ok(ActionOutcome {
            kind: self.kind,
            path: self.item.path().clone(),
            bytes,
            changed,
        })
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub copy_to_y_count: usize,
    pub copy_to_x_count: usize,
    pub delete_count: usize,
    pub skip_count: usize,
}

impl ActionSummary {
    pub fn from_actions(actions: &[Action]) -> Self {
        let mut summary = Self::default();

        for action in actions {
            match action.kind() {
                ActionKind::CopyToY => summary.copy_to_y_count += 1,
                ActionKind::CopyToX => summary.copy_to_x_count += 1,
                ActionKind::DeleteX | ActionKind::DeleteY => summary.delete_count += 1,
                ActionKind::DeleteBoth => summary.delete_count += 2,
                ActionKind::Skip => summary.skip_count += 1,
            }
        }

        summary
    }

    pub fn total_files(&self) -> usize {
        self.copy_to_y_count + self.copy_to_x_count + self.delete_count + self.skip_count
    }
}
