//! 目录树比较与同步
//!
//! 扫描两棵目录树，按相对路径配对文件，根据同步优先级给出每一对文件的
//! 候选动作，并能把一侧整体同步到另一侧。

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use crate::core::{
    diff_files, diff_files_with, Action, ActionKind, ActionSummary, DiffItem, DiffOptions,
    DiffSide, DiffState, EqualityKind, FileEquality, FileFingerprint, RelativePath, SyncConfig,
    SyncEngine, SyncPriority, SyncReport, TreeDiff,
};
pub use config::EngineSettings;
pub use error::{SyncError, SyncResult};
pub use storage::{DirRef, FileRef, HashAlgorithm};
