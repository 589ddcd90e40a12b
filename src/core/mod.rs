pub mod action;
pub mod diff;
pub mod engine;
pub mod fingerprint;
pub mod path;
pub mod policy;
pub mod scanner;

pub use action::{Action, ActionOutcome, ActionSummary};
pub use diff::{diff_files, diff_files_with, DiffItem, DiffOptions, DiffSide, TreeDiff};
pub use engine::{SyncConfig, SyncEngine, SyncPhase, SyncProgress, SyncReport};
pub use fingerprint::{ContentHash, EqualityKind, FileEquality, FileFingerprint, MetadataThenHash};
pub use path::RelativePath;
pub use policy::{action_kinds, ActionKind, DiffState, SyncPriority};
pub use scanner::{FileScanner, ScanConfig};
