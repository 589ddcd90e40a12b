//! 动作策略表
//!
//! (差异状态, 同步优先级) -> 有序动作列表。下标 0 是推荐的默认动作，其余为
//! 可选替代。表是字面量，不要改成推导出来的顺序：两边都不同且为 Preserve 时
//! Skip 排在第三位，和两个有方向的模式不同。

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 同步优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPriority {
    /// 左 -> 右
    PreferX,
    /// 右 -> 左
    PreferY,
    /// 尽量保留两边
    Preserve,
}

impl SyncPriority {
    pub const ALL: [SyncPriority; 3] = [
        SyncPriority::PreferX,
        SyncPriority::PreferY,
        SyncPriority::Preserve,
    ];
}

impl fmt::Display for SyncPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPriority::PreferX => write!(f, "left-to-right"),
            SyncPriority::PreferY => write!(f, "right-to-left"),
            SyncPriority::Preserve => write!(f, "preserve"),
        }
    }
}

impl FromStr for SyncPriority {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prefer-x" | "left-to-right" | "ltr" => Ok(SyncPriority::PreferX),
            "prefer-y" | "right-to-left" | "rtl" => Ok(SyncPriority::PreferY),
            "preserve" => Ok(SyncPriority::Preserve),
            other => Err(SyncError::InvalidInput(format!("未知的同步优先级: {}", other))),
        }
    }
}

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CopyToX,
    CopyToY,
    DeleteX,
    DeleteY,
    DeleteBoth,
    Skip,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::CopyToX => "copy-to-x",
            ActionKind::CopyToY => "copy-to-y",
            ActionKind::DeleteX => "delete-x",
            ActionKind::DeleteY => "delete-y",
            ActionKind::DeleteBoth => "delete-both",
            ActionKind::Skip => "skip",
        }
    }

    /// 交换 X/Y 后对应的动作
    pub fn flipped(self) -> Self {
        match self {
            ActionKind::CopyToX => ActionKind::CopyToY,
            ActionKind::CopyToY => ActionKind::CopyToX,
            ActionKind::DeleteX => ActionKind::DeleteY,
            ActionKind::DeleteY => ActionKind::DeleteX,
            ActionKind::DeleteBoth => ActionKind::DeleteBoth,
            ActionKind::Skip => ActionKind::Skip,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy-to-x" => Ok(ActionKind::CopyToX),
            "copy-to-y" => Ok(ActionKind::CopyToY),
            "delete-x" => Ok(ActionKind::DeleteX),
            "delete-y" => Ok(ActionKind::DeleteY),
            "delete-both" => Ok(ActionKind::DeleteBoth),
            "skip" => Ok(ActionKind::Skip),
            other => Err(SyncError::Unsupported(other.to_string())),
        }
    }
}

/// 差异项的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffState {
    XOnly,
    YOnly,
    BothEqual,
    BothDifferent,
}

impl fmt::Display for DiffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffState::XOnly => write!(f, "x-only"),
            DiffState::YOnly => write!(f, "y-only"),
            DiffState::BothEqual => write!(f, "both-equal"),
            DiffState::BothDifferent => write!(f, "both-different"),
        }
    }
}

use ActionKind::*;

const X_ONLY_PREFER_X: &[ActionKind] = &[CopyToY, Skip, DeleteX];
const X_ONLY_PREFER_Y: &[ActionKind] = &[DeleteX, Skip, CopyToY];
const X_ONLY_PRESERVE: &[ActionKind] = &[CopyToY, Skip, DeleteX];

const Y_ONLY_PREFER_X: &[ActionKind] = &[DeleteY, Skip, CopyToX];
const Y_ONLY_PREFER_Y: &[ActionKind] = &[CopyToX, Skip, DeleteY];
const Y_ONLY_PRESERVE: &[ActionKind] = &[CopyToX, Skip, DeleteY];

const DIFFERENT_PREFER_X: &[ActionKind] = &[CopyToY, Skip, CopyToX, DeleteBoth];
const DIFFERENT_PREFER_Y: &[ActionKind] = &[CopyToX, Skip, CopyToY, DeleteBoth];
const DIFFERENT_PRESERVE: &[ActionKind] = &[CopyToY, CopyToX, Skip, DeleteBoth];

/// 查表获取候选动作
pub fn action_kinds(state: DiffState, priority: SyncPriority) -> &'static [ActionKind] {
    match (state, priority) {
        (DiffState::XOnly, SyncPriority::PreferX) => X_ONLY_PREFER_X,
        (DiffState::XOnly, SyncPriority::PreferY) => X_ONLY_PREFER_Y,
        (DiffState::XOnly, SyncPriority::Preserve) => X_ONLY_PRESERVE,
        (DiffState::YOnly, SyncPriority::PreferX) => Y_ONLY_PREFER_X,
        (DiffState::YOnly, SyncPriority::PreferY) => Y_ONLY_PREFER_Y,
        (DiffState::YOnly, SyncPriority::Preserve) => Y_ONLY_PRESERVE,
        (DiffState::BothEqual, _) => &[],
        (DiffState::BothDifferent, SyncPriority::PreferX) => DIFFERENT_PREFER_X,
        (DiffState::BothDifferent, SyncPriority::PreferY) => DIFFERENT_PREFER_Y,
        (DiffState::BothDifferent, SyncPriority::Preserve) => DIFFERENT_PRESERVE,
    }
}
