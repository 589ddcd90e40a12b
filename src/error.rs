//! 错误类型
//!
//! 库内所有可失败操作都返回 [`SyncResult<T>`]。

use std::path::PathBuf;

/// 同步引擎统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 比较或执行动作时，期望存在的文件不存在
    #[error("文件不存在: {0}")]
    NotFound(PathBuf),

    /// 非法输入（空相对路径、两侧都不存在的差异项等）
    #[error("非法输入: {0}")]
    InvalidInput(String),

    /// 带路径上下文的 IO 错误
    #[error("IO 错误 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 无法识别的动作类型
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 配置解析失败
    #[error("配置错误: {0}")]
    Config(String),

    /// 同步在批次之间被取消
    #[error("操作已取消")]
    Cancelled,

    /// 某个批次中有操作失败，后续批次未执行
    #[error("{phase} 阶段有 {failed} 个操作失败: {first}")]
    Batch {
        phase: &'static str,
        failed: usize,
        first: Box<SyncError>,
    },

    /// 后台任务异常退出
    #[error("任务失败: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    /// 将 io::Error 包装为带路径的错误，NotFound 单独映射
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SyncError::NotFound(path)
        } else {
            SyncError::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
