//! 本地文件与目录引用
//!
//! 同步引擎只通过这里的接口访问文件系统：存在性检查、元数据、内容哈希、
//! 复制、删除和递归列举。

pub mod dir;
pub mod file;
pub mod hash;

pub use dir::{DirContents, DirRef};
pub use file::{FileMeta, FileRef};
pub use hash::{hash_bytes, hash_file, HashAlgorithm};
