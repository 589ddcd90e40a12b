//! 差异键：相对路径
//!
//! 比较严格区分大小写。大小写不敏感的文件系统上，仅大小写不同的两个路径
//! 会分别作为 X 独有和 Y 独有出现，这里不做折叠。
//!
//! 路径按组件保存为 `OsString`，非 UTF-8 文件名同样可以作为键。只有
//! Windows 上 `\` 才是分隔符，其他平台上它是文件名的一部分。

use crate::error::{SyncError, SyncResult};
use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// 相对于某个根目录的文件路径
///
/// 排序按 `/` 连接后的字节序，与字符串字典序一致。
#[derive(Debug, Clone)]
pub struct RelativePath {
    parts: Vec<OsString>,
    /// `/` 连接的显示形式，非 UTF-8 部分有损替换
    display: String,
}

fn is_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

impl RelativePath {
    fn from_parts(parts: Vec<OsString>, original: &dyn fmt::Debug) -> SyncResult<Self> {
        if parts.is_empty() {
            return Err(SyncError::InvalidInput(format!("相对路径为空: {:?}", original)));
        }

        let display = parts
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self { parts, display })
    }

    /// 从字符串构造，`/` 分隔（Windows 上 `\` 也是分隔符）
    pub fn new(path: &str) -> SyncResult<Self> {
        let mut parts = Vec::new();
        for part in path.split(is_separator) {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(SyncError::InvalidInput(format!(
                        "相对路径不能包含 '..': {}",
                        path
                    )))
                }
                p => parts.push(OsString::from(p)),
            }
        }

        Self::from_parts(parts, &path)
    }

    /// 计算 `path` 相对 `root` 的路径
    pub fn from_paths(root: &Path, path: &Path) -> SyncResult<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            SyncError::InvalidInput(format!("{:?} 不在 {:?} 之下", path, root))
        })?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_os_string()),
                Component::CurDir => continue,
                _ => {
                    return Err(SyncError::InvalidInput(format!(
                        "无法表示的相对路径: {:?}",
                        relative
                    )))
                }
            }
        }

        Self::from_parts(parts, &relative)
    }

    /// 显示形式；非 UTF-8 文件名会被有损替换，不能用作键
    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn components(&self) -> impl Iterator<Item = &OsStr> {
        self.parts.iter().map(OsString::as_os_str)
    }

    /// 拼接到某个根目录下
    pub fn join_onto(&self, root: &Path) -> PathBuf {
        self.parts.iter().fold(root.to_path_buf(), |acc, part| acc.join(part))
    }

    fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.parts.iter().enumerate().flat_map(|(i, part)| {
            let sep: &[u8] = if i == 0 { b"" } else { b"/" };
            sep.iter().chain(part.as_encoded_bytes()).copied()
        })
    }
}

impl PartialEq for RelativePath {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for RelativePath {}

impl Hash for RelativePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl PartialOrd for RelativePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelativePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(other.bytes())
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
