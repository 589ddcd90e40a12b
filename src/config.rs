//! 应用配置模块
//!
//! 所有配置保存在 `<config_dir>/config.json` 中，按模块分节（`sync`、`log`）。

use crate::core::diff::DiffOptions;
use crate::core::engine::SyncConfig;
use crate::core::fingerprint::EqualityKind;
use crate::core::scanner::ScanConfig;
use crate::error::{SyncError, SyncResult};
use crate::storage::HashAlgorithm;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const APP_DIR: &str = "treesync";

/// 平台默认的配置目录
pub fn config_dir() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
    } else {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    };

    base.map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
}

/// 数据目录：默认与配置目录相同，可通过 `data_path` 指向其他已存在的目录
pub fn data_dir(config_dir: &Path) -> PathBuf {
    read_section::<String>(config_dir, "data_path")
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .inspect(|p| tracing::debug!("使用自定义数据路径: {:?}", p))
        .unwrap_or_else(|| config_dir.to_path_buf())
}

/// 读取配置文件中的某一节，文件不存在或解析失败时返回 None
pub fn read_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Option<T> {
    let content = fs::read_to_string(config_dir.join(CONFIG_FILE)).ok()?;
    let config: serde_json::Value = serde_json::from_str(&content).ok()?;
    serde_json::from_value(config.get(key)?.clone()).ok()
}

/// 写入配置文件中的某一节，保留其他节
pub fn write_section<T: Serialize>(config_dir: &Path, key: &str, value: &T) -> SyncResult<()> {
    fs::create_dir_all(config_dir).map_err(|e| SyncError::io(config_dir, e))?;
    let config_file = config_dir.join(CONFIG_FILE);

    // 读取现有配置
    let mut config: serde_json::Value = match fs::read_to_string(&config_file) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({})),
        Err(_) => serde_json::json!({}),
    };
    if !config.is_object() {
        config = serde_json::json!({});
    }

    config[key] = serde_json::to_value(value).map_err(|e| SyncError::Config(e.to_string()))?;

    let content =
        serde_json::to_string_pretty(&config).map_err(|e| SyncError::Config(e.to_string()))?;
    fs::write(&config_file, content).map_err(|e| SyncError::io(&config_file, e))
}

/// 同步引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// 每批次最大并发操作数
    #[serde(default = "default_max_concurrent_ops")]
    pub max_concurrent_ops: usize,
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// 文件相等性策略
    #[serde(default)]
    pub equality: EqualityKind,
    #[serde(flatten)]
    pub scan: ScanConfig,
}

fn default_max_concurrent_ops() -> usize {
    8
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_ops: default_max_concurrent_ops(),
            hash_algorithm: HashAlgorithm::default(),
            equality: EqualityKind::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl EngineSettings {
    /// 从配置文件加载，缺失或损坏时使用默认值
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "sync").unwrap_or_default()
    }

    pub fn save(&self, config_dir: &Path) -> SyncResult<()> {
        write_section(config_dir, "sync", self)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            equality: self.equality,
            algorithm: self.hash_algorithm,
            scan: self.scan.clone(),
            max_concurrent: self.max_concurrent_ops.max(1),
            cancel: None,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            max_concurrent_ops: self.max_concurrent_ops.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(EngineSettings::load(tmp.path()), EngineSettings::default());
    }

    #[test]
    fn partial_section_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"{"sync": {"hashAlgorithm": "blake3", "excludePatterns": ["*.tmp"]}}"#,
        )
        .unwrap();

        let settings = EngineSettings::load(tmp.path());
        assert_eq!(settings.hash_algorithm, HashAlgorithm::Blake3);
        assert_eq!(settings.max_concurrent_ops, 8);
        assert_eq!(settings.equality, EqualityKind::Fingerprint);
        assert_eq!(settings.scan.exclude_patterns, vec!["*.tmp".to_string()]);
    }

    #[test]
    fn save_keeps_other_sections() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), r#"{"log": {"level": "debug"}}"#).unwrap();

        let settings = EngineSettings {
            max_concurrent_ops: 2,
            equality: EqualityKind::Content,
            ..Default::default()
        };
        settings.save(tmp.path()).unwrap();

        assert_eq!(EngineSettings::load(tmp.path()), settings);
        let level: Option<serde_json::Value> = read_section(tmp.path(), "log");
        assert_eq!(level.unwrap()["level"], "debug");
    }

    #[test]
    fn data_dir_follows_the_given_config_dir() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("config");
        let data = tmp.path().join("data");
        fs::create_dir_all(&data).unwrap();

        assert_eq!(data_dir(&config), config);

        write_section(&config, "data_path", &data.to_string_lossy()).unwrap();
        assert_eq!(data_dir(&config), data);

        // 指向不存在的目录时回退
        write_section(&config, "data_path", &"/definitely/not/here").unwrap();
        assert_eq!(data_dir(&config), config);
    }

    #[test]
    fn settings_convert_to_engine_options() {
        let settings = EngineSettings {
            max_concurrent_ops: 0,
            ..Default::default()
        };
        assert_eq!(settings.sync_config().max_concurrent_ops, 1);
        assert_eq!(settings.diff_options().max_concurrent, 1);
    }
}
