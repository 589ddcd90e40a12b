//! 日志模块 - 提供文件日志和大小管理功能

use crate::config::{data_dir, read_section, write_section};
use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "treesync.log";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否写入日志文件
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB）
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 从配置文件加载日志配置
    pub fn load(config_dir: &Path) -> Self {
        read_section(config_dir, "log").unwrap_or_default()
    }

    /// 保存日志配置
    pub fn save(&self, config_dir: &Path) -> SyncResult<()> {
        write_section(config_dir, "log", self)
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

type SharedWriter = Arc<Mutex<Option<BufWriter<File>>>>;

fn lock(writer: &SharedWriter) -> MutexGuard<'_, Option<BufWriter<File>>> {
    writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 带大小限制的日志写入器，超过上限时把当前文件改名为 `.old`
#[derive(Clone)]
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    writer: SharedWriter,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join(LOG_FILE);
        let max_size = u64::from(max_size_mb.max(1)) * 1024 * 1024;
        let writer = Self::open_file(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if Self::over_limit(file_path, max_size) {
            Self::rotate_log(file_path)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(BufWriter::new(file))
    }

    fn over_limit(file_path: &Path, max_size: u64) -> bool {
        fs::metadata(file_path)
            .map(|m| m.len() > max_size)
            .unwrap_or(false)
    }

    /// 轮转日志文件
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");

        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }

        fs::rename(file_path, &backup_path)
    }

    /// 检查并轮转
    fn check_and_rotate(&self) -> io::Result<()> {
        if !Self::over_limit(&self.file_path, self.max_size) {
            return Ok(());
        }

        let mut guard = lock(&self.writer);
        if let Some(mut w) = guard.take() {
            let _ = w.flush();
        }
        Self::rotate_log(&self.file_path)?;
        *guard = Some(Self::open_file(&self.file_path, self.max_size)?);
        Ok(())
    }
}

/// 单次写入使用的句柄
pub struct LogWriter {
    inner: SizeRotatingWriter,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = {
            let mut guard = lock(&self.inner.writer);
            let writer = guard
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "日志写入器不可用"))?;
            let n = writer.write(buf)?;
            writer.flush()?;
            n
        };

        let _ = self.inner.check_and_rotate();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.inner.writer).as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.clone(),
        }
    }
}

/// 日志文件所在目录，跟随配置目录中的 `data_path`
pub fn log_dir(config_dir: &Path) -> PathBuf {
    data_dir(config_dir)
}

/// 初始化日志系统
///
/// 日志配置从 `config_dir` 读取，日志文件写入 [`log_dir`]。`verbose` 为
/// true 时输出 debug 级别。文件日志创建失败时只输出到控制台。
pub fn init_logging(config_dir: &Path, verbose: bool) {
    let config = LogConfig::load(config_dir);
    let log_dir = log_dir(config_dir);

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let file_layer = if config.enabled {
        SizeRotatingWriter::new(&log_dir, config.max_size_mb)
            .ok()
            .map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
            })
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn level_parsing_defaults_to_info() {
        let mut config = LogConfig::default();
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
        config.level = "DEBUG".to_string();
        assert_eq!(config.tracing_level(), tracing::Level::DEBUG);
        config.level = "verbose".to_string();
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn config_round_trips_through_file() {
        let tmp = TempDir::new().unwrap();
        let config = LogConfig {
            enabled: false,
            max_size_mb: 1,
            level: "warn".to_string(),
        };
        config.save(tmp.path()).unwrap();
        assert_eq!(LogConfig::load(tmp.path()), config);
    }

    #[test]
    fn log_dir_uses_data_path_of_given_config() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("logs");
        fs::create_dir_all(&data).unwrap();

        assert_eq!(log_dir(tmp.path()), tmp.path());
        write_section(tmp.path(), "data_path", &data.to_string_lossy()).unwrap();
        assert_eq!(log_dir(tmp.path()), data);
    }

    #[test]
    fn writer_appends_to_log_file() {
        let tmp = TempDir::new().unwrap();
        let writer = SizeRotatingWriter::new(tmp.path(), 1).unwrap();

        let mut handle = writer.make_writer();
        handle.write_all(b"first line\n").unwrap();
        handle.write_all(b"second line\n").unwrap();

        let content = fs::read_to_string(writer.file_path()).unwrap();
        assert_eq!(content, "first line\nsecond line\n");
    }

    #[test]
    fn oversized_log_is_rotated_on_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOG_FILE);
        fs::write(&path, vec![b'x'; 1024 * 1024 + 1]).unwrap();

        let writer = SizeRotatingWriter::new(tmp.path(), 1).unwrap();

        assert!(path.with_extension("log.old").exists());
        assert_eq!(fs::metadata(writer.file_path()).unwrap().len(), 0);
    }
}
