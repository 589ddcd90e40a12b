use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use treesync_lib::config::config_dir;
use treesync_lib::core::SyncProgress;
use treesync_lib::logging::init_logging;
use treesync_lib::{
    diff_files_with, DiffOptions, DirRef, EngineSettings, SyncEngine, SyncPriority, TreeDiff,
};

/// 目录树比较与同步工具
#[derive(Parser)]
#[command(name = "treesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,

    /// 配置目录（默认使用平台配置目录）
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 比较两个目录，列出差异项及推荐动作
    Diff {
        left: PathBuf,
        right: PathBuf,

        /// 同步优先级: left-to-right, right-to-left, preserve
        #[arg(short, long, default_value = "left-to-right")]
        priority: SyncPriority,

        /// 同时列出两侧相同的文件
        #[arg(long)]
        include_identical: bool,
    },

    /// 把一个目录整体同步到另一个目录
    Sync {
        left: PathBuf,
        right: PathBuf,

        /// 从右向左同步
        #[arg(short, long)]
        reverse: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.unwrap_or_else(config_dir);
    init_logging(&config_dir, cli.verbose);
    let settings = EngineSettings::load(&config_dir);

    match cli.command {
        Commands::Diff {
            left,
            right,
            priority,
            include_identical,
        } => {
            let items = diff_files_with(&left, &right, include_identical, &settings.diff_options())
                .await
                .context("比较目录失败")?;

            for item in &items {
                let state = item.state().await?;
                let recommended = item
                    .actions(priority)
                    .await?
                    .first()
                    .map(|a| a.kind().as_str())
                    .unwrap_or("-");
                println!("{:<16} {:<12} {}", format!("{:?}", state), recommended, item.path());
            }
            println!("共 {} 个差异项", items.len());
        }

        Commands::Sync {
            left,
            right,
            reverse,
        } => {
            let (tx, mut rx) = mpsc::channel::<SyncProgress>(32);
            let engine = SyncEngine::with_config(settings.sync_config()).with_progress(tx);

            let cancel = engine.cancel_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("收到中断信号，当前阶段完成后停止");
                    cancel.store(true, Ordering::SeqCst);
                }
            });

            let options = DiffOptions {
                cancel: Some(engine.cancel_flag()),
                ..settings.diff_options()
            };
            let diff = TreeDiff::create_with(&DirRef::new(&left), &DirRef::new(&right), &options)
                .await
                .context("比较目录失败")?;

            let progress = tokio::spawn(async move {
                while let Some(p) = rx.recv().await {
                    tracing::info!(
                        "{:?}: {}/{} 完成，{} 失败",
                        p.phase,
                        p.completed,
                        p.total,
                        p.failed
                    );
                }
            });

            let result = if reverse {
                engine.sync_y_to_x(&diff).await
            } else {
                engine.sync_x_to_y(&diff).await
            };
            drop(engine);
            let _ = progress.await;

            let report = result.context("同步失败")?;
            println!(
                "复制 {} 个文件（{} 字节），删除 {} 个，未变化 {} 个，耗时 {} ms",
                report.files_copied,
                report.bytes_copied,
                report.files_deleted,
                report.files_unchanged,
                report.end_time - report.start_time
            );
        }
    }

    Ok(())
}
