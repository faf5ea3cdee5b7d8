//! 程序入口：初始化日志、加载语法与块记录，在终端打印同步后的文档树

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::SubscriberBuilder;

use input_tree::model::performance::run_performance_suite;
use input_tree::vm::bridge::*;
use input_tree::{AppState, Config, RowKind, TreeRow};

#[derive(Parser)]
#[command(name = "input_tree")]
#[command(about = "把输入文件的块记录同步进文档树并打印")]
struct Args {
    /// 语法导出文件（JSON 或 YAML）
    #[arg(short, long)]
    schema: Option<PathBuf>,
    /// 解析器输出的块记录文件，可多次给出，按顺序重复合并
    #[arg(short, long)]
    input: Vec<PathBuf>,
    /// 会话配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 只显示路径或名字包含该文本的行
    #[arg(short, long)]
    filter: Option<String>,
    /// 把文档树保存为 JSON
    #[arg(long)]
    dump_json: Option<PathBuf>,
    /// 把文档树导出为块记录
    #[arg(long)]
    export_records: Option<PathBuf>,
    /// 运行性能测试后退出
    #[arg(long)]
    bench: bool,
    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn format_row(row: &TreeRow) -> String {
    let check = if row.active { "[x]" } else { "[ ]" };
    let marker = match (row.kind, row.can_add) {
        (RowKind::Dynamic, _) => "?",
        (_, true) => "*",
        _ => "",
    };
    let mut line = format!("{}{} {}{}", "  ".repeat(row.depth as usize), check, row.name, marker);
    if !row.preview.is_empty() {
        line.push_str("  ");
        line.push_str(&row.preview);
    }
    line
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("读取配置失败: {}", path.display()))?,
        None => Config::default(),
    };
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        config.max_level()
    };
    // 初始化日志
    let _ = SubscriberBuilder::default().with_max_level(level).try_init();
    tracing::info!("{}", STATUS_READY);

    if args.bench {
        for result in run_performance_suite() {
            let status = if result.success { "✓" } else { "✗" };
            println!("{} {:<24} {:>6} ms  {}", status, result.operation, result.duration_ms, result.details);
        }
        return Ok(());
    }

    let mut state = AppState::with_config(config);
    state.events.subscribe(|event| tracing::info!("{}", event));

    if let Some(path) = &args.schema {
        tracing::info!("{} {}", STATUS_LOADING, path.display());
        state
            .load_schema(path)
            .with_context(|| format!("{}{}", STATUS_ERROR_PREFIX, path.display()))?;
    }

    for path in &args.input {
        tracing::info!("{} {}", STATUS_LOADING, path.display());
        let report = state
            .load_file(path)
            .with_context(|| format!("{}{}", STATUS_ERROR_PREFIX, path.display()))?;
        tracing::info!("{}: {}", STATUS_LOADED, path.display());
        for diagnostic in &report.diagnostics {
            eprintln!("警告: {}", diagnostic);
        }
    }

    if let Some(filter) = &args.filter {
        state.apply_search_filter(filter);
    }

    for row in state.tree_flat.iter().filter(|r| r.visible) {
        println!("{}", format_row(row));
    }

    let targets = state.output_targets();
    if !targets.is_empty() {
        println!();
        println!("输出文件:");
        for target in targets {
            println!("  {} ({})", target.file_name, target.block_name);
        }
    }
    if let Some(mesh) = state.mesh_file_name() {
        println!("网格文件: {}", mesh);
    }

    if let Some(path) = &args.dump_json {
        state.save_to_file(path)?;
        tracing::info!("{}", STATUS_SAVED);
    }
    if let Some(path) = &args.export_records {
        state.save_records(path)?;
        tracing::info!("{}", STATUS_SAVED);
    }

    Ok(())
}
