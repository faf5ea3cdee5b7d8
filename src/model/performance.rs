//! 性能基准测试模块
//!
//! 用于测试大文档合并、重复合并、硬路径补全和平铺视图构建的性能

use std::time::Instant;

use crate::config::Config;
use crate::model::merge::{merge, BlockRecord};
use crate::model::node::InputTree;
use crate::model::schema::{materialize_hard_paths, Schema};
use crate::model::shadow_tree::build_rows;

/// 性能测试结果
#[derive(Debug)]
pub struct PerformanceResult {
    pub operation: String,
    pub duration_ms: u128,
    pub success: bool,
    pub details: String,
}

impl PerformanceResult {
    pub fn new(operation: &str, duration_ms: u128, success: bool, details: &str) -> Self {
        Self {
            operation: operation.to_string(),
            duration_ms,
            success,
            details: details.to_string(),
        }
    }
}

/// 生成大型测试文档：`sections` 个顶层块，每块 `width` 个子块，子块再嵌套 `depth` 层
pub fn generate_large_document(sections: usize, width: usize, depth: usize) -> Vec<BlockRecord> {
    fn nested(name: String, depth: usize, width: usize) -> BlockRecord {
        let mut record = BlockRecord::new(name)
            .with_parameter("type", "Generated")
            .with_parameter("value", depth.to_string())
            .with_comment(format!("depth {}", depth));
        if depth > 0 {
            for i in 0..width.max(1) / 2 + 1 {
                record = record.with_child(nested(format!("sub_{}", i), depth - 1, width / 2));
            }
        }
        record
    }

    (0..sections)
        .map(|s| {
            let mut section = BlockRecord::new(format!("Section{}", s));
            if s % 3 == 0 {
                section = section.with_parameter("active", "block_0 block_1");
            }
            for b in 0..width {
                section = section.with_child(nested(format!("block_{}", b), depth, width));
            }
            section
        })
        .collect()
}

/// 与生成文档配套的语法：每个顶层块下允许任意命名子块
pub fn generate_schema(sections: usize) -> Schema {
    let mut schema = Schema::new();
    for s in 0..sections {
        schema.add_template(format!("/Section{}/*", s).as_str().into());
        schema.add_template(format!("/Section{}/*/Info", s).as_str().into());
    }
    schema
}

/// 测试首次合并性能
pub fn benchmark_merge(tree: &mut InputTree, schema: &Schema, records: &[BlockRecord]) -> PerformanceResult {
    let start = Instant::now();
    let report = merge(tree, schema, records, &Config::default());
    let duration = start.elapsed();
    PerformanceResult::new(
        "首次合并",
        duration.as_millis(),
        report.created > 0,
        &format!("{} 条记录，新建 {} 个节点", report.records, report.created),
    )
}

/// 测试重复合并（文档不变）性能，结果不应再新建节点
pub fn benchmark_remerge(tree: &mut InputTree, schema: &Schema, records: &[BlockRecord]) -> PerformanceResult {
    let start = Instant::now();
    let report = merge(tree, schema, records, &Config::default());
    let duration = start.elapsed();
    PerformanceResult::new(
        "重复合并",
        duration.as_millis(),
        report.created == 0 && report.materialized == 0,
        &format!("更新 {} 个节点", report.updated),
    )
}

/// 测试硬路径补全性能（已补全的树上应为零新建）
pub fn benchmark_materialize(tree: &mut InputTree, schema: &Schema) -> PerformanceResult {
    let start = Instant::now();
    let created = materialize_hard_paths(tree, schema);
    let duration = start.elapsed();
    PerformanceResult::new(
        "硬路径补全",
        duration.as_millis(),
        created == 0,
        &format!("新建 {} 个节点", created),
    )
}

/// 测试平铺视图构建性能
pub fn benchmark_rows(tree: &InputTree, schema: &Schema) -> PerformanceResult {
    let start = Instant::now();
    let rows = build_rows(tree, schema);
    let duration = start.elapsed();
    PerformanceResult::new(
        "影子树构建",
        duration.as_millis(),
        !rows.is_empty(),
        &format!("构建了 {} 行", rows.len()),
    )
}

/// 运行综合性能测试
pub fn run_performance_suite() -> Vec<PerformanceResult> {
    let mut results = Vec::new();

    // 测试不同规模的数据
    let test_cases = [
        (5, 10, 2),  // 小型
        (10, 20, 3), // 中型
        (20, 30, 3), // 大型
    ];

    for (sections, width, depth) in test_cases {
        tracing::info!("测试规模：{} 段 × {} 块，深度 {}", sections, width, depth);

        let start = Instant::now();
        let records = generate_large_document(sections, width, depth);
        let schema = generate_schema(sections);
        results.push(PerformanceResult::new(
            &format!("数据生成({}x{}x{})", sections, width, depth),
            start.elapsed().as_millis(),
            true,
            &format!("生成了 {} 个顶层块", records.len()),
        ));

        let mut tree = InputTree::new();
        results.push(benchmark_merge(&mut tree, &schema, &records));
        results.push(benchmark_remerge(&mut tree, &schema, &records));
        results.push(benchmark_materialize(&mut tree, &schema));
        results.push(benchmark_rows(&tree, &schema));
    }

    results
}
