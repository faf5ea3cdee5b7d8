//! 性能基准：cargo run --release --example performance_benchmark

use input_tree::model::performance::run_performance_suite;
use tracing_subscriber::fmt::SubscriberBuilder;

fn main() {
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let results = run_performance_suite();
    let failed = results.iter().filter(|r| !r.success).count();
    for result in &results {
        let status = if result.success { "✓" } else { "✗" };
        println!("{} {:<24} {:>6} ms  {}", status, result.operation, result.duration_ms, result.details);
    }
    println!("共 {} 项，失败 {} 项", results.len(), failed);
}
