//! 输入文档树同步库
//!
//! 把解析器给出的块记录按名字合并进一棵长期存在的文档树，
//! 按语法模板解析路径、补全硬路径，并计算子块的启用状态。
//! 数据层与展示层分离：展示层只消费平铺行和变更事件。

pub mod config;
pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use config::Config;
pub use model::active::{is_active, parse_active_list, set_active, ActiveSet};
pub use model::data_core::{AppError, AppState, OutputTarget};
pub use model::merge::{merge, to_records, BlockRecord, Diagnostic, MergeReport};
pub use model::node::{DocumentNode, InputTree, NodeRef};
pub use model::path::NodePath;
pub use model::schema::{materialize_hard_paths, PathKind, Schema, SchemaEntry};
pub use model::shadow_tree::{build_rows, RowKind, TreeRow};
pub use vm::bridge::{EventBus, TreeEvent};
