pub mod active;
pub mod data_core;
pub mod merge;
pub mod node;
pub mod path;
pub mod performance;
pub mod schema;
pub mod shadow_tree;
