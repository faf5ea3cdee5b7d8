//! 影子树（Shadow Tree）：把文档树投影成平铺行，只存展示所需的结构信息
//!
//! 渲染层（界面或终端）只消费这些行，文档树本身不含任何展示状态。

use crate::model::node::{DocumentNode, InputTree, NodeRef};
use crate::model::schema::{PathKind, Schema};

/// 行的路径类型（与 UI 配色解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// 语法规定的块
    Hard,
    /// 通配模板下用户命名的块
    Wildcard,
    /// 语法未知的块
    Dynamic,
}

impl From<&PathKind> for RowKind {
    fn from(kind: &PathKind) -> Self {
        match kind {
            PathKind::Hard => RowKind::Hard,
            PathKind::Wildcard { .. } => RowKind::Wildcard,
            PathKind::Dynamic => RowKind::Dynamic,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeRow {
    /// 块名
    pub name: String,
    /// 从根开始的完整路径
    pub path: String,
    pub kind: RowKind,
    /// 子块数量
    pub children: u32,
    /// 轻量预览（类型或参数个数）
    pub preview: String,
    /// 节点深度（用于缩进显示）
    pub depth: u32,
    /// 是否启用（对应界面勾选框）
    pub active: bool,
    /// 能否在其下新增用户命名的子块
    pub can_add: bool,
    pub editable: bool,
    /// 是否可见（用于搜索过滤）
    pub visible: bool,
}

fn preview_of(node: &DocumentNode) -> String {
    let preview = match node.parameter("type") {
        Some(kind) => format!("type = {}", kind),
        None if node.parameters().is_empty() => String::new(),
        None => format!("({} params)", node.parameters().len()),
    };
    if preview.chars().count() > 32 {
        let truncated: String = preview.chars().take(32).collect();
        format!("{}...", truncated)
    } else {
        preview
    }
}

/// 先序展开整棵树（不含根）
pub fn build_rows(tree: &InputTree, schema: &Schema) -> Vec<TreeRow> {
    fn push_row(out: &mut Vec<TreeRow>, node: &NodeRef<'_>, schema: &Schema) {
        let path = node.path();
        out.push(TreeRow {
            name: node.name().to_string(),
            path: path.to_string(),
            kind: RowKind::from(&schema.classify(path)),
            children: u32::try_from(node.node().child_count()).unwrap_or(u32::MAX),
            preview: preview_of(node.node()),
            depth: u32::try_from(path.len().saturating_sub(1)).unwrap_or(u32::MAX),
            active: node.is_active(),
            can_add: schema.has_wildcard(path),
            editable: schema.is_editable(path),
            visible: true,
        });
    }

    let mut out = Vec::with_capacity(64);
    for node in tree.walk() {
        push_row(&mut out, &node, schema);
    }
    out
}
