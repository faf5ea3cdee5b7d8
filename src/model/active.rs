//! 启用集合：父块的 `active` 参数决定哪些子块参与计算

use crate::model::data_core::AppError;
use crate::model::node::{DocumentNode, InputTree};
use crate::model::path::NodePath;

/// 解析后的启用列表
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveSet {
    pub tokens: Vec<String>,
    /// 出现多余分隔符或空引号等无法干净切分的内容
    pub malformed: bool,
}

impl ActiveSet {
    pub fn contains(&self, name: &str) -> bool {
        self.tokens.iter().any(|t| t == name)
    }
}

/// 按空白切分启用列表，去掉包裹的引号；逗号、分号视为多余分隔符
pub fn parse_active_list(raw: &str) -> ActiveSet {
    let mut set = ActiveSet::default();
    for word in raw.split_whitespace() {
        let word = word.trim_matches(|c| c == '\'' || c == '"');
        if word.is_empty() {
            continue;
        }
        if word.contains([',', ';']) {
            set.malformed = true;
        }
        for token in word.split([',', ';']).filter(|t| !t.is_empty()) {
            set.tokens.push(token.to_string());
        }
    }
    set
}

/// 父块没有 `active` 参数，或参数中列出了该名字，子块即为启用
pub fn is_child_active(parent: &DocumentNode, name: &str) -> bool {
    match parent.active_list() {
        Some(raw) => parse_active_list(raw).contains(name),
        None => true,
    }
}

/// 按路径求启用状态；根节点总是启用，路径不存在返回 `None`
pub fn is_active(tree: &InputTree, path: &NodePath) -> Option<bool> {
    tree.find(path).map(|r| r.is_active())
}

/// 修改节点的启用状态，改写其父块的启用列表
///
/// 父块原先没有列表且要停用时，生成包含其余全部子块的显式列表。
pub fn set_active(tree: &mut InputTree, path: &NodePath, enabled: bool) -> Result<(), AppError> {
    let (parent_path, name) = match (path.parent(), path.name()) {
        (Some(parent), Some(name)) => (parent, name.to_string()),
        _ => return Err(AppError::State("根节点总是启用".into())),
    };
    let parent = tree
        .find_node_mut(&parent_path)
        .ok_or_else(|| AppError::NotFound(path.to_string()))?;
    if parent.find_child(&name).is_none() {
        return Err(AppError::NotFound(path.to_string()));
    }

    let mut tokens = match parent.active_list() {
        Some(raw) => parse_active_list(raw).tokens,
        None if enabled => return Ok(()),
        None => parent.child_names(),
    };
    if enabled {
        if !tokens.contains(&name) {
            tokens.push(name);
        }
    } else {
        tokens.retain(|t| *t != name);
    }
    parent.set_active_list(Some(tokens.join(" ")));
    Ok(())
}
