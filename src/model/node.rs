//! 输入文档树：块节点只存结构与数据，不含任何界面状态
//!
//! 子节点按名字索引、按插入顺序排列；节点不持有父引用，
//! 路径由查找时携带的 [`NodeRef`] 给出。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::active;
use crate::model::data_core::AppError;
use crate::model::path::{NodePath, WILDCARD};

/// 参数表中镜像节点名的键
pub const NAME_KEY: &str = "Name";
/// 子块启用列表参数
pub const ACTIVE_KEY: &str = "active";

/// 输入文档中的一个块
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    name: String,
    #[serde(default)]
    parameters: IndexMap<String, String>,
    #[serde(default)]
    parameter_comments: IndexMap<String, String>,
    #[serde(default)]
    comments: Vec<String>,
    /// 本块 `active` 参数的原始值，决定子块的启用状态
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_list: Option<String>,
    /// 合并时因重名而被改名的块，记录其在文档中的原名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    renamed_from: Option<String>,
    #[serde(default)]
    children: IndexMap<String, DocumentNode>,
}

impl DocumentNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    /// 读取参数；`active` 读取的是启用列表
    pub fn parameter(&self, key: &str) -> Option<&str> {
        if key == ACTIVE_KEY {
            return self.active_list.as_deref();
        }
        self.parameters.get(key).map(String::as_str)
    }

    pub fn parameter_comments(&self) -> &IndexMap<String, String> {
        &self.parameter_comments
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn set_comments(&mut self, comments: Vec<String>) {
        self.comments = comments;
    }

    pub fn active_list(&self) -> Option<&str> {
        self.active_list.as_deref()
    }

    pub fn set_active_list(&mut self, list: Option<String>) {
        self.active_list = list;
    }

    pub fn renamed_from(&self) -> Option<&str> {
        self.renamed_from.as_deref()
    }

    pub fn set_renamed_from(&mut self, original: Option<String>) {
        self.renamed_from = original;
    }

    /// 整体替换参数与参数注释
    ///
    /// `active` 键被剥离进启用列表之外（调用方负责启用列表），
    /// `Name` 键总被改写为节点名。
    pub fn replace_parameters(
        &mut self,
        mut parameters: IndexMap<String, String>,
        parameter_comments: IndexMap<String, String>,
    ) {
        parameters.shift_remove(ACTIVE_KEY);
        parameters.insert(NAME_KEY.to_string(), self.name.clone());
        self.parameters = parameters;
        self.parameter_comments = parameter_comments;
    }

    /// 参数缺失时写入默认值，返回是否写入
    pub fn insert_parameter_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.parameters.contains_key(key) {
            return false;
        }
        self.parameters.insert(key.to_string(), value.to_string());
        true
    }

    pub fn find_child(&self, name: &str) -> Option<&DocumentNode> {
        self.children.get(name)
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut DocumentNode> {
        self.children.get_mut(name)
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child_at(&self, index: usize) -> Option<&DocumentNode> {
        self.children.get_index(index).map(|(_, child)| child)
    }

    pub fn children(&self) -> impl Iterator<Item = &DocumentNode> {
        self.children.values()
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut DocumentNode> {
        self.children.values_mut()
    }

    /// 追加子节点；通配名或同名兄弟已存在时拒绝
    pub fn add_child(&mut self, child: DocumentNode) -> Result<&mut DocumentNode, AppError> {
        check_name(child.name())?;
        if self.children.contains_key(child.name()) {
            return Err(AppError::DuplicateSiblingName {
                parent: self.name.clone(),
                name: child.name,
            });
        }
        let name = child.name.clone();
        let (index, _) = self.children.insert_full(name, child);
        let (_, child) = self
            .children
            .get_index_mut(index)
            .ok_or_else(|| AppError::State("子节点插入失败".into()))?;
        Ok(child)
    }

    /// 取得同名子节点，不存在则创建空节点；第二项表示是否新建
    pub fn ensure_child(&mut self, name: &str) -> (&mut DocumentNode, bool) {
        let created = !self.children.contains_key(name);
        let child = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| DocumentNode::new(name));
        (child, created)
    }

    pub fn remove_child(&mut self, name: &str) -> Option<DocumentNode> {
        self.children.shift_remove(name)
    }

    /// 原位改名，保持兄弟顺序，并同步 `Name` 参数
    pub fn rename_child(&mut self, old: &str, new: &str) -> Result<(), AppError> {
        if old == new {
            return Ok(());
        }
        check_name(new)?;
        if self.children.contains_key(new) {
            return Err(AppError::DuplicateSiblingName {
                parent: self.name.clone(),
                name: new.to_string(),
            });
        }
        let (index, _, mut child) = self
            .children
            .shift_remove_full(old)
            .ok_or_else(|| AppError::NotFound(old.to_string()))?;
        child.name = new.to_string();
        child.renamed_from = None;
        if child.parameters.contains_key(NAME_KEY) {
            child.parameters.insert(NAME_KEY.to_string(), new.to_string());
        }
        self.children.shift_insert(index, new.to_string(), child);
        Ok(())
    }
}

/// 具体块名不能为空、含 `/` 或是通配符
fn check_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name == WILDCARD || name.contains('/') {
        return Err(AppError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// 查找结果：节点、父节点以及从根走下来的路径
#[derive(Debug, Clone)]
pub struct NodeRef<'a> {
    node: &'a DocumentNode,
    parent: Option<&'a DocumentNode>,
    path: NodePath,
}

impl<'a> NodeRef<'a> {
    pub fn node(&self) -> &'a DocumentNode {
        self.node
    }

    pub fn parent(&self) -> Option<&'a DocumentNode> {
        self.parent
    }

    pub fn name(&self) -> &'a str {
        self.node.name()
    }

    /// 从根开始、以 `/` 连接的路径
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        match self.parent {
            Some(parent) => active::is_child_active(parent, self.node.name()),
            None => true,
        }
    }

    pub fn child(&self, name: &str) -> Option<NodeRef<'a>> {
        self.node.find_child(name).map(|child| NodeRef {
            node: child,
            parent: Some(self.node),
            path: self.path.child(name),
        })
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        self.node
            .children()
            .map(|child| NodeRef {
                node: child,
                parent: Some(self.node),
                path: self.path.child(child.name()),
            })
            .collect()
    }
}

/// 整棵输入文档树，根节点无名
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTree {
    root: DocumentNode,
}

impl InputTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &DocumentNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut DocumentNode {
        &mut self.root
    }

    pub fn root_ref(&self) -> NodeRef<'_> {
        NodeRef {
            node: &self.root,
            parent: None,
            path: NodePath::root(),
        }
    }

    /// 按路径逐段精确查找
    pub fn find(&self, path: &NodePath) -> Option<NodeRef<'_>> {
        let mut current = self.root_ref();
        for segment in path.iter() {
            current = current.child(segment)?;
        }
        Some(current)
    }

    pub fn find_node_mut(&mut self, path: &NodePath) -> Option<&mut DocumentNode> {
        let mut current = &mut self.root;
        for segment in path.iter() {
            current = current.find_child_mut(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.find(path).is_some()
    }

    /// 确保路径上每一段都存在，返回新建节点数
    pub fn ensure_path(&mut self, path: &NodePath) -> usize {
        let mut created = 0;
        let mut current = &mut self.root;
        for segment in path.iter() {
            let (child, is_new) = current.ensure_child(segment);
            if is_new {
                created += 1;
            }
            current = child;
        }
        created
    }

    /// 删除节点及其整棵子树
    pub fn remove(&mut self, path: &NodePath) -> Result<DocumentNode, AppError> {
        let (parent_path, name) = match (path.parent(), path.name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => return Err(AppError::State("不能删除根节点".into())),
        };
        self.find_node_mut(&parent_path)
            .and_then(|parent| parent.remove_child(name))
            .ok_or_else(|| AppError::NotFound(path.to_string()))
    }

    /// 改名并返回新路径
    pub fn rename(&mut self, path: &NodePath, new_name: &str) -> Result<NodePath, AppError> {
        let (parent_path, old) = match (path.parent(), path.name()) {
            (Some(parent), Some(name)) => (parent, name.to_string()),
            _ => return Err(AppError::State("不能重命名根节点".into())),
        };
        let parent = self
            .find_node_mut(&parent_path)
            .ok_or_else(|| AppError::NotFound(path.to_string()))?;
        parent.rename_child(&old, new_name)?;
        Ok(parent_path.child(new_name))
    }

    /// 路径下子节点名；路径不存在时返回空列表
    pub fn child_names_of_path(&self, path: &NodePath) -> Vec<String> {
        self.find(path)
            .map(|r| r.node().child_names())
            .unwrap_or_default()
    }

    /// 先序遍历（不含根）
    pub fn walk(&self) -> Vec<NodeRef<'_>> {
        fn visit<'a>(node: NodeRef<'a>, out: &mut Vec<NodeRef<'a>>) {
            for child in node.children() {
                out.push(child.clone());
                visit(child, out);
            }
        }
        let mut out = Vec::new();
        visit(self.root_ref(), &mut out);
        out
    }

    pub fn node_count(&self) -> usize {
        self.walk().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_find_child_exact_case_sensitive() {
        let mut root = DocumentNode::new("");
        root.add_child(DocumentNode::new("Mesh")).unwrap();

        assert!(root.find_child("Mesh").is_some());
        assert!(root.find_child("mesh").is_none());
    }

    #[test]
    fn test_child_order_preserved() {
        let mut tree = InputTree::new();
        tree.ensure_path(&NodePath::parse("/Variables/u"));
        tree.ensure_path(&NodePath::parse("/Kernels"));
        tree.ensure_path(&NodePath::parse("/BCs"));

        assert_eq!(tree.root().child_names(), vec!["Variables", "Kernels", "BCs"]);
        assert_eq!(tree.root().child_at(1).map(DocumentNode::name), Some("Kernels"));
        assert_eq!(tree.root().child_count(), 3);
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut root = DocumentNode::new("");
        let mut first = DocumentNode::new("diff");
        first.replace_parameters(params(&[("type", "Diffusion")]), IndexMap::new());
        root.add_child(first).unwrap();

        let result = root.add_child(DocumentNode::new("diff"));
        assert!(matches!(result, Err(AppError::DuplicateSiblingName { .. })));
        // 原有数据不被覆盖
        assert_eq!(root.find_child("diff").unwrap().parameter("type"), Some("Diffusion"));
    }

    #[test]
    fn test_replace_parameters_mirrors_name_and_strips_active() {
        let mut node = DocumentNode::new("exo");
        node.replace_parameters(
            params(&[("type", "Exodus"), ("active", "a b"), ("Name", "other")]),
            params(&[("type", "输出格式")]),
        );

        assert_eq!(node.parameter("Name"), Some("exo"));
        assert!(!node.parameters().contains_key("active"));
        assert_eq!(node.parameter_comments().get("type").map(String::as_str), Some("输出格式"));
    }

    #[test]
    fn test_wildcard_name_rejected() {
        let mut tree = InputTree::new();
        tree.ensure_path(&NodePath::parse("/Outputs/exo"));

        let outputs = tree.find_node_mut(&NodePath::parse("/Outputs")).unwrap();
        let added = outputs.add_child(DocumentNode::new("*"));
        assert!(matches!(added, Err(AppError::InvalidName(_))));
        assert!(outputs.add_child(DocumentNode::new("")).is_err());

        let renamed = tree.rename(&NodePath::parse("/Outputs/exo"), "*");
        assert!(matches!(renamed, Err(AppError::InvalidName(_))));
        assert_eq!(tree.child_names_of_path(&NodePath::parse("/Outputs")), vec!["exo"]);
    }

    #[test]
    fn test_ensure_path_counts_created() {
        let mut tree = InputTree::new();
        assert_eq!(tree.ensure_path(&NodePath::parse("/A/B/C")), 3);
        assert_eq!(tree.ensure_path(&NodePath::parse("/A/B/D")), 1);
        assert_eq!(tree.ensure_path(&NodePath::parse("/A/B")), 0);
    }

    #[test]
    fn test_remove_subtree() {
        let mut tree = InputTree::new();
        tree.ensure_path(&NodePath::parse("/Outputs/exo/sub"));
        let removed = tree.remove(&NodePath::parse("/Outputs/exo")).unwrap();

        assert_eq!(removed.name(), "exo");
        assert!(tree.find(&NodePath::parse("/Outputs/exo")).is_none());
        assert!(tree.find(&NodePath::parse("/Outputs/exo/sub")).is_none());
        assert!(tree.find(&NodePath::parse("/Outputs")).is_some());
        assert!(tree.remove(&NodePath::root()).is_err());
    }

    #[test]
    fn test_rename_keeps_position_and_name_param() {
        let mut tree = InputTree::new();
        for p in ["/Kernels/a", "/Kernels/b", "/Kernels/c"] {
            tree.ensure_path(&NodePath::parse(p));
        }
        tree.find_node_mut(&NodePath::parse("/Kernels/b"))
            .unwrap()
            .replace_parameters(params(&[("type", "Diffusion")]), IndexMap::new());

        let new_path = tree.rename(&NodePath::parse("/Kernels/b"), "bb").unwrap();
        assert_eq!(new_path.to_string(), "/Kernels/bb");
        assert_eq!(
            tree.child_names_of_path(&NodePath::parse("/Kernels")),
            vec!["a", "bb", "c"]
        );
        let node = tree.find(&new_path).unwrap();
        assert_eq!(node.node().parameter("Name"), Some("bb"));

        let clash = tree.rename(&new_path, "a");
        assert!(matches!(clash, Err(AppError::DuplicateSiblingName { .. })));
    }

    #[test]
    fn test_node_ref_path_and_walk() {
        let mut tree = InputTree::new();
        tree.ensure_path(&NodePath::parse("/Mesh"));
        tree.ensure_path(&NodePath::parse("/Outputs/exo"));

        let paths: Vec<String> = tree.walk().iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, vec!["/Mesh", "/Outputs", "/Outputs/exo"]);
        assert_eq!(tree.node_count(), 3);
        assert!(tree.child_names_of_path(&NodePath::parse("/Nope")).is_empty());
    }
}
