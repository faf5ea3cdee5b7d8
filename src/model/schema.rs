//! 语法模式：应用导出的块语法、路径模板匹配与硬路径补全
//!
//! 模板的每一段是字面名或通配符 `*`。语法导出只在加载时展开一次，
//! 之后按规范路径直接查表。

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::node::{DocumentNode, InputTree};
use crate::model::path::{NodePath, WILDCARD};

/// 全局参数块，总允许编辑
const GLOBAL_PARAMS: &str = "GlobalParams";

/// 语法导出中的参数描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub cpp_type: String,
    #[serde(default)]
    pub description: String,
}

/// 语法导出中的块描述，`name` 是完整路径（如 `/Outputs/*`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Option<Vec<ParameterSchema>>,
    #[serde(default)]
    pub subblocks: Option<Vec<SchemaEntry>>,
}

impl SchemaEntry {
    pub fn has_parameters(&self) -> bool {
        self.parameters.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// 是否有 `<type>` 形式的类型子块
    pub fn has_type_subblock(&self) -> bool {
        self.subblocks
            .as_ref()
            .is_some_and(|subs| subs.iter().any(|sb| sb.name.contains("<type>")))
    }
}

/// 路径分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    /// 全部为字面段的语法路径
    Hard,
    /// 经通配段匹配的用户命名块
    Wildcard { canonical: NodePath },
    /// 语法中不存在的用户自建路径
    Dynamic,
}

#[derive(Debug, Clone, Default)]
struct TemplateNode {
    children: IndexMap<String, TemplateNode>,
}

impl TemplateNode {
    fn insert(&mut self, segments: &[String]) {
        if let Some((first, rest)) = segments.split_first() {
            self.children.entry(first.clone()).or_default().insert(rest);
        }
    }

    fn get(&self, segments: &[String]) -> Option<&TemplateNode> {
        match segments.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get(first)?.get(rest),
        }
    }

    /// 逐段回溯匹配，字面段优先于通配段
    fn resolve(&self, segments: &[String], out: &mut Vec<String>) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return true;
        };
        if first != WILDCARD {
            if let Some(next) = self.children.get(first) {
                out.push(first.clone());
                if next.resolve(rest, out) {
                    return true;
                }
                out.pop();
            }
        }
        if let Some(next) = self.children.get(WILDCARD) {
            out.push(WILDCARD.to_string());
            if next.resolve(rest, out) {
                return true;
            }
            out.pop();
        }
        false
    }
}

/// 应用语法：模板集合 + 规范路径到语法条目的平铺索引
#[derive(Debug, Clone, Default)]
pub struct Schema {
    templates: Vec<NodePath>,
    trie: TemplateNode,
    entries: HashMap<NodePath, SchemaEntry>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从路径模板构建（无参数描述）
    pub fn from_templates<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut schema = Self::new();
        for p in paths {
            schema.add_template(NodePath::parse(p));
        }
        schema
    }

    /// 从语法导出构建，递归展开所有子块
    pub fn from_entries(entries: Vec<SchemaEntry>) -> Self {
        fn flatten(schema: &mut Schema, entry: SchemaEntry) {
            let path = NodePath::parse(&entry.name);
            // `<type>` 段之后是类型变体，只进索引不进模板
            let structural: Vec<String> = path
                .iter()
                .take_while(|seg| !seg.starts_with('<'))
                .map(str::to_string)
                .collect();
            if !structural.is_empty() {
                schema.add_template(NodePath::new(structural));
            }
            let subblocks = entry.subblocks.clone().unwrap_or_default();
            schema.entries.insert(path, entry);
            for sub in subblocks {
                flatten(schema, sub);
            }
        }

        let mut schema = Self::new();
        for entry in entries {
            flatten(&mut schema, entry);
        }
        tracing::info!(
            "语法加载完成: {} 个模板, {} 个条目",
            schema.templates.len(),
            schema.entries.len()
        );
        schema
    }

    pub fn add_template(&mut self, path: NodePath) {
        if path.is_root() || self.templates.contains(&path) {
            return;
        }
        self.trie.insert(path.segments());
        self.templates.push(path);
    }

    /// 声明顺序的全部模板
    pub fn templates(&self) -> &[NodePath] {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 规范路径：匹配模板，命中通配处替换为 `*`
    pub fn resolve_schema_path(&self, path: &NodePath) -> Option<NodePath> {
        let mut out = Vec::with_capacity(path.len());
        if self.trie.resolve(path.segments(), &mut out) {
            Some(NodePath::new(out))
        } else {
            None
        }
    }

    /// 是否匹配某个语法模板（通配段匹配任意单段）
    pub fn is_hard_path(&self, path: &NodePath) -> bool {
        self.resolve_schema_path(path).is_some()
    }

    /// 该路径下是否允许用户命名的子块（规范路径追加 `*` 仍是模板）
    pub fn has_wildcard(&self, path: &NodePath) -> bool {
        self.resolve_schema_path(path)
            .map(|canonical| self.trie.get(canonical.child(WILDCARD).segments()).is_some())
            .unwrap_or(false)
    }

    pub fn classify(&self, path: &NodePath) -> PathKind {
        match self.resolve_schema_path(path) {
            None => PathKind::Dynamic,
            Some(canonical) if canonical.has_wildcard_segment() => PathKind::Wildcard { canonical },
            Some(_) => PathKind::Hard,
        }
    }

    /// 按规范路径取语法条目
    pub fn entry(&self, canonical: &NodePath) -> Option<&SchemaEntry> {
        self.entries.get(canonical)
    }

    /// 按具体路径取语法条目
    pub fn entry_for(&self, path: &NodePath) -> Option<&SchemaEntry> {
        self.resolve_schema_path(path)
            .and_then(|canonical| self.entries.get(&canonical))
    }

    /// 能否编辑参数：有参数描述、有类型子块，或是全局参数块；
    /// 无法解析的路径不可编辑
    pub fn is_editable(&self, path: &NodePath) -> bool {
        let Some(canonical) = self.resolve_schema_path(path) else {
            return false;
        };
        if canonical.len() == 1 && canonical.name() == Some(GLOBAL_PARAMS) {
            return true;
        }
        self.entries
            .get(&canonical)
            .is_some_and(|e| e.has_parameters() || e.has_type_subblock())
    }
}

/// 确保每条语法路径在树中存在，返回新建节点数
///
/// 通配段把剩余部分展开到已存在的每个具体子块上；末尾的通配段不建节点。
/// 通配模板可能声明在其字面兄弟之前，因此反复扫描直到某一轮不再新建。
pub fn materialize_hard_paths(tree: &mut InputTree, schema: &Schema) -> usize {
    fn materialize(parent: &mut DocumentNode, segments: &[String]) -> usize {
        let Some((first, rest)) = segments.split_first() else {
            return 0;
        };
        if first == WILDCARD {
            return parent.children_mut().map(|child| materialize(child, rest)).sum();
        }
        let (child, is_new) = parent.ensure_child(first);
        usize::from(is_new) + materialize(child, rest)
    }

    let mut created = 0;
    loop {
        let pass: usize = schema
            .templates()
            .iter()
            .map(|template| materialize(tree.root_mut(), template.segments()))
            .sum();
        if pass == 0 {
            break;
        }
        created += pass;
    }
    if created > 0 {
        tracing::debug!("硬路径补全: 新建 {} 个节点", created);
    }
    created
}
