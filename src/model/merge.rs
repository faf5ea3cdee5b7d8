//! 合并引擎：把解析器给出的块记录按名字合并进已有的树
//!
//! 已有节点保持身份与位置，只替换数据；新路径按需创建；
//! 全部记录处理完后重新补全硬路径。

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::model::active::parse_active_list;
use crate::model::node::{DocumentNode, InputTree, ACTIVE_KEY, NAME_KEY};
use crate::model::path::NodePath;
use crate::model::schema::{materialize_hard_paths, PathKind, Schema};

/// 解析器输出的一个块
///
/// 顶层记录的 `path` 相对于根，可含多段（平铺格式）；
/// `children` 中的记录相对于其父记录（嵌套格式）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub path: String,
    #[serde(default)]
    pub parameters: IndexMap<String, String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub parameter_comments: IndexMap<String, String>,
    #[serde(default)]
    pub children: Vec<BlockRecord>,
}

impl BlockRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    pub fn with_child(mut self, child: BlockRecord) -> Self {
        self.children.push(child);
        self
    }

    /// 除 `active` 外是否还有参数
    pub fn has_parameters(&self) -> bool {
        self.parameters.keys().any(|k| k != ACTIVE_KEY)
    }
}

/// 合并过程中的非致命问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// 路径不匹配任何语法模板，节点照常合并但不可编辑
    UnresolvedPath { path: NodePath },
    /// 同一次合并中路径重复，后出现的记录被改名
    DuplicateSiblingName { path: NodePath, renamed_to: NodePath },
    /// `active` 列表含多余分隔符
    MalformedActiveList { path: NodePath, raw: String },
    /// 路径含通配段，记录被跳过
    WildcardInPath { path: NodePath },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedPath { path } => write!(f, "未知语法路径: {}", path),
            Self::DuplicateSiblingName { path, renamed_to } => {
                write!(f, "重复的块 {}，已改名为 {}", path, renamed_to)
            }
            Self::MalformedActiveList { path, raw } => {
                write!(f, "{} 的 active 列表格式有误: {:?}", path, raw)
            }
            Self::WildcardInPath { path } => write!(f, "路径含通配段，已跳过: {}", path),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub records: usize,
    pub created: usize,
    pub updated: usize,
    pub materialized: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 无法解析的路径
    pub fn unresolved(&self) -> impl Iterator<Item = &NodePath> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::UnresolvedPath { path } => Some(path),
            _ => None,
        })
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

struct MergeContext<'a> {
    schema: &'a Schema,
    config: &'a Config,
    visited: HashSet<NodePath>,
    /// 本次记录里按原名出现过的全部路径（含中间段）
    claimed: HashSet<NodePath>,
    report: MergeReport,
}

fn collect_claims(records: &[BlockRecord], parent: &NodePath, out: &mut HashSet<NodePath>) {
    for record in records {
        let mut path = parent.clone();
        for segment in NodePath::parse(&record.path).iter() {
            path = path.child(segment);
            out.insert(path.clone());
        }
        collect_claims(&record.children, &path, out);
    }
}

impl MergeContext<'_> {
    fn merge_record(&mut self, parent: &mut DocumentNode, parent_path: &NodePath, record: &BlockRecord) {
        self.report.records += 1;
        let relative = NodePath::parse(&record.path);
        let Some((last, intermediate)) = relative.segments().split_last() else {
            tracing::warn!("跳过空路径记录（父路径 {}）", parent_path);
            for child in &record.children {
                self.merge_record(parent, parent_path, child);
            }
            return;
        };
        if relative.has_wildcard_segment() {
            self.report.push(Diagnostic::WildcardInPath {
                path: parent_path.join(&relative),
            });
            return;
        }

        let mut node = parent;
        let mut path = parent_path.clone();
        for segment in intermediate {
            let (child, is_new) = node.ensure_child(segment);
            self.report.created += usize::from(is_new);
            node = child;
            path = path.child(segment.as_str());
        }

        let name = self.unique_name(node, &path, last);
        let terminal_path = path.child(name.as_str());
        self.visited.insert(terminal_path.clone());

        let (terminal, is_new) = node.ensure_child(&name);
        if is_new {
            self.report.created += 1;
        } else {
            self.report.updated += 1;
        }
        terminal.set_renamed_from((name != *last).then(|| last.clone()));
        self.apply(terminal, &terminal_path, record);

        for child in &record.children {
            self.merge_record(terminal, &terminal_path, child);
        }
    }

    /// 本次合并已写过同一路径时，追加 `_1`、`_2`… 直到不冲突
    ///
    /// 候选名不能被本次写过或被其它记录按原名占用；已有兄弟只有是
    /// 同一原名的改名结果时才可复用，避免覆盖用户自己的块。
    fn unique_name(&mut self, parent: &DocumentNode, parent_path: &NodePath, name: &str) -> String {
        let original = parent_path.child(name);
        if !self.visited.contains(&original) {
            return name.to_string();
        }
        let mut n = 1;
        let renamed = loop {
            let candidate = format!("{}_{}", name, n);
            let path = parent_path.child(candidate.as_str());
            let free = !self.visited.contains(&path)
                && !self.claimed.contains(&path)
                && parent
                    .find_child(&candidate)
                    .map_or(true, |sibling| sibling.renamed_from() == Some(name));
            if free {
                break candidate;
            }
            n += 1;
        };
        self.report.push(Diagnostic::DuplicateSiblingName {
            path: original,
            renamed_to: parent_path.child(renamed.as_str()),
        });
        renamed
    }

    fn apply(&mut self, node: &mut DocumentNode, path: &NodePath, record: &BlockRecord) {
        if record.has_parameters() {
            node.replace_parameters(record.parameters.clone(), record.parameter_comments.clone());
        }
        node.set_comments(record.comments.clone());

        let active = record.parameters.get(ACTIVE_KEY).cloned();
        if let Some(raw) = &active {
            if parse_active_list(raw).malformed {
                self.report.push(Diagnostic::MalformedActiveList {
                    path: path.clone(),
                    raw: raw.clone(),
                });
            }
        }
        node.set_active_list(active);

        if let Some(default_type) = self.config.type_defaults.get(&path.to_string()) {
            if node.insert_parameter_if_absent("type", default_type) {
                tracing::debug!("{} 补全默认类型 {}", path, default_type);
            }
        }

        if !self.schema.is_empty() && self.schema.classify(path) == PathKind::Dynamic {
            self.report.push(Diagnostic::UnresolvedPath { path: path.clone() });
        }
    }
}

/// 把记录序列合并进树，返回统计与诊断；从不因用户数据而失败
pub fn merge(tree: &mut InputTree, schema: &Schema, records: &[BlockRecord], config: &Config) -> MergeReport {
    let mut ctx = MergeContext {
        schema,
        config,
        visited: HashSet::new(),
        claimed: HashSet::new(),
        report: MergeReport::default(),
    };
    let root_path = NodePath::root();
    collect_claims(records, &root_path, &mut ctx.claimed);
    for record in records {
        ctx.merge_record(tree.root_mut(), &root_path, record);
    }

    let mut report = ctx.report;
    // 通配块可能带来新的语法子路径
    report.materialized = materialize_hard_paths(tree, schema);
    tracing::info!(
        "合并完成: {} 条记录, 新建 {}, 更新 {}, 补全 {}, 诊断 {}",
        report.records,
        report.created,
        report.updated,
        report.materialized,
        report.diagnostics.len()
    );
    report
}

/// 把树导出为嵌套块记录：去掉镜像的 `Name`，把启用列表还原为 `active` 参数
pub fn to_records(tree: &InputTree) -> Vec<BlockRecord> {
    fn export(node: &DocumentNode) -> BlockRecord {
        let mut parameters: IndexMap<String, String> = node
            .parameters()
            .iter()
            .filter(|(key, _)| key.as_str() != NAME_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if let Some(active) = node.active_list() {
            parameters.insert(ACTIVE_KEY.to_string(), active.to_string());
        }
        BlockRecord {
            path: node.name().to_string(),
            parameters,
            comments: node.comments().to_vec(),
            parameter_comments: node.parameter_comments().clone(),
            children: node.children().map(export).collect(),
        }
    }

    tree.root().children().map(export).collect()
}
