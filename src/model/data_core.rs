//! AppState：编辑会话的核心状态，持有语法、文档树与配置

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::config::Config;
use crate::model::active;
use crate::model::merge::{merge, to_records, BlockRecord, MergeReport};
use crate::model::node::{DocumentNode, InputTree, NodeRef};
use crate::model::path::NodePath;
use crate::model::schema::{materialize_hard_paths, PathKind, Schema, SchemaEntry};
use crate::model::shadow_tree::{build_rows, TreeRow};
use crate::utils::fs::{read_data_file, write_json_file};
use crate::vm::bridge::{EventBus, TreeEvent};

#[derive(Debug, Default)]
pub struct AppState {
    pub schema_path: Option<PathBuf>,
    pub source_path: Option<PathBuf>,
    pub config: Config,
    pub schema: Schema,
    pub tree: InputTree,
    pub tree_flat: Vec<TreeRow>,
    pub events: EventBus,
    pub last_report: Option<MergeReport>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("YAML解析失败: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("节点不存在: {0}")]
    NotFound(String),
    #[error("非法块名: {0:?}")]
    InvalidName(String),
    #[error("块 {parent:?} 下已存在同名子块: {name}")]
    DuplicateSiblingName { parent: String, name: String },
    #[error("状态错误: {0}")]
    State(String),
}

/// 一个输出文件及其所属的输出块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub file_name: String,
    pub block_name: String,
}

const MESH: &str = "Mesh";
const OUTPUTS: &str = "Outputs";
const GLOBAL_PARAMS: &str = "GlobalParams";

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false")
}

impl AppState {
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// 加载语法导出（JSON 或 YAML）并补全硬路径
    pub fn load_schema(&mut self, p: &Path) -> Result<(), AppError> {
        let entries: Vec<SchemaEntry> = read_data_file(p)?;
        self.set_schema(Schema::from_entries(entries));
        self.schema_path = Some(p.to_path_buf());
        Ok(())
    }

    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
        let created = materialize_hard_paths(&mut self.tree, &self.schema);
        tracing::info!("语法已更新，补全 {} 个硬路径节点", created);
        self.events.emit(&TreeEvent::SchemaLoaded {
            templates: self.schema.templates().len(),
        });
        self.refresh();
    }

    /// 加载解析器输出的块记录并合并进当前树
    pub fn load_file(&mut self, p: &Path) -> Result<MergeReport, AppError> {
        let records: Vec<BlockRecord> = read_data_file(p)?;
        let report = self.merge_records(&records);
        self.source_path = Some(p.to_path_buf());
        Ok(report)
    }

    pub fn merge_records(&mut self, records: &[BlockRecord]) -> MergeReport {
        let report = merge(&mut self.tree, &self.schema, records, &self.config);
        self.events.emit(&TreeEvent::Merged {
            records: report.records,
            created: report.created,
        });
        self.last_report = Some(report.clone());
        self.refresh();
        report
    }

    /// 重建平铺视图
    pub fn refresh(&mut self) {
        self.tree_flat = build_rows(&self.tree, &self.schema);
    }

    pub fn find(&self, path: &str) -> Option<NodeRef<'_>> {
        self.tree.find(&NodePath::parse(path))
    }

    /// 路径下的子块名；路径不存在时为空
    pub fn child_names_of_path(&self, path: &str) -> Vec<String> {
        self.tree.child_names_of_path(&NodePath::parse(path))
    }

    pub fn path_kind(&self, path: &str) -> PathKind {
        self.schema.classify(&NodePath::parse(path))
    }

    pub fn is_editable(&self, path: &str) -> bool {
        self.schema.is_editable(&NodePath::parse(path))
    }

    /// 在父块下新建子块，新块与父块都被置为启用
    pub fn add_block(&mut self, parent: &str, record: BlockRecord) -> Result<NodePath, AppError> {
        let parent_path = NodePath::parse(parent);
        let name = NodePath::parse(&record.path)
            .name()
            .map(str::to_string)
            .ok_or_else(|| AppError::State("新块缺少名字".into()))?;

        let mut node = DocumentNode::new(name.as_str());
        if record.has_parameters() {
            node.replace_parameters(record.parameters, record.parameter_comments);
        }
        node.set_comments(record.comments);
        self.tree
            .find_node_mut(&parent_path)
            .ok_or_else(|| AppError::NotFound(parent_path.to_string()))?
            .add_child(node)?;

        let path = parent_path.child(name.as_str());
        active::set_active(&mut self.tree, &path, true)?;
        if !parent_path.is_root() {
            active::set_active(&mut self.tree, &parent_path, true)?;
        }
        // 通配块下新增的子块可能需要补全语法子路径
        materialize_hard_paths(&mut self.tree, &self.schema);
        tracing::info!("新增块: {}", path);
        self.events.emit(&TreeEvent::NodeAdded(path.clone()));
        self.refresh();
        Ok(path)
    }

    /// 删除块及其子树；被删掉的语法路径会以空块的形式补回
    pub fn delete_block(&mut self, path: &str) -> Result<DocumentNode, AppError> {
        let path = NodePath::parse(path);
        let removed = self.tree.remove(&path)?;
        let restored = materialize_hard_paths(&mut self.tree, &self.schema);
        tracing::info!("删除块: {}（补回 {} 个硬路径节点）", path, restored);
        self.events.emit(&TreeEvent::NodeRemoved(path));
        self.refresh();
        Ok(removed)
    }

    /// 用编辑结果整体替换块数据；`Name` 与节点名不同则改名（纯语法路径除外）
    pub fn update_block(
        &mut self,
        path: &str,
        parameters: IndexMap<String, String>,
        parameter_comments: IndexMap<String, String>,
        comments: Vec<String>,
    ) -> Result<NodePath, AppError> {
        let mut path = NodePath::parse(path);
        if !self.tree.contains(&path) {
            return Err(AppError::NotFound(path.to_string()));
        }

        let new_name = parameters.get("Name").cloned();
        if let Some(new_name) = new_name.filter(|n| Some(n.as_str()) != path.name()) {
            if self.schema.classify(&path) == PathKind::Hard {
                tracing::warn!("语法路径 {} 不允许改名", path);
            } else {
                let renamed = self.tree.rename(&path, &new_name)?;
                self.events.emit(&TreeEvent::NodeRenamed {
                    from: path.clone(),
                    to: renamed.clone(),
                });
                path = renamed;
            }
        }

        let node = self
            .tree
            .find_node_mut(&path)
            .ok_or_else(|| AppError::NotFound(path.to_string()))?;
        node.replace_parameters(parameters, parameter_comments);
        node.set_comments(comments);
        if !path.is_root() {
            active::set_active(&mut self.tree, &path, true)?;
        }
        self.events.emit(&TreeEvent::ParametersChanged(path.clone()));
        self.refresh();
        Ok(path)
    }

    pub fn edit_comment(&mut self, path: &str, comments: Vec<String>) -> Result<(), AppError> {
        let path = NodePath::parse(path);
        self.tree
            .find_node_mut(&path)
            .ok_or_else(|| AppError::NotFound(path.to_string()))?
            .set_comments(comments);
        self.events.emit(&TreeEvent::CommentChanged(path));
        self.refresh();
        Ok(())
    }

    pub fn set_active(&mut self, path: &str, enabled: bool) -> Result<(), AppError> {
        let path = NodePath::parse(path);
        active::set_active(&mut self.tree, &path, enabled)?;
        self.events.emit(&TreeEvent::ActiveChanged(path));
        self.refresh();
        Ok(())
    }

    /// `[GlobalParams]` 的参数，编辑其它块时作为缺省值参考
    pub fn global_params(&self) -> Option<&IndexMap<String, String>> {
        self.tree
            .root()
            .find_child(GLOBAL_PARAMS)
            .map(DocumentNode::parameters)
    }

    pub fn mesh_file_name(&self) -> Option<String> {
        self.tree
            .root()
            .find_child(MESH)
            .and_then(|mesh| mesh.parameter("file"))
            .map(str::to_string)
    }

    /// 根据 `[Outputs]` 推算 Exodus 输出文件名
    ///
    /// 简写 `exodus = true` 产生公共前缀文件；启用的 `type = Exodus` 子块
    /// 各产生一个文件，可用自己的 `file_base` 覆盖，并按过采样追加后缀。
    pub fn output_targets(&self) -> Vec<OutputTarget> {
        let Some(outputs) = self.find(OUTPUTS) else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        let explicit_base = outputs.node().parameter("file_base").map(str::to_string);
        let common_base = explicit_base
            .clone()
            .unwrap_or_else(|| self.config.default_file_base.clone());

        if outputs.node().parameter("exodus") == Some("true") {
            let file_name = match explicit_base {
                Some(_) => format!("{}.e", common_base),
                None => format!("{}_out.e", common_base),
            };
            targets.push(OutputTarget {
                file_name,
                block_name: "exodus".to_string(),
            });
        }

        for child in outputs.children() {
            let data = child.node();
            if !child.is_active() || data.parameter("type") != Some("Exodus") {
                continue;
            }
            let mut file_base = match data.parameter("file_base") {
                Some(base) if !base.is_empty() => base.to_string(),
                _ => format!("{}_{}", common_base, child.name()),
            };
            let oversample = data.parameter("oversample").is_some_and(is_truthy);
            let append = data.parameter("append_oversample").is_some_and(is_truthy);
            if oversample && append {
                file_base.push_str("_oversample");
            }
            targets.push(OutputTarget {
                file_name: format!("{}.e", file_base),
                block_name: child.name().to_string(),
            });
        }
        targets
    }

    /// 应用搜索过滤，只显示路径或名字匹配的行
    pub fn apply_search_filter(&mut self, filter: &str) {
        let filter = filter.trim();
        for row in &mut self.tree_flat {
            row.visible = filter.is_empty() || row.path.contains(filter) || row.name.contains(filter);
        }
    }

    /// 将当前树保存为 JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), AppError> {
        write_json_file(path, &self.tree)?;
        tracing::info!("文档树已保存到: {}", path.display());
        Ok(())
    }

    /// 将当前树导出为块记录，可再次合并
    pub fn save_records(&self, path: &Path) -> Result<(), AppError> {
        write_json_file(path, &to_records(&self.tree))?;
        tracing::info!("块记录已保存到: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;
    use tempfile::{Builder, NamedTempFile};

    /// 创建带扩展名的临时文件用于测试
    fn create_test_file(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().expect("创建临时文件失败");
        file.write_all(content.as_bytes()).expect("写入临时文件失败");
        file
    }

    fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn loaded_state() -> AppState {
        let mut state = AppState::default();
        state.set_schema(Schema::from_templates(["/Mesh", "/Outputs/*", "/Kernels/*"]));
        state.merge_records(&[
            BlockRecord::new("Mesh").with_parameter("file", "square.e"),
            BlockRecord::new("Outputs/exo").with_parameter("type", "Exodus"),
            BlockRecord::new("Kernels/diff").with_parameter("type", "Diffusion"),
        ]);
        state
    }

    #[test]
    fn test_load_schema_and_records_from_files() {
        let schema = create_test_file(
            r#"
- name: /Mesh
  parameters:
    - name: file
- name: /Outputs
  subblocks:
    - name: /Outputs/*
      parameters:
        - name: type
"#,
            ".yaml",
        );
        let records = create_test_file(
            r#"[{"path": "Outputs/exo", "parameters": {"type": "Exodus"}, "comments": ["结果"]}]"#,
            ".json",
        );

        let mut state = AppState::default();
        state.load_schema(schema.path()).expect("加载语法失败");
        assert!(state.find("/Mesh").is_some(), "硬路径应该在加载语法后出现");

        let report = state.load_file(records.path()).expect("加载记录失败");
        assert!(report.is_clean());
        assert!(state.is_editable("/Outputs/exo"));
        assert_eq!(state.tree_flat.len(), 3, "应该有3行：Mesh、Outputs、exo");
        assert!(state.source_path.is_some());
    }

    #[test]
    fn test_invalid_records_file() {
        let file = create_test_file(r#"{"invalid": json content}"#, ".json");
        let mut state = AppState::default();
        assert!(state.load_file(file.path()).is_err(), "无效JSON应该返回错误");
    }

    #[test]
    fn test_add_block_and_duplicate() {
        let mut state = loaded_state();
        state.set_active("/Kernels/diff", false).unwrap();

        let path = state
            .add_block("/Kernels", BlockRecord::new("conv").with_parameter("type", "Convection"))
            .expect("新增块应该成功");
        assert_eq!(path.to_string(), "/Kernels/conv");
        assert!(state.find("/Kernels/conv").unwrap().is_active(), "新块应该启用");
        assert!(!state.find("/Kernels/diff").unwrap().is_active());

        let dup = state.add_block("/Kernels", BlockRecord::new("conv"));
        assert!(matches!(dup, Err(AppError::DuplicateSiblingName { .. })));
        let missing = state.add_block("/Nope", BlockRecord::new("x"));
        assert!(matches!(missing, Err(AppError::NotFound(_))));
        let star = state.add_block("/Kernels", BlockRecord::new("*"));
        assert!(matches!(star, Err(AppError::InvalidName(_))));
        assert!(state.find("/Kernels/*").is_none());
    }

    #[test]
    fn test_delete_restores_only_schema_paths() {
        let mut state = loaded_state();
        state.add_block("/Mesh", BlockRecord::new("custom")).unwrap();

        state.delete_block("/Mesh").expect("删除应该成功");
        let mesh = state.find("/Mesh").expect("语法路径应该被补回");
        assert!(mesh.node().parameters().is_empty());
        assert!(state.find("/Mesh/custom").is_none(), "用户自建子块不应补回");

        state.delete_block("/Outputs/exo").unwrap();
        assert!(state.child_names_of_path("/Outputs").is_empty());
        assert!(state.delete_block("/Outputs/exo").is_err());
    }

    #[test]
    fn test_update_block_renames_user_blocks_only() {
        let mut state = loaded_state();

        let path = state
            .update_block(
                "/Kernels/diff",
                params(&[("Name", "diffusion"), ("type", "Diffusion"), ("variable", "u")]),
                IndexMap::new(),
                vec!["扩散项".into()],
            )
            .unwrap();
        assert_eq!(path.to_string(), "/Kernels/diffusion");
        let node = state.find("/Kernels/diffusion").unwrap();
        assert_eq!(node.node().parameter("variable"), Some("u"));
        assert_eq!(node.node().comments(), &["扩散项".to_string()]);

        let mesh = state
            .update_block("/Mesh", params(&[("Name", "Grid"), ("file", "cube.e")]), IndexMap::new(), vec![])
            .unwrap();
        assert_eq!(mesh.to_string(), "/Mesh", "语法路径不改名");
        assert_eq!(state.find("/Mesh").unwrap().node().parameter("Name"), Some("Mesh"));
    }

    #[test]
    fn test_mesh_file_and_global_params() {
        let mut state = loaded_state();
        assert_eq!(state.mesh_file_name().as_deref(), Some("square.e"));
        assert!(state.global_params().is_none());

        state.merge_records(&[BlockRecord::new("GlobalParams").with_parameter("variable", "u")]);
        let globals = state.global_params().unwrap();
        assert_eq!(globals.get("variable").map(String::as_str), Some("u"));
    }

    #[test]
    fn test_output_targets() {
        let mut state = AppState::default();
        state.merge_records(&[
            BlockRecord::new("Outputs")
                .with_parameter("exodus", "true")
                .with_parameter("active", "exo fine csv"),
            BlockRecord::new("Outputs/exo").with_parameter("type", "Exodus"),
            BlockRecord::new("Outputs/fine")
                .with_parameter("type", "Exodus")
                .with_parameter("file_base", "refined")
                .with_parameter("oversample", "true")
                .with_parameter("append_oversample", "true"),
            BlockRecord::new("Outputs/csv").with_parameter("type", "CSV"),
            BlockRecord::new("Outputs/off").with_parameter("type", "Exodus"),
        ]);

        let targets = state.output_targets();
        let files: Vec<&str> = targets.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(
            files,
            vec!["peacock_run_tmp_out.e", "peacock_run_tmp_exo.e", "refined_oversample.e"]
        );
        assert_eq!(targets[0].block_name, "exodus");
        assert_eq!(targets[2].block_name, "fine");
    }

    #[test]
    fn test_output_targets_with_common_file_base() {
        let mut state = AppState::default();
        state.merge_records(&[
            BlockRecord::new("Outputs")
                .with_parameter("exodus", "true")
                .with_parameter("file_base", "run"),
            BlockRecord::new("Outputs/exo").with_parameter("type", "Exodus"),
        ]);
        let files: Vec<String> = state.output_targets().into_iter().map(|t| t.file_name).collect();
        assert_eq!(files, vec!["run.e", "run_exo.e"]);
    }

    #[test]
    fn test_events_reach_subscribers() {
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let mut state = loaded_state();
        {
            let seen = seen.clone();
            state.events.subscribe(move |event| seen.borrow_mut().push(event.to_string()));
        }

        state.edit_comment("/Mesh", vec!["网格".into()]).unwrap();
        state.delete_block("/Kernels/diff").unwrap();
        assert_eq!(seen.borrow().len(), 2);
        assert!(seen.borrow()[1].contains("/Kernels/diff"));
    }

    #[test]
    fn test_search_filter() {
        let mut state = loaded_state();
        state.apply_search_filter("diff");
        let visible: Vec<&str> = state
            .tree_flat
            .iter()
            .filter(|r| r.visible)
            .map(|r| r.path.as_str())
            .collect();
        assert_eq!(visible, vec!["/Kernels/diff"]);

        state.apply_search_filter("  ");
        assert!(state.tree_flat.iter().all(|r| r.visible));
    }

    #[test]
    fn test_save_records_round_trip() {
        let state = loaded_state();
        let out = Builder::new().suffix(".json").tempfile().expect("创建临时文件失败");
        state.save_records(out.path()).expect("保存应该成功");

        let mut reloaded = AppState::default();
        reloaded.set_schema(Schema::from_templates(["/Mesh", "/Outputs/*", "/Kernels/*"]));
        reloaded.load_file(out.path()).expect("重新加载应该成功");
        assert_eq!(reloaded.tree, state.tree);
    }
}
