//! VM桥接层：文档树的变更事件通道
//!
//! 展示层订阅 [`EventBus`]，每次编辑或合并完成后同步收到 [`TreeEvent`]，
//! 再从 `AppState::tree_flat` 重新取行。

use std::fmt::{self, Debug, Display, Formatter};

use crate::model::path::NodePath;

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_LOADING: &str = "正在加载文件...";
pub const STATUS_LOADED: &str = "文件加载完成";
pub const STATUS_SAVED: &str = "保存成功";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";

/// 文档树变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    SchemaLoaded { templates: usize },
    Merged { records: usize, created: usize },
    NodeAdded(NodePath),
    NodeRemoved(NodePath),
    NodeRenamed { from: NodePath, to: NodePath },
    ParametersChanged(NodePath),
    CommentChanged(NodePath),
    ActiveChanged(NodePath),
}

impl Display for TreeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaLoaded { templates } => write!(f, "语法已加载: {} 个模板", templates),
            Self::Merged { records, created } => {
                write!(f, "合并 {} 条记录，新建 {} 个节点", records, created)
            }
            Self::NodeAdded(path) => write!(f, "新增 {}", path),
            Self::NodeRemoved(path) => write!(f, "删除 {}", path),
            Self::NodeRenamed { from, to } => write!(f, "改名 {} -> {}", from, to),
            Self::ParametersChanged(path) => write!(f, "参数变更 {}", path),
            Self::CommentChanged(path) => write!(f, "注释变更 {}", path),
            Self::ActiveChanged(path) => write!(f, "启用状态变更 {}", path),
        }
    }
}

pub type Listener = Box<dyn FnMut(&TreeEvent)>;

/// 同步观察者列表
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&TreeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: &TreeEvent) {
        tracing::debug!("事件: {}", event);
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
