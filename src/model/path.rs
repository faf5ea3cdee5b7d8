//! 块路径：以 `/` 分隔的段序列（如 `/Outputs/exo`）

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 语法模板中的通配段
pub const WILDCARD: &str = "*";

/// 输入文件中的块路径，根路径为空段序列
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(Vec<String>);

impl NodePath {
    /// 根路径
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// 解析文本路径；首尾及重复的 `/` 被忽略，`""` 与 `"/"` 都是根
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self(
            text.split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// 父路径（根没有父路径）
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// 最后一段，即节点名
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// 追加一段，返回新路径
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(segment.into());
        next
    }

    /// 拼接相对路径
    #[must_use]
    pub fn join(&self, relative: &NodePath) -> Self {
        let mut next = self.clone();
        next.0.extend(relative.0.iter().cloned());
        next
    }

    /// 将最后一段替换为新名字
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        match self.parent() {
            Some(parent) => parent.child(name),
            None => Self::root(),
        }
    }

    /// 是否包含通配段（仅语法模板会出现）
    #[must_use]
    pub fn has_wildcard_segment(&self) -> bool {
        self.0.iter().any(|s| s == WILDCARD)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl FromStr for NodePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let p = NodePath::parse("/Outputs/exo/");
        assert_eq!(p.segments(), &["Outputs".to_string(), "exo".to_string()]);
        assert_eq!(p.to_string(), "/Outputs/exo");
        assert_eq!(NodePath::parse("Outputs//exo"), p);
    }

    #[test]
    fn test_root() {
        assert!(NodePath::parse("/").is_root());
        assert!(NodePath::parse("").is_root());
        assert_eq!(NodePath::root().to_string(), "/");
        assert!(NodePath::root().parent().is_none());
    }

    #[test]
    fn test_parent_child_with_name() {
        let p = NodePath::parse("/Kernels/diff");
        assert_eq!(p.parent(), Some(NodePath::parse("/Kernels")));
        assert_eq!(p.name(), Some("diff"));
        assert_eq!(p.with_name("conv").to_string(), "/Kernels/conv");
        assert_eq!(NodePath::parse("/Kernels").child("diff"), p);
        assert_eq!(NodePath::parse("/A").join(&NodePath::parse("B/C")).to_string(), "/A/B/C");
    }

    #[test]
    fn test_wildcard_segment() {
        assert!(NodePath::parse("/Outputs/*").has_wildcard_segment());
        assert!(!NodePath::parse("/Outputs/exo").has_wildcard_segment());
    }
}
