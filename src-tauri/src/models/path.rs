// ============================================================================
// 布局地址：形如 "0-1-2" 的位置定位符
// 第一段为分区索引，其后逐层为子节点索引；地址是位置性的，变更后需重算
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::error::{AppError, AppResult};

/// 布局地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutPath(Vec<usize>);

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(-\d+)*$").expect("地址正则必须合法"))
}

impl LayoutPath {
    pub fn new(indices: Vec<usize>) -> Self {
        LayoutPath(indices)
    }

    /// 解析地址字符串，格式错误返回 AddressError
    pub fn parse(raw: &str) -> AppResult<Self> {
        raw.parse()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 分区索引（地址第一段）
    pub fn section_index(&self) -> Option<usize> {
        self.0.first().copied()
    }

    /// 最后一段：在父节点 children 中的索引
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// 父地址；单段地址（分区本身）的父地址为空地址
    pub fn parent(&self) -> Option<LayoutPath> {
        if self.0.is_empty() {
            return None;
        }
        Some(LayoutPath(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn child(&self, index: usize) -> LayoutPath {
        let mut indices = self.0.clone();
        indices.push(index);
        LayoutPath(indices)
    }

    pub fn starts_with(&self, prefix: &LayoutPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// 严格祖先判断：self 是 other 的祖先（不含相等）
    pub fn is_ancestor_of(&self, other: &LayoutPath) -> bool {
        other.0.len() > self.0.len() && other.starts_with(self)
    }

    /// 在 `removed` 位置的节点被移除后，重算本地址
    ///
    /// 只有与被移除节点同父、且排在其后的兄弟（及其子孙）地址需要前移一位。
    pub fn rebase_after_removal(&self, removed: &LayoutPath) -> LayoutPath {
        let depth = removed.len();
        if depth == 0 || self.0.len() < depth {
            return self.clone();
        }
        let level = depth - 1;
        if self.0[..level] != removed.0[..level] || self.0[level] <= removed.0[level] {
            return self.clone();
        }
        let mut indices = self.0.clone();
        indices[level] -= 1;
        LayoutPath(indices)
    }
}

impl FromStr for LayoutPath {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if !path_pattern().is_match(trimmed) {
            return Err(AppError::AddressError(format!("非法地址格式 \"{}\"", raw)));
        }
        let indices = trimmed
            .split('-')
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| AppError::AddressError(format!("地址段越界 \"{}\"", part)))
            })
            .collect::<AppResult<Vec<usize>>>()?;
        Ok(LayoutPath(indices))
    }
}

impl fmt::Display for LayoutPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("-"))
    }
}

impl Serialize for LayoutPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LayoutPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// 单元测试
// ============================================================================
