// ============================================================================
// 表单布局数据模型
// 分区（Section）→ 行（Row）→ 列（Column）→ 组件引用（Component）
// 以及扁平的组件注册表和历史快照
// ⛔ 禁止：包含布局变更逻辑（见 services::layout_tree）
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 行节点在 JSON 中的 type 值
pub const ROW_TYPE: &str = "row";
/// 列节点在 JSON 中的 type 值
pub const COLUMN_TYPE: &str = "column";

/// 容器组件在布局树中内联保存的配置字段
pub const CONTAINER_CONFIG_KEYS: &[&str] = &["tabs", "cardProps", "sectionProps"];

/// 布局节点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Row,
    Column,
    Component,
}

/// 布局节点（带标签的联合类型）
///
/// JSON 形态统一为 `{ "id", "type", "children"?, ...内联属性 }`，
/// `type` 为 "row"、"column" 或具体组件类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLayoutItem", into = "RawLayoutItem")]
pub enum LayoutItem {
    Row {
        id: String,
        children: Vec<LayoutItem>,
    },
    Column {
        id: String,
        children: Vec<LayoutItem>,
    },
    /// 组件引用；容器组件（标签页/卡片/表单分组）的 children 为 Some
    Component {
        id: String,
        component_type: String,
        children: Option<Vec<LayoutItem>>,
        props: Map<String, Value>,
    },
}

/// 布局节点的线上格式
#[derive(Serialize, Deserialize)]
struct RawLayoutItem {
    id: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<LayoutItem>>,
    #[serde(flatten)]
    props: Map<String, Value>,
}

impl From<RawLayoutItem> for LayoutItem {
    fn from(raw: RawLayoutItem) -> Self {
        match raw.item_type.as_str() {
            ROW_TYPE => LayoutItem::Row {
                id: raw.id,
                children: raw.children.unwrap_or_default(),
            },
            COLUMN_TYPE => LayoutItem::Column {
                id: raw.id,
                children: raw.children.unwrap_or_default(),
            },
            _ => LayoutItem::Component {
                id: raw.id,
                component_type: raw.item_type,
                children: raw.children,
                props: raw.props,
            },
        }
    }
}

impl From<LayoutItem> for RawLayoutItem {
    fn from(item: LayoutItem) -> Self {
        match item {
            LayoutItem::Row { id, children } => RawLayoutItem {
                id,
                item_type: ROW_TYPE.to_string(),
                children: Some(children),
                props: Map::new(),
            },
            LayoutItem::Column { id, children } => RawLayoutItem {
                id,
                item_type: COLUMN_TYPE.to_string(),
                children: Some(children),
                props: Map::new(),
            },
            LayoutItem::Component {
                id,
                component_type,
                children,
                props,
            } => RawLayoutItem {
                id,
                item_type: component_type,
                children,
                props,
            },
        }
    }
}

impl LayoutItem {
    pub fn row(id: impl Into<String>, children: Vec<LayoutItem>) -> Self {
        LayoutItem::Row {
            id: id.into(),
            children,
        }
    }

    pub fn column(id: impl Into<String>, children: Vec<LayoutItem>) -> Self {
        LayoutItem::Column {
            id: id.into(),
            children,
        }
    }

    /// 叶子组件引用
    pub fn component(id: impl Into<String>, component_type: impl Into<String>) -> Self {
        LayoutItem::Component {
            id: id.into(),
            component_type: component_type.into(),
            children: None,
            props: Map::new(),
        }
    }

    /// 空容器组件，`inline` 为需要内联在布局树中的配置
    pub fn container(
        id: impl Into<String>,
        component_type: impl Into<String>,
        inline: Map<String, Value>,
    ) -> Self {
        LayoutItem::Component {
            id: id.into(),
            component_type: component_type.into(),
            children: Some(Vec::new()),
            props: inline,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LayoutItem::Row { id, .. }
            | LayoutItem::Column { id, .. }
            | LayoutItem::Component { id, .. } => id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            LayoutItem::Row { .. } => ItemKind::Row,
            LayoutItem::Column { .. } => ItemKind::Column,
            LayoutItem::Component { .. } => ItemKind::Component,
        }
    }

    /// JSON 中的 type 值
    pub fn type_name(&self) -> &str {
        match self {
            LayoutItem::Row { .. } => ROW_TYPE,
            LayoutItem::Column { .. } => COLUMN_TYPE,
            LayoutItem::Component { component_type, .. } => component_type,
        }
    }

    /// 是否为容器组件（组件引用且带 children）
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            LayoutItem::Component {
                children: Some(_),
                ..
            }
        )
    }

    pub fn children(&self) -> Option<&Vec<LayoutItem>> {
        match self {
            LayoutItem::Row { children, .. } | LayoutItem::Column { children, .. } => {
                Some(children)
            }
            LayoutItem::Component { children, .. } => children.as_ref(),
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<LayoutItem>> {
        match self {
            LayoutItem::Row { children, .. } | LayoutItem::Column { children, .. } => {
                Some(children)
            }
            LayoutItem::Component { children, .. } => children.as_mut(),
        }
    }

    /// 收集子树中所有应存在于注册表的 id（组件和容器组件）
    pub fn collect_component_ids(&self, out: &mut Vec<String>) {
        if let LayoutItem::Component { id, .. } = self {
            out.push(id.clone());
        }
        if let Some(children) = self.children() {
            for child in children {
                child.collect_component_ids(out);
            }
        }
    }

    /// 收集子树中所有节点 id（含行、列）
    pub fn collect_all_ids(&self, out: &mut Vec<String>) {
        out.push(self.id().to_string());
        if let Some(children) = self.children() {
            for child in children {
                child.collect_all_ids(out);
            }
        }
    }

    /// 子树中组件叶子的数量（不含容器本身）
    pub fn count_leaves(&self) -> usize {
        match self {
            LayoutItem::Component { children: None, .. } => 1,
            _ => self
                .children()
                .map(|c| c.iter().map(LayoutItem::count_leaves).sum())
                .unwrap_or(0),
        }
    }
}

/// 表单分区：布局的顶层分组
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 有序的行列表
    #[serde(default)]
    pub layout: Vec<LayoutItem>,
}

impl Section {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Section {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            layout: Vec::new(),
        }
    }

    pub fn collect_component_ids(&self, out: &mut Vec<String>) {
        for item in &self.layout {
            item.collect_component_ids(out);
        }
    }
}

/// 所有分区中引用的组件 id
pub fn collect_component_ids(sections: &[Section]) -> Vec<String> {
    let mut ids = Vec::new();
    for section in sections {
        section.collect_component_ids(&mut ids);
    }
    ids
}

/// 所有分区中组件叶子的总数
pub fn count_leaves(sections: &[Section]) -> usize {
    sections
        .iter()
        .flat_map(|s| s.layout.iter())
        .map(LayoutItem::count_leaves)
        .sum()
}

// ============================================================================
// 组件注册表
// ============================================================================

/// 组件实例：类型 + 类型相关属性
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ComponentInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl ComponentInstance {
    pub fn new(
        id: impl Into<String>,
        component_type: impl Into<String>,
        props: Map<String, Value>,
    ) -> Self {
        ComponentInstance {
            id: id.into(),
            component_type: component_type.into(),
            props,
        }
    }

    /// 是否携带容器配置（tabs / cardProps / sectionProps）
    pub fn has_container_config(&self) -> bool {
        CONTAINER_CONFIG_KEYS
            .iter()
            .any(|key| self.props.contains_key(*key))
    }
}

/// 扁平的 id → 组件实例映射
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct ComponentRegistry(BTreeMap<String, ComponentInstance>);

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ComponentInstance> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ComponentInstance> {
        self.0.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn insert(&mut self, instance: ComponentInstance) -> Option<ComponentInstance> {
        self.0.insert(instance.id.clone(), instance)
    }

    pub fn remove(&mut self, id: &str) -> Option<ComponentInstance> {
        self.0.remove(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ComponentInstance)> {
        self.0.iter()
    }
}

/// 历史快照：某一时刻的完整布局与注册表
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub sections: Vec<Section>,
    pub components: ComponentRegistry,
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layout_item_wire_shape() {
        let item = LayoutItem::row(
            "r1",
            vec![LayoutItem::column(
                "c1",
                vec![LayoutItem::component("input_1", "input")],
            )],
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "r1",
                "type": "row",
                "children": [{
                    "id": "c1",
                    "type": "column",
                    "children": [{ "id": "input_1", "type": "input" }]
                }]
            })
        );
    }

    #[test]
    fn test_container_keeps_inline_props() {
        let raw = json!({
            "id": "tabs_1",
            "type": "tabContainer",
            "children": [],
            "tabs": [{ "key": "t1", "label": "基本信息" }]
        });
        let item: LayoutItem = serde_json::from_value(raw.clone()).unwrap();
        assert!(item.is_container());
        assert_eq!(item.type_name(), "tabContainer");
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let result = serde_json::from_value::<LayoutItem>(json!({ "type": "row" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_collect_ids_and_count_leaves() {
        let tree = LayoutItem::row(
            "r1",
            vec![LayoutItem::column(
                "c1",
                vec![
                    LayoutItem::component("a", "input"),
                    LayoutItem::Component {
                        id: "card".to_string(),
                        component_type: "cardContainer".to_string(),
                        children: Some(vec![LayoutItem::component("b", "select")]),
                        props: Map::new(),
                    },
                ],
            )],
        );
        let mut ids = Vec::new();
        tree.collect_component_ids(&mut ids);
        assert_eq!(ids, vec!["a", "card", "b"]);
        assert_eq!(tree.count_leaves(), 2);

        let mut all = Vec::new();
        tree.collect_all_ids(&mut all);
        assert_eq!(all, vec!["r1", "c1", "a", "card", "b"]);
    }

    #[test]
    fn test_component_instance_flattens_props() {
        let raw = json!({ "id": "x", "type": "input", "label": "姓名", "required": true });
        let inst: ComponentInstance = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(inst.component_type, "input");
        assert_eq!(inst.props.get("label"), Some(&json!("姓名")));
        assert!(!inst.has_container_config());
        assert_eq!(serde_json::to_value(&inst).unwrap(), raw);
    }

    #[test]
    fn test_section_defaults() {
        let section: Section = serde_json::from_value(json!({ "id": "s1" })).unwrap();
        assert!(section.layout.is_empty());
        assert_eq!(section.title, "");
    }
}
