// ============================================================================
// 组件描述表：组件面板中可拖拽的组件类型及其默认属性
// 声明式表格 + 按类型分派，新增组件只需在 PALETTE 中加一行并补充默认属性
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::models::layout::CONTAINER_CONFIG_KEYS;

/// 组件分类（对应组件面板的分组）
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PaletteCategory {
    Basic,
    Selection,
    Advanced,
    Layout,
}

/// 组件描述
#[derive(Debug, Clone, Copy)]
pub struct PaletteDescriptor {
    pub component_type: &'static str,
    pub label: &'static str,
    pub category: PaletteCategory,
    /// 容器组件：可包含子组件，部分配置内联在布局树中
    pub container: bool,
}

const fn field(
    component_type: &'static str,
    label: &'static str,
    category: PaletteCategory,
) -> PaletteDescriptor {
    PaletteDescriptor {
        component_type,
        label,
        category,
        container: false,
    }
}

const fn container(component_type: &'static str, label: &'static str) -> PaletteDescriptor {
    PaletteDescriptor {
        component_type,
        label,
        category: PaletteCategory::Layout,
        container: true,
    }
}

/// 组件描述表
pub const PALETTE: &[PaletteDescriptor] = &[
    field("input", "单行输入", PaletteCategory::Basic),
    field("textarea", "多行输入", PaletteCategory::Basic),
    field("number", "数字输入", PaletteCategory::Basic),
    field("password", "密码输入", PaletteCategory::Basic),
    field("select", "下拉选择", PaletteCategory::Selection),
    field("radio", "单选框组", PaletteCategory::Selection),
    field("checkbox", "多选框组", PaletteCategory::Selection),
    field("switch", "开关", PaletteCategory::Selection),
    field("datePicker", "日期选择", PaletteCategory::Selection),
    field("timePicker", "时间选择", PaletteCategory::Selection),
    field("cascader", "级联选择", PaletteCategory::Selection),
    field("upload", "上传", PaletteCategory::Advanced),
    field("rate", "评分", PaletteCategory::Advanced),
    field("slider", "滑动输入条", PaletteCategory::Advanced),
    field("divider", "分割线", PaletteCategory::Layout),
    field("text", "文本", PaletteCategory::Layout),
    container("tabContainer", "标签页容器"),
    container("cardContainer", "卡片容器"),
    container("formSection", "表单分组"),
];

/// 前端组件面板的条目
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    #[serde(rename = "type")]
    pub component_type: String,
    pub label: String,
    pub category: PaletteCategory,
    pub container: bool,
    pub default_props: Map<String, Value>,
}

pub fn lookup(component_type: &str) -> Option<&'static PaletteDescriptor> {
    PALETTE.iter().find(|d| d.component_type == component_type)
}

pub fn is_known_type(component_type: &str) -> bool {
    lookup(component_type).is_some()
}

pub fn is_container_type(component_type: &str) -> bool {
    lookup(component_type).map(|d| d.container).unwrap_or(false)
}

/// 组件类型的默认属性；未知类型返回空属性
pub fn default_props(component_type: &str) -> Map<String, Value> {
    let Some(descriptor) = lookup(component_type) else {
        return Map::new();
    };
    let value = match component_type {
        "input" | "textarea" | "password" => json!({
            "label": descriptor.label,
            "placeholder": "请输入",
            "required": false,
        }),
        "number" => json!({
            "label": descriptor.label,
            "min": null,
            "max": null,
            "precision": 0,
            "required": false,
        }),
        "select" | "radio" | "checkbox" | "cascader" => json!({
            "label": descriptor.label,
            "options": [
                { "label": "选项一", "value": "1" },
                { "label": "选项二", "value": "2" },
            ],
            "required": false,
        }),
        "switch" => json!({ "label": descriptor.label, "defaultChecked": false }),
        "datePicker" => json!({ "label": descriptor.label, "format": "YYYY-MM-DD", "required": false }),
        "timePicker" => json!({ "label": descriptor.label, "format": "HH:mm:ss", "required": false }),
        "upload" => json!({ "label": descriptor.label, "maxCount": 1, "accept": "" }),
        "rate" => json!({ "label": descriptor.label, "count": 5 }),
        "slider" => json!({ "label": descriptor.label, "min": 0, "max": 100 }),
        "divider" => json!({ "orientation": "left", "text": "" }),
        "text" => json!({ "content": "文本内容" }),
        "tabContainer" => json!({
            "label": descriptor.label,
            "tabs": [{ "key": "tab-1", "label": "标签页 1" }],
        }),
        "cardContainer" => json!({
            "label": descriptor.label,
            "cardProps": { "title": "卡片标题", "bordered": true },
        }),
        "formSection" => json!({
            "label": descriptor.label,
            "sectionProps": { "title": "分组标题", "collapsible": false },
        }),
        _ => json!({ "label": descriptor.label }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// 从属性中取出需要内联到布局树的容器配置
pub fn container_inline_props(props: &Map<String, Value>) -> Map<String, Value> {
    props
        .iter()
        .filter(|(key, _)| CONTAINER_CONFIG_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// 组件面板条目列表
pub fn list() -> Vec<PaletteEntry> {
    PALETTE
        .iter()
        .map(|d| PaletteEntry {
            component_type: d.component_type.to_string(),
            label: d.label.to_string(),
            category: d.category,
            container: d.container,
            default_props: default_props(d.component_type),
        })
        .collect()
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_palette_types_are_unique() {
        let types: HashSet<&str> = PALETTE.iter().map(|d| d.component_type).collect();
        assert_eq!(types.len(), PALETTE.len());
    }

    #[test]
    fn test_containers_carry_inline_config() {
        for d in PALETTE.iter().filter(|d| d.container) {
            let props = default_props(d.component_type);
            let inline = container_inline_props(&props);
            assert_eq!(inline.len(), 1, "{} 应有且只有一项内联配置", d.component_type);
        }
    }

    #[test]
    fn test_fields_have_no_inline_config() {
        for d in PALETTE.iter().filter(|d| !d.container) {
            assert!(container_inline_props(&default_props(d.component_type)).is_empty());
        }
    }

    #[test]
    fn test_lookup_and_unknown_type() {
        assert!(is_container_type("tabContainer"));
        assert!(!is_container_type("input"));
        assert!(!is_container_type("mystery"));
        assert!(is_known_type("datePicker"));
        assert!(default_props("mystery").is_empty());
    }

    #[test]
    fn test_list_serializes_type_key() {
        let entries = list();
        assert_eq!(entries.len(), PALETTE.len());
        let value = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(value["type"], "input");
        assert_eq!(value["defaultProps"]["placeholder"], "请输入");
    }
}
