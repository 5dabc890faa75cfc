// ============================================================================
// 数据传输对象（DTO）定义
// 前后端通信的数据结构，仅包含字段定义和序列化派生
// ⛔ 禁止：包含复杂的业务逻辑方法
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::layout::{ComponentRegistry, LayoutItem, Section};

/// 放置区域，由前端拖拽库在 drop 时给出
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DropZone {
    /// 放置位置地址，如 "0-1-2"
    pub path: String,
    /// 放置区域所在父节点当前的子节点数量
    #[serde(default)]
    pub children_count: usize,
    /// 容器组件内部的放置区域会携带容器 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// 组件面板条目：拖入画布时尚未进入布局树，没有 path
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaletteItem {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// 默认属性；为空时使用组件描述表中的默认值
    #[serde(default)]
    pub props: Map<String, Value>,
}

/// 被拖拽的元素
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DraggedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    /// 已在布局树中的元素的当前地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<LayoutItem>>,
    /// 来自组件面板时携带的模板
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<PaletteItem>,
}

/// 一次拖拽放置事件
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DropEvent {
    pub drop_zone: DropZone,
    pub dragged_item: DraggedItem,
}

/// 变更结果状态
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    /// 已应用并写入历史
    Applied,
    /// 未产生变化或被跳过，未写入历史
    Skipped,
    /// 被拒绝（循环拖拽、非法放置），前端应提示用户
    Rejected,
}

/// 一次变更操作的结果，由 builder_* command 返回
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DropOutcome {
    pub status: OutcomeStatus,
    /// 非阻塞的提示信息（如一行列数过多）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    /// 跳过或拒绝的原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// 新建组件时返回新 id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// 当前编辑器状态，供前端整体刷新
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BuilderState {
    pub sections: Vec<Section>,
    pub components: ComponentRegistry,
    pub can_undo: bool,
    pub can_redo: bool,
    pub history_len: usize,
    pub history_index: usize,
}
