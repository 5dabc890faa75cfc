// ============================================================================
// 表单设计器 Commands
// 作为前端与 FormBuilder 会话之间的薄接口层，仅负责：
// 1. 接收前端参数
// 2. 从 Tauri State 获取 FormBuilder 实例
// 3. 调用 FormBuilder 方法
// 4. 返回结果
// ⛔ 禁止：包含业务逻辑
// ============================================================================

use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::{Map, Value};
use tauri::State;

use crate::models::dtos::{BuilderState, DropEvent, DropOutcome};
use crate::services::builder::FormBuilder;
use crate::services::palette::{self, PaletteEntry};
use crate::services::schema_io::{self, ImportReport};

// ============================================================================
// 状态与拖拽
// ============================================================================

/// 获取当前编辑器状态
#[tauri::command]
pub async fn builder_state(builder: State<'_, Mutex<FormBuilder>>) -> Result<BuilderState, String> {
    let builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.state())
}

/// 处理一次拖拽放置
#[tauri::command]
pub async fn builder_drop(
    builder: State<'_, Mutex<FormBuilder>>,
    event: DropEvent,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.handle_drop(&event))
}

/// 删除元素（拖到回收区）
#[tauri::command]
pub async fn builder_remove(
    builder: State<'_, Mutex<FormBuilder>>,
    item_id: Option<String>,
    path: Option<String>,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.remove_item(item_id.as_deref(), path.as_deref()))
}

/// 合并组件属性
#[tauri::command]
pub async fn builder_update_component(
    builder: State<'_, Mutex<FormBuilder>>,
    id: String,
    patch: Map<String, Value>,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.update_component(&id, &patch))
}

#[tauri::command]
pub async fn builder_undo(builder: State<'_, Mutex<FormBuilder>>) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.undo())
}

#[tauri::command]
pub async fn builder_redo(builder: State<'_, Mutex<FormBuilder>>) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.redo())
}

// ============================================================================
// 分区
// ============================================================================

#[tauri::command]
pub async fn builder_add_section(
    builder: State<'_, Mutex<FormBuilder>>,
    title: String,
    description: Option<String>,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.add_section(&title, description.as_deref().unwrap_or_default()))
}

#[tauri::command]
pub async fn builder_update_section(
    builder: State<'_, Mutex<FormBuilder>>,
    section_id: String,
    title: Option<String>,
    description: Option<String>,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.update_section(&section_id, title.as_deref(), description.as_deref()))
}

#[tauri::command]
pub async fn builder_move_section(
    builder: State<'_, Mutex<FormBuilder>>,
    from: usize,
    to: usize,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.move_section(from, to))
}

#[tauri::command]
pub async fn builder_remove_section(
    builder: State<'_, Mutex<FormBuilder>>,
    section_id: String,
) -> Result<DropOutcome, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.remove_section(&section_id))
}

// ============================================================================
// 导入导出
// ============================================================================

/// 导出为格式化 JSON 字符串
#[tauri::command]
pub async fn builder_export_schema(
    builder: State<'_, Mutex<FormBuilder>>,
    title: String,
    description: Option<String>,
) -> Result<String, String> {
    let builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    let schema = builder.export_schema(&title, description.as_deref().unwrap_or_default());
    Ok(schema_io::to_json_pretty(&schema)?)
}

/// 导入 JSON 字符串，返回错误与警告列表
#[tauri::command]
pub async fn builder_import_schema(
    builder: State<'_, Mutex<FormBuilder>>,
    raw: String,
) -> Result<ImportReport, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.import_schema(&raw))
}

/// 导出到指定文件
#[tauri::command]
pub async fn builder_export_file(
    builder: State<'_, Mutex<FormBuilder>>,
    path: PathBuf,
    title: String,
    description: Option<String>,
) -> Result<(), String> {
    let builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.export_to_file(&path, &title, description.as_deref().unwrap_or_default())?)
}

/// 从指定文件导入
#[tauri::command]
pub async fn builder_import_file(
    builder: State<'_, Mutex<FormBuilder>>,
    path: PathBuf,
) -> Result<ImportReport, String> {
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    Ok(builder.import_from_file(&path)?)
}

/// 组件面板条目
#[tauri::command]
pub async fn list_palette() -> Result<Vec<PaletteEntry>, String> {
    Ok(palette::list())
}
