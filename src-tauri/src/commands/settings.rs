// ============================================================================
// 设置 Commands
// 读取与保存表单设计器设置；保存后立即应用到当前会话
// ============================================================================

use std::sync::Mutex;

use tauri::State;

use crate::database::Database;
use crate::models::settings::BuilderSettings;
use crate::services::builder::FormBuilder;

/// 获取表单设计器设置
#[tauri::command]
pub async fn get_builder_settings(
    db: State<'_, Mutex<Database>>,
) -> Result<BuilderSettings, String> {
    let db = db
        .lock()
        .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
    Ok(db.get_settings()?)
}

/// 保存单个设置项
#[tauri::command]
pub async fn save_builder_setting(
    db: State<'_, Mutex<Database>>,
    builder: State<'_, Mutex<FormBuilder>>,
    key: String,
    value: String,
) -> Result<BuilderSettings, String> {
    let settings = {
        let db = db
            .lock()
            .map_err(|_| "数据库访问失败：无法获取锁".to_string())?;
        db.save_setting(&key, &value)?
    };
    let mut builder = builder
        .lock()
        .map_err(|_| "编辑器访问失败：无法获取锁".to_string())?;
    builder.apply_settings(settings.clone())?;
    Ok(settings)
}
