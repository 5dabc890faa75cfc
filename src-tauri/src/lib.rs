// ============================================================================
// [总线] 程序的组装车间
// ✅ 只能做：pub mod 暴露子模块、注册 .invoke_handler()、初始化 State
// ⛔ 禁止：直接实现 command 函数
// ============================================================================

#[cfg(feature = "desktop")]
pub mod commands;
pub mod database;
pub mod models;
pub mod services;
pub mod utils;

// ============================================================================
// 应用入口
// ============================================================================

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Mutex;
    use tauri::Manager;

    tauri::Builder::default()
        .setup(|app| {
            // 获取应用数据目录并初始化设置存储
            let app_data_dir = app
                .path()
                .app_data_dir()
                .map_err(|e| format!("获取应用数据目录失败: {}", e))?;
            let db = database::Database::init(&app_data_dir).map_err(String::from)?;
            let settings = db.get_settings().map_err(String::from)?;
            // 以已保存的设置创建编辑器会话
            let builder = services::builder::FormBuilder::new(settings).map_err(String::from)?;
            app.manage(Mutex::new(db));
            app.manage(Mutex::new(builder));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // 编辑器 commands
            commands::builder::builder_state,
            commands::builder::builder_drop,
            commands::builder::builder_remove,
            commands::builder::builder_update_component,
            commands::builder::builder_undo,
            commands::builder::builder_redo,
            commands::builder::builder_add_section,
            commands::builder::builder_update_section,
            commands::builder::builder_move_section,
            commands::builder::builder_remove_section,
            commands::builder::builder_export_schema,
            commands::builder::builder_import_schema,
            commands::builder::builder_export_file,
            commands::builder::builder_import_file,
            commands::builder::list_palette,
            // 设置 commands
            commands::settings::get_builder_settings,
            commands::settings::save_builder_setting,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
