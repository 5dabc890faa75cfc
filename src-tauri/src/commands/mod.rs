// ============================================================================
// [接口层] Tauri Commands
// ✅ 只能做：接收前端参数、从 State 取出会话/数据库、调用 services、返回结果
// ⛔ 禁止：包含业务逻辑
// ============================================================================

pub mod builder;
pub mod settings;
