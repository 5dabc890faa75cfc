// ============================================================================
// 业务层：纯 Rust 核心逻辑
// ✅ 特点：不依赖 `tauri::*`，保持纯净，方便写 #[test]
// ⛔ 禁止：直接返回前端专用的错误格式
// ============================================================================

pub mod builder;
pub mod history;
pub mod id_gen;
pub mod layout_tree;
pub mod palette;
pub mod registry_sync;
pub mod schema_io;
