// ============================================================================
// 数据模型：布局树、组件注册表、地址、DTO、设置
// ============================================================================

pub mod dtos;
pub mod layout;
pub mod path;
pub mod settings;
