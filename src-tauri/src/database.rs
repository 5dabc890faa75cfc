// ============================================================================
// 数据库模块：SQLite 设置存储
// 使用 rusqlite 直接操作 SQLite，遵循 KISS 原则，不引入 ORM
// 表单设计器设置以键值对形式保存在 settings 表中
// ============================================================================

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::models::settings::{
    BuilderSettings, KEY_COLUMN_WARNING_THRESHOLD, KEY_HISTORY_CAPACITY, KEY_SCHEMA_VERSION,
};
use crate::utils::error::{AppError, AppResult};

/// 数据库文件名
pub const DB_FILE_NAME: &str = "form_studio.db";

/// get_settings 读取的键
const SETTING_KEYS: &[&str] = &[
    KEY_HISTORY_CAPACITY,
    KEY_COLUMN_WARNING_THRESHOLD,
    KEY_SCHEMA_VERSION,
];

// ============================================================================
// 数据库管理器
// ============================================================================

/// 数据库管理器，封装 rusqlite 连接
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 初始化数据库：在指定目录创建数据库文件并建表
    ///
    /// # 参数
    /// - `app_data_dir`: 应用数据目录路径（Tauri app_data_dir）
    pub fn init(app_data_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(app_data_dir).map_err(|e| {
            AppError::DatabaseError(format!(
                "无法创建数据目录 {}: {}",
                app_data_dir.display(),
                e
            ))
        })?;

        let db_path = app_data_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path).map_err(|e| {
            AppError::DatabaseError(format!(
                "无法打开数据库文件 {}: {}",
                db_path.display(),
                e
            ))
        })?;
        Self::create_tables(&conn)?;
        log::info!("设置存储已就绪：{}", db_path.display());

        Ok(Database { conn })
    }

    /// 内存数据库（不落盘）
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_tables(&conn)?;
        Ok(Database { conn })
    }

    fn create_tables(conn: &Connection) -> AppResult<()> {
        conn.execute_batch(
            "
            -- 设置表（键值对）
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// 获取底层连接（仅测试使用）
    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// 数据库文件路径；内存数据库返回空字符串
    pub fn path(&self) -> String {
        self.conn.path().map(|p| p.to_string()).unwrap_or_default()
    }

    // ========================================================================
    // 设置
    // ========================================================================

    /// 读取表单设计器设置
    ///
    /// 未保存的键使用默认值；已保存但取值非法的键记录警告后同样使用默认值。
    pub fn get_settings(&self) -> AppResult<BuilderSettings> {
        let mut settings = BuilderSettings::default();
        for key in SETTING_KEYS {
            let value: Option<String> = self
                .conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(value) = value else {
                continue;
            };
            if let Err(e) = settings.apply(key, &value) {
                log::warn!("设置项 {} 的值 \"{}\" 无效，已使用默认值：{}", key, value, e);
            }
        }
        Ok(settings)
    }

    /// 保存单个设置项（键值对），保存前按设置项规则校验
    ///
    /// 使用 INSERT OR REPLACE 实现 upsert 语义。
    pub fn save_setting(&self, key: &str, value: &str) -> AppResult<BuilderSettings> {
        let mut settings = self.get_settings()?;
        settings.apply(key, value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value.trim()],
        )?;
        log::info!("设置项 {} 已更新为 {}", key, value.trim());
        Ok(settings)
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SCHEMA_VERSION};
    use proptest::prelude::*;
    use tempfile::TempDir;

    /// 测试数据库初始化：创建文件和 settings 表
    #[test]
    fn test_database_init_creates_file_and_table() {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();
        assert!(dir.path().join(DB_FILE_NAME).exists());

        let table_names: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(table_names, vec!["settings"]);
        assert!(db.path().ends_with(DB_FILE_NAME));
    }

    /// 测试初始化会创建不存在的多级目录
    #[test]
    fn test_database_init_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        Database::init(&nested).unwrap();
        assert!(nested.join(DB_FILE_NAME).exists());
    }

    /// 测试无设置时返回默认值
    #[test]
    fn test_get_settings_default() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_settings().unwrap(), BuilderSettings::default());
        assert_eq!(db.path(), "");
    }

    #[test]
    fn test_save_setting_upsert() {
        let db = Database::open_in_memory().unwrap();
        db.save_setting(KEY_HISTORY_CAPACITY, "20").unwrap();
        db.save_setting(KEY_HISTORY_CAPACITY, " 30 ").unwrap();
        let settings = db.get_settings().unwrap();
        assert_eq!(settings.history_capacity, 30);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    /// 测试非法取值和未知键被拒绝且不落库
    #[test]
    fn test_save_setting_rejects_invalid_values() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.save_setting(KEY_HISTORY_CAPACITY, "0"),
            Err(AppError::ValidationError(_))
        ));
        assert!(db.save_setting(KEY_COLUMN_WARNING_THRESHOLD, "abc").is_err());
        assert!(db.save_setting("theme", "dark").is_err());
        assert_eq!(db.get_settings().unwrap(), BuilderSettings::default());
    }

    /// 测试库中已存在的非法值回退为默认值
    #[test]
    fn test_corrupt_stored_value_falls_back_to_default() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                params![KEY_HISTORY_CAPACITY, "lots"],
            )
            .unwrap();
        db.save_setting(KEY_SCHEMA_VERSION, "2.0.0").unwrap();
        let settings = db.get_settings().unwrap();
        assert_eq!(settings.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(settings.schema_version, "2.0.0");
        assert_ne!(settings.schema_version, DEFAULT_SCHEMA_VERSION);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// 保存的设置在重新打开数据库后保持不变
        #[test]
        fn prop_settings_persist_across_restarts(
            capacity in 1usize..500,
            threshold in 1usize..12,
            version in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
        ) {
            let dir = TempDir::new().unwrap();
            {
                let db = Database::init(dir.path()).unwrap();
                db.save_setting(KEY_HISTORY_CAPACITY, &capacity.to_string()).unwrap();
                db.save_setting(KEY_COLUMN_WARNING_THRESHOLD, &threshold.to_string()).unwrap();
                db.save_setting(KEY_SCHEMA_VERSION, &version).unwrap();
            }
            let db = Database::init(dir.path()).unwrap();
            let settings = db.get_settings().unwrap();
            prop_assert_eq!(settings.history_capacity, capacity);
            prop_assert_eq!(settings.column_warning_threshold, threshold);
            prop_assert_eq!(settings.schema_version, version);
        }
    }
}
