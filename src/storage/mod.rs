//! SQLite 存储层。`Store` 按领域拆分在各个子模块的 `impl` 块中。

mod categories;
mod comments;
pub mod error;
mod media;
mod navigation;
mod newsletter;
mod pages;
mod posts;
pub mod schema;
mod search;
mod tags;
mod themes;
mod users;
mod widgets;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::models::{
    CommentStatus, ContentType, MediaType, MenuItemType, MenuLocation, NewsletterStatus,
    PublishStatus, Seo, TemplateKind, Theme, WidgetType,
};

pub use error::{Result, StorageError};
pub use search::{SearchHit, SearchResults};

/// 数据存储
pub struct Store {
    conn: Mutex<Connection>,
    /// 当前激活主题的缓存，写主题时失效
    theme_cache: RwLock<Option<Theme>>,
}

impl Store {
    /// 打开（或创建）数据库文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("打开数据库: {}", path.display());
        let conn = Connection::open(path).map_err(|e| {
            StorageError::Connection(format!("无法打开 {}: {e}", path.display()))
        })?;
        Self::with_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self> {
        debug!("打开内存数据库");
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("无法打开内存数据库: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StorageError::Connection(format!("设置 PRAGMA 失败: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
            theme_cache: RwLock::new(None),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version >= schema::SCHEMA_VERSION {
            debug!("数据库结构已是最新版本 {}", version);
            return Ok(());
        }

        for (name, ddl) in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(ddl).map_err(|e| StorageError::Migration {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        }
        conn.execute_batch(&format!("PRAGMA user_version = {}", schema::SCHEMA_VERSION))?;

        info!("数据库结构初始化完成 (版本 {})", schema::SCHEMA_VERSION);
        Ok(())
    }

    /// 写入默认主题、页面模板和小部件区域（可重复执行）
    pub fn seed_defaults(&self) -> Result<()> {
        self.active_theme()?;
        let conn = self.lock_conn()?;
        for (name, slug, template) in schema::DEFAULT_PAGE_TEMPLATES {
            conn.execute(
                "INSERT OR IGNORE INTO page_templates (name, slug, template) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, slug, template],
            )?;
        }
        let now = chrono::Utc::now();
        for (name, slug) in schema::DEFAULT_WIDGET_AREAS {
            conn.execute(
                "INSERT OR IGNORE INTO widget_areas (name, slug, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                rusqlite::params![name, slug, now],
            )?;
        }
        Ok(())
    }

    pub(crate) fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Connection(format!("数据库锁已损坏: {e}")))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

/// 以文本形式存储的枚举
macro_rules! sql_text_enum {
    ($($name:ty),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_text_enum!(
    PublishStatus,
    ContentType,
    CommentStatus,
    TemplateKind,
    MenuLocation,
    MenuItemType,
    WidgetType,
    NewsletterStatus,
    MediaType,
);

/// 生成 `?, ?, ?` 形式的占位符
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// 逐行收集查询结果
pub(crate) fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// 批量更新的参数：前置参数后接 ID 列表（SQL 中用 `IN (?, ?, ...)`）
pub(crate) fn with_ids<'a>(mut head: Vec<&'a dyn ToSql>, ids: &'a [i64]) -> Vec<&'a dyn ToSql> {
    head.extend(ids.iter().map(|id| id as &dyn ToSql));
    head
}

/// SEO 字段对应的列，顺序与 `scan_seo` 一致
pub(crate) const SEO_COLUMNS: &str =
    "meta_title, meta_description, meta_keywords, canonical_url, og_title, og_description, og_image";

pub(crate) fn scan_seo(row: &rusqlite::Row<'_>, start: usize) -> rusqlite::Result<Seo> {
    Ok(Seo {
        meta_title: row.get(start)?,
        meta_description: row.get(start + 1)?,
        meta_keywords: row.get(start + 2)?,
        canonical_url: row.get(start + 3)?,
        og_title: row.get(start + 4)?,
        og_description: row.get(start + 5)?,
        og_image: row.get(start + 6)?,
    })
}

/// 按 `SEO_COLUMNS` 的顺序展开 SEO 参数
pub(crate) fn seo_params(seo: &Seo) -> [&dyn ToSql; 7] {
    [
        &seo.meta_title,
        &seo.meta_description,
        &seo.meta_keywords,
        &seo.canonical_url,
        &seo.og_title,
        &seo.og_description,
        &seo.og_image,
    ]
}

/// 名称必填校验
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(StorageError::validation(format!("{field} 不能为空")))
    } else {
        Ok(())
    }
}
