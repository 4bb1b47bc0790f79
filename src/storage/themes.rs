use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, require, Store};
use crate::models::content::slug_or_title;
use crate::models::theme::DEFAULT_THEME_NAME;
use crate::models::{Theme, ThemeInput};

const THEME_COLUMNS: &str = "id, name, slug, description, is_active, primary_color,
    secondary_color, accent_color, font_family, heading_font_family, container_width,
    custom_css, custom_js, logo, favicon, created_at, updated_at";

fn scan_theme(row: &Row<'_>) -> rusqlite::Result<Theme> {
    Ok(Theme {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get(4)?,
        primary_color: row.get(5)?,
        secondary_color: row.get(6)?,
        accent_color: row.get(7)?,
        font_family: row.get(8)?,
        heading_font_family: row.get(9)?,
        container_width: row.get(10)?,
        custom_css: row.get(11)?,
        custom_js: row.get(12)?,
        logo: row.get(13)?,
        favicon: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn get_theme_on_conn(conn: &Connection, id: i64) -> Result<Theme> {
    conn.query_row(
        &format!("SELECT {THEME_COLUMNS} FROM themes WHERE id = ?1"),
        params![id],
        scan_theme,
    )
    .or_not_found("theme", id)
}

/// 保存主题；激活时同时取消其他主题的激活状态
fn save_theme(conn: &Connection, id: Option<i64>, input: &ThemeInput) -> Result<i64> {
    require("name", &input.name)?;
    let slug = slug_or_title(input.slug.as_deref(), &input.name);
    let now = Utc::now();
    if input.is_active {
        conn.execute(
            "UPDATE themes SET is_active = 0 WHERE is_active = 1 AND id != ?1",
            params![id.unwrap_or(0)],
        )?;
    }
    let mut values: Vec<&dyn ToSql> = vec![
        &input.name,
        &slug,
        &input.description,
        &input.is_active,
        &input.primary_color,
        &input.secondary_color,
        &input.accent_color,
        &input.font_family,
        &input.heading_font_family,
        &input.container_width,
        &input.custom_css,
        &input.custom_js,
        &input.logo,
        &input.favicon,
        &now,
    ];
    match id {
        None => {
            conn.execute(
                "INSERT INTO themes (name, slug, description, is_active, primary_color,
                     secondary_color, accent_color, font_family, heading_font_family,
                     container_width, custom_css, custom_js, logo, favicon, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                &*values,
            )?;
            Ok(conn.last_insert_rowid())
        }
        Some(id) => {
            values.push(&id);
            let changed = conn.execute(
                "UPDATE themes SET name = ?1, slug = ?2, description = ?3, is_active = ?4,
                     primary_color = ?5, secondary_color = ?6, accent_color = ?7,
                     font_family = ?8, heading_font_family = ?9, container_width = ?10,
                     custom_css = ?11, custom_js = ?12, logo = ?13, favicon = ?14, updated_at = ?15
                 WHERE id = ?16",
                &*values,
            )?;
            if changed == 0 {
                return Err(StorageError::not_found("theme", id));
            }
            Ok(id)
        }
    }
}

impl Store {
    pub fn create_theme(&self, input: &ThemeInput) -> Result<Theme> {
        let theme = {
            let mut conn = self.lock_conn()?;
            let tx = conn.transaction()?;
            let id = save_theme(&tx, None, input)?;
            tx.commit()?;
            get_theme_on_conn(&conn, id)?
        };
        self.invalidate_theme_cache();
        info!("创建主题: {}", theme.name);
        Ok(theme)
    }

    pub fn update_theme(&self, id: i64, input: &ThemeInput) -> Result<Theme> {
        let theme = {
            let mut conn = self.lock_conn()?;
            let tx = conn.transaction()?;
            save_theme(&tx, Some(id), input)?;
            tx.commit()?;
            get_theme_on_conn(&conn, id)?
        };
        self.invalidate_theme_cache();
        Ok(theme)
    }

    /// 激活指定主题，其他主题全部取消激活
    pub fn activate_theme(&self, id: i64) -> Result<Theme> {
        let theme = {
            let mut conn = self.lock_conn()?;
            let tx = conn.transaction()?;
            get_theme_on_conn(&tx, id)?;
            tx.execute("UPDATE themes SET is_active = (id = ?1), updated_at = ?2", params![id, Utc::now()])?;
            tx.commit()?;
            get_theme_on_conn(&conn, id)?
        };
        self.invalidate_theme_cache();
        info!("激活主题: {}", theme.name);
        Ok(theme)
    }

    pub fn get_theme(&self, id: i64) -> Result<Theme> {
        let conn = self.lock_conn()?;
        get_theme_on_conn(&conn, id)
    }

    pub fn list_themes(&self) -> Result<Vec<Theme>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {THEME_COLUMNS} FROM themes ORDER BY name"))?;
        let rows = stmt.query_map([], scan_theme)?;
        collect_rows(rows)
    }

    pub fn delete_theme(&self, id: i64) -> Result<()> {
        {
            let conn = self.lock_conn()?;
            if conn.execute("DELETE FROM themes WHERE id = ?1", params![id])? == 0 {
                return Err(StorageError::not_found("theme", id));
            }
        }
        self.invalidate_theme_cache();
        Ok(())
    }

    /// 当前主题：缓存 > 激活的主题 > 第一个主题 > 新建默认主题
    pub fn active_theme(&self) -> Result<Theme> {
        if let Ok(cache) = self.theme_cache.read() {
            if let Some(theme) = cache.as_ref() {
                return Ok(theme.clone());
            }
        }

        let existing = {
            let conn = self.lock_conn()?;
            let active = conn
                .query_row(
                    &format!("SELECT {THEME_COLUMNS} FROM themes WHERE is_active = 1 ORDER BY id LIMIT 1"),
                    [],
                    scan_theme,
                )
                .optional()?;
            match active {
                Some(theme) => Some(theme),
                None => conn
                    .query_row(
                        &format!("SELECT {THEME_COLUMNS} FROM themes ORDER BY id LIMIT 1"),
                        [],
                        scan_theme,
                    )
                    .optional()?,
            }
        };

        let theme = match existing {
            Some(theme) => theme,
            None => {
                debug!("没有主题，创建默认主题");
                self.create_theme(&ThemeInput {
                    is_active: true,
                    ..ThemeInput::named(DEFAULT_THEME_NAME)
                })?
            }
        };

        match self.theme_cache.write() {
            Ok(mut cache) => *cache = Some(theme.clone()),
            Err(e) => warn!("主题缓存不可用: {e}"),
        }
        Ok(theme)
    }

    fn invalidate_theme_cache(&self) {
        match self.theme_cache.write() {
            Ok(mut cache) => *cache = None,
            Err(e) => warn!("主题缓存不可用: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    #[test]
    fn default_theme_created_on_demand() {
        let store = test_support::store();
        let theme = store.active_theme().unwrap();
        assert_eq!(theme.name, DEFAULT_THEME_NAME);
        assert!(theme.is_active);
        assert_eq!(theme.primary_color, "#3490dc");
        assert_eq!(theme.font_family, "'Inter', sans-serif");
        // 第二次读取走缓存，不会重复创建
        store.active_theme().unwrap();
        assert_eq!(store.list_themes().unwrap().len(), 1);
    }

    #[test]
    fn only_one_active_theme() {
        let store = test_support::store();
        let first = store
            .create_theme(&ThemeInput {
                is_active: true,
                ..ThemeInput::named("Light")
            })
            .unwrap();
        assert_eq!(store.active_theme().unwrap().id, first.id);

        let second = store
            .create_theme(&ThemeInput {
                is_active: true,
                ..ThemeInput::named("Dark")
            })
            .unwrap();
        // 写入后缓存失效
        assert_eq!(store.active_theme().unwrap().id, second.id);
        assert!(!store.get_theme(first.id).unwrap().is_active);

        store.activate_theme(first.id).unwrap();
        let active: Vec<_> = store.list_themes().unwrap().into_iter().filter(|t| t.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, first.id);
    }

    #[test]
    fn falls_back_to_first_theme() {
        let store = test_support::store();
        let theme = store.create_theme(&ThemeInput::named("Plain")).unwrap();
        assert!(!theme.is_active);
        assert_eq!(store.active_theme().unwrap().id, theme.id);
    }

    #[test]
    fn duplicate_slug_is_conflict() {
        let store = test_support::store();
        store.create_theme(&ThemeInput::named("Same")).unwrap();
        let err = store.create_theme(&ThemeInput::named("Same")).unwrap_err();
        assert!(err.is_conflict());
    }
}
