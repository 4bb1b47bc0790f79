use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, require, Store};
use crate::models::content::slug_or_title;
use crate::models::{Menu, MenuInput, MenuItem, MenuItemInput, MenuItemType, MenuLocation, MenuTree};

const MENU_COLUMNS: &str = "id, name, slug, description, location, created_at, updated_at";

const ITEM_COLUMNS: &str = "i.id, i.menu_id, i.title, i.item_type, i.page_id, i.category_id,
    i.url, i.target_blank, i.parent_id, i.sort_order, p.slug, p.is_homepage, c.slug,
    i.created_at, i.updated_at";

const ITEM_FROM: &str = "menu_items i
    LEFT JOIN pages p ON p.id = i.page_id
    LEFT JOIN categories c ON c.id = i.category_id";

fn scan_menu(row: &Row<'_>) -> rusqlite::Result<Menu> {
    Ok(Menu {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn scan_item(row: &Row<'_>) -> rusqlite::Result<MenuItem> {
    Ok(MenuItem {
        id: row.get(0)?,
        menu_id: row.get(1)?,
        title: row.get(2)?,
        item_type: row.get(3)?,
        page_id: row.get(4)?,
        category_id: row.get(5)?,
        url: row.get(6)?,
        target_blank: row.get(7)?,
        parent_id: row.get(8)?,
        sort_order: row.get(9)?,
        page_slug: row.get(10)?,
        page_is_homepage: row.get(11)?,
        category_slug: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn get_menu_on_conn(conn: &Connection, id: i64) -> Result<Menu> {
    conn.query_row(
        &format!("SELECT {MENU_COLUMNS} FROM menus WHERE id = ?1"),
        params![id],
        scan_menu,
    )
    .or_not_found("menu", id)
}

fn get_item_on_conn(conn: &Connection, id: i64) -> Result<MenuItem> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM {ITEM_FROM} WHERE i.id = ?1"),
        params![id],
        scan_item,
    )
    .or_not_found("menu item", id)
}

fn items_of(conn: &Connection, menu_id: i64) -> Result<Vec<MenuItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM {ITEM_FROM} WHERE i.menu_id = ?1 ORDER BY i.sort_order, i.id"
    ))?;
    let rows = stmt.query_map(params![menu_id], scan_item)?;
    collect_rows(rows)
}

/// 类型化的菜单项必须指向对应的记录；父项必须在同一菜单中
fn check_item(conn: &Connection, id: Option<i64>, input: &MenuItemInput) -> Result<()> {
    require("title", &input.title)?;
    match input.item_type {
        MenuItemType::Page if input.page_id.is_none() => {
            return Err(StorageError::validation("页面类型的菜单项需要指定页面"));
        }
        MenuItemType::Category if input.category_id.is_none() => {
            return Err(StorageError::validation("分类类型的菜单项需要指定分类"));
        }
        _ => {}
    }
    if let Some(parent_id) = input.parent_id {
        if Some(parent_id) == id {
            return Err(StorageError::validation("菜单项不能以自己为父项"));
        }
        let parent_menu: Option<i64> = conn
            .query_row(
                "SELECT menu_id FROM menu_items WHERE id = ?1",
                params![parent_id],
                |row| row.get(0),
            )
            .optional()?;
        if parent_menu != Some(input.menu_id) {
            return Err(StorageError::validation("父菜单项不属于同一菜单"));
        }
    }
    Ok(())
}

impl Store {
    pub fn create_menu(&self, input: &MenuInput) -> Result<Menu> {
        require("name", &input.name)?;
        let conn = self.lock_conn()?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        conn.execute(
            "INSERT INTO menus (name, slug, description, location, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![input.name, slug, input.description, input.location, Utc::now()],
        )?;
        get_menu_on_conn(&conn, conn.last_insert_rowid())
    }

    pub fn update_menu(&self, id: i64, input: &MenuInput) -> Result<Menu> {
        require("name", &input.name)?;
        let conn = self.lock_conn()?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let changed = conn.execute(
            "UPDATE menus SET name = ?1, slug = ?2, description = ?3, location = ?4, updated_at = ?5
             WHERE id = ?6",
            params![input.name, slug, input.description, input.location, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("menu", id));
        }
        get_menu_on_conn(&conn, id)
    }

    pub fn get_menu(&self, id: i64) -> Result<Menu> {
        let conn = self.lock_conn()?;
        get_menu_on_conn(&conn, id)
    }

    pub fn list_menus(&self) -> Result<Vec<Menu>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {MENU_COLUMNS} FROM menus ORDER BY name"))?;
        let rows = stmt.query_map([], scan_menu)?;
        collect_rows(rows)
    }

    pub fn delete_menu(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM menus WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("menu", id));
        }
        Ok(())
    }

    /// 某个位置的第一个菜单（按创建顺序），解析成树
    pub fn menu_for_location(&self, location: MenuLocation) -> Result<Option<MenuTree>> {
        let conn = self.lock_conn()?;
        let menu = conn
            .query_row(
                &format!("SELECT {MENU_COLUMNS} FROM menus WHERE location = ?1 ORDER BY id LIMIT 1"),
                params![location],
                scan_menu,
            )
            .optional()?;
        match menu {
            Some(menu) => {
                let items = items_of(&conn, menu.id)?;
                Ok(Some(MenuTree::build(&menu, &items)))
            }
            None => Ok(None),
        }
    }

    pub fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem> {
        let conn = self.lock_conn()?;
        get_menu_on_conn(&conn, input.menu_id)?;
        check_item(&conn, None, input)?;
        conn.execute(
            "INSERT INTO menu_items (menu_id, title, item_type, page_id, category_id, url,
                 target_blank, parent_id, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                input.menu_id,
                input.title,
                input.item_type,
                input.page_id,
                input.category_id,
                input.url,
                input.target_blank,
                input.parent_id,
                input.sort_order,
                Utc::now(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("菜单 {} 新增菜单项 {}", input.menu_id, id);
        get_item_on_conn(&conn, id)
    }

    pub fn update_menu_item(&self, id: i64, input: &MenuItemInput) -> Result<MenuItem> {
        let conn = self.lock_conn()?;
        get_item_on_conn(&conn, id)?;
        get_menu_on_conn(&conn, input.menu_id)?;
        check_item(&conn, Some(id), input)?;
        conn.execute(
            "UPDATE menu_items SET menu_id = ?1, title = ?2, item_type = ?3, page_id = ?4,
                 category_id = ?5, url = ?6, target_blank = ?7, parent_id = ?8, sort_order = ?9,
                 updated_at = ?10
             WHERE id = ?11",
            params![
                input.menu_id,
                input.title,
                input.item_type,
                input.page_id,
                input.category_id,
                input.url,
                input.target_blank,
                input.parent_id,
                input.sort_order,
                Utc::now(),
                id,
            ],
        )?;
        get_item_on_conn(&conn, id)
    }

    pub fn get_menu_item(&self, id: i64) -> Result<MenuItem> {
        let conn = self.lock_conn()?;
        get_item_on_conn(&conn, id)
    }

    /// 菜单项列表，可按菜单过滤
    pub fn list_menu_items(&self, menu_id: Option<i64>) -> Result<Vec<MenuItem>> {
        let conn = self.lock_conn()?;
        match menu_id {
            Some(menu_id) => items_of(&conn, menu_id),
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM {ITEM_FROM} ORDER BY i.menu_id, i.sort_order, i.id"
                ))?;
                let rows = stmt.query_map([], scan_item)?;
                collect_rows(rows)
            }
        }
    }

    pub fn delete_menu_item(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM menu_items WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("menu item", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::models::{PageInput, Publication, PublishStatus};

    fn item(menu_id: i64, title: &str, parent_id: Option<i64>, sort_order: i64) -> MenuItemInput {
        MenuItemInput {
            menu_id,
            title: title.to_string(),
            url: format!("/{}/", title.to_lowercase()),
            parent_id,
            sort_order,
            ..MenuItemInput::default()
        }
    }

    #[test]
    fn location_menu_resolves_tree() {
        let store = test_support::store();
        let menu = store
            .create_menu(&MenuInput {
                name: "Main Menu".to_string(),
                ..MenuInput::default()
            })
            .unwrap();
        assert_eq!(menu.slug, "main-menu");

        let page = store
            .create_page(&PageInput {
                title: "About".to_string(),
                publication: Publication {
                    status: PublishStatus::Published,
                    published_at: None,
                },
                ..PageInput::default()
            })
            .unwrap();
        let top = store.create_menu_item(&item(menu.id, "Blog", None, 2)).unwrap();
        store
            .create_menu_item(&MenuItemInput {
                item_type: MenuItemType::Page,
                page_id: Some(page.id),
                ..item(menu.id, "About", None, 1)
            })
            .unwrap();
        store.create_menu_item(&item(menu.id, "Archive", Some(top.id), 0)).unwrap();

        let tree = store.menu_for_location(MenuLocation::Header).unwrap().unwrap();
        let titles: Vec<_> = tree.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["About", "Blog"]);
        assert_eq!(tree.items[0].url, "/page/about/");
        assert_eq!(tree.items[1].children[0].url, "/archive/");
        assert!(store.menu_for_location(MenuLocation::Footer).unwrap().is_none());
    }

    #[test]
    fn typed_items_need_a_target() {
        let store = test_support::store();
        let menu = store
            .create_menu(&MenuInput {
                name: "Footer".to_string(),
                location: MenuLocation::Footer,
                ..MenuInput::default()
            })
            .unwrap();
        let err = store
            .create_menu_item(&MenuItemInput {
                item_type: MenuItemType::Category,
                ..item(menu.id, "Cat", None, 0)
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[test]
    fn deleting_menu_cascades_items() {
        let store = test_support::store();
        let menu = store
            .create_menu(&MenuInput {
                name: "Side".to_string(),
                ..MenuInput::default()
            })
            .unwrap();
        store.create_menu_item(&item(menu.id, "One", None, 0)).unwrap();
        store.delete_menu(menu.id).unwrap();
        assert!(store.list_menu_items(None).unwrap().is_empty());
    }
}
