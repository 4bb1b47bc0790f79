use chrono::Utc;
use rusqlite::{params, Connection, Row};

use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, require, Store};
use crate::models::content::slug_or_title;
use crate::models::{ContentRef, ContentType, Widget, WidgetArea, WidgetAreaInput, WidgetInput};

const AREA_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

const WIDGET_COLUMNS: &str = "id, title, widget_type, area_id, content, sort_order, is_active,
    content_type, object_id, settings, created_at, updated_at";

fn scan_area(row: &Row<'_>) -> rusqlite::Result<WidgetArea> {
    Ok(WidgetArea {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn scan_widget(row: &Row<'_>) -> rusqlite::Result<Widget> {
    let content_type: Option<ContentType> = row.get(7)?;
    let object_id: Option<i64> = row.get(8)?;
    Ok(Widget {
        id: row.get(0)?,
        title: row.get(1)?,
        widget_type: row.get(2)?,
        area_id: row.get(3)?,
        content: row.get(4)?,
        sort_order: row.get(5)?,
        is_active: row.get(6)?,
        target: content_type.zip(object_id).map(|(t, id)| ContentRef::new(t, id)),
        settings: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn get_area_on_conn(conn: &Connection, id: i64) -> Result<WidgetArea> {
    conn.query_row(
        &format!("SELECT {AREA_COLUMNS} FROM widget_areas WHERE id = ?1"),
        params![id],
        scan_area,
    )
    .or_not_found("widget area", id)
}

fn get_widget_on_conn(conn: &Connection, id: i64) -> Result<Widget> {
    conn.query_row(
        &format!("SELECT {WIDGET_COLUMNS} FROM widgets WHERE id = ?1"),
        params![id],
        scan_widget,
    )
    .or_not_found("widget", id)
}

fn check_widget(input: &WidgetInput) -> Result<()> {
    require("title", &input.title)?;
    if !input.settings.is_object() {
        return Err(StorageError::validation("settings 必须是 JSON 对象"));
    }
    Ok(())
}

impl Store {
    pub fn create_widget_area(&self, input: &WidgetAreaInput) -> Result<WidgetArea> {
        require("name", &input.name)?;
        let conn = self.lock_conn()?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        conn.execute(
            "INSERT INTO widget_areas (name, slug, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![input.name, slug, input.description, Utc::now()],
        )?;
        get_area_on_conn(&conn, conn.last_insert_rowid())
    }

    pub fn update_widget_area(&self, id: i64, input: &WidgetAreaInput) -> Result<WidgetArea> {
        require("name", &input.name)?;
        let conn = self.lock_conn()?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let changed = conn.execute(
            "UPDATE widget_areas SET name = ?1, slug = ?2, description = ?3, updated_at = ?4
             WHERE id = ?5",
            params![input.name, slug, input.description, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("widget area", id));
        }
        get_area_on_conn(&conn, id)
    }

    pub fn get_widget_area(&self, id: i64) -> Result<WidgetArea> {
        let conn = self.lock_conn()?;
        get_area_on_conn(&conn, id)
    }

    pub fn list_widget_areas(&self) -> Result<Vec<WidgetArea>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {AREA_COLUMNS} FROM widget_areas ORDER BY name"))?;
        let rows = stmt.query_map([], scan_area)?;
        collect_rows(rows)
    }

    pub fn delete_widget_area(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM widget_areas WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("widget area", id));
        }
        Ok(())
    }

    pub fn create_widget(&self, input: &WidgetInput) -> Result<Widget> {
        check_widget(input)?;
        let conn = self.lock_conn()?;
        get_area_on_conn(&conn, input.area_id)?;
        conn.execute(
            "INSERT INTO widgets (title, widget_type, area_id, content, sort_order, is_active,
                 content_type, object_id, settings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                input.title,
                input.widget_type,
                input.area_id,
                input.content,
                input.sort_order,
                input.is_active,
                input.target.map(|t| t.content_type),
                input.target.map(|t| t.object_id),
                input.settings,
                Utc::now(),
            ],
        )?;
        get_widget_on_conn(&conn, conn.last_insert_rowid())
    }

    pub fn update_widget(&self, id: i64, input: &WidgetInput) -> Result<Widget> {
        check_widget(input)?;
        let conn = self.lock_conn()?;
        get_area_on_conn(&conn, input.area_id)?;
        let changed = conn.execute(
            "UPDATE widgets SET title = ?1, widget_type = ?2, area_id = ?3, content = ?4,
                 sort_order = ?5, is_active = ?6, content_type = ?7, object_id = ?8,
                 settings = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                input.title,
                input.widget_type,
                input.area_id,
                input.content,
                input.sort_order,
                input.is_active,
                input.target.map(|t| t.content_type),
                input.target.map(|t| t.object_id),
                input.settings,
                Utc::now(),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("widget", id));
        }
        get_widget_on_conn(&conn, id)
    }

    pub fn get_widget(&self, id: i64) -> Result<Widget> {
        let conn = self.lock_conn()?;
        get_widget_on_conn(&conn, id)
    }

    pub fn list_widgets(&self) -> Result<Vec<Widget>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WIDGET_COLUMNS} FROM widgets ORDER BY area_id, sort_order, id"
        ))?;
        let rows = stmt.query_map([], scan_widget)?;
        collect_rows(rows)
    }

    /// 区域内激活的小部件，按顺序排列
    pub fn active_widgets(&self, area_id: i64) -> Result<Vec<Widget>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WIDGET_COLUMNS} FROM widgets WHERE area_id = ?1 AND is_active = 1
             ORDER BY sort_order, id"
        ))?;
        let rows = stmt.query_map(params![area_id], scan_widget)?;
        collect_rows(rows)
    }

    pub fn delete_widget(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM widgets WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("widget", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::models::WidgetType;
    use serde_json::json;

    #[test]
    fn active_widgets_in_order() {
        let store = test_support::store();
        store.seed_defaults().unwrap();
        let sidebar = store
            .list_widget_areas()
            .unwrap()
            .into_iter()
            .find(|a| a.slug == "sidebar")
            .unwrap();

        let make = |title: &str, sort_order: i64, is_active: bool| WidgetInput {
            title: title.to_string(),
            area_id: sidebar.id,
            sort_order,
            is_active,
            ..WidgetInput::default()
        };
        store.create_widget(&make("second", 2, true)).unwrap();
        store.create_widget(&make("first", 1, true)).unwrap();
        store.create_widget(&make("off", 0, false)).unwrap();

        let titles: Vec<_> = store
            .active_widgets(sidebar.id)
            .unwrap()
            .into_iter()
            .map(|w| w.title)
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn settings_and_target_round_trip() {
        let store = test_support::store();
        let area = store
            .create_widget_area(&WidgetAreaInput {
                name: "Hero Area".to_string(),
                ..WidgetAreaInput::default()
            })
            .unwrap();
        let widget = store
            .create_widget(&WidgetInput {
                title: "Latest".to_string(),
                widget_type: WidgetType::RecentPosts,
                area_id: area.id,
                target: Some(ContentRef::new(ContentType::Category, 7)),
                settings: json!({"count": 2}),
                ..WidgetInput::default()
            })
            .unwrap();
        assert_eq!(widget.count(), 2);
        assert_eq!(widget.target.unwrap().object_id, 7);

        let err = store
            .create_widget(&WidgetInput {
                title: "Bad".to_string(),
                area_id: area.id,
                settings: json!([1, 2]),
                ..WidgetInput::default()
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));

        store.delete_widget_area(area.id).unwrap();
        assert!(store.get_widget(widget.id).unwrap_err().is_not_found());
    }
}
