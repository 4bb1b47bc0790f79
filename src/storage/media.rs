use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, require, Store};
use crate::models::content::slug_or_title;
use crate::models::{
    CategoryRef, MediaCategory, MediaCategoryInput, MediaFilter, MediaItem, MediaItemInput,
    MediaType, PageRequest, Paginated,
};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

const ITEM_COLUMNS: &str = "m.id, m.title, m.slug, m.description, m.alt_text, m.file, m.file_type,
    m.file_size, m.width, m.height, m.uploaded_by, m.created_at, m.updated_at";

fn scan_category(row: &Row<'_>) -> rusqlite::Result<MediaCategory> {
    Ok(MediaCategory {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn scan_item(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
    Ok(MediaItem {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        alt_text: row.get(4)?,
        file: row.get(5)?,
        file_type: row.get(6)?,
        file_size: row.get(7)?,
        width: row.get(8)?,
        height: row.get(9)?,
        uploaded_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        categories: Vec::new(),
    })
}

fn categories_of(conn: &Connection, media_id: i64) -> Result<Vec<CategoryRef>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.slug FROM media_categories c
         JOIN media_item_categories x ON x.category_id = c.id
         WHERE x.media_id = ?1 ORDER BY c.name",
    )?;
    let rows = stmt.query_map(params![media_id], |row| {
        Ok(CategoryRef {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
        })
    })?;
    collect_rows(rows)
}

fn set_categories(conn: &Connection, media_id: i64, ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM media_item_categories WHERE media_id = ?1", params![media_id])?;
    for id in ids {
        conn.execute(
            "INSERT OR IGNORE INTO media_item_categories (media_id, category_id) VALUES (?1, ?2)",
            params![media_id, id],
        )?;
    }
    Ok(())
}

fn hydrate(conn: &Connection, mut item: MediaItem) -> Result<MediaItem> {
    item.categories = categories_of(conn, item.id)?;
    Ok(item)
}

fn get_item_on_conn(conn: &Connection, id: i64) -> Result<MediaItem> {
    let item = conn
        .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM media_items m WHERE m.id = ?1"),
            params![id],
            scan_item,
        )
        .or_not_found("media", id)?;
    hydrate(conn, item)
}

fn get_category_on_conn(conn: &Connection, id: i64) -> Result<MediaCategory> {
    conn.query_row(
        &format!("SELECT {CATEGORY_COLUMNS} FROM media_categories WHERE id = ?1"),
        params![id],
        scan_category,
    )
    .or_not_found("media category", id)
}

/// 上传的文件标题可能重复，slug 冲突时追加序号
fn unique_slug(conn: &Connection, base: &str, exclude: Option<i64>) -> Result<String> {
    let mut slug = base.to_string();
    let mut n = 1;
    while conn
        .query_row(
            "SELECT 1 FROM media_items WHERE slug = ?1 AND id != ?2",
            params![slug, exclude.unwrap_or(0)],
            |_| Ok(()),
        )
        .optional()?
        .is_some()
    {
        n += 1;
        slug = format!("{base}-{n}");
    }
    Ok(slug)
}

fn filter_clause(filter: &MediaFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    if let Some(file_type) = filter.file_type {
        clauses.push("m.file_type = ?");
        args.push(Value::Text(file_type.as_str().to_string()));
    }
    if let Some(slug) = &filter.category_slug {
        clauses.push(
            "m.id IN (SELECT x.media_id FROM media_item_categories x
                      JOIN media_categories c ON c.id = x.category_id WHERE c.slug = ?)",
        );
        args.push(Value::Text(slug.clone()));
    }
    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        clauses.push("(m.title LIKE ? OR m.description LIKE ? OR m.alt_text LIKE ?)");
        let pattern = format!("%{query}%");
        for _ in 0..3 {
            args.push(Value::Text(pattern.clone()));
        }
    }
    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, args)
}

impl Store {
    pub fn create_media_category(&self, input: &MediaCategoryInput) -> Result<MediaCategory> {
        require("name", &input.name)?;
        let conn = self.lock_conn()?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        conn.execute(
            "INSERT INTO media_categories (name, slug, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![input.name, slug, input.description, Utc::now()],
        )?;
        get_category_on_conn(&conn, conn.last_insert_rowid())
    }

    pub fn update_media_category(&self, id: i64, input: &MediaCategoryInput) -> Result<MediaCategory> {
        require("name", &input.name)?;
        let conn = self.lock_conn()?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let changed = conn.execute(
            "UPDATE media_categories SET name = ?1, slug = ?2, description = ?3, updated_at = ?4
             WHERE id = ?5",
            params![input.name, slug, input.description, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("media category", id));
        }
        get_category_on_conn(&conn, id)
    }

    pub fn get_media_category(&self, id: i64) -> Result<MediaCategory> {
        let conn = self.lock_conn()?;
        get_category_on_conn(&conn, id)
    }

    pub fn list_media_categories(&self) -> Result<Vec<MediaCategory>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM media_categories ORDER BY name"
        ))?;
        let rows = stmt.query_map([], scan_category)?;
        collect_rows(rows)
    }

    pub fn delete_media_category(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM media_categories WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("media category", id));
        }
        Ok(())
    }

    /// 保存媒体记录，文件类型由扩展名决定
    pub fn create_media(&self, input: &MediaItemInput, uploaded_by: Option<i64>) -> Result<MediaItem> {
        require("title", &input.title)?;
        require("file", &input.file)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let slug = unique_slug(&tx, &slug_or_title(input.slug.as_deref(), &input.title), None)?;
        let now = Utc::now();
        tx.execute(
            "INSERT INTO media_items (title, slug, description, alt_text, file, file_type, file_size,
                 width, height, uploaded_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                input.title,
                slug,
                input.description,
                input.alt_text,
                input.file,
                MediaType::from_file_name(&input.file),
                input.file_size,
                input.width,
                input.height,
                uploaded_by,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        set_categories(&tx, id, &input.category_ids)?;
        tx.commit()?;
        debug!("保存媒体文件 {} (id={})", input.file, id);
        get_item_on_conn(&conn, id)
    }

    pub fn update_media(&self, id: i64, input: &MediaItemInput) -> Result<MediaItem> {
        require("title", &input.title)?;
        require("file", &input.file)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let slug = unique_slug(&tx, &slug_or_title(input.slug.as_deref(), &input.title), Some(id))?;
        let changed = tx.execute(
            "UPDATE media_items SET title = ?1, slug = ?2, description = ?3, alt_text = ?4,
                 file = ?5, file_type = ?6, file_size = ?7, width = ?8, height = ?9, updated_at = ?10
             WHERE id = ?11",
            params![
                input.title,
                slug,
                input.description,
                input.alt_text,
                input.file,
                MediaType::from_file_name(&input.file),
                input.file_size,
                input.width,
                input.height,
                Utc::now(),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("media", id));
        }
        set_categories(&tx, id, &input.category_ids)?;
        tx.commit()?;
        get_item_on_conn(&conn, id)
    }

    pub fn get_media(&self, id: i64) -> Result<MediaItem> {
        let conn = self.lock_conn()?;
        get_item_on_conn(&conn, id)
    }

    pub fn get_media_by_slug(&self, slug: &str) -> Result<MediaItem> {
        let conn = self.lock_conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM media_items m WHERE m.slug = ?1"),
                params![slug],
                scan_item,
            )
            .or_not_found("media", slug)?;
        hydrate(&conn, item)
    }

    /// 媒体库列表，最新上传的在前
    pub fn list_media(&self, filter: &MediaFilter, request: PageRequest) -> Result<Paginated<MediaItem>> {
        let conn = self.lock_conn()?;
        let (clause, args) = filter_clause(filter);
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM media_items m {clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;
        let request = request.within(total as usize);
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_items m {clause}
             ORDER BY m.created_at DESC, m.id DESC LIMIT {} OFFSET {}",
            request.per_page,
            request.offset()
        ))?;
        let rows = stmt.query_map(params_from_iter(args.iter()), scan_item)?;
        let items = collect_rows(rows)?
            .into_iter()
            .map(|item| hydrate(&conn, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Paginated::new(items, request, total as usize))
    }

    pub fn delete_media(&self, id: i64) -> Result<MediaItem> {
        let conn = self.lock_conn()?;
        let item = get_item_on_conn(&conn, id)?;
        conn.execute("DELETE FROM media_items WHERE id = ?1", params![id])?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    fn upload(store: &Store, title: &str, file: &str) -> MediaItem {
        store
            .create_media(
                &MediaItemInput {
                    title: title.to_string(),
                    file: file.to_string(),
                    file_size: 2048,
                    ..MediaItemInput::default()
                },
                None,
            )
            .unwrap()
    }

    #[test]
    fn file_type_follows_extension() {
        let store = test_support::store();
        assert_eq!(upload(&store, "Logo", "uploads/logo.PNG").file_type, MediaType::Image);
        assert_eq!(upload(&store, "Report", "uploads/report.pdf").file_type, MediaType::Document);
        assert_eq!(upload(&store, "Data", "uploads/data.bin").file_type, MediaType::Other);
    }

    #[test]
    fn duplicate_titles_get_unique_slugs() {
        let store = test_support::store();
        let a = upload(&store, "Photo", "a.jpg");
        let b = upload(&store, "Photo", "b.jpg");
        assert_eq!(a.slug, "photo");
        assert_eq!(b.slug, "photo-2");
        assert_eq!(store.get_media_by_slug("photo-2").unwrap().id, b.id);
    }

    #[test]
    fn filters_by_type_category_and_query() {
        let store = test_support::store();
        let banners = store
            .create_media_category(&MediaCategoryInput {
                name: "Banners".to_string(),
                ..MediaCategoryInput::default()
            })
            .unwrap();
        store
            .create_media(
                &MediaItemInput {
                    title: "Summer banner".to_string(),
                    file: "summer.jpg".to_string(),
                    category_ids: vec![banners.id],
                    ..MediaItemInput::default()
                },
                None,
            )
            .unwrap();
        upload(&store, "Song", "song.mp3");
        let page = PageRequest::new(1, 20);

        let images = store
            .list_media(&MediaFilter { file_type: Some(MediaType::Image), ..MediaFilter::default() }, page)
            .unwrap();
        assert_eq!(images.total, 1);

        let in_category = store
            .list_media(&MediaFilter { category_slug: Some("banners".to_string()), ..MediaFilter::default() }, page)
            .unwrap();
        assert_eq!(in_category.items[0].categories[0].name, "Banners");

        let searched = store
            .list_media(&MediaFilter { query: Some("SONG".to_string()), ..MediaFilter::default() }, page)
            .unwrap();
        assert_eq!(searched.items[0].title, "Song");
    }
}
