use std::collections::HashSet;

use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::comments::delete_comments_for_target;
use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, require, scan_seo, seo_params, Store, SEO_COLUMNS};
use crate::models::content::slug_or_title;
use crate::models::{Category, CategoryCount, CategoryInput, CategoryRef, ContentRef, ContentType};

fn columns() -> String {
    format!(
        "id, name, slug, description, featured_image, parent_id, sort_order, {SEO_COLUMNS},
         created_at, updated_at"
    )
}

fn scan_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        featured_image: row.get(4)?,
        parent_id: row.get(5)?,
        sort_order: row.get(6)?,
        seo: scan_seo(row, 7)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn get_category_on_conn(conn: &Connection, id: i64) -> Result<Category> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE id = ?1", columns()),
        params![id],
        scan_category,
    )
    .or_not_found("category", id)
}

fn query_categories(conn: &Connection, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories {filter} ORDER BY sort_order, name",
        columns()
    ))?;
    let rows = stmt.query_map(args, scan_category)?;
    collect_rows(rows)
}

/// 读取关联表中的分类。`table` 为 post_categories 或 page_categories
pub(crate) fn categories_of(conn: &Connection, table: &str, owner_column: &str, owner_id: i64) -> Result<Vec<CategoryRef>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT c.id, c.name, c.slug FROM categories c
         JOIN {table} x ON x.category_id = c.id
         WHERE x.{owner_column} = ?1 ORDER BY c.sort_order, c.name"
    ))?;
    let rows = stmt.query_map(params![owner_id], |row| {
        Ok(CategoryRef {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
        })
    })?;
    collect_rows(rows)
}

pub(crate) fn set_categories(conn: &Connection, table: &str, owner_column: &str, owner_id: i64, ids: &[i64]) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {table} WHERE {owner_column} = ?1"),
        params![owner_id],
    )?;
    for id in ids {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {table} ({owner_column}, category_id) VALUES (?1, ?2)"),
            params![owner_id, id],
        )?;
    }
    Ok(())
}

/// 按名称查找分类，不存在时创建（导入文章时使用）
pub(crate) fn get_or_create_category(conn: &Connection, name: &str) -> Result<i64> {
    let slug = crate::utils::slugify(name);
    let existing = conn
        .query_row(
            "SELECT id FROM categories WHERE slug = ?1",
            params![slug],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let now = Utc::now();
    conn.execute(
        "INSERT INTO categories (name, slug, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![name.trim(), slug, now],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    pub fn create_category(&self, input: &CategoryInput) -> Result<Category> {
        require("name", &input.name)?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let now = Utc::now();
        let conn = self.lock_conn()?;

        let mut args: Vec<&dyn ToSql> = vec![
            &input.name,
            &slug,
            &input.description,
            &input.featured_image,
            &input.parent_id,
            &input.sort_order,
        ];
        args.extend(seo_params(&input.seo));
        args.push(&now);
        conn.execute(
            &format!(
                "INSERT INTO categories (name, slug, description, featured_image, parent_id,
                     sort_order, {SEO_COLUMNS}, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)"
            ),
            &*args,
        )?;
        let id = conn.last_insert_rowid();
        debug!("创建分类 {} (id={})", slug, id);
        get_category_on_conn(&conn, id)
    }

    pub fn update_category(&self, id: i64, input: &CategoryInput) -> Result<Category> {
        require("name", &input.name)?;
        if let Some(parent_id) = input.parent_id {
            if parent_id == id || self.descendants(id)?.iter().any(|c| c.id == parent_id) {
                return Err(StorageError::validation("分类不能成为自己子分类的子分类"));
            }
        }
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let now = Utc::now();
        let conn = self.lock_conn()?;

        let mut args: Vec<&dyn ToSql> = vec![
            &input.name,
            &slug,
            &input.description,
            &input.featured_image,
            &input.parent_id,
            &input.sort_order,
        ];
        args.extend(seo_params(&input.seo));
        args.push(&now);
        args.push(&id);
        let changed = conn.execute(
            "UPDATE categories SET name = ?1, slug = ?2, description = ?3, featured_image = ?4,
                 parent_id = ?5, sort_order = ?6, meta_title = ?7, meta_description = ?8,
                 meta_keywords = ?9, canonical_url = ?10, og_title = ?11, og_description = ?12,
                 og_image = ?13, updated_at = ?14
             WHERE id = ?15",
            &*args,
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("category", id));
        }
        get_category_on_conn(&conn, id)
    }

    pub fn get_category(&self, id: i64) -> Result<Category> {
        let conn = self.lock_conn()?;
        get_category_on_conn(&conn, id)
    }

    pub fn get_category_by_slug(&self, slug: &str) -> Result<Category> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM categories WHERE slug = ?1", columns()),
            params![slug],
            scan_category,
        )
        .or_not_found("category", slug)
    }

    /// 所有分类，按排序值和名称
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.lock_conn()?;
        query_categories(&conn, "", &[])
    }

    /// 顶级分类
    pub fn top_level_categories(&self) -> Result<Vec<Category>> {
        let conn = self.lock_conn()?;
        query_categories(&conn, "WHERE parent_id IS NULL", &[])
    }

    pub fn child_categories(&self, id: i64) -> Result<Vec<Category>> {
        let conn = self.lock_conn()?;
        query_categories(&conn, "WHERE parent_id = ?1", &[&id])
    }

    /// 祖先分类，根分类在前
    pub fn ancestors(&self, category: &Category) -> Result<Vec<Category>> {
        let conn = self.lock_conn()?;
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([category.id]);
        let mut parent_id = category.parent_id;
        while let Some(id) = parent_id {
            if !seen.insert(id) {
                break;
            }
            let parent = get_category_on_conn(&conn, id)?;
            parent_id = parent.parent_id;
            ancestors.push(parent);
        }
        ancestors.reverse();
        Ok(ancestors)
    }

    /// 所有后代分类（深度优先）
    pub fn descendants(&self, id: i64) -> Result<Vec<Category>> {
        let conn = self.lock_conn()?;
        let mut result = Vec::new();
        let mut seen = HashSet::from([id]);
        collect_descendants(&conn, id, &mut seen, &mut result)?;
        Ok(result)
    }

    /// 已发布文章最多的分类（数量大于 0）
    pub fn popular_categories(&self, limit: usize) -> Result<Vec<CategoryCount>> {
        let conn = self.lock_conn()?;
        let cols = columns()
            .split(',')
            .map(|c| format!("c.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {cols}, COUNT(p.id) AS n
             FROM categories c
             JOIN post_categories pc ON pc.category_id = c.id
             JOIN posts p ON p.id = pc.post_id AND p.status = 'published'
             GROUP BY c.id
             HAVING n > 0
             ORDER BY n DESC, c.name
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(CategoryCount {
                category: scan_category(row)?,
                post_count: row.get(16)?,
            })
        })?;
        collect_rows(rows)
    }

    /// 删除分类及指向它的评论
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        if tx.execute("DELETE FROM categories WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("category", id));
        }
        delete_comments_for_target(&tx, ContentRef::new(ContentType::Category, id))?;
        tx.commit()?;
        Ok(())
    }
}

fn collect_descendants(conn: &Connection, id: i64, seen: &mut HashSet<i64>, out: &mut Vec<Category>) -> Result<()> {
    for child in query_categories(conn, "WHERE parent_id = ?1", &[&id])? {
        if !seen.insert(child.id) {
            continue;
        }
        let child_id = child.id;
        out.push(child);
        collect_descendants(conn, child_id, seen, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    fn category(store: &Store, name: &str, parent_id: Option<i64>) -> Category {
        store
            .create_category(&CategoryInput {
                name: name.to_string(),
                parent_id,
                ..CategoryInput::default()
            })
            .unwrap()
    }

    #[test]
    fn slug_derived_and_unique() {
        let store = test_support::store();
        let news = category(&store, "Breaking News", None);
        assert_eq!(news.slug, "breaking-news");
        assert_eq!(news.url(), "/categories/breaking-news/");

        let err = store
            .create_category(&CategoryInput {
                name: "Other".to_string(),
                slug: Some("breaking-news".to_string()),
                ..CategoryInput::default()
            })
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn tree_navigation() {
        let store = test_support::store();
        let root = category(&store, "Root", None);
        let a = category(&store, "A", Some(root.id));
        let a1 = category(&store, "A1", Some(a.id));
        let b = category(&store, "B", Some(root.id));

        let ancestors = store.ancestors(&a1).unwrap();
        assert_eq!(
            ancestors.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![root.id, a.id]
        );

        let descendants = store.descendants(root.id).unwrap();
        assert_eq!(
            descendants.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![a.id, a1.id, b.id]
        );

        assert_eq!(store.top_level_categories().unwrap().len(), 1);
        assert_eq!(store.child_categories(root.id).unwrap().len(), 2);
    }

    #[test]
    fn parent_cannot_be_descendant() {
        let store = test_support::store();
        let root = category(&store, "Root", None);
        let child = category(&store, "Child", Some(root.id));
        let err = store
            .update_category(
                root.id,
                &CategoryInput {
                    name: "Root".to_string(),
                    parent_id: Some(child.id),
                    ..CategoryInput::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[test]
    fn deleting_parent_orphans_children() {
        let store = test_support::store();
        let root = category(&store, "Root", None);
        let child = category(&store, "Child", Some(root.id));
        store.delete_category(root.id).unwrap();
        assert_eq!(store.get_category(child.id).unwrap().parent_id, None);
        assert!(store.get_category(root.id).unwrap_err().is_not_found());
    }
}
