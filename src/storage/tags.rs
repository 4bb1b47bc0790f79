use rusqlite::{params, Connection, OptionalExtension};

use super::error::{OptionalExt, Result};
use super::{collect_rows, Store};
use crate::models::{Tag, TagCount};
use crate::utils::slugify;

/// 按名称查找标签，不存在时创建
pub(crate) fn get_or_create_tag(conn: &Connection, name: &str) -> Result<Tag> {
    let name = name.trim();
    let existing = conn
        .query_row(
            "SELECT id, name, slug FROM tags WHERE name = ?1",
            params![name],
            scan_tag,
        )
        .optional()?;
    if let Some(tag) = existing {
        return Ok(tag);
    }

    let base = slugify(name);
    let mut slug = base.clone();
    let mut n = 1;
    while conn
        .query_row("SELECT 1 FROM tags WHERE slug = ?1", params![slug], |_| Ok(()))
        .optional()?
        .is_some()
    {
        n += 1;
        slug = format!("{base}-{n}");
    }
    conn.execute(
        "INSERT INTO tags (name, slug) VALUES (?1, ?2)",
        params![name, slug],
    )?;
    Ok(Tag {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        slug,
    })
}

fn scan_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
    })
}

/// 替换关联表中的标签。`table` 为 post_tags 或 page_tags
pub(crate) fn set_tags(conn: &Connection, table: &str, owner_column: &str, owner_id: i64, names: &[String]) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {table} WHERE {owner_column} = ?1"),
        params![owner_id],
    )?;
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let tag = get_or_create_tag(conn, name)?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO {table} ({owner_column}, tag_id) VALUES (?1, ?2)"),
            params![owner_id, tag.id],
        )?;
    }
    Ok(())
}

pub(crate) fn tags_of(conn: &Connection, table: &str, owner_column: &str, owner_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.id, t.name, t.slug FROM tags t
         JOIN {table} x ON x.tag_id = t.id
         WHERE x.{owner_column} = ?1 ORDER BY t.name"
    ))?;
    let rows = stmt.query_map(params![owner_id], scan_tag)?;
    collect_rows(rows)
}

impl Store {
    pub fn get_tag_by_slug(&self, slug: &str) -> Result<Tag> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, slug FROM tags WHERE slug = ?1",
            params![slug],
            scan_tag,
        )
        .or_not_found("tag", slug)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, name, slug FROM tags ORDER BY name")?;
        let rows = stmt.query_map([], scan_tag)?;
        collect_rows(rows)
    }

    /// 已发布文章最多的标签（数量大于 0）
    pub fn popular_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.slug, COUNT(p.id) AS n
             FROM tags t
             JOIN post_tags pt ON pt.tag_id = t.id
             JOIN posts p ON p.id = pt.post_id AND p.status = 'published'
             GROUP BY t.id
             HAVING n > 0
             ORDER BY n DESC, t.name
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(TagCount {
                tag: scan_tag(row)?,
                post_count: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;

    #[test]
    fn tags_are_reused_by_name() {
        let store = test_support::store();
        let conn = store.lock_conn().unwrap();
        let a = get_or_create_tag(&conn, "Rust Lang").unwrap();
        let b = get_or_create_tag(&conn, " Rust Lang ").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.slug, "rust-lang");

        // 不同名称但 slug 相同时追加序号
        let c = get_or_create_tag(&conn, "rust lang").unwrap();
        assert_ne!(a.id, c.id);
        assert_eq!(c.slug, "rust-lang-2");
    }
}
