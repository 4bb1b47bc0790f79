use chrono::Utc;
use rusqlite::types::{ToSql, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::categories::{categories_of, set_categories};
use super::comments::delete_comments_for_target;
use super::error::{OptionalExt, Result, StorageError};
use super::tags::{set_tags, tags_of};
use super::{collect_rows, placeholders, require, scan_seo, seo_params, with_ids, Store, SEO_COLUMNS};
use crate::models::content::slug_or_title;
use crate::models::{
    ContentRef, ContentType, Page, PageInput, PageRequest, PageTemplate, PageTemplateInput,
    Paginated, Publication, PublishStatus,
};

const PAGE_COLUMNS: &str = "p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image,
    p.template_id, t.template, p.parent_id, p.sort_order, p.is_homepage, p.status, p.published_at,
    p.meta_title, p.meta_description, p.meta_keywords, p.canonical_url, p.og_title,
    p.og_description, p.og_image, p.created_at, p.updated_at";

const PAGE_FROM: &str = "pages p LEFT JOIN page_templates t ON t.id = p.template_id";

fn scan_page(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        featured_image: row.get(5)?,
        template_id: row.get(6)?,
        template_kind: row.get(7)?,
        parent_id: row.get(8)?,
        sort_order: row.get(9)?,
        is_homepage: row.get(10)?,
        publication: Publication {
            status: row.get(11)?,
            published_at: row.get(12)?,
        },
        seo: scan_seo(row, 13)?,
        tags: Vec::new(),
        categories: Vec::new(),
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

/// 补齐标签和分类
fn hydrate(conn: &Connection, mut page: Page) -> Result<Page> {
    page.tags = tags_of(conn, "page_tags", "page_id", page.id)?;
    page.categories = categories_of(conn, "page_categories", "page_id", page.id)?;
    Ok(page)
}

fn query_pages(
    conn: &Connection,
    filter: &str,
    order: &str,
    args: &[Value],
    page: Option<PageRequest>,
) -> Result<Vec<Page>> {
    let limit = page
        .map(|p| format!("LIMIT {} OFFSET {}", p.per_page, p.offset()))
        .unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAGE_COLUMNS} FROM {PAGE_FROM} {filter} ORDER BY {order} {limit}"
    ))?;
    let rows = stmt.query_map(params_from_iter(args.iter()), scan_page)?;
    collect_rows(rows)?
        .into_iter()
        .map(|page| hydrate(conn, page))
        .collect()
}

fn get_page_on_conn(conn: &Connection, id: i64) -> Result<Page> {
    let page = conn
        .query_row(
            &format!("SELECT {PAGE_COLUMNS} FROM {PAGE_FROM} WHERE p.id = ?1"),
            params![id],
            scan_page,
        )
        .or_not_found("page", id)?;
    hydrate(conn, page)
}

/// 写入页面字段，`id` 为 None 时插入
fn save_page(conn: &Connection, id: Option<i64>, input: &PageInput) -> Result<i64> {
    require("title", &input.title)?;
    let slug = slug_or_title(input.slug.as_deref(), &input.title);
    let publication = input.publication.clone().normalized();
    let now = Utc::now();

    if input.is_homepage {
        conn.execute(
            "UPDATE pages SET is_homepage = 0 WHERE is_homepage = 1 AND id != ?1",
            params![id.unwrap_or(0)],
        )?;
    }

    let mut args: Vec<&dyn ToSql> = vec![
        &input.title,
        &slug,
        &input.content,
        &input.excerpt,
        &input.featured_image,
        &input.template_id,
        &input.parent_id,
        &input.sort_order,
        &input.is_homepage,
        &publication.status,
        &publication.published_at,
    ];
    args.extend(seo_params(&input.seo));
    args.push(&now);

    let page_id = match id {
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO pages (title, slug, content, excerpt, featured_image, template_id,
                         parent_id, sort_order, is_homepage, status, published_at, {SEO_COLUMNS},
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18, ?19, ?19)"
                ),
                &*args,
            )?;
            conn.last_insert_rowid()
        }
        Some(id) => {
            if input.parent_id == Some(id) {
                return Err(StorageError::validation("页面不能是自己的父页面"));
            }
            args.push(&id);
            let changed = conn.execute(
                "UPDATE pages SET title = ?1, slug = ?2, content = ?3, excerpt = ?4,
                     featured_image = ?5, template_id = ?6, parent_id = ?7, sort_order = ?8,
                     is_homepage = ?9, status = ?10, published_at = ?11, meta_title = ?12,
                     meta_description = ?13, meta_keywords = ?14, canonical_url = ?15,
                     og_title = ?16, og_description = ?17, og_image = ?18, updated_at = ?19
                 WHERE id = ?20",
                &*args,
            )?;
            if changed == 0 {
                return Err(StorageError::not_found("page", id));
            }
            id
        }
    };

    set_tags(conn, "page_tags", "page_id", page_id, &input.tags)?;
    set_categories(conn, "page_categories", "page_id", page_id, &input.category_ids)?;
    Ok(page_id)
}

fn scan_template(row: &Row<'_>) -> rusqlite::Result<PageTemplate> {
    Ok(PageTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        template: row.get(3)?,
        description: row.get(4)?,
    })
}

impl Store {
    /// 新建页面。设为首页时取消其他页面的首页标记
    pub fn create_page(&self, input: &PageInput) -> Result<Page> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id = save_page(&tx, None, input)?;
        tx.commit()?;
        debug!("创建页面 {} (id={})", input.title, id);
        get_page_on_conn(&conn, id)
    }

    pub fn update_page(&self, id: i64, input: &PageInput) -> Result<Page> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        save_page(&tx, Some(id), input)?;
        tx.commit()?;
        get_page_on_conn(&conn, id)
    }

    pub fn get_page(&self, id: i64) -> Result<Page> {
        let conn = self.lock_conn()?;
        get_page_on_conn(&conn, id)
    }

    /// 按 slug 查找已发布页面
    pub fn get_published_page(&self, slug: &str) -> Result<Page> {
        let conn = self.lock_conn()?;
        let page = conn
            .query_row(
                &format!(
                    "SELECT {PAGE_COLUMNS} FROM {PAGE_FROM} WHERE p.slug = ?1 AND p.status = 'published'"
                ),
                params![slug],
                scan_page,
            )
            .or_not_found("page", slug)?;
        hydrate(&conn, page)
    }

    /// 首页：已发布的首页页面，没有时取最早创建的已发布页面
    pub fn homepage(&self) -> Result<Option<Page>> {
        let conn = self.lock_conn()?;
        let page = conn
            .query_row(
                &format!(
                    "SELECT {PAGE_COLUMNS} FROM {PAGE_FROM}
                     WHERE p.status = 'published'
                     ORDER BY p.is_homepage DESC, p.created_at ASC, p.id ASC
                     LIMIT 1"
                ),
                [],
                scan_page,
            )
            .optional()?;
        page.map(|p| hydrate(&conn, p)).transpose()
    }

    /// 所有页面（管理接口），按排序值和标题
    pub fn list_pages(&self) -> Result<Vec<Page>> {
        let conn = self.lock_conn()?;
        query_pages(&conn, "", "p.sort_order, p.title", &[], None)
    }

    /// 已发布页面，最新发布的在前；可按标签过滤
    pub fn published_pages(&self, tag_slug: Option<&str>, request: PageRequest) -> Result<Paginated<Page>> {
        let conn = self.lock_conn()?;
        let (filter, args) = match tag_slug {
            Some(slug) => (
                "WHERE p.status = 'published' AND p.id IN (
                     SELECT pt.page_id FROM page_tags pt JOIN tags g ON g.id = pt.tag_id
                     WHERE g.slug = ?1)",
                vec![Value::Text(slug.to_string())],
            ),
            None => ("WHERE p.status = 'published'", Vec::new()),
        };
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {PAGE_FROM} {filter}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;
        let request = request.within(total as usize);
        let items = query_pages(
            &conn,
            filter,
            "p.published_at DESC, p.id DESC",
            &args,
            Some(request),
        )?;
        Ok(Paginated::new(items, request, total as usize))
    }

    /// 分类下的已发布页面
    pub fn pages_in_category(&self, category_id: i64) -> Result<Vec<Page>> {
        let conn = self.lock_conn()?;
        query_pages(
            &conn,
            "WHERE p.status = 'published' AND p.id IN (
                 SELECT page_id FROM page_categories WHERE category_id = ?1)",
            "p.published_at DESC, p.id DESC",
            &[Value::Integer(category_id)],
            None,
        )
    }

    /// 批量修改状态，返回受影响的数量
    pub fn set_pages_status(&self, ids: &[i64], status: PublishStatus) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let now = Utc::now();
        let args = with_ids(vec![&status as &dyn ToSql, &now], ids);
        let publish_clause = if status == PublishStatus::Published {
            ", published_at = ?2"
        } else {
            ""
        };
        let sql = format!(
            "UPDATE pages SET status = ?1{publish_clause}, updated_at = ?2 WHERE id IN ({})",
            placeholders(ids.len())
        );
        Ok(conn.execute(&sql, &*args)?)
    }

    /// 删除页面及指向它的评论
    pub fn delete_page(&self, id: i64) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        if tx.execute("DELETE FROM pages WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("page", id));
        }
        delete_comments_for_target(&tx, ContentRef::new(ContentType::Page, id))?;
        tx.commit()?;
        Ok(())
    }

    pub fn count_pages(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?)
    }

    // -- 页面模板 ------------------------------------------------------------

    pub fn create_page_template(&self, input: &PageTemplateInput) -> Result<PageTemplate> {
        require("name", &input.name)?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO page_templates (name, slug, template, description) VALUES (?1, ?2, ?3, ?4)",
            params![input.name, slug, input.template, input.description],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.get_page_template(id)
    }

    pub fn update_page_template(&self, id: i64, input: &PageTemplateInput) -> Result<PageTemplate> {
        require("name", &input.name)?;
        let slug = slug_or_title(input.slug.as_deref(), &input.name);
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE page_templates SET name = ?1, slug = ?2, template = ?3, description = ?4 WHERE id = ?5",
            params![input.name, slug, input.template, input.description, id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("page template", id));
        }
        drop(conn);
        self.get_page_template(id)
    }

    pub fn get_page_template(&self, id: i64) -> Result<PageTemplate> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, name, slug, template, description FROM page_templates WHERE id = ?1",
            params![id],
            scan_template,
        )
        .or_not_found("page template", id)
    }

    pub fn list_page_templates(&self) -> Result<Vec<PageTemplate>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, template, description FROM page_templates ORDER BY name",
        )?;
        let rows = stmt.query_map([], scan_template)?;
        collect_rows(rows)
    }

    pub fn delete_page_template(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM page_templates WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("page template", id));
        }
        Ok(())
    }
}
