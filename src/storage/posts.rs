use chrono::Utc;
use rusqlite::types::{ToSql, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::debug;

use super::categories::{categories_of, get_or_create_category, set_categories};
use super::comments::delete_comments_for_target;
use super::error::{OptionalExt, Result, StorageError};
use super::tags::{set_tags, tags_of};
use super::{collect_rows, placeholders, require, scan_seo, seo_params, with_ids, Store, SEO_COLUMNS};
use crate::models::content::slug_or_title;
use crate::models::user::display_name;
use crate::models::{
    AuthorRef, ContentRef, ContentType, PageRequest, Paginated, Post, PostFilter, PostInput,
    Publication, PublishStatus, StatusCounts,
};

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.content, p.excerpt, p.featured_image,
    p.author_id, u.username, u.first_name, u.last_name, p.is_featured, p.allow_comments,
    p.status, p.published_at, p.meta_title, p.meta_description, p.meta_keywords,
    p.canonical_url, p.og_title, p.og_description, p.og_image, p.created_at, p.updated_at,
    (SELECT COUNT(*) FROM comments c
      WHERE c.content_type = 'post' AND c.object_id = p.id AND c.status = 'approved') AS comment_count";

const POST_FROM: &str = "posts p JOIN users u ON u.id = p.author_id";

fn scan_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let username: String = row.get(7)?;
    let first_name: String = row.get(8)?;
    let last_name: String = row.get(9)?;
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        featured_image: row.get(5)?,
        author: AuthorRef {
            id: row.get(6)?,
            display_name: display_name(&first_name, &last_name, &username),
            username,
        },
        is_featured: row.get(10)?,
        allow_comments: row.get(11)?,
        publication: Publication {
            status: row.get(12)?,
            published_at: row.get(13)?,
        },
        seo: scan_seo(row, 14)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
        comment_count: row.get(23)?,
        categories: Vec::new(),
        tags: Vec::new(),
    })
}

fn hydrate(conn: &Connection, mut post: Post) -> Result<Post> {
    post.categories = categories_of(conn, "post_categories", "post_id", post.id)?;
    post.tags = tags_of(conn, "post_tags", "post_id", post.id)?;
    Ok(post)
}

fn query_posts(
    conn: &Connection,
    filter: &str,
    order: &str,
    args: &[Value],
    limit: Option<(usize, usize)>,
) -> Result<Vec<Post>> {
    let limit = limit
        .map(|(n, offset)| format!("LIMIT {n} OFFSET {offset}"))
        .unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM {POST_FROM} {filter} ORDER BY {order} {limit}"
    ))?;
    let rows = stmt.query_map(params_from_iter(args.iter()), scan_post)?;
    collect_rows(rows)?
        .into_iter()
        .map(|post| hydrate(conn, post))
        .collect()
}

fn get_post_on_conn(conn: &Connection, id: i64) -> Result<Post> {
    let post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM {POST_FROM} WHERE p.id = ?1"),
            params![id],
            scan_post,
        )
        .or_not_found("post", id)?;
    hydrate(conn, post)
}

/// 把查询条件转换为 WHERE 子句和参数
fn filter_clause(filter: &PostFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();
    if let Some(status) = filter.status {
        clauses.push("p.status = ?".to_string());
        args.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(author_id) = filter.author_id {
        clauses.push("p.author_id = ?".to_string());
        args.push(Value::Integer(author_id));
    }
    if let Some(category_id) = filter.category_id {
        clauses.push("p.id IN (SELECT post_id FROM post_categories WHERE category_id = ?)".to_string());
        args.push(Value::Integer(category_id));
    }
    if let Some(tag_slug) = &filter.tag_slug {
        clauses.push(
            "p.id IN (SELECT pt.post_id FROM post_tags pt JOIN tags t ON t.id = pt.tag_id WHERE t.slug = ?)"
                .to_string(),
        );
        args.push(Value::Text(tag_slug.clone()));
    }
    if let Some(featured) = filter.featured {
        clauses.push("p.is_featured = ?".to_string());
        args.push(Value::Integer(featured as i64));
    }
    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, args)
}

fn order_clause(filter: &PostFilter) -> &'static str {
    if filter.order_by_created {
        "p.created_at DESC, p.id DESC"
    } else {
        "p.published_at DESC, p.id DESC"
    }
}

fn save_post(conn: &Connection, id: Option<i64>, author_id: i64, input: &PostInput) -> Result<i64> {
    require("title", &input.title)?;
    let slug = slug_or_title(input.slug.as_deref(), &input.title);
    let publication = input.publication.clone().normalized();
    let now = Utc::now();

    let mut args: Vec<&dyn ToSql> = vec![
        &input.title,
        &slug,
        &input.content,
        &input.excerpt,
        &input.featured_image,
        &author_id,
        &input.is_featured,
        &input.allow_comments,
        &publication.status,
        &publication.published_at,
    ];
    args.extend(seo_params(&input.seo));
    args.push(&now);

    let post_id = match id {
        None => {
            conn.execute(
                &format!(
                    "INSERT INTO posts (title, slug, content, excerpt, featured_image, author_id,
                         is_featured, allow_comments, status, published_at, {SEO_COLUMNS},
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18, ?18)"
                ),
                &*args,
            )?;
            conn.last_insert_rowid()
        }
        Some(id) => {
            args.push(&id);
            let changed = conn.execute(
                "UPDATE posts SET title = ?1, slug = ?2, content = ?3, excerpt = ?4,
                     featured_image = ?5, author_id = ?6, is_featured = ?7, allow_comments = ?8,
                     status = ?9, published_at = ?10, meta_title = ?11, meta_description = ?12,
                     meta_keywords = ?13, canonical_url = ?14, og_title = ?15,
                     og_description = ?16, og_image = ?17, updated_at = ?18
                 WHERE id = ?19",
                &*args,
            )?;
            if changed == 0 {
                return Err(StorageError::not_found("post", id));
            }
            id
        }
    };

    set_categories(conn, "post_categories", "post_id", post_id, &input.category_ids)?;
    set_tags(conn, "post_tags", "post_id", post_id, &input.tags)?;
    Ok(post_id)
}

impl Store {
    /// 新建文章。`input.author_id` 为空时使用 `author_id`
    pub fn create_post(&self, input: &PostInput, author_id: i64) -> Result<Post> {
        let author_id = input.author_id.unwrap_or(author_id);
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id = save_post(&tx, None, author_id, input)?;
        tx.commit()?;
        debug!("创建文章 {} (id={})", input.title, id);
        get_post_on_conn(&conn, id)
    }

    /// 导入文章：按名称创建缺失的分类
    pub fn import_post(&self, input: &PostInput, author_id: i64, category_names: &[String]) -> Result<Post> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let mut input = input.clone();
        for name in category_names.iter().filter(|n| !n.trim().is_empty()) {
            let id = get_or_create_category(&tx, name)?;
            if !input.category_ids.contains(&id) {
                input.category_ids.push(id);
            }
        }
        let id = save_post(&tx, None, input.author_id.unwrap_or(author_id), &input)?;
        tx.commit()?;
        get_post_on_conn(&conn, id)
    }

    pub fn update_post(&self, id: i64, input: &PostInput) -> Result<Post> {
        let mut conn = self.lock_conn()?;
        let current_author: i64 = conn
            .query_row("SELECT author_id FROM posts WHERE id = ?1", params![id], |row| row.get(0))
            .or_not_found("post", id)?;
        let tx = conn.transaction()?;
        save_post(&tx, Some(id), input.author_id.unwrap_or(current_author), input)?;
        tx.commit()?;
        get_post_on_conn(&conn, id)
    }

    pub fn get_post(&self, id: i64) -> Result<Post> {
        let conn = self.lock_conn()?;
        get_post_on_conn(&conn, id)
    }

    /// 按 slug 查找已发布文章
    pub fn get_published_post(&self, slug: &str) -> Result<Post> {
        let conn = self.lock_conn()?;
        let post = conn
            .query_row(
                &format!(
                    "SELECT {POST_COLUMNS} FROM {POST_FROM} WHERE p.slug = ?1 AND p.status = 'published'"
                ),
                params![slug],
                scan_post,
            )
            .or_not_found("post", slug)?;
        hydrate(&conn, post)
    }

    /// 按条件分页查询
    pub fn list_posts(&self, filter: &PostFilter, request: PageRequest) -> Result<Paginated<Post>> {
        let conn = self.lock_conn()?;
        let (clause, args) = filter_clause(filter);
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {POST_FROM} {clause}"),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;
        let request = request.within(total as usize);
        let items = query_posts(
            &conn,
            &clause,
            order_clause(filter),
            &args,
            Some((request.per_page, request.offset())),
        )?;
        Ok(Paginated::new(items, request, total as usize))
    }

    /// 按条件查询前 `limit` 篇
    pub fn recent_posts(&self, filter: &PostFilter, limit: usize) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        let (clause, args) = filter_clause(filter);
        query_posts(&conn, &clause, order_clause(filter), &args, Some((limit, 0)))
    }

    /// 所有文章（管理接口）
    pub fn all_posts(&self) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        query_posts(&conn, "", "p.created_at DESC, p.id DESC", &[], None)
    }

    /// 推荐的已发布文章
    pub fn featured_posts(&self, limit: usize) -> Result<Vec<Post>> {
        self.recent_posts(
            &PostFilter {
                featured: Some(true),
                ..PostFilter::published()
            },
            limit,
        )
    }

    /// 已审核评论最多的已发布文章
    pub fn popular_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        query_posts(
            &conn,
            "WHERE p.status = 'published'",
            "comment_count DESC, p.published_at DESC",
            &[],
            Some((limit, 0)),
        )
    }

    /// 与指定文章共享分类或标签的其他已发布文章
    pub fn related_posts(&self, post: &Post, limit: usize) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        query_posts(
            &conn,
            "WHERE p.status = 'published' AND p.id != ?1 AND (
                 p.id IN (SELECT post_id FROM post_categories WHERE category_id IN
                          (SELECT category_id FROM post_categories WHERE post_id = ?1))
                 OR p.id IN (SELECT post_id FROM post_tags WHERE tag_id IN
                          (SELECT tag_id FROM post_tags WHERE post_id = ?1)))",
            "p.published_at DESC, p.id DESC",
            &[Value::Integer(post.id)],
            Some((limit, 0)),
        )
    }

    /// 作者各状态的文章数
    pub fn status_counts(&self, author_id: i64) -> Result<StatusCounts> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM posts WHERE author_id = ?1 GROUP BY status")?;
        let rows = stmt.query_map(params![author_id], |row| {
            Ok((row.get::<_, PublishStatus>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = StatusCounts::default();
        for (status, n) in collect_rows(rows)? {
            match status {
                PublishStatus::Draft => counts.draft = n,
                PublishStatus::Published => counts.published = n,
                PublishStatus::Archived => counts.archived = n,
            }
        }
        Ok(counts)
    }

    /// 批量修改状态，返回受影响的数量
    pub fn set_posts_status(&self, ids: &[i64], status: PublishStatus) -> Result<usize> {
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
            "UPDATE posts SET status = ?1{publish_clause}, updated_at = ?2 WHERE id IN ({})",
            placeholders(ids.len())
        );
        Ok(conn.execute(&sql, &*args)?)
    }

    pub fn set_posts_featured(&self, ids: &[i64], featured: bool) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let now = Utc::now();
        let args = with_ids(vec![&featured as &dyn ToSql, &now], ids);
        let sql = format!(
            "UPDATE posts SET is_featured = ?1, updated_at = ?2 WHERE id IN ({})",
            placeholders(ids.len())
        );
        Ok(conn.execute(&sql, &*args)?)
    }

    /// 删除文章及指向它的评论
    pub fn delete_post(&self, id: i64) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        if tx.execute("DELETE FROM posts WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("post", id));
        }
        delete_comments_for_target(&tx, ContentRef::new(ContentType::Post, id))?;
        tx.commit()?;
        Ok(())
    }

    pub fn count_posts(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::models::{CategoryInput, CommentStatus, NewComment};

    fn input(title: &str, status: PublishStatus) -> PostInput {
        PostInput {
            title: title.to_string(),
            publication: Publication {
                status,
                published_at: None,
            },
            ..PostInput::default()
        }
    }

    #[test]
    fn create_defaults_and_author() {
        let store = test_support::store();
        let author = test_support::user(&store, "writer");
        let post = store.create_post(&input("First Post", PublishStatus::Draft), author.id).unwrap();
        assert_eq!(post.slug, "first-post");
        assert_eq!(post.url(), "/blog/post/first-post/");
        assert!(post.allow_comments);
        assert!(post.publication.published_at.is_none());
        assert_eq!(post.author.username, "writer");
        assert!(store.get_published_post("first-post").unwrap_err().is_not_found());
    }

    #[test]
    fn filters_by_category_tag_and_author() {
        let store = test_support::store();
        let alice = test_support::user(&store, "alice");
        let bob = test_support::user(&store, "bob");
        let rust = store
            .create_category(&CategoryInput {
                name: "Rust".to_string(),
                ..CategoryInput::default()
            })
            .unwrap();

        let mut a = input("A", PublishStatus::Published);
        a.category_ids = vec![rust.id];
        a.tags = vec!["async".to_string()];
        store.create_post(&a, alice.id).unwrap();
        store.create_post(&input("B", PublishStatus::Published), bob.id).unwrap();
        store.create_post(&input("C", PublishStatus::Draft), alice.id).unwrap();

        let page = PageRequest::new(1, 10);
        let by_category = store
            .list_posts(&PostFilter { category_id: Some(rust.id), ..PostFilter::published() }, page)
            .unwrap();
        assert_eq!(by_category.total, 1);

        let by_tag = store
            .list_posts(&PostFilter { tag_slug: Some("async".to_string()), ..PostFilter::published() }, page)
            .unwrap();
        assert_eq!(by_tag.items[0].title, "A");

        let by_author = store
            .list_posts(&PostFilter { author_id: Some(alice.id), ..PostFilter::published() }, page)
            .unwrap();
        assert_eq!(by_author.total, 1);

        let counts = store.status_counts(alice.id).unwrap();
        assert_eq!((counts.draft, counts.published, counts.archived), (1, 1, 0));
    }

    #[test]
    fn related_posts_share_category_or_tag() {
        let store = test_support::store();
        let author = test_support::user(&store, "author");
        let mut base = input("Base", PublishStatus::Published);
        base.tags = vec!["shared".to_string()];
        let base = store.create_post(&base, author.id).unwrap();

        let mut related = input("Related", PublishStatus::Published);
        related.tags = vec!["shared".to_string()];
        let related = store.create_post(&related, author.id).unwrap();

        let mut hidden = input("Hidden", PublishStatus::Draft);
        hidden.tags = vec!["shared".to_string()];
        store.create_post(&hidden, author.id).unwrap();
        store.create_post(&input("Unrelated", PublishStatus::Published), author.id).unwrap();

        let found = store.related_posts(&base, 3).unwrap();
        assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![related.id]);
    }

    #[test]
    fn popular_posts_by_approved_comments() {
        let store = test_support::store();
        let author = test_support::user(&store, "author");
        let quiet = store.create_post(&input("Quiet", PublishStatus::Published), author.id).unwrap();
        let busy = store.create_post(&input("Busy", PublishStatus::Published), author.id).unwrap();
        let newest = store.create_post(&input("Newest", PublishStatus::Published), author.id).unwrap();
        let comment = |post_id: i64, status: CommentStatus| {
            store
                .create_comment(&NewComment {
                    target: ContentRef::new(ContentType::Post, post_id),
                    author_id: None,
                    author_name: "x".to_string(),
                    author_email: String::new(),
                    author_url: String::new(),
                    content: "hi".to_string(),
                    status,
                    parent_id: None,
                    ip_address: None,
                    user_agent: String::new(),
                })
                .unwrap();
        };
        for status in [CommentStatus::Approved, CommentStatus::Approved, CommentStatus::Pending] {
            comment(busy.id, status);
        }
        comment(newest.id, CommentStatus::Approved);
        comment(quiet.id, CommentStatus::Rejected);

        let popular = store.popular_posts(3).unwrap();
        let ranked: Vec<(i64, i64)> = popular.iter().map(|p| (p.id, p.comment_count)).collect();
        assert_eq!(ranked, vec![(busy.id, 2), (newest.id, 1), (quiet.id, 0)]);
    }

    #[test]
    fn bulk_feature_and_delete_cascades_comments() {
        let store = test_support::store();
        let author = test_support::user(&store, "author");
        let post = store.create_post(&input("P", PublishStatus::Published), author.id).unwrap();
        assert_eq!(store.set_posts_featured(&[post.id], true).unwrap(), 1);
        assert_eq!(store.featured_posts(3).unwrap().len(), 1);

        let target = ContentRef::new(ContentType::Post, post.id);
        store
            .create_comment(&NewComment {
                target,
                author_id: Some(author.id),
                author_name: String::new(),
                author_email: String::new(),
                author_url: String::new(),
                content: "c".to_string(),
                status: CommentStatus::Approved,
                parent_id: None,
                ip_address: None,
                user_agent: String::new(),
            })
            .unwrap();
        store.delete_post(post.id).unwrap();
        assert_eq!(store.count_comments().unwrap(), 0);
    }

    #[test]
    fn deleting_author_deletes_posts() {
        let store = test_support::store();
        let author = test_support::user(&store, "gone");
        store.create_post(&input("P", PublishStatus::Draft), author.id).unwrap();
        store.delete_user(author.id).unwrap();
        assert_eq!(store.count_posts().unwrap(), 0);
    }
}
