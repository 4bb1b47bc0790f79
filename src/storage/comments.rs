use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, placeholders, with_ids, Store};
use crate::models::category::category_url;
use crate::models::page::page_url;
use crate::models::post::post_url;
use crate::models::user::display_name;
use crate::models::{
    Comment, CommentStatus, CommentThread, CommentUpdate, ContentRef, ContentType, NewComment,
};

const COMMENT_COLUMNS: &str = "c.id, c.content_type, c.object_id, c.author_id,
    u.username, u.first_name, u.last_name, c.author_name, c.author_email, c.author_url,
    c.content, c.status, c.parent_id, c.ip_address, c.user_agent, c.created_at, c.updated_at";

const COMMENT_FROM: &str = "comments c LEFT JOIN users u ON u.id = c.author_id";

fn scan_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let username: Option<String> = row.get(4)?;
    let first_name: Option<String> = row.get(5)?;
    let last_name: Option<String> = row.get(6)?;
    let author_display = username.map(|username| {
        display_name(
            first_name.as_deref().unwrap_or_default(),
            last_name.as_deref().unwrap_or_default(),
            &username,
        )
    });
    Ok(Comment {
        id: row.get(0)?,
        target: ContentRef::new(row.get(1)?, row.get(2)?),
        author_id: row.get(3)?,
        author_display,
        author_name: row.get(7)?,
        author_email: row.get(8)?,
        author_url: row.get(9)?,
        content: row.get(10)?,
        status: row.get(11)?,
        parent_id: row.get(12)?,
        ip_address: row.get(13)?,
        user_agent: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn query_comments(conn: &Connection, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM {COMMENT_FROM} {filter}"
    ))?;
    let rows = stmt.query_map(args, scan_comment)?;
    collect_rows(rows)
}

fn get_comment_on_conn(conn: &Connection, id: i64) -> Result<Comment> {
    conn.query_row(
        &format!("SELECT {COMMENT_COLUMNS} FROM {COMMENT_FROM} WHERE c.id = ?1"),
        params![id],
        scan_comment,
    )
    .or_not_found("comment", id)
}

/// 删除指向某个对象的全部评论（通用关联没有外键级联）
pub(crate) fn delete_comments_for_target(conn: &Connection, target: ContentRef) -> Result<()> {
    let n = conn.execute(
        "DELETE FROM comments WHERE content_type = ?1 AND object_id = ?2",
        params![target.content_type, target.object_id],
    )?;
    if n > 0 {
        debug!("删除 {} 的 {} 条评论", target.content_type, n);
    }
    Ok(())
}

/// 回复必须指向同一对象下的评论
fn check_parent(conn: &Connection, target: ContentRef, parent_id: Option<i64>) -> Result<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let parent: Option<(ContentType, i64)> = conn
        .query_row(
            "SELECT content_type, object_id FROM comments WHERE id = ?1",
            params![parent_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match parent {
        Some((content_type, object_id))
            if content_type == target.content_type && object_id == target.object_id =>
        {
            Ok(())
        }
        Some(_) => Err(StorageError::validation("回复的评论不属于同一内容")),
        None => Err(StorageError::validation(format!("回复的评论不存在: {parent_id}"))),
    }
}

fn target_table(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Post => "posts",
        ContentType::Page => "pages",
        ContentType::Category => "categories",
    }
}

impl Store {
    pub fn create_comment(&self, input: &NewComment) -> Result<Comment> {
        if input.content.trim().is_empty() {
            return Err(StorageError::validation("评论内容不能为空"));
        }
        let conn = self.lock_conn()?;
        check_parent(&conn, input.target, input.parent_id)?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO comments (content_type, object_id, author_id, author_name, author_email,
                 author_url, content, status, parent_id, ip_address, user_agent, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                input.target.content_type,
                input.target.object_id,
                input.author_id,
                input.author_name,
                input.author_email,
                input.author_url,
                input.content,
                input.status,
                input.parent_id,
                input.ip_address,
                input.user_agent,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("新评论 {} -> {}:{}", id, input.target.content_type, input.target.object_id);
        get_comment_on_conn(&conn, id)
    }

    pub fn get_comment(&self, id: i64) -> Result<Comment> {
        let conn = self.lock_conn()?;
        get_comment_on_conn(&conn, id)
    }

    /// 全部评论，最新的在前；可按状态过滤
    pub fn list_comments(&self, status: Option<CommentStatus>) -> Result<Vec<Comment>> {
        let conn = self.lock_conn()?;
        match status {
            Some(status) => query_comments(
                &conn,
                "WHERE c.status = ?1 ORDER BY c.created_at DESC, c.id DESC",
                &[&status],
            ),
            None => query_comments(&conn, "ORDER BY c.created_at DESC, c.id DESC", &[]),
        }
    }

    /// 最近的已审核评论
    pub fn recent_comments(&self, limit: usize) -> Result<Vec<Comment>> {
        let conn = self.lock_conn()?;
        let limit = limit as i64;
        query_comments(
            &conn,
            "WHERE c.status = 'approved' ORDER BY c.created_at DESC, c.id DESC LIMIT ?1",
            &[&limit],
        )
    }

    /// 对象下已审核的评论：顶层评论最新在前，回复按时间顺序挂在父评论下
    pub fn comments_for(&self, target: ContentRef) -> Result<Vec<CommentThread>> {
        let conn = self.lock_conn()?;
        let approved = query_comments(
            &conn,
            "WHERE c.content_type = ?1 AND c.object_id = ?2 AND c.status = 'approved'
             ORDER BY c.created_at ASC, c.id ASC",
            &[&target.content_type, &target.object_id],
        )?;
        let mut top: Vec<CommentThread> = threads_of(None, &approved);
        top.reverse();
        Ok(top)
    }

    pub fn update_comment(&self, id: i64, input: &CommentUpdate) -> Result<Comment> {
        let conn = self.lock_conn()?;
        let current = get_comment_on_conn(&conn, id)?;
        if input.parent_id == Some(id) {
            return Err(StorageError::validation("评论不能回复自己"));
        }
        check_parent(&conn, current.target, input.parent_id)?;
        conn.execute(
            "UPDATE comments SET content = ?1, author_name = ?2, author_email = ?3, author_url = ?4,
                 status = ?5, parent_id = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                input.content,
                input.author_name,
                input.author_email,
                input.author_url,
                input.status,
                input.parent_id,
                Utc::now(),
                id,
            ],
        )?;
        get_comment_on_conn(&conn, id)
    }

    /// 批量审核，返回受影响的数量
    pub fn set_comments_status(&self, ids: &[i64], status: CommentStatus) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let now = Utc::now();
        let args = with_ids(vec![&status as &dyn ToSql, &now], ids);
        let sql = format!(
            "UPDATE comments SET status = ?1, updated_at = ?2 WHERE id IN ({})",
            placeholders(ids.len())
        );
        Ok(conn.execute(&sql, &*args)?)
    }

    pub fn delete_comment(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM comments WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("comment", id));
        }
        Ok(())
    }

    pub fn count_comments(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?)
    }

    /// 通用关联指向的对象是否存在
    pub fn target_exists(&self, target: ContentRef) -> Result<bool> {
        let conn = self.lock_conn()?;
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", target_table(target.content_type)),
                params![target.object_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 通用关联指向的对象的地址
    pub fn target_url(&self, target: ContentRef) -> Result<String> {
        let conn = self.lock_conn()?;
        let (slug, is_homepage): (String, bool) = match target.content_type {
            ContentType::Page => conn.query_row(
                "SELECT slug, is_homepage FROM pages WHERE id = ?1",
                params![target.object_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ),
            other => conn.query_row(
                &format!("SELECT slug, 0 FROM {} WHERE id = ?1", target_table(other)),
                params![target.object_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ),
        }
        .or_not_found(target.content_type.as_str(), target.object_id)?;
        Ok(match target.content_type {
            ContentType::Post => post_url(&slug),
            ContentType::Page => page_url(&slug, is_homepage),
            ContentType::Category => category_url(&slug),
        })
    }
}

fn threads_of(parent: Option<i64>, comments: &[Comment]) -> Vec<CommentThread> {
    comments
        .iter()
        .filter(|c| c.parent_id == parent)
        .map(|c| {
            let mut thread = CommentThread::new(c.clone());
            thread.replies = threads_of(Some(c.id), comments);
            thread
        })
        .collect()
}
