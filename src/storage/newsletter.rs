use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use super::error::{OptionalExt, Result, StorageError};
use super::{collect_rows, placeholders, require, with_ids, Store};
use crate::models::{Newsletter, NewsletterInput, NewsletterStatus, Subscriber, SubscriberInput};

const SUBSCRIBER_COLUMNS: &str = "id, email, name, is_active, confirmation_token,
    unsubscribe_token, confirmed_at, created_at, updated_at";

const NEWSLETTER_COLUMNS: &str =
    "id, title, subject, content, status, scheduled_at, sent_at, created_at, updated_at";

fn scan_subscriber(row: &Row<'_>) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_active: row.get(3)?,
        confirmation_token: row.get(4)?,
        unsubscribe_token: row.get(5)?,
        confirmed_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn scan_newsletter(row: &Row<'_>) -> rusqlite::Result<Newsletter> {
    Ok(Newsletter {
        id: row.get(0)?,
        title: row.get(1)?,
        subject: row.get(2)?,
        content: row.get(3)?,
        status: row.get(4)?,
        scheduled_at: row.get(5)?,
        sent_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn get_subscriber_on_conn(conn: &Connection, id: i64) -> Result<Subscriber> {
    conn.query_row(
        &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE id = ?1"),
        params![id],
        scan_subscriber,
    )
    .or_not_found("subscriber", id)
}

fn get_newsletter_on_conn(conn: &Connection, id: i64) -> Result<Newsletter> {
    conn.query_row(
        &format!("SELECT {NEWSLETTER_COLUMNS} FROM newsletters WHERE id = ?1"),
        params![id],
        scan_newsletter,
    )
    .or_not_found("newsletter", id)
}

fn query_newsletters(conn: &Connection, filter: &str, args: &[&dyn ToSql]) -> Result<Vec<Newsletter>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NEWSLETTER_COLUMNS} FROM newsletters {filter}"
    ))?;
    let rows = stmt.query_map(args, scan_newsletter)?;
    collect_rows(rows)
}

fn insert_subscriber(
    conn: &Connection,
    email: &str,
    name: &str,
    is_active: bool,
    confirmation_token: &str,
    unsubscribe_token: &str,
) -> Result<i64> {
    require("email", email)?;
    conn.execute(
        "INSERT INTO subscribers (email, name, is_active, confirmation_token, unsubscribe_token,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![email.trim(), name, is_active, confirmation_token, unsubscribe_token, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    /// 公开订阅：未激活，等待邮件确认
    pub fn subscribe(
        &self,
        email: &str,
        name: &str,
        confirmation_token: &str,
        unsubscribe_token: &str,
    ) -> Result<Subscriber> {
        let conn = self.lock_conn()?;
        let id = insert_subscriber(&conn, email, name, false, confirmation_token, unsubscribe_token)?;
        info!("新订阅者: {}", email);
        get_subscriber_on_conn(&conn, id)
    }

    /// 管理接口添加订阅者（无需确认）
    pub fn create_subscriber(&self, input: &SubscriberInput, unsubscribe_token: &str) -> Result<Subscriber> {
        let conn = self.lock_conn()?;
        let id = insert_subscriber(&conn, &input.email, &input.name, input.is_active, "", unsubscribe_token)?;
        get_subscriber_on_conn(&conn, id)
    }

    pub fn update_subscriber(&self, id: i64, input: &SubscriberInput) -> Result<Subscriber> {
        require("email", &input.email)?;
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE subscribers SET email = ?1, name = ?2, is_active = ?3, updated_at = ?4 WHERE id = ?5",
            params![input.email.trim(), input.name, input.is_active, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("subscriber", id));
        }
        get_subscriber_on_conn(&conn, id)
    }

    pub fn get_subscriber(&self, id: i64) -> Result<Subscriber> {
        let conn = self.lock_conn()?;
        get_subscriber_on_conn(&conn, id)
    }

    /// 按确认邮件中的令牌查找；确认后令牌清空
    pub fn subscriber_by_confirmation_token(&self, token: &str) -> Result<Subscriber> {
        self.subscriber_by("confirmation_token", token)
    }

    /// 按退订链接中的令牌查找
    pub fn subscriber_by_unsubscribe_token(&self, token: &str) -> Result<Subscriber> {
        self.subscriber_by("unsubscribe_token", token)
    }

    fn subscriber_by(&self, column: &str, token: &str) -> Result<Subscriber> {
        if token.is_empty() {
            return Err(StorageError::not_found("subscriber", token));
        }
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE {column} = ?1"),
            params![token],
            scan_subscriber,
        )
        .or_not_found("subscriber", token)
    }

    pub fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], scan_subscriber)?;
        collect_rows(rows)
    }

    /// 已确认且仍在订阅的用户
    pub fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers
             WHERE is_active = 1 AND confirmed_at IS NOT NULL ORDER BY id"
        ))?;
        let rows = stmt.query_map([], scan_subscriber)?;
        collect_rows(rows)
    }

    /// 确认订阅
    pub fn confirm_subscriber(&self, id: i64) -> Result<Subscriber> {
        let conn = self.lock_conn()?;
        let mut subscriber = get_subscriber_on_conn(&conn, id)?;
        subscriber.confirm();
        conn.execute(
            "UPDATE subscribers SET is_active = ?1, confirmed_at = ?2, confirmation_token = ?3,
                 updated_at = ?4
             WHERE id = ?5",
            params![
                subscriber.is_active,
                subscriber.confirmed_at,
                subscriber.confirmation_token,
                Utc::now(),
                id
            ],
        )?;
        debug!("订阅已确认: {}", subscriber.email);
        get_subscriber_on_conn(&conn, id)
    }

    /// 批量启用/停用，返回受影响的数量
    pub fn set_subscribers_active(&self, ids: &[i64], active: bool) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let now = Utc::now();
        let args = with_ids(vec![&active as &dyn ToSql, &now], ids);
        let sql = format!(
            "UPDATE subscribers SET is_active = ?1, updated_at = ?2 WHERE id IN ({})",
            placeholders(ids.len())
        );
        Ok(conn.execute(&sql, &*args)?)
    }

    pub fn delete_subscriber(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM subscribers WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("subscriber", id));
        }
        Ok(())
    }

    pub fn create_newsletter(&self, input: &NewsletterInput) -> Result<Newsletter> {
        require("title", &input.title)?;
        require("subject", &input.subject)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO newsletters (title, subject, content, status, scheduled_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![input.title, input.subject, input.content, input.status, input.scheduled_at, Utc::now()],
        )?;
        get_newsletter_on_conn(&conn, conn.last_insert_rowid())
    }

    pub fn update_newsletter(&self, id: i64, input: &NewsletterInput) -> Result<Newsletter> {
        require("title", &input.title)?;
        require("subject", &input.subject)?;
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE newsletters SET title = ?1, subject = ?2, content = ?3, status = ?4,
                 scheduled_at = ?5, updated_at = ?6
             WHERE id = ?7",
            params![input.title, input.subject, input.content, input.status, input.scheduled_at, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::not_found("newsletter", id));
        }
        get_newsletter_on_conn(&conn, id)
    }

    pub fn get_newsletter(&self, id: i64) -> Result<Newsletter> {
        let conn = self.lock_conn()?;
        get_newsletter_on_conn(&conn, id)
    }

    pub fn list_newsletters(&self) -> Result<Vec<Newsletter>> {
        let conn = self.lock_conn()?;
        query_newsletters(&conn, "ORDER BY created_at DESC, id DESC", &[])
    }

    /// 计划发送时间已到、尚未发送的期刊
    pub fn due_newsletters(&self, now: DateTime<Utc>) -> Result<Vec<Newsletter>> {
        let conn = self.lock_conn()?;
        query_newsletters(
            &conn,
            "WHERE status = ?1 AND scheduled_at IS NOT NULL AND scheduled_at <= ?2
             ORDER BY scheduled_at, id",
            &[&NewsletterStatus::Scheduled, &now],
        )
    }

    /// 标记为已发送
    pub fn mark_newsletter_sent(&self, id: i64) -> Result<Newsletter> {
        let conn = self.lock_conn()?;
        let mut newsletter = get_newsletter_on_conn(&conn, id)?;
        newsletter.send();
        conn.execute(
            "UPDATE newsletters SET status = ?1, sent_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![newsletter.status, newsletter.sent_at, Utc::now(), id],
        )?;
        get_newsletter_on_conn(&conn, id)
    }

    /// 批量计划发送，返回受影响的数量
    pub fn schedule_newsletters(&self, ids: &[i64], at: DateTime<Utc>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let status = NewsletterStatus::Scheduled;
        let now = Utc::now();
        let args = with_ids(vec![&status as &dyn ToSql, &at, &now], ids);
        let sql = format!(
            "UPDATE newsletters SET status = ?1, scheduled_at = ?2, updated_at = ?3 WHERE id IN ({})",
            placeholders(ids.len())
        );
        Ok(conn.execute(&sql, &*args)?)
    }

    pub fn delete_newsletter(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM newsletters WHERE id = ?1", params![id])? == 0 {
            return Err(StorageError::not_found("newsletter", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use chrono::Duration;

    #[test]
    fn subscribe_then_confirm() {
        let store = test_support::store();
        let subscriber = store.subscribe("reader@example.com", "Reader", "confirm-token", "leave-token").unwrap();
        assert!(!subscriber.is_active);
        assert!(store.active_subscribers().unwrap().is_empty());

        // 两种令牌互不通用
        assert!(store.subscriber_by_confirmation_token("leave-token").unwrap_err().is_not_found());
        assert!(store.subscriber_by_unsubscribe_token("confirm-token").unwrap_err().is_not_found());

        let found = store.subscriber_by_confirmation_token("confirm-token").unwrap();
        let confirmed = store.confirm_subscriber(found.id).unwrap();
        assert!(confirmed.is_active);
        assert!(confirmed.confirmed_at.is_some());
        assert!(confirmed.confirmation_token.is_empty());

        // 确认令牌失效，退订令牌仍然可用
        assert!(store.subscriber_by_confirmation_token("confirm-token").unwrap_err().is_not_found());
        assert_eq!(store.subscriber_by_unsubscribe_token("leave-token").unwrap().id, subscriber.id);
        assert!(store.subscriber_by_confirmation_token("").unwrap_err().is_not_found());
        assert_eq!(store.active_subscribers().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_email_conflicts() {
        let store = test_support::store();
        store.subscribe("dup@example.com", "", "a", "b").unwrap();
        let err = store.subscribe("dup@example.com", "", "c", "d").unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn bulk_deactivate() {
        let store = test_support::store();
        let a = store
            .create_subscriber(
                &SubscriberInput {
                    email: "a@example.com".to_string(),
                    name: String::new(),
                    is_active: true,
                },
                "ua",
            )
            .unwrap();
        assert_eq!(store.set_subscribers_active(&[a.id], false).unwrap(), 1);
        assert!(!store.get_subscriber(a.id).unwrap().is_active);
    }

    #[test]
    fn due_and_sent_newsletters() {
        let store = test_support::store();
        let input = NewsletterInput {
            title: "Weekly".to_string(),
            subject: "This week".to_string(),
            ..NewsletterInput::default()
        };
        let due = store.create_newsletter(&input).unwrap();
        let later = store.create_newsletter(&input).unwrap();
        let now = Utc::now();
        store.schedule_newsletters(&[due.id], now - Duration::minutes(5)).unwrap();
        store.schedule_newsletters(&[later.id], now + Duration::hours(1)).unwrap();

        let found = store.due_newsletters(now).unwrap();
        assert_eq!(found.iter().map(|n| n.id).collect::<Vec<_>>(), vec![due.id]);

        let sent = store.mark_newsletter_sent(due.id).unwrap();
        assert_eq!(sent.status, NewsletterStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert!(store.due_newsletters(now).unwrap().is_empty());
    }
}
