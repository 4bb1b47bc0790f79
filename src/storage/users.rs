use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::error::{OptionalExt, Result};
use super::{collect_rows, require, Store};
use crate::models::{NewUser, ProfileUpdate, Session, User, UserInput};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, bio, avatar,
    website, facebook, twitter, instagram, linkedin, is_active, is_staff, is_superuser,
    date_joined, last_login";

fn scan_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        bio: row.get(6)?,
        avatar: row.get(7)?,
        website: row.get(8)?,
        facebook: row.get(9)?,
        twitter: row.get(10)?,
        instagram: row.get(11)?,
        linkedin: row.get(12)?,
        is_active: row.get(13)?,
        is_staff: row.get(14)?,
        is_superuser: row.get(15)?,
        date_joined: row.get(16)?,
        last_login: row.get(17)?,
    })
}

impl Store {
    /// 新建用户，`password_hash` 由调用方计算
    pub fn create_user(&self, input: &NewUser, password_hash: &str) -> Result<User> {
        require("username", &input.username)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO users (username, email, password_hash, first_name, last_name,
                                is_staff, is_superuser, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                input.username.trim(),
                input.email,
                password_hash,
                input.first_name,
                input.last_name,
                input.is_staff || input.is_superuser,
                input.is_superuser,
                Utc::now(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("创建用户 {} (id={})", input.username, id);
        drop(conn);
        self.get_user(id)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            scan_user,
        )
        .or_not_found("user", id)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            scan_user,
        )
        .or_not_found("user", username)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let rows = stmt.query_map([], scan_user)?;
        collect_rows(rows)
    }

    pub fn count_users(&self) -> Result<i64> {
        let conn = self.lock_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    /// 管理接口更新用户；`password_hash` 为 None 时保留原密码
    pub fn update_user(&self, id: i64, input: &UserInput, password_hash: Option<&str>) -> Result<User> {
        require("username", &input.username)?;
        let current = self.get_user(id)?;
        let conn = self.lock_conn()?;
        let p = &input.profile;
        conn.execute(
            "UPDATE users SET username = ?1, email = ?2, first_name = ?3, last_name = ?4, bio = ?5,
                avatar = ?6, website = ?7, facebook = ?8, twitter = ?9, instagram = ?10,
                linkedin = ?11, is_active = ?12, is_staff = ?13, is_superuser = ?14,
                password_hash = ?15
             WHERE id = ?16",
            params![
                input.username.trim(),
                p.email,
                p.first_name,
                p.last_name,
                p.bio,
                p.avatar,
                p.website,
                p.facebook,
                p.twitter,
                p.instagram,
                p.linkedin,
                input.is_active.unwrap_or(current.is_active),
                input.is_staff || input.is_superuser,
                input.is_superuser,
                password_hash.unwrap_or(current.password_hash.as_str()),
                id,
            ],
        )?;
        drop(conn);
        self.get_user(id)
    }

    /// 用户修改自己的资料
    pub fn update_profile(&self, id: i64, profile: &ProfileUpdate) -> Result<User> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, bio = ?4, avatar = ?5,
                website = ?6, facebook = ?7, twitter = ?8, instagram = ?9, linkedin = ?10
             WHERE id = ?11",
            params![
                profile.first_name,
                profile.last_name,
                profile.email,
                profile.bio,
                profile.avatar,
                profile.website,
                profile.facebook,
                profile.twitter,
                profile.instagram,
                profile.linkedin,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(super::StorageError::not_found("user", id));
        }
        drop(conn);
        self.get_user(id)
    }

    pub fn set_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(())
    }

    pub fn touch_last_login(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    /// 删除用户，其文章和会话级联删除
    pub fn delete_user(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        if conn.execute("DELETE FROM users WHERE id = ?1", params![id])? == 0 {
            return Err(super::StorageError::not_found("user", id));
        }
        Ok(())
    }

    // -- 会话 --------------------------------------------------------------

    pub fn create_session(&self, token: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<Session> {
        let conn = self.lock_conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, now, expires_at],
        )?;
        Ok(Session {
            token: token.to_string(),
            user_id,
            created_at: now,
            expires_at,
        })
    }

    /// 根据会话令牌查找仍然有效的用户
    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        let columns = USER_COLUMNS
            .split(',')
            .map(|c| format!("u.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let user = conn
            .query_row(
                &format!(
                    "SELECT {columns} FROM sessions s JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1 AND s.expires_at > ?2 AND u.is_active = 1"
                ),
                params![token, Utc::now()],
                scan_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// 清理过期会话，返回删除的数量
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![Utc::now()])?;
        Ok(removed)
    }
}
