use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 站点用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// 登录名（唯一）
    pub username: String,
    pub email: String,
    /// argon2 密码哈希，不对外序列化
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// 个人简介
    pub bio: String,
    pub avatar: Option<String>,
    pub website: String,
    pub facebook: String,
    pub twitter: String,
    pub instagram: String,
    pub linkedin: String,
    pub is_active: bool,
    /// 是否可以访问管理接口
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// 展示名称：姓名都存在时用全名，否则用登录名
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

pub fn display_name(first_name: &str, last_name: &str, username: &str) -> String {
    if !first_name.is_empty() && !last_name.is_empty() {
        format!("{} {}", first_name, last_name)
    } else {
        username.to_string()
    }
}

/// 模板和列表里使用的作者摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

/// 新建用户
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// 个人资料（用户可自行修改的字段）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub website: String,
    pub facebook: String,
    pub twitter: String,
    pub instagram: String,
    pub linkedin: String,
}

/// 管理接口中的用户更新
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub username: String,
    /// 为空时保留原密码
    pub password: Option<String>,
    #[serde(flatten)]
    pub profile: ProfileUpdate,
    pub is_active: Option<bool>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// 登录会话
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(display_name("Ada", "Lovelace", "ada"), "Ada Lovelace");
        assert_eq!(display_name("Ada", "", "ada"), "ada");
        assert_eq!(display_name("", "", "ada"), "ada");
    }
}
