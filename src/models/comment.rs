use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{text_enum, ContentRef};

text_enum! {
    /// 评论审核状态
    #[derive(Default)]
    pub enum CommentStatus {
        #[default]
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

/// 评论，通过通用关联挂在任意内容上
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    /// 被评论的对象
    pub target: ContentRef,
    /// 登录用户发表时记录作者
    pub author_id: Option<i64>,
    /// 作者展示名称（连表得到）
    pub author_display: Option<String>,
    pub author_name: String,
    pub author_email: String,
    pub author_url: String,
    pub content: String,
    pub status: CommentStatus,
    /// 回复的评论
    pub parent_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_approved(&self) -> bool {
        self.status == CommentStatus::Approved
    }

    pub fn approve(&mut self) {
        self.status = CommentStatus::Approved;
    }

    pub fn reject(&mut self) {
        self.status = CommentStatus::Rejected;
    }

    /// 作者名称：用户展示名 > 填写的名字 > Anonymous
    pub fn get_author_name(&self) -> String {
        if let Some(name) = &self.author_display {
            return name.clone();
        }
        if self.author_name.is_empty() {
            "Anonymous".to_string()
        } else {
            self.author_name.clone()
        }
    }
}

/// 新评论
#[derive(Debug, Clone)]
pub struct NewComment {
    pub target: ContentRef,
    pub author_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub author_url: String,
    pub content: String,
    pub status: CommentStatus,
    pub parent_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

/// 管理接口中的评论更新
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentUpdate {
    pub content: String,
    pub author_name: String,
    pub author_email: String,
    pub author_url: String,
    pub status: CommentStatus,
    pub parent_id: Option<i64>,
}

/// 列表展示用：顶层评论及其回复
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    pub fn new(comment: Comment) -> Self {
        let author = comment.get_author_name();
        Self {
            comment,
            author,
            replies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::ContentType;

    fn sample() -> Comment {
        let now = Utc::now();
        Comment {
            id: 1,
            target: ContentRef::new(ContentType::Post, 1),
            author_id: None,
            author_display: None,
            author_name: String::new(),
            author_email: String::new(),
            author_url: String::new(),
            content: "hi".to_string(),
            status: CommentStatus::default(),
            parent_id: None,
            ip_address: None,
            user_agent: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn author_name_falls_back_to_anonymous() {
        let mut comment = sample();
        assert_eq!(comment.get_author_name(), "Anonymous");
        comment.author_name = "Bob".to_string();
        assert_eq!(comment.get_author_name(), "Bob");
        comment.author_display = Some("Robert Tables".to_string());
        assert_eq!(comment.get_author_name(), "Robert Tables");
    }

    #[test]
    fn moderation_transitions() {
        let mut comment = sample();
        assert!(!comment.is_approved());
        comment.approve();
        assert!(comment.is_approved());
        comment.reject();
        assert_eq!(comment.status, CommentStatus::Rejected);
    }
}
