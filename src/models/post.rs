use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{CategoryRef, Publication, PublishStatus, Seo, Tag};
use super::user::AuthorRef;

/// 博客文章
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Markdown 正文
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,
    pub author: AuthorRef,
    /// 是否推荐
    pub is_featured: bool,
    /// 是否允许评论
    pub allow_comments: bool,
    #[serde(flatten)]
    pub publication: Publication,
    #[serde(flatten)]
    pub seo: Seo,
    pub categories: Vec<CategoryRef>,
    pub tags: Vec<Tag>,
    /// 已审核评论数
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn url(&self) -> String {
        post_url(&self.slug)
    }

    pub fn publish(&mut self) {
        self.publication.publish();
    }

    pub fn archive(&mut self) {
        self.publication.archive();
    }

    pub fn draft(&mut self) {
        self.publication.draft();
    }
}

pub fn post_url(slug: &str) -> String {
    format!("/blog/post/{}/", slug)
}

/// 新建或更新文章
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostInput {
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,
    /// 为空时使用当前用户
    pub author_id: Option<i64>,
    pub is_featured: bool,
    pub allow_comments: bool,
    #[serde(flatten)]
    pub publication: Publication,
    #[serde(flatten)]
    pub seo: Seo,
    pub category_ids: Vec<i64>,
    /// 标签名称
    pub tags: Vec<String>,
}

impl Default for PostInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            slug: None,
            content: String::new(),
            excerpt: String::new(),
            featured_image: None,
            author_id: None,
            is_featured: false,
            allow_comments: true,
            publication: Publication::default(),
            seo: Seo::default(),
            category_ids: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// 文章查询条件
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PublishStatus>,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tag_slug: Option<String>,
    pub featured: Option<bool>,
    /// 按创建时间而不是发布时间排序
    pub order_by_created: bool,
}

impl PostFilter {
    pub fn published() -> Self {
        Self {
            status: Some(PublishStatus::Published),
            ..Self::default()
        }
    }
}

/// 作者后台的状态统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub published: i64,
    pub archived: i64,
}
