use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{CategoryRef, Seo};

/// 分类（可嵌套）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub featured_image: Option<String>,
    /// 父分类
    pub parent_id: Option<i64>,
    /// 排序
    pub sort_order: i64,
    #[serde(flatten)]
    pub seo: Seo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn url(&self) -> String {
        category_url(&self.slug)
    }

    pub fn to_ref(&self) -> CategoryRef {
        CategoryRef {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

pub fn category_url(slug: &str) -> String {
    format!("/categories/{}/", slug)
}

/// 带文章数量的分类
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    #[serde(flatten)]
    pub category: Category,
    pub post_count: i64,
}

/// 新建或更新分类
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
    pub featured_image: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    #[serde(flatten)]
    pub seo: Seo,
}
