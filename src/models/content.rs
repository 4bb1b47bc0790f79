use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 字符串枚举解析失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无效的{kind}值: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// 定义以固定字符串存储的枚举（数据库、表单、模板共用同一套取值）
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::content::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err($crate::models::content::ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use text_enum;

text_enum! {
    /// 发布状态
    #[derive(Default)]
    pub enum PublishStatus {
        #[default]
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

text_enum! {
    /// 通用关联可以指向的内容类型
    pub enum ContentType {
        Post => "post",
        Page => "page",
        Category => "category",
    }
}

/// 通用关联：内容类型 + 记录 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub object_id: i64,
}

impl ContentRef {
    pub fn new(content_type: ContentType, object_id: i64) -> Self {
        Self { content_type, object_id }
    }
}

/// 发布信息，页面和文章共用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// 当前状态
    #[serde(default)]
    pub status: PublishStatus,
    /// 发布时间
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Publication {
    /// 发布内容
    pub fn publish(&mut self) {
        self.status = PublishStatus::Published;
        self.published_at = Some(Utc::now());
    }

    /// 归档内容
    pub fn archive(&mut self) {
        self.status = PublishStatus::Archived;
    }

    /// 设为草稿
    pub fn draft(&mut self) {
        self.status = PublishStatus::Draft;
    }

    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Published
    }

    /// 直接设置状态时补齐发布时间
    pub fn normalized(mut self) -> Self {
        if self.status == PublishStatus::Published && self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
        self
    }
}

/// SEO 字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seo {
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub canonical_url: String,
    pub og_title: String,
    pub og_description: String,
    pub og_image: Option<String>,
}

/// 标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// 带文章数量的标签（用于标签云）
#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub post_count: i64,
}

/// 分类的简要引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// 生成 slug，为空时取标题
pub fn slug_or_title(slug: Option<&str>, title: &str) -> String {
    match slug.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => crate::utils::slugify(title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_sets_status_and_timestamp() {
        let mut publication = Publication::default();
        assert_eq!(publication.status, PublishStatus::Draft);
        assert!(publication.published_at.is_none());

        publication.publish();
        assert_eq!(publication.status, PublishStatus::Published);
        assert!(publication.published_at.is_some());
    }

    #[test]
    fn archive_and_draft_keep_published_at() {
        let mut publication = Publication::default();
        publication.publish();
        let published_at = publication.published_at;

        publication.archive();
        assert_eq!(publication.status, PublishStatus::Archived);
        assert_eq!(publication.published_at, published_at);

        // 任意状态之间都可以切换
        publication.draft();
        assert_eq!(publication.status, PublishStatus::Draft);
        publication.publish();
        assert!(publication.is_published());
    }

    #[test]
    fn status_parses_from_text() {
        assert_eq!("archived".parse::<PublishStatus>().unwrap(), PublishStatus::Archived);
        let err = "deleted".parse::<PublishStatus>().unwrap_err();
        assert_eq!(err.value, "deleted");
        assert_eq!(ContentType::Post.to_string(), "post");
    }

    #[test]
    fn normalized_fills_missing_publish_time() {
        let publication = Publication {
            status: PublishStatus::Published,
            published_at: None,
        }
        .normalized();
        assert!(publication.published_at.is_some());
    }

    #[test]
    fn slug_falls_back_to_title() {
        assert_eq!(slug_or_title(None, "Hello World"), "hello-world");
        assert_eq!(slug_or_title(Some("  "), "Hello World"), "hello-world");
        assert_eq!(slug_or_title(Some("custom"), "Hello World"), "custom");
    }
}
