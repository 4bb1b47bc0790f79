use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{text_enum, ContentRef};

text_enum! {
    /// 小部件类型
    #[derive(Default)]
    pub enum WidgetType {
        #[default]
        Text => "text",
        Html => "html",
        RecentPosts => "recent_posts",
        PopularPosts => "popular_posts",
        Categories => "categories",
        Tags => "tags",
        Newsletter => "newsletter",
        Social => "social",
        Image => "image",
        Hero => "hero",
        Features => "features",
        FeaturedPosts => "featured_posts",
        CallToAction => "call_to_action",
        Custom => "custom",
    }
}

impl WidgetType {
    /// 数据类小部件默认展示的条目数
    pub fn default_count(&self) -> Option<i64> {
        match self {
            WidgetType::RecentPosts | WidgetType::PopularPosts => Some(5),
            WidgetType::FeaturedPosts => Some(3),
            WidgetType::Categories => Some(10),
            WidgetType::Tags => Some(20),
            _ => None,
        }
    }
}

/// 小部件区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetArea {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WidgetAreaInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
}

/// 小部件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: i64,
    pub title: String,
    pub widget_type: WidgetType,
    pub area_id: i64,
    pub content: String,
    pub sort_order: i64,
    pub is_active: bool,
    /// 自定义小部件可以关联任意内容
    pub target: Option<ContentRef>,
    /// 类型相关的设置
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Widget {
    pub fn template_name(&self) -> String {
        format!("widgets/types/{}.html", self.widget_type.as_str())
    }

    /// 读取 settings.count，缺省时使用类型默认值
    pub fn count(&self) -> i64 {
        self.settings
            .get("count")
            .and_then(|v| v.as_i64())
            .filter(|n| *n > 0)
            .or_else(|| self.widget_type.default_count())
            .unwrap_or(5)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WidgetInput {
    pub title: String,
    pub widget_type: WidgetType,
    pub area_id: i64,
    pub content: String,
    pub sort_order: i64,
    pub is_active: bool,
    pub target: Option<ContentRef>,
    pub settings: serde_json::Value,
}

impl Default for WidgetInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            widget_type: WidgetType::default(),
            area_id: 0,
            content: String::new(),
            sort_order: 0,
            is_active: true,
            target: None,
            settings: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}
