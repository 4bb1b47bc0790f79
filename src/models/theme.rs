use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 站点主题（同一时间只有一个处于激活状态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub is_active: bool,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub font_family: String,
    pub heading_font_family: String,
    pub container_width: String,
    pub custom_css: String,
    pub custom_js: String,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_THEME_NAME: &str = "Default Theme";

/// 新建或更新主题
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThemeInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
    pub is_active: bool,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub font_family: String,
    pub heading_font_family: String,
    pub container_width: String,
    pub custom_css: String,
    pub custom_js: String,
    pub logo: Option<String>,
    pub favicon: Option<String>,
}

impl Default for ThemeInput {
    fn default() -> Self {
        Self {
            name: DEFAULT_THEME_NAME.to_string(),
            slug: None,
            description: String::new(),
            is_active: false,
            primary_color: "#3490dc".to_string(),
            secondary_color: "#ffed4a".to_string(),
            accent_color: "#f66d9b".to_string(),
            font_family: "'Inter', sans-serif".to_string(),
            heading_font_family: String::new(),
            container_width: "1200px".to_string(),
            custom_css: String::new(),
            custom_js: String::new(),
            logo: None,
            favicon: None,
        }
    }
}

impl ThemeInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}
