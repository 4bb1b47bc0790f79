use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{text_enum, CategoryRef, Publication, Seo, Tag};

text_enum! {
    /// 页面模板类型
    #[derive(Default)]
    pub enum TemplateKind {
        #[default]
        Default => "default",
        FullWidth => "full_width",
        Sidebar => "sidebar",
        Homepage => "homepage",
    }
}

/// 页面模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTemplate {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub template: TemplateKind,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageTemplateInput {
    pub name: String,
    pub slug: Option<String>,
    pub template: TemplateKind,
    pub description: String,
}

/// 页面
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Markdown 正文
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,
    pub template_id: Option<i64>,
    /// 关联模板的类型（查询时连表得到）
    pub template_kind: Option<TemplateKind>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub is_homepage: bool,
    #[serde(flatten)]
    pub publication: Publication,
    #[serde(flatten)]
    pub seo: Seo,
    pub tags: Vec<Tag>,
    pub categories: Vec<CategoryRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// 首页的地址是站点根目录
    pub fn url(&self) -> String {
        page_url(&self.slug, self.is_homepage)
    }

    /// 渲染时使用的模板文件
    pub fn template_name(&self) -> String {
        match self.template_kind {
            Some(kind) => format!("pages/{}.html", kind.as_str()),
            None => "pages/default.html".to_string(),
        }
    }
}

pub fn page_url(slug: &str, is_homepage: bool) -> String {
    if is_homepage {
        "/".to_string()
    } else {
        format!("/page/{}/", slug)
    }
}

/// 新建或更新页面
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageInput {
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    pub excerpt: String,
    pub featured_image: Option<String>,
    pub template_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub is_homepage: bool,
    #[serde(flatten)]
    pub publication: Publication,
    #[serde(flatten)]
    pub seo: Seo,
    /// 标签名称
    pub tags: Vec<String>,
    pub category_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homepage_url_is_root() {
        assert_eq!(page_url("about", false), "/page/about/");
        assert_eq!(page_url("about", true), "/");
    }
}
