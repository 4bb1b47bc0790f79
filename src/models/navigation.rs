use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::category_url;
use super::content::text_enum;
use super::page::page_url;

text_enum! {
    /// 菜单位置
    #[derive(Default)]
    pub enum MenuLocation {
        #[default]
        Header => "header",
        Footer => "footer",
        Sidebar => "sidebar",
    }
}

text_enum! {
    /// 菜单项类型
    #[derive(Default)]
    pub enum MenuItemType {
        Page => "page",
        Category => "category",
        #[default]
        Custom => "custom",
    }
}

/// 菜单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub location: MenuLocation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MenuInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
    pub location: MenuLocation,
}

/// 菜单项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub menu_id: i64,
    pub title: String,
    pub item_type: MenuItemType,
    pub page_id: Option<i64>,
    pub category_id: Option<i64>,
    /// 仅自定义链接使用
    pub url: String,
    pub target_blank: bool,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    /// 关联页面的 slug 和首页标记（连表得到）
    pub page_slug: Option<String>,
    pub page_is_homepage: Option<bool>,
    /// 关联分类的 slug（连表得到）
    pub category_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    /// 解析菜单项的链接
    pub fn resolved_url(&self) -> String {
        match (self.item_type, &self.page_slug, &self.category_slug) {
            (MenuItemType::Page, Some(slug), _) => {
                page_url(slug, self.page_is_homepage.unwrap_or(false))
            }
            (MenuItemType::Category, _, Some(slug)) => category_url(slug),
            _ => self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MenuItemInput {
    pub menu_id: i64,
    pub title: String,
    pub item_type: MenuItemType,
    pub page_id: Option<i64>,
    pub category_id: Option<i64>,
    pub url: String,
    pub target_blank: bool,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
}

/// 渲染用的菜单树节点
#[derive(Debug, Clone, Serialize)]
pub struct MenuNode {
    pub title: String,
    pub url: String,
    pub target_blank: bool,
    pub children: Vec<MenuNode>,
}

/// 渲染用的菜单
#[derive(Debug, Clone, Serialize)]
pub struct MenuTree {
    pub name: String,
    pub slug: String,
    pub location: MenuLocation,
    pub items: Vec<MenuNode>,
}

impl MenuTree {
    /// 由扁平的菜单项构建树，子项保持原有顺序
    pub fn build(menu: &Menu, items: &[MenuItem]) -> Self {
        Self {
            name: menu.name.clone(),
            slug: menu.slug.clone(),
            location: menu.location,
            items: children_of(None, items),
        }
    }
}

fn children_of(parent: Option<i64>, items: &[MenuItem]) -> Vec<MenuNode> {
    items
        .iter()
        .filter(|item| item.parent_id == parent)
        .map(|item| MenuNode {
            title: item.title.clone(),
            url: item.resolved_url(),
            target_blank: item.target_blank,
            children: children_of(Some(item.id), items),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, parent_id: Option<i64>, item_type: MenuItemType) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id,
            menu_id: 1,
            title: format!("item {}", id),
            item_type,
            page_id: None,
            category_id: None,
            url: "/custom/".to_string(),
            target_blank: false,
            parent_id,
            sort_order: id,
            page_slug: None,
            page_is_homepage: None,
            category_slug: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn resolves_page_and_category_urls() {
        let mut page_item = item(1, None, MenuItemType::Page);
        page_item.page_slug = Some("about".to_string());
        page_item.page_is_homepage = Some(false);
        assert_eq!(page_item.resolved_url(), "/page/about/");

        page_item.page_is_homepage = Some(true);
        assert_eq!(page_item.resolved_url(), "/");

        let mut category_item = item(2, None, MenuItemType::Category);
        category_item.category_slug = Some("news".to_string());
        assert_eq!(category_item.resolved_url(), "/categories/news/");

        // 类型为页面但没有关联页面时回退到自定义链接
        let dangling = item(3, None, MenuItemType::Page);
        assert_eq!(dangling.resolved_url(), "/custom/");
    }

    #[test]
    fn builds_nested_tree() {
        let now = Utc::now();
        let menu = Menu {
            id: 1,
            name: "Main".to_string(),
            slug: "main".to_string(),
            description: String::new(),
            location: MenuLocation::Header,
            created_at: now,
            updated_at: now,
        };
        let items = vec![
            item(1, None, MenuItemType::Custom),
            item(2, Some(1), MenuItemType::Custom),
            item(3, None, MenuItemType::Custom),
        ];
        let tree = MenuTree::build(&menu, &items);
        assert_eq!(tree.items.len(), 2);
        assert_eq!(tree.items[0].children.len(), 1);
        assert_eq!(tree.items[0].children[0].title, "item 2");
        assert!(tree.items[1].children.is_empty());
    }
}
