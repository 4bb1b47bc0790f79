use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tera::Context as TeraContext;
use tracing::warn;

use super::engine::Engine;
use crate::models::{PostFilter, Widget, WidgetType};

/// 渲染好的小部件
#[derive(Debug, Clone, Serialize)]
pub struct RenderedWidget {
    pub id: i64,
    pub title: String,
    pub widget_type: WidgetType,
    pub html: String,
}

impl Engine {
    /// 准备小部件模板需要的数据
    fn widget_context(&self, widget: &Widget) -> Result<TeraContext> {
        let mut context = TeraContext::new();
        context.insert("site", &self.config.site_info());
        context.insert("widget", widget);
        let limit = widget.count().max(0) as usize;
        match widget.widget_type {
            WidgetType::RecentPosts => {
                context.insert("posts", &self.store.recent_posts(&PostFilter::published(), limit)?);
            }
            WidgetType::PopularPosts => {
                context.insert("posts", &self.store.popular_posts(limit)?);
            }
            WidgetType::FeaturedPosts => {
                context.insert("posts", &self.store.featured_posts(limit)?);
            }
            WidgetType::Categories => {
                context.insert("categories", &self.store.popular_categories(limit)?);
            }
            WidgetType::Tags => {
                context.insert("tags", &self.store.popular_tags(limit)?);
            }
            _ => {}
        }
        Ok(context)
    }

    /// 渲染单个小部件。渲染失败时记录日志并返回 None
    pub fn render_widget(&self, widget: &Widget) -> Option<RenderedWidget> {
        let html = self
            .widget_context(widget)
            .and_then(|context| self.renderer.render(&widget.template_name(), &context));
        match html {
            Ok(html) => Some(RenderedWidget {
                id: widget.id,
                title: widget.title.clone(),
                widget_type: widget.widget_type,
                html,
            }),
            Err(e) => {
                warn!("小部件 {} ({}) 渲染失败: {}", widget.title, widget.widget_type, e);
                None
            }
        }
    }

    /// 按区域 slug 渲染所有激活的小部件
    pub fn render_widget_areas(&self) -> Result<BTreeMap<String, Vec<RenderedWidget>>> {
        let mut areas = BTreeMap::new();
        for area in self.store.list_widget_areas()? {
            let widgets = self
                .store
                .active_widgets(area.id)?
                .iter()
                .filter_map(|w| self.render_widget(w))
                .collect();
            areas.insert(area.slug, widgets);
        }
        Ok(areas)
    }
}
