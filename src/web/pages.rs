use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tera::Context as TeraContext;

use super::error::AppError;
use super::render::{page_number, render, HtmlPage};
use super::session::Visitor;
use super::ListQuery;
use crate::core::engine::Engine;
use crate::core::sitemap::build_sitemap;
use crate::models::PageRequest;

/// 首页：标记为首页的页面，否则最早创建的已发布页面
pub async fn homepage(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    let page = engine.store.homepage()?.ok_or(AppError::NotFound)?;
    let mut context = TeraContext::new();
    context.insert("page", &page);
    render(&engine, &visitor, &page.template_name(), context)
}

pub async fn page_list(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<ListQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let request = PageRequest::new(page_number(query.page.as_deref()), engine.config.per_page);
    let pages = engine.store.published_pages(None, request)?;
    let mut context = TeraContext::new();
    context.insert("pages", &pages);
    render(&engine, &visitor, "pages/list.html", context)
}

pub async fn page_detail(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let page = engine.store.get_published_page(&slug)?;
    let mut context = TeraContext::new();
    context.insert("page", &page);
    render(&engine, &visitor, &page.template_name(), context)
}

pub async fn tag_pages(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let tag = engine.store.get_tag_by_slug(&slug)?;
    let request = PageRequest::new(page_number(query.page.as_deref()), engine.config.per_page);
    let pages = engine.store.published_pages(Some(&tag.slug), request)?;
    let mut context = TeraContext::new();
    context.insert("tag", &tag);
    context.insert("pages", &pages);
    render(&engine, &visitor, "pages/tag.html", context)
}

pub async fn category_list(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    let mut context = TeraContext::new();
    context.insert("categories", &engine.store.top_level_categories()?);
    render(&engine, &visitor, "categories/list.html", context)
}

pub async fn category_detail(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let store = &engine.store;
    let category = store.get_category_by_slug(&slug)?;
    let mut context = TeraContext::new();
    context.insert("pages", &store.pages_in_category(category.id)?);
    context.insert("subcategories", &store.child_categories(category.id)?);
    context.insert("ancestors", &store.ancestors(&category)?);
    context.insert("category", &category);
    render(&engine, &visitor, "categories/detail.html", context)
}

pub async fn sitemap(State(engine): State<Arc<Engine>>) -> Result<impl IntoResponse, AppError> {
    let xml = build_sitemap(&engine.store, &engine.config)?;
    Ok(([(CONTENT_TYPE, "application/xml; charset=utf-8")], xml))
}
