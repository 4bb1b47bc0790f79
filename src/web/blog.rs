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
use crate::core::feeds::{atom_feed, rss_feed, FEED_SIZE};
use crate::models::{ContentRef, ContentType, PageRequest, PostFilter};

const FEATURED_COUNT: usize = 3;
const POPULAR_CATEGORY_COUNT: usize = 5;
const RELATED_COUNT: usize = 3;
const POPULAR_COUNT: usize = 3;

/// 文章列表页，首页、分类、标签和作者列表共用
fn post_list(
    engine: &Engine,
    visitor: &Visitor,
    filter: PostFilter,
    page: Option<&str>,
    heading: Option<String>,
    base_path: &str,
) -> Result<HtmlPage, AppError> {
    let store = &engine.store;
    let request = PageRequest::new(page_number(page), engine.config.per_page);
    let mut context = TeraContext::new();
    context.insert("posts", &store.list_posts(&filter, request)?);
    context.insert("featured_posts", &store.featured_posts(FEATURED_COUNT)?);
    context.insert("popular_categories", &store.popular_categories(POPULAR_CATEGORY_COUNT)?);
    context.insert("heading", &heading);
    context.insert("base_path", base_path);
    render(engine, visitor, "blog/list.html", context)
}

pub async fn index(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<ListQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    post_list(&engine, &visitor, PostFilter::published(), query.page.as_deref(), None, "/blog/")
}

pub async fn by_category(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let category = engine.store.get_category_by_slug(&slug)?;
    let filter = PostFilter {
        category_id: Some(category.id),
        ..PostFilter::published()
    };
    post_list(
        &engine,
        &visitor,
        filter,
        query.page.as_deref(),
        Some(format!("Category: {}", category.name)),
        &format!("/blog/category/{}/", category.slug),
    )
}

pub async fn by_tag(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let tag = engine.store.get_tag_by_slug(&slug)?;
    let filter = PostFilter {
        tag_slug: Some(tag.slug.clone()),
        ..PostFilter::published()
    };
    post_list(
        &engine,
        &visitor,
        filter,
        query.page.as_deref(),
        Some(format!("Tag: {}", tag.name)),
        &format!("/blog/tag/{}/", tag.slug),
    )
}

pub async fn by_author(
    State(engine): State<Arc<Engine>>,
    Path(username): Path<String>,
    Query(query): Query<ListQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let author = engine.store.get_user_by_username(&username)?;
    let filter = PostFilter {
        author_id: Some(author.id),
        ..PostFilter::published()
    };
    post_list(
        &engine,
        &visitor,
        filter,
        query.page.as_deref(),
        Some(format!("Posts by {}", author.display_name())),
        &format!("/blog/author/{}/", author.username),
    )
}

pub async fn detail(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let store = &engine.store;
    let post = store.get_published_post(&slug)?;
    let mut context = TeraContext::new();
    context.insert("related_posts", &store.related_posts(&post, RELATED_COUNT)?);
    context.insert("popular_posts", &store.popular_posts(POPULAR_COUNT)?);
    context.insert(
        "comments",
        &store.comments_for(ContentRef::new(ContentType::Post, post.id))?,
    );
    context.insert("post", &post);
    render(&engine, &visitor, "blog/detail.html", context)
}

/// 作者后台：自己的全部文章和各状态数量
pub async fn dashboard(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    let user = visitor.require_user()?;
    let filter = PostFilter {
        author_id: Some(user.id),
        order_by_created: true,
        ..PostFilter::default()
    };
    let mut context = TeraContext::new();
    context.insert("posts", &engine.store.recent_posts(&filter, i64::MAX as usize)?);
    context.insert("counts", &engine.store.status_counts(user.id)?);
    render(&engine, &visitor, "blog/dashboard.html", context)
}

pub async fn rss(State(engine): State<Arc<Engine>>) -> Result<impl IntoResponse, AppError> {
    let posts = engine.store.recent_posts(&PostFilter::published(), FEED_SIZE)?;
    Ok((
        [(CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        rss_feed(&engine.config, &posts),
    ))
}

pub async fn atom(State(engine): State<Arc<Engine>>) -> Result<impl IntoResponse, AppError> {
    let posts = engine.store.recent_posts(&PostFilter::published(), FEED_SIZE)?;
    Ok((
        [(CONTENT_TYPE, "application/atom+xml; charset=utf-8")],
        atom_feed(&engine.config, &posts),
    ))
}
