use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::error::AppError;
use super::render::{page_number, render, HtmlPage};
use super::session::Visitor;
use crate::core::engine::Engine;
use crate::models::{PageRequest, Paginated};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<String>,
}

/// 全站搜索，空关键词没有结果
pub async fn search(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<SearchQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let q = query.q.trim();
    let results = engine.store.search(q)?;
    let request = PageRequest::new(page_number(query.page.as_deref()), engine.config.per_page);
    let search_base = format!(
        "/search/?{}&",
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("q", q)
            .finish()
    );

    let mut context = TeraContext::new();
    context.insert("query", q);
    context.insert("results", &Paginated::from_vec(results.hits, request));
    context.insert("search_base", &search_base);
    render(&engine, &visitor, "search/results.html", context)
}
