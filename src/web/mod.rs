//! 站点的 HTTP 层：公开页面、账户、媒体库和管理接口

pub mod accounts;
pub mod admin;
pub mod blog;
pub mod comments;
pub mod contact;
pub mod error;
pub mod forms;
pub mod media;
pub mod newsletter;
pub mod pages;
pub mod render;
pub mod search;
pub mod session;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::core::engine::Engine;
use error::{AppError, ErrorPage};

/// 列表页的分页参数
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
}

/// 把带 `ErrorPage` 标记的响应换成主题的错误页面
async fn error_pages(State(engine): State<Arc<Engine>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let Some(ErrorPage(status)) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };
    let template = if status == StatusCode::NOT_FOUND {
        "errors/404.html"
    } else {
        "errors/500.html"
    };
    let html = render::base_context(&engine, None, &[], &path)
        .and_then(|context| Ok(engine.renderer.render(template, &context)?));
    match html {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("错误页面渲染失败: {}", e);
            response
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// 组装全部路由
pub fn router(engine: Arc<Engine>) -> Router {
    let media_files = ServeDir::new(&engine.config.media_dir);
    let static_files = ServeDir::new(&engine.config.static_dir);

    Router::new()
        // 页面和分类
        .route("/", get(pages::homepage))
        .route("/pages/", get(pages::page_list))
        .route("/page/:slug/", get(pages::page_detail))
        .route("/tag/:slug/", get(pages::tag_pages))
        .route("/categories/", get(pages::category_list))
        .route("/categories/:slug/", get(pages::category_detail))
        .route("/sitemap.xml", get(pages::sitemap))
        // 博客
        .route("/blog/", get(blog::index))
        .route("/blog/post/:slug/", get(blog::detail))
        .route("/blog/category/:slug/", get(blog::by_category))
        .route("/blog/tag/:slug/", get(blog::by_tag))
        .route("/blog/author/:username/", get(blog::by_author))
        .route("/blog/dashboard/", get(blog::dashboard))
        .route("/blog/feed.rss", get(blog::rss))
        .route("/blog/feed.atom", get(blog::atom))
        .route("/search/", get(search::search))
        // 评论
        .route("/comments/post/:content_type/:object_id/", post(comments::post))
        .route("/comments/post/:content_type/:object_id/:parent_id/", post(comments::reply))
        .route("/comments/delete/:id/", get(comments::delete).post(comments::delete))
        .route("/comments/approve/:id/", get(comments::approve).post(comments::approve))
        .route("/comments/reject/:id/", get(comments::reject).post(comments::reject))
        // 邮件订阅
        .route(
            "/newsletter/subscribe/",
            get(newsletter::subscribe_form).post(newsletter::subscribe),
        )
        .route("/newsletter/subscribe/success/", get(newsletter::subscribe_success))
        .route("/newsletter/confirm/success/", get(newsletter::confirm_success))
        .route("/newsletter/confirm/:token/", get(newsletter::confirm))
        .route("/newsletter/unsubscribe/success/", get(newsletter::unsubscribe_success))
        .route(
            "/newsletter/unsubscribe/:token/",
            get(newsletter::unsubscribe_form).post(newsletter::unsubscribe),
        )
        // 账户
        .route("/login/", get(accounts::login_form).post(accounts::login))
        .route("/logout/", get(accounts::logout).post(accounts::logout))
        .route(
            "/password-change/",
            get(accounts::password_change_form).post(accounts::password_change),
        )
        .route("/profile/", get(accounts::profile))
        .route(
            "/profile/edit/",
            get(accounts::profile_edit_form).post(accounts::profile_edit),
        )
        .route("/contact/", get(contact::contact_form).post(contact::contact))
        .route("/contact/success/", get(contact::contact_success))
        // 媒体库
        .route("/media-library/", get(media::list))
        .route(
            "/media-library/upload/",
            post(media::upload).layer(DefaultBodyLimit::max(media::MAX_UPLOAD_BYTES)),
        )
        .route("/media-library/:slug/", get(media::detail))
        .nest("/admin/api", admin::router())
        .nest_service("/media", media_files)
        .nest_service("/static", static_files)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(engine.clone(), error_pages))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}
