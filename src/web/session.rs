use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{COOKIE, SET_COOKIE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use cookie::{Cookie, SameSite};
use serde::Serialize;
use tracing::warn;

use super::error::AppError;
use crate::core::engine::Engine;
use crate::models::User;

/// 登录会话 cookie
pub const SESSION_COOKIE: &str = "cms_session";
/// 一次性提示消息 cookie
pub const FLASH_COOKIE: &str = "cms_flash";

/// 提示消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "success" => Some(Level::Success),
            "info" => Some(Level::Info),
            "warning" => Some(Level::Warning),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

/// 跨一次跳转显示的提示消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }
}

fn encode_flashes(flashes: &[Flash]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for flash in flashes {
        serializer.append_pair(flash.level.as_str(), &flash.message);
    }
    serializer.finish()
}

fn decode_flashes(value: &str) -> Vec<Flash> {
    url::form_urlencoded::parse(value.as_bytes())
        .filter_map(|(level, message)| Level::parse(&level).map(|level| Flash::new(level, message)))
        .collect()
}

/// 读取请求中的 cookie
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn set_cookie_header(cookie: Cookie<'_>) -> Option<HeaderValue> {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("无法写入 cookie {}: {}", cookie.name(), e);
            None
        }
    }
}

fn base_cookie(name: &'static str, value: String) -> cookie::CookieBuilder<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
}

/// 登录会话 cookie
pub fn session_cookie(token: &str, ttl_hours: i64) -> Cookie<'static> {
    base_cookie(SESSION_COOKIE, token.to_string())
        .max_age(cookie::time::Duration::hours(ttl_hours))
        .build()
}

/// 让浏览器删除指定 cookie
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    base_cookie(name, String::new())
        .max_age(cookie::time::Duration::ZERO)
        .build()
}

/// 给响应追加 Set-Cookie
pub fn append_cookie(response: &mut Response, cookie: Cookie<'_>) {
    if let Some(value) = set_cookie_header(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

/// 303 跳转，同时带上提示消息
pub fn redirect_with(to: &str, flashes: Vec<Flash>) -> Response {
    let mut response = Redirect::to(to).into_response();
    if !flashes.is_empty() {
        let cookie = base_cookie(FLASH_COOKIE, encode_flashes(&flashes))
            .max_age(cookie::time::Duration::minutes(10))
            .build();
        append_cookie(&mut response, cookie);
    }
    response
}

/// 当前访问者：登录用户、待显示的提示消息和请求信息
#[derive(Debug, Clone, Default)]
pub struct Visitor {
    pub user: Option<User>,
    pub session_token: Option<String>,
    pub flashes: Vec<Flash>,
    pub path: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

impl Visitor {
    /// 需要登录的页面
    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::login_required(self.path.clone()))
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_staff)
    }
}

/// 客户端地址取自连接；`trust_forwarded_for` 开启时优先用 X-Forwarded-For 的第一项
fn client_ip(parts: &Parts, trust_forwarded_for: bool) -> Option<String> {
    let forwarded = trust_forwarded_for
        .then(|| parts.headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    forwarded.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

#[async_trait]
impl FromRequestParts<Arc<Engine>> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, engine: &Arc<Engine>) -> Result<Self, Self::Rejection> {
        let session_token = cookie_value(&parts.headers, SESSION_COOKIE);
        let user = match &session_token {
            Some(token) => engine.store.session_user(token)?,
            None => None,
        };
        let flashes = cookie_value(&parts.headers, FLASH_COOKIE)
            .map(|v| decode_flashes(&v))
            .unwrap_or_default();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(Visitor {
            user,
            session_token,
            flashes,
            path,
            ip_address: client_ip(parts, engine.config.trust_forwarded_for),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flashes_survive_cookie_encoding() {
        let flashes = vec![
            Flash::success("Your comment has been posted."),
            Flash::info("Visible after moderation; thanks & bye"),
        ];
        let encoded = encode_flashes(&flashes);
        assert!(!encoded.contains(';'));
        assert_eq!(decode_flashes(&encoded), flashes);
        assert!(decode_flashes("bogus=1").is_empty());
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; cms_session=abc; b=2"));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, FLASH_COOKIE), None);
    }

    fn request_parts(forwarded: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::get("/");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000))));
        parts
    }

    #[test]
    fn client_ip_ignores_forwarded_header_unless_trusted() {
        let parts = request_parts(Some("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&parts, false).as_deref(), Some("10.0.0.7"));
        assert_eq!(client_ip(&parts, true).as_deref(), Some("203.0.113.9"));

        let parts = request_parts(None);
        assert_eq!(client_ip(&parts, true).as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn redirect_sets_flash_cookie() {
        let response = redirect_with("/", vec![Flash::error("nope")]);
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("cms_flash=error=nope"));
        assert!(cookie.contains("Path=/"));
    }
}
