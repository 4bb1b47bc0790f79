use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tera::Context as TeraContext;

use super::error::AppError;
use super::session::{append_cookie, removal_cookie, Flash, Visitor, FLASH_COOKIE};
use crate::core::engine::Engine;
use crate::models::{MenuLocation, User};

/// 渲染好的 HTML 页面
#[derive(Debug)]
pub struct HtmlPage {
    pub status: StatusCode,
    pub html: String,
    /// 页面展示过提示消息后清除 cookie
    pub clear_flash: bool,
}

impl HtmlPage {
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for HtmlPage {
    fn into_response(self) -> Response {
        let mut response = (self.status, Html(self.html)).into_response();
        if self.clear_flash {
            append_cookie(&mut response, removal_cookie(FLASH_COOKIE));
        }
        response
    }
}

/// 所有页面共用的模板变量：站点、主题、菜单、当前用户、提示消息和小部件
pub fn base_context(
    engine: &Engine,
    user: Option<&User>,
    flashes: &[Flash],
    path: &str,
) -> Result<TeraContext, AppError> {
    let mut context = TeraContext::new();
    context.insert("site", &engine.config.site_info());
    context.insert("theme", &engine.store.active_theme()?);

    let mut menus = BTreeMap::new();
    for location in MenuLocation::ALL {
        menus.insert(location.as_str(), engine.store.menu_for_location(*location)?);
    }
    context.insert("menus", &menus);
    context.insert("user", &user);
    context.insert("messages", flashes);
    context.insert("widget_areas", &engine.render_widget_areas()?);
    context.insert("request_path", path);
    Ok(context)
}

/// 用访问者信息补齐上下文后渲染模板
pub fn render(
    engine: &Engine,
    visitor: &Visitor,
    template: &str,
    page_context: TeraContext,
) -> Result<HtmlPage, AppError> {
    let mut context = base_context(engine, visitor.user.as_ref(), &visitor.flashes, &visitor.path)?;
    context.extend(page_context);
    let html = engine.renderer.render(template, &context)?;
    Ok(HtmlPage {
        status: StatusCode::OK,
        html,
        clear_flash: !visitor.flashes.is_empty(),
    })
}

/// 解析页码参数，无效时回到第一页
pub fn page_number(raw: Option<&str>) -> usize {
    raw.and_then(|p| p.trim().parse::<usize>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::test_support;

    #[test]
    fn page_number_defaults_to_first() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("3")), 3);
        assert_eq!(page_number(Some("0")), 1);
        assert_eq!(page_number(Some("abc")), 1);
    }

    #[test]
    fn renders_with_base_context_and_clears_flash() {
        let (engine, _) = test_support::engine();
        let visitor = Visitor {
            flashes: vec![Flash::success("Saved!")],
            path: "/contact/success/".to_string(),
            ..Visitor::default()
        };
        let page = render(&engine, &visitor, "contact/success.html", TeraContext::new()).unwrap();
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.html.contains("Saved!"));
        assert!(page.html.contains("http://cms.test") || page.html.contains("My Site"));
        assert!(page.clear_flash);

        let response = page.into_response();
        let cookie = response.headers()[axum::http::header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("cms_flash="));
        assert!(cookie.contains("Max-Age=0"));
    }
}
