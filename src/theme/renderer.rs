use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use pulldown_cmark::{html, Options, Parser};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// 内置模板（默认主题）
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("macros.html", include_str!("../../templates/macros.html")),
    ("pages/default.html", include_str!("../../templates/pages/default.html")),
    ("pages/full_width.html", include_str!("../../templates/pages/full_width.html")),
    ("pages/sidebar.html", include_str!("../../templates/pages/sidebar.html")),
    ("pages/homepage.html", include_str!("../../templates/pages/homepage.html")),
    ("pages/list.html", include_str!("../../templates/pages/list.html")),
    ("pages/tag.html", include_str!("../../templates/pages/tag.html")),
    ("categories/list.html", include_str!("../../templates/categories/list.html")),
    ("categories/detail.html", include_str!("../../templates/categories/detail.html")),
    ("blog/list.html", include_str!("../../templates/blog/list.html")),
    ("blog/detail.html", include_str!("../../templates/blog/detail.html")),
    ("blog/dashboard.html", include_str!("../../templates/blog/dashboard.html")),
    ("search/results.html", include_str!("../../templates/search/results.html")),
    ("newsletter/subscribe.html", include_str!("../../templates/newsletter/subscribe.html")),
    ("newsletter/subscribe_success.html", include_str!("../../templates/newsletter/subscribe_success.html")),
    ("newsletter/confirm_success.html", include_str!("../../templates/newsletter/confirm_success.html")),
    ("newsletter/unsubscribe.html", include_str!("../../templates/newsletter/unsubscribe.html")),
    ("newsletter/unsubscribe_success.html", include_str!("../../templates/newsletter/unsubscribe_success.html")),
    ("emails/newsletter_confirmation.txt", include_str!("../../templates/emails/newsletter_confirmation.txt")),
    ("emails/newsletter.txt", include_str!("../../templates/emails/newsletter.txt")),
    ("accounts/login.html", include_str!("../../templates/accounts/login.html")),
    ("accounts/password_change.html", include_str!("../../templates/accounts/password_change.html")),
    ("accounts/profile.html", include_str!("../../templates/accounts/profile.html")),
    ("accounts/profile_edit.html", include_str!("../../templates/accounts/profile_edit.html")),
    ("contact/form.html", include_str!("../../templates/contact/form.html")),
    ("contact/success.html", include_str!("../../templates/contact/success.html")),
    ("media/list.html", include_str!("../../templates/media/list.html")),
    ("media/detail.html", include_str!("../../templates/media/detail.html")),
    ("errors/404.html", include_str!("../../templates/errors/404.html")),
    ("errors/500.html", include_str!("../../templates/errors/500.html")),
    ("widgets/types/text.html", include_str!("../../templates/widgets/types/text.html")),
    ("widgets/types/html.html", include_str!("../../templates/widgets/types/html.html")),
    ("widgets/types/recent_posts.html", include_str!("../../templates/widgets/types/recent_posts.html")),
    ("widgets/types/popular_posts.html", include_str!("../../templates/widgets/types/popular_posts.html")),
    ("widgets/types/featured_posts.html", include_str!("../../templates/widgets/types/featured_posts.html")),
    ("widgets/types/categories.html", include_str!("../../templates/widgets/types/categories.html")),
    ("widgets/types/tags.html", include_str!("../../templates/widgets/types/tags.html")),
    ("widgets/types/newsletter.html", include_str!("../../templates/widgets/types/newsletter.html")),
    ("widgets/types/social.html", include_str!("../../templates/widgets/types/social.html")),
    ("widgets/types/image.html", include_str!("../../templates/widgets/types/image.html")),
    ("widgets/types/hero.html", include_str!("../../templates/widgets/types/hero.html")),
    ("widgets/types/features.html", include_str!("../../templates/widgets/types/features.html")),
    ("widgets/types/call_to_action.html", include_str!("../../templates/widgets/types/call_to_action.html")),
    ("widgets/types/custom.html", include_str!("../../templates/widgets/types/custom.html")),
];

/// 模板覆盖目录中识别的后缀
const TEMPLATE_EXTENSIONS: &[&str] = &["html", "txt", "xml"];

/// 站点模板渲染器
#[derive(Clone)]
pub struct ThemeRenderer {
    /// 模板引擎
    pub tera: Tera,
}

impl ThemeRenderer {
    /// 加载内置模板，`theme_dir` 中的同名文件覆盖内置模板
    pub fn new(theme_dir: Option<&Path>) -> Result<Self> {
        let mut sources: BTreeMap<String, String> = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_string()))
            .collect();

        if let Some(dir) = theme_dir {
            if dir.exists() {
                let overrides = load_overrides(dir)?;
                info!("从 {} 加载了 {} 个主题模板", dir.display(), overrides.len());
                sources.extend(overrides);
            } else {
                warn!("主题目录不存在，使用内置模板: {}", dir.display());
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources.into_iter().collect::<Vec<_>>())
            .context("模板解析失败")?;
        Self::register_filters(&mut tera);

        Ok(ThemeRenderer { tera })
    }

    /// 注册模板过滤器
    fn register_filters(tera: &mut Tera) {
        tera.register_filter("date_format", Self::date_format_filter);
        tera.register_filter("markdown", Self::markdown_filter);
    }

    /// 渲染模板
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        match self.tera.render(template, context) {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("模板渲染失败 {}: {:?}", template, e);
                Err(anyhow!(e))
            }
        }
    }

    /// 检查模板是否存在
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    fn date_format_filter(value: &tera::Value, args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        if let Some(date) = value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            let format = args.get("format")
                .and_then(|f| f.as_str())
                .unwrap_or("%Y-%m-%d");
            Ok(tera::Value::String(date.format(format).to_string()))
        } else {
            Ok(value.clone())
        }
    }

    fn markdown_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        match value.as_str() {
            Some(text) => Ok(tera::Value::String(markdown_to_html(text))),
            None => Ok(value.clone()),
        }
    }
}

/// Markdown 转 HTML
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(text, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn load_overrides(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut templates = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext));
        if !entry.file_type().is_file() || !supported {
            continue;
        }
        let name = path
            .strip_prefix(dir)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let body = fs::read_to_string(path)
            .with_context(|| format!("无法读取模板: {}", path.display()))?;
        debug!("覆盖模板: {}", name);
        templates.push((name, body));
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_parse() {
        let renderer = ThemeRenderer::new(None).unwrap();
        for (name, _) in BUILTIN_TEMPLATES {
            assert!(renderer.has_template(name), "{name}");
        }
    }

    #[test]
    fn theme_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("errors")).unwrap();
        fs::write(dir.path().join("errors/404.html"), "custom missing page").unwrap();

        let renderer = ThemeRenderer::new(Some(dir.path())).unwrap();
        let html = renderer.render("errors/404.html", &TeraContext::new()).unwrap();
        assert_eq!(html, "custom missing page");
    }

    #[test]
    fn filters() {
        let mut tera = Tera::default();
        ThemeRenderer::register_filters(&mut tera);
        tera.add_raw_template(
            "t.txt",
            "{{ when | date_format(format=\"%d/%m/%Y\") }}|{{ body | markdown }}",
        )
        .unwrap();
        let mut context = TeraContext::new();
        context.insert("when", "2024-03-05T10:00:00Z");
        context.insert("body", "**bold**");
        let out = tera.render("t.txt", &context).unwrap();
        assert_eq!(out, "05/03/2024|<p><strong>bold</strong></p>\n");
    }
}
