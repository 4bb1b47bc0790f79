use std::fmt::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::config::Config;
use crate::storage::Store;

struct UrlEntry {
    loc: String,
    lastmod: DateTime<Utc>,
    priority: f32,
}

/// 生成 sitemap.xml：已发布页面 0.8，分类 0.7，已发布文章 0.6
pub fn build_sitemap(store: &Store, config: &Config) -> Result<String> {
    let mut entries = Vec::new();

    for page in store.list_pages()? {
        if page.publication.is_published() {
            entries.push(UrlEntry {
                loc: config.absolute_url(&page.url()),
                lastmod: page.updated_at,
                priority: 0.8,
            });
        }
    }
    for category in store.list_categories()? {
        entries.push(UrlEntry {
            loc: config.absolute_url(&category.url()),
            lastmod: category.updated_at,
            priority: 0.7,
        });
    }
    for post in store.all_posts()? {
        if post.publication.is_published() {
            entries.push(UrlEntry {
                loc: config.absolute_url(&post.url()),
                lastmod: post.updated_at,
                priority: 0.6,
            });
        }
    }

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in &entries {
        write!(
            xml,
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>weekly</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
            html_escape::encode_text(&entry.loc),
            entry.lastmod.format("%Y-%m-%d"),
            entry.priority
        )?;
    }
    xml.push_str("</urlset>\n");
    Ok(xml)
}
