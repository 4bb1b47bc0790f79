use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::debug;

use super::error::Result;
use super::{collect_rows, Store};
use crate::models::category::category_url;
use crate::models::page::page_url;
use crate::models::post::post_url;
use crate::models::ContentType;

/// 摘要最多保留的字符数
const SUMMARY_CHARS: usize = 150;

/// 一条搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// 结果类型（page / post / category）
    pub kind: ContentType,
    pub title: String,
    pub url: String,
    /// 摘要，没有时截取正文开头
    pub summary: String,
}

/// 全站搜索结果：页面在前，然后是文章和分类
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

fn summarize(excerpt: &str, content: &str) -> String {
    let source = if excerpt.trim().is_empty() { content } else { excerpt };
    match source.char_indices().nth(SUMMARY_CHARS) {
        Some((idx, _)) => format!("{}...", &source[..idx]),
        None => source.to_string(),
    }
}

/// 转义 LIKE 通配符
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn search_table(
    conn: &Connection,
    kind: ContentType,
    sql: &str,
    pattern: &str,
) -> Result<Vec<SearchHit>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![pattern], |row| {
        let slug: String = row.get(1)?;
        let is_homepage: bool = row.get(4)?;
        let url = match kind {
            ContentType::Page => page_url(&slug, is_homepage),
            ContentType::Post => post_url(&slug),
            ContentType::Category => category_url(&slug),
        };
        Ok(SearchHit {
            kind,
            title: row.get(0)?,
            url,
            summary: summarize(&row.get::<_, String>(2)?, &row.get::<_, String>(3)?),
        })
    })?;
    collect_rows(rows)
}

impl Store {
    /// 在已发布的页面、文章以及分类中搜索（不区分大小写）。空查询返回空结果
    pub fn search(&self, query: &str) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }
        let pattern = like_pattern(query);
        let conn = self.lock_conn()?;

        let mut hits = search_table(
            &conn,
            ContentType::Page,
            "SELECT title, slug, excerpt, content, is_homepage FROM pages
             WHERE status = 'published' AND (
                 title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\'
                 OR excerpt LIKE ?1 ESCAPE '\\' OR meta_title LIKE ?1 ESCAPE '\\'
                 OR meta_description LIKE ?1 ESCAPE '\\' OR meta_keywords LIKE ?1 ESCAPE '\\')
             ORDER BY published_at DESC, id DESC",
            &pattern,
        )?;
        hits.extend(search_table(
            &conn,
            ContentType::Post,
            "SELECT title, slug, excerpt, content, 0 FROM posts
             WHERE status = 'published' AND (
                 title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\'
                 OR excerpt LIKE ?1 ESCAPE '\\' OR meta_title LIKE ?1 ESCAPE '\\'
                 OR meta_description LIKE ?1 ESCAPE '\\' OR meta_keywords LIKE ?1 ESCAPE '\\')
             ORDER BY published_at DESC, id DESC",
            &pattern,
        )?);
        hits.extend(search_table(
            &conn,
            ContentType::Category,
            "SELECT name, slug, '', description, 0 FROM categories
             WHERE name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'
                 OR meta_title LIKE ?1 ESCAPE '\\' OR meta_description LIKE ?1 ESCAPE '\\'
                 OR meta_keywords LIKE ?1 ESCAPE '\\'
             ORDER BY sort_order, name",
            &pattern,
        )?);

        debug!("搜索 \"{}\": {} 条结果", query, hits.len());
        Ok(SearchResults {
            query: query.to_string(),
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use crate::models::{CategoryInput, PageInput, PostInput, Publication, PublishStatus};

    fn published() -> Publication {
        Publication {
            status: PublishStatus::Published,
            published_at: None,
        }
    }

    #[test]
    fn empty_query_has_no_results() {
        let store = test_support::store();
        assert!(store.search("").unwrap().is_empty());
        assert!(store.search("   ").unwrap().is_empty());
    }

    #[test]
    fn finds_published_content_case_insensitively() {
        let store = test_support::store();
        let author = test_support::user(&store, "author");
        store
            .create_page(&PageInput {
                title: "About Rust".to_string(),
                publication: published(),
                ..PageInput::default()
            })
            .unwrap();
        store
            .create_page(&PageInput {
                title: "Draft rust notes".to_string(),
                ..PageInput::default()
            })
            .unwrap();
        store
            .create_post(
                &PostInput {
                    title: "Weekly".to_string(),
                    content: "All about RUST this week".to_string(),
                    publication: published(),
                    ..PostInput::default()
                },
                author.id,
            )
            .unwrap();
        store
            .create_category(&CategoryInput {
                name: "Misc".to_string(),
                description: "rust and friends".to_string(),
                ..CategoryInput::default()
            })
            .unwrap();

        let results = store.search("rust").unwrap();
        let kinds: Vec<_> = results.hits.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![ContentType::Page, ContentType::Post, ContentType::Category]);
        assert_eq!(results.hits[0].url, "/page/about-rust/");
        assert_eq!(results.hits[1].summary, "All about RUST this week");
    }

    #[test]
    fn wildcards_are_literal() {
        let store = test_support::store();
        store
            .create_page(&PageInput {
                title: "Plain".to_string(),
                publication: published(),
                ..PageInput::default()
            })
            .unwrap();
        assert!(store.search("%").unwrap().is_empty());
    }

    #[test]
    fn long_content_is_truncated() {
        let long = "字".repeat(200);
        let summary = summarize("", &long);
        assert_eq!(summary.chars().count(), SUMMARY_CHARS + 3);
        assert_eq!(summarize("short", &long), "short");
    }
}
