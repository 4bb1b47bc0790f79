use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use gray_matter::engine::YAML;
use gray_matter::{Matter, Pod};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::{PostInput, Publication, PublishStatus};
use crate::storage::Store;

/// 导入结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// slug 冲突而跳过的文件
    pub skipped: usize,
}

/// 一篇带 front matter 的 Markdown 文章
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownPost {
    pub title: String,
    pub slug: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub excerpt: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub draft: bool,
    pub content: String,
}

/// 解析日期，支持带时区、不带时区和纯日期三种写法
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// 单个字符串或字符串列表
fn string_list(pod: &Pod) -> Vec<String> {
    match pod {
        Pod::String(s) => vec![s.clone()],
        Pod::Array(items) => items
            .iter()
            .filter_map(|item| item.as_string().ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// 解析 front matter 和正文，没有标题时用文件名
pub fn parse_markdown(source: &str, fallback_title: &str) -> MarkdownPost {
    let matter = Matter::<YAML>::new();
    let result = matter.parse(source);
    let data = result.data.unwrap_or(Pod::Null);

    let field = |key: &str| data[key].as_string().ok().filter(|s| !s.trim().is_empty());

    MarkdownPost {
        title: field("title").unwrap_or_else(|| fallback_title.to_string()),
        slug: field("slug"),
        date: field("date").as_deref().and_then(parse_date),
        excerpt: field("excerpt").unwrap_or_default(),
        categories: string_list(&data["categories"]),
        tags: string_list(&data["tags"]),
        draft: data["draft"].as_bool().unwrap_or(false),
        content: result.content.trim().to_string(),
    }
}

/// 导入目录下所有 .md 文件为指定作者的文章
pub fn import_directory(store: &Store, dir: &Path, author_id: i64, publish: bool) -> Result<ImportReport> {
    info!("从 {} 导入文章", dir.display());
    let mut report = ImportReport::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let source = fs::read_to_string(path)
            .with_context(|| format!("无法读取文件: {}", path.display()))?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Untitled");
        let post = parse_markdown(&source, stem);

        let status = if publish && !post.draft {
            PublishStatus::Published
        } else {
            PublishStatus::Draft
        };
        let input = PostInput {
            title: post.title.clone(),
            slug: post.slug.clone(),
            content: post.content,
            excerpt: post.excerpt,
            publication: Publication {
                status,
                published_at: post.date,
            },
            tags: post.tags,
            ..PostInput::default()
        };

        match store.import_post(&input, author_id, &post.categories) {
            Ok(saved) => {
                debug!("导入 {} -> {}", path.display(), saved.slug);
                report.imported += 1;
            }
            Err(e) if e.is_conflict() => {
                warn!("跳过 {}: {}", path.display(), e);
                report.skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("导入失败: {}", path.display())),
        }
    }

    info!("导入完成: {} 篇，跳过 {} 篇", report.imported, report.skipped);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, PostFilter};
    use chrono::Datelike;

    #[test]
    fn parses_front_matter() {
        let source = "---\ntitle: Hello World\ndate: 2023-06-01 08:30:00\ncategories: Rust\ntags:\n  - web\n  - cms\ndraft: true\n---\n\nBody text\n";
        let post = parse_markdown(source, "fallback");
        assert_eq!(post.title, "Hello World");
        assert_eq!(post.date.unwrap().year(), 2023);
        assert_eq!(post.categories, vec!["Rust"]);
        assert_eq!(post.tags, vec!["web", "cms"]);
        assert!(post.draft);
        assert_eq!(post.content, "Body text");
    }

    #[test]
    fn missing_front_matter_uses_file_name() {
        let post = parse_markdown("just text", "my-note");
        assert_eq!(post.title, "my-note");
        assert!(post.date.is_none());
        assert!(!post.draft);
    }

    #[test]
    fn date_formats() {
        assert!(parse_date("2024-01-02 03:04:05 +0800").is_some());
        assert!(parse_date("2024-01-02T03:04:05Z").is_some());
        assert!(parse_date("2024-01-02").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn imports_directory_and_skips_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.md"),
            "---\ntitle: First\ncategories: [News]\n---\nOne",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.md"),
            "---\ntitle: Second\ndraft: true\n---\nTwo",
        )
        .unwrap();
        fs::write(dir.path().join("c.md"), "---\ntitle: First\n---\nDuplicate slug").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = Store::open_in_memory().unwrap();
        let author = store
            .create_user(
                &NewUser {
                    username: "importer".to_string(),
                    ..NewUser::default()
                },
                "hash",
            )
            .unwrap();

        let report = import_directory(&store, dir.path(), author.id, true).unwrap();
        assert_eq!(report, ImportReport { imported: 2, skipped: 1 });

        let published = store.recent_posts(&PostFilter::published(), 10).unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "First");
        assert_eq!(published[0].categories[0].name, "News");
        assert!(store.get_category_by_slug("news").is_ok());
    }
}
