use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tera::Context as TeraContext;
use tracing::info;

use super::error::AppError;
use super::render::{page_number, render, HtmlPage};
use super::session::Visitor;
use crate::auth::random_token;
use crate::core::engine::Engine;
use crate::models::media::human_size;
use crate::models::{MediaFilter, MediaItemInput, MediaType, PageRequest};
use crate::utils::slugify;

const MEDIA_PER_PAGE: usize = 20;
/// 单个上传文件的大小上限
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
/// 上传文件在媒体目录下的子目录
const UPLOAD_DIR: &str = "library";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MediaQuery {
    #[serde(default, rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub q: String,
    #[serde(skip_serializing)]
    pub page: Option<String>,
}

impl MediaQuery {
    fn to_filter(&self) -> MediaFilter {
        MediaFilter {
            file_type: self.file_type.parse::<MediaType>().ok(),
            category_slug: Some(self.category.trim().to_string()).filter(|c| !c.is_empty()),
            query: Some(self.q.trim().to_string()).filter(|q| !q.is_empty()),
        }
    }

    /// 翻页链接的前缀，保留筛选条件
    fn page_base(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in [("type", &self.file_type), ("category", &self.category), ("q", &self.q)] {
            if !value.is_empty() {
                serializer.append_pair(key, value);
            }
        }
        let query = serializer.finish();
        if query.is_empty() {
            "/media-library/?".to_string()
        } else {
            format!("/media-library/?{query}&")
        }
    }
}

/// 媒体库列表，可按类型、分类和关键词筛选
pub async fn list(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<MediaQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    visitor.require_user()?;
    let request = PageRequest::new(page_number(query.page.as_deref()), MEDIA_PER_PAGE);
    let items = engine.store.list_media(&query.to_filter(), request)?;
    let media_types: Vec<&str> = MediaType::ALL.iter().map(MediaType::as_str).collect();

    let mut context = TeraContext::new();
    context.insert("items", &items);
    context.insert("categories", &engine.store.list_media_categories()?);
    context.insert("media_types", &media_types);
    context.insert("filter_base", &query.page_base());
    context.insert(
        "filter",
        &json!({ "type": query.file_type, "category": query.category, "q": query.q }),
    );
    render(&engine, &visitor, "media/list.html", context)
}

pub async fn detail(
    State(engine): State<Arc<Engine>>,
    Path(slug): Path<String>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    visitor.require_user()?;
    let item = engine.store.get_media_by_slug(&slug)?;
    let mut context = TeraContext::new();
    context.insert("size", &human_size(item.file_size));
    context.insert("item", &item);
    render(&engine, &visitor, "media/detail.html", context)
}

/// 只保留文件名部分，主名转成 slug，扩展名转小写
fn clean_file_name(original: &str) -> String {
    let name = FsPath::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext.to_ascii_lowercase())),
        _ => (name, None),
    };
    let stem = match slugify(stem) {
        s if s.is_empty() => "upload".to_string(),
        s => s,
    };
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// 文件保存位置（相对媒体目录），重名时追加随机后缀
fn upload_path(media_dir: &FsPath, file_name: &str) -> PathBuf {
    let dir = PathBuf::from(UPLOAD_DIR).join(Utc::now().format("%Y/%m").to_string());
    let candidate = dir.join(file_name);
    if !media_dir.join(&candidate).exists() {
        return candidate;
    }
    let suffix = random_token(7).to_ascii_lowercase();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => dir.join(format!("{stem}_{suffix}.{ext}")),
        None => dir.join(format!("{file_name}_{suffix}")),
    }
}

fn upload_error(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// 上传文件，返回新建媒体的 JSON
pub async fn upload(
    State(engine): State<Arc<Engine>>,
    visitor: Visitor,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let user = visitor.require_user()?;

    let mut title = String::new();
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("title") => {
                title = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
            }
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !name.is_empty() {
                    file = Some((name, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    let Some((original_name, bytes)) = file else {
        return Ok(upload_error("No file provided"));
    };

    let relative = upload_path(engine.media_dir(), &clean_file_name(&original_name));
    let destination = engine.media_dir().join(&relative);
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("无法创建目录: {}", parent.display()))?;
    }
    tokio::fs::write(&destination, &bytes)
        .await
        .with_context(|| format!("无法保存文件: {}", destination.display()))?;

    let title = match title.trim() {
        "" => FsPath::new(&original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled")
            .to_string(),
        t => t.to_string(),
    };
    let item = engine.store.create_media(
        &MediaItemInput {
            title,
            file: relative.to_string_lossy().replace('\\', "/"),
            file_size: bytes.len() as i64,
            ..MediaItemInput::default()
        },
        Some(user.id),
    )?;
    info!("{} 上传了 {} ({})", user.username, item.file, human_size(item.file_size));

    Ok(Json(json!({
        "id": item.id,
        "title": item.title,
        "url": item.url(),
        "file_type": item.file_type,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_cleaned() {
        assert_eq!(clean_file_name("My Photo.JPG"), "my-photo.jpg");
        assert_eq!(clean_file_name("../../etc/passwd"), "passwd");
        assert_eq!(clean_file_name(".hidden"), "hidden");
        assert_eq!(clean_file_name("???.png"), "upload.png");
    }

    #[test]
    fn filter_links_keep_query() {
        let query = MediaQuery {
            file_type: "image".to_string(),
            q: "cat pics".to_string(),
            ..MediaQuery::default()
        };
        assert_eq!(query.page_base(), "/media-library/?type=image&q=cat+pics&");
        assert_eq!(MediaQuery::default().page_base(), "/media-library/?");
        assert_eq!(query.to_filter().file_type, Some(MediaType::Image));
        assert!(query.to_filter().category_slug.is_none());
    }

    #[test]
    fn duplicate_uploads_get_new_names() {
        let dir = tempfile::tempdir().unwrap();
        let first = upload_path(dir.path(), "a.png");
        assert!(first.starts_with(UPLOAD_DIR));
        std::fs::create_dir_all(dir.path().join(&first).parent().unwrap()).unwrap();
        std::fs::write(dir.path().join(&first), b"x").unwrap();
        let second = upload_path(dir.path(), "a.png");
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with(".png"));
    }
}
