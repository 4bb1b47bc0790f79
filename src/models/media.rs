use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{text_enum, CategoryRef};

text_enum! {
    /// 媒体文件类型
    #[derive(Default)]
    pub enum MediaType {
        Image => "image",
        Document => "document",
        Video => "video",
        Audio => "audio",
        #[default]
        Other => "other",
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

impl MediaType {
    /// 根据文件扩展名判断类型
    pub fn from_file_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return MediaType::Other,
        };
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            MediaType::Image
        } else if DOCUMENT_EXTENSIONS.contains(&ext) {
            MediaType::Document
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            MediaType::Video
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            MediaType::Audio
        } else {
            MediaType::Other
        }
    }
}

/// 媒体分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaCategory {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaCategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
}

/// 媒体文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub alt_text: String,
    /// 相对于媒体目录的路径
    pub file: String,
    pub file_type: MediaType,
    /// 字节数
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub categories: Vec<CategoryRef>,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn url(&self) -> String {
        format!("/media/{}", self.file)
    }

    /// 可读的文件大小
    pub fn size_display(&self) -> String {
        human_size(self.file_size)
    }
}

pub fn human_size(bytes: i64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// 新建或更新媒体文件
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaItemInput {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub alt_text: String,
    pub file: String,
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub category_ids: Vec<i64>,
}

/// 媒体库查询条件
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub file_type: Option<MediaType>,
    pub category_slug: Option<String>,
    pub query: Option<String>,
}
