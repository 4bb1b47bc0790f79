pub mod auth;
pub mod cli;
pub mod core;
pub mod mail;
pub mod models;
pub mod storage;
pub mod theme;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use crate::core::{Engine, Server};
pub use crate::models::config::Config;
pub use crate::models::{Category, Page, Post, Tag};
pub use crate::storage::{StorageError, Store};
pub use crate::theme::renderer::ThemeRenderer;
