use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::session::{redirect_with, Flash};
use crate::storage::StorageError;

/// 需要渲染为错误页面的响应标记，由 `error_pages` 中间件处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPage(pub StatusCode);

/// 公开页面的错误
#[derive(Debug, Error)]
pub enum AppError {
    #[error("页面不存在")]
    NotFound,

    #[error("需要登录")]
    LoginRequired { next: String },

    /// 没有权限：带提示跳回首页
    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn login_required(next: impl Into<String>) -> Self {
        Self::LoginRequired { next: next.into() }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }
}

impl From<crate::auth::AuthError> for AppError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::Storage(e) => AppError::Storage(e),
            other => AppError::Internal(other.into()),
        }
    }
}

/// 登录页地址，附带登录后跳转的路径
pub fn login_url(next: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("/login/?{query}")
}

fn error_page(status: StatusCode) -> Response {
    let mut response = (status, status.canonical_reason().unwrap_or("Error")).into_response();
    response.extensions_mut().insert(ErrorPage(status));
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => error_page(StatusCode::NOT_FOUND),
            AppError::LoginRequired { next } => Redirect::to(&login_url(&next)).into_response(),
            AppError::PermissionDenied(message) => redirect_with("/", vec![Flash::error(message)]),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            AppError::Storage(e) => match e {
                StorageError::NotFound { .. } => error_page(StatusCode::NOT_FOUND),
                StorageError::Validation { message } => (StatusCode::BAD_REQUEST, message).into_response(),
                StorageError::Conflict { message, .. } => (StatusCode::CONFLICT, message).into_response(),
                other => {
                    error!("存储错误: {}", other);
                    error_page(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            AppError::Internal(e) => {
                error!("内部错误: {:#}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// 管理接口的错误，统一返回 `{"error": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("staff access required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StorageError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            StorageError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<StorageError>() {
            Ok(storage) => storage.into(),
            Err(other) => ApiError::Internal(format!("{other:#}")),
        }
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("管理接口错误: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(StorageError::not_found("post", 1)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::conflict("posts", "slug")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::validation("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        let wrapped = anyhow::Error::from(StorageError::not_found("page", 2));
        assert_eq!(ApiError::from(wrapped).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn not_found_is_marked_for_error_page() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.extensions().get::<ErrorPage>(),
            Some(&ErrorPage(StatusCode::NOT_FOUND))
        );
    }

    #[test]
    fn login_redirect_keeps_next() {
        let response = AppError::login_required("/blog/dashboard/").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/login/?next=%2Fblog%2Fdashboard%2F"
        );
    }
}
