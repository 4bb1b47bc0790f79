use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Form;
use tracing::{debug, info};
use validator::Validate;

use super::error::AppError;
use super::forms::CommentForm;
use super::session::{redirect_with, Flash, Visitor};
use crate::core::engine::Engine;
use crate::models::{CommentStatus, ContentRef, ContentType, NewComment};

fn parse_target(content_type: &str, object_id: i64) -> Result<ContentRef, AppError> {
    let content_type: ContentType = content_type.parse().map_err(|_| AppError::NotFound)?;
    Ok(ContentRef::new(content_type, object_id))
}

/// 发表评论或回复，完成后回到被评论的内容
fn post_comment(
    engine: &Engine,
    visitor: &Visitor,
    target: ContentRef,
    parent_id: Option<i64>,
    form: CommentForm,
) -> Result<Response, AppError> {
    let store = &engine.store;
    if !store.target_exists(target)? {
        return Err(AppError::NotFound);
    }
    if let Some(parent_id) = parent_id {
        let parent = store.get_comment(parent_id)?;
        if parent.target != target {
            return Err(AppError::NotFound);
        }
    }
    let target_url = store.target_url(target)?;

    if target.content_type == ContentType::Post && !store.get_post(target.object_id)?.allow_comments {
        return Ok(redirect_with(
            &target_url,
            vec![Flash::error("Comments are closed for this post.")],
        ));
    }
    if let Err(errors) = form.validate() {
        debug!("评论表单无效: {}", errors);
        return Ok(redirect_with(
            &target_url,
            vec![Flash::error("There was an error posting your comment.")],
        ));
    }

    let status = if visitor.user.is_some() {
        CommentStatus::Approved
    } else {
        CommentStatus::Pending
    };
    let comment = store.create_comment(&NewComment {
        target,
        author_id: visitor.user.as_ref().map(|u| u.id),
        author_name: form.author_name.trim().to_string(),
        author_email: form.author_email.trim().to_string(),
        author_url: form.author_url.trim().to_string(),
        content: form.content,
        status,
        parent_id,
        ip_address: visitor.ip_address.clone(),
        user_agent: visitor.user_agent.clone(),
    })?;
    info!("新评论 #{} ({}), 状态 {}", comment.id, target_url, comment.status);

    let mut flashes = vec![Flash::success("Your comment has been posted.")];
    if visitor.user.is_none() {
        flashes.push(Flash::info("Your comment will be visible after moderation."));
    }
    Ok(redirect_with(&target_url, flashes))
}

pub async fn post(
    State(engine): State<Arc<Engine>>,
    Path((content_type, object_id)): Path<(String, i64)>,
    visitor: Visitor,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let target = parse_target(&content_type, object_id)?;
    post_comment(&engine, &visitor, target, None, form)
}

pub async fn reply(
    State(engine): State<Arc<Engine>>,
    Path((content_type, object_id, parent_id)): Path<(String, i64, i64)>,
    visitor: Visitor,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let target = parse_target(&content_type, object_id)?;
    post_comment(&engine, &visitor, target, Some(parent_id), form)
}

/// 作者本人或管理员可以删除
pub async fn delete(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<i64>,
    visitor: Visitor,
) -> Result<Response, AppError> {
    let user = visitor.require_user()?;
    let comment = engine.store.get_comment(id)?;
    if comment.author_id != Some(user.id) && !user.is_staff {
        return Err(AppError::permission_denied(
            "You don't have permission to delete this comment.",
        ));
    }
    let target_url = engine.store.target_url(comment.target)?;
    engine.store.delete_comment(id)?;
    info!("评论 #{} 已被 {} 删除", id, user.username);
    Ok(redirect_with(&target_url, vec![Flash::success("Your comment has been deleted.")]))
}

fn moderate(
    engine: &Engine,
    visitor: &Visitor,
    id: i64,
    status: CommentStatus,
) -> Result<Response, AppError> {
    let user = visitor.require_user()?;
    let verb = if status == CommentStatus::Approved { "approve" } else { "reject" };
    if !user.is_staff {
        return Err(AppError::permission_denied(format!(
            "You don't have permission to {verb} comments."
        )));
    }
    let comment = engine.store.get_comment(id)?;
    engine.store.set_comments_status(&[comment.id], status)?;
    let target_url = engine.store.target_url(comment.target)?;
    let message = if status == CommentStatus::Approved {
        "Comment has been approved."
    } else {
        "Comment has been rejected."
    };
    Ok(redirect_with(&target_url, vec![Flash::success(message)]))
}

pub async fn approve(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<i64>,
    visitor: Visitor,
) -> Result<Response, AppError> {
    moderate(&engine, &visitor, id, CommentStatus::Approved)
}

pub async fn reject(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<i64>,
    visitor: Visitor,
) -> Result<Response, AppError> {
    moderate(&engine, &visitor, id, CommentStatus::Rejected)
}
