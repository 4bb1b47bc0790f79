use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Form;
use tera::Context as TeraContext;
use validator::Validate;

use super::error::AppError;
use super::forms::{error_map, field_error, FormErrors, SubscribeForm};
use super::render::{render, HtmlPage};
use super::session::{redirect_with, Flash, Visitor};
use crate::core::engine::Engine;
use crate::storage::StorageError;

fn subscribe_page(
    engine: &Engine,
    visitor: &Visitor,
    form: &SubscribeForm,
    errors: &FormErrors,
) -> Result<HtmlPage, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render(engine, visitor, "newsletter/subscribe.html", context)
}

pub async fn subscribe_form(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    subscribe_page(&engine, &visitor, &SubscribeForm::default(), &FormErrors::new())
}

/// 保存未激活的订阅者并发送确认邮件
pub async fn subscribe(
    State(engine): State<Arc<Engine>>,
    visitor: Visitor,
    Form(form): Form<SubscribeForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.validate() {
        return Ok(subscribe_page(&engine, &visitor, &form, &error_map(&errors))?.into_response());
    }
    match engine.subscribe(form.email.trim(), form.name.trim()).await {
        Ok(_) => Ok(redirect_with("/newsletter/subscribe/success/", Vec::new())),
        Err(e) if e.downcast_ref::<StorageError>().is_some_and(StorageError::is_conflict) => {
            let errors = field_error("email", "This email address is already subscribed.");
            Ok(subscribe_page(&engine, &visitor, &form, &errors)?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// 确认订阅，已经确认过的给出提示
pub async fn confirm(
    State(engine): State<Arc<Engine>>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let subscriber = engine.store.subscriber_by_confirmation_token(&token)?;
    let flash = if subscriber.confirmed_at.is_none() {
        engine.store.confirm_subscriber(subscriber.id)?;
        Flash::success("Your subscription has been confirmed. Thank you!")
    } else {
        Flash::info("Your subscription was already confirmed.")
    };
    Ok(redirect_with("/newsletter/confirm/success/", vec![flash]))
}

pub async fn unsubscribe_form(
    State(engine): State<Arc<Engine>>,
    Path(token): Path<String>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let subscriber = engine.store.subscriber_by_unsubscribe_token(&token)?;
    let mut context = TeraContext::new();
    context.insert("subscriber", &subscriber);
    context.insert("token", &token);
    render(&engine, &visitor, "newsletter/unsubscribe.html", context)
}

pub async fn unsubscribe(
    State(engine): State<Arc<Engine>>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let subscriber = engine.store.subscriber_by_unsubscribe_token(&token)?;
    engine.store.set_subscribers_active(&[subscriber.id], false)?;
    Ok(redirect_with(
        "/newsletter/unsubscribe/success/",
        vec![Flash::success("You have been unsubscribed from our newsletter.")],
    ))
}

/// 只有静态文字的确认页
fn static_page(engine: &Engine, visitor: &Visitor, template: &str) -> Result<HtmlPage, AppError> {
    render(engine, visitor, template, TeraContext::new())
}

pub async fn subscribe_success(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    static_page(&engine, &visitor, "newsletter/subscribe_success.html")
}

pub async fn confirm_success(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    static_page(&engine, &visitor, "newsletter/confirm_success.html")
}

pub async fn unsubscribe_success(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    static_page(&engine, &visitor, "newsletter/unsubscribe_success.html")
}
