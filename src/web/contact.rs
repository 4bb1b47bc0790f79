use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Form;
use tera::Context as TeraContext;
use tracing::{error, info};
use validator::Validate;

use super::error::AppError;
use super::forms::{error_map, non_field_error, ContactForm, FormErrors};
use super::render::{render, HtmlPage};
use super::session::{redirect_with, Visitor};
use crate::core::engine::Engine;
use crate::mail::Email;

fn contact_page(engine: &Engine, visitor: &Visitor, form: &ContactForm, errors: &FormErrors) -> Result<HtmlPage, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render(engine, visitor, "contact/form.html", context)
}

pub async fn contact_form(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    contact_page(&engine, &visitor, &ContactForm::default(), &FormErrors::new())
}

/// 把联系表单发给站点管理员
pub async fn contact(
    State(engine): State<Arc<Engine>>,
    visitor: Visitor,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.validate() {
        return Ok(contact_page(&engine, &visitor, &form, &error_map(&errors))?.into_response());
    }
    let email = Email::new(
        engine.config.contact_recipients(),
        form.mail_subject(),
        form.mail_body(),
    );
    if let Err(e) = engine.mailer.send(&email).await {
        error!("联系表单发送失败: {}", e);
        let errors = non_field_error("Your message could not be sent. Please try again later.");
        return Ok(contact_page(&engine, &visitor, &form, &errors)?.into_response());
    }
    info!("收到来自 {} 的联系表单", form.email);
    Ok(redirect_with("/contact/success/", Vec::new()))
}

pub async fn contact_success(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    render(&engine, &visitor, "contact/success.html", TeraContext::new())
}
