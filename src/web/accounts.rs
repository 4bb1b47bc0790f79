use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tera::Context as TeraContext;
use tracing::info;
use validator::Validate;

use super::error::AppError;
use super::forms::{
    error_map, field_error, non_field_error, safe_next, FormErrors, LoginForm, PasswordChangeForm,
    ProfileForm,
};
use super::render::{render, HtmlPage};
use super::session::{append_cookie, redirect_with, removal_cookie, session_cookie, Flash, Visitor, SESSION_COOKIE};
use crate::auth::{self, AuthError};
use crate::core::engine::Engine;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn form_page<F: serde::Serialize>(
    engine: &Engine,
    visitor: &Visitor,
    template: &str,
    form: &F,
    errors: &FormErrors,
) -> Result<HtmlPage, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    render(engine, visitor, template, context)
}

fn login_page(engine: &Engine, visitor: &Visitor, form: &LoginForm, errors: &FormErrors) -> Result<HtmlPage, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("next", safe_next(&form.next));
    render(engine, visitor, "accounts/login.html", context)
}

pub async fn login_form(
    State(engine): State<Arc<Engine>>,
    Query(query): Query<NextQuery>,
    visitor: Visitor,
) -> Result<HtmlPage, AppError> {
    let form = LoginForm {
        next: query.next.unwrap_or_default(),
        ..LoginForm::default()
    };
    login_page(&engine, &visitor, &form, &FormErrors::new())
}

/// 校验密码，创建会话并写入 cookie
pub async fn login(
    State(engine): State<Arc<Engine>>,
    visitor: Visitor,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.validate() {
        return Ok(login_page(&engine, &visitor, &form, &error_map(&errors))?.into_response());
    }
    let user = match auth::authenticate(&engine.store, form.username.trim(), &form.password) {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            let errors = non_field_error("Please enter a correct username and password.");
            return Ok(login_page(&engine, &visitor, &form, &errors)?.into_response());
        }
        Err(AuthError::Inactive) => {
            let errors = non_field_error("This account is inactive.");
            return Ok(login_page(&engine, &visitor, &form, &errors)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let token = auth::login(&engine.store, &user, engine.config.session_ttl_hours)?;
    let mut response = redirect_with(form.redirect_target(), Vec::new());
    append_cookie(&mut response, session_cookie(&token, engine.config.session_ttl_hours));
    Ok(response)
}

pub async fn logout(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<Response, AppError> {
    if let Some(token) = &visitor.session_token {
        engine.store.delete_session(token)?;
    }
    if let Some(user) = &visitor.user {
        info!("用户退出: {}", user.username);
    }
    let mut response = redirect_with("/", vec![Flash::info("You have been logged out.")]);
    append_cookie(&mut response, removal_cookie(SESSION_COOKIE));
    Ok(response)
}

pub async fn password_change_form(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    visitor.require_user()?;
    form_page(
        &engine,
        &visitor,
        "accounts/password_change.html",
        &BTreeMap::<String, String>::new(),
        &FormErrors::new(),
    )
}

pub async fn password_change(
    State(engine): State<Arc<Engine>>,
    visitor: Visitor,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response, AppError> {
    let user = visitor.require_user()?;
    let errors = match form.validate() {
        Err(errors) => error_map(&errors),
        Ok(()) => match auth::change_password(&engine.store, user, &form.old_password, &form.new_password1) {
            Ok(()) => {
                info!("用户 {} 修改了密码", user.username);
                return Ok(redirect_with(
                    "/profile/",
                    vec![Flash::success("Your password has been changed.")],
                ));
            }
            Err(AuthError::InvalidCredentials) => field_error(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            ),
            Err(e) => return Err(e.into()),
        },
    };
    let page = form_page(
        &engine,
        &visitor,
        "accounts/password_change.html",
        &BTreeMap::<String, String>::new(),
        &errors,
    )?;
    Ok(page.into_response())
}

pub async fn profile(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    let user = visitor.require_user()?;
    let mut context = TeraContext::new();
    context.insert("profile", user);
    render(&engine, &visitor, "accounts/profile.html", context)
}

pub async fn profile_edit_form(State(engine): State<Arc<Engine>>, visitor: Visitor) -> Result<HtmlPage, AppError> {
    let user = visitor.require_user()?;
    let form = ProfileForm::from_user(user);
    form_page(&engine, &visitor, "accounts/profile_edit.html", &form, &FormErrors::new())
}

pub async fn profile_edit(
    State(engine): State<Arc<Engine>>,
    visitor: Visitor,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let user = visitor.require_user()?;
    if let Err(errors) = form.validate() {
        let page = form_page(&engine, &visitor, "accounts/profile_edit.html", &form, &error_map(&errors))?;
        return Ok(page.into_response());
    }
    engine.store.update_profile(user.id, &form.to_update())?;
    Ok(redirect_with("/profile/", vec![Flash::success("Your profile has been updated.")]))
}
