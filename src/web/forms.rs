use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidateUrl, ValidationError, ValidationErrors};

use crate::models::ProfileUpdate;

/// 模板使用的错误表：字段名 -> 错误消息，表单级错误放在 `__all__`
pub type FormErrors = BTreeMap<String, Vec<String>>;

pub const NON_FIELD_ERRORS: &str = "__all__";

pub fn error_map(errors: &ValidationErrors) -> FormErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({})", e.code),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// 单条表单级错误
pub fn non_field_error(message: impl Into<String>) -> FormErrors {
    field_error(NON_FIELD_ERRORS, message)
}

pub fn field_error(field: &str, message: impl Into<String>) -> FormErrors {
    let mut errors = FormErrors::new();
    errors.insert(field.to_string(), vec![message.into()]);
    errors
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn optional_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.validate_email() {
        Ok(())
    } else {
        Err(invalid("email", "Enter a valid email address."))
    }
}

fn optional_url(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.validate_url() {
        Ok(())
    } else {
        Err(invalid("url", "Enter a valid URL."))
    }
}

/// 评论表单
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub author_name: String,
    #[validate(custom(function = "optional_email"))]
    pub author_email: String,
    #[validate(custom(function = "optional_url"))]
    pub author_url: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub content: String,
}

/// 联系表单
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ContactForm {
    #[validate(length(min = 1, max = 100, message = "Enter your name (at most 100 characters)."))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "Enter a subject (at most 200 characters)."))]
    pub subject: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub message: String,
}

impl ContactForm {
    pub fn mail_subject(&self) -> String {
        format!("Contact Form: {}", self.subject)
    }

    pub fn mail_body(&self) -> String {
        format!("Name: {}\nEmail: {}\n\n{}", self.name, self.email, self.message)
    }
}

/// 订阅表单
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SubscribeForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(max = 100, message = "Ensure this value has at most 100 characters."))]
    pub name: String,
}

/// 登录表单
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    pub next: String,
}

impl LoginForm {
    /// 登录后跳转的地址，只接受站内路径
    pub fn redirect_target(&self) -> &str {
        safe_next(&self.next)
    }
}

pub fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

/// 修改密码表单，密码不回显
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordChangeForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub old_password: String,
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub new_password1: String,
    #[validate(must_match(other = "new_password1", message = "The two password fields didn't match."))]
    pub new_password2: String,
}

/// 个人资料表单
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ProfileForm {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[validate(custom(function = "optional_email"))]
    pub email: String,
    pub bio: String,
    pub avatar: String,
    #[validate(custom(function = "optional_url"))]
    pub website: String,
    pub facebook: String,
    pub twitter: String,
    pub instagram: String,
    pub linkedin: String,
}

impl ProfileForm {
    pub fn from_user(user: &crate::models::User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            avatar: user.avatar.clone().unwrap_or_default(),
            website: user.website.clone(),
            facebook: user.facebook.clone(),
            twitter: user.twitter.clone(),
            instagram: user.instagram.clone(),
            linkedin: user.linkedin.clone(),
        }
    }

    pub fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            bio: self.bio.clone(),
            avatar: Some(self.avatar.trim().to_string()).filter(|a| !a.is_empty()),
            website: self.website.trim().to_string(),
            facebook: self.facebook.trim().to_string(),
            twitter: self.twitter.trim().to_string(),
            instagram: self.instagram.trim().to_string(),
            linkedin: self.linkedin.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_requires_content_only() {
        let form = CommentForm {
            content: "Nice post".to_string(),
            ..CommentForm::default()
        };
        assert!(form.validate().is_ok());

        let form = CommentForm {
            author_email: "not-an-email".to_string(),
            ..CommentForm::default()
        };
        let errors = error_map(&form.validate().unwrap_err());
        assert!(errors.contains_key("content"));
        assert_eq!(errors["author_email"], vec!["Enter a valid email address."]);
    }

    #[test]
    fn contact_mail_format() {
        let form = ContactForm {
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            subject: "Hi".to_string(),
            message: "Hello there".to_string(),
        };
        assert!(form.validate().is_ok());
        assert_eq!(form.mail_subject(), "Contact Form: Hi");
        assert_eq!(form.mail_body(), "Name: Ann\nEmail: ann@example.com\n\nHello there");
    }

    #[test]
    fn password_confirmation_must_match() {
        let form = PasswordChangeForm {
            old_password: "old".to_string(),
            new_password1: "long-enough-1".to_string(),
            new_password2: "long-enough-2".to_string(),
        };
        let errors = error_map(&form.validate().unwrap_err());
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["new_password2"]);
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next("/blog/dashboard/"), "/blog/dashboard/");
        assert_eq!(safe_next("//evil.test/"), "/");
        assert_eq!(safe_next("https://evil.test/"), "/");
        assert_eq!(safe_next(""), "/");
    }
}
