use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::text_enum;

/// 邮件订阅者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    /// 确认链接使用的令牌，确认后清空
    pub confirmation_token: String,
    /// 退订链接使用的令牌，长期有效
    pub unsubscribe_token: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// 确认订阅
    pub fn confirm(&mut self) {
        self.is_active = true;
        self.confirmed_at = Some(Utc::now());
        self.confirmation_token.clear();
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriberInput {
    pub email: String,
    pub name: String,
    pub is_active: bool,
}

text_enum! {
    /// 邮件期刊状态
    #[derive(Default)]
    pub enum NewsletterStatus {
        #[default]
        Draft => "draft",
        Scheduled => "scheduled",
        Sent => "sent",
    }
}

/// 邮件期刊
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: i64,
    pub title: String,
    pub subject: String,
    pub content: String,
    pub status: NewsletterStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Newsletter {
    /// 标记为已发送
    pub fn send(&mut self) {
        self.status = NewsletterStatus::Sent;
        self.sent_at = Some(Utc::now());
    }

    /// 计划发送
    pub fn schedule(&mut self, at: DateTime<Utc>) {
        self.status = NewsletterStatus::Scheduled;
        self.scheduled_at = Some(at);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewsletterInput {
    pub title: String,
    pub subject: String,
    pub content: String,
    pub status: NewsletterStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn confirm_clears_token() {
        let now = Utc::now();
        let mut subscriber = Subscriber {
            id: 1,
            email: "a@example.com".to_string(),
            name: String::new(),
            is_active: false,
            confirmation_token: "abc".to_string(),
            unsubscribe_token: "def".to_string(),
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        };
        subscriber.confirm();
        assert!(subscriber.is_active);
        assert!(subscriber.confirmed_at.is_some());
        assert!(subscriber.confirmation_token.is_empty());
        assert_eq!(subscriber.unsubscribe_token, "def");
    }

    #[test]
    fn schedule_then_send() {
        let now = Utc::now();
        let mut newsletter = Newsletter {
            id: 1,
            title: "t".to_string(),
            subject: "s".to_string(),
            content: "c".to_string(),
            status: NewsletterStatus::Draft,
            scheduled_at: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };
        let at = now + Duration::hours(1);
        newsletter.schedule(at);
        assert_eq!(newsletter.status, NewsletterStatus::Scheduled);
        assert_eq!(newsletter.scheduled_at, Some(at));

        newsletter.send();
        assert_eq!(newsletter.status, NewsletterStatus::Sent);
        assert!(newsletter.sent_at.is_some());
    }
}
