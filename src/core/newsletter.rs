use anyhow::{bail, Context, Result};
use chrono::Utc;
use tera::Context as TeraContext;
use tracing::{info, warn};

use super::engine::Engine;
use crate::auth::{random_token, TOKEN_LENGTH};
use crate::mail::Email;
use crate::models::{NewsletterStatus, Subscriber};

pub const CONFIRMATION_SUBJECT: &str = "Confirm your newsletter subscription";

impl Engine {
    /// 新订阅：保存未激活的订阅者并发送确认邮件
    pub async fn subscribe(&self, email: &str, name: &str) -> Result<Subscriber> {
        let subscriber = self.store.subscribe(
            email,
            name,
            &random_token(TOKEN_LENGTH),
            &random_token(TOKEN_LENGTH),
        )?;
        self.send_confirmation(&subscriber).await?;
        Ok(subscriber)
    }

    /// 发送订阅确认邮件
    pub async fn send_confirmation(&self, subscriber: &Subscriber) -> Result<()> {
        let mut context = TeraContext::new();
        context.insert("site", &self.config.site_info());
        context.insert("subscriber", subscriber);
        context.insert(
            "confirm_url",
            &self.config.absolute_url(&format!(
                "/newsletter/confirm/{}/",
                subscriber.confirmation_token
            )),
        );
        let body = self.renderer.render("emails/newsletter_confirmation.txt", &context)?;
        self.mailer
            .send(&Email::new(vec![subscriber.email.clone()], CONFIRMATION_SUBJECT, body))
            .await
            .context("确认邮件发送失败")?;
        Ok(())
    }

    /// 把期刊发给所有已确认的订阅者，然后标记为已发送。返回收件人数量
    pub async fn send_newsletter(&self, id: i64) -> Result<usize> {
        let newsletter = self.store.get_newsletter(id)?;
        if newsletter.status == NewsletterStatus::Sent {
            bail!("期刊已发送: {}", newsletter.title);
        }
        let subscribers = self.store.active_subscribers()?;
        let mut delivered = 0;
        for subscriber in &subscribers {
            let mut context = TeraContext::new();
            context.insert("site", &self.config.site_info());
            context.insert("newsletter", &newsletter);
            context.insert("subscriber", subscriber);
            context.insert(
                "unsubscribe_url",
                &self.config.absolute_url(&format!(
                    "/newsletter/unsubscribe/{}/",
                    subscriber.unsubscribe_token
                )),
            );
            let body = self.renderer.render("emails/newsletter.txt", &context)?;
            let email = Email::new(vec![subscriber.email.clone()], newsletter.subject.clone(), body);
            match self.mailer.send(&email).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("发送给 {} 失败: {}", subscriber.email, e),
            }
        }
        self.store.mark_newsletter_sent(id)?;
        info!("期刊 \"{}\" 已发送给 {} 位订阅者", newsletter.title, delivered);
        Ok(delivered)
    }

    /// 发送所有到期的计划期刊，返回发送的期刊数量
    pub async fn send_due_newsletters(&self) -> Result<usize> {
        let due = self.store.due_newsletters(Utc::now())?;
        if due.is_empty() {
            info!("没有到期的期刊");
        }
        for newsletter in &due {
            self.send_newsletter(newsletter.id).await?;
        }
        Ok(due.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::engine::test_support;
    use crate::models::{NewsletterInput, SubscriberInput};
    use chrono::Duration;

    #[tokio::test]
    async fn subscribe_mails_confirmation_link() {
        let (engine, mailer) = test_support::engine();
        let subscriber = engine.subscribe("reader@example.com", "Reader").await.unwrap();
        assert!(!subscriber.is_active);
        assert_eq!(subscriber.confirmation_token.len(), 64);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, super::CONFIRMATION_SUBJECT);
        assert!(sent[0].body.contains(&format!(
            "http://cms.test/newsletter/confirm/{}/",
            subscriber.confirmation_token
        )));
    }

    #[tokio::test]
    async fn newsletter_goes_to_confirmed_subscribers_only() {
        let (engine, mailer) = test_support::engine();
        let confirmed = engine.subscribe("yes@example.com", "").await.unwrap();
        engine.store.confirm_subscriber(confirmed.id).unwrap();
        engine.subscribe("pending@example.com", "").await.unwrap();
        engine
            .store
            .create_subscriber(
                &SubscriberInput {
                    email: "inactive@example.com".to_string(),
                    ..SubscriberInput::default()
                },
                "tok",
            )
            .unwrap();

        let newsletter = engine
            .store
            .create_newsletter(&NewsletterInput {
                title: "Issue 1".to_string(),
                subject: "Hello readers".to_string(),
                content: "News!".to_string(),
                ..NewsletterInput::default()
            })
            .unwrap();

        let delivered = engine.send_newsletter(newsletter.id).await.unwrap();
        assert_eq!(delivered, 1);

        let issue: Vec<_> = mailer
            .sent()
            .into_iter()
            .filter(|m| m.subject == "Hello readers")
            .collect();
        assert_eq!(issue.len(), 1);
        assert_eq!(issue[0].to, vec!["yes@example.com".to_string()]);
        assert!(issue[0].body.contains("/newsletter/unsubscribe/"));

        let sent = engine.store.get_newsletter(newsletter.id).unwrap();
        assert!(sent.sent_at.is_some());
        assert!(engine.send_newsletter(newsletter.id).await.is_err());
    }

    #[tokio::test]
    async fn due_newsletters_are_sent() {
        let (engine, _mailer) = test_support::engine();
        let due = engine
            .store
            .create_newsletter(&NewsletterInput {
                title: "Due".to_string(),
                subject: "Due".to_string(),
                ..NewsletterInput::default()
            })
            .unwrap();
        let later = engine
            .store
            .create_newsletter(&NewsletterInput {
                title: "Later".to_string(),
                subject: "Later".to_string(),
                ..NewsletterInput::default()
            })
            .unwrap();
        let now = chrono::Utc::now();
        engine.store.schedule_newsletters(&[due.id], now - Duration::minutes(5)).unwrap();
        engine.store.schedule_newsletters(&[later.id], now + Duration::days(1)).unwrap();

        assert_eq!(engine.send_due_newsletters().await.unwrap(), 1);
        assert!(engine.store.get_newsletter(due.id).unwrap().sent_at.is_some());
        assert!(engine.store.get_newsletter(later.id).unwrap().sent_at.is_none());
    }
}
