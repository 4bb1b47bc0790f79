//! 邮件发送：控制台、内存和 SMTP 三种后端

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::config::{MailBackend, MailConfig, SmtpSecurity};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("无效的邮件地址 {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("构建邮件失败: {0}")]
    Build(String),

    #[error("发送邮件失败: {0}")]
    Transport(String),
}

/// 一封纯文本邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// 只写日志，不真正发送
#[derive(Debug, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(
            "邮件 -> {}: {}\n{}",
            email.to.join(", "),
            email.subject,
            email.body
        );
        Ok(())
    }
}

/// 把邮件保存在内存中
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<Email>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已发送的邮件
    pub fn sent(&self) -> Vec<Email> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        outbox.push(email.clone());
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let host = config.smtp.host.as_str();
        let security = config.smtp.security();
        let builder = match security {
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        };
        let mut builder = builder
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.smtp.port);
        debug!("SMTP {}:{} ({:?})", host, config.smtp.port, security);
        if let (Some(username), Some(password)) = (&config.smtp.username, &config.smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&config.from_email)?,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(&email.subject);
        for to in &email.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        let message = builder
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        debug!("SMTP 已发送: {}", email.subject);
        Ok(())
    }
}

/// 按配置创建邮件后端
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    let mailer: Arc<dyn Mailer> = match config.backend {
        MailBackend::Console => Arc::new(ConsoleMailer),
        MailBackend::Memory => Arc::new(MemoryMailer::new()),
        MailBackend::Smtp => Arc::new(SmtpMailer::new(config)?),
    };
    Ok(mailer)
}
