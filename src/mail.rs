use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

impl OutgoingMail {
    pub fn confirmation_code(from: &str, to: &str, code: &str) -> Self {
        Self {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: "Yamdb confirmation code".to_string(),
            text: format!("Your confirmation code: {code}"),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Http,
    Log,
}

/// HTTP only when both the API endpoint and key are configured.
pub fn transport_for(cfg: &MailConfig) -> MailTransport {
    match (&cfg.api_url, &cfg.api_key) {
        (Some(_), Some(_)) => MailTransport::Http,
        _ => MailTransport::Log,
    }
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match (transport_for(cfg), &cfg.api_url, &cfg.api_key) {
        (MailTransport::Http, Some(url), Some(key)) => Ok(Arc::new(HttpMailer::new(url, key)?)),
        _ => {
            info!("no mail API configured; confirmation mails go to the log");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Sends through a JSON mail API (`{from, to, subject, text}` + bearer key).
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("yamdb-auth/0.1 (+reqwest)")
            .timeout(Duration::from_secs(30))
            .build()
            .context("build mail client")?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&mail)
            .send()
            .await
            .context("send mail request")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("mail API error: HTTP {status}: {body}");
        }
        debug!(to = ?mail.to, %status, "mail sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        info!(
            from = %mail.from,
            to = ?mail.to,
            subject = %mail.subject,
            text = %mail.text,
            "mail"
        );
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Code from the most recent confirmation mail to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to.iter().any(|t| t == email))
            .and_then(|m| m.text.rsplit(' ').next().map(str::to_string))
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mailbox poisoned"))?
            .push(mail);
        Ok(())
    }
}
