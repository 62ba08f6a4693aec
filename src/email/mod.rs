pub mod resend;
pub mod smtp;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{MailConfig, MailProvider};

/// Outbound HTML mail. Every recipient in `to` receives the same message.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), String>;
}

pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, String> {
    let mailer: Arc<dyn Mailer> = match &config.provider {
        MailProvider::Resend { api_key } => {
            Arc::new(resend::ResendMailer::new(api_key, &config.from_header()))
        }
        MailProvider::Smtp(smtp) => Arc::new(smtp::SmtpMailer::new(smtp, &config.from_header())?),
        MailProvider::Log => {
            tracing::warn!("No mail provider configured. Emails will only be logged.");
            Arc::new(LogMailer)
        }
    };
    Ok(mailer)
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), String> {
        tracing::info!(to = %to.join(", "), subject, "Email not delivered (log mailer): {html}");
        Ok(())
    }
}

/// Send one message and log the outcome.
pub async fn deliver(mailer: &dyn Mailer, to: &[String], subject: &str, html: &str) -> Result<(), String> {
    match mailer.send(to, subject, html).await {
        Ok(()) => {
            tracing::info!(to = %to.join(", "), subject, "Email sent");
            Ok(())
        }
        Err(e) => {
            tracing::error!(to = %to.join(", "), subject, "Email failed: {e}");
            Err(e)
        }
    }
}
