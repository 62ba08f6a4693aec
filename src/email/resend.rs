use async_trait::async_trait;
use serde::Serialize;

use super::Mailer;

const RESEND_URL: &str = "https://api.resend.com/emails";

/// Delivery through the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

impl ResendMailer {
    pub fn new(api_key: &str, from: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), String> {
        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&SendEmail {
                from: &self.from,
                to,
                subject,
                html,
            })
            .send()
            .await
            .map_err(|e| format!("Error sending email: {e}"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(format!("Error sending email: {status} {body}"))
    }
}
