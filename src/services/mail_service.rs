use crate::error::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Hands mail to an HTTP provider. Without a configured endpoint messages are
/// only logged.
#[derive(Clone)]
pub struct MailService {
    client: Client,
    endpoint: Option<Url>,
    api_key: Option<String>,
}

impl MailService {
    pub fn new(client: Client, endpoint: Option<Url>, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    pub async fn send(&self, message: &MailMessage) -> Result<()> {
        let Some(endpoint) = &self.endpoint else {
            tracing::info!(to = %message.to, subject = %message.subject, "mail endpoint not configured, skipping send");
            return Ok(());
        };

        let mut req = self.client.post(endpoint.clone()).json(message);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Internal(format!(
                "mail provider returned {}: {}",
                status, body
            )));
        }
        tracing::info!(to = %message.to, subject = %message.subject, "mail handed to provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> MailMessage {
        MailMessage {
            to: "learner@example.com".into(),
            subject: "Your certificate".into(),
            text: "Congratulations".into(),
        }
    }

    #[tokio::test]
    async fn unconfigured_mailer_is_a_noop() {
        let mailer = MailService::new(Client::new(), None, None);
        assert!(mailer.send(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn posts_message_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer mail-key"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/send", server.uri())).unwrap();
        let mailer = MailService::new(Client::new(), Some(url), Some("mail-key".into()));
        mailer.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn provider_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let mailer = MailService::new(Client::new(), Some(url), None);
        assert!(mailer.send(&message()).await.is_err());
    }
}
