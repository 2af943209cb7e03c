use crate::errors::ServiceError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError>;
}

/// SMTP delivery through `lettre`'s async transport
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpEmailSender {
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| ServiceError::InternalError(format!("SMTP relay error: {}", e)))?
            .port(port)
            .timeout(Some(timeout));

        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| ServiceError::InternalError(format!("Invalid from address: {}", e)))?,
            )
            .to(message
                .to
                .parse()
                .map_err(|e| ServiceError::ValidationError(format!("Invalid to address: {}", e)))?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| ServiceError::InternalError(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| super::upstream_error("smtp", e))?;
        Ok(())
    }
}

/// Writes emails to the log instead of sending them. Keeps the last messages
/// in memory so tests can inspect them.
#[derive(Clone, Default)]
pub struct LogEmailSender {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

const LOG_OUTBOX_LIMIT: usize = 100;

impl LogEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        info!(to = %message.to, subject = %message.subject, "Email (not sent, no SMTP configured)");
        let mut outbox = self.outbox.lock().await;
        if outbox.len() >= LOG_OUTBOX_LIMIT {
            outbox.remove(0);
        }
        outbox.push(message);
        Ok(())
    }
}
