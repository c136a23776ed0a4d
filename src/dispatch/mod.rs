//! Email dispatch: one authenticated send attempt per call.
//!
//! `EmailDispatcher` never retries. Every attempt, successful or not, yields a
//! `DispatchRecord`; the caller decides whether to try again.

pub mod smtp;

pub use smtp::SmtpMailTransport;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DispatchError, DispatchErrorKind};
use crate::workflow::Recipient;

/// Username/password for one send. Dropped when the send returns.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// A fully addressed plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Moves one message over an authenticated connection.
///
/// Implementations open a connection per call and release it before
/// returning, whatever the outcome.
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(
        &self,
        email: &OutgoingEmail,
        credentials: Credentials,
    ) -> Result<(), DispatchError>;
}

/// Outcome of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Immutable record of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: Uuid,
    pub status: DispatchStatus,
    pub recipient: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
}

impl DispatchRecord {
    fn new(email: &OutgoingEmail, error: Option<DispatchError>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: if error.is_some() {
                DispatchStatus::Failed
            } else {
                DispatchStatus::Sent
            },
            recipient: email.to.clone(),
            subject: email.subject.clone(),
            timestamp: Utc::now(),
            error,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == DispatchStatus::Sent
    }

    pub fn error_kind(&self) -> Option<DispatchErrorKind> {
        self.error.as_ref().map(DispatchError::kind)
    }
}

/// Single-attempt sender over a [`MailTransport`].
#[derive(Clone)]
pub struct EmailDispatcher {
    transport: Arc<dyn MailTransport>,
}

impl EmailDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// Send `body` from `from` to the recipient, once.
    pub async fn send(
        &self,
        from: &str,
        body: &str,
        recipient: &Recipient,
        credentials: Credentials,
    ) -> DispatchRecord {
        let email = OutgoingEmail {
            from: from.to_string(),
            to: recipient.email.clone(),
            subject: recipient.subject.clone(),
            body: body.to_string(),
        };

        match self.transport.deliver(&email, credentials).await {
            Ok(()) => {
                tracing::info!("Email sent to {} via {}", email.to, self.transport.name());
                DispatchRecord::new(&email, None)
            }
            Err(e) => {
                tracing::warn!(
                    "Email to {} failed via {} ({}): {}",
                    email.to,
                    self.transport.name(),
                    e.kind(),
                    e
                );
                DispatchRecord::new(&email, Some(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use secrecy::ExposeSecret;

    use super::*;

    struct RecordingTransport {
        seen: Mutex<Vec<(OutgoingEmail, String)>>,
        result: Result<(), DispatchError>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(
            &self,
            email: &OutgoingEmail,
            credentials: Credentials,
        ) -> Result<(), DispatchError> {
            self.seen.lock().unwrap().push((
                email.clone(),
                credentials.password.expose_secret().to_string(),
            ));
            self.result.clone()
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            name: "John Smith".into(),
            company: String::new(),
            email: "john@abccorp.example".into(),
            subject: "Regarding: Inquiry".into(),
        }
    }

    #[tokio::test]
    async fn successful_send_records_sent() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            result: Ok(()),
        });
        let dispatcher = EmailDispatcher::new(transport.clone());

        let record = dispatcher
            .send("me@abc.example", "Hello", &recipient(), Credentials::new("me", "pw"))
            .await;

        assert!(record.is_sent());
        assert_eq!(record.error, None);
        assert_eq!(record.recipient, "john@abccorp.example");
        assert_eq!(record.subject, "Regarding: Inquiry");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.from, "me@abc.example");
        assert_eq!(seen[0].0.body, "Hello");
        assert_eq!(seen[0].1, "pw");
    }

    #[tokio::test]
    async fn failure_is_recorded_without_retry() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            result: Err(DispatchError::Transport("connection refused".into())),
        });
        let dispatcher = EmailDispatcher::new(transport.clone());

        let record = dispatcher
            .send("me@abc.example", "Hello", &recipient(), Credentials::new("me", "pw"))
            .await;

        assert_eq!(record.status, DispatchStatus::Failed);
        assert_eq!(record.error_kind(), Some(DispatchErrorKind::Transport));
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("me", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn record_serializes_error_kind() {
        let email = OutgoingEmail {
            from: "a@b.example".into(),
            to: "c@d.example".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        let record = DispatchRecord::new(&email, Some(DispatchError::Authentication("535".into())));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "authentication");

        let ok = DispatchRecord::new(&email, None);
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("error").is_none());
    }
}
