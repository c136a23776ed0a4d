//! SMTP transport via lettre: STARTTLS on the submission port.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::{Credentials, MailTransport, OutgoingEmail};
use crate::config::SmtpConfig;
use crate::error::{DispatchError, DispatchErrorKind};

/// Reply codes that mean the server rejected our credentials.
const AUTH_FAILURE_CODES: [&str; 4] = ["454", "530", "534", "535"];

/// Sends through a submission server, one connection per message.
///
/// lettre is built without its connection pool, so the connection opened for
/// a send is closed before `deliver` returns.
#[derive(Debug, Clone)]
pub struct SmtpMailTransport {
    config: SmtpConfig,
}

impl SmtpMailTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn deliver(
        &self,
        email: &OutgoingEmail,
        credentials: Credentials,
    ) -> Result<(), DispatchError> {
        let config = self.config.clone();
        let email = email.clone();
        tokio::task::spawn_blocking(move || send_blocking(&config, &email, credentials))
            .await
            .map_err(|e| DispatchError::Unknown(format!("SMTP task failed: {e}")))?
    }
}

fn send_blocking(
    config: &SmtpConfig,
    email: &OutgoingEmail,
    credentials: Credentials,
) -> Result<(), DispatchError> {
    let message = build_message(email)?;

    let creds = SmtpCredentials::new(
        credentials.username,
        credentials.password.expose_secret().to_string(),
    );

    let transport = SmtpTransport::starttls_relay(&config.host)
        .map_err(|e| DispatchError::Transport(format!("SMTP relay error: {e}")))?
        .port(config.port)
        .credentials(creds)
        .build();

    transport.send(&message).map_err(|e| {
        let signal = FailureSignal::from_smtp(&e);
        let reason = format!("SMTP send failed: {e}");
        match signal.kind() {
            DispatchErrorKind::Authentication => DispatchError::Authentication(reason),
            DispatchErrorKind::Transport => DispatchError::Transport(reason),
            DispatchErrorKind::Unknown => DispatchError::Unknown(reason),
        }
    })?;

    tracing::debug!("SMTP session to {}:{} closed", config.host, config.port);
    Ok(())
}

fn build_message(email: &OutgoingEmail) -> Result<Message, DispatchError> {
    Message::builder()
        .from(
            email
                .from
                .parse()
                .map_err(|e| DispatchError::Unknown(format!("Invalid from address: {e}")))?,
        )
        .to(email
            .to
            .parse()
            .map_err(|e| DispatchError::Unknown(format!("Invalid to address: {e}")))?)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| DispatchError::Unknown(format!("Failed to build email: {e}")))
}

/// What an SMTP failure looked like, reduced to the facts that decide its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FailureSignal {
    /// Server reply code, e.g. `"535"`.
    code: Option<String>,
    transient: bool,
    timeout: bool,
    /// An I/O or TLS error sits somewhere in the source chain.
    connection: bool,
}

impl FailureSignal {
    fn from_smtp(err: &lettre::transport::smtp::Error) -> Self {
        let mut connection = false;
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            if cause.is::<std::io::Error>() || cause.is::<rustls::Error>() {
                connection = true;
                break;
            }
            source = cause.source();
        }

        Self {
            code: err.status().map(|c| c.to_string()),
            transient: err.is_transient(),
            timeout: err.is_timeout(),
            connection,
        }
    }

    fn kind(&self) -> DispatchErrorKind {
        if self
            .code
            .as_deref()
            .is_some_and(|c| AUTH_FAILURE_CODES.contains(&c))
        {
            DispatchErrorKind::Authentication
        } else if self.connection || self.timeout || self.transient {
            DispatchErrorKind::Transport
        } else {
            DispatchErrorKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: "me@abc.example".into(),
            to: to.into(),
            subject: "Regarding: Sales".into(),
            body: "Hello".into(),
        }
    }

    #[test]
    fn auth_codes_classify_as_authentication() {
        for code in AUTH_FAILURE_CODES {
            let signal = FailureSignal {
                code: Some(code.to_string()),
                ..Default::default()
            };
            assert_eq!(signal.kind(), DispatchErrorKind::Authentication);
        }
    }

    #[test]
    fn connection_problems_classify_as_transport() {
        let refused = FailureSignal {
            connection: true,
            ..Default::default()
        };
        assert_eq!(refused.kind(), DispatchErrorKind::Transport);

        let timeout = FailureSignal {
            timeout: true,
            ..Default::default()
        };
        assert_eq!(timeout.kind(), DispatchErrorKind::Transport);

        let busy = FailureSignal {
            code: Some("421".into()),
            transient: true,
            ..Default::default()
        };
        assert_eq!(busy.kind(), DispatchErrorKind::Transport);
    }

    #[test]
    fn other_rejections_are_unknown() {
        let rejected = FailureSignal {
            code: Some("550".into()),
            ..Default::default()
        };
        assert_eq!(rejected.kind(), DispatchErrorKind::Unknown);
        assert_eq!(FailureSignal::default().kind(), DispatchErrorKind::Unknown);
    }

    #[test]
    fn message_builds_for_valid_addresses() {
        assert!(build_message(&email("john@abccorp.example")).is_ok());
    }

    #[test]
    fn malformed_recipient_is_unknown_dispatch_error() {
        let err = build_message(&email("not an address")).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Unknown);
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let transport = SmtpMailTransport::new(SmtpConfig {
            host: "127.0.0.1".into(),
            port: 1,
        });
        let err = transport
            .deliver(&email("john@abccorp.example"), Credentials::new("me", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Transport);
    }
}
