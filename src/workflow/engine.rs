//! WorkflowEngine: validates each user action against the current step and
//! performs its side effects.
//!
//! The engine holds only shared, read-only collaborators. Session state is
//! passed in explicitly on every call, so one engine serves many sessions.
//! A rejected action returns a `ValidationError` and leaves the session
//! untouched.

use std::sync::Arc;

use super::state::{Recipient, Session, Step, default_subject};
use crate::classifier::{ClassificationResult, SharedClassifier};
use crate::dispatch::{Credentials, DispatchRecord, EmailDispatcher};
use crate::error::{ValidationError, WorkflowError};
use crate::templates;

/// Recipient details as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientInput {
    pub name: String,
    pub company: String,
    pub email: String,
    /// Empty means "use the suggested subject".
    pub subject: String,
}

/// A user action.
#[derive(Debug)]
pub enum Action {
    SetSender { name: String, company: String },
    SubmitMessage(String),
    Analyze,
    ConfirmIntent,
    SubmitRecipient(RecipientInput),
    EditDraft(String),
    Send(Credentials),
    GoBack(Step),
    Restart,
}

/// Payload-free tag of an [`Action`], used by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SetSender,
    SubmitMessage,
    Analyze,
    ConfirmIntent,
    SubmitRecipient,
    EditDraft,
    Send,
    GoBack,
    Restart,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetSender => "set_sender",
            Self::SubmitMessage => "submit_message",
            Self::Analyze => "analyze",
            Self::ConfirmIntent => "confirm_intent",
            Self::SubmitRecipient => "submit_recipient",
            Self::EditDraft => "edit_draft",
            Self::Send => "send",
            Self::GoBack => "go_back",
            Self::Restart => "restart",
        }
    }

    /// The transition table: in which step is this action accepted?
    pub fn allowed_in(&self, step: Step) -> bool {
        use Step::*;
        match self {
            Self::SetSender | Self::SubmitMessage => step == Write,
            Self::Analyze | Self::ConfirmIntent => step == Analyze,
            Self::SubmitRecipient => step == Recipient,
            Self::EditDraft | Self::Send => step == Review,
            Self::GoBack => matches!(step, Analyze | Recipient | Review),
            Self::Restart => true,
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SetSender { .. } => ActionKind::SetSender,
            Self::SubmitMessage(_) => ActionKind::SubmitMessage,
            Self::Analyze => ActionKind::Analyze,
            Self::ConfirmIntent => ActionKind::ConfirmIntent,
            Self::SubmitRecipient(_) => ActionKind::SubmitRecipient,
            Self::EditDraft(_) => ActionKind::EditDraft,
            Self::Send(_) => ActionKind::Send,
            Self::GoBack(_) => ActionKind::GoBack,
            Self::Restart => ActionKind::Restart,
        }
    }
}

/// What an accepted action produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The session is now in this step.
    Step(Step),
    /// Analysis finished; the session stays in Analyze.
    Classified(ClassificationResult),
    /// A dispatch was attempted; check the record's status.
    Dispatched(DispatchRecord),
}

/// Finite state machine driving a session from draft to sent email.
#[derive(Clone)]
pub struct WorkflowEngine {
    classifier: Arc<SharedClassifier>,
    dispatcher: EmailDispatcher,
}

impl WorkflowEngine {
    pub fn new(classifier: Arc<SharedClassifier>, dispatcher: EmailDispatcher) -> Self {
        Self {
            classifier,
            dispatcher,
        }
    }

    /// Apply one action to a session.
    pub async fn apply(
        &self,
        session: &mut Session,
        action: Action,
    ) -> Result<Outcome, WorkflowError> {
        match action {
            Action::SetSender { name, company } => {
                self.set_sender(session, &name, &company).map(Outcome::Step)
            }
            Action::SubmitMessage(text) => self.submit_message(session, &text).map(Outcome::Step),
            Action::Analyze => self.analyze(session).await.map(Outcome::Classified),
            Action::ConfirmIntent => self.confirm_intent(session).map(Outcome::Step),
            Action::SubmitRecipient(input) => {
                self.submit_recipient(session, input).map(Outcome::Step)
            }
            Action::EditDraft(text) => self
                .edit_draft(session, &text)
                .map(|()| Outcome::Step(session.step)),
            Action::Send(credentials) => self
                .send(session, credentials)
                .await
                .map(Outcome::Dispatched),
            Action::GoBack(target) => self.go_back(session, target).map(Outcome::Step),
            Action::Restart => Ok(Outcome::Step(self.restart(session))),
        }
    }

    /// Record the sender's signature details.
    pub fn set_sender(
        &self,
        session: &mut Session,
        name: &str,
        company: &str,
    ) -> Result<Step, WorkflowError> {
        require(session, ActionKind::SetSender)?;
        session.sender_name = name.trim().to_string();
        session.sender_company = company.trim().to_string();
        Ok(session.step)
    }

    /// Store the draft text and move to Analyze.
    pub fn submit_message(&self, session: &mut Session, text: &str) -> Result<Step, WorkflowError> {
        require(session, ActionKind::SubmitMessage)?;
        if text.trim().is_empty() {
            return Err(reject(session, ValidationError::EmptyMessage));
        }
        session.message = text.to_string();
        Ok(advance(session, Step::Analyze))
    }

    /// Classify the stored message. The session stays in Analyze so the user
    /// can confirm or go back; a classifier failure leaves it unchanged.
    pub async fn analyze(
        &self,
        session: &mut Session,
    ) -> Result<ClassificationResult, WorkflowError> {
        require(session, ActionKind::Analyze)?;

        let result = match self.classifier.classify(&session.message).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Session {} analysis failed: {}", session.id, e);
                return Err(e.into());
            }
        };

        tracing::info!(
            "Session {} classified as {} ({:.2})",
            session.id,
            result.label,
            result.confidence
        );
        session.classification = Some(result.clone());
        Ok(result)
    }

    /// Accept the classification and move to Recipient.
    pub fn confirm_intent(&self, session: &mut Session) -> Result<Step, WorkflowError> {
        require(session, ActionKind::ConfirmIntent)?;
        if session.classification.is_none() {
            return Err(reject(session, ValidationError::ClassificationRequired));
        }
        Ok(advance(session, Step::Recipient))
    }

    /// Store the recipient, move to Review and render the draft unless the
    /// user has already edited it.
    pub fn submit_recipient(
        &self,
        session: &mut Session,
        input: RecipientInput,
    ) -> Result<Step, WorkflowError> {
        require(session, ActionKind::SubmitRecipient)?;

        let name = input.name.trim();
        let email = input.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(reject(session, ValidationError::MissingRecipientFields));
        }
        if !email.contains('@') {
            return Err(reject(
                session,
                ValidationError::MalformedEmail(email.to_string()),
            ));
        }

        let subject = match input.subject.trim() {
            "" => default_subject(session.intent()),
            s => s.to_string(),
        };
        let recipient = Recipient {
            name: name.to_string(),
            company: input.company.trim().to_string(),
            email: email.to_string(),
            subject,
        };

        if session.edited {
            tracing::debug!("Session {} keeps its edited draft", session.id);
        } else {
            let label = session.intent().unwrap_or("inquiry");
            let body = templates::render(label, &session.template_fields(&recipient));
            session.draft_body = Some(body);
        }
        session.recipient = Some(recipient);
        Ok(advance(session, Step::Review))
    }

    /// Replace the draft with the user's text. Later renders will not
    /// overwrite it.
    pub fn edit_draft(&self, session: &mut Session, text: &str) -> Result<(), WorkflowError> {
        require(session, ActionKind::EditDraft)?;
        if text.trim().is_empty() {
            return Err(reject(session, ValidationError::EmptyDraft));
        }
        session.draft_body = Some(text.to_string());
        session.edited = true;
        Ok(())
    }

    /// Make one dispatch attempt. On success the session moves to Sent; on
    /// failure it stays in Review with the draft intact. Either way the
    /// record is appended to the session history and returned.
    pub async fn send(
        &self,
        session: &mut Session,
        credentials: Credentials,
    ) -> Result<DispatchRecord, WorkflowError> {
        require(session, ActionKind::Send)?;
        let Some(recipient) = session.recipient.as_ref() else {
            return Err(reject(session, ValidationError::MissingRecipientFields));
        };
        let Some(body) = session.draft_body.as_deref() else {
            return Err(reject(session, ValidationError::EmptyDraft));
        };

        let record = self
            .dispatcher
            .send(&session.sender_email, body, recipient, credentials)
            .await;

        session.history.push(record.clone());
        if record.is_sent() {
            advance(session, Step::Sent);
        }
        Ok(record)
    }

    /// Return to an earlier step, keeping everything entered so far.
    pub fn go_back(&self, session: &mut Session, target: Step) -> Result<Step, WorkflowError> {
        require(session, ActionKind::GoBack)?;
        if !session.step.can_go_back_to(target) {
            return Err(reject(
                session,
                ValidationError::InvalidStep {
                    action: ActionKind::GoBack.name(),
                    step: session.step,
                },
            ));
        }
        tracing::info!("Session {} back from {} to {}", session.id, session.step, target);
        session.step = target;
        Ok(target)
    }

    /// Discard the draft and start over in Write.
    pub fn restart(&self, session: &mut Session) -> Step {
        tracing::info!("Session {} restarted from {}", session.id, session.step);
        session.reset();
        session.step
    }
}

/// Reject `kind` unless the transition table allows it in the current step.
fn require(session: &Session, kind: ActionKind) -> Result<(), WorkflowError> {
    if kind.allowed_in(session.step) {
        Ok(())
    } else {
        Err(reject(
            session,
            ValidationError::InvalidStep {
                action: kind.name(),
                step: session.step,
            },
        ))
    }
}

fn reject(session: &Session, error: ValidationError) -> WorkflowError {
    tracing::warn!(
        "Session {} rejected in step {}: {} ({})",
        session.id,
        session.step,
        error,
        error.code()
    );
    error.into()
}

fn advance(session: &mut Session, target: Step) -> Step {
    debug_assert!(session.step.can_advance_to(target));
    tracing::info!("Session {} {} -> {}", session.id, session.step, target);
    session.step = target;
    target
}
