//! Workflow steps and per-session state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::ClassificationResult;
use crate::dispatch::DispatchRecord;
use crate::templates::TemplateFields;

/// The steps of composing a reply.
///
/// Progresses linearly: Write → Analyze → Recipient → Review → Sent.
/// Any non-terminal step may return to an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Write,
    Analyze,
    Recipient,
    Review,
    Sent,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Self::Write,
        Self::Analyze,
        Self::Recipient,
        Self::Review,
        Self::Sent,
    ];

    /// Whether this step is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// The next step in the linear progression, if any.
    pub fn next(&self) -> Option<Step> {
        match self {
            Self::Write => Some(Self::Analyze),
            Self::Analyze => Some(Self::Recipient),
            Self::Recipient => Some(Self::Review),
            Self::Review => Some(Self::Sent),
            Self::Sent => None,
        }
    }

    /// Check if a forward transition from `self` to `target` is valid.
    pub fn can_advance_to(&self, target: Step) -> bool {
        self.next() == Some(target)
    }

    /// Check if the user may navigate back from `self` to `target`.
    pub fn can_go_back_to(&self, target: Step) -> bool {
        !self.is_terminal() && target < *self
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Write => "write",
            Self::Analyze => "analyze",
            Self::Recipient => "recipient",
            Self::Review => "review",
            Self::Sent => "sent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown step: {s}"))
    }
}

/// Who the reply is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    /// Optional; empty when not given.
    pub company: String,
    pub email: String,
    pub subject: String,
}

/// Per-session record, owned by exactly one interactive session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub step: Step,
    pub sender_name: String,
    pub sender_company: String,
    /// Login identity; survives `restart`.
    pub sender_email: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_body: Option<String>,
    /// Set once the user edits the draft; re-rendering then leaves it alone.
    pub edited: bool,
    /// Dispatch attempts made during this login, oldest first.
    #[serde(default)]
    pub history: Vec<DispatchRecord>,
}

impl Session {
    /// Start a session for a logged-in sender.
    pub fn new(sender_email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            step: Step::Write,
            sender_name: String::new(),
            sender_company: String::new(),
            sender_email: sender_email.into(),
            message: String::new(),
            classification: None,
            recipient: None,
            draft_body: None,
            edited: false,
            history: Vec::new(),
        }
    }

    /// Clear everything composed so far and return to Write.
    ///
    /// The login identity and dispatch history belong to the login, not the
    /// draft, and are kept.
    pub fn reset(&mut self) {
        self.step = Step::Write;
        self.sender_name.clear();
        self.sender_company.clear();
        self.message.clear();
        self.classification = None;
        self.recipient = None;
        self.draft_body = None;
        self.edited = false;
    }

    /// Label of the current classification, if any.
    pub fn intent(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.label.as_str())
    }

    /// Template inputs drawn from the session and the given recipient.
    pub fn template_fields(&self, recipient: &Recipient) -> TemplateFields {
        TemplateFields {
            sender_name: self.sender_name.clone(),
            sender_company: self.sender_company.clone(),
            sender_email: self.sender_email.clone(),
            recipient_name: recipient.name.clone(),
            recipient_company: recipient.company.clone(),
            message: self.message.clone(),
        }
    }
}

/// Subject suggested for a label, e.g. `Regarding: Partnership`.
pub fn default_subject(label: Option<&str>) -> String {
    format!("Regarding: {}", title_case(label.unwrap_or("inquiry")))
}

/// Uppercase the first letter of every alphabetic run.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
