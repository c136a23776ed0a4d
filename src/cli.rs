//! Terminal REPL over the workflow engine.
//!
//! Plain lines answer the current step's prompts; lines starting with `/` are
//! commands. `Repl::handle_line` is I/O-free so the binary only has to shuttle
//! lines between stdin and stdout.

use crate::classifier::ClassificationResult;
use crate::dispatch::Credentials;
use crate::error::WorkflowError;
use crate::workflow::{ActionKind, RecipientInput, Session, Step, WorkflowEngine};

/// Width of a full probability bar.
const BAR_WIDTH: f32 = 50.0;

/// A slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze,
    Confirm,
    Edit,
    Send,
    Back(Step),
    Restart,
    Status,
    Help,
    Quit,
}

const COMMAND_NAMES: [&str; 10] = [
    "analyze", "confirm", "edit", "send", "back", "restart", "status", "help", "quit", "exit",
];

/// Whether `line` starts with the name of a known command, valid or not.
fn names_command(line: &str) -> bool {
    line.trim()
        .strip_prefix('/')
        .and_then(|rest| rest.split_whitespace().next())
        .is_some_and(|name| COMMAND_NAMES.contains(&name.to_lowercase().as_str()))
}

/// Parse a slash command. Returns `None` for plain (non-command) lines.
pub fn parse_command(line: &str) -> Option<Result<Command, String>> {
    let rest = line.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    let command = match (name.as_str(), arg) {
        ("analyze", None) => Ok(Command::Analyze),
        ("confirm", None) => Ok(Command::Confirm),
        ("edit", None) => Ok(Command::Edit),
        ("send", None) => Ok(Command::Send),
        ("back", Some(step)) => step.parse().map(Command::Back),
        ("back", None) => Err("Usage: /back <write|analyze|recipient|review>".to_string()),
        ("restart", None) => Ok(Command::Restart),
        ("status", None) => Ok(Command::Status),
        ("help", None) => Ok(Command::Help),
        ("quit" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("Unknown command: /{rest}")),
    };
    Some(command)
}

/// Field prompts collected in a step, in order.
fn form_fields(step: Step) -> &'static [&'static str] {
    match step {
        Step::Write => &["Your name", "Your company", "Your message"],
        Step::Recipient => &[
            "Recipient name",
            "Company name (optional)",
            "Email address",
            "Subject (blank for suggested)",
        ],
        Step::Analyze | Step::Review | Step::Sent => &[],
    }
}

/// Render a distribution most-likely first, one bar per label.
pub fn format_distribution(result: &ClassificationResult) -> String {
    let mut lines = vec![
        format!("Intent: {}", result.label.to_uppercase()),
        format!("Confidence: {:.2}%", result.confidence * 100.0),
        String::new(),
        "All probabilities:".to_string(),
    ];
    for p in result.ranked() {
        let bar = "█".repeat((p.probability * BAR_WIDTH) as usize);
        lines.push(format!(
            "  {:12}: {:6.2}% {}",
            p.label,
            p.probability * 100.0,
            bar
        ));
    }
    lines.join("\n")
}

/// Output of one REPL line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplOutput {
    pub text: String,
    pub quit: bool,
}

impl ReplOutput {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

#[derive(Debug)]
enum Mode {
    Form,
    EditingDraft(Vec<String>),
    Password,
}

/// Interactive session state for one terminal user.
pub struct Repl {
    engine: WorkflowEngine,
    session: Session,
    answers: Vec<String>,
    mode: Mode,
}

impl Repl {
    pub fn new(engine: WorkflowEngine, session: Session) -> Self {
        Self {
            engine,
            session,
            answers: Vec::new(),
            mode: Mode::Form,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// What the user should type next.
    pub fn prompt(&self) -> String {
        match self.mode {
            Mode::EditingDraft(_) => return "draft> ".to_string(),
            Mode::Password => return "App password (blank to cancel): ".to_string(),
            Mode::Form => {}
        }
        let fields = form_fields(self.session.step);
        if let Some(field) = fields.get(self.answers.len()) {
            return format!("{field}: ");
        }
        match self.session.step {
            Step::Analyze => "/confirm, /analyze or /back write> ".to_string(),
            Step::Review => "/send, /edit or /back recipient> ".to_string(),
            Step::Sent => "/restart to compose another> ".to_string(),
            Step::Write | Step::Recipient => "> ".to_string(),
        }
    }

    /// Handle one input line.
    pub async fn handle_line(&mut self, line: &str) -> ReplOutput {
        let line = line.trim_end_matches(['\r', '\n']);

        match std::mem::replace(&mut self.mode, Mode::Form) {
            Mode::EditingDraft(mut lines) => {
                if line.trim() != "." {
                    lines.push(line.to_string());
                    self.mode = Mode::EditingDraft(lines);
                    return ReplOutput::default();
                }
                return match self.engine.edit_draft(&mut self.session, &lines.join("\n")) {
                    Ok(()) => ReplOutput::text(self.draft_preview()),
                    Err(e) => ReplOutput::text(error_text(&e)),
                };
            }
            Mode::Password => return self.send(line).await,
            Mode::Form => {}
        }

        // `//text` answers a prompt with a literal leading slash.
        if let Some(escaped) = line.trim_start().strip_prefix("//") {
            return self.answer(&format!("/{escaped}")).await;
        }

        match parse_command(line) {
            Some(Ok(command)) => self.run(command).await,
            // An open form takes `/etc/hosts` and the like as text.
            Some(Err(_)) if self.awaiting_answer() && !names_command(line) => {
                self.answer(line).await
            }
            Some(Err(message)) => ReplOutput::text(format!("❌ {message}")),
            None => self.answer(line).await,
        }
    }

    /// Whether the current step still has form fields to fill.
    pub fn awaiting_answer(&self) -> bool {
        form_fields(self.session.step).len() > self.answers.len()
    }

    /// Whether the next line is a secret that the driver should read
    /// without echo.
    pub fn wants_secret(&self) -> bool {
        matches!(self.mode, Mode::Password)
    }

    async fn run(&mut self, command: Command) -> ReplOutput {
        match command {
            Command::Analyze => self.analyze().await,
            Command::Confirm => match self.engine.confirm_intent(&mut self.session) {
                Ok(_) => self.enter_step(),
                Err(e) => ReplOutput::text(error_text(&e)),
            },
            Command::Edit => {
                if !ActionKind::EditDraft.allowed_in(self.session.step) {
                    return ReplOutput::text("❌ There is no draft to edit yet");
                }
                self.mode = Mode::EditingDraft(Vec::new());
                ReplOutput::text("Type the new draft. End with a line containing only '.'")
            }
            Command::Send => {
                if !ActionKind::Send.allowed_in(self.session.step) {
                    return ReplOutput::text("❌ Nothing is ready to send");
                }
                self.mode = Mode::Password;
                ReplOutput::default()
            }
            Command::Back(step) => match self.engine.go_back(&mut self.session, step) {
                Ok(_) => self.enter_step(),
                Err(e) => ReplOutput::text(error_text(&e)),
            },
            Command::Restart => {
                self.engine.restart(&mut self.session);
                self.enter_step()
            }
            Command::Status => ReplOutput::text(self.status()),
            Command::Help => ReplOutput::text(HELP),
            Command::Quit => ReplOutput {
                text: "Bye.".to_string(),
                quit: true,
            },
        }
    }

    async fn answer(&mut self, line: &str) -> ReplOutput {
        let fields = form_fields(self.session.step);
        if fields.is_empty() {
            return ReplOutput::text("Use a /command here. /help lists them.");
        }

        self.answers.push(line.trim().to_string());
        if self.answers.len() < fields.len() {
            return ReplOutput::default();
        }

        let answers = std::mem::take(&mut self.answers);
        match self.session.step {
            Step::Write => {
                let submitted = self
                    .engine
                    .set_sender(&mut self.session, &answers[0], &answers[1])
                    .and_then(|_| self.engine.submit_message(&mut self.session, &answers[2]));
                match submitted {
                    Ok(_) => self.analyze().await,
                    Err(e) => ReplOutput::text(error_text(&e)),
                }
            }
            Step::Recipient => {
                let input = RecipientInput {
                    name: answers[0].clone(),
                    company: answers[1].clone(),
                    email: answers[2].clone(),
                    subject: answers[3].clone(),
                };
                match self.engine.submit_recipient(&mut self.session, input) {
                    Ok(_) => ReplOutput::text(self.draft_preview()),
                    Err(e) => ReplOutput::text(error_text(&e)),
                }
            }
            Step::Analyze | Step::Review | Step::Sent => ReplOutput::default(),
        }
    }

    async fn analyze(&mut self) -> ReplOutput {
        match self.engine.analyze(&mut self.session).await {
            Ok(result) => ReplOutput::text(format_distribution(&result)),
            Err(e) => ReplOutput::text(format!("{}\nRetry with /analyze.", error_text(&e))),
        }
    }

    async fn send(&mut self, password: &str) -> ReplOutput {
        if password.is_empty() {
            return ReplOutput::text("Send cancelled.");
        }
        let credentials = Credentials::new(self.session.sender_email.clone(), password);
        match self.engine.send(&mut self.session, credentials).await {
            Ok(record) if record.is_sent() => ReplOutput::text(format!(
                "✅ Email sent to {} at {}",
                record.recipient,
                record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            Ok(record) => ReplOutput::text(format!(
                "❌ Failed ({}): {}\nYour draft is unchanged. /send to try again.",
                record
                    .error_kind()
                    .map(|k| k.to_string())
                    .unwrap_or_default(),
                record
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default()
            )),
            Err(e) => ReplOutput::text(error_text(&e)),
        }
    }

    fn enter_step(&mut self) -> ReplOutput {
        self.answers.clear();
        self.mode = Mode::Form;
        ReplOutput::text(format!("Step: {}", self.session.step))
    }

    fn draft_preview(&self) -> String {
        let Some(recipient) = self.session.recipient.as_ref() else {
            return String::new();
        };
        format!(
            "To: {} <{}>\nSubject: {}\n\n{}",
            recipient.name,
            recipient.email,
            recipient.subject,
            self.session.draft_body.as_deref().unwrap_or_default()
        )
    }

    fn status(&self) -> String {
        let s = &self.session;
        let mut lines = vec![
            format!("Step: {}", s.step),
            format!("Sender: {}", s.sender_email),
        ];
        if let Some(c) = &s.classification {
            lines.push(format!("Intent: {} ({:.2}%)", c.label, c.confidence * 100.0));
        }
        if let Some(r) = &s.recipient {
            lines.push(format!("Recipient: {} <{}>", r.name, r.email));
        }
        if s.edited {
            lines.push("Draft: edited".to_string());
        }
        lines.push(format!(
            "Sent this session: {}",
            s.history.iter().filter(|r| r.is_sent()).count()
        ));
        lines.join("\n")
    }
}

fn error_text(error: &WorkflowError) -> String {
    format!("❌ {error}")
}

const HELP: &str = "\
Commands:
  /analyze          classify the message again
  /confirm          accept the detected intent
  /edit             replace the draft text
  /send             send the draft (asks for your app password)
  /back <step>      return to write, analyze, recipient or review
  /restart          discard everything and start over
  /status           show the current session
  /quit             exit

Start an answer with // to begin it with a literal /.";

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::classifier::{
        IntentClassifier, LabelCatalog, LabelProbability, SequenceClassifier, SharedClassifier,
        TokenizedInput, WordPieceTokenizer,
    };
    use crate::dispatch::{EmailDispatcher, MailTransport, OutgoingEmail};
    use crate::error::{ClassifierError, DispatchError};

    struct InquiryModel;

    impl SequenceClassifier for InquiryModel {
        fn num_labels(&self) -> usize {
            2
        }

        fn classify_raw(&self, _input: &TokenizedInput) -> Result<Vec<f32>, ClassifierError> {
            Ok(vec![2.0, 0.0])
        }
    }

    struct PasswordTransport;

    #[async_trait]
    impl MailTransport for PasswordTransport {
        fn name(&self) -> &str {
            "stub"
        }

        async fn deliver(
            &self,
            _email: &OutgoingEmail,
            credentials: Credentials,
        ) -> Result<(), DispatchError> {
            use secrecy::ExposeSecret;
            if credentials.password.expose_secret() == "right" {
                Ok(())
            } else {
                Err(DispatchError::Authentication("535 rejected".into()))
            }
        }
    }

    fn repl() -> Repl {
        let tokenizer =
            WordPieceTokenizer::from_tokens(["[PAD]", "[UNK]", "[CLS]", "[SEP]"]).unwrap();
        let classifier = IntentClassifier::new(
            LabelCatalog::new(["inquiry", "sales"]).unwrap(),
            Box::new(tokenizer),
            Box::new(InquiryModel),
            16,
        )
        .unwrap();
        let engine = WorkflowEngine::new(
            Arc::new(SharedClassifier::preloaded(classifier)),
            EmailDispatcher::new(Arc::new(PasswordTransport)),
        );
        Repl::new(engine, Session::new("me@abc.example"))
    }

    async fn feed(repl: &mut Repl, lines: &[&str]) -> ReplOutput {
        let mut last = ReplOutput::default();
        for line in lines {
            last = repl.handle_line(line).await;
        }
        last
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/send"), Some(Ok(Command::Send)));
        assert_eq!(
            parse_command(" /back Recipient "),
            Some(Ok(Command::Back(Step::Recipient)))
        );
        assert!(matches!(parse_command("/back"), Some(Err(_))));
        assert!(matches!(parse_command("/back later"), Some(Err(_))));
        assert!(matches!(parse_command("/dance"), Some(Err(_))));
        assert_eq!(parse_command("/exit"), Some(Ok(Command::Quit)));
    }

    #[test]
    fn distribution_is_ranked_with_bars() {
        let result = ClassificationResult {
            label: "sales".into(),
            confidence: 0.8,
            distribution: vec![
                LabelProbability {
                    label: "inquiry".into(),
                    probability: 0.2,
                },
                LabelProbability {
                    label: "sales".into(),
                    probability: 0.8,
                },
            ],
        };
        let text = format_distribution(&result);
        assert!(text.starts_with("Intent: SALES"));
        let sales = text.find("  sales").unwrap();
        let inquiry = text.find("  inquiry").unwrap();
        assert!(sales < inquiry);
        assert!(text.contains(&"█".repeat(40)));
    }

    #[tokio::test]
    async fn walks_to_review_and_sends_after_retry() {
        let mut repl = repl();
        assert_eq!(repl.prompt(), "Your name: ");

        let out = feed(&mut repl, &["Priya", "ABC Corp", "Could you send pricing?"]).await;
        assert!(out.text.contains("Intent: INQUIRY"));
        assert_eq!(repl.session().step, Step::Analyze);

        feed(&mut repl, &["/confirm"]).await;
        assert_eq!(repl.prompt(), "Recipient name: ");
        let out = feed(&mut repl, &["John", "", "john@x.example", ""]).await;
        assert!(out.text.contains("Subject: Regarding: Inquiry"));
        assert!(out.text.contains("share your catalog and pricing information."));

        let out = feed(&mut repl, &["/send", "wrong"]).await;
        assert!(out.text.contains("Failed (authentication)"));
        assert_eq!(repl.session().step, Step::Review);

        let out = feed(&mut repl, &["/send", "right"]).await;
        assert!(out.text.starts_with("✅ Email sent to john@x.example"));
        assert_eq!(repl.session().step, Step::Sent);
    }

    #[tokio::test]
    async fn empty_message_restarts_the_form() {
        let mut repl = repl();
        let out = feed(&mut repl, &["Priya", "ABC", "   "]).await;
        assert!(out.text.contains("Message is empty"));
        assert_eq!(repl.session().step, Step::Write);
        assert_eq!(repl.prompt(), "Your name: ");
    }

    #[tokio::test]
    async fn edit_mode_collects_lines_until_dot() {
        let mut repl = repl();
        feed(&mut repl, &["P", "C", "hello", "/confirm", "John", "", "j@x.example", "Hi"]).await;
        let out = feed(&mut repl, &["/edit", "Line one", "Line two", "."]).await;
        assert!(out.text.ends_with("Line one\nLine two"));
        assert!(repl.session().edited);
    }

    #[tokio::test]
    async fn quit_and_unknown_commands() {
        let mut repl = repl();
        assert!(feed(&mut repl, &["/quit"]).await.quit);
        let out = feed(&mut repl, &["/send"]).await;
        assert!(out.text.contains("Nothing is ready to send"));

        feed(&mut repl, &["P", "C", "hello"]).await;
        assert_eq!(repl.session().step, Step::Analyze);
        let out = feed(&mut repl, &["/nope"]).await;
        assert!(out.text.contains("Unknown command"));
    }

    #[tokio::test]
    async fn slash_lines_in_a_form_are_text() {
        let mut repl = repl();
        feed(&mut repl, &["/etc", "//confirm", "/var/log is full"]).await;
        let session = repl.session();
        assert_eq!(session.step, Step::Analyze);
        assert_eq!(session.sender_name, "/etc");
        assert_eq!(session.sender_company, "/confirm");
        assert_eq!(session.message, "/var/log is full");
    }

    #[tokio::test]
    async fn known_commands_still_run_inside_a_form() {
        let mut repl = repl();
        let out = feed(&mut repl, &["Priya", "/status"]).await;
        assert!(out.text.starts_with("Step: write"));
        let out = feed(&mut repl, &["/back"]).await;
        assert!(out.text.contains("Usage: /back"));
        assert_eq!(repl.prompt(), "Your company: ");
    }

    #[tokio::test]
    async fn password_prompt_is_flagged_secret() {
        let mut repl = repl();
        feed(&mut repl, &["P", "C", "hello", "/confirm", "John", "", "j@x.example", ""]).await;
        assert!(!repl.wants_secret());
        feed(&mut repl, &["/send"]).await;
        assert!(repl.wants_secret());
        let out = feed(&mut repl, &["wrong"]).await;
        assert!(!out.text.contains("wrong"));
        assert!(!repl.wants_secret());
    }
}
