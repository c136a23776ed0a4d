use std::io::IsTerminal;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use intent_mail::classifier::{CheckpointLoader, SharedClassifier};
use intent_mail::cli::{Repl, format_distribution};
use intent_mail::config::AppConfig;
use intent_mail::dispatch::{EmailDispatcher, SmtpMailTransport};
use intent_mail::workflow::{Session, WorkflowEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    let classifier = Arc::new(SharedClassifier::new(Arc::new(CheckpointLoader::new(
        config.classifier.clone(),
    ))));

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("classify") {
        let text = args[1..].join(" ");
        if text.trim().is_empty() {
            anyhow::bail!("Usage: intent-mail classify <email text>");
        }
        let result = classifier.classify(&text).await?;
        println!("{}", format_distribution(&result));
        return Ok(());
    }

    eprintln!("Intent Mail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Signed in as: {}", config.user_email);
    eprintln!("   Checkpoint: {}", config.classifier.checkpoint_dir.display());
    eprintln!("   SMTP: {}:{}", config.smtp.host, config.smtp.port);
    eprintln!("   Type /help for commands, /quit to exit.\n");

    let dispatcher = EmailDispatcher::new(Arc::new(SmtpMailTransport::new(config.smtp.clone())));
    let engine = WorkflowEngine::new(classifier, dispatcher);
    let mut repl = Repl::new(engine, Session::new(config.user_email.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stderr = tokio::io::stderr();
    loop {
        stderr.write_all(repl.prompt().as_bytes()).await?;
        stderr.flush().await?;

        let line = if repl.wants_secret() && std::io::stdin().is_terminal() {
            let secret = tokio::task::spawn_blocking(read_hidden_line).await??;
            eprintln!();
            secret
        } else {
            let Some(line) = lines.next_line().await? else {
                break; // EOF
            };
            line
        };
        let output = repl.handle_line(&line).await;
        if !output.text.is_empty() {
            println!("\n{}\n", output.text);
        }
        if output.quit {
            break;
        }
    }

    Ok(())
}

/// Read one line from the terminal without echoing it. Esc or Ctrl-C yields
/// an empty line, which cancels the prompt.
fn read_hidden_line() -> std::io::Result<String> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

    crossterm::terminal::enable_raw_mode()?;
    let read = || -> std::io::Result<String> {
        let mut secret = String::new();
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(secret),
                KeyCode::Esc => return Ok(String::new()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(String::new());
                }
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    };
    let result = read();
    crossterm::terminal::disable_raw_mode()?;
    result
}
