//! NeuralDeep terminal chat client
//!
//! Reads prompts from stdin and streams replies from the relay. Lines
//! starting with `/` are commands; Ctrl-C stops the reply in progress.

use neuraldeep::client::HttpRelayClient;
use neuraldeep::conversation::{ChatSession, Notice, Severity, StreamOutcome};
use neuraldeep::document::{load_document, PdfExtractor};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const DEFAULT_URL: &str = "http://127.0.0.1:3000";

const HELP: &str = "Commands:
  /attach <file.pdf>  ground answers in a PDF (up to 10MB)
  /detach             remove the attached PDF
  /stats              show conversation statistics
  /quit               exit
Anything else is sent as a message. Ctrl-C stops a reply in progress.";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(String),
    Attach(PathBuf),
    Detach,
    Stats,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Send(line.to_string()));
    };

    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));
    match name {
        "attach" if !arg.is_empty() => Some(Command::Attach(PathBuf::from(arg))),
        "detach" => Some(Command::Detach),
        "stats" => Some(Command::Stats),
        "quit" | "exit" => Some(Command::Quit),
        _ => Some(Command::Help),
    }
}

fn show(notice: &Notice) {
    match notice.severity {
        Severity::Info => println!("[{notice}]"),
        Severity::Error => eprintln!("[{notice}]"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let base_url = std::env::var("NEURALDEEP_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let mut session = ChatSession::new(HttpRelayClient::new(&base_url)?);
    tracing::info!(url = %base_url, "Chat client started");

    println!("Connected to {base_url}. Type /help for commands.");
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next() => match line {
                Some(line) => line?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        match parse_command(&line) {
            None => {}
            Some(Command::Quit) => break,
            Some(Command::Help) => println!("{HELP}"),
            Some(Command::Stats) => {
                let stats = session.conversation().stats();
                println!("Messages sent: {}", stats.message_count);
                println!(
                    "Document loaded: {}",
                    if stats.document_loaded { "yes" } else { "no" }
                );
                if let Some(started) = stats.started_at {
                    println!("Started: {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            Some(Command::Detach) => {
                if let Some(notice) = session.conversation_mut().detach_document() {
                    show(&notice);
                }
            }
            Some(Command::Attach(path)) => {
                let loaded =
                    tokio::task::spawn_blocking(move || load_document(&path, &PdfExtractor)).await?;
                let result = match loaded {
                    Ok(doc) => session
                        .conversation_mut()
                        .attach_document(doc.filename, doc.text)
                        .map_err(|e| e.notice()),
                    Err(e) => {
                        tracing::warn!(error = %e, "Document extraction failed");
                        Err(Some(e.notice()))
                    }
                };
                match result {
                    Ok(notice) => show(&notice),
                    Err(Some(notice)) => show(&notice),
                    Err(None) => {}
                }
            }
            Some(Command::Send(text)) => {
                let cancel = CancellationToken::new();
                let interrupt = {
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            cancel.cancel();
                        }
                    })
                };

                let outcome = session
                    .submit(&text, &cancel, |chunk| {
                        print!("{chunk}");
                        if let Err(e) = std::io::stdout().flush() {
                            tracing::debug!(error = %e, "Failed to flush stdout");
                        }
                    })
                    .await;
                interrupt.abort();
                println!();

                match outcome {
                    Ok(StreamOutcome::Cancelled) => println!("[stopped]"),
                    Ok(outcome) => {
                        if let Some(notice) = outcome.notice() {
                            show(&notice);
                        }
                    }
                    Err(e) => {
                        if let Some(notice) = e.notice() {
                            show(&notice);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
