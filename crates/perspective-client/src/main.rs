//! `perspective` — drive a debate chat session from the terminal.
//!
//! Starts a session with the given prompt (or one read from stdin),
//! prints transcript entries as they stream in, asks for clarification
//! answers when the backend requests them, and exits on completion or
//! error.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use perspective_client::{ChatClient, ClientConfig};
use perspective_session::{build_feed, FeedEntry, SessionPhase};

#[derive(Debug, Parser)]
#[command(name = "perspective", about = "Multi-perspective debate chat client")]
struct Args {
    /// Backend HTTP base (overrides PERSPECTIVE_HTTP_BASE).
    #[arg(long)]
    http_base: Option<String>,

    /// Backend stream base (overrides PERSPECTIVE_WS_BASE).
    #[arg(long)]
    ws_base: Option<String>,

    /// Show the raw agent debate, not just clarification and synthesis.
    #[arg(long)]
    show_debate: bool,

    /// The question to open the session with; read from stdin if absent.
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match (&args.http_base, &args.ws_base) {
        (None, None) => ClientConfig::from_env(),
        (http, ws) => ClientConfig::from_parts(http.as_deref(), ws.as_deref()),
    }
    .context("resolving backend configuration")?;

    let prompt = match args.prompt {
        Some(prompt) => prompt,
        None => read_line("What's on your mind today? ").await?,
    };

    let client = ChatClient::new(config).context("building chat client")?;
    client.start_session(&prompt).await;

    let mut printed = 0usize;
    let mut last_banner: Option<String> = None;
    let mut clarification_asked = false;

    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = client.snapshot().await;
        let (banner, body) = split_feed(build_feed(&snapshot, args.show_debate));

        if let Some(banner) = banner {
            if last_banner.as_deref() != Some(banner.content.as_str()) {
                print_entry(&banner);
                last_banner = Some(banner.content);
            }
        }

        // A history replace on completion can rebuild the whole body.
        if body.len() < printed {
            println!("--- reconciled transcript ---");
            printed = 0;
        }
        for entry in &body[printed..] {
            print_entry(entry);
        }
        printed = body.len();

        if snapshot.phase == SessionPhase::ClarificationPending
            && !snapshot.clarification_submitted
            && !clarification_asked
        {
            clarification_asked = true;
            let answers = read_line("Your answers: ").await?;
            client.submit_clarification(&answers).await;
        }
        if snapshot.phase != SessionPhase::ClarificationPending {
            clarification_asked = false;
        }

        if snapshot.phase.is_terminal() {
            if let Some(error) = &snapshot.error {
                eprintln!("session ended with error: {}", error);
            }
            break;
        }
        if snapshot.session_id.is_none() && snapshot.error.is_some() {
            // Init failed — nothing will stream.
            break;
        }
    }

    Ok(())
}

fn print_entry(entry: &FeedEntry) {
    println!("[{}] {}", entry.title, entry.content);
}

/// Split the session banner off the front of the feed.
///
/// The banner's `State:` text changes with every phase, so it is
/// reprinted on change; the remaining body is append-only and safe to
/// diff by prefix length.
fn split_feed(feed: Vec<FeedEntry>) -> (Option<FeedEntry>, Vec<FeedEntry>) {
    let mut body = feed;
    let banner = match body.first() {
        Some(entry) if entry.title == "Session" => Some(body.remove(0)),
        _ => None,
    };
    (banner, body)
}


async fn read_line(prompt: &str) -> Result<String> {
    use std::io::Write;

    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || -> Result<String> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .context("stdin task failed")?
}
