use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use pushstream::{ConfigError, EventReceiver, PushStream, SessionState, StreamConfig, StreamError, StreamEvent, StreamHandle};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("stream stopped unexpectedly: {0}")]
    Stream(#[from] StreamError),
    #[error("event stream closed")]
    Closed,
    #[error("timed out after {0}s waiting for the session to connect")]
    Timeout(u64),
    #[error("failed to install ctrl-c handler: {0}")]
    Signal(#[source] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Credentials and timings come from `PUSHSTREAM_*` environment variables
/// (see [`StreamConfig::from_env`]); flags override the endpoint and groups.
#[derive(Parser, Debug)]
#[command(name = "pushstream-cli", about = "Push-channel websocket client")]
struct Cli {
    #[arg(long, help = "Override PUSHSTREAM_URL")]
    url: Option<String>,

    #[arg(long = "group", value_delimiter = ',', help = "Replace PUSHSTREAM_GROUP_IDS")]
    group_ids: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn apply_overrides(&self, mut config: StreamConfig) -> StreamConfig {
        if let Some(url) = &self.url {
            config = config.with_url(url.clone());
        }
        if !self.group_ids.is_empty() {
            config = config.with_group_ids(self.group_ids.iter().cloned());
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print events as JSON lines until ctrl-c.
    Listen(ListenArgs),
    /// Connect, wait for negotiation to finish, then exit.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct ListenArgs {
    #[arg(long, default_value_t = false, help = "Also print status, error and state events")]
    verbose: bool,

    #[arg(long, help = "Stop after this many payload messages")]
    max_messages: Option<usize>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.apply_overrides(StreamConfig::from_env()?);
    info!(url = %config.url, user_id = %config.user_id, groups = config.group_ids.len(), "cli: starting");

    let (stream, events) = PushStream::spawn_ws(config);
    stream.connect()?;

    let result = match cli.command {
        Command::Listen(args) => run_listen(&stream, events, args).await,
        Command::Check(args) => run_check(events, args).await,
    };

    // The stream may already be gone if the event loop ended on its own.
    if let Err(error) = stream.shutdown() {
        warn!(error = %error, "cli: shutdown skipped");
    }
    result
}

async fn run_listen(stream: &StreamHandle, mut events: EventReceiver, args: ListenArgs) -> Result<(), CliError> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut delivered = 0usize;
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.map_err(CliError::Signal)?;
                info!(delivered, "cli: interrupted");
                stream.disconnect()?;
                return Ok(());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(CliError::Closed);
                };
                let is_payload = matches!(event, StreamEvent::Message(_) | StreamEvent::GroupMessage { .. });
                if is_payload || args.verbose {
                    print_json(&event_json(&event))?;
                }
                if is_payload {
                    delivered += 1;
                    if args.max_messages.is_some_and(|max| delivered >= max) {
                        info!(delivered, "cli: message limit reached");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn run_check(events: EventReceiver, args: CheckArgs) -> Result<(), CliError> {
    tokio::time::timeout(Duration::from_secs(args.timeout_secs), wait_until_connected(events))
        .await
        .map_err(|_| CliError::Timeout(args.timeout_secs))??;
    println!("ok");
    Ok(())
}

/// Drain events until negotiation completes, echoing any errors on the way.
async fn wait_until_connected(mut events: EventReceiver) -> Result<(), CliError> {
    while let Some(event) = events.recv().await {
        match &event {
            StreamEvent::State(SessionState::Connected) => return Ok(()),
            StreamEvent::Error { .. } => print_json(&event_json(&event))?,
            _ => {}
        }
    }
    Err(CliError::Closed)
}

/// One JSON line per event, tagged by `type`.
fn event_json(event: &StreamEvent) -> Value {
    match event {
        StreamEvent::Status { text, detail } => json!({ "type": "status", "text": text, "detail": detail }),
        StreamEvent::Error { text, detail } => json!({ "type": "error", "text": text, "detail": detail }),
        StreamEvent::State(state) => json!({ "type": "state", "state": state }),
        StreamEvent::Message(payload) => json!({ "type": "message", "payload": payload }),
        StreamEvent::GroupMessage { group_id, payload } => {
            json!({ "type": "group_message", "group_id": group_id, "payload": payload })
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
