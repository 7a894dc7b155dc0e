//! Assistant CLI
//!
//! Headless driver for a retail-insights conversation. Questions are read
//! from stdin, answers stream to stdout and logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session against the configured backend
//! assistant-cli
//!
//! # One question, then exit (non-zero if the turn fails)
//! assistant-cli --ask "Top 5 stores by revenue"
//!
//! # Machine-readable output
//! assistant-cli --json < questions.txt
//!
//! # With verbose logging
//! RUST_LOG=debug assistant-cli
//! ```
//!
//! # Commands
//!
//! - `/stop`: cancel the answer in flight
//! - `/clear`: start a new session
//! - `/quit`: exit
//!
//! Ctrl-C cancels the answer in flight, or exits when nothing is streaming.
//! Questions typed while an answer streams are sent once it finishes.

mod render;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use assistant_core::config::load_config_from_path;
use assistant_core::transport::WebSocketConnector;
use assistant_core::{
    AuthProvider, ConfigOverrides, Connector, ContentState, Inbound, SessionUpdate,
    StreamController,
};

use crate::render::Renderer;

/// Capacity of the update channel between controller and terminal
const UPDATE_BUFFER: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "assistant-cli", version, about = "Chat with the retail-insights assistant")]
struct Args {
    /// Configuration file (default: ~/.config/retail-insights/assistant.toml)
    #[arg(short, long, env = "INSIGHTS_CONFIG")]
    config: Option<PathBuf>,

    /// Backend WebSocket URL
    #[arg(long)]
    ws_url: Option<String>,

    /// Access token
    #[arg(long)]
    token: Option<String>,

    /// Seconds without a frame before a turn times out (0 disables)
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Where the session id is kept between runs
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Ask one question, print the answer and exit
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,

    /// Print one JSON object per update
    #[arg(long)]
    json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(url) = &self.ws_url {
            overrides = overrides.with_ws_url(url.clone());
        }
        if let Some(token) = &self.token {
            overrides = overrides.with_token(token.clone());
        }
        if let Some(secs) = self.idle_timeout_secs {
            overrides = overrides.with_idle_timeout_secs(secs);
        }
        if let Some(path) = &self.session_file {
            overrides = overrides.with_session_file(path.clone());
        }
        overrides
    }
}

/// A line typed by the user
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Stop,
    Clear,
    Quit,
    Ask(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/stop" => Self::Stop,
            "/clear" => Self::Clear,
            "/quit" | "/exit" => Self::Quit,
            text => Self::Ask(text),
        }
    }
}

/// What woke the interactive loop
enum Input {
    Inbound(Inbound),
    Line(Option<String>),
    Interrupt,
}

/// Terminal side of the session
struct Console {
    renderer: Renderer,
    updates: mpsc::Receiver<SessionUpdate>,
    stdout: Stdout,
}

impl Console {
    async fn write(&mut self, text: &str) -> anyhow::Result<()> {
        if !text.is_empty() {
            self.stdout.write_all(text.as_bytes()).await?;
            self.stdout.flush().await?;
        }
        Ok(())
    }

    /// Print every update received so far
    async fn flush(&mut self) -> anyhow::Result<()> {
        let mut out = String::new();
        while let Ok(update) = self.updates.try_recv() {
            out.push_str(&self.renderer.render(&update));
        }
        self.write(&out).await
    }

    async fn notice(&mut self, text: &str) -> anyhow::Result<()> {
        let out = self.renderer.notice(text);
        self.write(&out).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs share the terminal with answers, so keep them on stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("assistant_cli=info,assistant_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mut config =
        load_config_from_path(args.config.clone()).context("failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("invalid command-line option")?;
    info!(source = %config.source(), endpoint = %config.ws_url, "Configuration loaded");

    let auth = config.auth_provider().context("failed to set up credentials")?;
    let connector = WebSocketConnector::new(config.connector_config());
    let persistence = Arc::new(
        config
            .session_id_store()
            .context("failed to locate the session file")?,
    );

    let (tx, updates) = mpsc::channel(UPDATE_BUFFER);
    let mut controller =
        StreamController::restore(auth, connector, persistence, config.controller_config())
            .await
            .with_updates(tx);
    info!(
        session = %controller.session_id(),
        transport = controller.transport_name(),
        "Session ready"
    );

    let mut console = Console {
        renderer: Renderer::new(args.json),
        updates,
        stdout: tokio::io::stdout(),
    };
    let history = console.renderer.history(controller.store().messages());
    console.write(&history).await?;

    match args.ask.as_deref() {
        Some(question) => ask_once(&mut controller, &mut console, question).await,
        None => interactive(&mut controller, &mut console).await,
    }
}

/// Send `text`, reporting a rejection instead of failing
///
/// Ctrl-C while the connection opens cancels the turn.
async fn submit<A: AuthProvider, C: Connector>(
    controller: &mut StreamController<A, C>,
    console: &mut Console,
    text: &str,
) -> anyhow::Result<()> {
    tokio::select! {
        result = controller.send(text) => match result {
            Ok(target) => debug!(message_id = %target, "Turn started"),
            Err(e) => console.notice(&e.to_string()).await?,
        },
        _ = signal::ctrl_c() => {
            controller.cancel();
        }
    }
    console.flush().await
}

async fn ask_once<A: AuthProvider, C: Connector>(
    controller: &mut StreamController<A, C>,
    console: &mut Console,
    question: &str,
) -> anyhow::Result<()> {
    submit(controller, console, question).await?;

    while controller.is_streaming() {
        tokio::select! {
            _ = controller.step() => {}
            _ = signal::ctrl_c() => {
                controller.cancel();
            }
        }
        console.flush().await?;
    }

    match controller.store().last().and_then(|message| message.state()) {
        Some(ContentState::Errored { message, .. }) => anyhow::bail!("{message}"),
        Some(ContentState::Cancelled { .. }) => anyhow::bail!("stopped"),
        _ => Ok(()),
    }
}

async fn interactive<A: AuthProvider, C: Connector>(
    controller: &mut StreamController<A, C>,
    console: &mut Console,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut queued: VecDeque<String> = VecDeque::new();

    loop {
        if !controller.is_streaming() {
            if let Some(text) = queued.pop_front() {
                submit(controller, console, &text).await?;
                continue;
            }
            if !stdin_open {
                break;
            }
        }

        let streaming = controller.is_streaming();
        let input = tokio::select! {
            inbound = controller.next_inbound(), if streaming => Input::Inbound(inbound),
            line = lines.next_line(), if stdin_open => Input::Line(line?),
            _ = signal::ctrl_c() => Input::Interrupt,
        };

        match input {
            Input::Inbound(inbound) => {
                controller.handle_inbound(inbound);
            }
            Input::Interrupt => {
                if controller.cancel().is_none() {
                    break;
                }
                queued.clear();
            }
            Input::Line(None) => stdin_open = false,
            Input::Line(Some(line)) => match Command::parse(&line) {
                Command::Empty => {}
                Command::Quit => {
                    controller.cancel();
                    break;
                }
                Command::Stop => {
                    if controller.cancel().is_none() {
                        console.notice("nothing to stop").await?;
                    }
                }
                Command::Clear => {
                    if let Err(e) = controller.clear().await {
                        console.notice(&e.to_string()).await?;
                    }
                }
                Command::Ask(text) if controller.is_streaming() => {
                    debug!(queued = queued.len() + 1, "Question queued behind active turn");
                    queued.push_back(text.to_string());
                }
                Command::Ask(text) => submit(controller, console, text).await?,
            },
        }

        console.flush().await?;
    }

    console.flush().await?;
    info!(session = %controller.session_id(), "Session closed");
    Ok(())
}
