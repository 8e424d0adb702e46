//! PrintVoice - voice announcements for 3D printer control hosts
//!
//! Runs the plugin against an in-process host: lifecycle events are emitted
//! locally and operator commands are read from stdin, one per line.

use anyhow::Result;
use clap::Parser;
use printvoice::catalog::ResourceCatalog;
use printvoice::commands::CommandRequest;
use printvoice::config::VoiceConfig;
use printvoice::host::{
    CommandHandler, CommandSink, EventHandler, EventSource, RequestHandler, RequestSink,
    VoicePlugin,
};
use printvoice::playback::PlaybackController;
use printvoice::policy::AnnouncementPolicy;
use printvoice::renderer::{self, WhichLocator};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the audio file directory
    #[arg(short, long)]
    audio_dir: Option<String>,
}

/// In-process implementation of the host capability traits
#[derive(Default)]
struct LocalHost {
    events: HashMap<String, Vec<EventHandler>>,
    commands: HashMap<String, (String, CommandHandler)>,
    endpoints: HashMap<String, RequestHandler>,
}

impl EventSource for LocalHost {
    fn subscribe(&mut self, event: &str, handler: EventHandler) {
        self.events.entry(event.to_string()).or_default().push(handler);
    }
}

impl CommandSink for LocalHost {
    fn register_command(&mut self, name: &str, help: &str, handler: CommandHandler) {
        self.commands
            .insert(name.to_string(), (help.to_string(), handler));
    }
}

impl RequestSink for LocalHost {
    fn register_endpoint(&mut self, path: &str, handler: RequestHandler) {
        self.endpoints.insert(path.to_string(), handler);
    }
}

impl LocalHost {
    async fn emit(&self, event: &str, payload: Value) {
        if let Some(handlers) = self.events.get(event) {
            for handler in handlers {
                handler(payload.clone()).await;
            }
        }
    }

    async fn dispatch(&self, line: &str) -> Option<String> {
        let req = CommandRequest::parse(line)?;

        if req.name == "HELP" {
            let mut names: Vec<&str> = self.commands.keys().map(|n| n.as_str()).collect();
            names.sort_unstable();
            let lines: Vec<String> = names
                .iter()
                .map(|n| format!("{} - {}", n, self.commands[*n].0))
                .collect();
            return Some(lines.join("\n"));
        }

        match self.commands.get(&req.name) {
            Some((_, handler)) => Some(match handler(req).await {
                Ok(reply) => reply,
                Err(e) => format!("error: {}", e),
            }),
            None => Some(format!("error: Unknown command: {}", req.name)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    // Logs go to stderr; stdout carries command replies
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🔊 PrintVoice v{} starting...", env!("CARGO_PKG_VERSION"));

    // Invalid numeric ranges are fatal here
    let mut config = match &args.config {
        Some(path) => VoiceConfig::load_from(path)?,
        None => VoiceConfig::load()?,
    };
    if let Some(dir) = args.audio_dir {
        config.audio_dir = dir;
    }

    // Build the catalog and probe for a renderer
    let mut catalog = ResourceCatalog::new(config.audio_dir.clone(), config.audio_formats.clone());
    let report = catalog.rescan();
    info!(
        "📁 Audio catalog: {} kinds, {} files in {}",
        report.kinds, report.files, config.audio_dir
    );

    let renderer = renderer::detect(&WhichLocator).await;

    let policy = Arc::new(AnnouncementPolicy::new(
        &config,
        Arc::new(RwLock::new(catalog)),
        renderer,
        PlaybackController::new(),
    ));
    let plugin = VoicePlugin::new(policy);

    let mut host = LocalHost::default();
    plugin.register_events(&mut host);
    plugin.register_commands(&mut host);
    plugin.register_endpoints(&mut host);
    info!("PrintVoice connected and ready");

    // Host is up
    host.emit("klippy:ready", Value::Null).await;

    info!("✅ PrintVoice ready - type a command (HELP for a list)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Some(reply) = host.dispatch(&line).await {
                            println!("{}", reply);
                        }
                    }
                    None => break,
                }
            }
        }
    }

    host.emit("klippy:shutdown", Value::Null).await;
    Ok(())
}
