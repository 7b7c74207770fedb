use anyhow::{Context, Result};
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use holdline::audio::AudioCueEngine;
use holdline::conversation::ChatEvent;
use holdline::integration::{ChatConfig, ChatSession};
use holdline::ui::terminal::{render_notification, TerminalView};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they don't interleave with the chat
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holdline=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ChatConfig::from_env().context("Failed to load configuration")?;
    info!("Starting holdline against {}", config.api_url);

    let mut builder = ChatSession::builder().with_config(config.clone());
    if let Some(engine) = start_audio(&config) {
        builder = builder.with_engine(engine);
    }
    let mut chat = builder.build().context("Failed to set up the chat")?;
    let mut view = TerminalView::new();

    if let Err(e) = chat.open().await {
        pump_events(&chat, &mut view)?;
        return Err(e).context("Could not start the chat");
    }

    println!("Scrivi un messaggio (/quit per uscire)");
    for line in view.new_message_lines(&chat.snapshot()) {
        println!("{}", line);
    }
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(150));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let text = line.trim();
                if text == "/quit" {
                    break;
                }
                if !text.is_empty() && !chat.send(text) {
                    println!("  (attendi la risposta)");
                }
            }
            _ = ticker.tick() => {
                pump_events(&chat, &mut view)?;
                if let Some(meter) = view.indicator(&chat.spectrum()) {
                    execute!(io::stdout(), MoveToColumn(0), Print(meter))?;
                }
            }
        }
    }

    chat.close().await.context("Failed to close the session")?;
    pump_events(&chat, &mut view)?;
    Ok(())
}

fn pump_events(chat: &ChatSession, view: &mut TerminalView) -> io::Result<()> {
    let mut stdout = io::stdout();
    while let Some(event) = chat.try_recv_event() {
        let lines = match event {
            ChatEvent::MessagesChanged => view.new_message_lines(&chat.snapshot()),
            ChatEvent::StateChanged(state) => view.state_line(state).into_iter().collect(),
            ChatEvent::Notification(notification) => render_notification(&notification),
            ChatEvent::Closed => vec!["Chat chiusa.".to_string()],
        };
        for line in lines {
            // Clear a meter drawn on the current line
            queue!(
                stdout,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(line),
                Print("\n")
            )?;
        }
    }
    stdout.flush()
}

#[cfg(feature = "audio-io")]
fn start_audio(config: &ChatConfig) -> Option<Arc<AudioCueEngine>> {
    use tracing::warn;

    if !config.enable_audio || config.audio.clip_path.is_none() {
        info!("Audio cue disabled");
        return None;
    }

    let engine = match AudioCueEngine::with_device(config.audio.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            warn!("Continuing without audio: {}", e);
            return None;
        }
    };

    // Decode in the background; cues requested before then are dropped
    let loader = Arc::clone(&engine);
    tokio::spawn(async move {
        if let Err(e) = loader.load().await {
            warn!("Failed to load cue clip: {}", e);
        }
    });
    Some(engine)
}

#[cfg(not(feature = "audio-io"))]
fn start_audio(_config: &ChatConfig) -> Option<Arc<AudioCueEngine>> {
    info!("Built without audio output");
    None
}
