use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emty::completion::{CompletionClient, CompletionWorker};
use emty::controller::{self, event_channel, ControllerNotice};
use emty::messages::MessageId;
use emty::speech::{LineFeed, LineRecognizer, PacedSynthesizer, SpeechCapture, SpeechOutput};
use emty::{
    AssistantConfig, ControllerHandle, CredentialSource, InteractionController, Phase, Role,
    SettingsStore,
};

/// Emty - voice assistant in the terminal
#[derive(Parser)]
#[command(name = "emty", version, about)]
struct Cli {
    /// API key for the completion service; overrides the saved key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model to request
    #[arg(long)]
    model: Option<String>,

    /// Chat completions endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Give up on a reply after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> Result<()> {
    // Logs go to stderr so the conversation on stdout stays readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emty=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AssistantConfig::default();
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config.validate()?;

    let store = match cli.settings {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::default_location()?,
    };
    let credential = store.resolve(cli.api_key.as_deref())?;
    if credential.is_none() {
        warn!("No API key configured; use `k <key>` to save one");
    }

    info!("Starting Emty voice assistant");

    let (event_tx, event_rx) = event_channel(config.channel_buffer_size);
    let (recognizer, feed) = LineRecognizer::new(event_tx.clone());
    let synthesizer = PacedSynthesizer::new(event_tx.clone());

    let client = CompletionClient::new(config.completion.clone())?;
    let worker = CompletionWorker::start(client, event_tx)?;

    let interaction = InteractionController::new(
        SpeechCapture::new(Box::new(recognizer)),
        SpeechOutput::new(Box::new(synthesizer), config.voice.clone()),
        Box::new(worker),
        CredentialSource::new(credential),
    );

    let (handle, controller_thread) =
        controller::spawn(interaction, event_rx, config.channel_buffer_size)?;

    let printer = {
        let handle = handle.clone();
        thread::Builder::new()
            .name("printer".into())
            .spawn(move || print_notices(handle))
            .context("Failed to start printer thread")?
    };

    print_help();
    read_commands(&handle, &feed, &store)?;

    handle.shutdown()?;
    if controller_thread.join().is_err() {
        warn!("Controller thread panicked");
    }
    if printer.join().is_err() {
        warn!("Printer thread panicked");
    }

    info!("Goodbye");
    Ok(())
}

fn print_help() {
    println!("Enter / t  konuşmayı başlat veya durdur");
    println!("c          mesajları temizle");
    println!("k <key>    API anahtarını kaydet");
    println!("q          çıkış");
    println!();
}

fn read_commands(handle: &ControllerHandle, feed: &LineFeed, store: &SettingsStore) -> Result<()> {
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();

        // While capture is open the typed line is what was "heard"
        if feed.offer(&line) {
            continue;
        }

        match input {
            "" | "t" => handle.toggle_listening()?,
            "c" => handle.clear_messages()?,
            "q" => break,
            _ => match input.strip_prefix("k ") {
                Some(key) => match store.save_api_key(key) {
                    Ok(Some(credential)) => {
                        handle.set_credential(Some(credential));
                        println!("API anahtarı kaydedildi");
                    }
                    Ok(None) => println!("Hata: API anahtarı boş olamaz"),
                    Err(e) => println!("Hata: {}", e.user_message()),
                },
                None => print_help(),
            },
        }
    }

    Ok(())
}

fn print_notices(handle: ControllerHandle) {
    let conversation = handle.conversation().clone();
    let mut last_printed: Option<MessageId> = None;
    let mut last_phase = Phase::Idle;
    let mut last_error: Option<String> = None;

    println!("[{}]", last_phase.label());

    while let Ok(notice) = handle.recv_notice() {
        match notice {
            ControllerNotice::StateChanged => {
                for message in conversation.messages() {
                    if last_printed.is_some_and(|id| message.id() <= id) {
                        continue;
                    }
                    let speaker = match message.role() {
                        Role::User => "Sen",
                        Role::Assistant => "EMTY",
                    };
                    println!(
                        "[{}] {}: {}",
                        message.time_label(),
                        speaker,
                        message.content()
                    );
                    last_printed = Some(message.id());
                }

                let status = conversation.status();
                if status.error != last_error {
                    if let Some(error) = &status.error {
                        println!("Hata: {}", error);
                    }
                    last_error = status.error;
                }

                let phase = conversation.phase();
                if phase != last_phase {
                    println!("[{}]", phase.label());
                    last_phase = phase;
                }
            }
            ControllerNotice::Rejected(e) => println!("Hata: {}", e.user_message()),
            ControllerNotice::Shutdown => break,
        }
        let _ = io::stdout().flush();
    }
}
