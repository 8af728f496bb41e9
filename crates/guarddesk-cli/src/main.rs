mod logging;
mod wiring;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tokio::sync::watch;

use guarddesk_core::config::Config;
use guarddesk_core::types::{SessionState, Variant};
use guarddesk_media::capture::{FileMicrophone, mime_for_path};
use guarddesk_media::graph::VirtualGraphFactory;
use guarddesk_media::pcm::{PcmDecoder, f32_to_i16, pcm_to_wav};
use guarddesk_media::stt::normalize_transcript;
use guarddesk_media::{AudioClip, SpeechAudio, SpeechSynthesizer, Transcriber};
use guarddesk_providers::ReplyKind;
use guarddesk_voice::{SessionSnapshot, VoiceSession};

#[derive(Parser)]
#[command(
    name = "guarddesk",
    about = "Guard Desk voice assistant: receptionist and dashboard manager sessions from the terminal",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Which assistant to talk to
    #[arg(long = "as", value_enum, global = true, default_value = "receptionist")]
    persona: Persona,
}

#[derive(Clone, Copy, ValueEnum)]
enum Persona {
    Receptionist,
    Manager,
}

impl From<Persona> for Variant {
    fn from(persona: Persona) -> Self {
        match persona {
            Persona::Receptionist => Variant::Receptionist,
            Persona::Manager => Variant::Manager,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Chat by text (one-shot or interactive)
    Chat {
        /// Message to send (omit for interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run one spoken turn, using an audio file as the microphone
    Talk {
        /// Recorded utterance (wav, webm, ogg, mp3, m4a)
        #[arg(long)]
        audio_file: PathBuf,

        /// Write the spoken reply here
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Transcribe an audio file
    Transcribe { audio_file: PathBuf },

    /// Synthesize text to an audio file
    Speak {
        text: String,

        #[arg(long, default_value = "speech.wav")]
        out: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show configured services
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Check the config for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    logging::init(config.logging.as_ref(), cli.verbose);

    let variant = Variant::from(cli.persona);
    match cli.command {
        Commands::Chat { message } => {
            let mic = Arc::new(wiring::Unconfigured("microphone"));
            let (session, _graphs) = wiring::session(&config, variant, mic)?;
            match message {
                Some(message) => {
                    run_text_turn(&session, &message).await;
                    resolve_pending(&session).await?;
                }
                None => chat_loop(&session).await?,
            }
            session.dispose();
        }
        Commands::Talk { audio_file, out } => {
            let mic = Arc::new(FileMicrophone::new(&audio_file));
            let (session, graphs) = wiring::session(&config, variant, mic)?;
            let progress = tokio::spawn(show_progress(session.subscribe()));
            session.start_listening().await?;
            if session.state() == SessionState::Listening {
                // The file is delivered in full on open.
                tokio::task::yield_now().await;
                session.stop_listening();
            }
            session.wait_until_idle().await;
            progress.abort();
            print_turn(&session.snapshot());
            if let Some(out) = out {
                write_playback(&graphs, &out)?;
            }
            session.dispose();
        }
        Commands::Transcribe { audio_file } => {
            let bytes = tokio::fs::read(&audio_file)
                .await
                .with_context(|| format!("reading {}", audio_file.display()))?;
            let clip = AudioClip::new(bytes, mime_for_path(&audio_file));
            let text = wiring::transcriber(&config).transcribe(&clip).await?;
            println!("{}", normalize_transcript(&text)?);
        }
        Commands::Speak { text, out } => {
            let audio = wiring::synthesizer(&config).synthesize(&text).await?;
            let bytes = match audio {
                SpeechAudio::Clip(clip) => clip.bytes,
                SpeechAudio::Stream {
                    sample_rate,
                    mut chunks,
                } => {
                    let mut decoder = PcmDecoder::new();
                    let mut samples = Vec::new();
                    while let Some(chunk) = chunks.next().await {
                        samples.extend(decoder.decode(&chunk?).into_iter().map(f32_to_i16));
                    }
                    pcm_to_wav(&samples, sample_rate, 1, 16)
                }
            };
            tokio::fs::write(&out, &bytes).await?;
            println!("Wrote {} bytes to {}", bytes.len(), out.display());
        }
        Commands::Status => {
            println!("Guard Desk v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Data dir: {}", guarddesk_core::config::data_dir().display());
            println!("Assistant: {:?}", variant);
            let provider = |p: Option<&String>| p.cloned().unwrap_or_else(|| "not configured".into());
            println!(
                "Transcription: {}",
                provider(config.transcription.as_ref().map(|t| &t.provider))
            );
            println!("Dialogue: {}", provider(config.dialogue.as_ref().map(|d| &d.provider)));
            println!("Speech: {}", provider(config.tts.as_ref().map(|t| &t.provider)));
            println!(
                "Backend: {}",
                provider(config.backend.as_ref().map(|b| &b.base_url))
            );
            let voice = config.voice();
            println!("Capture limit: {}s", voice.max_capture_secs);
            match voice.request_timeout_secs {
                Some(secs) => println!("Request timeout: {secs}s"),
                None => println!("Request timeout: none"),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
            ConfigAction::Set { key, value } => {
                let value = serde_json::from_str(&value)
                    .unwrap_or_else(|_| serde_json::Value::String(value));
                let mut config = config;
                config.set_path(&key, value)?;
                config.save(&config_path)?;
                println!("Updated {key} in {}", config_path.display());
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} config error(s)", errors.len());
                }
                println!("Config OK ({} warning(s))", warnings.len());
            }
        },
    }

    Ok(())
}

async fn run_text_turn(session: &VoiceSession, text: &str) {
    if let Err(e) = session.submit_text(text) {
        println!("! {e}");
        return;
    }
    session.wait_until_idle().await;
    print_turn(&session.snapshot());
}

async fn chat_loop(session: &VoiceSession) -> anyhow::Result<()> {
    println!("Type a message, or 'quit' to exit.");
    loop {
        let line = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("you")
                .allow_empty(true)
                .interact_text()
        })
        .await??;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            return Ok(());
        }
        run_text_turn(session, line).await;
        resolve_pending(session).await?;
    }
}

/// Ask the user about a pending action and run the matching turn.
async fn resolve_pending(session: &VoiceSession) -> anyhow::Result<()> {
    let Some(action) = session.snapshot().pending_action else {
        return Ok(());
    };
    let prompt = format!("{} {}?", action.action_type.as_str(), action.entity);
    let confirmed = tokio::task::spawn_blocking(move || {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
    })
    .await??;

    let started = if confirmed {
        session.confirm_pending_action()
    } else {
        session.cancel_pending_action()
    };
    if let Err(e) = started {
        println!("! {e}");
        return Ok(());
    }
    session.wait_until_idle().await;
    print_turn(&session.snapshot());
    Ok(())
}

/// Print the orb label each time the session changes phase.
async fn show_progress(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut last = None;
    while updates.changed().await.is_ok() {
        let state = updates.borrow_and_update().state;
        if last != Some(state) {
            eprintln!("[{}]", state.label());
            last = Some(state);
        }
    }
}

fn print_turn(snapshot: &SessionSnapshot) {
    if let Some(error) = snapshot.error_message() {
        println!("! {error}");
    }
    let Some(reply) = &snapshot.reply else {
        return;
    };
    println!("assistant: {}", reply.message);
    match &reply.kind {
        ReplyKind::PackagesShown => {
            for offering in &snapshot.packages {
                println!(
                    "  - {}: {} PKR per {}",
                    offering.name, offering.price, offering.billing_unit
                );
            }
        }
        ReplyKind::ConfirmationRequested { action } => {
            println!(
                "  pending: {} {} {}",
                action.action_type.as_str(),
                action.entity,
                action.data
            );
        }
        ReplyKind::InfoRequested => println!("  (details requested)"),
        _ => {}
    }
    if let Some(estimate) = &reply.price_estimate {
        println!("  estimate: {} {}", estimate.total, estimate.currency);
    }
    if let Some(reference) = &snapshot.request_ref {
        println!("  request filed: {}", reference.request_number);
    }
}

/// Save what the session played: the rendered stream timeline, or the last clip.
fn write_playback(graphs: &VirtualGraphFactory, out: &Path) -> anyhow::Result<()> {
    let Some(graph) = graphs.latest() else {
        anyhow::bail!("Nothing was played");
    };
    let bytes = if graph.sources().is_empty() {
        graph
            .clips()
            .pop()
            .map(|clip| clip.bytes)
            .context("Nothing was played")?
    } else {
        graph.render_wav()
    };
    std::fs::write(out, &bytes)?;
    println!("Wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}
