mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use lectern_audio::Transcoder;
use lectern_chat::{
    DocumentOrchestrator, GenerationSettings, IngestionPipeline, SessionMachine, SessionStore,
    Transport,
};
use lectern_core::config::LecternConfig;
use lectern_core::types::{InboundEvent, SessionId};
use lectern_llm::{MockTextGenerator, OpenAiCompatGenerator, TextGenerator};
use lectern_whisper::{HttpTranscriptionService, MockTranscriptionService, TranscriptionService};

use crate::cli::CliArgs;
use crate::console::{ConsoleInput, ConsoleTransport};

fn build_machine<S, G>(
    config: &LecternConfig,
    transcriber: S,
    generator: G,
    transport: Arc<dyn Transport>,
) -> SessionMachine<S, G>
where
    S: TranscriptionService,
    G: TextGenerator,
{
    let ingestion = IngestionPipeline::new(
        transcriber,
        Transcoder::new(config.audio.scratch_dir()),
        config.transcription.language.clone(),
    );
    let orchestrator = DocumentOrchestrator::new(
        generator,
        config.document.document_spec(),
        GenerationSettings::from_config(config),
    );
    SessionMachine::new(Arc::new(SessionStore::new()), ingestion, orchestrator, transport)
}

/// Feed stdin lines into the session machine until EOF or `/quit`.
async fn console_loop<S, G>(
    machine: SessionMachine<S, G>,
    session: SessionId,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: TranscriptionService,
    G: TextGenerator,
{
    machine.handle_event(session, InboundEvent::Start).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = console::parse_line(&line);
        if input == ConsoleInput::Quit {
            break;
        }

        let event = match input.into_event().await {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read input");
                eprintln!("{}", e);
                continue;
            }
        };

        if let Err(e) = machine.handle_event(session, event).await {
            tracing::error!(session_id = %session, error = %e, "Event handling failed");
        }
    }

    tracing::info!("Console closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Failed to load .env file: {}", e);
        }
    }

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = LecternConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_output_dir() {
        config.general.output_dir = dir;
    }

    // Tracing.
    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Lectern v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    config.validate()?;

    let transport: Arc<dyn Transport> =
        Arc::new(ConsoleTransport::stdout(&config.general.output_dir));
    let session = SessionId(args.session);

    if args.offline {
        tracing::info!("Offline mode: using mock transcription and generation");
        let machine = build_machine(
            &config,
            MockTranscriptionService::default(),
            MockTextGenerator::default(),
            transport,
        );
        return console_loop(machine, session).await;
    }

    let transcriber = HttpTranscriptionService::from_config(&config.transcription)?;
    let generator = OpenAiCompatGenerator::from_config(&config.generation)?;
    tracing::info!(
        model = generator.model(),
        transcription_model = %config.transcription.model,
        "HTTP services configured"
    );

    let machine = build_machine(&config, transcriber, generator, transport);
    console_loop(machine, session).await
}
