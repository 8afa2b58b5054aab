mod scenarios;
mod ws_transport;

use anyhow::{Context, Result};
use clap::Parser;
use persona_core::config::Config;
use persona_core::llm::{LlmClient, OllamaClient};
use persona_core::session::{MediaSession, SessionParams};
use persona_core::stt::SpeechToText;
use persona_core::tts::{ElevenLabsTtsAdapter, TextToSpeech};
use persona_protocol::Scenario;
use persona_vad::EarshotVad;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};
use ws_transport::{WsReceiver, WsSender};

#[derive(Parser, Debug)]
#[command(name = "persona-server")]
struct Args {
    #[arg(short, long, default_value = "[::]", help = "address to listen on")]
    address: String,

    #[arg(short, long, default_value = "8000", help = "port to listen on")]
    port: u16,

    #[arg(long, help = "directory of scenario YAML definitions")]
    scenarios_dir: PathBuf,

    #[arg(long, help = "id of the scenario to assign to every accepted call")]
    scenario_id: String,

    #[arg(long, default_value = "output/transcripts", help = "directory transcripts are written to")]
    transcripts_dir: PathBuf,

    #[arg(long, help = "path to a whisper.cpp GGML/GGUF model file")]
    whisper_model: String,

    #[arg(long, help = "language hint passed to whisper (default: auto-detect)")]
    language: Option<String>,

    #[arg(long, help = "override LLM_BASE_URL from the environment")]
    llm_base_url: Option<String>,

    #[arg(long, help = "override LLM_MODEL from the environment")]
    llm_model: Option<String>,

    #[arg(long, help = "override TTS_VOICE from the environment")]
    tts_voice: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;

    let mut config = Config::from_env();
    if let Some(url) = args.llm_base_url {
        config.llm_base_url = url;
    }
    if let Some(model) = args.llm_model {
        config.llm_model = model;
    }
    if let Some(voice) = args.tts_voice {
        config.tts_voice = voice;
    }

    let scenario = scenarios::load_scenario(&args.scenarios_dir, &args.scenario_id)
        .with_context(|| format!("loading scenario {}", args.scenario_id))?;
    info!("Assigning scenario {} ({}) to every call", scenario.id, scenario.name);

    info!("Loading whisper model: {}", args.whisper_model);
    let whisper_ctx = Arc::new(
        whisper_rs::WhisperContext::new_with_params(
            &args.whisper_model,
            whisper_rs::WhisperContextParameters::default(),
        )
        .context("loading whisper model")?,
    );

    let elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY")
        .context("ELEVENLABS_API_KEY must be set")?;

    info!("Listening on {addr}");
    let listener = TcpListener::bind(addr).await?;

    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!("Connection from {peer_addr}");
        let scenario = scenario.clone();
        let config = config.clone();
        let whisper_ctx = whisper_ctx.clone();
        let language = args.language.clone();
        let elevenlabs_api_key = elevenlabs_api_key.clone();
        let transcripts_dir = args.transcripts_dir.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(
                stream,
                scenario,
                config,
                whisper_ctx,
                language,
                elevenlabs_api_key,
                transcripts_dir,
            )
            .await
            {
                error!("connection error: {e}");
            }
        });
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    scenario: Scenario,
    config: Config,
    whisper_ctx: Arc<whisper_rs::WhisperContext>,
    language: Option<String>,
    elevenlabs_api_key: String,
    transcripts_dir: PathBuf,
) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (sink, stream) = futures_util::StreamExt::split(ws_stream);
    let receiver = Box::new(WsReceiver::new(stream));
    let sender = Box::new(WsSender::new(sink));

    let stt: Arc<dyn SpeechToText> =
        Arc::new(persona_core::stt::WhisperSttAdapter::new(whisper_ctx, language)?);
    let tts: Arc<dyn TextToSpeech> =
        Arc::new(ElevenLabsTtsAdapter::new(elevenlabs_api_key, config.tts_voice.clone()));
    let llm: Arc<dyn LlmClient> =
        Arc::new(OllamaClient::new(config.llm_base_url.clone(), config.llm_model.clone()));

    let params = SessionParams {
        scenario: Some(scenario),
        config,
        stt,
        tts,
        llm,
        vad: Box::new(EarshotVad::default()),
        transcripts_dir,
    };

    let transcript = MediaSession::run(params, receiver, sender).await?;
    info!("call ended: {} turns", transcript.turn_count);
    Ok(())
}
