//! Wiring: configuration and CLI overrides in, a finished run report out.

use crate::cli::Cli;
use crate::domain::audio::{AudioAssembler, OutputFormat};
use crate::domain::auth::{CredentialSigner, ServiceAccountKey, TokenProvider};
use crate::domain::pipeline::{PipelineError, PipelineOrchestrator, RunReport};
use crate::domain::text::TextSegmenter;
use crate::domain::tts::RetryingDispatcher;
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::Config;
use crate::infrastructure::document::load_document;
use crate::infrastructure::iam::{IamTokenExchange, TokenExchange};
use crate::infrastructure::repositories::SpeechKitClient;
use crate::infrastructure::transcode::FfmpegTranscoder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Apply command-line overrides on top of the environment configuration
pub fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(voice) = &cli.voice {
        config.voice = voice.clone();
    }
    if let Some(role) = &cli.role {
        config.role = role.clone();
    }
    if let Some(temp_dir) = &cli.temp_dir {
        config.temp_dir = temp_dir.clone();
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
}

/// Run one conversion end to end
pub async fn run(cli: &Cli, config: &Config, abort: watch::Receiver<bool>) -> AppResult<RunReport> {
    let format = cli.format.unwrap_or(config.default_format);
    tracing::info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        format = %format,
        voice = %config.voice,
        role = %config.role,
        "Starting conversion"
    );

    let document = load_document(&cli.input).await?;

    let ffmpeg = FfmpegTranscoder::new(config.ffmpeg_path.clone());
    if format != OutputFormat::Wav {
        ffmpeg
            .probe()
            .await
            .map_err(|e| AppError::Setup(format!("{} output needs ffmpeg: {}", format, e)))?;
    }

    let signer = build_signer(config).await?;
    let orchestrator = build_orchestrator(config, signer, ffmpeg, config.temp_dir.clone())?;

    let report = orchestrator.run(&document, &cli.output, format, abort).await?;
    Ok(report)
}

/// Load the key, verify the pair when possible and fetch a first token
pub async fn build_signer(config: &Config) -> AppResult<Arc<CredentialSigner>> {
    let credentials = &config.credentials;
    let key = ServiceAccountKey::from_pem(
        credentials.key_id.clone(),
        credentials.service_account_id.clone(),
        credentials.algorithm,
        &credentials.private_key,
        credentials.public_key.as_deref(),
    )?;

    let exchange = IamTokenExchange::new(config.iam_token_url.clone(), config.request_timeout)?;
    if key.has_public_key() {
        key.verify_pair(exchange.audience())?;
        tracing::info!(key_id = %key.key_id(), "Service account key pair verified");
    }

    let signer = Arc::new(CredentialSigner::new(
        key,
        Arc::new(exchange),
        config.token_refresh_margin,
    ));
    // Fail on bad credentials before any text is sent
    signer.get_token().await?;
    tracing::info!("Bearer token obtained");

    Ok(signer)
}

pub fn build_orchestrator(
    config: &Config,
    tokens: Arc<dyn TokenProvider>,
    transcoder: FfmpegTranscoder,
    temp_root: PathBuf,
) -> AppResult<PipelineOrchestrator> {
    let client = SpeechKitClient::new(
        config.speechkit_url.clone(),
        config.folder_id.clone(),
        config.request_timeout,
    )
    .map_err(|e| AppError::Setup(format!("failed to build HTTP client: {}", e)))?;

    let dispatcher = RetryingDispatcher::new(
        Arc::new(client),
        tokens,
        config.voice_params(),
        config.dispatcher_config(),
    );
    let assembler = AudioAssembler::new(config.failure_policy, config.gap_marker, Arc::new(transcoder));
    let segmenter = TextSegmenter::new(config.max_chunk_size).map_err(PipelineError::from)?;

    Ok(PipelineOrchestrator::new(segmenter, dispatcher, assembler, temp_root))
}

/// Flip the returned signal on Ctrl-C
pub fn interrupt_signal() -> watch::Receiver<bool> {
    let (abort_tx, abort_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, stopping after in-flight requests");
                let _ = abort_tx.send(true);
            }
            Err(e) => tracing::warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
    abort_rx
}
