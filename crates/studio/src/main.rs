//! `reframe-studio` -- re-imagine a video from its own midpoint frame.
//!
//! Loads a source video, asks the analysis model to describe its
//! midpoint frame, generates a new video from the suggested (or
//! overridden) prompt, and saves the result to disk.  SIGINT/SIGTERM
//! cancel a running generation.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default | Description                               |
//! |------------------------|----------|---------|-------------------------------------------|
//! | `GEMINI_API_KEY`       | yes      | --      | API key for the generative model endpoint |
//! | `REFRAME_SOURCE_VIDEO` | yes      | --      | Video file to analyse                     |
//! | `REFRAME_PROMPT`       | no       | --      | Prompt to use instead of the suggestion   |
//! | `REFRAME_OUTPUT_DIR`   | no       | `.`     | Directory the generated video is saved to |
//!
//! Model, endpoint, polling, and scratch-directory settings are listed on
//! [`StudioConfig::from_env`].

use anyhow::Context;
use reframe_core::assets::AssetStore;
use reframe_genai::api::GenAiApi;
use reframe_studio::config::StudioConfig;
use reframe_studio::session::{Studio, StudioError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reframe_studio=info,reframe_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StudioConfig::from_env().context("Invalid configuration")?;
    let source = config
        .source_video
        .clone()
        .context("REFRAME_SOURCE_VIDEO environment variable is required")?;

    tracing::info!(
        source = %source.display(),
        video_model = %config.video_model,
        analysis_model = %config.analysis_model,
        poll_interval_secs = config.poll_policy.interval.as_secs(),
        "Starting reframe-studio",
    );

    let api = GenAiApi::with_client(reqwest::Client::new(), &config.base_url, &config.api_key)
        .with_models(&config.video_model, &config.analysis_model);

    let store = AssetStore::open(&config.asset_dir)
        .await
        .with_context(|| format!("Failed to open asset directory {}", config.asset_dir.display()))?;
    let mut studio = Studio::new(store, config.poll_policy.clone());

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    studio.load_video(&source).await.map_err(|e| surface(&studio, e))?;
    studio.analyze(&api).await.map_err(|e| surface(&studio, e))?;

    if let Some(analysis) = studio.analysis() {
        tracing::info!(
            title = %analysis.title,
            tags = ?analysis.tags,
            prompt = %analysis.cinematic_prompt,
            "Frame analysed",
        );
    }

    if let Some(prompt) = config.prompt.as_deref() {
        studio.set_prompt(prompt);
        match studio.check_consistency(&api).await {
            Ok(consistency) => tracing::info!(
                score = consistency.score,
                explanation = %consistency.explanation,
                "Prompt override checked against frame",
            ),
            Err(e) => return Err(surface(&studio, e)),
        }
    }

    match studio.generate(&api, &cancel).await {
        Ok(generated) => tracing::info!(bytes = generated.byte_len(), "Video generated"),
        Err(e) => return Err(surface(&studio, e)),
    }

    let saved = studio
        .download(&config.output_dir)
        .await
        .map_err(|e| surface(&studio, e))?;
    println!("{}", saved.display());

    studio.start_over();
    Ok(())
}

/// Prefer the session's display message over the bare error.
fn surface(studio: &Studio, err: StudioError) -> anyhow::Error {
    match studio.error() {
        Some(message) => anyhow::anyhow!("{message}"),
        None => err.into(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling generation");
}
