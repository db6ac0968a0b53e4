mod config;
mod llm;
mod platform;
mod processor;
mod text;
mod translate;
mod webhook;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::llm::LlmClassifier;
use crate::platform::telegram::{self, TelegramSender};
use crate::processor::MessageProcessor;
use crate::translate::GoogleTranslator;
use crate::webhook::WebhookState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgtranslate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Classifier: {} at {}", config.classifier.model, config.classifier.base_url);
    info!(
        "  Translation: {} -> {} ({:?})",
        config.translator.source_language,
        config.translator.target_language,
        config.processor.translation
    );
    info!(
        "  Extraction: {:?}, trigger: {}",
        config.processor.extraction, config.processor.trigger
    );

    let classifier = Arc::new(LlmClassifier::new(config.classifier.clone())?);
    let translator = Arc::new(GoogleTranslator::new(config.translator.clone())?);
    let processor = MessageProcessor::new(
        classifier,
        translator,
        &config.processor,
        &config.translator.source_language,
    )?;

    let bot = Bot::new(&config.telegram.bot_token);
    let bot_id = telegram::resolve_bot_id(&bot, &config.telegram.bot_token).await?;

    if let Some(url) = &config.telegram.webhook_url {
        if let Err(e) =
            telegram::register_webhook(&bot, url, config.telegram.webhook_secret.as_deref()).await
        {
            warn!("Webhook registration failed: {:#}", e);
        }
    }

    let state = WebhookState {
        processor: Arc::new(processor),
        sender: Arc::new(TelegramSender::new(bot)),
        bot_id,
        secret: config.telegram.webhook_secret.clone(),
        timeout: Duration::from_secs(config.server.request_timeout_secs),
    };
    let app = webhook::router(&config.server.path, state);

    let addr = &config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening for updates on {}{}", addr, config.server.path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
