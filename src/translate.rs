use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::TranslatorConfig;

/// Source language used when the whole message is translated at once.
pub const AUTO_DETECT: &str = "auto";

/// Machine translation into the configured target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source_language: &str) -> Result<String>;
}

/// Joins the first element of a `translate_a/single` response, which is a
/// list of `[translated, original, ...]` segments.
pub fn parse_translation(data: &Value) -> Result<String> {
    let segments = data
        .get(0)
        .and_then(Value::as_array)
        .context("Translation response has no segment list")?;

    let mut translated = String::new();
    for segment in segments {
        if let Some(part) = segment.get(0).and_then(Value::as_str) {
            translated.push_str(part);
        }
    }
    Ok(translated)
}

/// Client for the public Google Translate `translate_a/single` endpoint.
pub struct GoogleTranslator {
    client: reqwest::Client,
    config: TranslatorConfig,
}

impl GoogleTranslator {
    pub fn new(config: TranslatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build translator HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source_language: &str) -> Result<String> {
        debug!(
            "Translating {} chars {} -> {}",
            text.chars().count(),
            source_language,
            self.config.target_language
        );

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("client", "gtx"),
                ("sl", source_language),
                ("tl", self.config.target_language.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .context("Failed to send translation request")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Translation API error ({}): {}", status, error_body);
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        parse_translation(&data)
    }
}
