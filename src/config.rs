use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
/// Environment variable holding the classifier API key.
pub const CLASSIFIER_KEY_ENV: &str = "DEEPSEEK_KEY";

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    /// The whole message text is the body.
    #[default]
    FullText,
    /// The first paragraph after a blank line, per `paragraph_pattern`.
    Paragraph,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    #[default]
    Fragments,
    WholeMessage,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Reply when the translated text differs from the body.
    #[default]
    Changed,
    /// Reply when the translated text has more CJK ideographs than the body.
    CjkIncrease,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Changed => write!(f, "changed"),
            Trigger::CjkIncrease => write!(f, "cjk_increase"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Public URL registered with `setWebhook` at start-up, if set.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value, if set.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default = "default_classifier_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslatorConfig {
    #[serde(default = "default_translator_base_url")]
    pub base_url: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default = "default_translator_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessorConfig {
    #[serde(default)]
    pub extraction: Extraction,
    /// Regex whose first capture group is the body (paragraph extraction only).
    #[serde(default = "default_paragraph_pattern")]
    pub paragraph_pattern: String,
    #[serde(default)]
    pub translation: TranslationMode,
    #[serde(default)]
    pub trigger: Trigger,
    /// Always send one `prefix：\ntext` reply, whatever the outcome.
    #[serde(default)]
    pub always_notify: bool,
    #[serde(default = "default_min_fragment_len")]
    pub min_fragment_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_webhook_path")]
    pub path: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_classifier_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_classifier_model() -> String {
    "deepseek-reasoner".to_string()
}

fn default_classifier_prompt() -> String {
    "你是消息分类器，只回答 1(重要) 或 0(不重要)。".to_string()
}

fn default_classifier_timeout() -> u64 {
    30
}

fn default_translator_base_url() -> String {
    "https://translate.googleapis.com/translate_a/single".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh-CN".to_string()
}

fn default_translator_timeout() -> u64 {
    15
}

pub fn default_paragraph_pattern() -> String {
    r"\n\s*\n([\s\S]+?)(?:\n\s*\n|点击查看|时间|🎉|$)".to_string()
}

fn default_min_fragment_len() -> usize {
    4
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_path() -> String {
    "/api/webhook".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_classifier_base_url(),
            model: default_classifier_model(),
            system_prompt: default_classifier_prompt(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_translator_base_url(),
            source_language: default_source_language(),
            target_language: default_target_language(),
            timeout_secs: default_translator_timeout(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            extraction: Extraction::default(),
            paragraph_pattern: default_paragraph_pattern(),
            translation: TranslationMode::default(),
            trigger: Trigger::default(),
            always_notify: false,
            min_fragment_len: default_min_fragment_len(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            path: default_webhook_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Config {
    /// Load the TOML file at `path` (all defaults if it does not exist),
    /// then apply secrets from the environment and validate them.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Environment secrets take precedence over the file values.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(key) = lookup(CLASSIFIER_KEY_ENV).filter(|v| !v.is_empty()) {
            self.classifier.api_key = key;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token missing: set {} or [telegram] bot_token",
                BOT_TOKEN_ENV
            );
        }
        if self.classifier.api_key.trim().is_empty() {
            anyhow::bail!(
                "Classifier API key missing: set {} or [classifier] api_key",
                CLASSIFIER_KEY_ENV
            );
        }
        if !self.server.path.starts_with('/') {
            anyhow::bail!("[server] path must start with '/': {}", self.server.path);
        }
        Ok(())
    }
}
