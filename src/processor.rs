//! Message processor: decides whether an incoming message is worth a
//! notification and with what text.
//!
//! Flow:
//! 1. Drop messages sent by this bot or any other bot
//! 2. Extract the body (empty body ends processing)
//! 3. Classify importance (failure counts as "not important")
//! 4. Translate English fragments, or the whole body
//! 5. Compose zero, one or two replies

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::{ProcessorConfig, TranslationMode, Trigger};
use crate::llm::Classifier;
use crate::platform::{IncomingMessage, OutboundReply};
use crate::text::{self, BodyExtractor, FragmentMatcher};
use crate::translate::{Translator, AUTO_DETECT};

/// Sent before an untranslated important message.
pub const IMPORTANT_PREFIX: &str = "⚠️ 重要信息：\n";
/// Sent as its own message ahead of a translated important message.
pub const TRANSLATED_NOTICE: &str = "⚠️ 重要信息（已翻译如下）";

const NOTIFY_IMPORTANT: &str = "⚠️ 重要信息";
const NOTIFY_INFO: &str = "ℹ️ 信息";

pub struct MessageProcessor {
    classifier: Arc<dyn Classifier>,
    translator: Arc<dyn Translator>,
    extractor: BodyExtractor,
    fragments: FragmentMatcher,
    translation: TranslationMode,
    trigger: Trigger,
    always_notify: bool,
    source_language: String,
}

impl MessageProcessor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        translator: Arc<dyn Translator>,
        config: &ProcessorConfig,
        source_language: &str,
    ) -> Result<Self> {
        Ok(Self {
            classifier,
            translator,
            extractor: BodyExtractor::from_config(config)?,
            fragments: FragmentMatcher::new(config.min_fragment_len)?,
            translation: config.translation.clone(),
            trigger: config.trigger.clone(),
            always_notify: config.always_notify,
            source_language: source_language.to_string(),
        })
    }

    /// Run one message through the pipeline. Never fails: collaborator
    /// errors are logged and degrade to "not important" / "untranslated".
    pub async fn process(&self, message: &IncomingMessage) -> Vec<OutboundReply> {
        if message.is_from_bot() {
            debug!("Skipping message from bot {}", message.sender_id);
            return Vec::new();
        }

        let body = self.extractor.extract(&message.text);
        if body.is_empty() {
            debug!("No body extracted from message in chat {}", message.chat_id);
            return Vec::new();
        }

        let important = self.classify(body).await;
        info!(
            "Message from {} in chat {}: important={}",
            message.sender_id, message.chat_id, important
        );

        if self.always_notify {
            let translated = if text::has_ascii_letters(body) {
                self.translate(body).await
            } else {
                body.to_string()
            };
            let prefix = if important { NOTIFY_IMPORTANT } else { NOTIFY_INFO };
            return vec![OutboundReply::new(format!("{}：\n{}", prefix, translated))];
        }

        if !text::has_ascii_letters(body) {
            return if important {
                vec![OutboundReply::new(format!("{}{}", IMPORTANT_PREFIX, body))]
            } else {
                Vec::new()
            };
        }

        let translated = self.translate(body).await;
        if !self.should_reply(body, &translated) {
            debug!("Translation left the body unchanged ({})", self.trigger);
            return Vec::new();
        }

        let mut replies = Vec::with_capacity(2);
        if important {
            replies.push(OutboundReply::new(TRANSLATED_NOTICE));
        }
        replies.push(OutboundReply::new(translated));
        replies
    }

    async fn classify(&self, body: &str) -> bool {
        match self.classifier.is_important(body).await {
            Ok(important) => important,
            Err(e) => {
                warn!("Classification failed, treating as not important: {:#}", e);
                false
            }
        }
    }

    async fn translate(&self, body: &str) -> String {
        match self.translation {
            TranslationMode::Fragments => self.translate_fragments(body).await,
            TranslationMode::WholeMessage => self.translate_whole(body).await,
        }
    }

    /// Translate each English fragment in order, substituting its first
    /// occurrence. A failed fragment stays as it was.
    async fn translate_fragments(&self, body: &str) -> String {
        let mut working = body.to_string();
        for fragment in self.fragments.fragments(body) {
            match self
                .translator
                .translate(fragment, &self.source_language)
                .await
            {
                Ok(translated) if !translated.is_empty() && translated != fragment => {
                    text::substitute_first(&mut working, fragment, &translated);
                }
                Ok(_) => {}
                Err(e) => warn!("Fragment translation failed for {:?}: {:#}", fragment, e),
            }
        }
        working
    }

    async fn translate_whole(&self, body: &str) -> String {
        match self.translator.translate(body, AUTO_DETECT).await {
            Ok(translated) if !translated.is_empty() => translated,
            Ok(_) => body.to_string(),
            Err(e) => {
                warn!("Message translation failed: {:#}", e);
                body.to_string()
            }
        }
    }

    fn should_reply(&self, body: &str, translated: &str) -> bool {
        match self.trigger {
            Trigger::Changed => translated != body,
            Trigger::CjkIncrease => text::cjk_count(translated) > text::cjk_count(body),
        }
    }
}
