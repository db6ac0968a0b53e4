//! In-process stand-ins for the remote collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::Classifier;
use crate::platform::ReplySender;
use crate::translate::Translator;

/// Always answers with the same label, or fails.
pub struct FixedClassifier {
    pub answer: Option<bool>,
}

impl FixedClassifier {
    pub fn important() -> Self {
        Self { answer: Some(true) }
    }

    pub fn unimportant() -> Self {
        Self { answer: Some(false) }
    }

    pub fn failing() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn is_important(&self, _text: &str) -> Result<bool> {
        match self.answer {
            Some(answer) => Ok(answer),
            None => anyhow::bail!("classifier unavailable"),
        }
    }
}

/// Answers "important" after a fixed delay.
pub struct SlowClassifier {
    pub delay: Duration,
}

#[async_trait]
impl Classifier for SlowClassifier {
    async fn is_important(&self, _text: &str) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }
}

/// Looks translations up in a table; unknown input is an error.
#[derive(Default)]
pub struct TableTranslator {
    table: HashMap<String, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl TableTranslator {
    pub fn with(mut self, source: &str, translated: &str) -> Self {
        self.table.insert(source.to_string(), translated.to_string());
        self
    }

    /// `(text, source_language)` of every call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for TableTranslator {
    async fn translate(&self, text: &str, source_language: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), source_language.to_string()));
        match self.table.get(text) {
            Some(translated) => Ok(translated.clone()),
            None => anyhow::bail!("no translation for {:?}", text),
        }
    }
}

/// Records every sent message; optionally fails or delays each send.
#[derive(Default)]
pub struct RecordingSender {
    fail: bool,
    delay: Duration,
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.fail {
            anyhow::bail!("transport down");
        }
        tokio::time::sleep(self.delay).await;
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}
