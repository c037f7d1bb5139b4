use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("language model unreachable: {0}")]
    Unavailable(String),
    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model returned no text")]
    Empty,
}

/// Text generation. Callers parse the output leniently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_text(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, LlmError>;
}

/// Translation through a single model round-trip.
#[derive(Clone)]
pub struct LlmTranslator {
    llm: Arc<dyn LlmClient>,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Translate the following response into the language with ISO code '{target_language}'. \
             Keep numbers, prices, coupon codes and markdown unchanged. \
             Return only the translation.\n\n{text}"
        );
        let translated = self.llm.generate_text(&prompt, 600).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(translated.to_string())
    }
}

/// Canned model for tests and offline runs.
///
/// Rules are checked in order; the first whose needle occurs in the prompt
/// answers. Unmatched prompts take the next queued fallback reply, then the
/// default reply.
#[derive(Default)]
pub struct ScriptedLlmClient {
    rules: Vec<(String, Result<String, LlmError>)>,
    queued: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: Option<Result<String, LlmError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unmatched prompt fails with [`LlmError::Unavailable`].
    pub fn offline() -> Self {
        Self::default().with_default(Err(LlmError::Unavailable("offline".to_string())))
    }

    pub fn when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(reply.into())));
        self
    }

    pub fn when_failing(mut self, needle: impl Into<String>, error: LlmError) -> Self {
        self.rules.push((needle.into(), Err(error)));
        self
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner).push_back(Ok(reply.into()));
        self
    }

    pub fn with_default(mut self, reply: Result<String, LlmError>) -> Self {
        self.default_reply = Some(reply);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn generate_text(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());

        if let Some((_, reply)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return reply.clone();
        }
        if let Some(reply) = self.queued.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
        {
            return reply;
        }
        self.default_reply.clone().unwrap_or(Err(LlmError::Empty))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{LlmClient, LlmError, LlmTranslator, ScriptedLlmClient, Translator};

    #[tokio::test]
    async fn scripted_rules_win_over_queue() {
        let llm = ScriptedLlmClient::new().when("weather", "sunny").then_reply("first").then_reply("second");

        assert_eq!(llm.generate_text("what is the weather", 10).await, Ok("sunny".into()));
        assert_eq!(llm.generate_text("anything", 10).await, Ok("first".into()));
        assert_eq!(llm.generate_text("anything", 10).await, Ok("second".into()));
        assert_eq!(llm.generate_text("anything", 10).await, Err(LlmError::Empty));
        assert_eq!(llm.prompts().len(), 4);
    }

    #[tokio::test]
    async fn translator_rejects_blank_output() {
        let llm = Arc::new(ScriptedLlmClient::new().when("Translate", "   "));
        let translator = LlmTranslator::new(llm);

        assert_eq!(translator.translate("Hello", "es").await, Err(LlmError::Empty));
    }

    #[tokio::test]
    async fn translator_trims_model_output() {
        let llm = Arc::new(ScriptedLlmClient::new().when("ISO code 'es'", " Hola \n"));
        let translator = LlmTranslator::new(llm);

        assert_eq!(translator.translate("Hello", "es").await, Ok("Hola".into()));
    }
}
