//! Detect the user's language on the way in, translate replies on the way out.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::conversation::ResponseBody;
use crate::llm::{LlmClient, Translator};
use crate::parse::embedded_object;

pub const DEFAULT_LANGUAGE: &str = "en";
const DETECT_MAX_TOKENS: u32 = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedLanguage {
    /// Lowercased ISO code, `en` when unknown.
    pub language: String,
    pub english_query: String,
}

impl DetectedLanguage {
    pub fn english(message: &str) -> Self {
        Self { language: DEFAULT_LANGUAGE.to_string(), english_query: message.to_string() }
    }

    pub fn is_english(&self) -> bool {
        self.language == DEFAULT_LANGUAGE
    }
}

pub struct LanguageBracket {
    llm: Arc<dyn LlmClient>,
    translator: Arc<dyn Translator>,
}

impl LanguageBracket {
    pub fn new(llm: Arc<dyn LlmClient>, translator: Arc<dyn Translator>) -> Self {
        Self { llm, translator }
    }

    pub async fn detect(&self, message: &str) -> DetectedLanguage {
        let prompt = format!(
            "Detect the language of the user's message and translate it to English. \
             Respond with JSON only: {{\"detected_language\": \"<ISO code such as en, es, fr, hi, ar>\", \
             \"english_query\": \"<the message in English>\"}}\n\nMessage: {message}"
        );
        let reply = match self.llm.generate_text(&prompt, DETECT_MAX_TOKENS).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(event_name = "agent.language.detect_failed", error = %error, "language detection failed");
                return DetectedLanguage::english(message);
            }
        };

        match parse_detection(&reply, message) {
            Some(detected) => detected,
            None => {
                debug!(event_name = "agent.language.unparseable", "detection reply was not usable");
                DetectedLanguage::english(message)
            }
        }
    }

    /// Sales replies translate only the pitch. Failures keep the English body.
    pub async fn translate_reply(&self, body: ResponseBody, language: &str) -> ResponseBody {
        if language == DEFAULT_LANGUAGE {
            return body;
        }
        match body {
            ResponseBody::Text(text) => match self.translator.translate(&text, language).await {
                Ok(translated) => ResponseBody::Text(translated),
                Err(error) => {
                    warn!(event_name = "agent.language.translate_failed", language, error = %error, "reply translation failed");
                    ResponseBody::Text(text)
                }
            },
            ResponseBody::Sales(mut reply) => {
                if reply.pitch.trim().is_empty() {
                    return ResponseBody::Sales(reply);
                }
                match self.translator.translate(&reply.pitch, language).await {
                    Ok(translated) => reply.pitch = translated,
                    Err(error) => warn!(
                        event_name = "agent.language.translate_failed",
                        language,
                        error = %error,
                        "pitch translation failed"
                    ),
                }
                ResponseBody::Sales(reply)
            }
        }
    }
}

fn parse_detection(reply: &str, message: &str) -> Option<DetectedLanguage> {
    let object = serde_json::from_str::<Value>(reply.trim())
        .ok()
        .filter(Value::is_object)
        .or_else(|| embedded_object(reply))?;

    let language = object
        .get("detected_language")
        .and_then(Value::as_str)
        .map(|code| code.trim().to_lowercase())
        .filter(|code| !code.is_empty())?;
    let english_query = object
        .get("english_query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .unwrap_or(message)
        .to_string();

    Some(DetectedLanguage { language, english_query })
}
