use std::sync::Arc;

use tracing::warn;

use crate::llm::LlmClient;

pub const GENERAL_MAX_TOKENS: u32 = 300;
pub const APOLOGY: &str =
    "I apologize, but I couldn't answer that right now. Please try again in a moment.";

/// Free-form assistant replies for anything outside the shopping flows.
pub struct GeneralChat {
    llm: Arc<dyn LlmClient>,
}

impl GeneralChat {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn respond(&self, query: &str) -> String {
        let prompt = format!(
            "You are a friendly shopping assistant for an online store. \
             Give a helpful and informative answer to the customer's message.\n\nCustomer: {query}"
        );
        match self.llm.generate_text(&prompt, GENERAL_MAX_TOKENS).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => APOLOGY.to_string(),
            Err(error) => {
                warn!(event_name = "agent.general.llm_failed", error = %error, "general chat failed");
                APOLOGY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{GeneralChat, APOLOGY};
    use crate::llm::ScriptedLlmClient;

    #[tokio::test]
    async fn replies_with_trimmed_model_text() {
        let chat = GeneralChat::new(Arc::new(ScriptedLlmClient::new().then_reply("  We ship worldwide.\n")));
        assert_eq!(chat.respond("do you ship to Canada?").await, "We ship worldwide.");
    }

    #[tokio::test]
    async fn model_failure_apologizes_without_details() {
        let chat = GeneralChat::new(Arc::new(ScriptedLlmClient::offline()));
        let reply = chat.respond("hello").await;
        assert_eq!(reply, APOLOGY);
        assert!(!reply.contains("offline"));
    }
}
