use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopmate_core::domain::fields;
use shopmate_core::domain::product::EnrichedProduct;
use shopmate_core::errors::DomainError;
use shopmate_core::recommend::enrich_record;

use crate::coupon_router::CouponPitch;
use crate::intent::Intent;
use crate::sales::SalesReply;

pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Caller-supplied context. Read, never mutated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub last_viewed_product: Option<Value>,
    pub cart: Option<Value>,
    pub user_email: Option<String>,
    /// Summaries of earlier interactions, most relevant first.
    pub past_interactions: Vec<String>,
}

impl ChatContext {
    pub fn last_viewed(&self) -> Option<EnrichedProduct> {
        self.last_viewed_product
            .as_ref()
            .filter(|product| product.as_object().is_some_and(|map| !map.is_empty()))
            .map(enrich_record)
    }

    /// Cart total from `total`, `cart_total` or `subtotal`; 0 when absent.
    pub fn cart_total(&self) -> f64 {
        self.cart
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|cart| {
                ["total", "cart_total", "subtotal"]
                    .iter()
                    .filter_map(|key| cart.get(*key))
                    .find_map(fields::number)
            })
            .unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: ChatContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), context: ChatContext::default() }
    }

    pub fn with_context(mut self, context: ChatContext) -> Self {
        self.context = context;
        self
    }

    /// Trimmed message, 1..=1000 characters.
    pub fn validated_message(&self) -> Result<&str, DomainError> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(DomainError::InvalidInput("message must not be empty".to_owned()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(DomainError::InvalidInput(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }
        Ok(message)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Text(String),
    Sales(SalesReply),
}

impl ResponseBody {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Sales(reply) => &reply.pitch,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: ResponseBody,
    pub intent: Intent,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitches: Option<Vec<CouponPitch>>,
}
