//! Sales pitch plus up to three catalog-backed recommendations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopmate_core::domain::fields;
use shopmate_core::domain::product::EnrichedProduct;
use shopmate_core::recommend::{ProductLookup, RecommendationResolver};
use tracing::{debug, warn};

use crate::conversation::ChatContext;
use crate::llm::LlmClient;
use crate::parse::{parse_pitch, ParsedPitch};

pub const MAX_RECOMMENDATIONS: usize = 3;
pub const PITCH_MAX_TOKENS: u32 = 350;

const CANNED_REPLY: &str = r#"{"pitch":"I can help with that.","recommendations":[]}"#;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Option<String>,
    pub title: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<EnrichedProduct>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesReply {
    pub pitch: String,
    pub recommendations: Vec<Recommendation>,
    pub raw: String,
}

pub struct SalesExecutive {
    llm: Arc<dyn LlmClient>,
    resolver: RecommendationResolver<Arc<dyn ProductLookup>>,
}

impl SalesExecutive {
    pub fn new(llm: Arc<dyn LlmClient>, lookup: Arc<dyn ProductLookup>) -> Self {
        Self { llm, resolver: RecommendationResolver::new(lookup) }
    }

    pub async fn respond(&self, query: &str, context: &ChatContext) -> SalesReply {
        let prompt = build_prompt(query, &context.past_interactions);
        let raw = match self.llm.generate_text(&prompt, PITCH_MAX_TOKENS).await {
            Ok(text) => text,
            Err(error) => {
                warn!(event_name = "agent.sales.llm_failed", error = %error, "pitch generation failed");
                CANNED_REPLY.to_string()
            }
        };

        let parsed = parse_pitch(&raw);
        if matches!(parsed, ParsedPitch::Unparseable) {
            debug!(event_name = "agent.sales.unparseable", "model reply had no usable content");
        }

        let mut suggested: Vec<Recommendation> = parsed
            .recommendations()
            .iter()
            .filter_map(normalize_recommendation)
            .take(MAX_RECOMMENDATIONS)
            .collect();

        let recommendations = if suggested.is_empty() {
            self.search_fallback(query).await
        } else {
            let titles: Vec<String> = suggested.iter().map(|rec| rec.title.clone()).collect();
            let resolved = self.resolver.resolve_titles(&titles).await;
            for (recommendation, product) in suggested.iter_mut().zip(resolved) {
                if let Some(id) = product.id.as_ref() {
                    recommendation.id = Some(id.as_str().to_string());
                }
                if !product.name.is_empty() {
                    recommendation.title = product.name.clone();
                }
                recommendation.product = Some(product);
            }
            suggested
        };

        SalesReply { pitch: parsed.pitch().to_string(), recommendations, raw }
    }

    async fn search_fallback(&self, query: &str) -> Vec<Recommendation> {
        let reason = format!("Matches your query '{query}'");
        self.resolver
            .resolve_query(query, MAX_RECOMMENDATIONS)
            .await
            .into_iter()
            .map(|product| Recommendation {
                id: product.id.as_ref().map(|id| id.as_str().to_string()),
                title: product.name.clone(),
                reason: reason.clone(),
                product: Some(product),
            })
            .collect()
    }
}

fn build_prompt(query: &str, past_interactions: &[String]) -> String {
    let mut parts = vec![
        "You are a helpful sales executive. Produce EXACT JSON only with keys: 'pitch' (1-2 short sentences) and 'recommendations' (list of objects with keys 'title', optional 'id_hint', and 'reason').".to_string(),
        "If you cannot suggest products, return an empty 'recommendations' list.".to_string(),
        "Current user message:".to_string(),
        query.to_string(),
    ];
    if !past_interactions.is_empty() {
        parts.push("Relevant past interactions (summaries):".to_string());
        parts.extend(past_interactions.iter().map(|summary| format!("- {summary}")));
    }
    parts.push("Return only valid JSON.".to_string());
    parts.join("\n")
}

/// Strings become titles; objects supply `title|name|id_hint|id` and `reason|why`.
fn normalize_recommendation(item: &Value) -> Option<Recommendation> {
    let recommendation = match item {
        Value::Object(map) => Recommendation {
            id: map.get("id").and_then(fields::text),
            title: fields::first_text(map, &["title", "name", "id_hint", "id"]).unwrap_or_default(),
            reason: fields::first_text(map, &["reason", "why"]).unwrap_or_default(),
            product: None,
        },
        Value::Null => return None,
        other => Recommendation {
            title: fields::text(other).unwrap_or_else(|| other.to_string()),
            ..Recommendation::default()
        },
    };
    (!recommendation.title.trim().is_empty()).then_some(recommendation)
}
