use std::sync::Arc;

use shopmate_core::catalog::ProductSearch;
use shopmate_core::coupons::CouponService;
use tracing::info;

use crate::conversation::{ChatRequest, ChatResponse, ResponseBody};
use crate::coupon_router::{CouponCodeMatcher, CouponRouter};
use crate::finders::{CategoryFinder, ProductFinder};
use crate::general::GeneralChat;
use crate::intent::{Intent, IntentClassifier};
use crate::language::LanguageBracket;
use crate::llm::{LlmClient, Translator};
use crate::sales::SalesExecutive;

/// Routes one chat turn: language detection, intent routing, the matching
/// handler, then translation back to the user's language.
pub struct AgentRuntime {
    classifier: IntentClassifier,
    language: LanguageBracket,
    coupons: CouponRouter,
    sales: SalesExecutive,
    products: ProductFinder,
    categories: CategoryFinder,
    general: GeneralChat,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        translator: Arc<dyn Translator>,
        search: Arc<ProductSearch>,
        coupons: CouponService,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            language: LanguageBracket::new(llm.clone(), translator),
            coupons: CouponRouter::new(coupons, search.clone()),
            sales: SalesExecutive::new(llm.clone(), search.clone()),
            products: ProductFinder::new(search.clone(), llm.clone()),
            categories: CategoryFinder::new(search, llm.clone()),
            general: GeneralChat::new(llm),
        }
    }

    pub fn with_coupon_codes(mut self, matcher: CouponCodeMatcher) -> Self {
        self.coupons = self.coupons.with_matcher(matcher);
        self
    }

    pub async fn handle(&self, request: &ChatRequest) -> ChatResponse {
        let message = request.message.trim();
        let detected = self.language.detect(message).await;
        let english_query = detected.english_query.as_str();
        let routed = self.classifier.route(english_query);

        info!(
            event_name = "agent.chat.routed",
            intent = routed.intent.as_str(),
            confidence = routed.confidence,
            language = %detected.language,
            session_id = request.context.session_id.as_deref().unwrap_or_default(),
            "chat message routed"
        );

        let mut pitches = None;
        let body = match routed.intent {
            Intent::Coupon => {
                let reply = self.coupons.handle(english_query, &request.context).await;
                if !reply.pitches.is_empty() {
                    pitches = Some(reply.pitches);
                }
                ResponseBody::Text(reply.text)
            }
            Intent::SalesExecutive => {
                ResponseBody::Sales(self.sales.respond(english_query, &request.context).await)
            }
            Intent::ProductFinder => ResponseBody::Text(self.products.respond(english_query).await),
            Intent::CategoryFinder => {
                ResponseBody::Text(self.categories.respond(english_query).await)
            }
            Intent::General => ResponseBody::Text(self.general.respond(english_query).await),
        };

        let response = self.language.translate_reply(body, &detected.language).await;
        ChatResponse {
            response,
            intent: routed.intent,
            confidence: routed.confidence,
            detected_language: (!detected.is_english()).then(|| detected.language.clone()),
            pitches,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use shopmate_core::catalog::{IndexNames, InMemoryIndex, ProductSearch};
    use shopmate_core::coupons::CouponService;

    use super::AgentRuntime;
    use crate::conversation::{ChatContext, ChatRequest, ResponseBody};
    use crate::intent::Intent;
    use crate::llm::{LlmTranslator, ScriptedLlmClient};

    fn runtime(llm: ScriptedLlmClient) -> AgentRuntime {
        let index = Arc::new(InMemoryIndex::new());
        index.seed(
            "products",
            vec![
                json!({"id": "12", "name": "Logo Hoodie", "price": 100.0, "category": "Clothing", "description": "Fleece hoodie"}),
                json!({"id": "20", "name": "Beach Towel", "price": 15.0, "category": "Accessories", "description": "Soft cotton"}),
            ],
        );
        index.seed(
            "coupons",
            vec![json!({"id": "1", "code": "sale 30", "amount_numeric": 30.0, "discount_type": "percent", "active_bool": true})],
        );
        let search = Arc::new(ProductSearch::new(index.clone(), IndexNames::default()));
        let llm = Arc::new(llm);
        AgentRuntime::new(
            llm.clone(),
            Arc::new(LlmTranslator::new(llm)),
            search,
            CouponService::new(index, "coupons"),
        )
    }

    #[tokio::test]
    async fn coupon_calculation_runs_end_to_end_offline() {
        let agent = runtime(ScriptedLlmClient::offline());

        let response = agent
            .handle(&ChatRequest::new("What is the final price of the hoodie with sale 30?"))
            .await;

        assert_eq!(response.intent, Intent::Coupon);
        assert!((response.confidence - 0.9).abs() < f32::EPSILON);
        assert!(response.response.text().contains("• Final: $70.00"));
        assert_eq!(response.detected_language, None);
    }

    #[tokio::test]
    async fn applicable_coupons_surface_pitches() {
        let agent = runtime(ScriptedLlmClient::offline());
        let context = ChatContext {
            last_viewed_product: Some(json!({"id": "20", "name": "Beach Towel", "price": 15.0})),
            ..ChatContext::default()
        };

        let response = agent.handle(&ChatRequest::new("any offer for me?").with_context(context)).await;

        let pitches = response.pitches.expect("pitches for applicable coupons");
        assert_eq!(pitches.len(), 1);
        assert_eq!(pitches[0].coupon_code, "sale 30");
        assert_eq!(pitches[0].final_price, 10.5);
    }

    #[tokio::test]
    async fn non_english_sales_turn_translates_the_pitch() {
        let agent = runtime(
            ScriptedLlmClient::new()
                .when(
                    "Detect the language",
                    r#"{"detected_language": "es", "english_query": "I want a towel"}"#,
                )
                .when(
                    "sales executive",
                    r#"{"pitch": "Great choice.", "recommendations": [{"title": "Beach Towel", "reason": "soft"}]}"#,
                )
                .when("ISO code 'es'", "Gran elección."),
        );

        let response = agent.handle(&ChatRequest::new("Quiero una toalla")).await;

        assert_eq!(response.intent, Intent::SalesExecutive);
        assert_eq!(response.detected_language.as_deref(), Some("es"));
        let ResponseBody::Sales(reply) = response.response else {
            panic!("sales turn returns a structured body");
        };
        assert_eq!(reply.pitch, "Gran elección.");
        assert_eq!(reply.recommendations[0].id.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn general_chat_apologizes_when_the_model_is_down() {
        let agent = runtime(ScriptedLlmClient::offline());

        let response = agent.handle(&ChatRequest::new("hello there")).await;
        assert_eq!(response.intent, Intent::General);
        assert!(response.response.text().starts_with("I apologize"));
    }
}
