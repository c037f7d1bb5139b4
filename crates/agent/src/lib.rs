//! Conversation layer of the shopping assistant.
//!
//! Each chat turn is bracketed by language detection and reply translation.
//! In between, keyword rules pick one handler:
//! - coupon questions go to the [`coupon_router`], which prices against the catalog
//! - buying intent goes to the [`sales`] executive, whose model suggestions are
//!   resolved to real catalog products
//! - browsing goes to the product and category [`finders`]
//! - everything else is [`general`] chat
//!
//! The model only writes text. Prices, eligibility and catalog matches are
//! computed by `shopmate-core`; model output is treated as untrusted text.

pub mod conversation;
pub mod coupon_router;
pub mod finders;
pub mod general;
pub mod intent;
pub mod language;
pub mod llm;
pub mod parse;
pub mod runtime;
pub mod sales;

pub use conversation::{ChatContext, ChatRequest, ChatResponse, ResponseBody, MAX_MESSAGE_CHARS};
pub use coupon_router::{CouponCodeMatcher, CouponPitch, CouponReply, CouponRouter};
pub use intent::{Classification, Intent, IntentClassifier};
pub use language::{DetectedLanguage, LanguageBracket};
pub use llm::{LlmClient, LlmError, LlmTranslator, ScriptedLlmClient, Translator};
pub use runtime::AgentRuntime;
pub use sales::{Recommendation, SalesExecutive, SalesReply};
