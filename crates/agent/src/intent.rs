use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ProductFinder,
    CategoryFinder,
    SalesExecutive,
    Coupon,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductFinder => "product_finder",
            Self::CategoryFinder => "category_finder",
            Self::SalesExecutive => "sales_executive",
            Self::Coupon => "coupon",
            Self::General => "general",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
}

const COUPON_KEYWORDS: &[&str] = &[
    "coupon",
    "coupon code",
    "promo",
    "promocode",
    "discount",
    "coupons",
    "offers",
    "apply",
    "test10",
    "sale 30",
    "which product",
    "how many total",
    "any other",
];
const CATEGORY_KEYWORDS: &[&str] = &["category", "categories", "kind of", "type of"];
const SEARCH_KEYWORDS: &[&str] = &[
    "find",
    "search",
    "looking for",
    "do you have",
    "available",
    "show me",
    "show all",
    "list all",
    "all products",
    "all items",
];

const COUPON_NOUNS: &[&str] =
    &["coupon", "discount", "promo", "promocode", "code", "sale", "offer", "voucher"];
const COUPON_PHRASES: &[&str] = &[
    "can i use",
    "how much will i save",
    "calculate price",
    "final price",
    "use on",
    "apply to",
    "be applied to",
    "savings with",
    "discount for",
    "final amount",
    "final cost",
];
const BUYING_VERBS: &[&str] = &[
    "buy",
    "purchase",
    "recommend",
    "suggest",
    "looking for",
    "need",
    "want",
    "show me",
    "find me",
];

/// Keyword rules over the English form of the message.
#[derive(Clone, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, message: &str) -> Classification {
        let text = message.to_lowercase();
        let (intent, confidence) = if contains_any(&text, COUPON_KEYWORDS) {
            (Intent::Coupon, 0.98)
        } else if contains_any(&text, CATEGORY_KEYWORDS) {
            (Intent::CategoryFinder, 0.90)
        } else if contains_any(&text, SEARCH_KEYWORDS) {
            (Intent::ProductFinder, 0.90)
        } else {
            (Intent::General, 0.6)
        };
        Classification { intent, confidence }
    }

    /// Classification plus the coupon and buying-verb overrides used for routing.
    pub fn route(&self, message: &str) -> Classification {
        let classified = self.classify(message);
        let text = message.to_lowercase();

        if classified.intent == Intent::Coupon || is_coupon_query(&text) {
            return Classification { intent: Intent::Coupon, confidence: 0.9 };
        }
        if contains_any(&text, BUYING_VERBS) {
            return Classification { intent: Intent::SalesExecutive, ..classified };
        }
        classified
    }
}

pub fn is_coupon_query(message: &str) -> bool {
    let text = message.to_lowercase();
    contains_any(&text, COUPON_NOUNS) || contains_any(&text, COUPON_PHRASES)
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}
