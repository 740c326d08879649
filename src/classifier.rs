//! Gold mention detection
//!
//! Naive topic classification: a message mentions gold when its lowercased
//! text contains any term from a fixed precious-metals vocabulary.
//! Substring match only, so "golden" matches and so does "marigold".

/// Static keyword list, matched case-insensitively
pub const GOLD_KEYWORDS: &[&str] = &[
    "gold", "golden", "bullion", "precious metals",
    // Market terms
    "gold price", "gold investment", "gold etf", "gold market", "gold value",
    // Products
    "gold coins", "gold bars", "gold jewelry", "gold mining",
    // Actions
    "gold trading", "buy gold", "sell gold",
];

/// Gold keyword classifier
pub struct GoldClassifier;

impl GoldClassifier {
    /// Check whether the message mentions any gold keyword (case-insensitive)
    pub fn mentions_gold(message: &str) -> bool {
        let lowered = message.to_lowercase();
        GOLD_KEYWORDS.iter().any(|kw| lowered.contains(kw))
    }

    /// Keywords present in the message, in list order
    pub fn matched_keywords(message: &str) -> Vec<&'static str> {
        let lowered = message.to_lowercase();
        GOLD_KEYWORDS
            .iter()
            .copied()
            .filter(|kw| lowered.contains(kw))
            .collect()
    }
}
