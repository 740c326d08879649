//! Canned fallback replies
//!
//! Used only when the agent cannot produce an answer.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    Greetings,
    Questions,
    Default,
    Farewell,
    GoldRelated,
}

const GREETINGS: &[&str] = &[
    "Hello! How can I help you today?",
    "Hi there! What's on your mind?",
    "Greetings! I'm here to chat with you.",
    "Hey! How are you doing?",
];

const QUESTIONS: &[&str] = &[
    "That's an interesting question! Let me think about that.",
    "I'd love to help you with that!",
    "That's a great point you're making.",
    "I appreciate you asking that.",
];

const DEFAULT: &[&str] = &[
    "I understand what you're saying.",
    "That's fascinating! Tell me more.",
    "I see your point. What else would you like to discuss?",
    "Thanks for sharing that with me!",
    "Interesting! How do you feel about that?",
];

const FAREWELL: &[&str] = &[
    "Goodbye! Have a wonderful day!",
    "See you later! It was great chatting with you.",
    "Take care! Feel free to come back anytime.",
    "Farewell! Looking forward to our next conversation.",
];

const GOLD_RELATED: &[&str] = &[
    "I see you're interested in gold! Gold has been a valuable asset for centuries and remains an important investment option today.",
    "Gold is indeed a fascinating topic! It's often considered a hedge against inflation and economic uncertainty.",
    "That's a great question about gold! Many investors consider precious metals like gold as part of a diversified portfolio.",
    "Gold investment can be complex but rewarding! There are various ways to invest in gold, from physical bullion to ETFs.",
    "You're asking about gold - that's smart thinking! Gold has historically maintained its value during economic turbulence.",
];

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "greetings", "good morning", "good evening"];
const FAREWELL_WORDS: &[&str] = &["bye", "goodbye", "farewell", "see you", "take care"];

impl ResponseCategory {
    pub fn responses(self) -> &'static [&'static str] {
        match self {
            ResponseCategory::Greetings => GREETINGS,
            ResponseCategory::Questions => QUESTIONS,
            ResponseCategory::Default => DEFAULT,
            ResponseCategory::Farewell => FAREWELL,
            ResponseCategory::GoldRelated => GOLD_RELATED,
        }
    }

    /// Category of canned reply that best fits a message
    pub fn for_message(message: &str, contains_gold: bool) -> Self {
        if contains_gold {
            return ResponseCategory::GoldRelated;
        }

        let lowered = message.trim().to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_phrase = |phrases: &[&str]| {
            phrases.iter().any(|p| {
                if p.contains(' ') {
                    lowered.contains(p)
                } else {
                    words.contains(p)
                }
            })
        };

        if has_phrase(FAREWELL_WORDS) {
            ResponseCategory::Farewell
        } else if has_phrase(GREETING_WORDS) {
            ResponseCategory::Greetings
        } else if lowered.ends_with('?') {
            ResponseCategory::Questions
        } else {
            ResponseCategory::Default
        }
    }
}

/// Pick a uniformly random reply from the category
pub fn pick(category: ResponseCategory) -> &'static str {
    pick_with(category, &mut rand::thread_rng())
}

pub fn pick_with<R: Rng + ?Sized>(category: ResponseCategory, rng: &mut R) -> &'static str {
    // Every category list is a non-empty constant.
    category.responses().choose(rng).copied().unwrap_or(DEFAULT[0])
}
