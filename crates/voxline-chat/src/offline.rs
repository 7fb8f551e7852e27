//! Canned replies used when there is no network and no cache hit.

use std::sync::Arc;

use voxline_core::clock::Clock;

/// Reply used when no rule matches.
pub const FALLBACK_REPLY: &str = "I'm offline right now and don't have a saved answer for that. \
    Please check your internet connection and try again.";

enum RuleReply {
    Fixed(&'static str),
    CurrentTime,
    CurrentDate,
}

struct Rule {
    keywords: &'static [&'static str],
    reply: RuleReply,
}

/// Ordered rule table; the first rule with a matching keyword wins.
const RULES: &[Rule] = &[
    Rule {
        keywords: &["hello", "hi", "hey", "greetings"],
        reply: RuleReply::Fixed(
            "Hello! I'm offline at the moment, but I can still help with a few basics \
             like the time and date.",
        ),
    },
    Rule {
        keywords: &["time", "clock"],
        reply: RuleReply::CurrentTime,
    },
    Rule {
        keywords: &["date", "today", "day"],
        reply: RuleReply::CurrentDate,
    },
    Rule {
        keywords: &["help", "capabilities"],
        reply: RuleReply::Fixed(
            "While offline I can tell you the time and date and replay answers to questions \
             you've asked before. Everything else needs a connection.",
        ),
    },
    Rule {
        keywords: &["weather", "forecast", "temperature"],
        reply: RuleReply::Fixed(
            "I can't check the weather while offline. Try again once you're connected.",
        ),
    },
    Rule {
        keywords: &["thanks", "thank", "cheers"],
        reply: RuleReply::Fixed("You're welcome!"),
    },
    Rule {
        keywords: &["bye", "goodbye", "later"],
        reply: RuleReply::Fixed("Goodbye! I'll be here when you're back online."),
    },
];

/// Keyword-matched offline replies.
///
/// Depends on nothing but the clock, which only the time and date rules
/// read.
pub struct OfflineResponder {
    clock: Arc<dyn Clock>,
}

impl OfflineResponder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Reply to `user_text` from the rule table.
    pub fn answer(&self, user_text: &str) -> String {
        let lowered = user_text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        let matched = RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| words.contains(k)));

        match matched.map(|rule| &rule.reply) {
            Some(RuleReply::Fixed(text)) => (*text).to_string(),
            Some(RuleReply::CurrentTime) => {
                let now = self.clock.now_local();
                format!(
                    "It's {} right now. I'm offline, so that's from your device clock.",
                    now.format("%H:%M")
                )
            }
            Some(RuleReply::CurrentDate) => {
                let now = self.clock.now_local();
                format!("Today is {}.", now.format("%A, %B %-d, %Y"))
            }
            None => FALLBACK_REPLY.to_string(),
        }
    }
}
