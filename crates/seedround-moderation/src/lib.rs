//! Seedround Moderation - Contact-exchange detection for negotiation messages
//!
//! Outbound negotiation text is scanned for attempts to move the conversation
//! off-platform: phone-number shapes, email addresses, named external
//! messengers, and explicit "contact me elsewhere" phrasing.
//!
//! # Key Principle
//!
//! Moderation is detective, not preventive. A match only marks the stored
//! message `flagged = true` for downstream review; delivery and the agent
//! reply proceed unchanged, so a false positive can never break a live
//! negotiation.

use regex::RegexSet;
use serde::Serialize;

/// A single moderation rule
#[derive(Debug, Clone, Copy)]
pub struct ModerationRule {
    pub name: &'static str,
    pub pattern: &'static str,
}

/// The fixed rule set applied to every investor message
pub const DEFAULT_RULES: &[ModerationRule] = &[
    ModerationRule {
        name: "email_address",
        pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
    },
    ModerationRule {
        name: "phone_number",
        pattern: r"\+?\d[\d\s().-]{7,}\d",
    },
    ModerationRule {
        name: "external_messenger",
        pattern: r"(?i)\b(whatsapp|telegram|signal|viber|wechat|discord|skype|instagram|facebook|snapchat)\b",
    },
    ModerationRule {
        name: "off_platform_contact",
        pattern: r"(?i)\bcontact\s+me\s+(off|outside)\b|\b(take|move)\s+this\s+(offline|off[\s-]?platform)\b|\breach\s+me\s+(at|on)\b|\bdm\s+me\b|\b(text|call)\s+me\s+(at|on)\b",
    },
];

/// Result of scanning one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    /// Names of the rules that matched, for review tooling
    pub matched_rules: Vec<&'static str>,
}

impl ModerationVerdict {
    pub fn clean() -> Self {
        Self {
            flagged: false,
            matched_rules: Vec::new(),
        }
    }
}

/// Scans outbound message text for disallowed contact-exchange patterns
pub struct ContentModerator {
    set: RegexSet,
    rule_names: Vec<&'static str>,
}

impl ContentModerator {
    /// Build a moderator over the default rule set
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES)
    }

    /// Build a moderator over a custom rule set
    pub fn with_rules(rules: &[ModerationRule]) -> Self {
        let set = RegexSet::new(rules.iter().map(|r| r.pattern))
            .expect("moderation rule patterns are valid regexes");
        Self {
            set,
            rule_names: rules.iter().map(|r| r.name).collect(),
        }
    }

    /// Scan a message; matching only flags, it never blocks
    pub fn scan(&self, text: &str) -> ModerationVerdict {
        let matched_rules: Vec<&'static str> = self
            .set
            .matches(text)
            .into_iter()
            .map(|i| self.rule_names[i])
            .collect();

        ModerationVerdict {
            flagged: !matched_rules.is_empty(),
            matched_rules,
        }
    }
}

impl Default for ContentModerator {
    fn default() -> Self {
        Self::new()
    }
}
