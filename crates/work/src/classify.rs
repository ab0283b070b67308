//! Mission kind inference.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Infers a mission's kind from its text.
pub trait Classifier: Send + Sync {
    /// Return the kind tag, or `None` when nothing matches.
    fn infer(&self, title: &str, description: &str) -> Option<String>;
}

/// One keyword rule: a regex and the kind it yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Regex matched against title and description
    pub pattern: String,
    /// Kind tag on match
    pub kind: String,
}

impl KeywordRule {
    /// Create a rule.
    pub fn new(pattern: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: kind.into(),
        }
    }
}

/// Builtin rules used when none are configured.
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(r"(?i)\b(fix|bug|refactor|implement|patch|compile|test)\b", "code"),
        KeywordRule::new(r"(?i)\b(reply|respond|email|message|notify)\b", "reply"),
        KeywordRule::new(r"(?i)\b(research|investigate|summari[sz]e|compare)\b", "research"),
    ]
}

/// Rule-based classifier. The first matching rule wins.
pub struct KeywordClassifier {
    rules: Vec<(Regex, String)>,
}

impl KeywordClassifier {
    /// Compile `rules`.
    pub fn new(rules: &[KeywordRule]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| Ok((Regex::new(&rule.pattern)?, rule.kind.clone())))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Compile `rules`, skipping invalid patterns. Falls back to the builtin
    /// rules when `rules` is empty.
    pub fn lenient(rules: &[KeywordRule]) -> Self {
        let defaults;
        let rules = if rules.is_empty() {
            defaults = default_rules();
            &defaults
        } else {
            rules
        };

        let compiled = rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(regex) => Some((regex, rule.kind.clone())),
                Err(e) => {
                    warn!("Skipping classifier rule {:?}: {}", rule.pattern, e);
                    None
                }
            })
            .collect();
        Self { rules: compiled }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::lenient(&[])
    }
}

impl Classifier for KeywordClassifier {
    fn infer(&self, title: &str, description: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(title) || regex.is_match(description))
            .map(|(_, kind)| kind.clone())
    }
}
