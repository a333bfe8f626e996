//! Pluggable matching capabilities.
//!
//! The evaluator only needs three things from a matcher: find a term
//! literally, find a term or anything on-topic for it, and tell whether a
//! found occurrence is framed as avoided. [`KeywordMatcher`] does all three
//! with word lists; an embedding-backed matcher can replace it without
//! touching the evaluator or the negotiation loop.

use super::lexicon::Lexicon;
use super::text::{quoted_phrases, words, Literalness, Passage, Span};
use crate::constraint::{Constraint, ConstraintType};
use std::collections::HashSet;

lazy_static::lazy_static! {
    /// Words that mark the following content as avoided or denied.
    pub static ref DEFAULT_NEGATION_CUES: Vec<&'static str> = vec![
        "not", "no", "never", "without", "nor", "neither", "none", "nothing",
        "avoid", "avoided", "avoids", "avoiding", "refuse", "refused", "refuses",
        "refusing", "away", "instead", "don't", "doesn't", "didn't", "won't",
        "wouldn't", "couldn't", "can't", "cannot", "wasn't", "isn't", "hasn't",
        "hadn't", "shouldn't",
    ];

    /// Words that carry no subject matter when deriving triggers from a
    /// constraint description.
    static ref NON_CONTENT_WORDS: HashSet<&'static str> = [
        // grammar
        "a", "an", "the", "of", "to", "in", "on", "at", "by", "for", "with", "from",
        "and", "or", "but", "is", "are", "was", "were", "be", "been", "being", "it",
        "its", "he", "she", "they", "them", "his", "her", "their", "this", "that",
        "these", "those", "as", "any", "some", "all", "every", "into", "about",
        "has", "have", "had", "does", "do", "did", "will", "would", "should",
        // stance and rule words
        "must", "may", "can", "cannot", "never", "always", "not", "no", "only",
        "afraid", "fear", "fears", "scared", "hates", "loves", "likes", "wants",
        "avoid", "avoids", "forbidden", "allowed", "include", "includes", "mention",
        "mentions", "use", "uses", "word", "words", "appear", "appears", "story",
        "scene", "scenes", "turn", "turns", "sentence", "sentences", "setting",
        "settings", "theme", "themes", "involve", "involves", "stay", "stays",
    ]
    .into_iter()
    .collect();

    /// Words that make the following content the object of a feeling
    /// ("his fear of deep water") rather than something that happens.
    static ref STANCE_WORDS: HashSet<&'static str> = [
        "afraid", "fear", "fears", "feared", "fearing", "scared", "terrified",
        "phobia", "dread", "dreads", "dreaded", "hate", "hates", "hated",
        "overcome", "overcame", "overcoming",
    ]
    .into_iter()
    .collect();
}

/// One occurrence of a term in a passage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// The term (or related term) that matched.
    pub term: String,
    pub span: Span,
}

/// Matching capabilities the evaluator relies on.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Occurrences of `term` itself.
    fn literal_matches(&self, passage: &Passage, term: &str, mode: Literalness) -> Vec<Match> {
        passage
            .find(term, mode)
            .into_iter()
            .map(|span| Match {
                term: term.to_string(),
                span,
            })
            .collect()
    }

    /// Occurrences of `term` or of anything the matcher treats as the same topic.
    fn topic_matches(&self, passage: &Passage, term: &str) -> Vec<Match>;

    /// Whether `found` is framed as avoided or negated ("he never went near
    /// the ocean").
    fn is_negated(&self, passage: &Passage, found: &Match) -> bool;

    /// Whether `found` only names what someone feels about a topic
    /// ("afraid of deep water"). Such a mention does not break an anchor.
    fn is_stance_object(&self, _passage: &Passage, _found: &Match) -> bool {
        false
    }

    /// The concrete content a constraint is about.
    fn derive_triggers(&self, constraint: &Constraint) -> Vec<String>;
}

/// Word-list matcher backed by a [`Lexicon`].
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    lexicon: Lexicon,
    negation_cues: HashSet<String>,
    negation_window: usize,
}

impl KeywordMatcher {
    pub fn new(lexicon: Lexicon, negation_cues: &[String], negation_window: usize) -> Self {
        Self {
            lexicon,
            negation_cues: negation_cues.iter().map(|c| c.to_lowercase()).collect(),
            negation_window,
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        let cues: Vec<String> = DEFAULT_NEGATION_CUES.iter().map(|c| c.to_string()).collect();
        Self::new(Lexicon::builtin(), &cues, 3)
    }
}

impl Matcher for KeywordMatcher {
    fn topic_matches(&self, passage: &Passage, term: &str) -> Vec<Match> {
        let mut found = self.literal_matches(passage, term, Literalness::Near);
        for related in self.lexicon.related(term) {
            found.extend(self.literal_matches(passage, related, Literalness::Near));
        }

        found.sort_by_key(|m| (m.span.start, m.span.end));
        found.dedup_by_key(|m| m.span);
        found
    }

    fn is_negated(&self, passage: &Passage, found: &Match) -> bool {
        passage
            .preceding(found.span, self.negation_window)
            .iter()
            .any(|word| self.negation_cues.contains(word))
    }

    fn is_stance_object(&self, passage: &Passage, found: &Match) -> bool {
        !self.lexicon.related(&found.term).is_empty()
            && passage
                .preceding(found.span, self.negation_window)
                .iter()
                .any(|word| STANCE_WORDS.contains(word.as_str()))
    }

    fn derive_triggers(&self, constraint: &Constraint) -> Vec<String> {
        if !constraint.triggers.is_empty() {
            return constraint.triggers.clone();
        }

        let quoted = quoted_phrases(&constraint.description);
        if !quoted.is_empty() {
            return quoted;
        }

        let topics = self.lexicon.topics_in(&constraint.description);
        if !topics.is_empty() {
            let mut triggers: Vec<String> = Vec::new();
            for topic in topics {
                triggers.push(topic.to_string());
                // Anchors also cover the concrete terms of their topic: a
                // fear of deep water is broken by swimming in a lake.
                if constraint.kind == ConstraintType::Anchor {
                    triggers.extend(self.lexicon.related(topic).iter().cloned());
                }
            }
            let mut seen = HashSet::new();
            triggers.retain(|t| seen.insert(t.clone()));
            return triggers;
        }

        content_words(&constraint.description)
    }
}

/// Description words that name subject matter.
fn content_words(description: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(description)
        .into_iter()
        .filter(|w| !NON_CONTENT_WORDS.contains(w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintDraft, ConstraintFunction, ConstraintId, Flexibility};
    use crate::turn::TurnId;

    fn constraint(description: &str, kind: ConstraintType) -> Constraint {
        let draft = ConstraintDraft::new(
            description,
            Flexibility::Fixed,
            ConstraintFunction::Exclusionary,
            kind,
        );
        Constraint::from_draft(ConstraintId(1), draft, TurnId(1))
    }

    #[test]
    fn test_explicit_triggers_win() {
        let matcher = KeywordMatcher::default();
        let mut c = constraint("John is afraid of deep water", ConstraintType::Anchor);
        c.triggers = vec!["boat".to_string()];
        assert_eq!(matcher.derive_triggers(&c), vec!["boat"]);
    }

    #[test]
    fn test_quoted_phrase_triggers() {
        let matcher = KeywordMatcher::default();
        let c = constraint("Do not use the word \"ocean\"", ConstraintType::Anchor);
        assert_eq!(matcher.derive_triggers(&c), vec!["ocean"]);
    }

    #[test]
    fn test_anchor_triggers_come_from_topic_terms() {
        let matcher = KeywordMatcher::default();
        let c = constraint("John is afraid of deep water", ConstraintType::Anchor);
        let triggers = matcher.derive_triggers(&c);

        assert_eq!(triggers[0], "deep water");
        assert!(triggers.contains(&"swimming".to_string()));
        assert!(triggers.contains(&"lake".to_string()));
    }

    #[test]
    fn test_stance_object() {
        let matcher = KeywordMatcher::default();
        let passage = Passage::new("His fear of deep water kept him from the deep water");
        let found = matcher.literal_matches(&passage, "deep water", Literalness::Exact);

        assert_eq!(found.len(), 2);
        assert!(matcher.is_stance_object(&passage, &found[0]));
        assert!(!matcher.is_stance_object(&passage, &found[1]));

        // Only topic names can be the object of a stance.
        let passage = Passage::new("He was afraid of swimming");
        let found = matcher.literal_matches(&passage, "swimming", Literalness::Exact);
        assert!(!matcher.is_stance_object(&passage, &found[0]));
    }

    #[test]
    fn test_channel_triggers_are_topics() {
        let matcher = KeywordMatcher::default();
        let c = constraint("No magic in this story", ConstraintType::Channel);
        assert_eq!(matcher.derive_triggers(&c), vec!["magic"]);
    }

    #[test]
    fn test_content_word_fallback() {
        let matcher = KeywordMatcher::new(Lexicon::new(), &[], 3);
        let c = constraint("The lighthouse must never appear", ConstraintType::Anchor);
        assert_eq!(matcher.derive_triggers(&c), vec!["lighthouse"]);
    }

    #[test]
    fn test_topic_matches_related_terms() {
        let matcher = KeywordMatcher::default();
        let passage = Passage::new("The wizard cast a spell");
        let found = matcher.topic_matches(&passage, "magic");

        let terms: Vec<_> = found.iter().map(|m| m.term.as_str()).collect();
        assert_eq!(terms, vec!["wizard", "spell"]);
    }

    #[test]
    fn test_negation_window() {
        let matcher = KeywordMatcher::default();
        let passage = Passage::new("He never went near the ocean, but later the ocean called");
        let found = matcher.literal_matches(&passage, "ocean", Literalness::Exact);

        assert_eq!(found.len(), 2);
        // "never" sits four words back, outside the window of 3.
        assert!(!matcher.is_negated(&passage, &found[0]));
        assert!(!matcher.is_negated(&passage, &found[1]));

        let passage = Passage::new("He stayed away from the ocean");
        let found = matcher.literal_matches(&passage, "ocean", Literalness::Exact);
        assert!(matcher.is_negated(&passage, &found[0]));
    }
}
