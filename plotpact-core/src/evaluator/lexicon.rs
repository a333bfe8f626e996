//! Topic lexicon for thematic matching.
//!
//! A lexicon maps a topic ("deep water") to concrete related terms
//! ("swimming", "lake", "scuba"). Channel constraints match through it, and
//! flexible focusing constraints accept its terms as substitutes. Callers
//! can replace or extend the built-in table, e.g. from a JSON file.

use super::text::words;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in topics. Tuned for the kinds of short adventure and mystery
/// stories the demo ships with; real deployments should supply their own.
const BUILTIN_TOPICS: &[(&str, &[&str])] = &[
    (
        "deep water",
        &[
            "swim", "swimming", "swam", "dive", "diving", "dived", "scuba", "snorkel",
            "snorkeling", "lake", "ocean", "sea", "open water", "underwater", "drown",
            "drowning",
        ],
    ),
    (
        "ocean",
        &["sea", "seas", "ocean", "oceans", "waves", "tide", "surf", "shore", "beach", "reef"],
    ),
    (
        "underwater",
        &["underwater", "submerged", "seabed", "reef", "coral", "submarine", "dive", "diving"],
    ),
    (
        "magic",
        &["magic", "spell", "spells", "wizard", "witch", "sorcery", "enchanted", "curse", "potion"],
    ),
    ("dragon", &["dragon", "dragons", "wyrm", "drake", "wyvern"]),
    (
        "violence",
        &["fight", "fighting", "kill", "killed", "stab", "stabbed", "blood", "sword", "battle", "war"],
    ),
    (
        "death",
        &["death", "dead", "die", "died", "dying", "funeral", "grave", "corpse", "killed"],
    ),
    (
        "fire",
        &["fire", "flame", "flames", "burn", "burning", "blaze", "smoke", "ember", "embers"],
    ),
    (
        "technology",
        &["phone", "computer", "internet", "robot", "machine", "screen", "email", "car"],
    ),
    (
        "time pressure",
        &["clock", "deadline", "countdown", "hurry", "hurried", "seconds", "minutes", "late"],
    ),
    (
        "mystery",
        &["clue", "clues", "secret", "hidden", "code", "puzzle", "riddle", "note", "message"],
    ),
    (
        "family",
        &["brother", "sister", "father", "mother", "parents", "son", "daughter", "family"],
    ),
    (
        "night",
        &["night", "midnight", "moon", "moonlight", "dark", "darkness", "stars", "dusk"],
    ),
];

/// Topic name -> related terms, keyed by the normalized topic phrase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lexicon {
    topics: BTreeMap<String, Vec<String>>,
}

impl Lexicon {
    /// An empty lexicon: no thematic matching beyond the terms themselves.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in topic table.
    pub fn builtin() -> Self {
        let mut lexicon = Self::new();
        for (topic, terms) in BUILTIN_TOPICS {
            lexicon.add_topic(*topic, terms.iter().copied());
        }
        lexicon
    }

    /// Parse a lexicon from JSON of the form `{"topic": ["term", ...]}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut lexicon = Self::new();
        for (topic, terms) in raw {
            lexicon.add_topic(topic, terms);
        }
        Ok(lexicon)
    }

    /// Add terms to a topic, creating it if needed.
    pub fn add_topic<I, S>(&mut self, topic: impl AsRef<str>, terms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = normalize(topic.as_ref());
        if key.is_empty() {
            return;
        }
        let entry = self.topics.entry(key).or_default();
        for term in terms {
            let term = normalize(term.as_ref());
            if !term.is_empty() && !entry.contains(&term) {
                entry.push(term);
            }
        }
    }

    /// Builder form of [`Lexicon::add_topic`].
    pub fn with_topic<I, S>(mut self, topic: impl AsRef<str>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_topic(topic, terms);
        self
    }

    /// Merge another lexicon into this one.
    pub fn extend(&mut self, other: Lexicon) {
        for (topic, terms) in other.topics {
            self.add_topic(topic, terms);
        }
    }

    /// Terms related to `topic`, empty if the topic is unknown.
    pub fn related(&self, topic: &str) -> &[String] {
        self.topics
            .get(&normalize(topic))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Topics whose name appears (as whole words) in `text`, alphabetically.
    pub fn topics_in(&self, text: &str) -> Vec<&str> {
        let haystack = format!(" {} ", normalize(text));
        self.topics
            .keys()
            .filter(|topic| haystack.contains(&format!(" {topic} ")))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

fn normalize(phrase: &str) -> String {
    words(phrase).join(" ")
}
