//! Word-level text normalization shared by the matchers.
//!
//! All matching happens on whole words. "sea" must not match inside
//! "season", and multi-word phrases such as "deep water" match as a
//! contiguous run of words.

/// A range of word positions in a [`Passage`], end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// How closely a phrase has to match the words of a passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literalness {
    /// Word-for-word, after lowercasing.
    Exact,
    /// Word-for-word after stripping common inflections ("dragons" ~ "dragon").
    Near,
}

/// A piece of text split into lowercase words.
#[derive(Debug, Clone)]
pub struct Passage {
    words: Vec<String>,
    stems: Vec<String>,
}

impl Passage {
    pub fn new(text: &str) -> Self {
        let words = words(text);
        let stems = words.iter().map(|w| stem(w)).collect();
        Self { words, stems }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Every place `phrase` occurs, in order.
    pub fn find(&self, phrase: &str, mode: Literalness) -> Vec<Span> {
        let needle = words(phrase);
        if needle.is_empty() || needle.len() > self.words.len() {
            return Vec::new();
        }

        let (haystack, needle) = match mode {
            Literalness::Exact => (&self.words, needle),
            Literalness::Near => (&self.stems, needle.iter().map(|w| stem(w)).collect()),
        };

        (0..=haystack.len() - needle.len())
            .filter(|&start| haystack[start..start + needle.len()] == needle[..])
            .map(|start| Span {
                start,
                end: start + needle.len(),
            })
            .collect()
    }

    /// The words of a span joined with single spaces.
    pub fn slice(&self, span: Span) -> String {
        self.words[span.start..span.end].join(" ")
    }

    /// Up to `window` words immediately before `span`.
    pub fn preceding(&self, span: Span, window: usize) -> &[String] {
        let start = span.start.saturating_sub(window);
        &self.words[start..span.start]
    }
}

/// Split text into lowercase words.
///
/// A word is a run of letters and digits; an apostrophe between two
/// letters stays inside the word so "didn't" is one token. Curly
/// apostrophes are folded to the straight one first.
pub fn words(text: &str) -> Vec<String> {
    let chars: Vec<char> = text
        .chars()
        .map(|c| if c == '\u{2019}' || c == '\u{2018}' { '\'' } else { c })
        .collect();

    let mut out = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if c == '\''
            && !current.is_empty()
            && chars.get(i + 1).is_some_and(|n| n.is_alphabetic())
        {
            current.push('\'');
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Strip a common English inflection.
///
/// Deliberately crude: it only has to make "dragons"/"dragon" and
/// "explored"/"explore" land on the same key, not produce linguistic roots.
pub fn stem(word: &str) -> String {
    let word = word.strip_suffix("'s").unwrap_or(word);
    let len = word.chars().count();

    for (suffix, min_len) in [("ing", 6), ("ed", 5), ("es", 5), ("s", 4)] {
        if len >= min_len && word.ends_with(suffix) && !word.ends_with("ss") {
            return word[..word.len() - suffix.len()].to_string();
        }
    }
    word.to_string()
}

/// Phrases wrapped in straight or curly double/single quotes.
///
/// Single quotes only count when they do not look like apostrophes, i.e. the
/// opening quote follows whitespace or starts the text.
pub fn quoted_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let close = match chars[i] {
            '"' => Some('"'),
            '\u{201C}' => Some('\u{201D}'),
            '\'' if i == 0 || chars[i - 1].is_whitespace() => Some('\''),
            '\u{2018}' => Some('\u{2019}'),
            _ => None,
        };

        if let Some(close) = close {
            if let Some(offset) = chars[i + 1..].iter().position(|&c| c == close) {
                let phrase: String = chars[i + 1..i + 1 + offset].iter().collect();
                let phrase = phrase.trim();
                if !phrase.is_empty() {
                    phrases.push(phrase.to_string());
                }
                i += offset + 2;
                continue;
            }
        }
        i += 1;
    }
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_lowercase_and_strip_punctuation() {
        assert_eq!(
            words("One day, he was swimming in Lake Ontario!"),
            vec!["one", "day", "he", "was", "swimming", "in", "lake", "ontario"]
        );
    }

    #[test]
    fn test_words_keep_inner_apostrophes() {
        assert_eq!(words("He didn\u{2019}t 'swim'"), vec!["he", "didn't", "swim"]);
    }

    #[test]
    fn test_find_respects_word_boundaries() {
        let passage = Passage::new("The season changed by the sea.");
        assert_eq!(passage.find("sea", Literalness::Exact), vec![Span { start: 5, end: 6 }]);
        assert!(Passage::new("Seasons passed").find("sea", Literalness::Near).is_empty());
    }

    #[test]
    fn test_find_multi_word_phrase() {
        let passage = Passage::new("His fear of deep water was old; deep water still haunted him.");
        let spans = passage.find("Deep Water", Literalness::Exact);
        assert_eq!(spans.len(), 2);
        assert_eq!(passage.slice(spans[0]), "deep water");
    }

    #[test]
    fn test_near_literal_matches_inflections() {
        let passage = Passage::new("Two dragons circled the tower");
        assert!(passage.find("dragon", Literalness::Exact).is_empty());
        assert_eq!(passage.find("dragon", Literalness::Near).len(), 1);
    }

    #[test]
    fn test_stem() {
        assert_eq!(stem("dragons"), "dragon");
        assert_eq!(stem("explored"), "explor");
        assert_eq!(stem("explore"), "explore");
        assert_eq!(stem("glass"), "glass");
        assert_eq!(stem("john's"), "john");
        assert_eq!(stem("sing"), "sing");
    }

    #[test]
    fn test_preceding_window() {
        let passage = Passage::new("he never once went near the ocean");
        let span = passage.find("ocean", Literalness::Exact)[0];
        assert_eq!(passage.preceding(span, 3), ["went", "near", "the"]);
        assert_eq!(passage.preceding(span, 10).len(), 6);
    }

    #[test]
    fn test_quoted_phrases() {
        assert_eq!(quoted_phrases("Never use the word \"ocean\""), vec!["ocean"]);
        assert_eq!(
            quoted_phrases("Mention 'the brass dial' and \u{201C}the note\u{201D}"),
            vec!["the brass dial", "the note"]
        );
        assert!(quoted_phrases("John's boat isn't safe").is_empty());
    }
}
