//! Turn evaluation against the active constraint set.
//!
//! The evaluator is a pure function of the proposed text and the constraints
//! it is given: it never touches the story. Every constraint gets its own
//! result, and the aggregate verdict follows from them:
//!
//! | any fixed violated | any flexible violated | verdict                          |
//! |--------------------|-----------------------|----------------------------------|
//! | yes                | -                     | `Rejected`                       |
//! | no                 | yes                   | `AcceptedWithViolationFlagged`   |
//! | no                 | no                    | `Accepted`                       |

mod lexicon;
mod matcher;
mod text;

pub use lexicon::Lexicon;
pub use matcher::{KeywordMatcher, Match, Matcher, DEFAULT_NEGATION_CUES};
pub use text::{Literalness, Passage, Span};

use crate::constraint::{
    Constraint, ConstraintFunction, ConstraintId, ConstraintType, Flexibility,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Aggregate classification of a proposed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Accepted,
    AcceptedWithViolationFlagged,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verdict::Rejected)
    }
}

/// Result for a single constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOutcome {
    Satisfied,
    Violated,
    /// The constraint's subject does not come up, and it does not demand that it should.
    NotApplicable,
}

/// How one constraint fared against a proposed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintCheck {
    pub constraint: ConstraintId,
    pub flexibility: Flexibility,
    pub outcome: CheckOutcome,
    /// Terms found in the text that decided the outcome.
    pub evidence: Vec<String>,
}

impl ConstraintCheck {
    pub fn is_violated(&self) -> bool {
        self.outcome == CheckOutcome::Violated
    }
}

/// The evaluator's full answer for one proposed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// One entry per evaluated constraint, in insertion order.
    pub checks: Vec<ConstraintCheck>,
}

impl Evaluation {
    /// Every violated constraint: fixed ones first, each group in insertion order.
    pub fn violated(&self) -> Vec<ConstraintId> {
        let mut ids = self.violated_fixed();
        ids.extend(self.flagged());
        ids
    }

    /// Violated fixed constraints, in insertion order.
    pub fn violated_fixed(&self) -> Vec<ConstraintId> {
        self.violated_with(Flexibility::Fixed)
    }

    /// Violated flexible constraints, in insertion order.
    pub fn flagged(&self) -> Vec<ConstraintId> {
        self.violated_with(Flexibility::Flexible)
    }

    /// Every constraint the turn was evaluated against.
    pub fn checked_ids(&self) -> Vec<ConstraintId> {
        self.checks.iter().map(|c| c.constraint).collect()
    }

    /// Look up the check for one constraint.
    pub fn check_for(&self, id: ConstraintId) -> Option<&ConstraintCheck> {
        self.checks.iter().find(|c| c.constraint == id)
    }

    fn violated_with(&self, flexibility: Flexibility) -> Vec<ConstraintId> {
        self.checks
            .iter()
            .filter(|c| c.is_violated() && c.flexibility == flexibility)
            .map(|c| c.constraint)
            .collect()
    }
}

/// Configuration for the default keyword matcher.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// How many words before a match are scanned for a negation cue.
    pub negation_window: usize,
    /// Words that mark following content as avoided.
    pub negation_cues: Vec<String>,
    /// Topic table for thematic matching.
    pub lexicon: Lexicon,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            negation_window: 3,
            negation_cues: DEFAULT_NEGATION_CUES.iter().map(|c| c.to_string()).collect(),
            lexicon: Lexicon::builtin(),
        }
    }
}

impl EvaluatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the negation window.
    pub fn with_negation_window(mut self, window: usize) -> Self {
        self.negation_window = window;
        self
    }

    /// Replace the negation cues.
    pub fn with_negation_cues<I, S>(mut self, cues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.negation_cues = cues.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the lexicon.
    pub fn with_lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    /// Add caller-supplied topics on top of the current lexicon.
    pub fn with_extra_topics(mut self, lexicon: Lexicon) -> Self {
        self.lexicon.extend(lexicon);
        self
    }
}

/// Decides whether proposed text is compatible with a set of constraints.
#[derive(Debug, Clone)]
pub struct TurnEvaluator {
    matcher: Arc<dyn Matcher>,
}

impl Default for TurnEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}

impl TurnEvaluator {
    /// Create an evaluator using the keyword matcher.
    pub fn new(config: EvaluatorConfig) -> Self {
        let matcher = KeywordMatcher::new(
            config.lexicon,
            &config.negation_cues,
            config.negation_window,
        );
        Self::with_matcher(Arc::new(matcher))
    }

    /// Create an evaluator with a custom matcher.
    pub fn with_matcher(matcher: Arc<dyn Matcher>) -> Self {
        Self { matcher }
    }

    /// Evaluate `text` against `constraints`. Retired constraints are skipped.
    pub fn evaluate<'a, I>(&self, text: &str, constraints: I) -> Evaluation
    where
        I: IntoIterator<Item = &'a Constraint>,
    {
        let passage = Passage::new(text);
        let checks: Vec<ConstraintCheck> = constraints
            .into_iter()
            .filter(|c| c.is_active())
            .map(|c| self.check(&passage, c))
            .collect();

        let fixed_broken = checks
            .iter()
            .any(|c| c.is_violated() && c.flexibility == Flexibility::Fixed);
        let flexible_broken = checks
            .iter()
            .any(|c| c.is_violated() && c.flexibility == Flexibility::Flexible);

        let verdict = if fixed_broken {
            Verdict::Rejected
        } else if flexible_broken {
            Verdict::AcceptedWithViolationFlagged
        } else {
            Verdict::Accepted
        };

        Evaluation { verdict, checks }
    }

    /// Evaluate a single constraint.
    pub fn check(&self, passage: &Passage, constraint: &Constraint) -> ConstraintCheck {
        let triggers = self.matcher.derive_triggers(constraint);

        let (outcome, evidence) = match constraint.function {
            ConstraintFunction::Exclusionary => self.check_exclusionary(passage, constraint, &triggers),
            ConstraintFunction::Focusing => self.check_focusing(passage, constraint, &triggers),
        };

        debug!(
            constraint = %constraint.id,
            ?outcome,
            ?evidence,
            "constraint checked"
        );

        ConstraintCheck {
            constraint: constraint.id,
            flexibility: constraint.flexibility,
            outcome,
            evidence,
        }
    }

    fn check_exclusionary(
        &self,
        passage: &Passage,
        constraint: &Constraint,
        triggers: &[String],
    ) -> (CheckOutcome, Vec<String>) {
        let found: Vec<Match> = triggers
            .iter()
            .flat_map(|t| match constraint.kind {
                ConstraintType::Anchor => {
                    self.matcher.literal_matches(passage, t, Literalness::Exact)
                }
                ConstraintType::Channel => self.matcher.topic_matches(passage, t),
            })
            .filter(|m| {
                constraint.kind != ConstraintType::Anchor
                    || !self.matcher.is_stance_object(passage, m)
            })
            .collect();

        if found.is_empty() {
            return (CheckOutcome::NotApplicable, Vec::new());
        }

        // A fixed rule is broken by any mention. A flexible one tolerates
        // mentions framed as avoided, but a single plain mention breaks it.
        let offending: Vec<&Match> = match constraint.flexibility {
            Flexibility::Fixed => found.iter().collect(),
            Flexibility::Flexible => found
                .iter()
                .filter(|m| !self.matcher.is_negated(passage, m))
                .collect(),
        };

        if offending.is_empty() {
            (CheckOutcome::Satisfied, evidence(found.iter()))
        } else {
            (CheckOutcome::Violated, evidence(offending.into_iter()))
        }
    }

    fn check_focusing(
        &self,
        passage: &Passage,
        constraint: &Constraint,
        triggers: &[String],
    ) -> (CheckOutcome, Vec<String>) {
        let found: Vec<Match> = triggers
            .iter()
            .flat_map(|t| match constraint.flexibility {
                Flexibility::Fixed => self.matcher.literal_matches(passage, t, Literalness::Near),
                Flexibility::Flexible => self.matcher.topic_matches(passage, t),
            })
            .collect();

        if found.is_empty() {
            (CheckOutcome::Violated, Vec::new())
        } else {
            (CheckOutcome::Satisfied, evidence(found.iter()))
        }
    }
}

/// Distinct matched terms, in order of first appearance.
fn evidence<'a>(matches: impl Iterator<Item = &'a Match>) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for m in matches {
        if !terms.contains(&m.term) {
            terms.push(m.term.clone());
        }
    }
    terms
}
