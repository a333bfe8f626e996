//! AI collaborators that write story turns.
//!
//! An [`AiAuthor`] receives the story so far and the active constraints and
//! answers with a [`Candidate`]: one sentence plus any constraints it wants
//! to place on the human. It has no say in whether the sentence is accepted;
//! that is decided by the negotiation loop like any other turn.

mod anthropic;

pub use anthropic::{AuthorConfig, ClaudeAuthor};

use crate::constraint::{Constraint, ConstraintDraft};
use crate::negotiation::Negotiation;
use crate::turn::Turn;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from AI authors.
#[derive(Debug, Error)]
pub enum AuthorError {
    #[error("API error: {0}")]
    Api(#[from] claude::Error),

    #[error("Failed to parse author response: {0}")]
    Parse(String),

    #[error("Author has no more turns to offer")]
    Exhausted,
}

/// A sentence the AI author wants to add, with its constraint proposals.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub constraints: Vec<ConstraintDraft>,
}

impl Candidate {
    /// A candidate with no constraint proposals.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            constraints: Vec::new(),
        }
    }

    /// Add a constraint proposal.
    pub fn with_constraint(mut self, draft: ConstraintDraft) -> Self {
        self.constraints.push(draft);
        self
    }
}

/// A previous attempt that was rejected, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub rejected_text: String,
    pub violated: Vec<Constraint>,
}

/// Everything an author sees when asked for a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorContext {
    pub title: String,
    /// Committed turns, oldest first.
    pub transcript: Vec<Turn>,
    /// Constraints the next sentence is judged against.
    pub constraints: Vec<Constraint>,
    /// Set when the last attempt was rejected.
    pub revision: Option<Revision>,
    /// 1 for the first attempt of this turn.
    pub attempt: u32,
}

impl AuthorContext {
    /// Capture the current state of a story.
    pub fn from_negotiation(title: impl Into<String>, negotiation: &Negotiation) -> Self {
        Self {
            title: title.into(),
            transcript: negotiation.transcript().to_vec(),
            constraints: negotiation
                .active_constraints()
                .into_iter()
                .cloned()
                .collect(),
            revision: None,
            attempt: 1,
        }
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// The committed story as running text.
    pub fn story_text(&self) -> String {
        self.transcript
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Something that can write the AI's side of the story.
#[async_trait]
pub trait AiAuthor: Send + Sync {
    /// Propose the next sentence.
    async fn propose(&self, context: &AuthorContext) -> Result<Candidate, AuthorError>;

    /// Name shown in logs.
    fn name(&self) -> &str;
}
