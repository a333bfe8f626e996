//! Story turns and the append-only transcript entries they become.

use crate::constraint::ConstraintId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-story turn identifier.
///
/// Rejected attempts draw from the same counter as committed turns, so an id
/// identifies one submission for the lifetime of the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u32);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Who wrote a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    Human,
    Ai,
}

impl AuthorRole {
    /// The author who writes after this one.
    pub fn other(&self) -> AuthorRole {
        match self {
            AuthorRole::Human => AuthorRole::Ai,
            AuthorRole::Ai => AuthorRole::Human,
        }
    }

    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            AuthorRole::Human => "Human",
            AuthorRole::Ai => "AI",
        }
    }
}

impl std::fmt::Display for AuthorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The recorded outcome of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnVerdict {
    /// Committed; every active constraint held.
    Accepted,
    /// Committed and introduced at least one new constraint.
    AcceptedWithConstraint,
    /// Committed, but broke one or more flexible constraints. The opposing
    /// author may contest it.
    AcceptedWithViolationFlagged,
    /// Broke a fixed constraint; kept only in the rejection log.
    Rejected,
}

impl TurnVerdict {
    /// Whether the turn made it into the transcript.
    pub fn is_committed(&self) -> bool {
        !matches!(self, TurnVerdict::Rejected)
    }

    /// Get the display label shown next to a turn.
    pub fn label(&self) -> &'static str {
        match self {
            TurnVerdict::Accepted => "Accepted",
            TurnVerdict::AcceptedWithConstraint => "Accepted with constraint enforced",
            TurnVerdict::AcceptedWithViolationFlagged => "Accepted, flagged for review",
            TurnVerdict::Rejected => "Rejected",
        }
    }
}

/// One author's contribution to the story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub author: AuthorRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub verdict: TurnVerdict,
    /// Constraints this turn added to the story.
    pub constraints_introduced: Vec<ConstraintId>,
    /// Constraints the turn was evaluated against.
    pub constraints_checked: Vec<ConstraintId>,
    /// Constraints the turn violated: flexible ones on a flagged commit,
    /// fixed and flexible ones on a rejection.
    #[serde(default)]
    pub violations: Vec<ConstraintId>,
}

impl Turn {
    /// Whether this turn is open to contest by the other author.
    pub fn is_flagged(&self) -> bool {
        self.verdict == TurnVerdict::AcceptedWithViolationFlagged
    }
}
