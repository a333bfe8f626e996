//! Narrative constraints.
//!
//! A constraint is a rule one author places on the turns that follow:
//! "John is afraid of deep water", "never use the word 'ocean'",
//! "the story must stay in the village". Its three classifiers form a
//! closed vocabulary:
//!
//! - [`Flexibility`]: how strictly the rule is enforced
//! - [`ConstraintFunction`]: whether it forbids or requires content
//! - [`ConstraintType`]: whether it names a broad theme or a concrete trigger
//!
//! Classifiers are fixed at creation. The only mutation a constraint ever
//! sees is retirement.

use crate::turn::TurnId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a constraint within one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub u32);

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// How strictly a constraint is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flexibility {
    /// Must be satisfied literally. Violations reject the turn.
    Fixed,
    /// May be bent or reinterpreted. Violations are flagged, not rejected.
    Flexible,
}

impl Flexibility {
    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            Flexibility::Fixed => "Fixed",
            Flexibility::Flexible => "Flexible",
        }
    }

    /// Explanation shown to authors next to the badge.
    pub fn explanation(&self) -> &'static str {
        match self {
            Flexibility::Fixed => {
                "This constraint must be strictly followed. It sets a hard rule that defines the creative boundaries."
            }
            Flexibility::Flexible => {
                "This constraint is more like a suggestion. You can reinterpret or bend it if needed to serve your story."
            }
        }
    }
}

/// Whether a constraint forbids or requires content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintFunction {
    Exclusionary,
    Focusing,
}

impl ConstraintFunction {
    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintFunction::Exclusionary => "Exclusionary",
            ConstraintFunction::Focusing => "Focusing",
        }
    }

    /// Explanation shown to authors next to the badge.
    pub fn explanation(&self) -> &'static str {
        match self {
            ConstraintFunction::Exclusionary => {
                "Specifies what must not appear in the story. These remove common ideas to push you in new, less obvious directions."
            }
            ConstraintFunction::Focusing => {
                "Specifies what must be included in the story. These guide your creativity by pointing you toward particular elements or themes."
            }
        }
    }
}

/// Granularity of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    /// A broad theme, matched topically.
    Channel,
    /// A specific item, phrase or concept, matched literally.
    Anchor,
}

impl ConstraintType {
    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintType::Channel => "channel",
            ConstraintType::Anchor => "anchor",
        }
    }

    /// Explanation shown to authors next to the badge.
    pub fn explanation(&self) -> &'static str {
        match self {
            ConstraintType::Channel => {
                "A broad theme or category that shapes story direction. Channels give freedom while guiding narrative style or topic."
            }
            ConstraintType::Anchor => {
                "A specific item, phrase, or concept that acts as a creative trigger. Anchors narrow focus and inspire concrete ideas."
            }
        }
    }
}

/// Lifecycle status of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintStatus {
    Active,
    Retired,
}

impl ConstraintStatus {
    /// Check if this constraint still takes part in evaluation.
    pub fn is_active(&self) -> bool {
        matches!(self, ConstraintStatus::Active)
    }
}

/// A proposed constraint, before the story assigns it an id.
///
/// This is the shape the AI author emits alongside its sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDraft {
    pub description: String,
    #[serde(default)]
    pub reason: String,
    pub flexibility: Flexibility,
    pub function: ConstraintFunction,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    /// Explicit trigger terms. Empty means "derive from the description".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
}

impl ConstraintDraft {
    /// Create a new draft with no reason and derived triggers.
    pub fn new(
        description: impl Into<String>,
        flexibility: Flexibility,
        function: ConstraintFunction,
        kind: ConstraintType,
    ) -> Self {
        Self {
            description: description.into(),
            reason: String::new(),
            flexibility,
            function,
            kind,
            triggers: Vec::new(),
        }
    }

    /// Set the narrative justification.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Name the trigger terms explicitly instead of deriving them.
    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    /// Key used to detect an equivalent constraint: the whitespace-collapsed,
    /// lowercased description together with the type.
    pub fn equivalence_key(&self) -> (String, ConstraintType) {
        (normalize_description(&self.description), self.kind)
    }
}

/// A rule attached to a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub description: String,
    pub reason: String,
    pub flexibility: Flexibility,
    pub function: ConstraintFunction,
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
    /// The turn that introduced this constraint.
    pub origin_turn: TurnId,
    pub status: ConstraintStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,
}

impl Constraint {
    /// Create an active constraint from a draft.
    pub fn from_draft(id: ConstraintId, draft: ConstraintDraft, origin_turn: TurnId) -> Self {
        Self {
            id,
            description: draft.description.trim().to_string(),
            reason: draft.reason,
            flexibility: draft.flexibility,
            function: draft.function,
            kind: draft.kind,
            triggers: draft.triggers,
            origin_turn,
            status: ConstraintStatus::Active,
            created_at: Utc::now(),
            retired_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_fixed(&self) -> bool {
        self.flexibility == Flexibility::Fixed
    }

    /// Same key as [`ConstraintDraft::equivalence_key`].
    pub fn equivalence_key(&self) -> (String, ConstraintType) {
        (normalize_description(&self.description), self.kind)
    }

    /// One-line summary with badges, e.g.
    /// `C1 John is afraid of deep water [Fixed, Exclusionary, anchor]`.
    pub fn summary(&self) -> String {
        format!(
            "{} {} [{}, {}, {}]",
            self.id,
            self.description,
            self.flexibility.name(),
            self.function.name(),
            self.kind.name()
        )
    }

    /// Retire the constraint. Returns false if it was already retired.
    pub(crate) fn retire(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ConstraintStatus::Retired;
        self.retired_at = Some(Utc::now());
        true
    }
}

/// Lowercase and collapse runs of whitespace to a single space.
pub fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deep_water() -> ConstraintDraft {
        ConstraintDraft::new(
            "John is afraid of deep water",
            Flexibility::Fixed,
            ConstraintFunction::Exclusionary,
            ConstraintType::Anchor,
        )
        .with_reason("He nearly drowned as a child")
    }

    #[test]
    fn test_constraint_from_draft() {
        let constraint = Constraint::from_draft(ConstraintId(1), deep_water(), TurnId(2));

        assert_eq!(constraint.id, ConstraintId(1));
        assert_eq!(constraint.origin_turn, TurnId(2));
        assert!(constraint.is_active());
        assert!(constraint.is_fixed());
        assert!(constraint.retired_at.is_none());
    }

    #[test]
    fn test_retire_only_once() {
        let mut constraint = Constraint::from_draft(ConstraintId(1), deep_water(), TurnId(2));

        assert!(constraint.retire());
        assert_eq!(constraint.status, ConstraintStatus::Retired);
        assert!(constraint.retired_at.is_some());
        assert!(!constraint.retire());
    }

    #[test]
    fn test_equivalence_key_normalizes() {
        let a = deep_water();
        let b = ConstraintDraft::new(
            "  john IS afraid\tof   deep water ",
            Flexibility::Flexible,
            ConstraintFunction::Focusing,
            ConstraintType::Anchor,
        );
        assert_eq!(a.equivalence_key(), b.equivalence_key());

        let channel = ConstraintDraft { kind: ConstraintType::Channel, ..a.clone() };
        assert_ne!(a.equivalence_key(), channel.equivalence_key());
    }

    #[test]
    fn test_draft_wire_format() {
        let json = r#"{
            "description": "John is afraid of deep water",
            "reason": "Childhood accident",
            "flexibility": "fixed",
            "function": "exclusionary",
            "type": "anchor"
        }"#;

        let draft: ConstraintDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.kind, ConstraintType::Anchor);
        assert_eq!(draft.flexibility, Flexibility::Fixed);
        assert!(draft.triggers.is_empty());

        let back = serde_json::to_value(&draft).unwrap();
        assert_eq!(back["type"], "anchor");
        assert!(back.get("triggers").is_none());
    }

    #[test]
    fn test_summary_lists_badges() {
        let constraint = Constraint::from_draft(ConstraintId(3), deep_water(), TurnId(1));
        assert_eq!(
            constraint.summary(),
            "C3 John is afraid of deep water [Fixed, Exclusionary, anchor]"
        );
    }
}
