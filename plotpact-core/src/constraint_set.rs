//! The ordered collection of constraints scoped to one story.

use crate::constraint::{Constraint, ConstraintDraft, ConstraintId, ConstraintType};
use crate::turn::TurnId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

/// Errors from constraint set operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintSetError {
    #[error("an equivalent {} constraint is already active: {description}", kind.name())]
    Duplicate {
        description: String,
        kind: ConstraintType,
        existing: Option<ConstraintId>,
    },

    #[error("no active constraint with id {0}")]
    NotFound(ConstraintId),
}

/// Constraints of one story, in insertion order.
///
/// Retired constraints stay in the set as history. Ids come from a counter
/// that only moves forward, so an id is never handed out twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
    next_id: u32,
}

impl ConstraintSet {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new active constraint introduced by `origin_turn`.
    pub fn add(
        &mut self,
        draft: ConstraintDraft,
        origin_turn: TurnId,
    ) -> Result<ConstraintId, ConstraintSetError> {
        self.check_draft(&draft)?;

        self.next_id += 1;
        let id = ConstraintId(self.next_id);
        let constraint = Constraint::from_draft(id, draft, origin_turn);

        info!(
            constraint = %id,
            origin = %origin_turn,
            description = %constraint.description,
            "constraint added"
        );

        self.constraints.push(constraint);
        Ok(id)
    }

    /// Check that a draft would not collide with an active constraint.
    pub fn check_draft(&self, draft: &ConstraintDraft) -> Result<(), ConstraintSetError> {
        let key = draft.equivalence_key();
        match self
            .constraints
            .iter()
            .find(|c| c.is_active() && c.equivalence_key() == key)
        {
            Some(existing) => Err(ConstraintSetError::Duplicate {
                description: draft.description.clone(),
                kind: draft.kind,
                existing: Some(existing.id),
            }),
            None => Ok(()),
        }
    }

    /// Check a batch of drafts against the active set and against each other.
    pub fn check_drafts(&self, drafts: &[ConstraintDraft]) -> Result<(), ConstraintSetError> {
        let mut seen = HashSet::new();
        for draft in drafts {
            self.check_draft(draft)?;
            if !seen.insert(draft.equivalence_key()) {
                return Err(ConstraintSetError::Duplicate {
                    description: draft.description.clone(),
                    kind: draft.kind,
                    existing: None,
                });
            }
        }
        Ok(())
    }

    /// Mark a constraint retired.
    ///
    /// Fails for unknown ids and for constraints that are already retired.
    pub fn retire(&mut self, id: ConstraintId) -> Result<(), ConstraintSetError> {
        let constraint = self
            .constraints
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ConstraintSetError::NotFound(id))?;

        if !constraint.retire() {
            return Err(ConstraintSetError::NotFound(id));
        }

        info!(constraint = %id, "constraint retired");
        Ok(())
    }

    /// All active constraints, in insertion order.
    pub fn active_constraints(&self) -> Vec<&Constraint> {
        self.constraints.iter().filter(|c| c.is_active()).collect()
    }

    /// All retired constraints, in insertion order.
    pub fn retired(&self) -> Vec<&Constraint> {
        self.constraints.iter().filter(|c| !c.is_active()).collect()
    }

    /// Every constraint ever added, active or retired.
    pub fn all(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Get a constraint by id, whatever its status.
    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    /// Total number of constraints, retired included.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of active constraints.
    pub fn active_count(&self) -> usize {
        self.constraints.iter().filter(|c| c.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintFunction, ConstraintStatus, Flexibility};

    fn draft(description: &str, kind: ConstraintType) -> ConstraintDraft {
        ConstraintDraft::new(
            description,
            Flexibility::Fixed,
            ConstraintFunction::Exclusionary,
            kind,
        )
    }

    #[test]
    fn test_set_creation() {
        let set = ConstraintSet::new();
        assert!(set.is_empty());
        assert!(set.active_constraints().is_empty());
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut set = ConstraintSet::new();
        let a = set.add(draft("No dragons", ConstraintType::Anchor), TurnId(1)).unwrap();
        let b = set.add(draft("Stay in the village", ConstraintType::Channel), TurnId(3)).unwrap();

        assert_eq!(a, ConstraintId(1));
        assert_eq!(b, ConstraintId(2));
        assert_eq!(set.get(b).unwrap().origin_turn, TurnId(3));
    }

    #[test]
    fn test_duplicate_is_case_and_whitespace_insensitive() {
        let mut set = ConstraintSet::new();
        set.add(draft("John is afraid of deep water", ConstraintType::Anchor), TurnId(1))
            .unwrap();

        let err = set
            .add(draft("JOHN is  afraid of deep   water", ConstraintType::Anchor), TurnId(3))
            .unwrap_err();
        assert!(matches!(
            err,
            ConstraintSetError::Duplicate { existing: Some(ConstraintId(1)), .. }
        ));

        // Same description, different type: not equivalent.
        assert!(set
            .add(draft("John is afraid of deep water", ConstraintType::Channel), TurnId(3))
            .is_ok());
    }

    #[test]
    fn test_retired_constraint_can_be_readded_with_new_id() {
        let mut set = ConstraintSet::new();
        let first = set.add(draft("No magic", ConstraintType::Channel), TurnId(1)).unwrap();
        set.retire(first).unwrap();

        let second = set.add(draft("No magic", ConstraintType::Channel), TurnId(5)).unwrap();
        assert_ne!(first, second);
        assert_eq!(set.len(), 2);
        assert_eq!(set.active_count(), 1);
        assert_eq!(set.get(first).unwrap().status, ConstraintStatus::Retired);
    }

    #[test]
    fn test_retire_twice_fails() {
        let mut set = ConstraintSet::new();
        let id = set.add(draft("No dragons", ConstraintType::Anchor), TurnId(1)).unwrap();

        assert!(set.retire(id).is_ok());
        assert_eq!(set.retire(id), Err(ConstraintSetError::NotFound(id)));
    }

    #[test]
    fn test_retire_unknown_fails() {
        let mut set = ConstraintSet::new();
        assert_eq!(
            set.retire(ConstraintId(42)),
            Err(ConstraintSetError::NotFound(ConstraintId(42)))
        );
    }

    #[test]
    fn test_active_constraints_keep_insertion_order() {
        let mut set = ConstraintSet::new();
        let a = set.add(draft("A", ConstraintType::Anchor), TurnId(1)).unwrap();
        let b = set.add(draft("B", ConstraintType::Anchor), TurnId(1)).unwrap();
        let c = set.add(draft("C", ConstraintType::Anchor), TurnId(1)).unwrap();
        set.retire(b).unwrap();

        let ids: Vec<_> = set.active_constraints().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(set.retired().len(), 1);

        // Reading twice without mutation gives the same answer.
        assert_eq!(set.active_constraints(), set.active_constraints());
    }

    #[test]
    fn test_check_drafts_rejects_batch_duplicates() {
        let set = ConstraintSet::new();
        let batch = vec![
            draft("No dragons", ConstraintType::Anchor),
            draft("no  Dragons", ConstraintType::Anchor),
        ];
        assert!(matches!(
            set.check_drafts(&batch),
            Err(ConstraintSetError::Duplicate { existing: None, .. })
        ));
    }
}
