//! The negotiation loop: alternating human/AI turns over one story.
//!
//! ```text
//!            submit                      accepted / flagged
//! Awaiting(author) ──────▶ EvaluatingTurn ───────────────────▶ Awaiting(other author)
//!        ▲                   │      ▲
//!        │                   │      │ same author resubmits
//!        │          rejected ▼      │
//!        │              AwaitingRevision
//!        │
//!  end_story() from any state ──▶ Completed
//! ```
//!
//! Submission is two-phase. [`Negotiation::propose`] moves the story into
//! `EvaluatingTurn` and freezes the constraints the turn will be judged
//! against; [`Negotiation::resolve`] evaluates and applies the verdict.
//! While a turn is in flight every other submission gets
//! [`NegotiationError::Busy`]. [`Negotiation::submit_turn`] does both steps
//! for callers that do not need to observe the in-flight state.
//!
//! The loop is the only writer of the constraint set and transcript.

use crate::constraint::{Constraint, ConstraintDraft, ConstraintId, ConstraintType};
use crate::constraint_set::{ConstraintSet, ConstraintSetError};
use crate::evaluator::{Evaluation, TurnEvaluator, Verdict};
use crate::turn::{AuthorRole, Turn, TurnId, TurnVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from negotiation operations.
///
/// A rejected turn is not an error: it comes back as an `Ok` outcome with
/// [`Verdict::Rejected`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("out of turn: waiting for the {expected} author, got a submission from the {submitted} author")]
    OutOfTurn {
        expected: AuthorRole,
        submitted: AuthorRole,
    },

    #[error("busy: another turn is being evaluated")]
    Busy,

    #[error("an equivalent {} constraint is already active: {description}", kind.name())]
    DuplicateConstraint {
        description: String,
        kind: ConstraintType,
    },

    #[error("no active constraint with id {0}")]
    NotFound(ConstraintId),

    #[error("the story has been completed")]
    StoryCompleted,

    #[error("{0} turns may not propose constraints")]
    ProposalsNotPermitted(AuthorRole),

    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("turn text is empty")]
    EmptyTurn,

    #[error("no turn is waiting to be evaluated")]
    NothingPending,
}

impl From<ConstraintSetError> for NegotiationError {
    fn from(err: ConstraintSetError) -> Self {
        match err {
            ConstraintSetError::Duplicate {
                description, kind, ..
            } => NegotiationError::DuplicateConstraint { description, kind },
            ConstraintSetError::NotFound(id) => NegotiationError::NotFound(id),
        }
    }
}

/// Observable state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationState {
    AwaitingHumanTurn,
    AwaitingAiTurn,
    EvaluatingTurn,
    AwaitingRevision,
    Completed,
}

/// Configuration for a negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Who writes the first sentence.
    pub opening_author: AuthorRole,
    /// Whether human turns may introduce constraints too.
    pub human_may_propose: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            opening_author: AuthorRole::Human,
            human_may_propose: false,
        }
    }
}

impl NegotiationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set who writes the first sentence.
    pub fn with_opening_author(mut self, author: AuthorRole) -> Self {
        self.opening_author = author;
        self
    }

    /// Allow human turns to propose constraints.
    pub fn with_human_proposals(mut self, allowed: bool) -> Self {
        self.human_may_propose = allowed;
        self
    }
}

/// A submitted turn that has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTurn {
    pub id: TurnId,
    pub author: AuthorRole,
    pub text: String,
    pub drafts: Vec<ConstraintDraft>,
    pub submitted_at: DateTime<Utc>,
    /// Active constraints at submission time. Retiring a constraint while
    /// the turn is in flight does not change how it is judged.
    snapshot: Vec<Constraint>,
    /// Violations of the attempt this one revises, restored if the turn has
    /// to be bounced back before evaluation.
    revising: Option<Vec<ConstraintId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Phase {
    Awaiting(AuthorRole),
    Evaluating(PendingTurn),
    Revision {
        author: AuthorRole,
        violated: Vec<ConstraintId>,
    },
    Completed,
}

/// What happened to a submitted turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn_id: TurnId,
    pub author: AuthorRole,
    pub verdict: Verdict,
    /// The verdict recorded on the turn.
    pub turn_verdict: TurnVerdict,
    /// Every violated constraint, fixed ones first.
    pub violated: Vec<Constraint>,
    /// Constraints the turn added (empty unless it was committed).
    pub introduced: Vec<ConstraintId>,
    /// Active constraints after the verdict was applied.
    pub constraints: Vec<Constraint>,
    pub evaluation: Evaluation,
}

impl TurnOutcome {
    pub fn is_rejected(&self) -> bool {
        self.verdict == Verdict::Rejected
    }

    /// Descriptions of every violated constraint.
    pub fn violated_descriptions(&self) -> Vec<&str> {
        self.violated.iter().map(|c| c.description.as_str()).collect()
    }

    /// Feedback for the author, naming every broken rule.
    pub fn feedback(&self) -> String {
        match self.verdict {
            Verdict::Accepted if self.introduced.is_empty() => "Accepted".to_string(),
            Verdict::Accepted => "Accepted with constraint enforced".to_string(),
            Verdict::AcceptedWithViolationFlagged => format!(
                "Accepted, but bends: {}",
                self.violated_descriptions().join("; ")
            ),
            Verdict::Rejected => format!("Rejected as {}", self.violated_descriptions().join("; ")),
        }
    }
}

/// Serializable state of a negotiation, for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySnapshot {
    pub constraints: ConstraintSet,
    pub transcript: Vec<Turn>,
    pub rejections: Vec<Turn>,
    pub config: NegotiationConfig,
    phase: Phase,
    next_turn_id: u32,
}

impl StorySnapshot {
    pub fn state(&self) -> NegotiationState {
        phase_state(&self.phase)
    }
}

/// The negotiation loop for one story.
#[derive(Debug, Clone)]
pub struct Negotiation {
    constraints: ConstraintSet,
    transcript: Vec<Turn>,
    rejections: Vec<Turn>,
    phase: Phase,
    next_turn_id: u32,
    evaluator: TurnEvaluator,
    config: NegotiationConfig,
}

impl Default for Negotiation {
    fn default() -> Self {
        Self::new(NegotiationConfig::default(), TurnEvaluator::default())
    }
}

impl Negotiation {
    /// Start a new story with an empty constraint set.
    pub fn new(config: NegotiationConfig, evaluator: TurnEvaluator) -> Self {
        Self {
            constraints: ConstraintSet::new(),
            transcript: Vec::new(),
            rejections: Vec::new(),
            phase: Phase::Awaiting(config.opening_author),
            next_turn_id: 0,
            evaluator,
            config,
        }
    }

    /// Resume a story from a snapshot.
    pub fn restore(snapshot: StorySnapshot, evaluator: TurnEvaluator) -> Self {
        Self {
            constraints: snapshot.constraints,
            transcript: snapshot.transcript,
            rejections: snapshot.rejections,
            phase: snapshot.phase,
            next_turn_id: snapshot.next_turn_id,
            evaluator,
            config: snapshot.config,
        }
    }

    /// Capture the story state.
    pub fn snapshot(&self) -> StorySnapshot {
        StorySnapshot {
            constraints: self.constraints.clone(),
            transcript: self.transcript.clone(),
            rejections: self.rejections.clone(),
            config: self.config.clone(),
            phase: self.phase.clone(),
            next_turn_id: self.next_turn_id,
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit a turn and resolve it immediately.
    pub fn submit_turn(
        &mut self,
        author: AuthorRole,
        text: &str,
    ) -> Result<TurnOutcome, NegotiationError> {
        self.submit_turn_with_constraints(author, text, Vec::new())
    }

    /// Submit a turn that proposes new constraints, and resolve it.
    pub fn submit_turn_with_constraints(
        &mut self,
        author: AuthorRole,
        text: &str,
        drafts: Vec<ConstraintDraft>,
    ) -> Result<TurnOutcome, NegotiationError> {
        self.propose(author, text, drafts)?;
        self.resolve()
    }

    /// Hand a turn to the loop, moving it into `EvaluatingTurn`.
    ///
    /// Proposed constraints are checked for duplicates here, so a turn never
    /// commits half of its proposals.
    pub fn propose(
        &mut self,
        author: AuthorRole,
        text: &str,
        drafts: Vec<ConstraintDraft>,
    ) -> Result<TurnId, NegotiationError> {
        let (expected, revising) = match &self.phase {
            Phase::Completed => return Err(NegotiationError::StoryCompleted),
            Phase::Evaluating(pending) => {
                warn!(%author, in_flight = %pending.id, "submission refused while evaluating");
                return Err(NegotiationError::Busy);
            }
            Phase::Awaiting(expected) => (*expected, None),
            Phase::Revision {
                author: reviser,
                violated,
            } => (*reviser, Some(violated.clone())),
        };

        if author != expected {
            warn!(%author, %expected, "out-of-turn submission");
            return Err(NegotiationError::OutOfTurn {
                expected,
                submitted: author,
            });
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(NegotiationError::EmptyTurn);
        }

        if !drafts.is_empty() && author == AuthorRole::Human && !self.config.human_may_propose {
            return Err(NegotiationError::ProposalsNotPermitted(author));
        }
        if let Some(blank) = drafts.iter().find(|d| d.description.trim().is_empty()) {
            return Err(NegotiationError::InvalidConstraint(format!(
                "{} constraint has no description",
                blank.kind.name()
            )));
        }
        self.constraints.check_drafts(&drafts)?;

        self.next_turn_id += 1;
        let id = TurnId(self.next_turn_id);
        let snapshot = self
            .constraints
            .active_constraints()
            .into_iter()
            .cloned()
            .collect();

        self.phase = Phase::Evaluating(PendingTurn {
            id,
            author,
            text: text.to_string(),
            drafts,
            submitted_at: Utc::now(),
            snapshot,
            revising,
        });

        Ok(id)
    }

    /// Evaluate the in-flight turn and apply the verdict.
    pub fn resolve(&mut self) -> Result<TurnOutcome, NegotiationError> {
        let pending = match &self.phase {
            Phase::Evaluating(pending) => pending.clone(),
            Phase::Completed => return Err(NegotiationError::StoryCompleted),
            _ => return Err(NegotiationError::NothingPending),
        };

        let evaluation = self.evaluator.evaluate(&pending.text, &pending.snapshot);
        let violated: Vec<Constraint> = evaluation
            .violated()
            .into_iter()
            .filter_map(|id| pending.snapshot.iter().find(|c| c.id == id).cloned())
            .collect();

        if evaluation.verdict == Verdict::Rejected {
            return Ok(self.reject(pending, evaluation, violated));
        }

        // Nothing is committed unless every proposal still fits.
        if let Err(err) = self.constraints.check_drafts(&pending.drafts) {
            self.phase = resume_phase(&pending);
            return Err(err.into());
        }

        let mut introduced = Vec::with_capacity(pending.drafts.len());
        for draft in pending.drafts {
            introduced.push(self.constraints.add(draft, pending.id)?);
        }

        let flagged = evaluation.flagged();
        let turn_verdict = if !flagged.is_empty() {
            TurnVerdict::AcceptedWithViolationFlagged
        } else if !introduced.is_empty() {
            TurnVerdict::AcceptedWithConstraint
        } else {
            TurnVerdict::Accepted
        };

        let turn = Turn {
            id: pending.id,
            author: pending.author,
            text: pending.text,
            timestamp: Utc::now(),
            verdict: turn_verdict,
            constraints_introduced: introduced.clone(),
            constraints_checked: evaluation.checked_ids(),
            violations: flagged,
        };

        info!(
            turn = %turn.id,
            author = %turn.author,
            verdict = turn_verdict.label(),
            introduced = introduced.len(),
            "turn committed"
        );

        self.transcript.push(turn);
        self.phase = Phase::Awaiting(pending.author.other());

        Ok(TurnOutcome {
            turn_id: pending.id,
            author: pending.author,
            verdict: evaluation.verdict,
            turn_verdict,
            violated,
            introduced,
            constraints: self.active_snapshot(),
            evaluation,
        })
    }

    fn reject(
        &mut self,
        pending: PendingTurn,
        evaluation: Evaluation,
        violated: Vec<Constraint>,
    ) -> TurnOutcome {
        let violated_ids = evaluation.violated();

        warn!(
            turn = %pending.id,
            author = %pending.author,
            violated = ?violated_ids,
            "turn rejected"
        );

        self.rejections.push(Turn {
            id: pending.id,
            author: pending.author,
            text: pending.text,
            timestamp: Utc::now(),
            verdict: TurnVerdict::Rejected,
            constraints_introduced: Vec::new(),
            constraints_checked: evaluation.checked_ids(),
            violations: violated_ids.clone(),
        });

        self.phase = Phase::Revision {
            author: pending.author,
            violated: violated_ids,
        };

        TurnOutcome {
            turn_id: pending.id,
            author: pending.author,
            verdict: Verdict::Rejected,
            turn_verdict: TurnVerdict::Rejected,
            violated,
            introduced: Vec::new(),
            constraints: self.active_snapshot(),
            evaluation,
        }
    }

    // =========================================================================
    // Other actions
    // =========================================================================

    /// Retire a constraint (the "delete constraint" action).
    ///
    /// Legal in every live state. It affects evaluations that start after
    /// it; a pending rejection or an in-flight turn is not re-judged.
    pub fn retire_constraint(&mut self, id: ConstraintId) -> Result<(), NegotiationError> {
        if self.phase == Phase::Completed {
            return Err(NegotiationError::StoryCompleted);
        }
        self.constraints.retire(id)?;
        Ok(())
    }

    /// End the story. Any in-flight turn is discarded.
    pub fn end_story(&mut self) {
        if let Phase::Evaluating(pending) = &self.phase {
            warn!(turn = %pending.id, "story ended with a turn in flight");
        }
        if self.phase != Phase::Completed {
            info!(turns = self.transcript.len(), "story completed");
        }
        self.phase = Phase::Completed;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> NegotiationState {
        phase_state(&self.phase)
    }

    /// The author allowed to submit next, if any.
    pub fn current_author(&self) -> Option<AuthorRole> {
        match &self.phase {
            Phase::Awaiting(author) | Phase::Revision { author, .. } => Some(*author),
            Phase::Evaluating(_) | Phase::Completed => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// The in-flight turn, if any.
    pub fn pending(&self) -> Option<&PendingTurn> {
        match &self.phase {
            Phase::Evaluating(pending) => Some(pending),
            _ => None,
        }
    }

    /// While awaiting a revision: the constraints the last attempt broke.
    pub fn revision_feedback(&self) -> Vec<&Constraint> {
        match &self.phase {
            Phase::Revision { violated, .. } => violated
                .iter()
                .filter_map(|id| self.constraints.get(*id))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Committed turns, oldest first.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Rejected attempts, oldest first.
    pub fn rejections(&self) -> &[Turn] {
        &self.rejections
    }

    /// Committed turns that bent flexible constraints.
    pub fn flagged_turns(&self) -> Vec<&Turn> {
        self.transcript.iter().filter(|t| t.is_flagged()).collect()
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn active_constraints(&self) -> Vec<&Constraint> {
        self.constraints.active_constraints()
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &TurnEvaluator {
        &self.evaluator
    }

    /// Evaluate text against the current constraints without submitting it.
    pub fn preview(&self, text: &str) -> Evaluation {
        self.evaluator
            .evaluate(text, self.constraints.active_constraints())
    }

    fn active_snapshot(&self) -> Vec<Constraint> {
        self.constraints
            .active_constraints()
            .into_iter()
            .cloned()
            .collect()
    }
}

fn phase_state(phase: &Phase) -> NegotiationState {
    match phase {
        Phase::Awaiting(AuthorRole::Human) => NegotiationState::AwaitingHumanTurn,
        Phase::Awaiting(AuthorRole::Ai) => NegotiationState::AwaitingAiTurn,
        Phase::Evaluating(_) => NegotiationState::EvaluatingTurn,
        Phase::Revision { .. } => NegotiationState::AwaitingRevision,
        Phase::Completed => NegotiationState::Completed,
    }
}

fn resume_phase(pending: &PendingTurn) -> Phase {
    match &pending.revising {
        Some(violated) => Phase::Revision {
            author: pending.author,
            violated: violated.clone(),
        },
        None => Phase::Awaiting(pending.author),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintFunction, Flexibility};

    fn deep_water() -> ConstraintDraft {
        ConstraintDraft::new(
            "John is afraid of deep water",
            Flexibility::Fixed,
            ConstraintFunction::Exclusionary,
            ConstraintType::Anchor,
        )
    }

    fn story_with_fear() -> Negotiation {
        let mut story = Negotiation::default();
        story
            .submit_turn(AuthorRole::Human, "John really wants to go scuba diving.")
            .unwrap();
        story
            .submit_turn_with_constraints(
                AuthorRole::Ai,
                "But he is afraid of deep water.",
                vec![deep_water()],
            )
            .unwrap();
        story
    }

    #[test]
    fn test_new_story_awaits_opening_author() {
        let story = Negotiation::default();
        assert_eq!(story.state(), NegotiationState::AwaitingHumanTurn);
        assert_eq!(story.current_author(), Some(AuthorRole::Human));

        let story = Negotiation::new(
            NegotiationConfig::new().with_opening_author(AuthorRole::Ai),
            TurnEvaluator::default(),
        );
        assert_eq!(story.state(), NegotiationState::AwaitingAiTurn);
    }

    #[test]
    fn test_turns_alternate() {
        let mut story = Negotiation::default();
        let outcome = story.submit_turn(AuthorRole::Human, "Lila found a box.").unwrap();

        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(story.state(), NegotiationState::AwaitingAiTurn);
        assert_eq!(story.transcript().len(), 1);
    }

    #[test]
    fn test_out_of_turn_leaves_state_unchanged() {
        let mut story = Negotiation::default();
        let err = story.submit_turn(AuthorRole::Ai, "The dial clicked.").unwrap_err();

        assert_eq!(
            err,
            NegotiationError::OutOfTurn {
                expected: AuthorRole::Human,
                submitted: AuthorRole::Ai
            }
        );
        assert_eq!(story.state(), NegotiationState::AwaitingHumanTurn);
        assert!(story.transcript().is_empty());
    }

    #[test]
    fn test_ai_turn_introduces_constraint() {
        let story = story_with_fear();

        let active = story.active_constraints();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].description, "John is afraid of deep water");
        assert_eq!(active[0].origin_turn, story.transcript()[1].id);
        assert_eq!(story.transcript()[1].verdict, TurnVerdict::AcceptedWithConstraint);
    }

    #[test]
    fn test_rejection_moves_to_revision() {
        let mut story = story_with_fear();
        let outcome = story
            .submit_turn(AuthorRole::Human, "One day he was swimming in Lake Ontario")
            .unwrap();

        assert!(outcome.is_rejected());
        assert_eq!(outcome.feedback(), "Rejected as John is afraid of deep water");
        assert_eq!(story.state(), NegotiationState::AwaitingRevision);
        assert_eq!(story.current_author(), Some(AuthorRole::Human));
        assert_eq!(story.transcript().len(), 2);
        assert_eq!(story.rejections().len(), 1);
        assert_eq!(story.revision_feedback().len(), 1);
    }

    #[test]
    fn test_only_rejected_author_may_revise() {
        let mut story = story_with_fear();
        story
            .submit_turn(AuthorRole::Human, "He went swimming at dawn")
            .unwrap();

        let err = story.submit_turn(AuthorRole::Ai, "He dried off.").unwrap_err();
        assert!(matches!(err, NegotiationError::OutOfTurn { .. }));

        let outcome = story
            .submit_turn(AuthorRole::Human, "He watched the boats from the pier")
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(story.state(), NegotiationState::AwaitingAiTurn);
    }

    #[test]
    fn test_busy_while_evaluating() {
        let mut story = Negotiation::default();
        story.propose(AuthorRole::Human, "Lila found a box.", Vec::new()).unwrap();
        assert_eq!(story.state(), NegotiationState::EvaluatingTurn);

        assert_eq!(
            story.submit_turn(AuthorRole::Ai, "It ticked."),
            Err(NegotiationError::Busy)
        );
        assert_eq!(
            story.submit_turn(AuthorRole::Human, "Again."),
            Err(NegotiationError::Busy)
        );

        story.resolve().unwrap();
        assert_eq!(story.transcript().len(), 1);
    }

    #[test]
    fn test_resolve_without_pending() {
        let mut story = Negotiation::default();
        assert_eq!(story.resolve(), Err(NegotiationError::NothingPending));
    }

    #[test]
    fn test_human_proposals_refused_by_default() {
        let mut story = Negotiation::default();
        let err = story
            .submit_turn_with_constraints(AuthorRole::Human, "Lila found a box.", vec![deep_water()])
            .unwrap_err();

        assert_eq!(err, NegotiationError::ProposalsNotPermitted(AuthorRole::Human));
        assert_eq!(story.state(), NegotiationState::AwaitingHumanTurn);
    }

    #[test]
    fn test_human_proposals_when_enabled() {
        let mut story = Negotiation::new(
            NegotiationConfig::new().with_human_proposals(true),
            TurnEvaluator::default(),
        );
        let outcome = story
            .submit_turn_with_constraints(AuthorRole::Human, "John stood on the dock.", vec![deep_water()])
            .unwrap();
        assert_eq!(outcome.introduced.len(), 1);
    }

    #[test]
    fn test_duplicate_proposal_commits_nothing() {
        let mut story = story_with_fear();
        story.submit_turn(AuthorRole::Human, "He sat by the fire.").unwrap();

        let err = story
            .submit_turn_with_constraints(
                AuthorRole::Ai,
                "The fear never left him.",
                vec![deep_water()],
            )
            .unwrap_err();

        assert!(matches!(err, NegotiationError::DuplicateConstraint { .. }));
        assert_eq!(story.state(), NegotiationState::AwaitingAiTurn);
        assert_eq!(story.transcript().len(), 3);
        assert_eq!(story.constraints().len(), 1);
    }

    #[test]
    fn test_retire_during_evaluation_does_not_change_pending_verdict() {
        let mut story = story_with_fear();
        let id = story.active_constraints()[0].id;

        story.propose(AuthorRole::Human, "He dove into the lake", Vec::new()).unwrap();
        story.retire_constraint(id).unwrap();

        let outcome = story.resolve().unwrap();
        assert!(outcome.is_rejected());

        // The retirement applies to the revision.
        let outcome = story.submit_turn(AuthorRole::Human, "He dove into the lake").unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted);
    }

    #[test]
    fn test_retire_twice_fails() {
        let mut story = story_with_fear();
        let id = story.active_constraints()[0].id;

        story.retire_constraint(id).unwrap();
        assert_eq!(story.retire_constraint(id), Err(NegotiationError::NotFound(id)));
    }

    #[test]
    fn test_end_story_from_any_state() {
        let mut story = Negotiation::default();
        story.propose(AuthorRole::Human, "Lila found a box.", Vec::new()).unwrap();
        story.end_story();

        assert_eq!(story.state(), NegotiationState::Completed);
        assert_eq!(
            story.submit_turn(AuthorRole::Human, "More."),
            Err(NegotiationError::StoryCompleted)
        );
        assert!(story.transcript().is_empty());
    }

    #[test]
    fn test_empty_turn_refused() {
        let mut story = Negotiation::default();
        assert_eq!(
            story.submit_turn(AuthorRole::Human, "   "),
            Err(NegotiationError::EmptyTurn)
        );
    }

    #[test]
    fn test_flagged_turns() {
        let mut story = Negotiation::default();
        story.submit_turn(AuthorRole::Human, "Lila found a box.").unwrap();
        story
            .submit_turn_with_constraints(
                AuthorRole::Ai,
                "It was cold to the touch.",
                vec![ConstraintDraft::new(
                    "Keep magic out of it",
                    Flexibility::Flexible,
                    ConstraintFunction::Exclusionary,
                    ConstraintType::Channel,
                )],
            )
            .unwrap();

        let outcome = story
            .submit_turn(AuthorRole::Human, "A wizard had sealed it shut.")
            .unwrap();

        assert_eq!(outcome.verdict, Verdict::AcceptedWithViolationFlagged);
        assert_eq!(outcome.turn_verdict, TurnVerdict::AcceptedWithViolationFlagged);
        assert_eq!(story.flagged_turns().len(), 1);
        assert_eq!(story.state(), NegotiationState::AwaitingAiTurn);
    }

    #[test]
    fn test_snapshot_restore() {
        let story = story_with_fear();
        let snapshot = story.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let snapshot: StorySnapshot = serde_json::from_str(&json).unwrap();

        let restored = Negotiation::restore(snapshot, TurnEvaluator::default());
        assert_eq!(restored.state(), NegotiationState::AwaitingHumanTurn);
        assert_eq!(restored.transcript(), story.transcript());
        assert_eq!(restored.active_constraints(), story.active_constraints());
    }
}
