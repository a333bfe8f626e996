//! Testing utilities for story sessions.
//!
//! This module provides tools for integration testing:
//! - `ScriptedAuthor` for deterministic AI turns without API calls
//! - `TestHarness` for scripted story scenarios
//! - Assertion helpers for verifying verdicts and story state

use crate::author::{AiAuthor, AuthorContext, AuthorError, Candidate};
use crate::evaluator::Verdict;
use crate::negotiation::{NegotiationState, TurnOutcome};
use crate::session::{AiTurn, SessionConfig, SessionError, StorySession};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A scripted reply from the AI author.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// A well-formed candidate.
    Candidate(Candidate),
    /// A reply that could not be parsed.
    Garbled(String),
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    contexts: Vec<AuthorContext>,
}

/// An AI author that plays back scripted replies in order.
///
/// Clones share the script, so a test can keep a handle after handing the
/// author to a session and inspect what the author was shown.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAuthor {
    script: Arc<Mutex<Script>>,
}

impl ScriptedAuthor {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        let author = Self::default();
        for candidate in candidates {
            author.push(candidate);
        }
        author
    }

    /// Queue a candidate.
    pub fn push(&self, candidate: Candidate) {
        self.lock().replies.push_back(ScriptedReply::Candidate(candidate));
    }

    /// Queue a reply that fails to parse.
    pub fn push_garbled(&self, raw: impl Into<String>) {
        self.lock().replies.push_back(ScriptedReply::Garbled(raw.into()));
    }

    /// Replies not yet played.
    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }

    /// Every context the author has been asked with, oldest first.
    pub fn contexts(&self) -> Vec<AuthorContext> {
        self.lock().contexts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AiAuthor for ScriptedAuthor {
    async fn propose(&self, context: &AuthorContext) -> Result<Candidate, AuthorError> {
        let mut script = self.lock();
        script.contexts.push(context.clone());
        match script.replies.pop_front() {
            Some(ScriptedReply::Candidate(candidate)) => Ok(candidate),
            Some(ScriptedReply::Garbled(raw)) => Err(AuthorError::Parse(raw)),
            None => Err(AuthorError::Exhausted),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Test harness for running story scenarios.
pub struct TestHarness {
    /// The session under test.
    pub session: StorySession,
    /// Handle on the session's AI author.
    pub author: ScriptedAuthor,
}

impl TestHarness {
    /// Create a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::new("Test Story"))
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        let author = ScriptedAuthor::default();
        let session = StorySession::with_author(config, author.clone());
        Self { session, author }
    }

    /// Queue an AI sentence.
    pub fn expect_ai(&mut self, candidate: Candidate) -> &mut Self {
        self.author.push(candidate);
        self
    }

    /// Queue an unparseable AI reply.
    pub fn expect_garbled(&mut self, raw: &str) -> &mut Self {
        self.author.push_garbled(raw);
        self
    }

    /// Submit a human sentence.
    pub fn human(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        self.session.human_turn(text)
    }

    /// Let the scripted AI take its turn.
    pub async fn ai(&mut self) -> Result<AiTurn, SessionError> {
        self.session.ai_turn().await
    }

    pub fn state(&self) -> NegotiationState {
        self.session.state()
    }

    /// Check if an active constraint has the given description.
    pub fn has_constraint(&self, description: &str) -> bool {
        self.session
            .active_constraints()
            .iter()
            .any(|c| c.description.eq_ignore_ascii_case(description))
    }

    pub fn constraint_count(&self) -> usize {
        self.session.active_constraints().len()
    }

    /// Number of committed turns.
    pub fn transcript_len(&self) -> usize {
        self.session.transcript().len()
    }

    /// Text of the last committed turn.
    pub fn last_text(&self) -> Option<&str> {
        self.session.transcript().last().map(|t| t.text.as_str())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that a turn was accepted with no violations.
#[track_caller]
pub fn assert_accepted(outcome: &TurnOutcome) {
    assert_eq!(
        outcome.verdict,
        Verdict::Accepted,
        "Expected turn to be accepted, got: {}",
        outcome.feedback()
    );
}

/// Assert that a turn was rejected for exactly these constraints.
#[track_caller]
pub fn assert_rejected_by(outcome: &TurnOutcome, descriptions: &[&str]) {
    assert_eq!(
        outcome.verdict,
        Verdict::Rejected,
        "Expected turn to be rejected, got: {}",
        outcome.feedback()
    );
    assert_eq!(
        outcome.violated_descriptions(),
        descriptions,
        "Rejected for the wrong constraints"
    );
}

/// Assert that a turn was committed with flexible violations flagged.
#[track_caller]
pub fn assert_flagged(outcome: &TurnOutcome) {
    assert_eq!(
        outcome.verdict,
        Verdict::AcceptedWithViolationFlagged,
        "Expected turn to be flagged, got: {}",
        outcome.feedback()
    );
}

/// Assert the story is in the given state.
#[track_caller]
pub fn assert_state(harness: &TestHarness, state: NegotiationState) {
    assert_eq!(harness.state(), state, "Unexpected story state");
}

/// Assert that an active constraint has the given description.
#[track_caller]
pub fn assert_has_constraint(harness: &TestHarness, description: &str) {
    assert!(
        harness.has_constraint(description),
        "Expected active constraint '{description}'"
    );
}

/// Assert that no active constraint has the given description.
#[track_caller]
pub fn assert_no_constraint(harness: &TestHarness, description: &str) {
    assert!(
        !harness.has_constraint(description),
        "Expected no active constraint '{description}'"
    );
}
