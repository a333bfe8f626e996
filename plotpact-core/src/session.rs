//! StorySession - the primary public API for co-writing a story.
//!
//! Couples a [`Negotiation`] with an [`AiAuthor`] so callers only deal with
//! "the human wrote this", "let the AI write", and save/load.

use crate::author::{AiAuthor, AuthorConfig, AuthorContext, AuthorError, ClaudeAuthor, Revision};
use crate::constraint::{Constraint, ConstraintDraft, ConstraintId};
use crate::evaluator::{EvaluatorConfig, TurnEvaluator};
use crate::negotiation::{
    Negotiation, NegotiationConfig, NegotiationError, NegotiationState, TurnOutcome,
};
use crate::persist::{PersistError, SavedStory, StoryExport};
use crate::turn::{AuthorRole, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Errors from StorySession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("Author error: {0}")]
    Author(#[from] AuthorError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("No API key configured - set ANTHROPIC_API_KEY environment variable")]
    NoApiKey,
}

/// Unique identifier for a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for creating a new story session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Story title.
    pub title: String,

    /// Model to use for the AI author.
    pub model: Option<String>,

    /// Maximum tokens for AI author responses.
    pub max_tokens: usize,

    /// Temperature for AI author generation.
    pub temperature: Option<f32>,

    /// Custom AI author system prompt.
    pub custom_author_prompt: Option<String>,

    /// How many sentences the AI may try per turn before giving the turn
    /// back to the caller in `AwaitingRevision`.
    pub max_ai_attempts: u32,

    pub evaluator: EvaluatorConfig,

    pub negotiation: NegotiationConfig,
}

impl SessionConfig {
    /// Create a new session config with a story title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            model: None,
            max_tokens: 1024,
            temperature: Some(0.9),
            custom_author_prompt: None,
            max_ai_attempts: 3,
            evaluator: EvaluatorConfig::default(),
            negotiation: NegotiationConfig::default(),
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set max tokens for responses.
    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Set temperature for generation.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set a custom AI author system prompt.
    pub fn with_author_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_author_prompt = Some(prompt.into());
        self
    }

    /// Set how many attempts the AI gets per turn.
    pub fn with_max_ai_attempts(mut self, attempts: u32) -> Self {
        self.max_ai_attempts = attempts;
        self
    }

    pub fn with_evaluator(mut self, evaluator: EvaluatorConfig) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_negotiation(mut self, negotiation: NegotiationConfig) -> Self {
        self.negotiation = negotiation;
        self
    }

    fn author_config(&self) -> AuthorConfig {
        AuthorConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            custom_prompt: self.custom_author_prompt.clone(),
        }
    }
}

/// Result of asking the AI to take its turn.
#[derive(Debug, Clone)]
pub struct AiTurn {
    /// Outcome of the last attempt. Rejected if every attempt was.
    pub outcome: TurnOutcome,
    /// Text of the last attempt.
    pub text: String,
    /// Attempts made, including ones whose reply could not be parsed.
    pub attempts: u32,
}

impl AiTurn {
    pub fn is_committed(&self) -> bool {
        !self.outcome.is_rejected()
    }
}

/// A co-written story session.
pub struct StorySession {
    id: StoryId,
    title: String,
    negotiation: Negotiation,
    author: Box<dyn AiAuthor>,
    max_ai_attempts: u32,
}

impl std::fmt::Debug for StorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorySession")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("author", &self.author.name())
            .field("state", &self.negotiation.state())
            .finish_non_exhaustive()
    }
}

impl StorySession {
    /// Create a new session with the Claude author.
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let author = ClaudeAuthor::from_env()
            .map_err(|_| SessionError::NoApiKey)?
            .with_config(config.author_config());
        Ok(Self::with_author(config, author))
    }

    /// Create a session with any AI author.
    pub fn with_author(config: SessionConfig, author: impl AiAuthor + 'static) -> Self {
        let evaluator = TurnEvaluator::new(config.evaluator);
        Self {
            id: StoryId::new(),
            title: config.title,
            negotiation: Negotiation::new(config.negotiation, evaluator),
            author: Box::new(author),
            max_ai_attempts: config.max_ai_attempts,
        }
    }

    /// Load a saved session, continuing with the Claude author.
    ///
    /// The title and story come from the save; the rest of `config` applies.
    pub async fn load(path: impl AsRef<Path>, config: SessionConfig) -> Result<Self, SessionError> {
        let author = ClaudeAuthor::from_env()
            .map_err(|_| SessionError::NoApiKey)?
            .with_config(config.author_config());
        Self::load_with_author(path, config, author).await
    }

    /// Load a saved session with any AI author.
    pub async fn load_with_author(
        path: impl AsRef<Path>,
        config: SessionConfig,
        author: impl AiAuthor + 'static,
    ) -> Result<Self, SessionError> {
        let saved = SavedStory::load_json(path).await?;
        let evaluator = TurnEvaluator::new(config.evaluator);

        info!(story = %saved.metadata.story_id, title = %saved.metadata.title, "story loaded");

        Ok(Self {
            id: saved.metadata.story_id,
            title: saved.metadata.title,
            negotiation: Negotiation::restore(saved.story, evaluator),
            author: Box::new(author),
            max_ai_attempts: config.max_ai_attempts,
        })
    }

    /// Save the current session to a file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let saved = SavedStory::new(self.id, self.title.clone(), self.negotiation.snapshot());
        saved.save_json(path).await?;
        Ok(())
    }

    /// Submit the human's sentence.
    pub fn human_turn(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        Ok(self.negotiation.submit_turn(AuthorRole::Human, text)?)
    }

    /// Submit the human's sentence along with constraints for the AI.
    ///
    /// Only allowed when the session was configured with human proposals.
    pub fn human_turn_with_constraints(
        &mut self,
        text: &str,
        drafts: Vec<ConstraintDraft>,
    ) -> Result<TurnOutcome, SessionError> {
        Ok(self
            .negotiation
            .submit_turn_with_constraints(AuthorRole::Human, text, drafts)?)
    }

    /// Let the AI author take its turn.
    ///
    /// Each rejected attempt is fed back to the author with the constraints
    /// it broke. If every attempt is rejected the story stays in
    /// `AwaitingRevision` for the AI and the last outcome is returned.
    pub async fn ai_turn(&mut self) -> Result<AiTurn, SessionError> {
        match self.negotiation.current_author() {
            Some(AuthorRole::Ai) => {}
            Some(expected) => {
                return Err(NegotiationError::OutOfTurn {
                    expected,
                    submitted: AuthorRole::Ai,
                }
                .into())
            }
            None if self.negotiation.is_completed() => {
                return Err(NegotiationError::StoryCompleted.into())
            }
            None => return Err(NegotiationError::Busy.into()),
        }

        let max_attempts = self.max_ai_attempts.max(1);
        let mut revision = self.pending_ai_revision();
        let mut last: Option<AiTurn> = None;
        let mut last_error: Option<AuthorError> = None;

        for attempt in 1..=max_attempts {
            let mut context =
                AuthorContext::from_negotiation(&self.title, &self.negotiation).with_attempt(attempt);
            if let Some(revision) = &revision {
                context = context.with_revision(revision.clone());
            }

            let candidate = match self.author.propose(&context).await {
                Ok(candidate) => candidate,
                Err(AuthorError::Parse(message)) => {
                    warn!(attempt, author = self.author.name(), %message, "unusable author reply");
                    last_error = Some(AuthorError::Parse(message));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let drafts = self.usable_drafts(candidate.constraints);
            let outcome = match self.negotiation.submit_turn_with_constraints(
                AuthorRole::Ai,
                &candidate.text,
                drafts,
            ) {
                Ok(outcome) => outcome,
                Err(e @ (NegotiationError::EmptyTurn | NegotiationError::InvalidConstraint(_))) => {
                    warn!(attempt, author = self.author.name(), error = %e, "unusable candidate");
                    last_error = Some(AuthorError::Parse(e.to_string()));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if !outcome.is_rejected() {
                return Ok(AiTurn {
                    outcome,
                    text: candidate.text,
                    attempts: attempt,
                });
            }

            revision = Some(Revision {
                rejected_text: candidate.text.clone(),
                violated: outcome.violated.clone(),
            });
            last = Some(AiTurn {
                outcome,
                text: candidate.text,
                attempts: attempt,
            });
        }

        match (last, last_error) {
            (Some(mut turn), _) => {
                warn!(attempts = max_attempts, "AI could not produce an acceptable sentence");
                turn.attempts = max_attempts;
                Ok(turn)
            }
            (None, Some(e)) => Err(e.into()),
            (None, None) => Err(AuthorError::Exhausted.into()),
        }
    }

    /// Drop proposals that are blank or repeat an active constraint or each
    /// other.
    ///
    /// A bad draft refuses the whole turn, so the draft goes and the
    /// sentence stays.
    fn usable_drafts(&self, drafts: Vec<ConstraintDraft>) -> Vec<ConstraintDraft> {
        let mut seen = HashSet::new();
        drafts
            .into_iter()
            .filter(|draft| {
                if draft.description.trim().is_empty() {
                    warn!("dropping AI proposal with no description");
                    return false;
                }
                let fresh = self.negotiation.constraints().check_draft(draft).is_ok()
                    && seen.insert(draft.equivalence_key());
                if !fresh {
                    warn!(description = %draft.description, "dropping duplicate AI proposal");
                }
                fresh
            })
            .collect()
    }

    /// If the AI's last attempt was rejected, what to tell it.
    fn pending_ai_revision(&self) -> Option<Revision> {
        if self.negotiation.state() != NegotiationState::AwaitingRevision {
            return None;
        }
        let rejected = self.negotiation.rejections().last()?;
        Some(Revision {
            rejected_text: rejected.text.clone(),
            violated: self
                .negotiation
                .revision_feedback()
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Retire a constraint (the delete button on a constraint card).
    pub fn delete_constraint(&mut self, id: ConstraintId) -> Result<(), SessionError> {
        Ok(self.negotiation.retire_constraint(id)?)
    }

    /// End the story.
    pub fn end_story(&mut self) {
        self.negotiation.end_story();
    }

    pub fn id(&self) -> StoryId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> NegotiationState {
        self.negotiation.state()
    }

    /// Committed turns, oldest first.
    pub fn transcript(&self) -> &[Turn] {
        self.negotiation.transcript()
    }

    pub fn active_constraints(&self) -> Vec<&Constraint> {
        self.negotiation.active_constraints()
    }

    /// Get a reference to the negotiation.
    pub fn negotiation(&self) -> &Negotiation {
        &self.negotiation
    }

    /// Get a mutable reference to the negotiation.
    pub fn negotiation_mut(&mut self) -> &mut Negotiation {
        &mut self.negotiation
    }

    /// Render the story for sharing.
    pub fn export(&self) -> StoryExport {
        StoryExport::from_negotiation(&self.title, &self.negotiation)
    }
}
