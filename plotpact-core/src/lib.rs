//! Constraint negotiation core for human-AI co-authored stories.
//!
//! A human and an AI take turns adding one sentence each. Either side's turn
//! may introduce constraints (rules the story must follow from then on), and
//! every proposed sentence is checked against the active constraints before
//! it joins the story:
//! - a broken fixed constraint rejects the sentence and asks for a revision
//! - a broken flexible constraint lets it in, flagged for the other author
//!
//! # Quick Start
//!
//! ```ignore
//! use plotpact_core::{SessionConfig, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = StorySession::new(SessionConfig::new("The Dive"))?;
//!
//!     session.human_turn("John really wants to go scuba diving.")?;
//!     let reply = session.ai_turn().await?;
//!     println!("{}", reply.text);
//!
//!     for constraint in session.active_constraints() {
//!         println!("{}", constraint.summary());
//!     }
//!
//!     session.save("the_dive.json").await?;
//!     Ok(())
//! }
//! ```

pub mod author;
pub mod constraint;
pub mod constraint_set;
pub mod evaluator;
pub mod negotiation;
pub mod persist;
pub mod session;
pub mod testing;
pub mod turn;

// Primary public API
pub use author::{AiAuthor, AuthorContext, AuthorError, Candidate, ClaudeAuthor};
pub use constraint::{
    Constraint, ConstraintDraft, ConstraintFunction, ConstraintId, ConstraintStatus,
    ConstraintType, Flexibility,
};
pub use constraint_set::{ConstraintSet, ConstraintSetError};
pub use evaluator::{EvaluatorConfig, Evaluation, Lexicon, TurnEvaluator, Verdict};
pub use negotiation::{
    Negotiation, NegotiationConfig, NegotiationError, NegotiationState, StorySnapshot,
    TurnOutcome,
};
pub use persist::{PersistError, SavedStory, StoryExport};
pub use session::{AiTurn, SessionConfig, SessionError, StoryId, StorySession};
pub use testing::{ScriptedAuthor, TestHarness};
pub use turn::{AuthorRole, Turn, TurnId, TurnVerdict};
