//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p plotpact-core --test api_integration -- --ignored`
//!
//! The model decides what to write, so these only check that a reply comes
//! back in a shape the negotiation loop can use.

use plotpact_core::author::{AiAuthor, AuthorContext, ClaudeAuthor};
use plotpact_core::{AuthorRole, Negotiation, SessionConfig, StorySession};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p plotpact-core --test api_integration -- --ignored
async fn test_claude_author_returns_a_sentence() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let mut story = Negotiation::default();
    story
        .submit_turn(AuthorRole::Human, "John really wants to go scuba diving.")
        .unwrap();

    let author = ClaudeAuthor::from_env().expect("Failed to create author");
    let context = AuthorContext::from_negotiation("The Dive", &story);

    let candidate = author.propose(&context).await.expect("Author should reply");
    assert!(!candidate.text.is_empty(), "Author should write a sentence");
    assert!(candidate.constraints.len() <= 3, "Too many constraints: {candidate:?}");
}

#[tokio::test]
#[ignore]
async fn test_session_round_trip() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let config = SessionConfig::new("The Lighthouse").with_max_tokens(512);
    let mut session = StorySession::new(config).expect("Failed to create session");

    session
        .human_turn("The lighthouse keeper found a letter with no name on it.")
        .unwrap();
    let turn = session.ai_turn().await.expect("AI turn should complete");

    println!("AI ({} attempts): {}", turn.attempts, turn.text);
    for constraint in session.active_constraints() {
        println!("  {}", constraint.summary());
    }

    if turn.is_committed() {
        assert_eq!(session.transcript().len(), 2);
    }
}
