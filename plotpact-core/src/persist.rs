//! Story persistence and export.
//!
//! Saves are pretty-printed JSON carrying a format version, a small metadata
//! block that can be read without loading the whole story, and the
//! negotiation snapshot itself.

use crate::constraint::ConstraintStatus;
use crate::negotiation::{Negotiation, NegotiationState, StorySnapshot};
use crate::session::StoryId;
use crate::turn::{AuthorRole, TurnVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved story with everything needed to resume it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedStory {
    /// Save format version for compatibility checking.
    pub version: u32,

    pub saved_at: DateTime<Utc>,

    pub metadata: SaveMetadata,

    /// Constraint set, transcript, rejection log and loop state.
    pub story: StorySnapshot,
}

/// Summary of a save, readable without loading the story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub story_id: StoryId,
    pub title: String,
    /// Committed turns.
    pub turns: usize,
    pub active_constraints: usize,
    pub state: NegotiationState,
    pub saved_at: DateTime<Utc>,
}

impl SavedStory {
    pub fn new(story_id: StoryId, title: impl Into<String>, story: StorySnapshot) -> Self {
        let saved_at = Utc::now();
        let metadata = SaveMetadata {
            story_id,
            title: title.into(),
            turns: story.transcript.len(),
            active_constraints: story.constraints.active_count(),
            state: story.state(),
            saved_at,
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            metadata,
            story,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        Ok(saved)
    }

    /// Read just the metadata of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// A save file found on disk.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// List readable saves in a directory, most recently saved first.
///
/// Files that are not saves, or are from another format version, are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "json") {
            if let Ok(metadata) = SavedStory::peek_metadata(&path).await {
                saves.push(SaveInfo { path, metadata });
            }
        }
    }

    saves.sort_by(|a, b| b.metadata.saved_at.cmp(&a.metadata.saved_at));
    Ok(saves)
}

/// File name for a story save: the title with non-alphanumerics replaced.
pub fn save_path(base_dir: impl AsRef<Path>, title: &str) -> PathBuf {
    let sanitized: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

// ============================================================================
// Export
// ============================================================================

/// One committed sentence in an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedTurn {
    pub author: AuthorRole,
    pub text: String,
    pub verdict: TurnVerdict,
}

/// One constraint in an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedConstraint {
    pub summary: String,
    pub reason: String,
    pub status: ConstraintStatus,
}

/// A finished or in-progress story, ready to show or share.
#[derive(Debug, Clone, Serialize)]
pub struct StoryExport {
    pub title: String,
    pub turns: Vec<ExportedTurn>,
    pub constraints: Vec<ExportedConstraint>,
    pub rejected_attempts: usize,
}

impl StoryExport {
    pub fn from_negotiation(title: impl Into<String>, negotiation: &Negotiation) -> Self {
        let turns = negotiation
            .transcript()
            .iter()
            .map(|t| ExportedTurn {
                author: t.author,
                text: t.text.clone(),
                verdict: t.verdict,
            })
            .collect();

        let constraints = negotiation
            .constraints()
            .all()
            .iter()
            .map(|c| ExportedConstraint {
                summary: c.summary(),
                reason: c.reason.clone(),
                status: c.status,
            })
            .collect();

        Self {
            title: title.into(),
            turns,
            constraints,
            rejected_attempts: negotiation.rejections().len(),
        }
    }

    /// The committed sentences as one paragraph.
    pub fn prose(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for StoryExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f)?;
        writeln!(f, "{}", self.prose())?;

        writeln!(f)?;
        writeln!(f, "Turns")?;
        for (i, turn) in self.turns.iter().enumerate() {
            writeln!(
                f,
                "  {}. [{}] {} ({})",
                i + 1,
                turn.author,
                turn.text,
                turn.verdict.label()
            )?;
        }

        if !self.constraints.is_empty() {
            writeln!(f)?;
            writeln!(f, "Constraints")?;
            for c in &self.constraints {
                let retired = if c.status.is_active() { "" } else { " (retired)" };
                writeln!(f, "  {}{retired}", c.summary)?;
            }
        }

        if self.rejected_attempts > 0 {
            writeln!(f)?;
            writeln!(f, "Rejected attempts: {}", self.rejected_attempts)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintDraft, ConstraintFunction, ConstraintType, Flexibility};

    fn sample_story() -> Negotiation {
        let mut story = Negotiation::default();
        story
            .submit_turn(AuthorRole::Human, "John really wants to go scuba diving.")
            .unwrap();
        story
            .submit_turn_with_constraints(
                AuthorRole::Ai,
                "But he is afraid of deep water.",
                vec![ConstraintDraft::new(
                    "John is afraid of deep water",
                    Flexibility::Fixed,
                    ConstraintFunction::Exclusionary,
                    ConstraintType::Anchor,
                )],
            )
            .unwrap();
        story
            .submit_turn(AuthorRole::Human, "One day he was swimming in Lake Ontario")
            .unwrap();
        story
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.json");

        let story = sample_story();
        let saved = SavedStory::new(StoryId::new(), "Diving", story.snapshot());
        saved.save_json(&path).await.unwrap();

        let loaded = SavedStory::load_json(&path).await.unwrap();
        assert_eq!(loaded.metadata, saved.metadata);
        assert_eq!(loaded.story, story.snapshot());
        assert_eq!(loaded.metadata.turns, 2);
        assert_eq!(loaded.metadata.active_constraints, 1);
        assert_eq!(loaded.metadata.state, NegotiationState::AwaitingRevision);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");

        let mut saved = SavedStory::new(StoryId::new(), "Old", Negotiation::default().snapshot());
        saved.version = SAVE_VERSION + 1;
        saved.save_json(&path).await.unwrap();

        assert!(matches!(
            SavedStory::load_json(&path).await,
            Err(PersistError::VersionMismatch { found, .. }) if found == SAVE_VERSION + 1
        ));
        assert!(matches!(
            SavedStory::peek_metadata(&path).await,
            Err(PersistError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_saves_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let saved = SavedStory::new(StoryId::new(), "Diving", sample_story().snapshot());
        saved.save_json(save_path(dir.path(), "Diving")).await.unwrap();
        fs::write(dir.path().join("notes.json"), "{}").await.unwrap();
        fs::write(dir.path().join("readme.txt"), "hi").await.unwrap();

        let saves = list_saves(dir.path()).await.unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].metadata.title, "Diving");
    }

    #[test]
    fn test_save_path_sanitizes() {
        let path = save_path("/tmp", "John's dive: part 1");
        assert_eq!(path, PathBuf::from("/tmp/John_s_dive__part_1.json"));
    }

    #[test]
    fn test_export_render() {
        let export = StoryExport::from_negotiation("Diving", &sample_story());
        let text = export.to_string();

        assert_eq!(
            export.prose(),
            "John really wants to go scuba diving. But he is afraid of deep water."
        );
        assert!(text.starts_with("Diving\n"));
        assert!(text.contains("[AI] But he is afraid of deep water. (Accepted with constraint enforced)"));
        assert!(text.contains("C1 John is afraid of deep water [Fixed, Exclusionary, anchor]"));
        assert!(text.contains("Rejected attempts: 1"));
    }
}
