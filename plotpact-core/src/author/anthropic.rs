//! Claude-backed AI author.

use super::{AiAuthor, AuthorContext, AuthorError, Candidate};
use crate::constraint::ConstraintDraft;
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_MAX_TOKENS: usize = 1024;

const SYSTEM_PROMPT: &str = r#"You are co-writing a short story with a human, one sentence at a time.

On your turn you write exactly ONE new sentence that continues the story. You may also place
constraints on what the human can write next. A constraint has:
- "description": the rule, in plain words (e.g. "John is afraid of deep water")
- "reason": why the story needs it
- "flexibility": "fixed" (must be followed strictly) or "flexible" (may be bent)
- "function": "exclusionary" (rules something out) or "focusing" (keeps attention on something)
- "type": "anchor" (a concrete fact, word or detail) or "channel" (a broad theme or setting)
- "triggers" (optional): the concrete words the rule is about

Your sentence must respect every active constraint. Propose at most two constraints per turn,
and only when they make the story more interesting. Never repeat an active constraint."#;

/// Generation settings for [`ClaudeAuthor`].
#[derive(Debug, Clone)]
pub struct AuthorConfig {
    /// Model override; the client default is used when unset.
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    /// Replaces the built-in system prompt.
    pub custom_prompt: Option<String>,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: Some(0.9),
            custom_prompt: None,
        }
    }
}

/// Reply shape we ask Claude for.
#[derive(Debug, Deserialize)]
struct AuthorResponse {
    sentence: String,
    #[serde(default)]
    constraints: Vec<serde_json::Value>,
}

/// AI author that asks Claude for each sentence.
#[derive(Debug, Clone)]
pub struct ClaudeAuthor {
    client: Claude,
    config: AuthorConfig,
}

impl ClaudeAuthor {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            config: AuthorConfig::default(),
        }
    }

    /// Create from environment (ANTHROPIC_API_KEY).
    pub fn from_env() -> Result<Self, claude::Error> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_config(mut self, config: AuthorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AuthorConfig {
        &self.config
    }

    fn system_prompt(&self) -> &str {
        self.config.custom_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
    }
}

#[async_trait]
impl AiAuthor for ClaudeAuthor {
    async fn propose(&self, context: &AuthorContext) -> Result<Candidate, AuthorError> {
        let prompt = build_prompt(context);

        let mut request = Request::new(vec![Message::user(prompt)])
            .with_system(self.system_prompt())
            .with_max_tokens(self.config.max_tokens);
        if let Some(model) = &self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(request).await?;
        let text = response.text();
        debug!(attempt = context.attempt, reply = %text, "author reply");

        parse_response(&text)
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Build the user message for one attempt.
pub(crate) fn build_prompt(context: &AuthorContext) -> String {
    let story = if context.transcript.is_empty() {
        "(The story has not started yet. Write its opening sentence.)".to_string()
    } else {
        context
            .transcript
            .iter()
            .map(|t| format!("[{}] {}", t.author, t.text))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let constraints = if context.constraints.is_empty() {
        "(none)".to_string()
    } else {
        context
            .constraints
            .iter()
            .map(|c| format!("- {}", c.summary()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut prompt = format!(
        r#"## Story: {title}
{story}

## Active Constraints
{constraints}
"#,
        title = context.title,
    );

    if let Some(revision) = &context.revision {
        let broken = revision
            .violated
            .iter()
            .map(|c| format!("- {}", c.summary()))
            .collect::<Vec<_>>()
            .join("\n");
        prompt.push_str(&format!(
            r#"
## Revision Needed
Your previous sentence was rejected:
"{}"
It broke:
{broken}
Write a different sentence that respects these constraints.
"#,
            revision.rejected_text
        ));
    }

    prompt.push_str(
        r#"
Respond with ONLY a JSON object (no markdown, no explanation outside the JSON):
{
  "sentence": "Your one new sentence.",
  "constraints": [
    {"description": "...", "reason": "...", "flexibility": "fixed", "function": "exclusionary", "type": "anchor"}
  ]
}

Use an empty "constraints" array if you have nothing to add."#,
    );

    prompt
}

/// Parse Claude's reply into a candidate.
///
/// Malformed constraint entries are dropped with a warning; a missing or
/// empty sentence fails the whole reply.
pub(crate) fn parse_response(response: &str) -> Result<Candidate, AuthorError> {
    let json = extract_json(response);

    let parsed: AuthorResponse = serde_json::from_str(json).map_err(|e| {
        warn!(error = %e, "author reply is not valid JSON");
        AuthorError::Parse(format!("{e}: {json}"))
    })?;

    let text = parsed.sentence.trim().to_string();
    if text.is_empty() {
        warn!("author reply has an empty sentence");
        return Err(AuthorError::Parse("empty sentence".to_string()));
    }

    let mut constraints = Vec::new();
    for value in parsed.constraints {
        match serde_json::from_value::<ConstraintDraft>(value) {
            Ok(draft) if !draft.description.trim().is_empty() => constraints.push(draft),
            Ok(_) => warn!("dropping constraint with an empty description"),
            Err(e) => warn!(error = %e, "dropping malformed constraint"),
        }
    }

    Ok(Candidate { text, constraints })
}

/// Extract the JSON object from a reply that may be wrapped in a markdown
/// fence or surrounded by prose.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let content_start = after.strip_prefix("json").map_or(0, |_| 4);
        if let Some(end) = after[content_start..].find("```") {
            return after[content_start..content_start + end].trim();
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}
