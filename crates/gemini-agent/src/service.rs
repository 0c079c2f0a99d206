use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

// ─── Exchange ─────────────────────────────────────────────────────────────

/// One completed turn of the conversation, kept so later requests can carry
/// the running history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user_text: String,
    pub narrative: String,
    pub scene: String,
}

// ─── DecisionRequest ──────────────────────────────────────────────────────

/// What the caller expects back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// `{"narrative", "next_scene"}` for one conversational turn.
    #[default]
    Turn,
    /// `{"story_plan": [{"narrative", "location"}, …]}` for a whole story.
    Story,
}

/// Everything the decision service sees for a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub kind: RequestKind,
    /// Scene token the installation is currently showing.
    pub current_scene: String,
    /// Verbatim user speech (already transcribed).
    pub user_text: String,
    /// Earlier exchanges, oldest first. Empty for single-turn sessions.
    #[serde(default)]
    pub history: Vec<Exchange>,
}

impl DecisionRequest {
    pub fn new(current_scene: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Turn,
            current_scene: current_scene.into(),
            user_text: user_text.into(),
            history: Vec::new(),
        }
    }

    /// A story-plan request. The user's words are sent as the whole prompt.
    pub fn story(current_scene: impl Into<String>, user_text: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Story,
            ..Self::new(current_scene, user_text)
        }
    }

    pub fn with_history(mut self, history: Vec<Exchange>) -> Self {
        self.history = history;
        self
    }

    /// Render the prompt. Story requests send the user's words verbatim;
    /// turns look like this:
    ///
    /// ```text
    /// Previous Turns:
    /// - [HOME] User: "hi" / Narrator: "hello"
    ///
    /// Current Scene: HOME
    /// User Speech: "take me to the market"
    /// ```
    pub fn prompt(&self) -> String {
        if self.kind == RequestKind::Story {
            return self.user_text.clone();
        }
        let mut out = String::new();
        if !self.history.is_empty() {
            out.push_str("Previous Turns:\n");
            for ex in &self.history {
                out.push_str(&format!(
                    "- [{}] User: \"{}\" / Narrator: \"{}\"\n",
                    ex.scene, ex.user_text, ex.narrative
                ));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "Current Scene: {}\nUser Speech: \"{}\"",
            self.current_scene, self.user_text
        ));
        out
    }
}

// ─── DecisionService ──────────────────────────────────────────────────────

/// The external component that turns user speech plus the current scene into
/// narration and a next-scene token.
///
/// Implementations return the raw response text; fence stripping and JSON
/// parsing belong to the caller so every backend is parsed the same way.
/// Implementations may block for a long time; callers apply their own
/// timeout.
#[async_trait]
pub trait DecisionService: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<String>;
}

// ─── Tests ────────────────────────────────────────────────────────────────
