//! Conversation data model.
//!
//! A conversation is an ordered [`Transcript`] of [`ChatTurn`]s. Each turn
//! pairs an optional user contribution with the model's eventual reply. User
//! contributions are an explicit two-variant type — plain text to send, or a
//! reference to an already-cached image — so downstream code never inspects
//! strings to tell them apart.
//!
//! The transcript serializes to JSON and is round-tripped through the HTTP
//! API: the browser owns its transcript and posts it back with every
//! transition, so the server keeps no per-session state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The user's half of a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UserContent {
    /// Plain text to send to the model
    Text(String),
    /// Path of an image already resized and cached in the temp directory
    ImageRef(PathBuf),
}

/// One exchange unit: a user contribution and its eventual model response.
///
/// `model` is `None` until a response starts streaming, then holds the
/// accumulated text. Once generation has started the model slot is only ever
/// appended to, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// The user contribution, absent for model-only turns
    pub user: Option<UserContent>,
    /// Accumulated model reply, absent until streaming begins
    pub model: Option<String>,
}

/// An ordered, append-only sequence of chat turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// All turns in chronological order.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Appends a plain-text user turn with no model content yet.
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            user: Some(UserContent::Text(text.into())),
            model: None,
        });
    }

    /// Appends an image turn with no model content yet.
    ///
    /// Each uploaded image becomes its own turn; images are never batched
    /// with a text turn automatically.
    pub fn push_image(&mut self, path: impl Into<PathBuf>) {
        self.turns.push(ChatTurn {
            user: Some(UserContent::ImageRef(path.into())),
            model: None,
        });
    }

    /// Marks the final turn as awaiting a response by setting its model slot
    /// to the empty string. No-op on an empty transcript.
    pub fn begin_reply(&mut self) {
        if let Some(turn) = self.turns.last_mut() {
            turn.model = Some(String::new());
        }
    }

    /// Appends a slice of streamed reply text to the final turn.
    ///
    /// Reply text only accumulates; nothing already delivered is rewritten.
    pub fn push_reply(&mut self, slice: &str) {
        if let Some(turn) = self.turns.last_mut() {
            turn.model.get_or_insert_with(String::new).push_str(slice);
        }
    }

    /// The final turn's user text, if and only if that turn's user slot is
    /// plain text. Image turns and empty transcripts yield `None`.
    pub fn last_user_text(&self) -> Option<String> {
        match self.turns.last()?.user.as_ref()? {
            UserContent::Text(text) => Some(text.clone()),
            UserContent::ImageRef(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_text_appends_open_turn() {
        let mut transcript = Transcript::new();
        transcript.push_text("hi");
        assert_eq!(transcript.len(), 1);
        assert_eq!(
            transcript.turns()[0].user,
            Some(UserContent::Text("hi".into()))
        );
        assert_eq!(transcript.turns()[0].model, None);
    }

    #[test]
    fn reply_accumulates_without_rewriting() {
        let mut transcript = Transcript::new();
        transcript.push_text("hi");
        transcript.begin_reply();
        assert_eq!(transcript.turns()[0].model.as_deref(), Some(""));

        transcript.push_reply("hel");
        transcript.push_reply("lo");
        assert_eq!(transcript.turns()[0].model.as_deref(), Some("hello"));
    }

    #[test]
    fn last_user_text_only_for_text_turns() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.last_user_text(), None);

        transcript.push_image("/tmp/cached.jpeg");
        assert_eq!(transcript.last_user_text(), None);

        transcript.push_text("describe this");
        assert_eq!(transcript.last_user_text(), Some("describe this".into()));
    }

    #[test]
    fn transcript_round_trips_through_json() {
        let mut transcript = Transcript::new();
        transcript.push_text("hi");
        transcript.push_image("/tmp/cached.jpeg");
        transcript.begin_reply();
        transcript.push_reply("ok");

        let json = serde_json::to_string(&transcript).unwrap();
        let back: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(back, transcript);
    }

    #[test]
    fn user_content_serializes_tagged() {
        let value = serde_json::to_value(UserContent::Text("hi".into())).unwrap();
        assert_eq!(value, serde_json::json!({"type": "text", "value": "hi"}));
    }
}
