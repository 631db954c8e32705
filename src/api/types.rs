use serde::{Deserialize, Serialize};

use crate::chat::Transcript;

/// Request payload for appending a user text turn
#[derive(Deserialize)]
pub struct MessageRequest {
    /// Text typed into the prompt box; empty input appends nothing
    pub text: String,
    /// The client's current transcript
    #[serde(default)]
    pub transcript: Transcript,
}

/// Response payload carrying the updated transcript
#[derive(Serialize)]
pub struct TranscriptResponse {
    pub transcript: Transcript,
}

/// Response payload for an upload
#[derive(Serialize)]
pub struct UploadResponse {
    /// Transcript with one image turn appended per uploaded file
    pub transcript: Transcript,
    /// Cached filenames, in upload order — pass these as the next generate
    /// call's attachments
    pub attachments: Vec<String>,
}

/// Request payload for a generation turn
#[derive(Deserialize)]
pub struct GenerateRequest {
    /// Explicit API key; overrides the server's environment key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Cached image filenames attached to this call
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Token limit for the reply
    pub max_output_tokens: u32,
    /// Comma-separated stop sequences, may be empty
    #[serde(default)]
    pub stop_sequences: String,
    /// Top-k sampling parameter
    pub top_k: u32,
    /// Top-p sampling parameter
    pub top_p: f32,
    /// The client's current transcript
    #[serde(default)]
    pub transcript: Transcript,
}
