//! Google Gemini API client for chat and vision generation.
//!
//! This module speaks the generativelanguage REST API directly: it defines
//! the wire types the `generateContent` family of endpoints expects, the
//! translation from an in-memory [`Transcript`] into role-tagged contents,
//! and a [`Gemini`] client that supports both buffered and streamed
//! generation.
//!
//! # Features
//! - Multi-turn text conversations against the text model variant
//! - Single-shot multimodal requests against the vision model variant
//! - Streaming via server-sent events (`alt=sse`)
//! - Generation parameters: temperature, token limit, stop sequences,
//!   top-k, top-p

use std::fs;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use base64::Engine;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::{Transcript, UserContent};
use crate::error::PlaygroundError;

/// Multi-turn text model variant.
pub const TEXT_MODEL: &str = "gemini-1.5-pro-latest";

/// Vision-capable model variant, used whenever images are attached.
pub const VISION_MODEL: &str = "gemini-pro-vision";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A stream of text fragments as the provider delivers them. Fragment sizes
/// are provider-controlled; see [`crate::stream::rechunk`] for presentation
/// re-slicing.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, PlaygroundError>> + Send>>;

/// The remote-generation seam the conversation controller dispatches
/// through. [`Gemini`] is the production implementation; tests substitute a
/// scripted one.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Sends a buffered generation request and returns the full reply text.
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &GenerationConfig,
    ) -> Result<String, PlaygroundError>;

    /// Sends a streaming generation request and returns the fragment stream.
    async fn generate_stream(
        &self,
        model: &str,
        contents: &[Content],
        config: &GenerationConfig,
    ) -> Result<TextStream, PlaygroundError>;
}

/// Role of a content entry in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One role-tagged entry in the request contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    /// Role of the sender ("user" or "model")
    pub role: Role,
    /// Content parts of the entry
    pub parts: Vec<Part>,
}

impl Content {
    /// A user entry holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Content {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// A model entry holding a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Content {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }
}

/// A single part within a content entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text
    Text { text: String },
    /// Inline binary payload (base64), used for image parts
    InlineData { inline_data: Blob },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// An inline image part from raw encoded bytes, MIME sniffed from the
    /// leading magic bytes (JPEG when unrecognized — the image cache only
    /// writes JPEG).
    pub fn inline_image(bytes: &[u8]) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: detect_image_mime(bytes).to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        }
    }
}

/// Base64-encoded binary payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Generation parameters, constructed fresh per call from the current UI
/// values. Not persisted anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_output_tokens: u32,
    /// Sequences that stop generation when encountered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Top-k sampling parameter
    #[serde(rename = "topK")]
    pub top_k: u32,
    /// Top-p sampling parameter
    #[serde(rename = "topP")]
    pub top_p: f32,
}

impl Default for GenerationConfig {
    /// The UI's slider defaults.
    fn default() -> Self {
        GenerationConfig {
            temperature: 0.4,
            max_output_tokens: 4096,
            stop_sequences: None,
            top_k: 32,
            top_p: 1.0,
        }
    }
}

/// Parses the comma-separated stop-sequence field into a list, trimming each
/// entry. An empty field yields `None`.
pub fn parse_stop_sequences(raw: &str) -> Option<Vec<String>> {
    if raw.is_empty() {
        return None;
    }
    Some(raw.split(',').map(|s| s.trim().to_string()).collect())
}

/// Translates a transcript into the ordered role-tagged contents the
/// multi-turn text endpoint expects.
///
/// Image turns contribute no entry — images travel out-of-band through the
/// vision call path, never mixed into text history. Text user slots emit a
/// `user` entry; present model slots (including the empty string of a turn
/// still streaming) emit a `model` entry. Order is preserved; the mapping is
/// total and never fails on a well-formed transcript.
pub fn transcript_to_contents(transcript: &Transcript) -> Vec<Content> {
    let mut contents = Vec::new();
    for turn in transcript.turns() {
        match &turn.user {
            Some(UserContent::ImageRef(_)) => {}
            Some(UserContent::Text(text)) => contents.push(Content::user_text(text.clone())),
            None => {}
        }
        if let Some(model) = &turn.model {
            contents.push(Content::model_text(model.clone()));
        }
    }
    contents
}

/// Builds the single user content for a vision request: an optional leading
/// text part followed by one inline-data part per cached image, in order.
pub fn vision_content(
    prompt: Option<&str>,
    images: &[PathBuf],
) -> Result<Content, PlaygroundError> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    if let Some(text) = prompt {
        parts.push(Part::text(text));
    }
    for path in images {
        let bytes = fs::read(path).map_err(|e| {
            PlaygroundError::InputError(format!("failed to read image {}: {}", path.display(), e))
        })?;
        parts.push(Part::inline_image(&bytes));
    }
    Ok(Content {
        role: Role::User,
        parts,
    })
}

/// Sniffs an image MIME type from its leading magic bytes.
fn detect_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if data.starts_with(&[0x47, 0x49, 0x46]) {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

/// Request body for the generateContent endpoints.
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    generation_config: &'a GenerationConfig,
}

/// Response from the generation API; streamed chunks carry the same shape.
#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: String,
}

/// Client for the Google generative-language API.
///
/// Holds the credential and a shared HTTP client; the model variant is
/// chosen per call so one client serves both the text and vision paths.
pub struct Gemini {
    /// API key for authentication
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,
    /// HTTP client for making API requests
    client: Client,
}

impl Gemini {
    /// Creates a new client with the given API key.
    pub fn new(api_key: impl Into<String>, timeout_seconds: Option<u64>) -> Self {
        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(std::time::Duration::from_secs(sec));
        }
        Self {
            api_key: api_key.into(),
            timeout_seconds,
            client: builder.build().expect("Failed to build reqwest Client"),
        }
    }

    fn endpoint(&self, model: &str, method: &str, sse: bool) -> String {
        let alt = if sse { "alt=sse&" } else { "" };
        format!(
            "{base}/{model}:{method}?{alt}key={key}",
            base = API_BASE,
            model = model,
            method = method,
            alt = alt,
            key = self.api_key
        )
    }
}

#[async_trait]
impl GenerativeProvider for Gemini {
    /// Sends a buffered generation request.
    ///
    /// # Returns
    ///
    /// The first candidate's part texts joined together, or an error.
    async fn generate(
        &self,
        model: &str,
        contents: &[Content],
        config: &GenerationConfig,
    ) -> Result<String, PlaygroundError> {
        if self.api_key.is_empty() {
            return Err(PlaygroundError::ConfigError(
                "Missing Google API key".to_string(),
            ));
        }

        let req_body = GenerateContentRequest {
            contents,
            generation_config: config,
        };

        log::debug!("generateContent: model={} contents={}", model, contents.len());

        let resp = self
            .client
            .post(self.endpoint(model, "generateContent", false))
            .json(&req_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(PlaygroundError::ProviderError(format!(
                "Gemini API returned error status {}: {}",
                status, error_text
            )));
        }

        let json_resp: GenerateContentResponse = resp.json().await?;
        let first_candidate = json_resp.candidates.into_iter().next().ok_or_else(|| {
            PlaygroundError::ProviderError("No candidates returned by Gemini".to_string())
        })?;

        Ok(first_candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    /// Sends a streaming generation request.
    ///
    /// # Returns
    ///
    /// A stream of text fragments in provider chunk sizes, or an error. A
    /// transport failure mid-stream surfaces as an `Err` item after the
    /// fragments already delivered.
    async fn generate_stream(
        &self,
        model: &str,
        contents: &[Content],
        config: &GenerationConfig,
    ) -> Result<TextStream, PlaygroundError> {
        if self.api_key.is_empty() {
            return Err(PlaygroundError::ConfigError(
                "Missing Google API key".to_string(),
            ));
        }

        let req_body = GenerateContentRequest {
            contents,
            generation_config: config,
        };

        log::debug!(
            "streamGenerateContent: model={} contents={}",
            model,
            contents.len()
        );

        let resp = self
            .client
            .post(self.endpoint(model, "streamGenerateContent", true))
            .json(&req_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(PlaygroundError::ProviderError(format!(
                "Gemini API returned error status {}: {}",
                status, error_text
            )));
        }

        Ok(create_sse_stream(resp))
    }
}

/// Turns a streaming HTTP response into a stream of text fragments, one per
/// SSE chunk that carried candidate text.
fn create_sse_stream(response: reqwest::Response) -> TextStream {
    let stream = response
        .bytes_stream()
        .map(|chunk| match chunk {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                parse_sse_chunk(&text)
            }
            Err(e) => Err(PlaygroundError::HttpError(e.to_string())),
        })
        .filter_map(|result| async move {
            match result {
                Ok(Some(content)) => Some(Ok(content)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        });

    Box::pin(stream)
}

/// Parses one SSE chunk, collecting the candidate text of every `data:`
/// line it carries. Lines that are not data, or not yet complete JSON, are
/// skipped.
fn parse_sse_chunk(chunk: &str) -> Result<Option<String>, PlaygroundError> {
    let mut collected = String::new();
    for line in chunk.lines() {
        let line = line.trim();
        if let Some(data) = line.strip_prefix("data: ") {
            match serde_json::from_str::<GenerateContentResponse>(data) {
                Ok(resp) => {
                    for candidate in &resp.candidates {
                        for part in &candidate.content.parts {
                            collected.push_str(&part.text);
                        }
                    }
                }
                Err(_) => continue,
            }
        }
    }
    if collected.is_empty() {
        Ok(None)
    } else {
        Ok(Some(collected))
    }
}


#[cfg(test)]
const LIVE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[tokio::test]
async fn test_gemini_generate_live() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = match std::env::var(LIVE_API_KEY_ENV) {
        Ok(key) => key,
        Err(_) => {
            eprintln!("test test_gemini_generate_live ... ignored, {LIVE_API_KEY_ENV} not set");
            return Ok(());
        }
    };
    let gemini = Gemini::new(api_key, Some(60));
    let contents = vec![Content::user_text("Reply with the single word: hello")];
    let text = gemini
        .generate(TEXT_MODEL, &contents, &GenerationConfig::default())
        .await?;
    assert!(!text.is_empty(), "Expected response text, got empty string");
    Ok(())
}

#[tokio::test]
async fn test_gemini_generate_stream_live() -> Result<(), Box<dyn std::error::Error>> {
    let api_key = match std::env::var(LIVE_API_KEY_ENV) {
        Ok(key) => key,
        Err(_) => {
            eprintln!(
                "test test_gemini_generate_stream_live ... ignored, {LIVE_API_KEY_ENV} not set"
            );
            return Ok(());
        }
    };
    let gemini = Gemini::new(api_key, Some(60));
    let contents = vec![Content::user_text("Count from 1 to 5.")];
    let mut stream = gemini
        .generate_stream(TEXT_MODEL, &contents, &GenerationConfig::default())
        .await?;
    let mut complete_text = String::new();
    while let Some(fragment) = stream.next().await {
        complete_text.push_str(&fragment?);
    }
    assert!(
        !complete_text.is_empty(),
        "Expected streamed text, got empty string"
    );
    Ok(())
}
