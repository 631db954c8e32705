//! Chat playground over the Google Gemini generative-language API.
//!
//! # Overview
//! This crate wires a conversation transcript to the hosted Gemini API and
//! streams replies back incrementally. It supports:
//!
//! - Multi-turn text chat with per-call sampling parameters
//! - Image uploads, resized and cached locally, sent through the
//!   vision-capable model variant
//! - Streamed responses re-chunked into small slices for a typing effect
//! - A browser UI served by an embedded HTTP server (feature `api`)
//! - A single-shot vision CLI (feature `cli`)
//!
//! # Architecture
//! The crate is organized into modules that each own one step of the flow:

/// Conversation transcript data model
pub mod chat;

/// Turn orchestration: key resolution, uploads, dispatch, streaming
pub mod controller;

/// Error types and handling
pub mod error;

/// Gemini wire types, history translation and the HTTP client
pub mod google;

/// Image resizing and the temp cache
pub mod imaging;

/// Secret store for the API key
pub mod secret_store;

/// Presentation re-chunking of response streams
pub mod stream;

/// HTTP server exposing the browser UI
#[cfg(feature = "api")]
pub mod api;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
/// This is a no-op if the feature is not enabled.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
