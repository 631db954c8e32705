use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::Html,
    Json,
};
use futures::stream::{self, Stream, StreamExt};

use super::ServerState;
use crate::chat::Transcript;
use crate::controller::{self, TurnOutput};
use crate::error::PlaygroundError;
use crate::google::{self, Gemini, GenerationConfig};
use crate::imaging;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// Serves the declarative UI shell. All conversation state lives in the
/// page; the endpoints below are pure transitions over it.
pub async fn ui() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

/// Appends a user text turn to the posted transcript.
pub async fn handle_message(
    Json(req): Json<super::MessageRequest>,
) -> Json<super::TranscriptResponse> {
    let transcript = controller::push_user_text(&req.text, req.transcript);
    Json(super::TranscriptResponse { transcript })
}

/// Accepts a multipart upload: a `transcript` JSON field plus one or more
/// image files. Each file becomes its own image turn, in upload order.
///
/// # Returns
/// * `Ok(Json<UploadResponse>)` - Updated transcript and cached filenames
/// * `Err((StatusCode, String))` - Error response with status code and message
pub async fn handle_upload(
    mut multipart: Multipart,
) -> Result<Json<super::UploadResponse>, (StatusCode, String)> {
    let mut transcript = Transcript::new();
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("transcript") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                transcript = serde_json::from_str(&text)
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            }
            _ => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                images.push(
                    imaging::decode(&bytes)
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
                );
            }
        }
    }

    let mut attachments = Vec::with_capacity(images.len());
    for image in &images {
        let (next, path) = controller::attach_image(image, transcript)
            .map_err(|e| (error_status(&e), e.to_string()))?;
        transcript = next;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            attachments.push(name.to_string());
        }
    }

    Ok(Json(super::UploadResponse {
        transcript,
        attachments,
    }))
}

/// Runs a generation turn and streams full-transcript snapshots back as
/// server-sent events.
///
/// A missing credential fails fast with 400 before the stream opens. A
/// remote error mid-stream is delivered as a terminal `error` event after
/// the partial snapshots — already-rendered text is never rolled back.
pub async fn handle_generate(
    State(state): State<ServerState>,
    Json(req): Json<super::GenerateRequest>,
) -> Result<Sse<SseStream>, (StatusCode, String)> {
    let api_key =
        controller::resolve_api_key(req.api_key.as_deref(), state.env_api_key.as_deref())
            .map_err(|e| (error_status(&e), e.to_string()))?;

    let config = GenerationConfig {
        temperature: req.temperature,
        max_output_tokens: req.max_output_tokens,
        stop_sequences: google::parse_stop_sequences(&req.stop_sequences),
        top_k: req.top_k,
        top_p: req.top_p,
    };

    // attachments come back as bare cache filenames; anything else in the
    // path is discarded so the server only ever reads its own cache
    let attachments: Vec<PathBuf> = req
        .attachments
        .iter()
        .filter_map(|name| attachment_path(name))
        .collect();

    let provider = Gemini::new(api_key, None);
    let output = controller::run_turn(&provider, &attachments, &config, req.transcript)
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;

    let events: SseStream = match output {
        TurnOutput::Unchanged(transcript) => {
            Box::pin(stream::iter(vec![Ok(snapshot_event(&transcript))]))
        }
        TurnOutput::Streaming(snapshots) => Box::pin(snapshots.map(|item| {
            Ok(match item {
                Ok(transcript) => snapshot_event(&transcript),
                Err(e) => Event::default().event("error").data(e.to_string()),
            })
        })),
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn snapshot_event(transcript: &Transcript) -> Event {
    match Event::default().event("snapshot").json_data(transcript) {
        Ok(event) => event,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

fn attachment_path(name: &str) -> Option<PathBuf> {
    let file_name = Path::new(name).file_name()?;
    Some(imaging::cache_dir().join(file_name))
}

fn error_status(err: &PlaygroundError) -> StatusCode {
    match err {
        PlaygroundError::ConfigError(_) | PlaygroundError::InputError(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
