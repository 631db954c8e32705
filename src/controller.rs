//! Conversation turn-taking.
//!
//! Each transition here takes the transcript in and hands it back (or hands
//! back a stream of its snapshots) — the UI event loop owns the single
//! mutable instance per session and there is no shared conversation state.
//! Calls are strictly serialized per session: a new submission while a turn
//! is streaming is undefined here, and the UI layer disables resubmission
//! until the stream drains.

use std::path::PathBuf;
use std::pin::Pin;

use futures::stream::{Stream, StreamExt};
use image::DynamicImage;

use crate::chat::Transcript;
use crate::error::PlaygroundError;
use crate::google::{self, GenerationConfig, GenerativeProvider};
use crate::imaging;
use crate::stream::rechunk;

/// A stream of full-transcript snapshots, one per appended reply slice.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Transcript, PlaygroundError>> + Send>>;

/// Outcome of [`run_turn`].
pub enum TurnOutput {
    /// The transcript had no turns; nothing was sent and it is returned
    /// untouched.
    Unchanged(Transcript),
    /// A remote call was dispatched; snapshots follow as the reply streams.
    Streaming(SnapshotStream),
}

/// Resolves the active API key: an explicit non-empty field value overrides
/// the environment-provided default; neither present is a configuration
/// error. This runs before any remote call, whatever the transcript holds.
pub fn resolve_api_key(
    field: Option<&str>,
    env: Option<&str>,
) -> Result<String, PlaygroundError> {
    field
        .filter(|key| !key.is_empty())
        .or(env)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            PlaygroundError::ConfigError(
                "GOOGLE_API_KEY is not set. Provide it in the API key field or the environment."
                    .to_string(),
            )
        })
}

/// Appends a plain-text user turn. Empty input appends nothing.
pub fn push_user_text(text: &str, mut transcript: Transcript) -> Transcript {
    if !text.is_empty() {
        transcript.push_text(text);
    }
    transcript
}

/// Preprocesses and caches one decoded image, appending it as its own turn.
/// Returns the updated transcript and the cached path.
pub fn attach_image(
    image: &DynamicImage,
    mut transcript: Transcript,
) -> Result<(Transcript, PathBuf), PlaygroundError> {
    let resized = imaging::preprocess(image)?;
    let path = imaging::cache(&resized)?;
    transcript.push_image(path.clone());
    Ok((transcript, path))
}

/// Attaches a batch of image files in upload order, one independent turn
/// each. Returns the cached paths for use as the next call's attachments.
pub fn attach_images(
    files: &[PathBuf],
    mut transcript: Transcript,
) -> Result<(Transcript, Vec<PathBuf>), PlaygroundError> {
    let mut cached = Vec::with_capacity(files.len());
    for file in files {
        let image = imaging::load(file)?;
        let (next, path) = attach_image(&image, transcript)?;
        transcript = next;
        cached.push(path);
    }
    Ok((transcript, cached))
}

/// Runs one generation turn.
///
/// An empty transcript is a no-op: it is returned unchanged and no remote
/// call is made. Otherwise the call branches on the attachments of *this*
/// invocation: with images present the vision model variant is used and the
/// input is the final turn's plain text (only if the immediately preceding
/// turn is a text turn) plus the cached images; without, the multi-turn
/// text variant gets the translated transcript history.
///
/// The final turn's model slot is set to the empty string once the remote
/// call is dispatched, and every re-chunked slice appends to it and yields
/// a snapshot of the whole transcript. A mid-stream remote error surfaces
/// after the partial snapshots; the turn keeps whatever text it had — no
/// rollback, no retry.
pub async fn run_turn<P>(
    provider: &P,
    attachments: &[PathBuf],
    config: &GenerationConfig,
    transcript: Transcript,
) -> Result<TurnOutput, PlaygroundError>
where
    P: GenerativeProvider + ?Sized,
{
    if transcript.is_empty() {
        return Ok(TurnOutput::Unchanged(transcript));
    }

    let upstream = if attachments.is_empty() {
        let contents = google::transcript_to_contents(&transcript);
        provider
            .generate_stream(google::TEXT_MODEL, &contents, config)
            .await?
    } else {
        let prompt = transcript.last_user_text();
        let content = google::vision_content(prompt.as_deref(), attachments)?;
        provider
            .generate_stream(google::VISION_MODEL, &[content], config)
            .await?
    };

    let mut transcript = transcript;
    transcript.begin_reply();

    let snapshots = rechunk(upstream).map(move |item| {
        item.map(|slice| {
            transcript.push_reply(&slice);
            transcript.clone()
        })
    });

    Ok(TurnOutput::Streaming(Box::pin(snapshots)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    use crate::google::{Content, Part, TextStream};

    /// Replays scripted fragments and records what it was asked for.
    struct ScriptedProvider {
        fragments: Vec<Result<String, String>>,
        calls: Mutex<Vec<(String, Vec<Content>)>>,
    }

    impl ScriptedProvider {
        fn new(fragments: Vec<Result<String, String>>) -> Self {
            Self {
                fragments,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Vec<Content>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeProvider for ScriptedProvider {
        async fn generate(
            &self,
            _model: &str,
            _contents: &[Content],
            _config: &GenerationConfig,
        ) -> Result<String, PlaygroundError> {
            unimplemented!("controller only streams")
        }

        async fn generate_stream(
            &self,
            model: &str,
            contents: &[Content],
            _config: &GenerationConfig,
        ) -> Result<TextStream, PlaygroundError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), contents.to_vec()));
            let items: Vec<Result<String, PlaygroundError>> = self
                .fragments
                .clone()
                .into_iter()
                .map(|f| f.map_err(PlaygroundError::ProviderError))
                .collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[test]
    fn explicit_key_overrides_environment() {
        assert_eq!(
            resolve_api_key(Some("field"), Some("env")).unwrap(),
            "field"
        );
    }

    #[test]
    fn empty_field_falls_back_to_environment() {
        assert_eq!(resolve_api_key(Some(""), Some("env")).unwrap(), "env");
        assert_eq!(resolve_api_key(None, Some("env")).unwrap(), "env");
    }

    #[test]
    fn missing_credential_is_config_error() {
        assert!(matches!(
            resolve_api_key(None, None),
            Err(PlaygroundError::ConfigError(_))
        ));
        assert!(matches!(
            resolve_api_key(Some(""), None),
            Err(PlaygroundError::ConfigError(_))
        ));
    }

    #[test]
    fn empty_text_submission_appends_nothing() {
        let transcript = push_user_text("", Transcript::new());
        assert!(transcript.is_empty());

        let transcript = push_user_text("hi", transcript);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn two_uploads_become_two_turns_in_order() {
        let a = DynamicImage::new_rgb8(10, 10);
        let b = DynamicImage::new_rgb8(20, 10);

        let (transcript, path_a) = attach_image(&a, Transcript::new()).unwrap();
        let (transcript, path_b) = attach_image(&b, transcript).unwrap();

        assert_eq!(transcript.len(), 2);
        assert_ne!(path_a, path_b);
        use crate::chat::UserContent;
        assert_eq!(
            transcript.turns()[0].user,
            Some(UserContent::ImageRef(path_a))
        );
        assert_eq!(
            transcript.turns()[1].user,
            Some(UserContent::ImageRef(path_b))
        );
        assert_eq!(transcript.turns()[0].model, None);
        assert_eq!(transcript.turns()[1].model, None);
    }

    #[tokio::test]
    async fn empty_transcript_is_a_no_op() {
        let provider = ScriptedProvider::new(vec![Ok("never".into())]);

        let output = run_turn(&provider, &[], &GenerationConfig::default(), Transcript::new())
            .await
            .unwrap();

        match output {
            TurnOutput::Unchanged(transcript) => assert!(transcript.is_empty()),
            TurnOutput::Streaming(_) => panic!("expected no-op"),
        }
        assert!(provider.calls().is_empty(), "no remote call expected");
    }

    #[tokio::test]
    async fn text_turn_streams_snapshots_through_history_path() {
        let provider =
            ScriptedProvider::new(vec![Ok("abcdefghijk".into()), Ok("lmno".into())]);
        let mut transcript = Transcript::new();
        transcript.push_text("hi");

        let output = run_turn(&provider, &[], &GenerationConfig::default(), transcript)
            .await
            .unwrap();
        let snapshots = match output {
            TurnOutput::Streaming(snapshots) => snapshots,
            TurnOutput::Unchanged(_) => panic!("expected streaming"),
        };
        let snapshots: Vec<Transcript> = snapshots.map(|s| s.unwrap()).collect().await;

        // one snapshot per slice, model text growing monotonically
        let replies: Vec<String> = snapshots
            .iter()
            .map(|t| t.turns()[0].model.clone().unwrap())
            .collect();
        assert_eq!(replies, ["abcdefghij", "abcdefghijk", "abcdefghijklmno"]);

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, google::TEXT_MODEL);
        assert_eq!(calls[0].1, vec![Content::user_text("hi")]);
    }

    #[tokio::test]
    async fn attachments_dispatch_to_vision_variant() {
        let provider = ScriptedProvider::new(vec![Ok("a table".into())]);

        // a real cached file, as the vision path reads attachments from disk
        let image = DynamicImage::new_rgb8(4, 4);
        let (transcript, cached) = attach_image(&image, Transcript::new()).unwrap();
        let transcript = push_user_text("what is in this image?", transcript);

        let output = run_turn(
            &provider,
            &[cached],
            &GenerationConfig::default(),
            transcript,
        )
        .await
        .unwrap();
        let snapshots = match output {
            TurnOutput::Streaming(snapshots) => snapshots,
            TurnOutput::Unchanged(_) => panic!("expected streaming"),
        };
        let snapshots: Vec<Transcript> = snapshots.map(|s| s.unwrap()).collect().await;
        assert!(!snapshots.is_empty());

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, google::VISION_MODEL);
        // one user content: leading text part plus one image part
        assert_eq!(calls[0].1.len(), 1);
        let parts = &calls[0].1[0].parts;
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], Part::Text { .. }));
        assert!(matches!(parts[1], Part::InlineData { .. }));

        // the reply lands on the final (text) turn
        let last = snapshots.last().unwrap();
        assert_eq!(
            last.turns().last().unwrap().model.as_deref(),
            Some("a table")
        );
    }

    #[tokio::test]
    async fn image_only_turn_sends_no_text_part() {
        let provider = ScriptedProvider::new(vec![Ok("described".into())]);

        let image = DynamicImage::new_rgb8(4, 4);
        let (transcript, cached) = attach_image(&image, Transcript::new()).unwrap();

        let output = run_turn(
            &provider,
            &[cached],
            &GenerationConfig::default(),
            transcript,
        )
        .await
        .unwrap();
        match output {
            TurnOutput::Streaming(snapshots) => {
                let _ = snapshots.collect::<Vec<_>>().await;
            }
            TurnOutput::Unchanged(_) => panic!("expected streaming"),
        }

        let calls = provider.calls();
        let parts = &calls[0].1[0].parts;
        assert_eq!(parts.len(), 1);
        assert!(matches!(parts[0], Part::InlineData { .. }));
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_reply() {
        let provider = ScriptedProvider::new(vec![
            Ok("hello!".into()),
            Err("quota exceeded".into()),
        ]);
        let mut transcript = Transcript::new();
        transcript.push_text("hi");

        let output = run_turn(&provider, &[], &GenerationConfig::default(), transcript)
            .await
            .unwrap();
        let items: Vec<Result<Transcript, PlaygroundError>> = match output {
            TurnOutput::Streaming(snapshots) => snapshots.collect().await,
            TurnOutput::Unchanged(_) => panic!("expected streaming"),
        };

        assert_eq!(items.len(), 2);
        let partial = items[0].as_ref().unwrap();
        assert_eq!(partial.turns()[0].model.as_deref(), Some("hello!"));
        assert!(matches!(items[1], Err(PlaygroundError::ProviderError(_))));
    }
}
