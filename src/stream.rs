//! Presentation re-chunking of the response stream.
//!
//! The provider delivers text in whatever chunk sizes it likes. For a
//! smooth typing effect the UI wants small, evenly sized appends instead,
//! so each incoming fragment is re-sliced into consecutive substrings of at
//! most [`SLICE_CHARS`] characters with a brief pause between slices. This
//! is presentation only: fragment order and character order are preserved
//! exactly, and slices never merge across fragment boundaries.

use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};

use crate::error::PlaygroundError;

/// Maximum characters per emitted slice.
pub const SLICE_CHARS: usize = 10;

/// Pause between consecutive slices.
pub const SLICE_PAUSE: Duration = Duration::from_millis(10);

/// Re-slices a provider fragment stream into at-most-[`SLICE_CHARS`]
/// character pieces, pacing them with [`SLICE_PAUSE`].
///
/// An `Err` item from upstream is forwarded in order: every slice of every
/// earlier fragment is emitted first, and nothing already emitted is rolled
/// back.
pub fn rechunk<S>(upstream: S) -> impl Stream<Item = Result<String, PlaygroundError>> + Send
where
    S: Stream<Item = Result<String, PlaygroundError>> + Send + 'static,
{
    upstream
        .map(|fragment| match fragment {
            Ok(text) => stream::iter(slices(&text).into_iter().map(Ok).collect::<Vec<_>>()),
            Err(e) => stream::iter(vec![Err(e)]),
        })
        .flatten()
        .then(|item| async move {
            if item.is_ok() {
                tokio::time::sleep(SLICE_PAUSE).await;
            }
            item
        })
}

/// Consecutive char-boundary slices of at most [`SLICE_CHARS`] characters.
fn slices(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(SLICE_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slices_preserve_fragment_and_character_order() {
        let upstream = stream::iter(vec![
            Ok::<_, PlaygroundError>("abcdefghijk".to_string()),
            Ok("lmno".to_string()),
        ]);

        let emitted: Vec<String> = rechunk(upstream)
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(emitted, ["abcdefghij", "k", "lmno"]);
        assert_eq!(emitted.concat(), "abcdefghijklmno");
    }

    #[tokio::test]
    async fn slices_do_not_merge_across_fragments() {
        let upstream = stream::iter(vec![
            Ok::<_, PlaygroundError>("abc".to_string()),
            Ok("def".to_string()),
        ]);

        let emitted: Vec<String> = rechunk(upstream)
            .map(|item| item.unwrap())
            .collect()
            .await;

        // two short fragments stay two slices, never one merged "abcdef"
        assert_eq!(emitted, ["abc", "def"]);
    }

    #[tokio::test]
    async fn error_is_forwarded_after_prior_slices() {
        let upstream = stream::iter(vec![
            Ok("hello!".to_string()),
            Err(PlaygroundError::ProviderError("quota".to_string())),
        ]);

        let emitted: Vec<Result<String, PlaygroundError>> = rechunk(upstream).collect().await;

        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].as_deref().unwrap(), "hello!");
        assert!(matches!(
            emitted[1],
            Err(PlaygroundError::ProviderError(_))
        ));
    }

    #[tokio::test]
    async fn multibyte_text_slices_on_char_boundaries() {
        let upstream = stream::iter(vec![Ok::<_, PlaygroundError>(
            "héllo wörld päräde".to_string(),
        )]);

        let emitted: Vec<String> = rechunk(upstream)
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(emitted.concat(), "héllo wörld päräde");
        assert!(emitted.iter().all(|s| s.chars().count() <= SLICE_CHARS));
    }
}
