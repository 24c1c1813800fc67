use crate::domain::auth::AuthToken;
use crate::domain::text::TextChunk;
use crate::domain::tts::{AudioSegment, SynthesisError, VoiceParams};
use async_trait::async_trait;

/// One call to the remote voice synthesis service.
/// Abstracts the provider (SpeechKit over HTTP, scripted fakes in tests)
///
/// Implementations are responsible for:
/// - Shaping the chunk text into a provider request
/// - Classifying failures into `SynthesisError` kinds
///
/// Retrying, pacing and token refresh live in the dispatcher.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Synthesize a single chunk with the given voice and bearer token
    ///
    /// # Errors
    /// `RateLimited` or `Transient` when a retry may succeed, `AuthExpired` when the token
    /// was rejected, `Permanent` otherwise
    async fn synthesize(
        &self,
        chunk: &TextChunk,
        voice: &VoiceParams,
        token: &AuthToken,
    ) -> Result<AudioSegment, SynthesisError>;
}
