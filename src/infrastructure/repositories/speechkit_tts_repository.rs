use super::tts_repository::SynthesisClient;
use crate::domain::auth::AuthToken;
use crate::domain::text::{clean_for_synthesis, TextChunk};
use crate::domain::tts::{AudioCodec, AudioSegment, SynthesisError, VoiceParams};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

pub const DEFAULT_SPEECHKIT_TTS_URL: &str =
    "https://tts.api.cloud.yandex.net/speech/v1/tts:synthesize";

/// Longest error body echoed into logs and reports
const MAX_ERROR_BODY_CHARS: usize = 300;

/// SpeechKit v1 synthesis over HTTP, returning raw mono LPCM
pub struct SpeechKitClient {
    endpoint: String,
    folder_id: Option<String>,
    http_client: reqwest::Client,
}

impl SpeechKitClient {
    pub fn new(
        endpoint: String,
        folder_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            folder_id,
            http_client,
        })
    }
}

/// Map a non-success status to a failure class
pub fn classify_status(status: StatusCode, body: &str) -> SynthesisError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate(body));
    match status {
        StatusCode::UNAUTHORIZED => SynthesisError::AuthExpired(detail),
        StatusCode::TOO_MANY_REQUESTS => SynthesisError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT => SynthesisError::Transient(detail),
        s if s.is_server_error() => SynthesisError::Transient(detail),
        _ => SynthesisError::Permanent(detail),
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut shortened: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    shortened.push('…');
    shortened
}

#[async_trait]
impl SynthesisClient for SpeechKitClient {
    async fn synthesize(
        &self,
        chunk: &TextChunk,
        voice: &VoiceParams,
        token: &AuthToken,
    ) -> Result<AudioSegment, SynthesisError> {
        let text = clean_for_synthesis(&chunk.text);
        if text.is_empty() {
            return Err(SynthesisError::Permanent(format!(
                "chunk {} has no speakable text after cleaning",
                chunk.index
            )));
        }

        let sample_rate = voice.sample_rate.to_string();
        let mut params = vec![
            ("text", text.as_str()),
            ("lang", voice.language.as_str()),
            ("voice", voice.voice.as_str()),
            ("emotion", voice.role.as_str()),
            ("format", "lpcm"),
            ("sampleRateHertz", sample_rate.as_str()),
        ];
        if let Some(folder_id) = &self.folder_id {
            params.push(("folderId", folder_id.as_str()));
        }

        tracing::debug!(
            chunk_index = chunk.index,
            voice = %voice.voice,
            role = %voice.role,
            text_length = text.chars().count(),
            "Calling SpeechKit synthesize"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&token.value)
            .form(&params)
            .send()
            .await
            .map_err(|e| SynthesisError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &error_text));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Transient(format!("failed to read audio body: {}", e)))?;

        if audio.is_empty() {
            return Err(SynthesisError::Transient("empty audio body".to_string()));
        }
        if audio.len() % 2 != 0 {
            return Err(SynthesisError::Transient(format!(
                "truncated PCM body of {} bytes",
                audio.len()
            )));
        }

        tracing::debug!(
            chunk_index = chunk.index,
            audio_size = audio.len(),
            "SpeechKit synthesize successful"
        );

        Ok(AudioSegment {
            chunk_index: chunk.index,
            codec: AudioCodec::Lpcm,
            sample_rate: voice.sample_rate,
            channel_count: 1,
            payload: audio.to_vec(),
        })
    }
}
