use crate::helpers::{pcm_body, CHUNK_SAMPLES, TTS_PATH};
use chrono::Utc;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use std::time::Duration;
use text_to_audio::domain::auth::AuthToken;
use text_to_audio::domain::text::TextChunk;
use text_to_audio::domain::tts::{AudioCodec, SynthesisError, VoiceParams};
use text_to_audio::infrastructure::repositories::{SpeechKitClient, SynthesisClient};

fn chunk(text: &str) -> TextChunk {
    TextChunk {
        index: 3,
        text: text.to_string(),
        char_range: 120..120 + text.chars().count(),
    }
}

fn voice() -> VoiceParams {
    VoiceParams {
        voice: "jane".to_string(),
        role: "good".to_string(),
        language: "ru-RU".to_string(),
        sample_rate: 8000,
    }
}

fn token(value: &str) -> AuthToken {
    let now = Utc::now();
    AuthToken::new(value, now, now + chrono::Duration::hours(1))
}

fn client(server: &MockServer) -> SpeechKitClient {
    SpeechKitClient::new(
        server.url(TTS_PATH),
        Some("b1gtestfolder".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

async fn synthesize_with_status(status: u16, body: &str) -> SynthesisError {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(TTS_PATH);
            then.status(status).body(body);
        })
        .await;

    client(&server)
        .synthesize(&chunk("Hello there."), &voice(), &token("t-1"))
        .await
        .unwrap_err()
}

#[tokio::test]
async fn it_should_send_form_fields_with_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(TTS_PATH)
                .header("Authorization", "Bearer t-1")
                .body_contains("voice=jane")
                .body_contains("emotion=good")
                .body_contains("lang=ru-RU")
                .body_contains("format=lpcm")
                .body_contains("sampleRateHertz=8000")
                .body_contains("folderId=b1gtestfolder");
            then.status(200).body(pcm_body(&CHUNK_SAMPLES));
        })
        .await;

    let segment = client(&server)
        .synthesize(&chunk("Hello there!!! How are you???"), &voice(), &token("t-1"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(segment.chunk_index, 3);
    assert_eq!(segment.codec, AudioCodec::Lpcm);
    assert_eq!(segment.sample_rate, 8000);
    assert_eq!(segment.channel_count, 1);
    assert_eq!(segment.payload, pcm_body(&CHUNK_SAMPLES));
}

#[tokio::test]
async fn it_should_classify_rate_limiting() {
    let error = synthesize_with_status(429, "Too Many Requests").await;
    assert!(matches!(error, SynthesisError::RateLimited(_)), "{:?}", error);
}

#[tokio::test]
async fn it_should_classify_server_errors_as_transient() {
    let error = synthesize_with_status(500, "internal").await;
    assert!(matches!(error, SynthesisError::Transient(ref m) if m.contains("HTTP 500")), "{:?}", error);
}

#[tokio::test]
async fn it_should_classify_unauthorized_as_expired_token() {
    let error = synthesize_with_status(401, "The token has expired").await;
    assert!(matches!(error, SynthesisError::AuthExpired(_)), "{:?}", error);
}

#[tokio::test]
async fn it_should_classify_forbidden_as_permanent() {
    let error = synthesize_with_status(403, "Permission denied for folder").await;
    assert!(matches!(error, SynthesisError::Permanent(ref m) if m.contains("Permission denied")), "{:?}", error);
}

#[tokio::test]
async fn it_should_treat_an_empty_audio_body_as_transient() {
    let error = synthesize_with_status(200, "").await;
    assert!(matches!(error, SynthesisError::Transient(_)), "{:?}", error);
}

#[tokio::test]
async fn it_should_treat_connection_failures_as_transient() {
    let client = SpeechKitClient::new(
        "http://127.0.0.1:1/speech/v1/tts:synthesize".to_string(),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let error = client
        .synthesize(&chunk("Hello there."), &voice(), &token("t-1"))
        .await
        .unwrap_err();

    assert!(matches!(error, SynthesisError::Transient(_)), "{:?}", error);
}

#[tokio::test]
async fn it_should_not_call_the_service_for_unpronounceable_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(TTS_PATH);
            then.status(200).body(pcm_body(&CHUNK_SAMPLES));
        })
        .await;

    let error = client(&server)
        .synthesize(&chunk("### *** ###"), &voice(), &token("t-1"))
        .await
        .unwrap_err();

    assert!(matches!(error, SynthesisError::Permanent(_)));
    mock.assert_hits_async(0).await;
}
