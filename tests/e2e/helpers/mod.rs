use chrono::Utc;
use httpmock::prelude::*;
use httpmock::Mock;
use std::collections::HashMap;
use std::path::Path;
use text_to_audio::infrastructure::config::Config;

pub const IAM_PATH: &str = "/iam/v1/tokens";
pub const TTS_PATH: &str = "/speech/v1/tts:synthesize";

/// Samples returned for every successful synthesis call
pub const CHUNK_SAMPLES: [i16; 4] = [100, -100, 200, -200];

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {}: {}", path.display(), e))
}

pub fn pcm_body(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Five paragraphs that segment into exactly one chunk each at `MAX_CHUNK_SIZE=60`.
///
/// Paragraph `n` contains the word `markerN`, so mocks can tell chunks apart.
pub fn five_chunk_text() -> String {
    (0..5)
        .map(|i| format!("Chunk marker{} says hello to the listener today.", i))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn write_input(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write input document");
    path
}

/// Configuration pointing at the mock servers, tuned for fast tests
pub fn test_config(iam: &MockServer, tts: &MockServer, temp_root: &Path, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    let mut set = |name: &str, value: String| {
        vars.insert(name.to_string(), value);
    };

    set("YANDEX_KEY_ID", "ajetestkeyid".to_string());
    set("YANDEX_SERVICE_ACCOUNT_ID", "ajetestaccount".to_string());
    set("YANDEX_PRIVATE_KEY", fixture("service_account_private.pem"));
    set("YANDEX_PUBLIC_KEY", fixture("service_account_public.pem"));
    set("IAM_TOKEN_URL", iam.url(IAM_PATH));
    set("SPEECHKIT_TTS_URL", tts.url(TTS_PATH));
    set("YANDEX_FOLDER_ID", "b1gtestfolder".to_string());
    set("MAX_CHUNK_SIZE", "60".to_string());
    set("MAX_RETRIES", "3".to_string());
    set("RETRY_DELAY", "0.01".to_string());
    set("MAX_RETRY_DELAY", "0.05".to_string());
    set("RETRY_JITTER", "0".to_string());
    set("REQUESTS_PER_SECOND", "200".to_string());
    set("RATE_LIMIT_BURST", "50".to_string());
    set("MAX_CONCURRENCY", "4".to_string());
    set("SYNTHESIS_SAMPLE_RATE", "8000".to_string());
    set("GAP_MARKER_MS", "100".to_string());
    set("REQUEST_TIMEOUT", "5".to_string());
    set("TEMP_DIR", temp_root.display().to_string());
    for (name, value) in overrides {
        set(name, value.to_string());
    }

    Config::from_lookup(|name| vars.get(name).cloned()).expect("test configuration is valid")
}

/// IAM endpoint handing out `token` valid for an hour
pub async fn mock_iam<'a>(server: &'a MockServer, token: &str) -> Mock<'a> {
    let expires_at = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    let body = serde_json::json!({ "iamToken": token, "expiresAt": expires_at });
    server
        .mock_async(|when, then| {
            when.method(POST).path(IAM_PATH).body_contains("\"jwt\"");
            then.status(200).json_body(body);
        })
        .await
}

/// Synthesis succeeds for every chunk except `marker2`
pub async fn mock_tts_except_marker2(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path(TTS_PATH).matches(|req| {
                let body = req.body.as_deref().unwrap_or_default();
                !String::from_utf8_lossy(body).contains("marker2")
            });
            then.status(200).body(pcm_body(&CHUNK_SAMPLES));
        })
        .await
}

/// Synthesis of `marker2` answers with `status`
pub async fn mock_tts_marker2(server: &MockServer, status: u16) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path(TTS_PATH).body_contains("marker2");
            if status == 200 {
                then.status(200).body(pcm_body(&CHUNK_SAMPLES));
            } else {
                then.status(status).body("synthesis backend unavailable");
            }
        })
        .await
}

pub fn wav_samples(path: &Path) -> Vec<i16> {
    hound::WavReader::open(path)
        .expect("output is a WAV file")
        .samples::<i16>()
        .map(|s| s.expect("readable sample"))
        .collect()
}
