use crate::helpers::{
    five_chunk_text, mock_iam, mock_tts_except_marker2, mock_tts_marker2, test_config,
    wav_samples, write_input, CHUNK_SAMPLES, TTS_PATH,
};
use clap::Parser;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use std::ffi::OsString;
use tempfile::TempDir;
use text_to_audio::app;
use text_to_audio::cli::Cli;
use text_to_audio::domain::audio::OutputFormat;
use text_to_audio::domain::pipeline::RunStatus;
use text_to_audio::domain::text::{Document, SourceFormat};
use text_to_audio::error::ExitStatus;
use text_to_audio::infrastructure::transcode::FfmpegTranscoder;
use tokio::sync::watch;

fn cli(input: &std::path::Path, output: &std::path::Path) -> Cli {
    let args: Vec<OsString> = vec![
        "text-to-audio".into(),
        "--input".into(),
        input.into(),
        "--output".into(),
        output.into(),
        "--format".into(),
        "wav".into(),
    ];
    Cli::parse_from(args)
}

fn no_abort() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[tokio::test]
async fn it_should_write_wav_for_a_successful_run() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    let iam_mock = mock_iam(&iam, "token-1").await;
    let tts_mock = tts
        .mock_async(|when, then| {
            when.method(POST)
                .path(TTS_PATH)
                .header("Authorization", "Bearer token-1")
                .body_contains("format=lpcm")
                .body_contains("sampleRateHertz=8000")
                .body_contains("folderId=b1gtestfolder");
            then.status(200).body(crate::helpers::pcm_body(&CHUNK_SAMPLES));
        })
        .await;

    let work = temp.path().join("work");
    let config = test_config(&iam, &tts, &work, &[]);
    let input = write_input(temp.path(), "story.txt", &five_chunk_text());
    let output = temp.path().join("out/story.wav");

    let report = app::run(&cli(&input, &output), &config, no_abort()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(ExitStatus::from_report(&report).code(), 0);
    assert_eq!(report.total_chunks, 5);
    assert_eq!(report.succeeded, 5);
    assert!(report.failed.is_empty());
    assert_eq!(report.output.as_deref(), Some(output.as_path()));
    assert!(report.retained_temp_dir.is_none());
    assert_eq!(report.output_bytes, Some(std::fs::metadata(&output).unwrap().len()));

    let samples = wav_samples(&output);
    assert_eq!(samples, CHUNK_SAMPLES.repeat(5));

    tts_mock.assert_hits_async(5).await;
    iam_mock.assert_hits_async(1).await;
    assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
}

#[tokio::test]
async fn it_should_report_partial_failure_when_a_chunk_keeps_failing() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    mock_iam(&iam, "token-1").await;
    let ok_mock = mock_tts_except_marker2(&tts).await;
    let failing_mock = mock_tts_marker2(&tts, 503).await;

    let config = test_config(&iam, &tts, &temp.path().join("work"), &[]);
    let input = write_input(temp.path(), "story.txt", &five_chunk_text());
    let output = temp.path().join("story.wav");

    let report = app::run(&cli(&input, &output), &config, no_abort()).await.unwrap();

    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(ExitStatus::from_report(&report).code(), 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed.len(), 1);

    let failed = &report.failed[0];
    assert_eq!(failed.index, 2);
    assert_eq!(failed.char_range, 98..147);
    assert_eq!(failed.attempts, 4);
    assert!(failed.error.contains("503"));

    assert!(report.output.is_none());
    assert!(!output.exists());
    let retained = report.retained_temp_dir.clone().unwrap();
    assert!(retained.join("chunk_0000.pcm").exists());
    assert!(retained.join("chunk_0004.json").exists());
    assert!(!retained.join("chunk_0002.pcm").exists());

    failing_mock.assert_hits_async(4).await;
    ok_mock.assert_hits_async(4).await;
    assert!(report.to_string().contains("chunk 2 (chars 98..147) failed after 4 attempt(s)"));
}

#[tokio::test]
async fn it_should_resume_and_only_synthesize_missing_chunks() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    mock_iam(&iam, "token-1").await;
    let ok_mock = mock_tts_except_marker2(&tts).await;
    let failing_mock = mock_tts_marker2(&tts, 500).await;

    let config = test_config(&iam, &tts, &temp.path().join("work"), &[]);
    let input = write_input(temp.path(), "story.md", &five_chunk_text());
    let output = temp.path().join("story.wav");

    let first = app::run(&cli(&input, &output), &config, no_abort()).await.unwrap();
    assert_eq!(first.status, RunStatus::PartialFailure);
    let retained = first.retained_temp_dir.clone().unwrap();

    failing_mock.delete_async().await;
    let recovered_mock = mock_tts_marker2(&tts, 200).await;

    let second = app::run(&cli(&input, &output), &config, no_abort()).await.unwrap();

    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.resumed, 4);
    assert_eq!(second.succeeded, 5);
    assert_eq!(second.stats.attempts, 1);
    recovered_mock.assert_hits_async(1).await;
    ok_mock.assert_hits_async(4).await;

    assert_eq!(wav_samples(&output), CHUNK_SAMPLES.repeat(5));
    assert!(!retained.exists());
}

#[tokio::test]
async fn it_should_insert_a_gap_marker_with_gap_policy() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    mock_iam(&iam, "token-1").await;
    mock_tts_except_marker2(&tts).await;
    let rejected_mock = mock_tts_marker2(&tts, 400).await;

    let config = test_config(&iam, &tts, &temp.path().join("work"), &[("FAILED_CHUNK_POLICY", "gap")]);
    let input = write_input(temp.path(), "story.txt", &five_chunk_text());
    let output = temp.path().join("story.wav");

    let report = app::run(&cli(&input, &output), &config, no_abort()).await.unwrap();

    assert_eq!(report.status, RunStatus::PartialFailure);
    assert_eq!(report.gaps, vec![2]);
    assert_eq!(report.failed[0].attempts, 1);
    rejected_mock.assert_hits_async(1).await;

    // 100ms marker at 8 kHz sits between chunk 1 and chunk 3
    let samples = wav_samples(&output);
    assert_eq!(samples.len(), 4 * 4 + 800);
    assert_eq!(&samples[..8], &CHUNK_SAMPLES.repeat(2)[..]);
    assert_eq!(&samples[808..], &CHUNK_SAMPLES.repeat(2)[..]);
    assert!(samples[8..808].iter().any(|s| *s != 0));
}

#[tokio::test]
async fn it_should_refresh_an_expired_token_once() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();

    let stale_iam = mock_iam(&iam, "stale-token").await;
    let config = test_config(&iam, &tts, &temp.path().join("work"), &[]);
    let signer = app::build_signer(&config).await.unwrap();
    stale_iam.delete_async().await;
    let fresh_iam = mock_iam(&iam, "fresh-token").await;

    let rejected = tts
        .mock_async(|when, then| {
            when.method(POST)
                .path(TTS_PATH)
                .header("Authorization", "Bearer stale-token");
            then.status(401).body("The token has expired");
        })
        .await;
    let accepted = tts
        .mock_async(|when, then| {
            when.method(POST)
                .path(TTS_PATH)
                .header("Authorization", "Bearer fresh-token");
            then.status(200).body(crate::helpers::pcm_body(&CHUNK_SAMPLES));
        })
        .await;

    let orchestrator = app::build_orchestrator(
        &config,
        signer.clone(),
        FfmpegTranscoder::new(config.ffmpeg_path.clone()),
        config.temp_dir.clone(),
    )
    .unwrap();
    let document = Document::new(five_chunk_text(), SourceFormat::PlainText);
    let output = temp.path().join("story.wav");

    let report = orchestrator
        .run(&document, &output, OutputFormat::Wav, no_abort())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.stats.forced_refreshes, 1);
    assert_eq!(signer.exchange_count(), 2);
    fresh_iam.assert_hits_async(1).await;
    accepted.assert_hits_async(5).await;
    assert!(rejected.hits_async().await >= 1);
}

#[tokio::test]
async fn it_should_fail_setup_when_the_identity_endpoint_rejects_the_key() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    iam.mock_async(|when, then| {
        when.method(POST).path(crate::helpers::IAM_PATH);
        then.status(403).body("Permission denied");
    })
    .await;
    let tts_mock = mock_tts_except_marker2(&tts).await;

    let config = test_config(&iam, &tts, &temp.path().join("work"), &[]);
    let input = write_input(temp.path(), "story.txt", &five_chunk_text());
    let output = temp.path().join("story.wav");

    let error = app::run(&cli(&input, &output), &config, no_abort()).await.unwrap_err();

    assert_eq!(error.exit_status().code(), 3);
    tts_mock.assert_hits_async(0).await;
    assert!(!output.exists());
}

#[tokio::test]
async fn it_should_reject_missing_and_unsupported_inputs() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    let config = test_config(&iam, &tts, &temp.path().join("work"), &[]);
    let output = temp.path().join("out.wav");

    let missing = app::run(&cli(&temp.path().join("absent.txt"), &output), &config, no_abort())
        .await
        .unwrap_err();
    assert_eq!(missing.exit_status().code(), 2);

    let pdf = write_input(temp.path(), "book.pdf", "not really a pdf");
    let unsupported = app::run(&cli(&pdf, &output), &config, no_abort()).await.unwrap_err();
    assert_eq!(unsupported.exit_status().code(), 2);
}

#[tokio::test]
async fn it_should_reject_an_unspeakable_document() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    mock_iam(&iam, "token-1").await;
    let tts_mock = mock_tts_except_marker2(&tts).await;
    let config = test_config(&iam, &tts, &temp.path().join("work"), &[]);
    let input = write_input(temp.path(), "empty.txt", "   \n\n  ");

    let error = app::run(&cli(&input, &temp.path().join("out.wav")), &config, no_abort())
        .await
        .unwrap_err();

    assert_eq!(error.exit_status().code(), 5);
    tts_mock.assert_hits_async(0).await;
}
