use crate::helpers::{fixture, mock_iam, test_config, IAM_PATH};
use chrono::Utc;
use httpmock::prelude::*;
use jsonwebtoken::Algorithm;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::TempDir;
use text_to_audio::app;
use text_to_audio::domain::auth::{AuthError, ServiceAccountKey, TokenProvider};
use text_to_audio::infrastructure::iam::{IamTokenExchange, TokenExchange};

fn service_account_key() -> ServiceAccountKey {
    ServiceAccountKey::from_pem(
        "ajetestkeyid".to_string(),
        "ajetestaccount".to_string(),
        Algorithm::PS256,
        &fixture("service_account_private.pem"),
        Some(fixture("service_account_public.pem").as_str()),
    )
    .unwrap()
}

/// The posted assertion names our key id and signs with PS256
fn carries_signed_assertion(req: &HttpMockRequest) -> bool {
    let Some(body) = req.body.as_deref() else {
        return false;
    };
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) else {
        return false;
    };
    let Some(jwt) = json.get("jwt").and_then(|v| v.as_str()) else {
        return false;
    };
    jsonwebtoken::decode_header(jwt)
        .map(|header| header.alg == Algorithm::PS256 && header.kid.as_deref() == Some("ajetestkeyid"))
        .unwrap_or(false)
}

#[tokio::test]
async fn it_should_exchange_a_signed_assertion_for_a_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(IAM_PATH).matches(carries_signed_assertion);
            then.status(200).json_body(serde_json::json!({
                "iamToken": "t1.exchanged",
                "expiresAt": "2030-01-01T12:00:00.123456Z"
            }));
        })
        .await;

    let exchange = IamTokenExchange::new(server.url(IAM_PATH), Duration::from_secs(5)).unwrap();
    let key = service_account_key();
    let assertion = key.sign_assertion(exchange.audience(), Utc::now()).unwrap();

    let response = exchange.exchange(&assertion).await.unwrap();
    let token = response.into_token(Utc::now());

    mock.assert_async().await;
    assert_eq!(token.value, "t1.exchanged");
    assert_eq!(token.expires_at.to_rfc3339(), "2030-01-01T12:00:00.123456+00:00");
}

#[tokio::test]
async fn it_should_surface_rejections_with_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(IAM_PATH);
            then.status(403).body("Permission denied");
        })
        .await;

    let exchange = IamTokenExchange::new(server.url(IAM_PATH), Duration::from_secs(5)).unwrap();
    let assertion = service_account_key()
        .sign_assertion(exchange.audience(), Utc::now())
        .unwrap();

    let error = exchange.exchange(&assertion).await.unwrap_err();

    assert_eq!(
        error,
        AuthError::Rejected {
            status: 403,
            body: "Permission denied".to_string()
        }
    );
}

#[tokio::test]
async fn it_should_report_unparseable_responses() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(IAM_PATH);
            then.status(200).body("not json");
        })
        .await;

    let exchange = IamTokenExchange::new(server.url(IAM_PATH), Duration::from_secs(5)).unwrap();
    let error = exchange.exchange("assertion").await.unwrap_err();

    assert!(matches!(error, AuthError::Exchange(_)), "{:?}", error);
}

#[tokio::test]
async fn it_should_build_a_signer_and_cache_its_token() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    let mock = mock_iam(&iam, "t1.cached").await;
    let config = test_config(&iam, &tts, temp.path(), &[]);

    let signer = app::build_signer(&config).await.unwrap();
    let token = signer.get_token().await.unwrap();

    assert_eq!(token.value, "t1.cached");
    assert_eq!(signer.exchange_count(), 1);
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn it_should_refuse_a_mismatched_key_pair() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    let mock = mock_iam(&iam, "t1.unused").await;
    let unrelated = fixture("unrelated_public.pem");
    let config = test_config(&iam, &tts, temp.path(), &[("YANDEX_PUBLIC_KEY", unrelated.as_str())]);

    let error = app::build_signer(&config).await.unwrap_err();

    assert_eq!(error.exit_status().code(), 3);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn it_should_fail_setup_when_the_exchange_is_rejected() {
    let iam = MockServer::start_async().await;
    let tts = MockServer::start_async().await;
    let temp = TempDir::new().unwrap();
    iam.mock_async(|when, then| {
        when.method(POST).path(IAM_PATH);
        then.status(401).body("Invalid key");
    })
    .await;
    let config = test_config(&iam, &tts, temp.path(), &[]);

    let error = app::build_signer(&config).await.unwrap_err();

    assert_eq!(error.exit_status().code(), 3);
    assert!(error.to_string().contains("401"), "{}", error);
}
