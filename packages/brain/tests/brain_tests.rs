#![allow(clippy::disallowed_methods)]

use std::error::Error;
use std::io::Write;

use brain::{BrainConfig, BrainCredentials, BrainError, BrainSubmitter, Credentials};
use sim_core::{AlphaSpec, AlphaSubmitter, AuthError, CredentialProvider, SubmitError};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("user:pass")
const BASIC_USER_PASS: &str = "Basic dXNlcjpwYXNz";

fn config_for(server: &MockServer) -> BrainConfig {
    BrainConfig::default()
        .with_api_url(server.uri())
        .with_credentials(Credentials::new("user", "pass"))
}

async fn mount_login(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/authentication"))
        .and(header("authorization", BASIC_USER_PASS))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_requires_created_status() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 201).await;

    let provider = BrainCredentials::new(config_for(&server))?;
    provider.get_session().await?;

    Ok(())
}

#[tokio::test]
async fn login_rejection_reports_status() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 200).await;

    let provider = BrainCredentials::new(config_for(&server))?;
    let result = provider.get_session().await;

    assert_eq!(result.err(), Some(AuthError::Rejected(200)));
    Ok(())
}

#[tokio::test]
async fn credentials_are_read_from_file() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 201).await;

    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"["user", "pass"]"#)?;

    let config = BrainConfig::default()
        .with_api_url(server.uri())
        .with_credentials_file(file.path());
    let provider = BrainCredentials::new(config)?;
    provider.get_session().await?;

    Ok(())
}

#[tokio::test]
async fn missing_credentials_file_fails_construction() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = BrainConfig::default().with_credentials_file(dir.path().join("account.txt"));

    let result = BrainCredentials::new(config);

    assert!(matches!(result, Err(BrainError::CredentialsFile { .. })));
    Ok(())
}

#[tokio::test]
async fn submit_sends_spec_and_parses_location() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 201).await;
    Mock::given(method("POST"))
        .and(path("/simulations"))
        .and(body_partial_json(serde_json::json!({
            "type": "REGULAR",
            "regular": "rank(close)",
            "settings": { "universe": "TOP3000" }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("location", format!("{}/simulations/sim123", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = BrainCredentials::new(config_for(&server))?.get_session().await?;
    let submission = BrainSubmitter::new()
        .submit(&session, &AlphaSpec::regular("rank(close)"))
        .await?;

    assert_eq!(submission.remote_id.as_deref(), Some("sim123"));
    Ok(())
}

#[tokio::test]
async fn submit_without_location_still_succeeds() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 201).await;
    Mock::given(method("POST"))
        .and(path("/simulations"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let session = BrainCredentials::new(config_for(&server))?.get_session().await?;
    let submission = BrainSubmitter::new()
        .submit(&session, &AlphaSpec::regular("rank(open)"))
        .await?;

    assert_eq!(submission.remote_id, None);
    Ok(())
}

#[tokio::test]
async fn submit_classifies_error_statuses() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 201).await;
    Mock::given(method("POST"))
        .and(path("/simulations"))
        .and(body_partial_json(serde_json::json!({ "regular": "expired" })))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/simulations"))
        .and(body_partial_json(serde_json::json!({ "regular": "throttled" })))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let session = BrainCredentials::new(config_for(&server))?.get_session().await?;
    let submitter = BrainSubmitter::new();

    let expired = submitter.submit(&session, &AlphaSpec::regular("expired")).await;
    let throttled = submitter.submit(&session, &AlphaSpec::regular("throttled")).await;

    assert_eq!(expired.err(), Some(SubmitError::Unauthorized(401)));
    assert_eq!(throttled.err(), Some(SubmitError::Rejected(429)));
    Ok(())
}

#[tokio::test]
async fn submit_alpha_returns_the_response_document() -> Result<(), Box<dyn Error>> {
    let server = MockServer::start().await;
    mount_login(&server, 201).await;
    Mock::given(method("GET"))
        .and(path("/alphas/o6mqEXn/submit"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "o6mqEXn" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alphas/gone/submit"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = BrainCredentials::new(config_for(&server))?.get_session().await?;
    let submitter = BrainSubmitter::new();

    let document = submitter.submit_alpha(&session, "o6mqEXn").await?;
    let missing = submitter.submit_alpha(&session, "gone").await;
    let malformed = submitter.submit_alpha(&session, "a/b").await;

    assert_eq!(document["id"], "o6mqEXn");
    assert!(matches!(missing, Err(BrainError::Http(_))));
    assert!(matches!(malformed, Err(BrainError::Config(_))));
    Ok(())
}
