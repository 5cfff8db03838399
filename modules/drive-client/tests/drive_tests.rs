use std::sync::Arc;

use drive_client::{
    DriveClient, DriveError, DriveUploader, GoogleEndpoints, OAuthCredentials, OAuthSession,
};
use serde_json::json;
use sitegrab_common::{AccessToken, PipelineError, RemoteUploader, UploadRequest};
use wiremock::matchers::{body_json, body_string, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer) -> OAuthSession {
    OAuthSession::new(
        reqwest::Client::new(),
        OAuthCredentials {
            client_id: "client-123".to_string(),
            client_secret: "secret-456".to_string(),
            redirect_uri: "https://app.example.com/oauth2callback".to_string(),
        },
        "refresh-abc".to_string(),
        GoogleEndpoints::with_base(&server.uri()),
    )
}

fn uploader(server: &MockServer) -> DriveUploader {
    let drive = DriveClient::new(
        reqwest::Client::new(),
        "folder-1".to_string(),
        GoogleEndpoints::with_base(&server.uri()),
    );
    DriveUploader::new(Arc::new(session(server)), drive)
}

async fn token_ok(server: &MockServer, refresh_token: &str, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={refresh_token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

async fn token_error(server: &MockServer, status: u16, error: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "error": error,
            "error_description": "Token has been expired or revoked."
        })))
        .mount(server)
        .await;
}

// --- OAuth session ---

#[tokio::test]
async fn refresh_returns_access_token() {
    let server = MockServer::start().await;
    token_ok(&server, "refresh-abc", "ya29.fresh").await;

    let token = session(&server).refresh().await.unwrap();
    assert_eq!(token, AccessToken("ya29.fresh".to_string()));
}

#[tokio::test]
async fn invalid_grant_requires_reauthorization() {
    let server = MockServer::start().await;
    token_error(&server, 400, "invalid_grant").await;

    let err = session(&server).refresh().await.unwrap_err();
    let DriveError::ReauthRequired { consent_url } = err else {
        panic!("expected ReauthRequired, got {err:?}");
    };
    let consent = url::Url::parse(&consent_url).unwrap();
    assert_eq!(consent.path(), "/o/oauth2/v2/auth");
    let pairs: Vec<(String, String)> = consent.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
    assert!(pairs.contains(&("prompt".to_string(), "consent".to_string())));
    assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
}

#[tokio::test]
async fn unauthorized_requires_reauthorization() {
    let server = MockServer::start().await;
    token_error(&server, 401, "unauthorized_client").await;

    let err = session(&server).refresh().await.unwrap_err();
    assert!(matches!(err, DriveError::ReauthRequired { .. }), "{err:?}");
}

#[tokio::test]
async fn other_token_failures_are_api_errors() {
    let server = MockServer::start().await;
    token_error(&server, 500, "backend_error").await;

    let err = session(&server).refresh().await.unwrap_err();
    assert!(matches!(err, DriveError::Api { status: 500, .. }), "{err:?}");
}

#[tokio::test]
async fn malformed_token_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>captive portal</html>", "text/html"))
        .mount(&server)
        .await;

    let err = session(&server).refresh().await.unwrap_err();
    assert!(matches!(err, DriveError::Parse(_)), "{err:?}");
}

#[tokio::test]
async fn exchanged_code_replaces_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.first",
            "refresh_token": "refresh-new",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    token_ok(&server, "refresh-new", "ya29.second").await;

    let session = session(&server);
    session.exchange_code("auth-code-1").await.unwrap();

    let token = session.refresh().await.unwrap();
    assert_eq!(token.secret(), "ya29.second");
}

#[tokio::test]
async fn exchange_without_refresh_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.only"
        })))
        .mount(&server)
        .await;

    let err = session(&server).exchange_code("code").await.unwrap_err();
    assert!(matches!(err, DriveError::MissingField("refresh_token")), "{err:?}");
}

// --- Drive upload ---

#[tokio::test]
async fn upload_streams_file_and_shares_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "resumable"))
        .and(header("authorization", "Bearer ya29.tok"))
        .and(header("x-upload-content-type", "application/zip"))
        .and(body_json(json!({
            "name": "example.com.zip",
            "parents": ["folder-1"],
            "mimeType": "application/zip"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload/session/xyz", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/xyz"))
        .and(body_string("PK fake zip bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-1",
            "name": "example.com.zip"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file-1/permissions"))
        .and(body_json(json!({ "role": "reader", "type": "anyone" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "anyoneWithLink" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("example.com-1234abcd.zip");
    std::fs::write(&archive, "PK fake zip bytes").unwrap();

    let object = uploader(&server)
        .upload(
            &AccessToken("ya29.tok".to_string()),
            &UploadRequest {
                path: archive,
                name: "example.com.zip".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(object.id, "file-1");
    assert!(object.public);
    assert_eq!(
        object.download_url,
        "https://drive.google.com/uc?id=file-1&export=download"
    );
}

#[tokio::test]
async fn missing_session_location_fails_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("a.zip");
    std::fs::write(&archive, "zip").unwrap();

    let err = uploader(&server)
        .upload(
            &AccessToken("tok".to_string()),
            &UploadRequest {
                path: archive,
                name: "a.zip".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UploadFailed(_)), "{err}");
}

#[tokio::test]
async fn permission_failure_fails_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload/session/1", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-9" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/file-9/permissions"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("a.zip");
    std::fs::write(&archive, "zip").unwrap();

    let err = uploader(&server)
        .upload(
            &AccessToken("tok".to_string()),
            &UploadRequest {
                path: archive,
                name: "a.zip".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UploadFailed(ref m) if m.contains("403")), "{err}");
}

#[tokio::test]
async fn authorize_maps_session_errors() {
    let server = MockServer::start().await;
    token_error(&server, 400, "invalid_grant").await;
    let err = uploader(&server).authorize().await.unwrap_err();
    assert!(matches!(err, PipelineError::ReauthRequired { .. }), "{err}");

    let server = MockServer::start().await;
    token_error(&server, 503, "backend_error").await;
    let err = uploader(&server).authorize().await.unwrap_err();
    assert!(matches!(err, PipelineError::TokenRefreshFailed(_)), "{err}");
}

#[tokio::test]
async fn malformed_upload_response_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload/session/xyz", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "no id here" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("a.zip");
    std::fs::write(&archive, "zip").unwrap();

    let drive = DriveClient::new(
        reqwest::Client::new(),
        "folder-1".to_string(),
        GoogleEndpoints::with_base(&server.uri()),
    );
    let err = drive
        .upload_file(&AccessToken("tok".to_string()), &archive, "a.zip")
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Parse(_)), "{err:?}");
}
