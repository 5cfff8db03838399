pub mod drive;
pub mod error;
pub mod oauth;
pub mod types;

pub use drive::{public_download_url, DriveClient, ZIP_MIME};
pub use error::{DriveError, Result};
pub use oauth::{OAuthCredentials, OAuthSession, DRIVE_FILE_SCOPE};
pub use types::{DriveFile, GoogleEndpoints};

use std::sync::Arc;

use async_trait::async_trait;

use sitegrab_common::{
    AccessToken, GoogleSettings, PipelineError, RemoteObject, RemoteUploader, UploadRequest,
};

/// [`RemoteUploader`] backed by Google Drive.
///
/// The session is shared with the OAuth callback handler so a completed
/// consent flow is picked up by the next upload.
pub struct DriveUploader {
    session: Arc<OAuthSession>,
    drive: DriveClient,
}

impl DriveUploader {
    pub fn new(session: Arc<OAuthSession>, drive: DriveClient) -> Self {
        Self { session, drive }
    }

    /// Session and client for the configured account.
    pub fn from_settings(client: reqwest::Client, settings: &GoogleSettings, endpoints: GoogleEndpoints) -> Self {
        let session = OAuthSession::new(
            client.clone(),
            OAuthCredentials {
                client_id: settings.client_id.clone(),
                client_secret: settings.client_secret.clone(),
                redirect_uri: settings.redirect_uri.clone(),
            },
            settings.refresh_token.clone(),
            endpoints.clone(),
        );
        let drive = DriveClient::new(client, settings.folder_id.clone(), endpoints);
        Self::new(Arc::new(session), drive)
    }

    pub fn session(&self) -> &Arc<OAuthSession> {
        &self.session
    }
}

#[async_trait]
impl RemoteUploader for DriveUploader {
    async fn authorize(&self) -> sitegrab_common::Result<AccessToken> {
        self.session.refresh().await.map_err(|err| match err {
            DriveError::ReauthRequired { consent_url } => PipelineError::ReauthRequired { consent_url },
            other => PipelineError::TokenRefreshFailed(other.to_string()),
        })
    }

    async fn upload(
        &self,
        token: &AccessToken,
        request: &UploadRequest,
    ) -> sitegrab_common::Result<RemoteObject> {
        let upload_failed = |err: DriveError| PipelineError::UploadFailed(err.to_string());

        let file = self
            .drive
            .upload_file(token, &request.path, &request.name)
            .await
            .map_err(upload_failed)?;
        self.drive
            .share_with_anyone(token, &file.id)
            .await
            .map_err(upload_failed)?;

        Ok(RemoteObject {
            download_url: public_download_url(&file.id),
            id: file.id,
            public: true,
        })
    }
}
