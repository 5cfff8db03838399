// OAuth refresh-token session.
//
// The refresh token is long-lived and supplied at startup; each upload trades
// it for a fresh access token. `exchange_code` is the only way to replace it.

use std::fmt;

use reqwest::StatusCode;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::form_urlencoded;

use sitegrab_common::AccessToken;

use crate::error::{DriveError, Result};
use crate::types::{read_json, GoogleEndpoints, TokenErrorResponse, TokenResponse};

/// Scope limited to files this app creates.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

pub struct OAuthSession {
    client: reqwest::Client,
    credentials: OAuthCredentials,
    endpoints: GoogleEndpoints,
    refresh_token: RwLock<String>,
}

impl fmt::Debug for OAuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSession")
            .field("credentials", &self.credentials)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl OAuthSession {
    pub fn new(
        client: reqwest::Client,
        credentials: OAuthCredentials,
        refresh_token: String,
        endpoints: GoogleEndpoints,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoints,
            refresh_token: RwLock::new(refresh_token),
        }
    }

    /// Browser URL where an operator grants offline Drive access again.
    pub fn consent_url(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("scope", DRIVE_FILE_SCOPE)
            .finish();
        format!("{}?{}", self.endpoints.auth_url, query)
    }

    /// Trade the refresh token for a new access token. Nothing is cached.
    pub async fn refresh(&self) -> Result<AccessToken> {
        let refresh_token = self.refresh_token.read().await.clone();
        let resp = self
            .client
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let token: TokenResponse = self.token_response(resp).await?;
        tracing::debug!(expires_in = ?token.expires_in, "Access token refreshed");
        Ok(AccessToken(token.access_token))
    }

    /// Complete the consent flow: exchange an authorization code and keep the
    /// refresh token it grants for all later uploads.
    pub async fn exchange_code(&self, code: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let token: TokenResponse = self.token_response(resp).await?;
        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(DriveError::MissingField("refresh_token"))?;

        *self.refresh_token.write().await = refresh_token;
        info!("Refresh token replaced after re-authorization");
        Ok(())
    }

    async fn token_response(&self, resp: reqwest::Response) -> Result<TokenResponse> {
        let status = resp.status();
        if status.is_success() {
            return read_json(resp).await;
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || parsed.error == "invalid_grant" {
            warn!(status = status.as_u16(), error = %parsed.error, "Refresh token rejected");
            return Err(DriveError::ReauthRequired {
                consent_url: self.consent_url(),
            });
        }

        Err(DriveError::Api {
            status: status.as_u16(),
            message: parsed.error_description.unwrap_or(body),
        })
    }
}
