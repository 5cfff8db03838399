// Drive v3 REST calls: resumable upload and link sharing.

use std::path::Path;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use sitegrab_common::AccessToken;

use crate::error::{DriveError, Result};
use crate::types::{read_json, DriveFile, FileMetadata, GoogleEndpoints, Permission};

pub const ZIP_MIME: &str = "application/zip";

/// Direct-download link for a file shared with "anyone with the link".
pub fn public_download_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={file_id}&export=download")
}

pub struct DriveClient {
    client: reqwest::Client,
    endpoints: GoogleEndpoints,
    folder_id: String,
}

impl DriveClient {
    pub fn new(client: reqwest::Client, folder_id: String, endpoints: GoogleEndpoints) -> Self {
        Self {
            client,
            endpoints,
            folder_id,
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    /// Upload a local file into the configured folder as `name`.
    ///
    /// Opens a resumable session, then streams the file body in a single PUT
    /// so the archive is never held in memory.
    pub async fn upload_file(&self, token: &AccessToken, path: &Path, name: &str) -> Result<DriveFile> {
        let io_err = |source| DriveError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();

        let metadata = FileMetadata {
            name,
            parents: [self.folder_id.as_str()],
            mime_type: ZIP_MIME,
        };
        let url = format!("{}/files?uploadType=resumable&fields=id,name", self.endpoints.upload_api);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token.secret())
            .header("X-Upload-Content-Type", ZIP_MIME)
            .header("X-Upload-Content-Length", size)
            .json(&metadata)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DriveError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let session_url = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(DriveError::MissingField("Location header"))?;
        debug!(name, size, "Resumable upload session opened");

        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let resp = self
            .client
            .put(&session_url)
            .bearer_auth(token.secret())
            .header(CONTENT_TYPE, ZIP_MIME)
            .header(CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DriveError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let file: DriveFile = read_json(resp).await?;
        info!(file_id = %file.id, name, size, "Uploaded file to Drive");
        Ok(file)
    }

    /// Grant read access to anyone holding the link.
    pub async fn share_with_anyone(&self, token: &AccessToken, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}/permissions", self.endpoints.drive_api, file_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token.secret())
            .json(&Permission {
                role: "reader",
                kind: "anyone",
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DriveError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        debug!(file_id, "File shared with anyone holding the link");
        Ok(())
    }
}
