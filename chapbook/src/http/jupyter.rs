//! Jupyter contents API client
//!
//! Notebooks live under `<jupyter_root>/users/<user>` and are addressed
//! through `/api/contents/users/<user>/<file>`.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

use crate::errors::ChapError;
use crate::filesys::dir::Dir;
use crate::models::notebook::NotebookRecord;

/// Default notebook captured for pipeline runs
pub const DEFAULT_NOTEBOOK: &str = "userprocessor.ipynb";

/// HTTP client for a Jupyter server
pub struct JupyterClient {
    client: Client,
    base_url: Url,
    token: String,
    root: PathBuf,
}

impl JupyterClient {
    /// Create a new Jupyter client
    pub fn new(host: &str, token: &str, root: impl Into<PathBuf>) -> Result<Self, ChapError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let base_url = Url::parse(host.trim_end_matches('/')).map_err(|e| {
            ChapError::ConfigError(format!("invalid jupyter_host {}: {}", host, e))
        })?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            root: root.into(),
        })
    }

    /// Contents API URL of `users/<user>[/<file>]`
    pub fn contents_url(&self, user: &str, file: Option<&str>) -> Result<Url, ChapError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ChapError::ConfigError(format!("invalid jupyter_host {}", self.base_url)))?;
            segments.pop_if_empty().extend(["api", "contents", "users", user]);
            if let Some(file) = file {
                segments.push(file);
            }
        }
        Ok(url)
    }

    /// Ensure the user's notebook area exists and ask Jupyter for a notebook in it
    pub async fn create(&self, user: &str) -> Result<NotebookRecord, ChapError> {
        Dir::new(self.root.join("users").join(user)).create().await?;

        let url = self.contents_url(user, None)?;
        self.post(url, &serde_json::json!({ "type": "notebook" })).await
    }

    /// Fetch a notebook with its cells
    pub async fn capture(&self, user: &str, file: &str) -> Result<NotebookRecord, ChapError> {
        let url = self.contents_url(user, Some(file))?;
        self.get(url).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ChapError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Jupyter GET {} failed: {} - {}", url, status, body);
            return Err(ChapError::NotebookError(format!("{}: {}", status, body)));
        }

        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: Url, body: &B) -> Result<T, ChapError> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Jupyter POST {} failed: {} - {}", url, status, body);
            return Err(ChapError::NotebookError(format!("{}: {}", status, body)));
        }

        Ok(response.json().await?)
    }
}
