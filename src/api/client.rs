//! HTTP client for the scraping backend's job-control endpoints.

use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use super::types::ScrapeJob;

/// Error returned by job-control API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {code}: {detail}")]
    Api { code: StatusCode, detail: String },
}

/// Error body shape used by the backend for non-2xx responses.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Thin typed client over the backend's `/api/scrape` routes.
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, ApiError> {
        // A base without a trailing slash would swallow its last path
        // segment on join().
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            base,
            http: reqwest::Client::new(),
            auth_token,
        })
    }

    /// Start a scrape job for a project.
    pub async fn start_scrape(&self, project_id: Uuid) -> Result<ScrapeJob, ApiError> {
        let request = self
            .request(Method::POST, "api/scrape/start")?
            .json(&json!({ "project_id": project_id }));
        self.execute(request).await
    }

    /// Fetch one job's current server-side state.
    pub async fn job(&self, job_id: Uuid) -> Result<ScrapeJob, ApiError> {
        let request = self.request(Method::GET, &format!("api/scrape/jobs/{job_id}"))?;
        self.execute(request).await
    }

    /// Cancel a pending or running job.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<(), ApiError> {
        let request = self.request(Method::POST, &format!("api/scrape/jobs/{job_id}/cancel"))?;
        let _: serde_json::Value = self.execute(request).await?;
        Ok(())
    }

    /// All jobs for a project, newest first.
    pub async fn project_jobs(&self, project_id: Uuid) -> Result<Vec<ScrapeJob>, ApiError> {
        let request = self.request(Method::GET, &format!("api/scrape/project/{project_id}/jobs"))?;
        self.execute(request).await
    }

    /// Streaming-endpoint locator for a job's live progress: the API base
    /// with its scheme upgraded to WebSocket and the per-job stream path.
    pub fn progress_endpoint(&self, job_id: &str) -> Result<String, ApiError> {
        let mut url = self
            .base
            .join(&format!("api/scrape/ws/{job_id}"))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(ApiError::InvalidUrl(format!("unsupported scheme: {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|_| ApiError::InvalidUrl(format!("cannot derive ws URL from {}", self.base)))?;

        Ok(url.to_string())
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        Ok(request)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let code = response.status();

        if !code.is_success() {
            let detail = match response.json::<ErrorBody>().await {
                Ok(body) => body.detail,
                Err(_) => code
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string(),
            };
            return Err(ApiError::Api { code, detail });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_endpoint_upgrades_http() {
        let client = ApiClient::new("http://localhost:8000", None).unwrap();
        assert_eq!(
            client.progress_endpoint("j1").unwrap(),
            "ws://localhost:8000/api/scrape/ws/j1"
        );
    }

    #[test]
    fn progress_endpoint_upgrades_https() {
        let client = ApiClient::new("https://scraper.example.com/", None).unwrap();
        assert_eq!(
            client.progress_endpoint("j1").unwrap(),
            "wss://scraper.example.com/api/scrape/ws/j1"
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let client = ApiClient::new("http://host:8000/deploy/prefix", None).unwrap();
        assert_eq!(
            client.progress_endpoint("j1").unwrap(),
            "ws://host:8000/deploy/prefix/api/scrape/ws/j1"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(ApiClient::new("not a url", None).is_err());
    }
}
