use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::inventory::types::{DashboardStats, Resource};
use crate::retry::{retry_with_backoff, RetryPolicy};

#[derive(Serialize)]
struct LoginRequest<'a> {
  username: &'a str,
  password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
  token: String,
}

/// Error body returned by the API: `{ "error": "..." }`
#[derive(Deserialize)]
struct ApiError {
  #[serde(alias = "message")]
  error: String,
}

/// Inventory REST API client
#[derive(Clone)]
pub struct InventoryClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
  retry: RetryPolicy,
}

impl InventoryClient {
  pub fn new(config: &Config) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_millis(config.api.timeout_ms))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: base_url(&config.api.url)?,
      token: None,
      retry: config.retry,
    })
  }

  /// Exchange credentials for an API token and keep it for later requests.
  pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
    let url = self.endpoint("auth/login")?;
    let response = self
      .http
      .post(url)
      .json(&LoginRequest { username, password })
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", self.base_url, e))?;

    let login: LoginResponse = parse_response(response)
      .await
      .map_err(|e| eyre!("Login failed: {}", e))?;
    self.token = Some(login.token);

    info!(username, "logged in");
    Ok(())
  }

  /// Fetch a whole collection. Retried with backoff.
  pub async fn list<T: Resource>(&self) -> Result<Vec<T>> {
    let url = self.endpoint(T::PATH)?;
    retry_with_backoff(&self.retry, || self.get_json(url.clone())).await
  }

  /// Create a record; the server's copy (with its id) is returned.
  pub async fn create<T: Resource>(&self, record: &T) -> Result<T> {
    let url = self.endpoint(T::PATH)?;
    debug!(resource = T::PATH, "create");
    let response = self
      .authorized(self.http.post(url))
      .json(record)
      .send()
      .await
      .map_err(|e| eyre!("Failed to create {}: {}", T::PATH, e))?;
    parse_response(response).await
  }

  /// Apply a partial update to a record.
  pub async fn update<T>(&self, id: i64, patch: &T::Patch) -> Result<()>
  where
    T: Resource,
    T::Patch: Serialize + Sync,
  {
    let url = self.endpoint(&format!("{}/{}", T::PATH, id))?;
    debug!(resource = T::PATH, id, "update");
    let response = self
      .authorized(self.http.put(url))
      .json(patch)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update {} {}: {}", T::PATH, id, e))?;
    check_status(response).await
  }

  pub async fn delete<T: Resource>(&self, id: i64) -> Result<()> {
    let url = self.endpoint(&format!("{}/{}", T::PATH, id))?;
    debug!(resource = T::PATH, id, "delete");
    let response = self
      .authorized(self.http.delete(url))
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete {} {}: {}", T::PATH, id, e))?;
    check_status(response).await
  }

  /// Dashboard counters. Retried with backoff.
  pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
    let url = self.endpoint("dashboard/stats")?;
    retry_with_backoff(&self.retry, || self.get_json(url.clone())).await
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let response = self
      .authorized(self.http.get(url.clone()))
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url.path(), e))?;
    parse_response(response).await
  }

  fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(&format!("api/{}", path))
      .map_err(|e| eyre!("Invalid endpoint '{}': {}", path, e))
  }
}

/// Parse the configured URL, making sure relative joins keep its path.
fn base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API URL '{}': {}", raw, e))?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
  let status = response.status();
  if status.is_success() {
    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Unexpected response body: {}", e))
  } else {
    let body = response.text().await.unwrap_or_default();
    Err(eyre!(api_error_message(status, &body)))
  }
}

async fn check_status(response: Response) -> Result<()> {
  let status = response.status();
  if status.is_success() {
    Ok(())
  } else {
    let body = response.text().await.unwrap_or_default();
    Err(eyre!(api_error_message(status, &body)))
  }
}

/// Prefer the server's own error message over the raw body.
fn api_error_message(status: StatusCode, body: &str) -> String {
  match serde_json::from_str::<ApiError>(body) {
    Ok(api_error) => format!("HTTP {}: {}", status.as_u16(), api_error.error),
    Err(_) if body.trim().is_empty() => format!("HTTP {}", status.as_u16()),
    Err(_) => format!("HTTP {}: {}", status.as_u16(), body.trim()),
  }
}
