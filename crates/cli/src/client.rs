//! API client for the selector daemon

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// API client for the selector report endpoints
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        // Relative joins keep any path prefix only with a trailing slash
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request, failing on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_accepting(path, &[]).await
    }

    /// URL for a path built from raw segments, each percent-encoded
    fn segments_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request that also parses bodies of the listed error statuses
    async fn get_accepting<T: DeserializeOwned>(
        &self,
        path: &str,
        accepted: &[StatusCode],
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.fetch(url, accepted).await
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url, accepted: &[StatusCode]) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && !accepted.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn servers(&self) -> Result<ServersResponse> {
        self.get("api/v1/servers").await
    }

    pub async fn latest_round(&self) -> Result<RoundRecord> {
        self.get("api/v1/rounds/latest").await
    }

    pub async fn series(&self, server: &str) -> Result<SeriesResponse> {
        let url = self.segments_url(&["api", "v1", "servers", server, "series"])?;
        self.fetch(url, &[]).await
    }

    /// Health and readiness; unhealthy or unready responses are not errors
    pub async fn health(&self) -> Result<(HealthResponse, ReadinessResponse)> {
        let unavailable = [StatusCode::SERVICE_UNAVAILABLE];
        let health = self.get_accepting("healthz", &unavailable).await?;
        let readiness = self.get_accepting("readyz", &unavailable).await?;
        Ok((health, readiness))
    }
}

// API response types

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Forecast {
    pub rtt: Option<f64>,
    pub load: Option<f64>,
    pub health: Option<f64>,
    pub error_rate: Option<f64>,
    pub bandwidth: Option<f64>,
    pub anomaly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub started_at: DateTime<Utc>,
    pub last_round_at: Option<DateTime<Utc>>,
    pub rounds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub server: String,
    pub reachable: bool,
    pub forecast: Forecast,
    /// `None` when the server cannot be scored
    pub score: Option<f64>,
    pub selections: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersResponse {
    pub session: SessionInfo,
    pub servers: Vec<ServerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub rtt_secs: f64,
    pub load: f64,
    pub health: f64,
    pub error_rate: f64,
    pub bandwidth_mbps: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRound {
    pub server: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Sample>,
    pub forecast: Forecast,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionCount {
    pub server: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u64,
    pub started_at: i64,
    pub duration_ms: u64,
    pub servers: Vec<ServerRound>,
    pub chosen: String,
    pub branch: String,
    pub viable: bool,
    pub selection_counts: Vec<SelectionCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub round: u64,
    pub rtt: Option<f64>,
    pub load: Option<f64>,
    pub health: Option<f64>,
    pub error_rate: Option<f64>,
    pub bandwidth: Option<f64>,
    pub chosen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub server: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
