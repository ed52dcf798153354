use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::NetworkConfig;
use crate::entry::{Entry, EntryTime};
use crate::time;

/// Typed API errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not a valid Nightscout token: {0} (expected token=<subject>-<16 hex digits>)")]
    InvalidToken(String),
    #[error("invalid site URL {0}")]
    InvalidSite(String),
    #[error("{endpoint} returned error status: {status}")]
    Status { endpoint: String, status: u16 },
    #[error("unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },
}

/// Response of the `pebble` status endpoint; only the clock is used.
#[derive(Debug, Deserialize)]
struct PebbleResponse {
    status: Vec<PebbleStatus>,
}

#[derive(Debug, Deserialize)]
struct PebbleStatus {
    /// Unix time in milliseconds
    now: i64,
}

/// Client for a Nightscout-compatible site (Nightscout itself, or xDrip's
/// local web service).
#[derive(Clone, Debug)]
pub struct NightscoutClient {
    client: reqwest::Client,
    site: Url,
    api_secret: String,
    token: Option<String>,
    no_upload: bool,
}

impl NightscoutClient {
    /// Create a new client with configurable timeouts.
    pub fn new(site: &str, api_secret: &str, network_config: &NetworkConfig) -> Result<Self> {
        let site = parse_site(site)?;
        let token = match api_secret.strip_prefix("token=") {
            Some(token) if is_valid_token(token) => Some(token.to_string()),
            Some(_) => return Err(ApiError::InvalidToken(api_secret.to_string()).into()),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            site,
            api_secret: api_secret.to_string(),
            token,
            no_upload: false,
        })
    }

    /// Log uploads instead of sending them.
    pub fn with_no_upload(mut self, no_upload: bool) -> Self {
        self.no_upload = no_upload;
        self
    }

    pub fn site(&self) -> &Url {
        &self.site
    }

    /// Times of the entries recorded since `since`, newest first as served.
    pub async fn entry_times_since(
        &self,
        since: DateTime<Utc>,
        count: i64,
    ) -> Result<Vec<EntryTime>> {
        self.get("entries.json", &since_query(since, count))
            .await
    }

    /// Entries recorded since `since`.
    pub async fn entries_since(&self, since: DateTime<Utc>, count: i64) -> Result<Vec<Entry>> {
        self.get("entries.json", &since_query(since, count))
            .await
    }

    /// The recent sensor entries served by an xDrip-style `sgv.json`.
    pub async fn sgv_entries(&self) -> Result<Vec<Entry>> {
        self.get("sgv.json", &[]).await
    }

    /// The site's current clock, from the `pebble` status endpoint.
    pub async fn source_time(&self) -> Result<DateTime<Utc>> {
        let endpoint = "pebble";
        let response: PebbleResponse = self.get(endpoint, &[]).await?;
        match response.status.as_slice() {
            [status] => Ok(time::to_timestamp(status.now)),
            other => Err(ApiError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                reason: format!("status has {} elements, want 1", other.len()),
            }
            .into()),
        }
    }

    /// Upload entries. Returns how many were sent, which is zero in
    /// no-upload mode.
    pub async fn upload_entries(&self, entries: &[Entry]) -> Result<usize> {
        let endpoint = "entries";
        if entries.is_empty() {
            return Ok(0);
        }
        let url = self.url(endpoint, &[])?;
        if self.no_upload {
            tracing::warn!(
                %url,
                count = entries.len(),
                "no-upload mode, skipping POST"
            );
            tracing::debug!(
                body = %serde_json::to_string_pretty(entries).unwrap_or_default(),
                "skipped upload"
            );
            return Ok(0);
        }

        tracing::debug!(%url, count = entries.len(), "POST");
        let response = self
            .with_headers(self.client.post(url))
            .json(entries)
            .send()
            .await
            .with_context(|| format!("Failed to send entries to {}", self.site))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        Ok(entries.len())
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(endpoint, query)?;
        tracing::debug!(%url, "GET");

        let response = self
            .with_headers(self.client.get(url))
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.site))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {} response", endpoint))?;
        tracing::trace!(endpoint, bytes = body.len(), "response received");

        serde_json::from_slice(&body)
            .with_context(|| format!("Failed to parse {} response", endpoint))
    }

    fn url(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .site
            .join(&format!("api/v1/{}", endpoint))
            .with_context(|| format!("Failed to build URL for {}", endpoint))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(token) = &self.token {
                pairs.append_pair("token", token);
            }
        }
        // query_pairs_mut leaves an empty "?" behind when nothing was added.
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn with_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("api-secret", &self.api_secret)
            .header("accept", "application/json")
            .header("content-type", "application/json")
    }
}

fn since_query(since: DateTime<Utc>, count: i64) -> [(&'static str, String); 2] {
    [
        ("find[dateString][$gte]", time::date_string(since)),
        ("count", count.to_string()),
    ]
}

/// Parse the site URL so that relative endpoints resolve beneath it.
fn parse_site(site: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(site).map_err(|_| ApiError::InvalidSite(site.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidSite(site.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Whether `token` has the form `<subject>-<16 hex digits>`, where the
/// subject is up to ten lowercase letters, digits or underscores.
fn is_valid_token(token: &str) -> bool {
    let Some((subject, digest)) = token.rsplit_once('-') else {
        return false;
    };
    subject.len() <= 10
        && subject
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && digest.len() == 16
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> NetworkConfig {
        NetworkConfig {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }

    // ==================== Token Validation Tests ====================

    #[test]
    fn test_valid_tokens() {
        assert!(is_valid_token("upload-0123456789abcdef"));
        assert!(is_valid_token("-0123456789abcdef"));
        assert!(is_valid_token("rig_1-fedcba9876543210"));
        assert!(is_valid_token("abcdefghij-0123456789abcdef"));
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(!is_valid_token("0123456789abcdef"));
        assert!(!is_valid_token("upload-0123456789ABCDEF"));
        assert!(!is_valid_token("upload-0123456789abcde"));
        assert!(!is_valid_token("abcdefghijk-0123456789abcdef"));
        assert!(!is_valid_token("Upload-0123456789abcdef"));
        assert!(!is_valid_token("up-load-0123456789abcdef"));
    }

    #[test]
    fn test_token_secret_is_added_to_query() {
        let client = NightscoutClient::new(
            "https://ns.example.com",
            "token=rig-0123456789abcdef",
            &network(),
        )
        .unwrap();
        let url = client.url("entries", &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ns.example.com/api/v1/entries?token=rig-0123456789abcdef"
        );
    }

    #[test]
    fn test_malformed_token_secret_is_rejected() {
        let result = NightscoutClient::new("https://ns.example.com", "token=nope", &network());
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ApiError>(),
            Some(&ApiError::InvalidToken("token=nope".to_string()))
        );
    }

    // ==================== URL Construction Tests ====================

    #[test]
    fn test_plain_secret_leaves_query_empty() {
        let client = NightscoutClient::new("https://ns.example.com", "hunter2", &network()).unwrap();
        let url = client.url("entries", &[]).unwrap();
        assert_eq!(url.as_str(), "https://ns.example.com/api/v1/entries");
    }

    #[test]
    fn test_site_with_path_keeps_its_prefix() {
        let client =
            NightscoutClient::new("https://example.com/ns", "secret", &network()).unwrap();
        let url = client.url("entries.json", &[]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/ns/api/v1/entries.json");
    }

    #[test]
    fn test_since_query_is_encoded() {
        let client = NightscoutClient::new("https://ns.example.com", "secret", &network()).unwrap();
        let since = time::to_timestamp(1505625229000);
        let url = client
            .url("entries.json", &since_query(since, 48))
            .unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (
                    "find[dateString][$gte]".to_string(),
                    "2017-09-17T05:13:49.000+0000".to_string()
                ),
                ("count".to_string(), "48".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_site_is_rejected() {
        assert!(NightscoutClient::new("not a url", "secret", &network()).is_err());
        assert!(NightscoutClient::new("", "secret", &network()).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = ApiError::Status {
            endpoint: "entries".to_string(),
            status: 401,
        };
        assert_eq!(err.to_string(), "entries returned error status: 401");
    }
}
