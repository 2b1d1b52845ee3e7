//! API client for the nearby cloud functions.
//!
//! This module provides the `ApiClient` struct for calling the server-side
//! functions that compute nearby friends and resync the friend graph, and
//! for recording analytics events.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{NearbyFriends, NearbyFriendsResponse};

use super::{FriendService, RemoteCallFailure};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Matches the refresh interval so a hung request never outlives the next tick.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Cloud function returning the user's best and nearby friends
const NEARBY_FRIENDS_FUNCTION: &str = "nearbyFriends";

/// Cloud function that rebuilds the user's friend graph on the server
const UPDATE_FRIENDS_FUNCTION: &str = "updateFriends";

const APPLICATION_ID_HEADER: &str = "x-parse-application-id";
const REST_API_KEY_HEADER: &str = "x-parse-rest-api-key";
const SESSION_TOKEN_HEADER: &str = "x-parse-session-token";

/// Delay before retry number `retry` (starting at 1) of a rate-limited request,
/// or `None` once the retries are used up.
fn rate_limit_backoff(retry: u32) -> Option<Duration> {
    if retry == 0 || retry > MAX_RATE_LIMIT_RETRIES {
        return None;
    }
    Some(Duration::from_millis(INITIAL_BACKOFF_MS << (retry - 1)))
}

/// Envelope around every successful cloud function result
#[derive(Debug, Deserialize)]
struct FunctionResponse<T> {
    result: T,
}

#[derive(Debug, Serialize)]
struct AnalyticsEvent<'a> {
    dimensions: &'a BTreeMap<String, String>,
}

/// API client for the cloud function server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    headers: header::HeaderMap,
}

impl ApiClient {
    /// Create a new API client from the application config
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref id) = config.application_id {
            headers.insert(
                APPLICATION_ID_HEADER,
                header::HeaderValue::from_str(id).context("Invalid application id")?,
            );
        }
        if let Some(ref key) = config.rest_api_key {
            headers.insert(
                REST_API_KEY_HEADER,
                header::HeaderValue::from_str(key).context("Invalid REST API key")?,
            );
        }

        let api = Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            headers,
        };

        match config.session_token {
            Some(ref token) => api.with_session_token(token),
            None => Ok(api),
        }
    }

    /// Create a new ApiClient acting for the given session, sharing the connection pool.
    pub fn with_session_token(&self, token: &str) -> Result<Self> {
        let mut headers = self.headers.clone();
        let mut value = header::HeaderValue::from_str(token).context("Invalid session token")?;
        value.set_sensitive(true);
        headers.insert(SESSION_TOKEN_HEADER, value);

        Ok(Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            headers,
        })
    }

    fn function_url(&self, name: &str) -> String {
        format!("{}/functions/{}", self.base_url, name)
    }

    fn event_url(&self, name: &str) -> String {
        format!("{}/events/{}", self.base_url, name)
    }

    /// Check if response is successful.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, RemoteCallFailure> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteCallFailure::from_status(status, &body))
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, RemoteCallFailure> {
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(url)
                .headers(self.headers.clone())
                .json(body)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return Ok(response.json().await?);
                }
                None => {
                    retries += 1;
                    let Some(backoff) = rate_limit_backoff(retries) else {
                        return Err(RemoteCallFailure::rate_limited());
                    };
                    warn!(
                        url = url,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Call a cloud function without parameters and unwrap its `result`
    async fn call_function<T: DeserializeOwned>(&self, name: &str) -> Result<T, RemoteCallFailure> {
        debug!(function = name, "Calling cloud function");
        let response: FunctionResponse<T> = self
            .post(&self.function_url(name), &serde_json::json!({}))
            .await?;
        Ok(response.result)
    }

    /// Record a custom analytics event with string dimensions
    pub async fn track_event(
        &self,
        name: &str,
        dimensions: &BTreeMap<String, String>,
    ) -> Result<(), RemoteCallFailure> {
        let _: serde_json::Value = self
            .post(&self.event_url(name), &AnalyticsEvent { dimensions })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FriendService for ApiClient {
    async fn fetch_nearby_friends(&self) -> Result<NearbyFriends, RemoteCallFailure> {
        let response: NearbyFriendsResponse = self.call_function(NEARBY_FRIENDS_FUNCTION).await?;
        let friends = response.to_nearby_friends();
        debug!(
            best = friends.best_friends.len(),
            nearby = friends.nearby_friends.len(),
            "Nearby friends fetched"
        );
        Ok(friends)
    }

    async fn trigger_friend_sync(&self) -> Result<(), RemoteCallFailure> {
        let _: serde_json::Value = self.call_function(UPDATE_FRIENDS_FUNCTION).await?;
        Ok(())
    }
}
