// src/core/ticketing/mod.rs

//! The Ticketing Adapter (C9): alert-to-incident creation with
//! deduplication, comment/transition lifecycle, rate limiting, and bounded
//! retries. All remote calls are best-effort from the pipeline's
//! perspective — callers swallow errors, this module never
//! panics.

mod config;
mod ratelimit;

pub use config::{AuthConfig, Deduplication, RateLimiting, TicketingConfig};

use crate::core::errors::{OpsError, OpsResult};
use crate::core::types::{Alert, HealResult};
use chrono::{DateTime, Utc};
use ratelimit::SlidingWindowLimiter;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

struct CachedTicket {
    issue_key: String,
    created_at: DateTime<Utc>,
}

/// A client for a ticketing system's REST API (issue-create, comment-add,
/// transition, label-add, search over HTTPS with basic/bearer auth).
/// Dedup-cached by `metric-level`, rate-limited, and retried with
/// bounded backoff on 429/timeout.
pub struct TicketingAdapter {
    config: TicketingConfig,
    client: reqwest::Client,
    cache: HashMap<String, CachedTicket>,
    limiter: SlidingWindowLimiter,
}

impl TicketingAdapter {
    pub fn new(config: TicketingConfig) -> Self {
        let limiter = SlidingWindowLimiter::new(
            config.rate_limiting.max_requests_per_minute,
            Duration::from_secs(60),
        );
        Self {
            config,
            client: reqwest::Client::new(),
            cache: HashMap::new(),
            limiter,
        }
    }

    fn authenticate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            AuthConfig::Basic { username, password } => {
                request.basic_auth(config::resolve_env(username), Some(config::resolve_env(password)))
            }
            AuthConfig::Bearer { token } => request.bearer_auth(config::resolve_env(token)),
        }
    }

    async fn throttle(&mut self) {
        loop {
            let wait = self.limiter.wait_time(Instant::now());
            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => {
                    self.limiter.record(Instant::now());
                    return;
                }
            }
        }
    }

    /// Sends one request with the adapter's rate limiting, timeout, and
    /// bounded retry-on-429/timeout behavior applied.
    async fn send(&mut self, build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder) -> OpsResult<reqwest::Response> {
        for attempt in 0..=MAX_RETRIES {
            self.throttle().await;

            let request = self.authenticate(build(&self.client)).timeout(REQUEST_TIMEOUT);

            match request.send().await {
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);
                    if attempt == MAX_RETRIES {
                        return Err(OpsError::RemoteFailure("ticketing rate limited".to_string()));
                    }
                    warn!(attempt, retry_after, "ticketing request rate limited, retrying");
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                }
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    return Err(OpsError::RemoteFailure(format!(
                        "ticketing request failed with status {}",
                        response.status()
                    )));
                }
                Err(e) if e.is_timeout() && attempt < MAX_RETRIES => {
                    warn!(attempt, "ticketing request timed out, retrying");
                    continue;
                }
                Err(e) => return Err(OpsError::Http(e)),
            }
        }
        Err(OpsError::RemoteFailure("ticketing request exhausted retries".to_string()))
    }

    fn dedup_key(alert: &Alert) -> String {
        format!("{}-{}", alert.metric, crate::core::types::level_str(alert.level))
    }

    fn cached_ticket(&self, key: &str, now: DateTime<Utc>) -> Option<&str> {
        if !self.config.deduplication.enabled {
            return None;
        }
        let window = chrono::Duration::minutes(self.config.deduplication.window_minutes as i64);
        self.cache.get(key).and_then(|entry| {
            if now - entry.created_at < window {
                Some(entry.issue_key.as_str())
            } else {
                None
            }
        })
    }

    /// Creates an incident from `alert`, or appends an occurrence comment
    /// to the existing issue if one was created within the dedup window.
    pub async fn create_incident_from_alert(&mut self, alert: &Alert) -> OpsResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let key = Self::dedup_key(alert);
        let now = Utc::now();

        if let Some(issue_key) = self.cached_ticket(&key, now) {
            let issue_key = issue_key.to_string();
            return self
                .add_comment(&issue_key, &format!("Alert recurred: {}", alert.message), false)
                .await;
        }

        let url = format!("{}/rest/servicedeskapi/request", self.config.base_url);
        let priority = self
            .config
            .priority_mapping
            .get(crate::core::types::level_str(alert.level))
            .cloned()
            .unwrap_or_else(|| "Medium".to_string());
        let body = serde_json::json!({
            "serviceDeskId": self.config.service_desk_id,
            "requestTypeId": self.config.request_type_id,
            "requestFieldValues": {
                "summary": format!("[{}] {}", alert.metric, alert.message),
                "description": alert.message,
                "priority": priority,
            },
            "labels": self.config.labels,
        });

        let response = self
            .send(|client| client.post(&url).json(&body))
            .await?;
        let created: serde_json::Value = response.json().await?;
        let issue_key = created
            .get("issueKey")
            .and_then(|v| v.as_str())
            .unwrap_or("UNKNOWN")
            .to_string();

        info!(issue_key = %issue_key, metric = %alert.metric, "created ticketing incident");
        self.cache.insert(
            key,
            CachedTicket {
                issue_key,
                created_at: now,
            },
        );
        Ok(())
    }

    /// Appends a heal-result comment to the incident created for `key`.
    pub async fn update_incident_with_heal_result(&mut self, key: &str, heal: &HealResult) -> OpsResult<()> {
        let Some(issue_key) = self.cached_ticket(key, Utc::now()).map(str::to_string) else {
            return Ok(());
        };
        let text = if heal.success {
            format!("AutoHeal playbook '{}' resolved the incident.", heal.playbook.clone().unwrap_or_default())
        } else {
            format!(
                "AutoHeal playbook attempt failed: {}",
                heal.reason.clone().unwrap_or_else(|| "unknown reason".to_string())
            )
        };
        self.add_comment(&issue_key, &text, false).await
    }

    pub async fn close_incident(&mut self, key: &str, resolution: &str) -> OpsResult<()> {
        let Some(issue_key) = self.cached_ticket(key, Utc::now()).map(str::to_string) else {
            return Ok(());
        };
        let transition_id = self
            .config
            .transition_mapping
            .get("resolved")
            .cloned()
            .unwrap_or_else(|| "resolved".to_string());
        let url = format!(
            "{}/rest/servicedeskapi/request/{issue_key}/transition",
            self.config.base_url
        );
        let body = serde_json::json!({ "transition": { "id": transition_id }, "resolution": resolution });
        self.send(|client| client.post(&url).json(&body)).await?;
        Ok(())
    }

    pub async fn add_comment(&mut self, issue_key: &str, text: &str, public: bool) -> OpsResult<()> {
        let url = format!("{}/rest/servicedeskapi/request/{issue_key}/comment", self.config.base_url);
        let body = serde_json::json!({ "body": text, "public": public });
        self.send(|client| client.post(&url).json(&body)).await?;
        Ok(())
    }

    pub async fn link_report_to_incident(&mut self, issue_key: &str, path: &str, link_type: &str) -> OpsResult<()> {
        let url = format!("{}/rest/servicedeskapi/request/{issue_key}/attachment", self.config.base_url);
        let body = serde_json::json!({ "path": path, "type": link_type });
        self.send(|client| client.post(&url).json(&body)).await?;
        Ok(())
    }
}
