use crate::config::CanvasConfig;
use crate::domain::ports::TokenProvider;
use crate::utils::error::{CanvasError, Result};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// API client with pacing, retry, and runaway-pagination defense. Cheap to
/// construct; fan-out workers each build their own instance.
pub struct CanvasClient {
    http: Client,
    config: CanvasConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl CanvasClient {
    pub fn new(config: CanvasConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: Client::new(),
            config,
            tokens,
        }
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Single authenticated round trip. A fixed pacing delay runs before every
    /// outbound request as a simple guard against the remote rate limiter.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        if self.config.pacing_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.pacing_delay_ms)).await;
        }

        let url = format!("{}{}", self.config.base_url_trimmed(), path);
        let token = self.tokens.token().await?;

        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_secs));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        let request_url = response.url().to_string();
        let text = response.text().await?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| {
                CanvasError::api(
                    format!("Invalid JSON response: {}", e),
                    Some(status.as_u16()),
                    Some(text),
                    request_url,
                )
            });
        }

        let message = match status.as_u16() {
            401 => "Authentication failed: 401. Please check your API token.".to_string(),
            403 => "Permission denied: 403. You may not have the necessary permissions for this operation.".to_string(),
            429 => "Rate limit exceeded: 429. Please wait before retrying.".to_string(),
            code => format!("API request failed: {}", code),
        };
        tracing::debug!("API error response from {}: {} {}", request_url, status, text);
        Err(CanvasError::api(message, Some(status.as_u16()), Some(text), request_url))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let value = self.request(Method::GET, path, query, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Paginate a list endpoint, merging `per_page`-sized batches.
    ///
    /// Stops on: an empty page, a short page (last page), the caller's
    /// `max_pages`, the absolute page ceiling, or a page whose sorted id set
    /// was already seen (a server that repeats page 1 instead of signalling
    /// end-of-data). The duplicate page itself is discarded.
    ///
    /// Retry policy per page: 429 sleeps the fixed cool-down and retries;
    /// 401 aborts the whole pagination and returns partial results; any other
    /// failure retries with a linearly increasing delay and, once the retry
    /// budget is spent, surfaces the last error rather than skipping a page.
    pub async fn get_paginated(
        &self,
        path: &str,
        query: &[(String, String)],
        max_pages: Option<u32>,
    ) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut seen_pages: HashSet<Vec<i64>> = HashSet::new();
        let mut page: u32 = 1;

        loop {
            if let Some(limit) = max_pages {
                if page > limit {
                    tracing::info!("Reached page limit ({}) for {}, stopping", limit, path);
                    break;
                }
            }
            if page > self.config.max_pages_absolute {
                tracing::warn!(
                    "Reached absolute page limit ({}) for {}, stopping",
                    self.config.max_pages_absolute,
                    path
                );
                break;
            }

            let mut page_query: Vec<(String, String)> = query.to_vec();
            page_query.push(("per_page".to_string(), self.config.per_page.to_string()));
            page_query.push(("page".to_string(), page.to_string()));

            let mut attempt: u32 = 0;
            let items = loop {
                match self.request(Method::GET, path, &page_query, None).await {
                    Ok(value) => break page_items(value),
                    Err(e) if e.is_auth() => {
                        // 401 is never retried; keep what we have instead of looping.
                        tracing::error!(
                            "Authentication failed while paginating {}; returning partial results",
                            path
                        );
                        return Ok(all);
                    }
                    Err(e) => {
                        attempt += 1;
                        if attempt >= self.config.max_retries {
                            tracing::error!(
                                "Failed to fetch page {} of {} after {} attempts: {}",
                                page,
                                path,
                                attempt,
                                e
                            );
                            return Err(e);
                        }
                        if e.is_rate_limited() {
                            tracing::warn!(
                                "Rate limit hit on page {} of {}; cooling down {}s",
                                page,
                                path,
                                self.config.rate_limit_backoff_secs
                            );
                            tokio::time::sleep(Duration::from_secs(
                                self.config.rate_limit_backoff_secs,
                            ))
                            .await;
                        } else {
                            let wait =
                                Duration::from_millis(self.config.retry_delay_ms * attempt as u64);
                            tracing::info!(
                                "Error fetching page {} of {} (attempt {}): {}; retrying in {:?}",
                                page,
                                path,
                                attempt,
                                e,
                                wait
                            );
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            };

            if items.is_empty() {
                break;
            }

            if !seen_pages.insert(page_signature(&items)) {
                tracing::warn!(
                    "Duplicate item set on page {} of {}; server is repeating pages, stopping",
                    page,
                    path
                );
                break;
            }

            let short_page = items.len() < self.config.per_page;
            all.extend(items);
            if short_page {
                break;
            }
            page += 1;
        }

        tracing::debug!("Retrieved {} total items from {}", all.len(), path);
        Ok(all)
    }
}

/// List endpoints return bare arrays; some proxies wrap them in `{"data": []}`.
fn page_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(obj)],
        },
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Sorted id set identifying a page, used to detect a server that repeats
/// pages instead of signalling end-of-data.
fn page_signature(items: &[Value]) -> Vec<i64> {
    let mut ids: Vec<i64> = items
        .iter()
        .map(|v| v.get("id").and_then(Value::as_i64).unwrap_or(0))
        .collect();
    ids.sort_unstable();
    ids
}
