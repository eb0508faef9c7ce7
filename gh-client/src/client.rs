use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::{FetchError, Result};
use crate::types::{RateLimitState, SearchPage};

const RATE_LIMIT_MAX_ATTEMPTS: u32 = 7;
const SERVER_MAX_ATTEMPTS: u32 = 3;
const BACKOFF_CAP_SECS: f64 = 300.0;
const DEFAULT_SEARCH_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// The upstream search endpoint never returns past this page (1000 results
/// at 100/page); a still-full 10th page means the bucket is incomplete.
const MAX_SEARCH_PAGE: u32 = 10;

/// Result of paging a search endpoint to exhaustion (or to the upstream
/// 1000-result cap). `truncated` is set when the 10th page is still full,
/// meaning there may be unreturned matches.
#[derive(Debug, Clone, Default)]
pub struct SearchAllResult {
    pub items: Vec<Value>,
    pub truncated: bool,
}

/// Rate-limited, retrying client over the GitHub/GHES REST v3 API.
///
/// Throttle, quota tracking, and the underlying HTTP session each guard
/// their own lock; acquiring the search throttle never happens while a
/// retry-wait sleep is held.
pub struct GhClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    search_interval: Duration,
    last_search: AsyncMutex<Option<Instant>>,
    rate_limit: StdMutex<RateLimitState>,
}

impl GhClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        Self::with_search_interval(base_url, token, DEFAULT_SEARCH_INTERVAL)
    }

    pub fn with_search_interval(
        base_url: &str,
        token: impl Into<String>,
        search_interval: Duration,
    ) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let api_base = if base.contains("api.github.com") {
            base.to_string()
        } else {
            format!("{base}/api/v3")
        };

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base,
            token: token.into(),
            search_interval,
            last_search: AsyncMutex::new(None),
            rate_limit: StdMutex::new(RateLimitState::empty()),
        })
    }

    // ── Public API ──

    pub async fn search_issues(&self, query: &str, page: u32, per_page: u32) -> Result<SearchPage> {
        self.throttle_search().await;
        let value = self
            .request_with_retry(
                reqwest::Method::GET,
                "/search/issues",
                &[
                    ("q", query.to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ],
                None,
            )
            .await?;
        serde_json::from_value(value).map_err(|e| FetchError::UnexpectedShape {
            path: "/search/issues".into(),
            reason: e.to_string(),
        })
    }

    pub async fn search_commits(&self, query: &str, page: u32, per_page: u32) -> Result<SearchPage> {
        self.throttle_search().await;
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/vnd.github.cloak-preview+json"),
        );
        let value = self
            .request_with_retry(
                reqwest::Method::GET,
                "/search/commits",
                &[
                    ("q", query.to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ],
                Some(headers),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| FetchError::UnexpectedShape {
            path: "/search/commits".into(),
            reason: e.to_string(),
        })
    }

    /// Pages `/search/issues` to exhaustion. The upstream search endpoint
    /// caps results at 1000 (10 pages of 100); when the 10th page still
    /// comes back full there may be more matches it will never return, so
    /// this is logged as a truncated result rather than assumed complete
    /// (SPEC_FULL.md §4.9 step 2 / Open Question (a)).
    pub async fn search_all_pages(&self, query: &str) -> Result<SearchAllResult> {
        let mut all = Vec::new();
        let mut page = 1;
        let mut truncated = false;
        loop {
            let result = self.search_issues(query, page, 100).await?;
            let n = result.items.len();
            all.extend(result.items);
            if n < 100 {
                break;
            }
            if page >= MAX_SEARCH_PAGE {
                tracing::warn!(query, page, "search results truncated at the upstream 1000-result cap");
                truncated = true;
                break;
            }
            page += 1;
        }
        Ok(SearchAllResult { items: all, truncated })
    }

    /// Same truncation handling as `search_all_pages`, for `/search/commits`.
    pub async fn search_all_commit_pages(&self, query: &str) -> Result<SearchAllResult> {
        let mut all = Vec::new();
        let mut page = 1;
        let mut truncated = false;
        loop {
            let result = self.search_commits(query, page, 100).await?;
            let n = result.items.len();
            all.extend(result.items);
            if n < 100 {
                break;
            }
            if page >= MAX_SEARCH_PAGE {
                tracing::warn!(query, page, "commit search results truncated at the upstream 1000-result cap");
                truncated = true;
                break;
            }
            page += 1;
        }
        Ok(SearchAllResult { items: all, truncated })
    }

    pub async fn get_pr(&self, owner: &str, repo: &str, number: u64) -> Result<Value> {
        self.request_with_retry(
            reqwest::Method::GET,
            &format!("/repos/{owner}/{repo}/pulls/{number}"),
            &[],
            None,
        )
        .await
    }

    pub async fn get_pr_files(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Value>> {
        self.paginate(&format!("/repos/{owner}/{repo}/pulls/{number}/files"))
            .await
    }

    pub async fn get_pr_comments(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Value>> {
        let mut review_comments = self
            .paginate(&format!("/repos/{owner}/{repo}/pulls/{number}/comments"))
            .await?;
        let issue_comments = self
            .paginate(&format!("/repos/{owner}/{repo}/issues/{number}/comments"))
            .await?;
        review_comments.extend(issue_comments);
        Ok(review_comments)
    }

    pub async fn get_pr_reviews(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Value>> {
        self.paginate(&format!("/repos/{owner}/{repo}/pulls/{number}/reviews"))
            .await
    }

    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Value> {
        self.request_with_retry(
            reqwest::Method::GET,
            &format!("/repos/{owner}/{repo}/commits/{sha}"),
            &[],
            None,
        )
        .await
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Value> {
        self.request_with_retry(
            reqwest::Method::GET,
            &format!("/repos/{owner}/{repo}/issues/{number}"),
            &[],
            None,
        )
        .await
    }

    pub async fn get_issue_comments(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Value>> {
        self.paginate(&format!("/repos/{owner}/{repo}/issues/{number}/comments"))
            .await
    }

    // ── Throttle ──

    async fn throttle_search(&self) {
        if self.search_interval.is_zero() {
            return;
        }
        let mut last = self.last_search.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.search_interval {
                let wait = self.search_interval - elapsed;
                tracing::debug!(wait_secs = wait.as_secs_f64(), "search throttle");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    // ── Retry core ──

    async fn request_with_retry(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        extra_headers: Option<HeaderMap>,
    ) -> Result<Value> {
        let mut rate_limit_attempt = 0u32;
        let mut server_attempt = 0u32;

        loop {
            let url = format!("{}{}", self.api_base, path);
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("token {}", self.token))
                .header("Accept", "application/vnd.github.v3+json")
                .query(query);
            if let Some(h) = &extra_headers {
                req = req.headers(h.clone());
            }

            tracing::debug!(%method, path, "request");
            let resp = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    if server_attempt < SERVER_MAX_ATTEMPTS {
                        let wait = backoff_secs(server_attempt);
                        server_attempt += 1;
                        tracing::warn!(path, attempt = server_attempt, %e, "transport error, retrying");
                        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                        continue;
                    }
                    return Err(FetchError::TransportExhausted {
                        path: path.to_string(),
                        attempts: server_attempt,
                        source: e,
                    });
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();

            if status.as_u16() == 429 {
                if rate_limit_attempt < RATE_LIMIT_MAX_ATTEMPTS {
                    let wait = rate_limit_wait(&headers, rate_limit_attempt);
                    rate_limit_attempt += 1;
                    tracing::warn!(path, attempt = rate_limit_attempt, wait, "rate limited (429)");
                    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                    continue;
                }
                return Err(FetchError::RateLimitExhausted {
                    path: path.to_string(),
                    attempts: rate_limit_attempt,
                });
            }

            if status.as_u16() == 403 {
                let body = resp.text().await.unwrap_or_default();
                if body.to_lowercase().contains("rate limit") {
                    if rate_limit_attempt < RATE_LIMIT_MAX_ATTEMPTS {
                        let wait = rate_limit_wait(&headers, rate_limit_attempt);
                        rate_limit_attempt += 1;
                        tracing::warn!(path, attempt = rate_limit_attempt, wait, "rate limited (403)");
                        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                        continue;
                    }
                    return Err(FetchError::RateLimitExhausted {
                        path: path.to_string(),
                        attempts: rate_limit_attempt,
                    });
                }
                return Err(FetchError::ClientError {
                    status: 403,
                    path: path.to_string(),
                    body,
                });
            }

            if status.as_u16() >= 500 {
                if server_attempt < SERVER_MAX_ATTEMPTS {
                    let wait = backoff_secs(server_attempt);
                    server_attempt += 1;
                    tracing::warn!(path, status = status.as_u16(), attempt = server_attempt, "server error, retrying");
                    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                    continue;
                }
                return Err(FetchError::ServerExhausted {
                    status: status.as_u16(),
                    path: path.to_string(),
                    attempts: server_attempt,
                });
            }

            if status.as_u16() >= 400 {
                let body = resp.text().await.unwrap_or_default();
                return Err(FetchError::ClientError {
                    status: status.as_u16(),
                    path: path.to_string(),
                    body,
                });
            }

            self.track_rate_limit(&headers);
            self.wait_if_critical().await;
            let value: Value = resp.json().await?;
            return Ok(value);
        }
    }

    fn track_rate_limit(&self, headers: &HeaderMap) {
        let remaining = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());
        let Some(remaining) = remaining else {
            return;
        };
        let reset = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());

        {
            let mut state = self.rate_limit.lock().expect("rate limit lock poisoned");
            state.remaining = Some(remaining);
            state.reset_epoch = reset;
        }

        if remaining < 100 {
            tracing::warn!(remaining, "rate limit low");
        }
    }

    /// Sleeps until quota reset when critically low. Called eagerly after a
    /// successful response so the *next* call doesn't walk straight into 429.
    pub async fn wait_if_critical(&self) {
        let snapshot = {
            let state = self.rate_limit.lock().expect("rate limit lock poisoned");
            *state
        };
        if let Some(remaining) = snapshot.remaining {
            if remaining < 10 {
                if let Some(reset) = snapshot.reset_epoch {
                    let now = now_epoch();
                    let wait = ((reset - now).max(0) + 1) as u64;
                    tracing::warn!(remaining, wait, "rate limit critical, waiting until reset");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                } else {
                    tracing::warn!(remaining, "rate limit critical, no reset header");
                }
            }
        }
    }

    // ── Pagination ──

    async fn paginate(&self, path: &str) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let value = self
                .request_with_retry(
                    reqwest::Method::GET,
                    path,
                    &[("page", page.to_string()), ("per_page", "100".to_string())],
                    None,
                )
                .await?;

            match value {
                Value::Array(items) => {
                    if items.is_empty() {
                        break;
                    }
                    let n = items.len();
                    all.extend(items);
                    if n < 100 {
                        break;
                    }
                    page += 1;
                }
                other => {
                    all.push(other);
                    break;
                }
            }
        }
        tracing::debug!(path, pages = page, items = all.len(), "paginate");
        Ok(all)
    }
}

fn backoff_secs(attempt: u32) -> f64 {
    2f64.powi(attempt as i32).min(BACKOFF_CAP_SECS)
}

fn rate_limit_wait(headers: &HeaderMap, attempt: u32) -> f64 {
    let retry_after = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());

    let base = if let Some(ra) = retry_after {
        ra
    } else if let Some(reset) = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
    {
        (reset - now_epoch()).max(0) as f64
    } else {
        backoff_secs(attempt)
    };

    let jitter = rand::thread_rng().gen_range(0.75..=1.25);
    (base * jitter).max(1.0)
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_300() {
        assert!((backoff_secs(9) - BACKOFF_CAP_SECS).abs() < f64::EPSILON);
        assert_eq!(backoff_secs(0), 1.0);
    }

    #[test]
    fn rate_limit_wait_has_floor_of_one_second() {
        let headers = HeaderMap::new();
        let wait = rate_limit_wait(&headers, 0);
        assert!(wait >= 1.0);
    }

    #[tokio::test]
    async fn new_rejects_nothing_and_builds() {
        let client = GhClient::new("https://github.example.com", "token123");
        assert!(client.is_ok());
    }
}
