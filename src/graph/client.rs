//! Microsoft Graph directory search client.
//!
//! Issues filtered collection requests against the Graph API and follows
//! `@odata.nextLink` continuation pages until the result cap is reached.

use std::time::Duration;

use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use super::models::SearchRequest;
use super::query::ODataQuery;
use crate::auth::AccessToken;
use crate::config::Config;
use crate::error::GraphError;

/// HTTP connection timeout.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest `$top` the directory collections accept.
const MAX_PAGE_SIZE: usize = 999;

/// Wait before retrying a 429 that carried no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Characters of an error body kept in logs.
const BODY_PREVIEW_LEN: usize = 500;

/// One page of a Graph collection response.
#[derive(Debug, Deserialize)]
struct GraphPage {
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Microsoft Graph search client.
pub struct GraphSearchClient {
    http_client: Client,
    root: Url,
}

impl GraphSearchClient {
    /// Create a client for a Graph version root such as `https://graph.microsoft.com/v1.0`.
    pub fn new(graph_root: &str) -> Result<Self, GraphError> {
        let root = Url::parse(graph_root).map_err(|e| {
            GraphError::Malformed(format!("invalid Graph URL '{}': {}", graph_root, e))
        })?;
        if root.cannot_be_a_base() {
            return Err(GraphError::Malformed(format!(
                "invalid Graph URL '{}'",
                graph_root
            )));
        }

        let http_client = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GraphError::Network(e.to_string()))?;

        Ok(Self { http_client, root })
    }

    pub fn from_config(config: &Config) -> Result<Self, GraphError> {
        Self::new(&config.graph_root())
    }

    /// Run one search, following continuation pages.
    ///
    /// `request.timeout` bounds the whole operation including rate-limit waits.
    /// Nothing is returned when it elapses, even if some pages arrived.
    pub async fn search(
        &self,
        request: &SearchRequest,
        token: &AccessToken,
    ) -> Result<Vec<Value>, GraphError> {
        let deadline = Instant::now() + request.timeout;
        match time::timeout_at(deadline, self.collect_pages(request, token, deadline)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Search for {} '{}' did not finish within {:?}",
                    request.entity_type, request.query, request.timeout
                );
                Err(GraphError::Timeout)
            }
        }
    }

    async fn collect_pages(
        &self,
        request: &SearchRequest,
        token: &AccessToken,
        deadline: Instant,
    ) -> Result<Vec<Value>, GraphError> {
        let mut records = Vec::new();
        let mut pages = 0;
        let mut next = Some(self.first_page_url(request));

        while let Some(url) = next.take() {
            let page = self.fetch_page(&url, token, deadline).await?;
            pages += 1;
            records.extend(page.value);

            next = match page.next_link {
                Some(link) if records.len() < request.max_results => {
                    Some(self.continuation_url(&link)?)
                }
                _ => None,
            };
        }

        records.truncate(request.max_results);
        info!(
            "Found {} {} records for '{}' ({} page(s))",
            records.len(),
            request.entity_type,
            request.query,
            pages
        );
        Ok(records)
    }

    fn first_page_url(&self, request: &SearchRequest) -> Url {
        let query = ODataQuery::for_request(request);
        let top = request.max_results.min(MAX_PAGE_SIZE);

        let mut url = self.root.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(request.entity_type.profile().collection);
        }
        url.query_pairs_mut()
            .append_pair("$filter", &query.filter)
            .append_pair("$select", &query.select_param())
            .append_pair("$top", &top.to_string());
        url
    }

    /// Parse a next link, refusing any that would send the token to another host.
    fn continuation_url(&self, link: &str) -> Result<Url, GraphError> {
        let url = Url::parse(link)
            .map_err(|e| GraphError::Malformed(format!("invalid next link '{}': {}", link, e)))?;

        if url.origin() != self.root.origin() {
            warn!("Refusing next link outside {}: {}", self.root, link);
            return Err(GraphError::Malformed(format!(
                "next link points outside {}",
                self.root.origin().ascii_serialization()
            )));
        }

        Ok(url)
    }

    /// Fetch a page, retrying once after a 429.
    ///
    /// A 429 whose wait would end past `deadline` is returned as is.
    async fn fetch_page(
        &self,
        url: &Url,
        token: &AccessToken,
        deadline: Instant,
    ) -> Result<GraphPage, GraphError> {
        match self.get_page(url, token).await {
            Err(GraphError::RateLimited(retry_after)) => {
                let delay = retry_after.unwrap_or(DEFAULT_RETRY_AFTER);
                if Instant::now() + delay >= deadline {
                    warn!(
                        "Rate limited by Microsoft Graph, retry in {:?} would pass the search deadline",
                        delay
                    );
                    return Err(GraphError::RateLimited(retry_after));
                }
                warn!("Rate limited by Microsoft Graph, retrying in {:?}", delay);
                time::sleep(delay).await;
                self.get_page(url, token).await
            }
            result => result,
        }
    }

    async fn get_page(&self, url: &Url, token: &AccessToken) -> Result<GraphPage, GraphError> {
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                let body = response.text().await.map_err(transport_error)?;
                parse_page(&body)
            }
            401 => {
                let body = response.text().await.unwrap_or_default();
                warn!("Graph rejected the access token: {}", preview(&body));
                let detail = error_message(&body)
                    .unwrap_or_else(|| "Microsoft Graph rejected the access token".to_string());
                Err(GraphError::Unauthenticated(detail))
            }
            403 => {
                let body = response.text().await.unwrap_or_default();
                warn!("Graph denied directory read: {}", preview(&body));
                Err(GraphError::Forbidden)
            }
            429 => Err(GraphError::RateLimited(retry_after(&response))),
            code => {
                let body = response.text().await.unwrap_or_default();
                error!("Graph search failed: HTTP {} - {}", status, preview(&body));
                Err(GraphError::Unknown(code))
            }
        }
    }
}

fn parse_page(body: &str) -> Result<GraphPage, GraphError> {
    serde_json::from_str(body).map_err(|e| {
        error!("Undecodable Graph response ({}): {}", e, preview(body));
        GraphError::Malformed(e.to_string())
    })
}

fn transport_error(err: reqwest::Error) -> GraphError {
    if err.is_timeout() {
        GraphError::Timeout
    } else {
        GraphError::Network(err.to_string())
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are not honored.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn error_message(body: &str) -> Option<String> {
    let parsed: GraphErrorBody = serde_json::from_str(body).ok()?;
    let GraphErrorDetail { code, message } = parsed.error;
    match (code.is_empty(), message.is_empty()) {
        (true, true) => None,
        (false, true) => Some(code),
        (true, false) => Some(message),
        (false, false) => Some(format!("{}: {}", code, message)),
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_LEN {
        return body.to_string();
    }
    let mut text: String = body.chars().take(BODY_PREVIEW_LEN).collect();
    text.push_str("...");
    text
}
