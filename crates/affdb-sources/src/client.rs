//! HTTP client for paged JSON product feeds.

use std::time::Duration;

use affdb_core::{AppConfig, AuthScheme, PagingStyle, SourceConfig, SourceNetwork};
use affdb_ingest::{Page, SourceClient, SourceError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};

use crate::paging::{page_number, parse_page, PageContext, DEFAULT_ITEMS_FIELD};

/// Fetches one catalog page per call from a source registered in
/// `sources.yaml`.
///
/// Non-2xx responses become typed [`SourceError`]s: 429 is
/// [`SourceError::RateLimited`], 404 is [`SourceError::NotFound`], anything
/// else [`SourceError::UnexpectedStatus`]. Retrying is left to the caller.
pub struct FeedClient {
    client: Client,
    name: String,
    network: SourceNetwork,
    base_url: Url,
    auth: AuthScheme,
    credential: Option<String>,
    page_size: u32,
    paging: PagingStyle,
    items_field: String,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("name", &self.name)
            .field("network", &self.network)
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .field("credential", &self.credential.as_ref().map(|_| "[redacted]"))
            .field("page_size", &self.page_size)
            .field("paging", &self.paging)
            .field("items_field", &self.items_field)
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Builds a client for `source`.
    ///
    /// `credential` is the secret resolved from the source's `credential_env`;
    /// pass `None` for public feeds.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfig`] if `base_url` does not parse or
    /// the source needs a credential that was not supplied, and
    /// [`SourceError::Transport`] if the HTTP client cannot be constructed.
    pub fn new(
        source: &SourceConfig,
        credential: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, SourceError> {
        let invalid = |reason: String| SourceError::InvalidConfig {
            source_name: source.name.clone(),
            reason,
        };

        let base_url = Url::parse(&source.base_url)
            .map_err(|e| invalid(format!("base_url '{}' is invalid: {e}", source.base_url)))?;

        if source.auth != AuthScheme::None && credential.is_none() {
            return Err(invalid("auth scheme requires a credential".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| SourceError::Transport(Box::new(e)))?;

        Ok(Self {
            client,
            name: source.name.clone(),
            network: source.network,
            base_url,
            auth: source.auth.clone(),
            credential,
            page_size: source.page_size,
            paging: source.paging,
            items_field: source
                .items_field
                .clone()
                .unwrap_or_else(|| DEFAULT_ITEMS_FIELD.to_string()),
        })
    }

    /// Builds a client using the HTTP settings from `config`.
    ///
    /// # Errors
    ///
    /// See [`FeedClient::new`].
    pub fn from_app_config(
        source: &SourceConfig,
        credential: Option<String>,
        config: &AppConfig,
    ) -> Result<Self, SourceError> {
        Self::new(
            source,
            credential,
            config.http_request_timeout_secs,
            &config.http_user_agent,
        )
    }

    /// URL for the page at `cursor`. Query-string credentials are added at
    /// send time so they never show up in logs.
    fn page_url(&self, cursor: Option<&str>) -> Result<(Url, u32), SourceError> {
        let mut url = self.base_url.clone();
        let mut current_page = 0;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            match self.paging {
                PagingStyle::PageNumber => {
                    current_page = page_number(&self.name, cursor)?;
                    query.append_pair("page", &current_page.to_string());
                }
                PagingStyle::Cursor => {
                    if let Some(c) = cursor {
                        query.append_pair("cursor", c);
                    }
                }
            }
        }
        Ok((url, current_page))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.auth, self.credential.as_deref()) {
            (AuthScheme::Bearer, Some(token)) => request.bearer_auth(token),
            (AuthScheme::Basic { username }, Some(secret)) => {
                request.basic_auth(username, Some(secret))
            }
            (AuthScheme::Query { param }, Some(secret)) => {
                request.query(&[(param.as_str(), secret)])
            }
            _ => request,
        }
    }
}

#[async_trait]
impl SourceClient for FeedClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn network(&self) -> SourceNetwork {
        self.network
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        let (url, current_page) = self.page_url(cursor)?;
        let url_text = url.to_string();

        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SourceError::Transport(Box::new(e.without_url())))?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(SourceError::RateLimited {
                source_name: self.name.clone(),
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound { url: url_text });
        }

        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: url_text,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Transport(Box::new(e.without_url())))?;
        let value = serde_json::from_str(&body).map_err(|e| SourceError::Decode {
            context: format!("page from {}", self.name),
            source: e,
        })?;

        let page = parse_page(
            value,
            &PageContext {
                source_name: &self.name,
                items_field: &self.items_field,
                paging: self.paging,
                page_size: self.page_size,
                current_page,
            },
        )?;

        tracing::debug!(
            source = %self.name,
            url = %url_text,
            items = page.items.len(),
            has_more = page.has_more,
            "decoded feed page"
        );
        Ok(page)
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
