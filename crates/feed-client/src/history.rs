//! Paginated history fetching
//!
//! The fetcher only performs the request. Advancing the cursor after a
//! successful page is the caller's job.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cancel::CancelSignal;
use crate::http::{ApiClient, ApiRequest};
use crate::types::{Credential, HistoryPage, PageCursor};
use crate::{Error, Result};

/// Default path of the history endpoint
pub const DEFAULT_HISTORY_PATH: &str = "/api/feed/";

/// Source of history pages
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch one page of history
    ///
    /// Fails with [`Error::Unauthenticated`] without contacting the service
    /// when the credential is empty, and with [`Error::Cancelled`] once
    /// `cancel` fires.
    async fn fetch_page(
        &self,
        cursor: PageCursor,
        credential: &Credential,
        cancel: CancelSignal,
    ) -> Result<HistoryPage>;
}

/// History source backed by the feed service's HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: Arc<ApiClient>,
    path: String,
}

impl HttpHistorySource {
    /// Create a history source using the default endpoint path
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::with_path(client, DEFAULT_HISTORY_PATH)
    }

    /// Create a history source for a custom endpoint path
    pub fn with_path(client: Arc<ApiClient>, path: impl Into<String>) -> Self {
        Self { client, path: path.into() }
    }

    /// Endpoint path
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch_page(
        &self,
        cursor: PageCursor,
        credential: &Credential,
        mut cancel: CancelSignal,
    ) -> Result<HistoryPage> {
        if credential.is_empty() {
            return Err(Error::Unauthenticated);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = ApiRequest::get(&self.path).param("page", cursor.get().to_string());

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(page = cursor.get(), "history fetch cancelled");
                return Err(Error::Cancelled);
            }
            response = self.client.get::<HistoryPage>(request, credential) => response?,
        };

        tracing::debug!(
            page = cursor.get(),
            items = page.items.len(),
            status = ?page.status,
            "fetched history page"
        );

        Ok(page)
    }
}
