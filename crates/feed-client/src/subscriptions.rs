//! Channel subscriptions listing
//!
//! Only used to tell "no channels configured" apart from "channels configured
//! but the feed is still populating".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::http::{ApiClient, ApiRequest};
use crate::types::{ChannelRef, Credential};
use crate::Result;

/// Default path of the subscriptions endpoint
pub const DEFAULT_SUBSCRIPTIONS_PATH: &str = "/api/subscriptions/";

/// Response of the subscriptions endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionList {
    /// Channels the user is subscribed to
    pub channels: Vec<ChannelRef>,
}

/// Source of the user's channel subscriptions
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// List subscribed channels
    async fn channels(&self, credential: &Credential) -> Result<Vec<ChannelRef>>;
}

/// Subscription source backed by the feed service's HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpSubscriptionSource {
    client: Arc<ApiClient>,
    path: String,
}

impl HttpSubscriptionSource {
    /// Create a subscription source using the default endpoint path
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::with_path(client, DEFAULT_SUBSCRIPTIONS_PATH)
    }

    /// Create a subscription source for a custom endpoint path
    pub fn with_path(client: Arc<ApiClient>, path: impl Into<String>) -> Self {
        Self { client, path: path.into() }
    }
}

#[async_trait]
impl SubscriptionSource for HttpSubscriptionSource {
    async fn channels(&self, credential: &Credential) -> Result<Vec<ChannelRef>> {
        let list = self
            .client
            .get::<SubscriptionList>(ApiRequest::get(&self.path), credential)
            .await?;

        Ok(list.channels)
    }
}
