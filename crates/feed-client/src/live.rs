//! Live push subscription
//!
//! One connection per session, keyed by the session credential. Each inbound
//! message carries one serialized [`FeedItem`]. Undecodable messages are
//! logged and skipped; a transport failure ends the feed and is reported
//! exactly once. Reconnecting is left to the owner.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::http::ClientConfig;
use crate::types::{Credential, FeedItem};
use crate::{Error, Result};

/// Raw message stream produced by a push connection
///
/// `Err(Error::Decode)` items are per-message failures; any other error
/// means the connection is gone.
pub type PushStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens push connections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Open a connection authorized by `credential`
    async fn connect(&self, credential: &Credential) -> Result<PushStream>;
}

/// Push connector over a WebSocket endpoint
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    config: ClientConfig,
}

impl WebSocketConnector {
    /// Create a connector for a `ws://` or `wss://` endpoint
    pub fn new(url: impl Into<String>, config: ClientConfig) -> Self {
        Self { url: url.into(), config }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, credential: &Credential) -> Result<PushStream> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::InvalidInput(format!("invalid push URL {}: {}", self.url, e)))?;

        let authorization = HeaderValue::from_str(&self.config.authorization(credential))
            .map_err(|e| Error::InvalidInput(format!("invalid credential: {}", e)))?;
        request.headers_mut().insert("Authorization", authorization);

        let user_agent = HeaderValue::from_str(&self.config.user_agent)
            .map_err(|e| Error::InvalidInput(format!("invalid user agent: {}", e)))?;
        request.headers_mut().insert("User-Agent", user_agent);

        let (socket, _response) =
            tokio::time::timeout(self.config.timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| Error::Transport("push connection timed out".to_string()))?
                .map_err(|e| Error::Transport(format!("push connection failed: {}", e)))?;

        tracing::info!(url = %self.url, "push connection established");

        let messages = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    Some(String::from_utf8(bytes).map_err(|e| Error::Decode(e.to_string())))
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "push connection closed by server");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(Error::ConnectionLost(e.to_string()))),
            }
        });

        Ok(Box::pin(messages))
    }
}

/// Event produced by a [`LiveFeed`]
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// A decoded item
    Item(FeedItem),
    /// The connection failed; no further items will arrive
    ConnectionLost(String),
    /// The connection ended normally
    Closed,
}

/// Decode one push message
pub fn decode_message(text: &str) -> Result<FeedItem> {
    serde_json::from_str(text).map_err(|e| Error::Decode(e.to_string()))
}

/// Opens live feeds for a session
#[derive(Clone)]
pub struct LiveSubscriber {
    connector: Arc<dyn PushConnector>,
}

impl LiveSubscriber {
    /// Create a subscriber over a connector
    pub fn new(connector: Arc<dyn PushConnector>) -> Self {
        Self { connector }
    }

    /// Open the live feed for a credential
    pub async fn subscribe(&self, credential: &Credential) -> Result<LiveFeed> {
        if credential.is_empty() {
            return Err(Error::Unauthenticated);
        }

        let stream = self.connector.connect(credential).await?;
        Ok(LiveFeed::new(stream))
    }
}

/// An open live connection
pub struct LiveFeed {
    stream: PushStream,
    finished: bool,
    decode_failures: u64,
}

impl LiveFeed {
    /// Wrap a raw message stream
    pub fn new(stream: PushStream) -> Self {
        Self { stream, finished: false, decode_failures: 0 }
    }

    /// Wait for the next event
    ///
    /// After `ConnectionLost` or `Closed` every further call returns `Closed`.
    pub async fn next_event(&mut self) -> LiveEvent {
        while !self.finished {
            match self.stream.next().await {
                Some(Ok(text)) => match decode_message(&text) {
                    Ok(item) => return LiveEvent::Item(item),
                    Err(e) => self.skip(&e),
                },
                Some(Err(e @ Error::Decode(_))) => self.skip(&e),
                Some(Err(e)) => {
                    self.finished = true;
                    tracing::error!(error = %e, "push connection lost");
                    return LiveEvent::ConnectionLost(e.to_string());
                }
                None => {
                    self.finished = true;
                    return LiveEvent::Closed;
                }
            }
        }
        LiveEvent::Closed
    }

    /// Number of messages dropped because they could not be decoded
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    fn skip(&mut self, err: &Error) {
        self.decode_failures += 1;
        tracing::warn!(error = %err, "dropping undecodable push message");
    }
}
