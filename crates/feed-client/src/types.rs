//! Feed service wire types
//!
//! Items are identified by the `(channel_id, message_id)` pair. Everything
//! else on a [`FeedItem`] is display payload the sync engine never inspects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a feed item: unique within a session's item set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    /// Channel the item was posted to
    pub channel_id: i64,
    /// Message identifier, unique within the channel
    pub message_id: i64,
}

impl ItemKey {
    /// Create a new item key
    pub fn new(channel_id: i64, message_id: i64) -> Self {
        Self { channel_id, message_id }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.message_id)
    }
}

/// Reference to a channel as returned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Channel identifier
    pub id: i64,
    /// Channel title
    pub title: String,
    /// Public username, absent for private channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Media attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Media kind ("photo", "video", "audio", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Location of the media file
    pub url: String,
}

/// Reaction counter on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// The reaction emoji
    pub emoticon: String,
    /// Number of times it was used
    pub count: u64,
}

/// One post in the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireFeedItem")]
pub struct FeedItem {
    /// Channel the item was posted to
    pub channel_id: i64,

    /// Message identifier, unique within the channel
    pub message_id: i64,

    /// Publication time, used for ordering
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,

    /// Post text (may contain markup)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Channel details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,

    /// Attached media
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaItem>,

    /// Reaction counters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,

    /// View counter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
}

impl FeedItem {
    /// Create an item with no display payload
    pub fn new(channel_id: i64, message_id: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            channel_id,
            message_id,
            timestamp,
            text: None,
            channel: None,
            media: Vec::new(),
            reactions: Vec::new(),
            views: None,
        }
    }

    /// Set the post text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the view counter
    pub fn with_views(mut self, views: u64) -> Self {
        self.views = Some(views);
        self
    }

    /// Identity of this item
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.channel_id, self.message_id)
    }
}

/// Item shape accepted on the wire
///
/// History responses nest the channel instead of carrying a top-level
/// `channel_id`, so either form is accepted.
#[derive(Deserialize)]
struct WireFeedItem {
    #[serde(default)]
    channel_id: Option<i64>,
    message_id: i64,
    date: DateTime<Utc>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<ChannelRef>,
    #[serde(default)]
    media: Option<Vec<MediaItem>>,
    #[serde(default)]
    reactions: Option<Vec<Reaction>>,
    #[serde(default)]
    views: Option<u64>,
}

impl TryFrom<WireFeedItem> for FeedItem {
    type Error = String;

    fn try_from(wire: WireFeedItem) -> std::result::Result<Self, Self::Error> {
        let channel_id = wire
            .channel_id
            .or_else(|| wire.channel.as_ref().map(|c| c.id))
            .ok_or_else(|| format!("item {} has no channel id", wire.message_id))?;

        Ok(FeedItem {
            channel_id,
            message_id: wire.message_id,
            timestamp: wire.date,
            text: wire.text,
            channel: wire.channel,
            media: wire.media.unwrap_or_default(),
            reactions: wire.reactions.unwrap_or_default(),
            views: wire.views,
        })
    }
}

/// Page-level status reported with each history page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    /// History is available normally
    #[default]
    Ok,
    /// History is exhausted for now; the service is still populating it
    Backfilling,
}

/// One page of history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Items on this page, newest first
    #[serde(alias = "posts")]
    pub items: Vec<FeedItem>,

    /// Page-level status
    #[serde(default)]
    pub status: HistoryStatus,
}

impl HistoryPage {
    /// Create a page
    pub fn new(items: Vec<FeedItem>, status: HistoryStatus) -> Self {
        Self { items, status }
    }
}

/// History page cursor (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageCursor(u32);

impl PageCursor {
    /// The first page
    pub const FIRST: PageCursor = PageCursor(1);

    /// Create a cursor; returns `None` for page 0
    pub fn new(page: u32) -> Option<Self> {
        (page >= 1).then_some(PageCursor(page))
    }

    /// Page number
    pub fn get(&self) -> u32 {
        self.0
    }

    /// The following page
    pub fn next(self) -> Self {
        PageCursor(self.0.saturating_add(1))
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-session credential
///
/// The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a credential string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw credential value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the credential is empty
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self, scheme: Option<&str>) -> String {
        match scheme {
            Some(scheme) if !scheme.is_empty() => format!("{} {}", scheme, self.0),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}
