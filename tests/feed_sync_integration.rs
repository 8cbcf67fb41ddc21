//! End-to-end feed synchronization tests
//!
//! History comes from a wiremock stand-in for the feed service through the
//! real HTTP client; live items come from a channel-backed push connector.
//! The gesture and scroll handlers drive the controller the way a host UI
//! would.

use async_trait::async_trait;
use feed_client::live::PushStream;
use feed_client::{
    ApiClient, ClientConfig, Credential, HttpHistorySource, HttpSubscriptionSource, ItemKey,
    PushConnector, SubscriptionSource,
};
use feed_state::{
    FeedController, FeedPhase, FeedPresentation, FeedSnapshot, RequestOutcome, SessionContext,
    StaticIdentity,
};
use feed_ui::{PullConfig, PullToRefresh, ScrollProximity};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Harness
// =============================================================================

type PushSender = mpsc::UnboundedSender<feed_client::Result<String>>;

#[derive(Default)]
struct ChannelConnector {
    streams: Mutex<Vec<mpsc::UnboundedReceiver<feed_client::Result<String>>>>,
    connects: AtomicUsize,
}

impl ChannelConnector {
    fn open(&self) -> PushSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push(rx);
        tx
    }
}

#[async_trait]
impl PushConnector for ChannelConnector {
    async fn connect(&self, _credential: &Credential) -> feed_client::Result<PushStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let rx = self.streams.lock().unwrap().pop().ok_or_else(|| {
            feed_client::Error::Transport("connection refused".to_string())
        })?;

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })))
    }
}

struct Harness {
    server: MockServer,
    connector: Arc<ChannelConnector>,
    controller: FeedController,
}

impl Harness {
    async fn new(identity: StaticIdentity) -> Self {
        let server = MockServer::start().await;
        let client = Arc::new(ApiClient::new(ClientConfig::new(server.uri())).unwrap());
        let history = Arc::new(HttpHistorySource::new(Arc::clone(&client)));
        let subscriptions: Arc<dyn SubscriptionSource> =
            Arc::new(HttpSubscriptionSource::new(client));
        let connector = Arc::new(ChannelConnector::default());

        let controller = FeedController::new(
            SessionContext::new(Arc::new(identity)),
            history,
            connector.clone(),
            Some(subscriptions),
        );

        Self { server, connector, controller }
    }

    async fn signed_in() -> Self {
        Self::new(StaticIdentity::new("query_id=abc&user=42")).await
    }

    async fn wait_for(&self, predicate: impl Fn(&FeedSnapshot) -> bool) -> FeedSnapshot {
        let mut rx = self.controller.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for feed state")
            .expect("controller dropped")
            .clone();
        snapshot
    }
}

fn post(channel_id: i64, message_id: i64) -> serde_json::Value {
    json!({
        "message_id": message_id,
        "text": format!("post {}", message_id),
        "date": format!("2024-03-01T{:02}:{:02}:00Z", message_id / 60, message_id % 60),
        "channel": {"id": channel_id, "title": "Channel", "username": "channel"},
        "media": [{"type": "photo", "url": "https://cdn.example.com/1.jpg"}],
        "reactions": [{"emoticon": "👍", "count": 3}],
        "views": 10
    })
}

fn posts(messages: std::ops::RangeInclusive<i64>) -> Vec<serde_json::Value> {
    messages.rev().map(|m| post(1, m)).collect()
}

async fn mount_page(server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/feed/"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scroll_live_and_pull_refresh() {
    let harness = Harness::signed_in().await;
    mount_page(&harness.server, 1, json!({"posts": posts(21..=40), "status": "ok"})).await;
    mount_page(&harness.server, 2, json!({"posts": posts(1..=20), "status": "ok"})).await;
    let push = harness.connector.open();
    let controller = &harness.controller;

    assert_eq!(controller.start().await, RequestOutcome::Applied(FeedPhase::Ready));
    harness.wait_for(|s| s.live.is_connected()).await;

    // Scrolling close to the end loads the next page
    let proximity = ScrollProximity::default();
    assert!(!proximity.on_scroll(100.0, 2000.0, controller));
    assert!(proximity.on_scroll(1850.0, 2000.0, controller));
    let snapshot = harness.wait_for(|s| s.items.len() == 40 && s.phase == FeedPhase::Ready).await;
    assert_eq!(snapshot.cursor.get(), 3);
    assert_eq!(snapshot.items[39].message_id, 1);

    // A live item lands on top
    push.send(Ok(post(9, 500).to_string())).unwrap();
    let snapshot = harness.wait_for(|s| s.new_item_arrived).await;
    assert_eq!(snapshot.items[0].key(), ItemKey::new(9, 500));
    assert_eq!(snapshot.items.len(), 41);
    controller.acknowledge_new_items();

    // Pull to refresh reloads the first page and drops everything else
    let mut gesture = PullToRefresh::new(PullConfig::default(), Arc::new(controller.clone()));
    assert!(gesture.pointer_down(1, 0.0, true));
    gesture.pointer_move(1, 150.0);
    assert!(gesture.pointer_up(1, Instant::now()));

    let snapshot = harness
        .wait_for(|s| s.phase == FeedPhase::Ready && s.items.len() == 20)
        .await;
    assert_eq!(snapshot.items[0].message_id, 40);
    assert_eq!(snapshot.cursor.get(), 2);
    assert!(!snapshot.new_item_arrived);
    assert_eq!(harness.connector.connects.load(Ordering::SeqCst), 1);

    controller.shutdown();
}

#[tokio::test]
async fn test_service_error_then_manual_refresh() {
    let harness = Harness::signed_in().await;
    Mock::given(method("GET"))
        .and(path("/api/feed/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid init data"})))
        .up_to_n_times(1)
        .mount(&harness.server)
        .await;
    mount_page(&harness.server, 1, json!({"items": posts(1..=3)})).await;
    let _push = harness.connector.open();
    let controller = &harness.controller;

    assert_eq!(controller.start().await, RequestOutcome::Applied(FeedPhase::Error));
    assert_eq!(
        controller.snapshot().presentation(),
        FeedPresentation::Error("Invalid init data".to_string())
    );
    assert_eq!(harness.connector.connects.load(Ordering::SeqCst), 0);

    assert_eq!(controller.request_refresh().await, RequestOutcome::Applied(FeedPhase::Ready));
    assert_eq!(controller.snapshot().items.len(), 3);
    harness.wait_for(|s| s.live.is_connected()).await;
}

#[tokio::test]
async fn test_backfilling_feed_with_subscriptions() {
    let harness = Harness::signed_in().await;
    mount_page(&harness.server, 1, json!({"posts": [], "status": "backfilling"})).await;
    Mock::given(method("GET"))
        .and(path("/api/subscriptions/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "channels": [{"id": 1, "title": "News", "username": "news"}]
        })))
        .mount(&harness.server)
        .await;
    let push = harness.connector.open();
    let controller = &harness.controller;

    assert_eq!(controller.start().await, RequestOutcome::Applied(FeedPhase::Backfilling));
    assert_eq!(controller.refresh_channel_status().await.unwrap(), Some(1));
    assert_eq!(controller.snapshot().presentation(), FeedPresentation::CatchingUp);

    // Items published while the service catches up arrive live
    push.send(Ok(post(1, 1).to_string())).unwrap();
    let snapshot = harness.wait_for(|s| s.phase == FeedPhase::Ready).await;
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.presentation(), FeedPresentation::Feed);
}

#[tokio::test]
async fn test_empty_feed_reports_channel_state() {
    let harness = Harness::signed_in().await;
    mount_page(&harness.server, 1, json!({"posts": [], "status": "ok"})).await;
    Mock::given(method("GET"))
        .and(path("/api/subscriptions/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"channels": []})))
        .mount(&harness.server)
        .await;
    let _push = harness.connector.open();
    let controller = &harness.controller;

    assert_eq!(controller.start().await, RequestOutcome::Applied(FeedPhase::Empty));
    controller.refresh_channel_status().await.unwrap();
    assert_eq!(controller.snapshot().presentation(), FeedPresentation::NoChannels);
}

#[tokio::test]
async fn test_missing_identity_makes_no_requests() {
    let harness = Harness::new(StaticIdentity::anonymous()).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(0)
        .mount(&harness.server)
        .await;

    assert_eq!(harness.controller.start().await, RequestOutcome::Applied(FeedPhase::Error));
    assert!(harness.controller.refresh_channel_status().await.is_err());
    assert_eq!(harness.connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_abandons_slow_request() {
    let harness = Harness::signed_in().await;
    Mock::given(method("GET"))
        .and(path("/api/feed/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": posts(1..=5)}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&harness.server)
        .await;

    let controller = harness.controller.clone();
    let start = tokio::spawn(async move { controller.start().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    harness.controller.shutdown();

    assert_eq!(start.await.unwrap(), RequestOutcome::Abandoned);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(harness.controller.snapshot().items.is_empty());
}
