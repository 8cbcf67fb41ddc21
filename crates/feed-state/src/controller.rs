//! Feed state controller
//!
//! [`FeedController`] owns the feed phase, the canonical [`ItemSet`] and the
//! live connection for one session. History fetches run in the caller's task
//! and are serialized: a request made while another fetch is outstanding is
//! rejected, whatever the phase. Live items are merged by a background task
//! for as long as the push connection stays open.
//!
//! State is observed through [`FeedController::snapshot`] or the watch
//! channel returned by [`FeedController::subscribe`]; discrete transitions are
//! broadcast as [`FeedEvent`]s.

use feed_client::{
    ApiClient, CancelHandle, CancelSignal, Credential, FeedItem, HistoryPage, HistorySource,
    HistoryStatus, HttpHistorySource, HttpSubscriptionSource, ItemKey, LiveEvent, LiveSubscriber,
    PageCursor, PushConnector, SubscriptionSource, WebSocketConnector,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, oneshot, watch};

use crate::config::FeedConfig;
use crate::merge::ItemSet;
use crate::phase::{FeedPhase, FeedPresentation, LiveStatus};
use crate::session::SessionContext;
use crate::Result;

/// Buffered events per subscriber before old ones are dropped
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Public Types
// =============================================================================

/// Point-in-time view of the feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// Current phase
    pub phase: FeedPhase,
    /// Items in display order, newest first
    pub items: Vec<FeedItem>,
    /// Message of the last failure, set while in [`FeedPhase::Error`]
    pub error: Option<String>,
    /// A live item was inserted since the last acknowledgement
    pub new_item_arrived: bool,
    /// Page the next history fetch will request
    pub cursor: PageCursor,
    /// Whether requesting more history can return anything
    pub has_more: bool,
    /// Live connection state
    pub live: LiveStatus,
    /// Number of subscribed channels, once known
    pub channel_count: Option<usize>,
}

impl FeedSnapshot {
    fn initial() -> Self {
        Self {
            phase: FeedPhase::InitialLoading,
            items: Vec::new(),
            error: None,
            new_item_arrived: false,
            cursor: PageCursor::FIRST,
            has_more: true,
            live: LiveStatus::Disconnected,
            channel_count: None,
        }
    }

    /// What the presentation layer should render for this snapshot
    pub fn presentation(&self) -> FeedPresentation {
        FeedPresentation::derive(self.phase, self.error.as_deref(), self.channel_count)
    }
}

/// Discrete feed transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The phase changed
    PhaseChanged {
        /// Previous phase
        from: FeedPhase,
        /// New phase
        to: FeedPhase,
    },
    /// A live item not seen before was prepended
    NewItem(ItemKey),
    /// The live connection failed and will not be reopened automatically
    LiveConnectionLost(String),
}

/// Why a request was not acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another history fetch is outstanding
    FetchInFlight,
    /// The request is not valid in this phase
    NotReady(FeedPhase),
    /// The last page was empty; only a refresh can fetch again
    EndOfHistory,
    /// The controller was shut down
    ShutDown,
}

/// Result of a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request ran and left the feed in this phase
    Applied(FeedPhase),
    /// The request was ignored
    Rejected(RejectReason),
    /// The fetch was cancelled by shutdown and its result discarded
    Abandoned,
}

impl RequestOutcome {
    /// Check if the request ran to completion
    pub fn is_applied(&self) -> bool {
        matches!(self, RequestOutcome::Applied(_))
    }
}

// =============================================================================
// Internal State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Initial,
    More,
}

struct FetchTicket {
    kind: FetchKind,
    cursor: PageCursor,
    credential: Credential,
    signal: CancelSignal,
}

struct ControllerState {
    phase: FeedPhase,
    items: ItemSet,
    cursor: PageCursor,
    error: Option<String>,
    history_exhausted: bool,
    new_item_arrived: bool,
    live: LiveStatus,
    channel_count: Option<usize>,
    in_flight: Option<CancelHandle>,
    live_task: Option<LiveTask>,
    shut_down: bool,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            phase: FeedPhase::InitialLoading,
            items: ItemSet::new(),
            cursor: PageCursor::FIRST,
            error: None,
            history_exhausted: false,
            new_item_arrived: false,
            live: LiveStatus::Disconnected,
            channel_count: None,
            in_flight: None,
            live_task: None,
            shut_down: false,
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            phase: self.phase,
            items: self.items.to_vec(),
            error: self.error.clone(),
            new_item_arrived: self.new_item_arrived,
            cursor: self.cursor,
            has_more: !self.history_exhausted && self.phase != FeedPhase::Backfilling,
            live: self.live.clone(),
            channel_count: self.channel_count,
        }
    }
}

/// Background task consuming the live feed
///
/// When dropped, the task is stopped.
struct LiveTask {
    stop_tx: Option<oneshot::Sender<()>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl LiveTask {
    fn spawn(controller: Weak<Inner>, subscriber: LiveSubscriber, credential: Credential) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let connected = tokio::select! {
                result = subscriber.subscribe(&credential) => result,
                _ = &mut stop_rx => return,
            };

            let mut feed = match connected {
                Ok(feed) => feed,
                Err(e) => {
                    if let Some(inner) = controller.upgrade() {
                        inner.on_live_event(LiveEvent::ConnectionLost(e.to_string()));
                    }
                    return;
                }
            };

            match controller.upgrade() {
                Some(inner) if inner.on_live_connected() => {}
                _ => return,
            }

            loop {
                let event = tokio::select! {
                    event = feed.next_event() => event,
                    _ = &mut stop_rx => break,
                };

                let Some(inner) = controller.upgrade() else {
                    break;
                };
                if !inner.on_live_event(event) {
                    break;
                }
            }

            tracing::debug!(decode_failures = feed.decode_failures(), "live task finished");
        });

        Self { stop_tx: Some(stop_tx), _handle: handle }
    }

    fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for LiveTask {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Releases the in-flight slot if the fetch future is dropped mid-request
struct InFlightGuard<'a> {
    inner: &'a Inner,
    kind: FetchKind,
    completed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.inner.abandon_fetch(self.kind);
        }
    }
}

struct Inner {
    session: SessionContext,
    history: Arc<dyn HistorySource>,
    live: LiveSubscriber,
    subscriptions: Option<Arc<dyn SubscriptionSource>>,
    state: Mutex<ControllerState>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
    event_tx: broadcast::Sender<FeedEvent>,
}

impl Inner {
    fn publish(&self, state: &ControllerState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    fn set_phase(&self, state: &mut ControllerState, to: FeedPhase) {
        let from = state.phase;
        if from == to {
            return;
        }

        state.phase = to;
        tracing::info!(%from, %to, "feed phase changed");
        let _ = self.event_tx.send(FeedEvent::PhaseChanged { from, to });
    }

    fn fail(&self, state: &mut ControllerState, error: &feed_client::Error) {
        state.error = Some(error.to_string());
        self.set_phase(state, FeedPhase::Error);
    }

    fn begin_fetch(&self, kind: FetchKind) -> std::result::Result<FetchTicket, RequestOutcome> {
        let mut state = self.state.lock();

        if state.shut_down {
            return Err(RequestOutcome::Rejected(RejectReason::ShutDown));
        }
        if state.in_flight.is_some() {
            return Err(RequestOutcome::Rejected(RejectReason::FetchInFlight));
        }

        match kind {
            FetchKind::More => {
                if state.phase != FeedPhase::Ready {
                    return Err(RequestOutcome::Rejected(RejectReason::NotReady(state.phase)));
                }
                if state.history_exhausted {
                    return Err(RequestOutcome::Rejected(RejectReason::EndOfHistory));
                }
            }
            FetchKind::Initial => {
                state.items.clear();
                state.cursor = PageCursor::FIRST;
                state.error = None;
                state.history_exhausted = false;
                state.new_item_arrived = false;
                self.set_phase(&mut state, FeedPhase::InitialLoading);
            }
        }

        let Some(credential) = self.session.credential() else {
            tracing::warn!("no session identity, history not fetched");
            self.fail(&mut state, &feed_client::Error::Unauthenticated);
            self.publish(&state);
            return Err(RequestOutcome::Applied(FeedPhase::Error));
        };

        if kind == FetchKind::More {
            self.set_phase(&mut state, FeedPhase::LoadingMore);
        }

        let handle = CancelHandle::new();
        let signal = handle.signal();
        state.in_flight = Some(handle);
        self.publish(&state);

        Ok(FetchTicket { kind, cursor: state.cursor, credential, signal })
    }

    /// Release a fetch whose request future was dropped before completing
    ///
    /// A dropped page load returns to `Ready`; a dropped initial load has
    /// already cleared the items and ends in `Error` so a refresh can retry.
    fn abandon_fetch(&self, kind: FetchKind) {
        let mut state = self.state.lock();
        let Some(fetch) = state.in_flight.take() else {
            return;
        };
        fetch.cancel();

        if state.shut_down {
            return;
        }

        tracing::debug!(?kind, "history fetch dropped before completion");
        match kind {
            FetchKind::More => self.set_phase(&mut state, FeedPhase::Ready),
            FetchKind::Initial => self.fail(&mut state, &feed_client::Error::Cancelled),
        }
        self.publish(&state);
    }

    fn finish_fetch(
        self: &Arc<Self>,
        ticket: FetchTicket,
        result: feed_client::Result<HistoryPage>,
    ) -> RequestOutcome {
        let mut state = self.state.lock();
        state.in_flight = None;

        if ticket.signal.is_cancelled() || state.shut_down {
            tracing::debug!(page = %ticket.cursor, "discarding cancelled history fetch");
            return RequestOutcome::Abandoned;
        }

        match result {
            Ok(page) => self.apply_page(&mut state, ticket.kind, page),
            Err(e) => {
                tracing::warn!(
                    page = %ticket.cursor,
                    error = %e,
                    retryable = e.is_retryable(),
                    "history fetch failed"
                );
                self.fail(&mut state, &e);
            }
        }

        if ticket.kind == FetchKind::Initial && state.phase.is_post_initial() {
            self.ensure_live(&mut state, ticket.credential);
        }

        self.publish(&state);
        RequestOutcome::Applied(state.phase)
    }

    fn apply_page(&self, state: &mut ControllerState, kind: FetchKind, page: HistoryPage) {
        let is_refresh = kind == FetchKind::Initial;
        let received = page.items.len();
        let merged = state.items.merge_history_batch(page.items, is_refresh);

        if received > 0 {
            state.cursor = state.cursor.next();
        }

        let next = match page.status {
            HistoryStatus::Backfilling => FeedPhase::Backfilling,
            HistoryStatus::Ok if received > 0 => FeedPhase::Ready,
            HistoryStatus::Ok => {
                state.history_exhausted = true;
                if is_refresh {
                    FeedPhase::Empty
                } else {
                    FeedPhase::Ready
                }
            }
        };

        tracing::debug!(received, merged, next_page = %state.cursor, "merged history page");
        self.set_phase(state, next);
    }

    fn ensure_live(self: &Arc<Self>, state: &mut ControllerState, credential: Credential) {
        if state.live.is_active() {
            return;
        }

        state.live = LiveStatus::Connecting;
        state.live_task =
            Some(LiveTask::spawn(Arc::downgrade(self), self.live.clone(), credential));
    }

    /// Returns false when the task should stop
    fn on_live_connected(&self) -> bool {
        let mut state = self.state.lock();
        if state.shut_down {
            return false;
        }

        tracing::info!("live connection open");
        state.live = LiveStatus::Connected;
        self.publish(&state);
        true
    }

    /// Returns false when the task should stop
    fn on_live_event(&self, event: LiveEvent) -> bool {
        let mut state = self.state.lock();
        if state.shut_down {
            return false;
        }

        let keep_going = match event {
            LiveEvent::Item(item) => {
                self.merge_live(&mut state, item);
                true
            }
            LiveEvent::ConnectionLost(reason) => {
                tracing::warn!(%reason, "live connection lost");
                state.live = LiveStatus::Lost(reason.clone());
                let _ = self.event_tx.send(FeedEvent::LiveConnectionLost(reason));
                false
            }
            LiveEvent::Closed => {
                tracing::info!("live connection closed");
                state.live = LiveStatus::Closed;
                false
            }
        };

        self.publish(&state);
        keep_going
    }

    fn merge_live(&self, state: &mut ControllerState, item: FeedItem) {
        let key = item.key();

        if !state.phase.is_post_initial() {
            tracing::debug!(%key, phase = %state.phase, "dropping live item");
            return;
        }

        if state.items.merge_live_item(item).is_new() {
            state.new_item_arrived = true;
            let _ = self.event_tx.send(FeedEvent::NewItem(key));
        }

        if matches!(state.phase, FeedPhase::Empty | FeedPhase::Backfilling) {
            self.set_phase(state, FeedPhase::Ready);
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Feed state controller for one session
///
/// Cheap to clone; clones share the same state. The live task holds only a
/// weak reference, so dropping every clone also stops it.
#[derive(Clone)]
pub struct FeedController {
    inner: Arc<Inner>,
}

impl FeedController {
    /// Create a controller over its collaborators
    ///
    /// Without a subscriptions source the channel count stays unknown.
    pub fn new(
        session: SessionContext,
        history: Arc<dyn HistorySource>,
        connector: Arc<dyn PushConnector>,
        subscriptions: Option<Arc<dyn SubscriptionSource>>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(FeedSnapshot::initial());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                session,
                history,
                live: LiveSubscriber::new(connector),
                subscriptions,
                state: Mutex::new(ControllerState::new()),
                snapshot_tx,
                event_tx,
            }),
        }
    }

    /// Create a controller talking to the feed service described by `config`
    pub fn from_config(session: SessionContext, config: &FeedConfig) -> Result<Self> {
        let client = Arc::new(ApiClient::new(config.client.clone())?);
        let history = HttpHistorySource::with_path(Arc::clone(&client), config.history_path.clone());
        let subscriptions: Arc<dyn SubscriptionSource> =
            Arc::new(HttpSubscriptionSource::with_path(client, config.subscriptions_path.clone()));
        let connector = WebSocketConnector::new(config.live_url(), config.client.clone());

        Ok(Self::new(session, Arc::new(history), Arc::new(connector), Some(subscriptions)))
    }

    /// Run the initial load
    ///
    /// Opens the live connection when the load leaves the feed in a
    /// post-initial phase.
    pub async fn start(&self) -> RequestOutcome {
        tracing::info!("starting feed");
        self.fetch(FetchKind::Initial).await
    }

    /// Load the next history page
    ///
    /// Only acted on in [`FeedPhase::Ready`].
    pub async fn request_more(&self) -> RequestOutcome {
        self.fetch(FetchKind::More).await
    }

    /// Reload the feed from the first page
    ///
    /// Clears the item set and resets the cursor. Reopens the live
    /// connection if none is active.
    pub async fn request_refresh(&self) -> RequestOutcome {
        tracing::info!("refreshing feed");
        self.fetch(FetchKind::Initial).await
    }

    async fn fetch(&self, kind: FetchKind) -> RequestOutcome {
        let ticket = match self.inner.begin_fetch(kind) {
            Ok(ticket) => ticket,
            Err(outcome) => {
                tracing::debug!(?kind, ?outcome, "history fetch not started");
                return outcome;
            }
        };

        let mut guard = InFlightGuard { inner: &self.inner, kind, completed: false };
        let result = self
            .inner
            .history
            .fetch_page(ticket.cursor, &ticket.credential, ticket.signal.clone())
            .await;
        guard.completed = true;

        self.inner.finish_fetch(ticket, result)
    }

    /// Clear the new-item signal once it has been surfaced
    pub fn acknowledge_new_items(&self) {
        let mut state = self.inner.state.lock();
        if state.new_item_arrived {
            state.new_item_arrived = false;
            self.inner.publish(&state);
        }
    }

    /// Query the subscribed channels and record their count
    ///
    /// Returns `None` when no subscriptions source is configured.
    pub async fn refresh_channel_status(&self) -> Result<Option<usize>> {
        let Some(source) = self.inner.subscriptions.clone() else {
            return Ok(None);
        };

        let credential =
            self.inner.session.credential().ok_or(feed_client::Error::Unauthenticated)?;
        let channels = source.channels(&credential).await?;
        let count = channels.len();

        let mut state = self.inner.state.lock();
        state.channel_count = Some(count);
        self.inner.publish(&state);
        tracing::debug!(count, "channel status refreshed");

        Ok(Some(count))
    }

    /// Current state
    pub fn snapshot(&self) -> FeedSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Current phase
    pub fn phase(&self) -> FeedPhase {
        self.inner.state.lock().phase
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Receive discrete transitions
    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Cancel any in-flight fetch, close the live connection and reject
    /// further requests
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if state.shut_down {
            return;
        }

        state.shut_down = true;
        if let Some(fetch) = state.in_flight.take() {
            fetch.cancel();
        }
        if let Some(task) = state.live_task.take() {
            task.stop();
        }
        if state.live.is_active() {
            state.live = LiveStatus::Closed;
        }

        tracing::info!("feed controller shut down");
        self.inner.publish(&state);
    }

    /// Check if [`FeedController::shutdown`] was called
    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shut_down
    }
}

impl std::fmt::Debug for FeedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("FeedController")
            .field("phase", &state.phase)
            .field("items", &state.items.len())
            .field("cursor", &state.cursor)
            .field("live", &state.live)
            .field("shut_down", &state.shut_down)
            .finish()
    }
}
