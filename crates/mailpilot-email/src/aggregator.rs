use crate::{ApiError, MailApi};
use mailpilot_ai::categorize;
use mailpilot_core::{ConnectionStatus, EnrichedMessage, ErrorClass};
use mailpilot_security::MailCredentialStore;
use mailpilot_storage::{CachedList, ListCache};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

pub const DEFAULT_FETCH_LIMIT: usize = 10;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPhase {
    Idle,
    Loading,
    Partial,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    Success,
    Error { class: ErrorClass, message: String },
}

#[derive(Debug, Clone)]
pub struct ListState {
    pub generation: u64,
    pub phase: ListPhase,
    /// In completion order.
    pub messages: Vec<EnrichedMessage>,
    pub outcome: Option<ListOutcome>,
    pub status: Option<ConnectionStatus>,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: ListPhase::Idle,
            messages: Vec::new(),
            outcome: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ListEvent {
    Loading {
        generation: u64,
    },
    Appended {
        generation: u64,
        message: EnrichedMessage,
    },
    Settled {
        generation: u64,
        outcome: ListOutcome,
        status: Option<ConnectionStatus>,
    },
}

/// Builds the enriched inbox list from the message list and per-message details.
///
/// Every `refresh` starts a new generation. Results of an older generation are
/// dropped, and its outstanding detail fetches are aborted.
#[derive(Clone)]
pub struct MessageAggregator {
    api: Arc<dyn MailApi>,
    credentials: MailCredentialStore,
    cache: Option<ListCache>,
    fetch_limit: usize,
    generation: Arc<watch::Sender<u64>>,
    state: Arc<Mutex<ListState>>,
    events: broadcast::Sender<ListEvent>,
}

impl MessageAggregator {
    pub fn new(api: Arc<dyn MailApi>, credentials: MailCredentialStore) -> Self {
        let (generation, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            credentials,
            cache: None,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            generation: Arc::new(generation),
            state: Arc::new(Mutex::new(ListState::default())),
            events,
        }
    }

    /// Number of messages whose detail is fetched per cycle.
    pub fn with_fetch_limit(mut self, fetch_limit: usize) -> Self {
        self.fetch_limit = fetch_limit.max(1);
        self
    }

    pub fn with_cache(mut self, cache: ListCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ListState {
        self.lock_state().clone()
    }

    /// Last list that settled successfully, if caching is enabled.
    pub fn cached(&self) -> Option<CachedList> {
        let cache = self.cache.as_ref()?;
        match cache.load() {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("failed to read list cache: {err}");
                None
            }
        }
    }

    /// Runs one fetch cycle. `None` means a newer cycle superseded this one.
    pub async fn refresh(&self) -> Option<ListOutcome> {
        let generation = self.begin_cycle();
        let mut superseded = self.generation.subscribe();

        if let Err(err) = self.credentials.access_token() {
            tracing::info!(generation, "no usable mail credential: {err}");
            return self.settle(
                generation,
                ListOutcome::Error {
                    class: err.class(),
                    message: err.to_string(),
                },
                Some(ConnectionStatus::Disconnected),
            );
        }

        let listed = tokio::select! {
            listed = self.api.list_messages() => listed,
            _ = superseded.changed() => return None,
        };

        let summaries = match listed {
            Ok(list) => list.messages,
            Err(err) => return self.settle_failed_list(generation, err),
        };

        let split = summaries.len().min(self.fetch_limit);
        let (detailed, remaining) = summaries.split_at(split);

        let mut tasks = JoinSet::new();
        for summary in detailed.iter().cloned() {
            let api = Arc::clone(&self.api);
            tasks.spawn(async move {
                let detail = api.message_detail(&summary.id).await;
                (summary, detail)
            });
        }

        let mut published = HashSet::new();
        loop {
            let joined = tokio::select! {
                joined = tasks.join_next() => joined,
                _ = superseded.changed() => {
                    tasks.abort_all();
                    tracing::debug!(generation, "fetch cycle superseded");
                    return None;
                }
            };
            let Some(joined) = joined else {
                break;
            };

            let entry = match joined {
                Ok((summary, Ok(detail))) => {
                    let labeling = categorize(&detail);
                    EnrichedMessage::from_detail(&summary, detail, labeling)
                }
                Ok((summary, Err(err))) => {
                    tracing::warn!(message_id = %summary.id, "detail fetch failed: {err}");
                    EnrichedMessage::placeholder(&summary)
                }
                Err(err) => {
                    tracing::warn!(generation, "detail task ended abnormally: {err}");
                    continue;
                }
            };

            published.insert(entry.id.clone());
            if !self.append(generation, entry) {
                tasks.abort_all();
                return None;
            }
        }

        let leftovers = detailed
            .iter()
            .filter(|summary| !published.contains(&summary.id))
            .chain(remaining);
        for summary in leftovers {
            if !self.append(generation, EnrichedMessage::placeholder(summary)) {
                return None;
            }
        }

        self.settle(
            generation,
            ListOutcome::Success,
            Some(ConnectionStatus::Connected),
        )
    }

    fn lock_state(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_cycle(&self) -> u64 {
        let mut state = self.lock_state();
        let generation = state.generation + 1;
        *state = ListState {
            generation,
            phase: ListPhase::Loading,
            messages: Vec::new(),
            outcome: None,
            status: state.status.clone(),
        };
        self.generation.send_replace(generation);
        let _ = self.events.send(ListEvent::Loading { generation });
        tracing::debug!(generation, "fetch cycle started");
        generation
    }

    /// Applies `update` only while `generation` is still current.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut ListState) -> ListEvent) -> bool {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "discarding stale list result"
            );
            return false;
        }
        let event = update(&mut state);
        let _ = self.events.send(event);
        true
    }

    fn append(&self, generation: u64, message: EnrichedMessage) -> bool {
        self.publish(generation, |state| {
            state.phase = ListPhase::Partial;
            state.messages.push(message.clone());
            ListEvent::Appended {
                generation,
                message,
            }
        })
    }

    fn settle(
        &self,
        generation: u64,
        outcome: ListOutcome,
        status: Option<ConnectionStatus>,
    ) -> Option<ListOutcome> {
        let keep = self.cache.is_some() && outcome == ListOutcome::Success;
        let mut settled_list = None;
        let published = self.publish(generation, |state| {
            if keep {
                settled_list = Some(state.messages.clone());
            }
            state.phase = ListPhase::Settled;
            state.outcome = Some(outcome.clone());
            if status.is_some() {
                state.status = status;
            }
            ListEvent::Settled {
                generation,
                outcome: outcome.clone(),
                status: state.status.clone(),
            }
        });
        if !published {
            return None;
        }
        if let Some(messages) = settled_list {
            self.save_to_cache(&messages);
        }
        Some(outcome)
    }

    fn settle_failed_list(&self, generation: u64, err: ApiError) -> Option<ListOutcome> {
        let (message, status) = match &err {
            ApiError::Unauthorized(message) => {
                // The credential is dead whichever cycle observed it.
                if let Err(clear_err) = self.credentials.clear() {
                    tracing::warn!("failed to clear rejected mail credential: {clear_err}");
                }
                tracing::warn!(generation, "mail credential rejected by backend");
                (message.clone(), Some(ConnectionStatus::Disconnected))
            }
            ApiError::Security(inner) => (inner.to_string(), Some(ConnectionStatus::Disconnected)),
            ApiError::Server(message) => (message.clone(), None),
            ApiError::Network(_) => ("Network error. Please try again.".to_string(), None),
            _ => ("Failed to fetch messages".to_string(), None),
        };
        if status.is_none() {
            tracing::warn!(generation, "message list failed: {err}");
        }

        let outcome = ListOutcome::Error {
            class: err.class(),
            message,
        };
        self.settle(generation, outcome, status)
    }

    /// `messages` must be the list captured when its cycle settled.
    fn save_to_cache(&self, messages: &[EnrichedMessage]) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(err) = cache.save(messages) {
            tracing::warn!("failed to cache message list: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailpilot_core::{
        Category, CredentialUpdate, DraftMail, MailProfile, MessageDetail, MessageList,
        MessageSummary, OutgoingMail,
    };
    use mailpilot_storage::MemoryStore;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    enum ListReply {
        Ids(Vec<String>),
        Status(u16),
        Offline,
    }

    fn ids(prefix: &str, count: usize) -> ListReply {
        ListReply::Ids((0..count).map(|n| format!("{prefix}{n}")).collect())
    }

    #[derive(Default)]
    struct FakeApi {
        lists: Mutex<VecDeque<ListReply>>,
        failing: HashSet<String>,
        stalled: HashSet<String>,
        detail_started: Notify,
        list_calls: AtomicUsize,
    }

    impl FakeApi {
        fn new(lists: Vec<ListReply>) -> Self {
            Self {
                lists: Mutex::new(lists.into()),
                ..Self::default()
            }
        }

        fn failing(mut self, id: &str) -> Self {
            self.failing.insert(id.to_string());
            self
        }

        fn stalled(mut self, id: &str) -> Self {
            self.stalled.insert(id.to_string());
            self
        }
    }

    #[async_trait]
    impl MailApi for FakeApi {
        async fn profile(&self) -> Result<MailProfile, ApiError> {
            Err(ApiError::Validation("unused".to_string()))
        }

        async fn list_messages(&self) -> Result<MessageList, ApiError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.lists.lock().unwrap().pop_front();
            match reply {
                Some(ListReply::Ids(ids)) => Ok(MessageList {
                    messages: ids
                        .into_iter()
                        .map(|id| MessageSummary {
                            thread_id: format!("t-{id}"),
                            id,
                        })
                        .collect(),
                }),
                Some(ListReply::Status(401)) => {
                    Err(ApiError::Unauthorized("Session expired.".to_string()))
                }
                Some(ListReply::Status(500)) => Err(ApiError::Server(
                    "Server error. Please try again later.".to_string(),
                )),
                Some(ListReply::Status(status)) => Err(ApiError::Rejected {
                    status,
                    detail: "nope".to_string(),
                }),
                Some(ListReply::Offline) | None => {
                    Err(ApiError::Network("connection refused".to_string()))
                }
            }
        }

        async fn message_detail(&self, message_id: &str) -> Result<MessageDetail, ApiError> {
            if self.stalled.contains(message_id) {
                self.detail_started.notify_one();
                std::future::pending::<()>().await;
            }
            if self.failing.contains(message_id) {
                return Err(ApiError::Server("boom".to_string()));
            }
            Ok(MessageDetail {
                id: message_id.to_string(),
                thread_id: format!("t-{message_id}"),
                subject: format!("Subject {message_id}"),
                from: "Sam Carter <sam@example.com>".to_string(),
                to: "me@gmail.com".to_string(),
                date: String::new(),
                snippet: String::new(),
                body: String::new(),
            })
        }

        async fn send(&self, _: &OutgoingMail) -> Result<(), ApiError> {
            Ok(())
        }

        async fn save_draft(&self, _: &DraftMail) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn connected_credentials() -> MailCredentialStore {
        let credentials = MailCredentialStore::new(MemoryStore::shared());
        credentials
            .store_credential(&CredentialUpdate {
                access_token: Some("ya29.valid".to_string()),
                ..CredentialUpdate::default()
            })
            .unwrap();
        credentials
    }

    #[tokio::test]
    async fn unauthorized_list_clears_credential_and_disconnects() {
        let credentials = connected_credentials();
        let api = Arc::new(FakeApi::new(vec![ListReply::Status(401)]));
        let aggregator = MessageAggregator::new(api, credentials.clone());

        let outcome = aggregator.refresh().await.expect("current cycle");
        assert!(matches!(
            outcome,
            ListOutcome::Error {
                class: ErrorClass::Unauthorized,
                ..
            }
        ));
        let state = aggregator.snapshot();
        assert_eq!(state.status, Some(ConnectionStatus::Disconnected));
        assert_eq!(state.phase, ListPhase::Settled);
        assert!(state.messages.is_empty());
        assert_eq!(credentials.get_credential().unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_keeps_credential() {
        let credentials = connected_credentials();
        let api = Arc::new(FakeApi::new(vec![ListReply::Status(500)]));
        let aggregator = MessageAggregator::new(api, credentials.clone());

        let outcome = aggregator.refresh().await.expect("current cycle");
        assert_eq!(
            outcome,
            ListOutcome::Error {
                class: ErrorClass::Transient,
                message: "Server error. Please try again later.".to_string(),
            }
        );
        assert!(credentials.is_valid());
        assert_eq!(aggregator.snapshot().status, None);
    }

    #[tokio::test]
    async fn network_failure_is_transient() {
        let credentials = connected_credentials();
        let api = Arc::new(FakeApi::new(vec![ListReply::Offline]));
        let aggregator = MessageAggregator::new(api, credentials.clone());

        let outcome = aggregator.refresh().await.expect("current cycle");
        assert!(matches!(
            outcome,
            ListOutcome::Error {
                class: ErrorClass::Transient,
                ..
            }
        ));
        assert!(credentials.is_valid());
    }

    #[tokio::test]
    async fn one_failed_detail_does_not_abort_the_batch() {
        let api = Arc::new(FakeApi::new(vec![ids("m", 10)]).failing("m3"));
        let aggregator = MessageAggregator::new(api, connected_credentials());
        let mut events = aggregator.subscribe();

        assert_eq!(aggregator.refresh().await, Some(ListOutcome::Success));

        let state = aggregator.snapshot();
        assert_eq!(state.messages.len(), 10);
        assert_eq!(
            state.messages.iter().filter(|m| m.details.is_some()).count(),
            9
        );
        let failed = state
            .messages
            .iter()
            .find(|m| m.id == "m3")
            .expect("placeholder");
        assert_eq!(failed.friendly_name, "Email m3...");
        assert_eq!(failed.category, Category::Unknown);
        assert_eq!(state.status, Some(ConnectionStatus::Connected));

        let mut appended = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ListEvent::Appended { .. }) {
                appended += 1;
            }
        }
        assert_eq!(appended, 10);
    }

    #[tokio::test]
    async fn ids_beyond_limit_become_trailing_placeholders() {
        let api = Arc::new(FakeApi::new(vec![ids("m", 12)]));
        let aggregator = MessageAggregator::new(api, connected_credentials()).with_fetch_limit(10);

        aggregator.refresh().await;

        let state = aggregator.snapshot();
        assert_eq!(state.messages.len(), 12);
        let tail: Vec<_> = state.messages[10..].iter().map(|m| m.id.as_str()).collect();
        assert_eq!(tail, ["m10", "m11"]);
        assert!(state.messages[10..].iter().all(|m| m.details.is_none()));
    }

    #[tokio::test]
    async fn missing_credential_settles_without_network() {
        let api = Arc::new(FakeApi::new(vec![ids("m", 3)]));
        let credentials = MailCredentialStore::new(MemoryStore::shared());
        let aggregator = MessageAggregator::new(api.clone(), credentials);

        let outcome = aggregator.refresh().await.expect("current cycle");
        assert!(matches!(
            outcome,
            ListOutcome::Error {
                class: ErrorClass::Unauthenticated,
                ..
            }
        ));
        assert_eq!(
            aggregator.snapshot().status,
            Some(ConnectionStatus::Disconnected)
        );
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn superseded_cycle_never_publishes() {
        let api = Arc::new(
            FakeApi::new(vec![ListReply::Ids(vec!["slow".to_string()]), ids("fast", 2)])
                .stalled("slow"),
        );
        let aggregator = MessageAggregator::new(api.clone(), connected_credentials());

        let first = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move { aggregator.refresh().await })
        };
        api.detail_started.notified().await;

        assert_eq!(aggregator.refresh().await, Some(ListOutcome::Success));
        assert_eq!(first.await.unwrap(), None);

        let state = aggregator.snapshot();
        assert_eq!(state.generation, 2);
        assert_eq!(state.messages.len(), 2);
        assert!(state.messages.iter().all(|m| m.id.starts_with("fast")));
    }

    #[tokio::test]
    async fn successful_cycle_is_cached() {
        let store = MemoryStore::shared();
        let api = Arc::new(FakeApi::new(vec![ids("m", 2)]));
        let aggregator = MessageAggregator::new(api, connected_credentials())
            .with_cache(ListCache::new(store));

        assert!(aggregator.cached().is_none());
        aggregator.refresh().await;
        let cached = aggregator.cached().expect("cached list");
        assert_eq!(cached.messages.len(), 2);
        assert!(cached
            .messages
            .iter()
            .all(|m| m.friendly_name.starts_with("Subject m")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cache_keeps_the_list_that_settled() {
        for _ in 0..20 {
            let api = Arc::new(
                FakeApi::new(vec![ids("m", 3), ListReply::Ids(vec!["slow".to_string()])])
                    .stalled("slow"),
            );
            let aggregator = MessageAggregator::new(api, connected_credentials())
                .with_cache(ListCache::new(MemoryStore::shared()));

            let cycles: Vec<_> = (0..2)
                .map(|_| {
                    let aggregator = aggregator.clone();
                    tokio::spawn(async move { aggregator.refresh().await })
                })
                .collect();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            for cycle in cycles {
                cycle.abort();
            }

            if let Some(cached) = aggregator.cached() {
                assert_eq!(cached.messages.len(), 3);
                assert!(cached.messages.iter().all(|m| m.details.is_some()));
            }
        }
    }

    #[tokio::test]
    async fn unauthorized_list_wins_over_in_flight_details() {
        let credentials = connected_credentials();
        let api = Arc::new(
            FakeApi::new(vec![
                ListReply::Ids(vec!["slow".to_string(), "m1".to_string()]),
                ListReply::Status(401),
            ])
            .stalled("slow"),
        );
        let aggregator = MessageAggregator::new(api.clone(), credentials.clone());

        let first = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move { aggregator.refresh().await })
        };
        api.detail_started.notified().await;

        let second = aggregator.refresh().await.expect("current cycle");
        assert!(matches!(
            second,
            ListOutcome::Error {
                class: ErrorClass::Unauthorized,
                ..
            }
        ));
        assert_eq!(first.await.unwrap(), None);

        let state = aggregator.snapshot();
        assert_eq!(state.generation, 2);
        assert_eq!(state.status, Some(ConnectionStatus::Disconnected));
        assert!(state.messages.is_empty());
        assert_eq!(credentials.get_credential().unwrap(), None);
    }

    #[tokio::test]
    async fn empty_inbox_settles_successfully() {
        let api = Arc::new(FakeApi::new(vec![ListReply::Ids(Vec::new())]));
        let aggregator = MessageAggregator::new(api, connected_credentials());

        assert_eq!(aggregator.refresh().await, Some(ListOutcome::Success));
        assert!(aggregator.snapshot().messages.is_empty());
    }
}
