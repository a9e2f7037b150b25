// Observable state store - single source of truth for client-visible state
//
// The store owns one AppState snapshot. Every mutation goes through a
// whole-field merge (StatePatch) and synchronously notifies subscribers in
// registration order with the post-merge snapshot, so listeners never see a
// partial update. Async operations (login, analyze, generate) bracket the
// API call with loading=true/error=None, fold the result into state, and
// return the failure to the caller as well - errors are never swallowed.
//
// Login carries a generation counter: a login superseded by a newer login()
// call neither folds its result nor overwrites the error field ("last call
// to start wins").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::models::{
    Credentials, DashboardStats, GeneratedMessage, Insight, InsightRequest, MessageRequest,
    Notification, NotificationKind, ProfileUpdate, Registration, RfmAnalysis, RfmAnalysisRequest,
    User,
};
use crate::storage::{KeyValueStorage, USER_KEY};

/// How long a notification stays up unless dismissed early
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(5000);

/// Snapshot of client-visible application state
///
/// Callers get clones from `get_state`; mutating a clone has no effect on
/// the store.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub user: Option<User>,
    /// True iff a non-empty token is stored
    pub is_authenticated: bool,
    pub current_page: String,
    pub loading: bool,
    pub error: Option<String>,
    /// Insertion order is display order
    pub notifications: Vec<Notification>,
    /// Newest last, project-wide
    pub messages: Vec<GeneratedMessage>,
    /// Newest last, project-wide
    pub insights: Vec<Insight>,
    pub dashboard_stats: Option<DashboardStats>,
    /// Last analysis result only, replaced wholesale
    pub rfm_analysis: Option<RfmAnalysis>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            current_page: "dashboard".to_string(),
            loading: false,
            error: None,
            notifications: Vec::new(),
            messages: Vec::new(),
            insights: Vec::new(),
            dashboard_stats: None,
            rfm_analysis: None,
        }
    }
}

/// Partial state update: absent fields are left untouched, present fields
/// win wholesale (shallow merge, one level)
///
/// Clearable fields take the full Option so a patch can distinguish "set to
/// None" from "leave alone".
#[derive(Debug, Default)]
pub struct StatePatch {
    user: Option<Option<User>>,
    is_authenticated: Option<bool>,
    current_page: Option<String>,
    loading: Option<bool>,
    error: Option<Option<String>>,
    notifications: Option<Vec<Notification>>,
    messages: Option<Vec<GeneratedMessage>>,
    insights: Option<Vec<Insight>>,
    dashboard_stats: Option<Option<DashboardStats>>,
    rfm_analysis: Option<Option<RfmAnalysis>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: Option<User>) -> Self {
        self.user = Some(user);
        self
    }

    pub fn is_authenticated(mut self, value: bool) -> Self {
        self.is_authenticated = Some(value);
        self
    }

    pub fn current_page(mut self, page: impl Into<String>) -> Self {
        self.current_page = Some(page.into());
        self
    }

    pub fn loading(mut self, value: bool) -> Self {
        self.loading = Some(value);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn notifications(mut self, notifications: Vec<Notification>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn messages(mut self, messages: Vec<GeneratedMessage>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn insights(mut self, insights: Vec<Insight>) -> Self {
        self.insights = Some(insights);
        self
    }

    pub fn dashboard_stats(mut self, stats: Option<DashboardStats>) -> Self {
        self.dashboard_stats = Some(stats);
        self
    }

    pub fn rfm_analysis(mut self, analysis: Option<RfmAnalysis>) -> Self {
        self.rfm_analysis = Some(analysis);
        self
    }

    /// Last write wins per field
    fn apply(self, state: &mut AppState) {
        if let Some(user) = self.user {
            state.user = user;
        }
        if let Some(is_authenticated) = self.is_authenticated {
            state.is_authenticated = is_authenticated;
        }
        if let Some(current_page) = self.current_page {
            state.current_page = current_page;
        }
        if let Some(loading) = self.loading {
            state.loading = loading;
        }
        if let Some(error) = self.error {
            state.error = error;
        }
        if let Some(notifications) = self.notifications {
            state.notifications = notifications;
        }
        if let Some(messages) = self.messages {
            state.messages = messages;
        }
        if let Some(insights) = self.insights {
            state.insights = insights;
        }
        if let Some(dashboard_stats) = self.dashboard_stats {
            state.dashboard_stats = dashboard_stats;
        }
        if let Some(rfm_analysis) = self.rfm_analysis {
            state.rfm_analysis = rfm_analysis;
        }
    }
}

/// Handle returned by `subscribe`; pass back to `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&AppState) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Observable state store
///
/// Construct once at process start (see `AppContext`); hand out `Arc` clones
/// to whoever needs to read or mutate state.
pub struct StateStore {
    client: Arc<ApiClient>,
    storage: Arc<dyn KeyValueStorage>,
    state: Mutex<AppState>,
    subscribers: Mutex<Subscribers>,
    /// Monotonic login counter; a completion whose generation is stale lost
    /// the race to a newer call and must not touch state
    login_generation: AtomicU64,
    /// Handle to ourselves for deferred notification expiry tasks
    weak_self: Weak<StateStore>,
}

impl StateStore {
    /// Create the store, hydrating the session dimension from durable storage
    ///
    /// If a token is present we assume authenticated optimistically (with the
    /// cached user, if any). Construction does no network I/O; callers are
    /// expected to invoke `restore_session` afterwards to confirm the token
    /// against the backend.
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn KeyValueStorage>) -> Arc<Self> {
        let mut state = AppState::default();
        if client.get_token().is_some() {
            state.is_authenticated = true;
            state.user = storage
                .get(USER_KEY)
                .and_then(|raw| serde_json::from_str(&raw).ok());
        }

        Arc::new_cyclic(|weak_self| Self {
            client,
            storage,
            state: Mutex::new(state),
            subscribers: Mutex::new(Subscribers::default()),
            login_generation: AtomicU64::new(0),
            weak_self: weak_self.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Snapshot access and subscription
    // ------------------------------------------------------------------

    /// Current snapshot; a clone, safe to hold across awaits
    pub fn get_state(&self) -> AppState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    /// Merge the patch and synchronously notify every subscriber
    pub fn set_state(&self, patch: StatePatch) {
        self.update(|state| patch.apply(state));
    }

    /// Register a listener invoked on every state change
    pub fn subscribe(
        &self,
        listener: impl Fn(&AppState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        subs.next_id += 1;
        let id = subs.next_id;
        subs.listeners.push((id, Arc::new(listener)));
        SubscriptionId(id)
    }

    /// Remove one subscription; other subscriptions are unaffected
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        subs.listeners.retain(|(sub_id, _)| *sub_id != id.0);
    }

    /// Apply a mutation under the state lock, then fan out the new snapshot
    ///
    /// The merge runs to completion before any listener sees it, so
    /// subscribers always observe a consistent snapshot.
    fn update(&self, f: impl FnOnce(&mut AppState)) {
        let snapshot = {
            let mut state = self.state.lock().expect("state lock poisoned");
            f(&mut state);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Invoke listeners in registration order
    ///
    /// The subscriber lock is released before any listener runs, so a
    /// listener may call back into the store (raise a notification, mutate
    /// state, subscribe or unsubscribe) without deadlocking. A subscription
    /// added or removed mid-notification takes effect from the next change.
    fn notify(&self, snapshot: &AppState) {
        let listeners: Vec<Listener> = {
            let subs = self.subscribers.lock().expect("subscriber lock poisoned");
            subs.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn persist_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.storage.set(USER_KEY, &json),
            Err(e) => tracing::error!("Failed to serialize user for storage: {:?}", e),
        }
    }

    // ------------------------------------------------------------------
    // Session operations
    // ------------------------------------------------------------------

    /// Log in and fold the session into state
    ///
    /// On success the token and user are persisted; on failure `state.error`
    /// carries the human-readable message and the error is returned too, so
    /// UI and store both observe it. A call superseded by a newer `login`
    /// leaves state entirely to the newer call.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ClientError> {
        let generation = self.login_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.login(credentials).await {
            Ok(auth) => {
                if self.login_generation.load(Ordering::SeqCst) != generation {
                    tracing::debug!("discarding superseded login result");
                    return Ok(auth.user);
                }
                self.client.set_token(&auth.token);
                self.persist_user(&auth.user);
                tracing::info!(user_id = %auth.user.id, "login succeeded");
                self.set_state(
                    StatePatch::new()
                        .user(Some(auth.user.clone()))
                        .is_authenticated(true)
                        .loading(false)
                        .error(None),
                );
                Ok(auth.user)
            }
            Err(err) => {
                if self.login_generation.load(Ordering::SeqCst) == generation {
                    self.set_state(
                        StatePatch::new()
                            .loading(false)
                            .error(Some(err.to_string())),
                    );
                }
                Err(err)
            }
        }
    }

    /// Register a new account; same session fold as `login`
    pub async fn register(&self, registration: &Registration) -> Result<User, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.register(registration).await {
            Ok(auth) => {
                self.client.set_token(&auth.token);
                self.persist_user(&auth.user);
                self.set_state(
                    StatePatch::new()
                        .user(Some(auth.user.clone()))
                        .is_authenticated(true)
                        .loading(false)
                        .error(None),
                );
                Ok(auth.user)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Clear the session and reset state to its defaults
    pub fn logout(&self) {
        tracing::info!("logging out");
        self.client.clear_token();
        self.storage.remove(USER_KEY);
        self.update(|state| *state = AppState::default());
    }

    /// Confirm a hydrated session against the backend
    ///
    /// Cold-start counterpart to the optimistic hydration in `new`: fetches
    /// the profile to validate the stored token. On failure the session is
    /// stale - revert to anonymous and clear the storage keys. Best-effort:
    /// a failed confirmation is a revert, not an error.
    pub async fn restore_session(&self) -> Option<User> {
        self.client.get_token()?;

        match self.client.get_user_profile().await {
            Ok(user) => {
                self.persist_user(&user);
                self.set_state(
                    StatePatch::new()
                        .user(Some(user.clone()))
                        .is_authenticated(true),
                );
                Some(user)
            }
            Err(err) => {
                tracing::warn!("stored session is stale, reverting: {}", err);
                self.client.clear_token();
                self.storage.remove(USER_KEY);
                self.set_state(StatePatch::new().user(None).is_authenticated(false));
                None
            }
        }
    }

    /// Update the profile and re-persist the stored user
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.update_user_profile(update).await {
            Ok(user) => {
                self.persist_user(&user);
                self.set_state(
                    StatePatch::new()
                        .user(Some(user.clone()))
                        .loading(false)
                        .error(None),
                );
                Ok(user)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Analysis and marketplace operations
    // ------------------------------------------------------------------

    /// Run an RFM analysis; the previous result is replaced wholesale
    pub async fn analyze_rfm(
        &self,
        request: &RfmAnalysisRequest,
    ) -> Result<RfmAnalysis, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.analyze_rfm(request).await {
            Ok(analysis) => {
                self.set_state(
                    StatePatch::new()
                        .rfm_analysis(Some(analysis.clone()))
                        .loading(false)
                        .error(None),
                );
                Ok(analysis)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Generate a marketing message and append it (newest last)
    pub async fn generate_message(
        &self,
        request: &MessageRequest,
    ) -> Result<GeneratedMessage, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.generate_message(request).await {
            Ok(message) => {
                let result = message.clone();
                self.update(|state| {
                    state.messages.push(message);
                    state.loading = false;
                    state.error = None;
                });
                Ok(result)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Regenerate an existing message, replacing it in place by id
    pub async fn regenerate_message(
        &self,
        message_id: &str,
    ) -> Result<GeneratedMessage, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.regenerate_message(message_id).await {
            Ok(message) => {
                let result = message.clone();
                self.update(|state| {
                    match state.messages.iter_mut().find(|m| m.id == message.id) {
                        Some(existing) => *existing = message,
                        None => state.messages.push(message),
                    }
                    state.loading = false;
                    state.error = None;
                });
                Ok(result)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Generate an insight and append it (newest last)
    pub async fn generate_insight(&self, request: &InsightRequest) -> Result<Insight, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.generate_insight(request).await {
            Ok(insight) => {
                let result = insight.clone();
                self.update(|state| {
                    state.insights.push(insight);
                    state.loading = false;
                    state.error = None;
                });
                Ok(result)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Load the user's message history, replacing the list
    pub async fn load_user_messages(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GeneratedMessage>, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.get_user_messages(limit, offset).await {
            Ok(messages) => {
                self.set_state(
                    StatePatch::new()
                        .messages(messages.clone())
                        .loading(false)
                        .error(None),
                );
                Ok(messages)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    /// Fetch recent analysis runs; not folded into state (history is a
    /// page-local view, only the latest result lives in the snapshot)
    pub async fn load_analysis_history(
        &self,
        limit: usize,
    ) -> Result<Vec<RfmAnalysis>, ClientError> {
        self.set_state(StatePatch::new().loading(true).error(None));

        match self.client.get_analysis_history(limit).await {
            Ok(history) => {
                self.set_state(StatePatch::new().loading(false).error(None));
                Ok(history)
            }
            Err(err) => {
                self.set_state(
                    StatePatch::new()
                        .loading(false)
                        .error(Some(err.to_string())),
                );
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Add a notification with the default 5s duration; returns its id
    pub fn add_notification(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> i64 {
        self.add_notification_for(kind, title, message, DEFAULT_NOTIFICATION_DURATION)
    }

    /// Add a notification that removes itself after `duration`
    ///
    /// The expiry task holds a Weak handle so a dropped store does not
    /// linger for the sake of a pending notification.
    pub fn add_notification_for(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        duration: Duration,
    ) -> i64 {
        let notification = Notification::new(kind, title, message);
        let id = notification.id;
        self.update(|state| state.notifications.push(notification));

        let store = self.weak_self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(store) = store.upgrade() {
                store.remove_notification(id);
            }
        });

        id
    }

    /// Dismiss a notification early; no-op (and no fan-out) if already gone
    pub fn remove_notification(&self, id: i64) {
        let mut state = self.state.lock().expect("state lock poisoned");
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        if state.notifications.len() == before {
            return;
        }
        let snapshot = state.clone();
        drop(state);
        self.notify(&snapshot);
    }
}
