//! Session manager: drives one `Session` by polling the gateway.
//!
//! Every state-changing operation takes a generation number when it starts.
//! When its gateway call returns, the result is applied only if no newer
//! operation (or `dispose`) has been issued in the meantime.

// std::sync::Mutex is correct here: the lock is never held across .await.
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zapgate_gateway_protocol::GatewayState;

use super::countdown::Countdown;
use super::state::{Session, SessionStatus};
use crate::client::Gateway;
use crate::config::SessionConfig;
use crate::credential::{CredentialPolicy, OperationClass, Role};
use crate::error::{ValidationError, WorkflowError, WorkflowResult};
use crate::notify::{LogNotifier, Notice, NoticeLevel, Notifier};
use crate::store::{ConfigStore, StoreResult};

// ============================================================================
// SessionManager
// ============================================================================

/// Owns one `Session` and keeps it in sync with the gateway.
///
/// Call [`SessionManager::dispose`] when the owner goes away. Dropping the
/// manager also stops its timers.
pub struct SessionManager {
    core: Arc<Core>,
}

impl SessionManager {
    pub fn builder(gateway: Arc<dyn Gateway>) -> SessionManagerBuilder {
        SessionManagerBuilder::new(gateway)
    }

    /// Probe the gateway and update the status.
    ///
    /// Probe failures degrade to `disconnected` with a warning notice; they
    /// are not returned as errors.
    pub async fn check_status(&self, instance_id: &str) -> WorkflowResult<SessionStatus> {
        self.core.check_status(instance_id).await
    }

    /// Request a QR code and enter `connecting`.
    ///
    /// Never reaches `connected` by itself; a later `check_status` does.
    pub async fn begin_connect(&self, instance_id: &str) -> WorkflowResult<Session> {
        self.core.begin_connect(instance_id).await
    }

    /// Log out and reset the local session. Gateway failures are swallowed.
    pub async fn end_session(&self, instance_id: &str) -> WorkflowResult<()> {
        self.core.end_session(instance_id).await
    }

    /// Restart the instance and schedule one follow-up status probe.
    pub async fn restart(&self, instance_id: &str) -> WorkflowResult<RecheckHandle> {
        self.core.restart(instance_id).await
    }

    /// Stop all timers and pending follow-ups. Later operations fail with
    /// `WorkflowError::Disposed`; no late callback touches the session.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.core.lock().session.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.core.lock().session.status()
    }

    /// Seconds left on the QR countdown, if one is running.
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.core.lock().countdown.as_ref().map(Countdown::remaining)
    }

    pub fn is_disposed(&self) -> bool {
        self.core.lock().disposed
    }

    pub fn role(&self) -> Role {
        self.core.role
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct SessionManagerBuilder {
    gateway: Arc<dyn Gateway>,
    policy: CredentialPolicy,
    role: Role,
    instance_key: String,
    config: SessionConfig,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn ConfigStore>>,
}

impl SessionManagerBuilder {
    fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            policy: CredentialPolicy::default(),
            role: Role::User,
            instance_key: String::new(),
            config: SessionConfig::default(),
            notifier: Arc::new(LogNotifier),
            store: None,
        }
    }

    pub fn policy(mut self, policy: CredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Role of the authenticated caller.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Stored per-instance client key.
    pub fn instance_key(mut self, key: impl Into<String>) -> Self {
        self.instance_key = key.into();
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Store whose record gets `last_connected` stamped on connect.
    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            core: Arc::new(Core {
                gateway: self.gateway,
                policy: self.policy,
                role: self.role,
                instance_key: self.instance_key,
                config: self.config,
                notifier: self.notifier,
                store: self.store,
                state: Mutex::new(State {
                    session: Session::new(""),
                    generation: 0,
                    disposed: false,
                    countdown: None,
                    pending_connect: None,
                }),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

// ============================================================================
// RecheckHandle
// ============================================================================

/// The status probe scheduled by `restart`.
#[derive(Debug)]
pub struct RecheckHandle {
    handle: JoinHandle<Option<SessionStatus>>,
}

impl RecheckHandle {
    /// Wait for the probe. Returns `None` if it was cancelled or failed.
    pub async fn wait(self) -> Option<SessionStatus> {
        match self.handle.await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Status recheck task failed");
                None
            }
        }
    }
}

// ============================================================================
// Core
// ============================================================================

struct Core {
    gateway: Arc<dyn Gateway>,
    policy: CredentialPolicy,
    role: Role,
    instance_key: String,
    config: SessionConfig,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn ConfigStore>>,
    state: Mutex<State>,
    /// Parent of the countdown and recheck tokens.
    shutdown: CancellationToken,
}

struct State {
    session: Session,
    generation: u64,
    disposed: bool,
    countdown: Option<Countdown>,
    /// Generation of the connect request still waiting for its QR code.
    pending_connect: Option<u64>,
}

impl State {
    /// Mutate the session; stops the countdown once status leaves `connecting`.
    fn apply(&mut self, f: impl FnOnce(&mut Session)) {
        f(&mut self.session);
        if self.session.status() != SessionStatus::Connecting
            && let Some(countdown) = self.countdown.take()
        {
            countdown.cancel();
        }
    }
}

impl Core {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.notifier.notify(Notice::new(level, message));
    }

    fn session_key(&self) -> &str {
        self.policy.resolve(
            self.role,
            OperationClass::SessionManagement,
            &self.instance_key,
        )
    }

    /// Instance and resolved credential, or the first missing one.
    fn preconditions<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> Result<(&'a str, &'a str), ValidationError> {
        let instance = instance_id.trim();
        if instance.is_empty() {
            return Err(ValidationError::MissingInstance);
        }
        let api_key = self.session_key();
        if api_key.is_empty() {
            return Err(ValidationError::MissingCredential);
        }
        Ok((instance, api_key))
    }

    fn reject(&self, err: ValidationError) -> WorkflowError {
        self.notify(NoticeLevel::Warning, format!("Cannot continue: {err}"));
        err.into()
    }

    /// Start a state-changing operation.
    fn begin(&self) -> WorkflowResult<u64> {
        let mut state = self.lock();
        if state.disposed {
            return Err(WorkflowError::Disposed);
        }
        state.generation += 1;
        Ok(state.generation)
    }

    /// Run `f` if `generation` is still current. `Ok(None)` means stale.
    fn settle<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut State) -> R,
    ) -> WorkflowResult<Option<R>> {
        let mut state = self.lock();
        if state.disposed {
            return Err(WorkflowError::Disposed);
        }
        if state.generation != generation {
            debug!(
                generation,
                current = state.generation,
                "Discarding stale gateway result"
            );
            return Ok(None);
        }
        Ok(Some(f(&mut state)))
    }

    /// Like `settle`, but a connect result also lands when the operations
    /// issued since then left the session waiting on this request: still
    /// `connecting`, with no QR code and no newer connect.
    fn settle_connect<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut State) -> R,
    ) -> WorkflowResult<Option<R>> {
        let mut state = self.lock();
        if state.disposed {
            return Err(WorkflowError::Disposed);
        }
        let awaiting = state.pending_connect == Some(generation)
            && state.session.status() == SessionStatus::Connecting
            && state.session.qr_payload().is_none();
        if state.generation != generation && !awaiting {
            debug!(
                generation,
                current = state.generation,
                "Discarding stale connect result"
            );
            return Ok(None);
        }
        if state.pending_connect == Some(generation) {
            state.pending_connect = None;
        }
        Ok(Some(f(&mut state)))
    }

    // ------------------------------------------------------------------------
    // Status probe
    // ------------------------------------------------------------------------

    async fn check_status(self: &Arc<Self>, instance_id: &str) -> WorkflowResult<SessionStatus> {
        let instance = instance_id.trim();
        if instance.is_empty() {
            let generation = self.begin()?;
            self.settle(generation, |state| {
                if state.session.status() != SessionStatus::Disconnected {
                    state.apply(Session::mark_disconnected);
                }
            })?;
            debug!("No instance configured, skipping status probe");
            return Ok(SessionStatus::Disconnected);
        }
        let (instance, api_key) = self
            .preconditions(instance)
            .map_err(|e| self.reject(e))?;

        let generation = self.begin()?;
        debug!(instance = %instance, generation, "Probing connection state");

        let (next, probe_error) = match self.gateway.connection_state(instance, api_key).await {
            Ok(reply) if reply.is_open() => (SessionStatus::Connected, None),
            Ok(reply) => {
                let next = if reply.gateway_state() == GatewayState::Connecting {
                    SessionStatus::Connecting
                } else {
                    SessionStatus::Disconnected
                };
                (next, None)
            }
            Err(e) => (SessionStatus::Disconnected, Some(WorkflowError::from(e))),
        };

        let settled = self.settle(generation, |state| {
            let previous = state.session.status();
            state.apply(|session| {
                session.set_instance(instance);
                match next {
                    SessionStatus::Connected if previous != SessionStatus::Connected => {
                        session.mark_connected();
                    }
                    // Still waiting for the scan: keep the QR and countdown.
                    SessionStatus::Connecting if previous == SessionStatus::Connecting => {}
                    SessionStatus::Connected => {}
                    _ if previous != SessionStatus::Disconnected => session.mark_disconnected(),
                    _ => {}
                }
            });
            (previous, state.session.status())
        })?;

        if let Some(e) = probe_error {
            warn!(instance = %instance, error = %e, "Status probe failed");
            self.notify(
                NoticeLevel::Warning,
                format!("Could not check WhatsApp status: {e}"),
            );
        }

        let Some((previous, status)) = settled else {
            return Ok(self.lock().session.status());
        };

        if previous != status {
            info!(instance = %instance, from = %previous, to = %status, "Session status changed");
        }
        if status == SessionStatus::Connected && previous != SessionStatus::Connected {
            self.notify(
                NoticeLevel::Success,
                format!("WhatsApp instance {instance} connected"),
            );
            self.stamp_connected(instance).await;
        }
        Ok(status)
    }

    async fn stamp_connected(&self, instance: &str) {
        let Some(store) = &self.store else {
            return;
        };
        let result: StoreResult<()> = async {
            let Some(mut record) = store.load().await? else {
                return Ok(());
            };
            if record.instance != instance {
                return Ok(());
            }
            record.last_connected = Some(Utc::now());
            store.save(&record).await
        }
        .await;
        if let Err(e) = result {
            warn!(instance = %instance, error = %e, "Failed to record connection time");
        }
    }

    // ------------------------------------------------------------------------
    // Connect
    // ------------------------------------------------------------------------

    async fn begin_connect(self: &Arc<Self>, instance_id: &str) -> WorkflowResult<Session> {
        let (instance, api_key) = self
            .preconditions(instance_id)
            .map_err(|e| self.reject(e))?;

        let generation = self.begin()?;
        {
            let mut state = self.lock();
            state.countdown = None;
            state.pending_connect = Some(generation);
            state.apply(|session| {
                session.set_instance(instance);
                session.mark_connecting(None);
            });
        }
        info!(instance = %instance, generation, "Requesting QR code");

        let outcome = match self.gateway.connect(instance, api_key).await {
            Ok(reply) => match reply.qr_payload() {
                Some(qr) => Ok(qr.to_string()),
                None => Err(WorkflowError::gateway(
                    "gateway returned no QR code (the instance may already be connected)",
                )),
            },
            Err(e) => Err(WorkflowError::from(e)),
        };

        match outcome {
            Ok(qr) => {
                let weak = Arc::downgrade(self);
                let seconds = self.config.qr_timeout_seconds;
                let settled = self.settle_connect(generation, |state| {
                    state.apply(|session| session.mark_connecting(Some(qr)));
                    if seconds > 0 {
                        state.countdown = Some(Countdown::start(
                            generation,
                            seconds,
                            &self.shutdown,
                            move || expire(&weak, generation),
                        ));
                    }
                    state.session.clone()
                })?;
                match settled {
                    Some(session) => {
                        if seconds > 0 {
                            self.notify(
                                NoticeLevel::Info,
                                format!("Scan the QR code within {seconds} seconds"),
                            );
                        } else {
                            self.notify(NoticeLevel::Info, "Scan the QR code to pair");
                        }
                        Ok(session)
                    }
                    None => Ok(self.lock().session.clone()),
                }
            }
            Err(err) => {
                let message = format!("Failed to connect: {err}");
                let applied = self.settle_connect(generation, |state| {
                    state.apply(|session| session.mark_error(message.clone()));
                })?;
                if applied.is_some() {
                    warn!(instance = %instance, error = %err, "Connect failed");
                    self.notify(NoticeLevel::Error, message);
                }
                Err(err)
            }
        }
    }

    /// Countdown ran out. Only acts on the countdown that is still current.
    fn on_countdown_expired(&self, id: u64) {
        let seconds = self.config.qr_timeout_seconds;
        let err = WorkflowError::StateTimeout { seconds };
        let expired = {
            let mut state = self.lock();
            let current = state.countdown.as_ref().is_some_and(|c| c.id() == id);
            if state.disposed || !current || state.session.status() != SessionStatus::Connecting {
                false
            } else {
                state.generation += 1;
                state.apply(|session| session.mark_error(err.to_string()));
                true
            }
        };
        if expired {
            warn!(seconds, "QR code expired before pairing");
            self.notify(NoticeLevel::Error, err.to_string());
        }
    }

    // ------------------------------------------------------------------------
    // Logout
    // ------------------------------------------------------------------------

    async fn end_session(self: &Arc<Self>, instance_id: &str) -> WorkflowResult<()> {
        self.begin()?;
        {
            let mut state = self.lock();
            state.countdown = None;
            state.apply(Session::mark_disconnected);
        }

        match self.preconditions(instance_id) {
            Ok((instance, api_key)) => {
                match self.gateway.logout(instance, api_key).await {
                    Ok(()) => info!(instance = %instance, "Logged out"),
                    Err(e) => {
                        warn!(instance = %instance, error = %e, "Logout failed, local session reset anyway");
                    }
                }
            }
            Err(e) => debug!(reason = %e, "Skipping gateway logout"),
        }

        self.notify(NoticeLevel::Info, "WhatsApp disconnected");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Restart
    // ------------------------------------------------------------------------

    async fn restart(self: &Arc<Self>, instance_id: &str) -> WorkflowResult<RecheckHandle> {
        let (instance, api_key) = self
            .preconditions(instance_id)
            .map_err(|e| self.reject(e))?;

        let generation = self.begin()?;
        info!(instance = %instance, "Restarting instance");

        if let Err(e) = self.gateway.restart(instance, api_key).await {
            let err = WorkflowError::from(e);
            let message = format!("Failed to restart: {err}");
            let applied = self.settle(generation, |state| {
                state.apply(|session| {
                    session.set_instance(instance);
                    session.mark_error(message.clone());
                });
            })?;
            if applied.is_some() {
                warn!(instance = %instance, error = %err, "Restart failed");
                self.notify(NoticeLevel::Error, message);
            }
            return Err(err);
        }

        if self.lock().disposed {
            return Err(WorkflowError::Disposed);
        }
        let delay = Duration::from_millis(self.config.restart_recheck_delay_ms);
        self.notify(
            NoticeLevel::Info,
            format!(
                "Restart requested, checking status in {}ms",
                delay.as_millis()
            ),
        );
        Ok(self.schedule_recheck(instance, delay))
    }

    fn schedule_recheck(self: &Arc<Self>, instance: &str, delay: Duration) -> RecheckHandle {
        let weak = Arc::downgrade(self);
        let token = self.shutdown.child_token();
        let instance = instance.to_string();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(instance = %instance, "Status recheck cancelled");
                    None
                }
                _ = tokio::time::sleep(delay) => {
                    let Some(core) = weak.upgrade() else {
                        return None;
                    };
                    match core.check_status(&instance).await {
                        Ok(status) => Some(status),
                        Err(e) => {
                            debug!(instance = %instance, error = %e, "Status recheck skipped");
                            None
                        }
                    }
                }
            }
        });
        RecheckHandle { handle }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    fn dispose(&self) {
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.generation += 1;
            state.countdown = None;
            state.apply(Session::mark_disconnected);
        }
        self.shutdown.cancel();
        debug!("Session manager disposed");
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn expire(core: &Weak<Core>, id: u64) {
    if let Some(core) = core.upgrade() {
        core.on_countdown_expired(id);
    }
}
