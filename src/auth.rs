use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::api::AccountApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::TokenGrant;

const EVENT_CAPACITY: usize = 16;
/// Longest wait before a refresh, whatever lifetime the service grants
const MAX_REFRESH_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Authentication state owned by [`SessionManager`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Pending OTP challenge, or the number that logged in
    pub phone_number: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
}

impl Session {
    pub fn status(&self) -> AuthStatus {
        if self.is_authenticated {
            AuthStatus::Authenticated
        } else if self.phone_number.is_some() {
            AuthStatus::AwaitingOtp
        } else {
            AuthStatus::LoggedOut
        }
    }

    fn is_empty(&self) -> bool {
        *self == Session::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    LoggedOut,
    AwaitingOtp,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutReason {
    UserRequested,
    RefreshFailed,
    Unauthorized,
}

/// Published on every state transition. UIs listen for `LoggedOut` to
/// return to the login screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    OtpRequested { phone_number: String },
    LoggedIn,
    TokenRefreshed,
    LoggedOut { reason: LogoutReason },
}

struct RefreshTimer {
    id: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

struct SessionState {
    session: Session,
    /// Bumped whenever the session is cleared
    epoch: u64,
    /// Bumped on every new OTP challenge
    challenge: u64,
    timer: Option<RefreshTimer>,
}

struct Inner {
    api: Arc<dyn AccountApi>,
    refresh_margin: Duration,
    state: Mutex<SessionState>,
    /// Serializes token-changing operations across their network calls
    ops: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
    next_timer_id: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.handle.abort();
        }
    }
}

/// Owns the OTP login flow and keeps the bearer token fresh.
///
/// Cloning is cheap and every clone shares one session. Create it once at
/// the application root and hand clones to whatever needs authenticated
/// calls.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AccountApi>, config: &ClientConfig) -> Self {
        Self::with_refresh_margin(api, config.refresh_margin)
    }

    pub fn with_refresh_margin(api: Arc<dyn AccountApi>, refresh_margin: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                refresh_margin,
                state: Mutex::new(SessionState {
                    session: Session::default(),
                    epoch: 0,
                    challenge: 0,
                    timer: None,
                }),
                ops: tokio::sync::Mutex::new(()),
                events,
                next_timer_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn api(&self) -> &Arc<dyn AccountApi> {
        &self.inner.api
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.state().session.clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.state().session.status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().session.is_authenticated
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.state().session.access_token.clone()
    }

    /// When the armed refresh timer fires, if one is armed
    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.state().timer.as_ref().map(|t| t.deadline)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Ask the service to send an OTP to `phone_number`
    pub async fn request_otp(&self, phone_number: &str) -> Result<()> {
        let phone_number = phone_number.trim();
        validate_phone_number(phone_number)?;

        log::info!("Requesting OTP for {}", mask_phone(phone_number));
        self.inner.api.request_otp(phone_number).await?;

        {
            let mut state = self.state();
            state.session.phone_number = Some(phone_number.to_string());
            state.challenge += 1;
        }
        self.emit(SessionEvent::OtpRequested {
            phone_number: phone_number.to_string(),
        });
        Ok(())
    }

    /// Exchange the OTP for tokens. On a rejected code the challenge
    /// stays pending so the user can try again.
    pub async fn validate_otp(&self, otp: &str) -> Result<Session> {
        let _op = self.inner.ops.lock().await;

        let (phone_number, epoch, challenge) = {
            let state = self.state();
            match &state.session.phone_number {
                Some(phone) => (phone.clone(), state.epoch, state.challenge),
                None => return Err(ClientError::NoChallenge),
            }
        };

        let otp = otp.trim();
        if otp.is_empty() {
            return Err(ClientError::Validation("OTP must not be empty".to_string()));
        }

        let grant = match self.inner.api.validate_otp(&phone_number, otp).await {
            Ok(grant) => grant,
            Err(err) => {
                log::warn!("OTP validation failed for {}: {}", mask_phone(&phone_number), err);
                return Err(err);
            }
        };

        let session = {
            let mut state = self.state();
            if state.epoch != epoch || state.challenge != challenge {
                // Logged out or re-challenged while the request was in flight
                log::info!("Discarding OTP validation result for a stale challenge");
                return Err(ClientError::NoChallenge);
            }
            self.apply_grant(&mut state, grant);
            state.session.is_authenticated = true;
            state.session.clone()
        };

        log::info!("Authenticated {}", mask_phone(&phone_number));
        self.emit(SessionEvent::LoggedIn);
        Ok(session)
    }

    /// Swap the refresh token for a new pair. Any failure ends the session.
    pub async fn refresh_auth_token(&self) -> Result<Session> {
        let _op = self.inner.ops.lock().await;
        self.refresh_locked().await
    }

    /// Caller holds `ops`
    async fn refresh_locked(&self) -> Result<Session> {
        let (bearer, refresh_token, epoch) = {
            let state = self.state();
            match (&state.session.access_token, &state.session.refresh_token) {
                (Some(bearer), Some(refresh)) => (bearer.clone(), refresh.clone(), state.epoch),
                _ => return Err(ClientError::SessionExpired),
            }
        };

        log::debug!("Refreshing access token");
        match self.inner.api.refresh_token(&bearer, &refresh_token).await {
            Ok(grant) => {
                let session = {
                    let mut state = self.state();
                    if state.epoch != epoch {
                        log::info!("Session ended during token refresh, dropping new tokens");
                        return Err(ClientError::SessionExpired);
                    }
                    self.apply_grant(&mut state, grant);
                    state.session.clone()
                };
                log::info!("Access token refreshed");
                self.emit(SessionEvent::TokenRefreshed);
                Ok(session)
            }
            Err(err) => {
                log::warn!("Token refresh failed, logging out: {}", err);
                self.end_session(epoch, LogoutReason::RefreshFailed);
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// Clear the session and cancel the refresh timer. No-op when already
    /// logged out.
    pub fn logout(&self) {
        let cleared = {
            let mut state = self.state();
            Self::clear(&mut state)
        };
        if cleared {
            log::info!("Logged out");
            self.emit(SessionEvent::LoggedOut {
                reason: LogoutReason::UserRequested,
            });
        }
    }

    /// Run an authenticated call with the current bearer token. A 401
    /// ends the session, unless the token has been replaced meanwhile.
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let (bearer, epoch) = {
            let state = self.state();
            match &state.session.access_token {
                Some(token) => (token.clone(), state.epoch),
                None => return Err(ClientError::SessionExpired),
            }
        };

        let result = call(bearer.clone()).await;
        if let Err(ClientError::SessionExpired) = &result {
            let still_current = self.state().session.access_token.as_deref() == Some(bearer.as_str());
            if still_current {
                log::warn!("Authenticated call was rejected, ending session");
                self.end_session(epoch, LogoutReason::Unauthorized);
            }
        }
        result
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn apply_grant(&self, state: &mut SessionState, grant: TokenGrant) {
        let delay = refresh_delay(grant.expires, self.inner.refresh_margin);
        self.arm_timer(state, delay);
        state.session.access_token = Some(grant.token);
        state.session.refresh_token = Some(grant.refresh_token);
    }

    /// Replace any pending timer with one that fires after `delay`
    fn arm_timer(&self, state: &mut SessionState, delay: Duration) {
        if let Some(previous) = state.timer.take() {
            previous.handle.abort();
        }

        let id = self.inner.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now);
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(run_timer(weak, id, deadline));

        log::debug!("Token refresh scheduled in {}s", delay.as_secs());
        state.timer = Some(RefreshTimer {
            id,
            deadline,
            handle,
        });
    }

    fn end_session(&self, epoch: u64, reason: LogoutReason) {
        let cleared = {
            let mut state = self.state();
            if state.epoch != epoch {
                return;
            }
            Self::clear(&mut state)
        };
        if cleared {
            self.emit(SessionEvent::LoggedOut { reason });
        }
    }

    /// Returns false when there was nothing to clear
    fn clear(state: &mut SessionState) -> bool {
        let timer = state.timer.take();
        if state.session.is_empty() && timer.is_none() {
            return false;
        }
        if let Some(timer) = timer {
            timer.handle.abort();
        }
        state.session = Session::default();
        state.epoch += 1;
        true
    }
}

async fn run_timer(inner: Weak<Inner>, id: u64, deadline: Instant) {
    sleep_until(deadline).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let manager = SessionManager { inner };
    // A validate or refresh in flight re-arms and aborts this task
    let _op = manager.inner.ops.lock().await;
    {
        let mut state = manager.state();
        if state.timer.as_ref().map(|t| t.id) != Some(id) {
            return;
        }
        // Detach so the refresh can arm the next timer without aborting us
        state.timer = None;
    }

    if let Err(err) = manager.refresh_locked().await {
        log::debug!("Scheduled refresh ended the session: {}", err);
    }
}

/// `expires - margin`, never negative and capped at a week
pub fn refresh_delay(expires_in_secs: i64, margin: Duration) -> Duration {
    let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
    let secs = expires_in_secs.saturating_sub(margin).max(0);
    Duration::from_secs(secs as u64).min(MAX_REFRESH_DELAY)
}

/// Wait for the next `LoggedOut` event, skipping other events and any
/// that were dropped because the receiver fell behind. `None` once the
/// session manager is gone.
pub async fn next_logout(
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Option<LogoutReason> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::LoggedOut { reason }) => return Some(reason),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                log::debug!("Session listener skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Local numbers: 8 digits starting with 8 or 9
pub fn validate_phone_number(phone_number: &str) -> Result<()> {
    let bytes = phone_number.as_bytes();
    let valid = bytes.len() == 8
        && bytes.iter().all(u8::is_ascii_digit)
        && matches!(bytes[0], b'8' | b'9');
    if valid {
        Ok(())
    } else {
        Err(ClientError::Validation(format!(
            "Phone number must be 8 digits starting with 8 or 9, got '{}'",
            phone_number
        )))
    }
}

pub(crate) fn mask_phone(phone_number: &str) -> String {
    let visible = phone_number.len().saturating_sub(4);
    match phone_number.get(visible..) {
        Some(tail) => format!("****{}", tail),
        None => "****".to_string(),
    }
}
