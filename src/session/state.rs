use crate::core::{ApiError, Result};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{info, warn};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const LOGIN_TIME_KEY: &str = "loginTime";

/// Signed-in account as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            role: None,
            extra: JsonMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub account: Account,
    pub login_time: DateTime<Utc>,
}

impl Session {
    pub fn expires_at(&self, duration: ChronoDuration) -> DateTime<Utc> {
        self.login_time + duration
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, duration: ChronoDuration) -> bool {
        now.signed_duration_since(self.login_time) >= duration
    }
}

/// Why the user has to sign in again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReason {
    /// The backend rejected the token
    Unauthorized,
    /// The session outlived its duration
    Expired,
    /// An authenticated call was attempted without a token
    MissingToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut,
    SignedIn { account_id: String },
    LoginRequired(LoginReason),
}

impl AuthStatus {
    pub fn requires_login(&self) -> bool {
        matches!(self, AuthStatus::LoginRequired(_))
    }
}

struct SessionInner {
    current: RwLock<Option<Session>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    duration: ChronoDuration,
    status: watch::Sender<AuthStatus>,
}

/// Shared auth state. Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DURATION)
    }
}

impl SessionStore {
    pub const DEFAULT_DURATION: std::time::Duration = std::time::Duration::from_secs(60 * 60);

    /// In-memory session, nothing persisted.
    pub fn new(duration: std::time::Duration) -> Self {
        Self::build(None, duration)
    }

    /// Session mirrored into `storage`; a previously stored session is
    /// restored unless it is incomplete, corrupt or expired.
    pub fn with_storage(storage: Arc<dyn KeyValueStore>, duration: std::time::Duration) -> Self {
        let store = Self::build(Some(storage), duration);
        store.restore(Utc::now());
        store
    }

    fn build(storage: Option<Arc<dyn KeyValueStore>>, duration: std::time::Duration) -> Self {
        let duration = ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::hours(1));
        let (status, _) = watch::channel(AuthStatus::SignedOut);
        Self {
            inner: Arc::new(SessionInner {
                current: RwLock::new(None),
                storage,
                duration,
                status,
            }),
        }
    }

    pub fn duration(&self) -> ChronoDuration {
        self.inner.duration
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.current.read().ok().and_then(|guard| guard.clone())
    }

    pub fn account(&self) -> Option<Account> {
        self.current().map(|session| session.account)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.inner.status.subscribe()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current().map(|session| session.expires_at(self.inner.duration))
    }

    /// Start a session that began now.
    pub fn establish(&self, token: impl Into<String>, account: Account) -> Result<Session> {
        self.establish_at(token, account, Utc::now())
    }

    pub fn establish_at(
        &self,
        token: impl Into<String>,
        account: Account,
        login_time: DateTime<Utc>,
    ) -> Result<Session> {
        let session = Session {
            token: token.into(),
            account,
            login_time,
        };

        if let Some(storage) = &self.inner.storage {
            storage.set(TOKEN_KEY, &serde_json::to_string(&session.token)?)?;
            storage.set(USER_KEY, &serde_json::to_string(&session.account)?)?;
            storage.set(LOGIN_TIME_KEY, &session.login_time.timestamp_millis().to_string())?;
        }

        *self.inner.current.write()? = Some(session.clone());
        self.inner.status.send_replace(AuthStatus::SignedIn {
            account_id: session.account.id.clone(),
        });
        info!(account_id = %session.account.id, "session established");
        Ok(session)
    }

    /// Replace the signed-in account, keeping the token and login time.
    pub fn update_account(&self, account: Account) -> Result<()> {
        let mut current = self.inner.current.write()?;
        let Some(session) = current.as_mut() else {
            return Err(ApiError::Unauthorized.into());
        };
        if let Some(storage) = &self.inner.storage {
            storage.set(USER_KEY, &serde_json::to_string(&account)?)?;
        }
        session.account = account;
        Ok(())
    }

    /// Bearer token for an authenticated call.
    ///
    /// Fails with `Unauthorized` (and publishes `LoginRequired`) when there is
    /// no session or it has expired.
    pub fn require_token(&self) -> std::result::Result<String, ApiError> {
        self.require_token_at(Utc::now())
    }

    pub fn require_token_at(&self, now: DateTime<Utc>) -> std::result::Result<String, ApiError> {
        match self.current() {
            Some(session) if session.is_expired_at(now, self.inner.duration) => {
                self.end_session(AuthStatus::LoginRequired(LoginReason::Expired));
                Err(ApiError::Unauthorized)
            }
            Some(session) => Ok(session.token),
            None => {
                self.inner
                    .status
                    .send_replace(AuthStatus::LoginRequired(LoginReason::MissingToken));
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// Expire the session if its duration has elapsed. Returns `true` when
    /// it was ended by this call.
    pub fn check_expiry_at(&self, now: DateTime<Utc>) -> bool {
        match self.current() {
            Some(session) if session.is_expired_at(now, self.inner.duration) => {
                self.end_session(AuthStatus::LoginRequired(LoginReason::Expired));
                true
            }
            _ => false,
        }
    }

    /// The backend rejected our credentials: drop cached auth state and ask
    /// for a fresh login.
    pub fn handle_unauthorized(&self) {
        warn!("unauthorized response, clearing session");
        self.end_session(AuthStatus::LoginRequired(LoginReason::Unauthorized));
    }

    pub fn sign_out(&self) {
        self.end_session(AuthStatus::SignedOut);
    }

    fn end_session(&self, status: AuthStatus) {
        if let Ok(mut current) = self.inner.current.write() {
            *current = None;
        }
        self.clear_storage();
        self.inner.status.send_replace(status);
    }

    fn clear_storage(&self) {
        let Some(storage) = &self.inner.storage else {
            return;
        };
        for key in [TOKEN_KEY, USER_KEY, LOGIN_TIME_KEY] {
            if let Err(e) = storage.remove(key) {
                warn!(key, error = %e, "failed to clear stored session key");
            }
        }
    }

    fn restore(&self, now: DateTime<Utc>) {
        let Some(session) = self.load_stored() else {
            self.clear_storage();
            return;
        };

        if session.is_expired_at(now, self.inner.duration) {
            info!(account_id = %session.account.id, "stored session expired");
            self.end_session(AuthStatus::LoginRequired(LoginReason::Expired));
            return;
        }

        let account_id = session.account.id.clone();
        if let Ok(mut current) = self.inner.current.write() {
            *current = Some(session);
        }
        self.inner.status.send_replace(AuthStatus::SignedIn { account_id });
    }

    fn load_stored(&self) -> Option<Session> {
        let storage = self.inner.storage.as_ref()?;
        let token: String = serde_json::from_str(&storage.get(TOKEN_KEY).ok()??).ok()?;
        let account: Account = serde_json::from_str(&storage.get(USER_KEY).ok()??).ok()?;
        let millis: i64 = storage.get(LOGIN_TIME_KEY).ok()??.trim().parse().ok()?;
        let login_time = Utc.timestamp_millis_opt(millis).single()?;
        Some(Session {
            token,
            account,
            login_time,
        })
    }
}
