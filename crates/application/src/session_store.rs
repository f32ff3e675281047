use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tramite_core::{AccessToken, AppError, AppResult, NonEmptyString, RefreshToken};
use tramite_domain::{EmailAddress, LOGIN_PATH, User};

use crate::auth_ports::{
    AuthApi, LoginRequest, RefreshTokenRequest, RegisterRequest, RegisterResponse,
};
use crate::session_ports::{Navigator, ResponseCache, SessionStorage, StorageKey};

/// User and credentials of a signed-in session. Always set and cleared together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    user: User,
    access_token: AccessToken,
    refresh_token: Option<RefreshToken>,
    expires_at: Option<DateTime<Utc>>,
}

impl ActiveSession {
    /// Returns the signed-in user.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Returns the refresh token, when one was issued or restored.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// Returns when the access token expires, if known in this process.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// Consistent view of the session published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    active: Option<ActiveSession>,
    loading: bool,
}

impl SessionSnapshot {
    /// Returns a snapshot holding a signed-in session.
    #[must_use]
    pub fn signed_in(user: User, access_token: AccessToken, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            active: Some(ActiveSession {
                user,
                access_token,
                refresh_token,
                expires_at: None,
            }),
            loading: false,
        }
    }

    /// Returns whether a user is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the signed-in session.
    #[must_use]
    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.active.as_ref().map(ActiveSession::user)
    }

    /// Returns whether a login or registration call is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Process-wide owner of the current user and credentials.
///
/// Every mutation publishes one snapshot, so observers never see a user
/// without tokens or tokens without a user.
pub struct SessionStore {
    auth_api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    response_cache: Arc<dyn ResponseCache>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
    pending_calls: AtomicUsize,
    initialized: AtomicBool,
}

impl SessionStore {
    /// Creates an empty session store.
    #[must_use]
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        storage: Arc<dyn SessionStorage>,
        response_cache: Arc<dyn ResponseCache>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            auth_api,
            storage,
            response_cache,
            navigator,
            state: watch::Sender::new(SessionSnapshot::default()),
            pending_calls: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Restores a persisted session. Only the first call reads storage.
    ///
    /// Returns whether a session is active afterwards.
    pub async fn initialize(&self) -> AppResult<bool> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("session store already initialized");
            return Ok(self.is_authenticated());
        }

        let access_token = self.storage.get(StorageKey::AccessToken).await?;
        let stored_user = self.storage.get(StorageKey::User).await?;
        let refresh_token = self.storage.get(StorageKey::RefreshToken).await?;

        let (Some(access_token), Some(stored_user)) = (access_token, stored_user) else {
            debug!("no persisted session found");
            return Ok(false);
        };

        let user = match serde_json::from_str::<User>(&stored_user) {
            Ok(user) => user,
            Err(error) => {
                warn!(error = %error, "ignoring unreadable persisted user");
                return Ok(false);
            }
        };

        info!(user_id = %user.id, "restored persisted session");
        self.state.send_modify(|snapshot| {
            snapshot.active = Some(ActiveSession {
                user,
                access_token: AccessToken::new(access_token),
                refresh_token: refresh_token.map(RefreshToken::new),
                expires_at: None,
            });
        });

        Ok(true)
    }

    /// Signs in and persists the session.
    ///
    /// On failure the current session is left untouched.
    pub async fn login(&self, request: LoginRequest) -> AppResult<User> {
        let _loading = self.begin_call();
        EmailAddress::new(request.email.as_str())?;
        NonEmptyString::new(request.password.as_str())?;

        let response = self.auth_api.login(request).await.inspect_err(|error| {
            warn!(error = %error, "login rejected");
        })?;
        let user = response.user.into_user()?;
        let expires_at = expiry_from(response.expires_in);

        self.persist_session(&user, &response.access_token, &response.refresh_token)
            .await?;

        info!(user_id = %user.id, roles = user.roles.len(), "login succeeded");
        self.state.send_modify(|snapshot| {
            snapshot.active = Some(ActiveSession {
                user: user.clone(),
                access_token: response.access_token,
                refresh_token: Some(response.refresh_token),
                expires_at,
            });
        });

        Ok(user)
    }

    /// Creates an account. The current session is not changed.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        let _loading = self.begin_call();
        EmailAddress::new(request.email.as_str())?;
        NonEmptyString::new(request.password.as_str())?;
        NonEmptyString::new(request.first_name.as_str())?;
        NonEmptyString::new(request.last_name.as_str())?;

        let response = self.auth_api.register(request).await.inspect_err(|error| {
            warn!(error = %error, "registration rejected");
        })?;
        info!(user_id = %response.user.id, "registration succeeded");

        Ok(response)
    }

    /// Exchanges the refresh token for a new token pair.
    ///
    /// Any failure ends the session before the error is returned.
    pub async fn refresh(&self) -> AppResult<()> {
        let Some(refresh_token) = self.current_refresh_token() else {
            warn!("token refresh requested without a refresh token");
            self.logout().await;
            return Err(AppError::NoRefreshToken);
        };

        let response = match self
            .auth_api
            .refresh(RefreshTokenRequest { refresh_token })
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "token refresh rejected, ending session");
                self.logout().await;
                return Err(error);
            }
        };

        let expires_at = expiry_from(response.expires_in);
        let replaced = self.state.send_if_modified(|snapshot| match snapshot.active.as_mut() {
            Some(active) => {
                active.access_token = response.access_token.clone();
                active.refresh_token = Some(response.refresh_token.clone());
                active.expires_at = expires_at;
                true
            }
            None => false,
        });

        if !replaced {
            return Err(AppError::Unauthorized(
                "session ended while refreshing tokens".to_owned(),
            ));
        }

        if let Err(error) = self.persist_tokens(&response.access_token, &response.refresh_token).await {
            warn!(error = %error, "failed to persist refreshed tokens, ending session");
            self.logout().await;
            return Err(error);
        }

        debug!("access token refreshed");
        Ok(())
    }

    /// Ends the session: clears state, storage and cached responses, then
    /// redirects to the login page. Calling it again is harmless.
    pub async fn logout(&self) {
        let ended = self
            .state
            .send_if_modified(|snapshot| snapshot.active.take().is_some());

        self.clear_storage().await;
        if let Err(error) = self.response_cache.clear_all().await {
            warn!(error = %error, "failed to clear response cache on logout");
        }

        if ended {
            info!("session ended");
        }
        self.navigator.navigate(LOGIN_PATH);
    }

    /// Replaces the user of the active session, for example after a role change.
    pub async fn replace_user(&self, user: User) -> AppResult<()> {
        if !self.is_authenticated() {
            return Err(AppError::Unauthorized("no active session".to_owned()));
        }

        let serialized = serde_json::to_string(&user)
            .map_err(|error| AppError::Internal(format!("failed to serialize user: {error}")))?;
        self.storage.set(StorageKey::User, &serialized).await?;

        self.state.send_if_modified(|snapshot| match snapshot.active.as_mut() {
            Some(active) if active.user != user => {
                active.user = user;
                true
            }
            _ => false,
        });

        Ok(())
    }

    /// Returns the access token of the active session.
    #[must_use]
    pub fn current_token(&self) -> Option<AccessToken> {
        self.state
            .borrow()
            .active
            .as_ref()
            .map(|active| active.access_token.clone())
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// Returns whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Returns whether a login or registration call is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Returns when the access token expires, if issued in this process.
    #[must_use]
    pub fn access_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.state
            .borrow()
            .active
            .as_ref()
            .and_then(ActiveSession::expires_at)
    }

    /// Returns a copy of the current session state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribes to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    fn current_refresh_token(&self) -> Option<RefreshToken> {
        self.state
            .borrow()
            .active
            .as_ref()
            .and_then(|active| active.refresh_token.clone())
    }

    fn begin_call(&self) -> LoadingFlag<'_> {
        if self.pending_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.state.send_if_modified(|snapshot| !std::mem::replace(&mut snapshot.loading, true));
        }

        LoadingFlag { store: self }
    }

    async fn persist_session(
        &self,
        user: &User,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> AppResult<()> {
        let serialized = serde_json::to_string(user)
            .map_err(|error| AppError::Internal(format!("failed to serialize user: {error}")))?;

        let result = async {
            self.persist_tokens(access_token, refresh_token).await?;
            self.storage.set(StorageKey::User, &serialized).await
        }
        .await;

        if result.is_err() {
            let previous = self.state.borrow().active.clone();
            match previous {
                Some(previous) => self.restore_storage(&previous).await,
                None => self.clear_storage().await,
            }
        }

        result
    }

    /// Writes the still-active tokens back after a failed persistence attempt.
    /// The user key is written last, so it still holds the active user.
    async fn restore_storage(&self, active: &ActiveSession) {
        let restored = async {
            self.storage
                .set(StorageKey::AccessToken, active.access_token.as_str())
                .await?;
            match &active.refresh_token {
                Some(refresh_token) => {
                    self.storage
                        .set(StorageKey::RefreshToken, refresh_token.as_str())
                        .await
                }
                None => self.storage.remove(StorageKey::RefreshToken).await,
            }
        }
        .await;

        if let Err(error) = restored {
            warn!(user_id = %active.user.id, error = %error, "failed to restore persisted session");
        }
    }

    async fn persist_tokens(
        &self,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> AppResult<()> {
        self.storage
            .set(StorageKey::AccessToken, access_token.as_str())
            .await?;
        self.storage
            .set(StorageKey::RefreshToken, refresh_token.as_str())
            .await
    }

    async fn clear_storage(&self) {
        for key in StorageKey::all() {
            if let Err(error) = self.storage.remove(*key).await {
                warn!(key = key.as_str(), error = %error, "failed to remove persisted session key");
            }
        }
    }
}

/// Keeps the loading flag raised until dropped, including on cancellation.
struct LoadingFlag<'a> {
    store: &'a SessionStore,
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        if self.store.pending_calls.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.store
                .state
                .send_if_modified(|snapshot| std::mem::replace(&mut snapshot.loading, false));
        }
    }
}

fn expiry_from(expires_in: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(expires_in).ok()?;
    Utc::now().checked_add_signed(ChronoDuration::try_seconds(seconds)?)
}
