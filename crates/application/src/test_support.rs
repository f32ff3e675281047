use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tramite_core::{AccessToken, AppError, AppResult, RefreshToken};
use tramite_domain::{Action, Permission};

use crate::{
    AuthApi, LoginRequest, LoginResponse, Navigator, Notification, Notifier, RefreshTokenRequest,
    RefreshTokenResponse, RegisterRequest, RegisterResponse, ResponseCache, RoleDto,
    SessionStorage, SessionStore, StorageKey, UserDto,
};

pub(crate) const PASSWORD: &str = "correct horse";

pub(crate) fn user_dto(email: &str, role: &str, grants: &[(&str, Action)]) -> UserDto {
    UserDto {
        id: format!("id-{email}"),
        email: email.to_owned(),
        first_name: "Test".to_owned(),
        last_name: "User".to_owned(),
        avatar: None,
        roles: vec![RoleDto {
            id: format!("role-{role}"),
            name: role.to_owned(),
            display_name: role.to_owned(),
            description: None,
            permissions: grants
                .iter()
                .map(|(resource, action)| {
                    Permission::new(format!("{resource}:{action}"), *resource, *action)
                })
                .collect(),
            is_system: true,
        }],
        created_at: None,
        updated_at: None,
    }
}

pub(crate) struct FakeAuthApi {
    user: UserDto,
    issued: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
    pub(crate) reject_refresh: AtomicBool,
    pub(crate) login_gate: Option<Arc<Notify>>,
}

impl FakeAuthApi {
    pub(crate) fn new(user: UserDto) -> Self {
        Self {
            user,
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            reject_refresh: AtomicBool::new(false),
            login_gate: None,
        }
    }

    fn next_pair(&self) -> (AccessToken, RefreshToken) {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        (
            AccessToken::new(format!("access-{serial}")),
            RefreshToken::new(format!("refresh-{serial}")),
        )
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }

        if !request.email.eq_ignore_ascii_case(&self.user.email) || request.password != PASSWORD {
            return Err(AppError::InvalidCredentials(
                "Invalid email or password".to_owned(),
            ));
        }

        let (access_token, refresh_token) = self.next_pair();
        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_owned(),
            expires_in: 3600,
            user: self.user.clone(),
        })
    }

    async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        let mut user = self.user.clone();
        user.email = request.email;
        user.first_name = request.first_name;
        user.last_name = request.last_name;

        Ok(RegisterResponse {
            user,
            message: "Registration successful".to_owned(),
        })
    }

    async fn refresh(&self, _request: RefreshTokenRequest) -> AppResult<RefreshTokenResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(AppError::Unauthorized("refresh token expired".to_owned()));
        }

        let (access_token, refresh_token) = self.next_pair();
        Ok(RefreshTokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_owned(),
            expires_in: 3600,
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeSessionStorage {
    pub(crate) values: Mutex<HashMap<StorageKey, String>>,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) failing_key: std::sync::Mutex<Option<StorageKey>>,
}

impl FakeSessionStorage {
    pub(crate) fn fail_writes_to(&self, key: StorageKey) {
        *self
            .failing_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(key);
    }
}

#[async_trait]
impl SessionStorage for FakeSessionStorage {
    async fn get(&self, key: StorageKey) -> AppResult<Option<String>> {
        Ok(self.values.lock().await.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: &str) -> AppResult<()> {
        let key_fails = *self
            .failing_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(key);
        if key_fails || self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("storage is read-only".to_owned()));
        }

        self.values.lock().await.insert(key, value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> AppResult<()> {
        self.values.lock().await.remove(&key);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeResponseCache {
    pub(crate) entries: Mutex<HashMap<String, Value>>,
    pub(crate) clears: AtomicUsize,
}

#[async_trait]
impl ResponseCache for FakeResponseCache {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value, _ttl: Duration) -> AppResult<()> {
        self.entries.lock().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    paths: std::sync::Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn paths(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_owned());
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notifications: std::sync::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

pub(crate) struct SessionHarness {
    pub(crate) store: Arc<SessionStore>,
    pub(crate) auth_api: Arc<FakeAuthApi>,
    pub(crate) storage: Arc<FakeSessionStorage>,
    pub(crate) cache: Arc<FakeResponseCache>,
    pub(crate) navigator: Arc<RecordingNavigator>,
}

impl SessionHarness {
    pub(crate) fn new(auth_api: FakeAuthApi) -> Self {
        Self::with_storage(auth_api, Arc::new(FakeSessionStorage::default()))
    }

    pub(crate) fn with_storage(auth_api: FakeAuthApi, storage: Arc<FakeSessionStorage>) -> Self {
        let auth_api = Arc::new(auth_api);
        let cache = Arc::new(FakeResponseCache::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let store = Arc::new(SessionStore::new(
            auth_api.clone(),
            storage.clone(),
            cache.clone(),
            navigator.clone(),
        ));

        Self {
            store,
            auth_api,
            storage,
            cache,
            navigator,
        }
    }

    pub(crate) fn for_user(email: &str, role: &str, grants: &[(&str, Action)]) -> Self {
        Self::new(FakeAuthApi::new(user_dto(email, role, grants)))
    }

    pub(crate) async fn sign_in(&self, email: &str) -> AppResult<()> {
        self.store
            .login(LoginRequest::new(email, PASSWORD))
            .await
            .map(|_| ())
    }
}
