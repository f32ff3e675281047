use std::sync::Arc;

use tramite_application::{
    ApiClient, AuthApi, AuthorizationService, HttpTransport, LoadingTracker, RouteGuards,
    SessionStorage, SessionStore,
};
use tramite_core::{AppError, AppResult};
use tramite_domain::RouteTable;
use tramite_infrastructure::{
    FileSessionStorage, HistoryNavigator, HttpAuthApi, InMemoryAuthApi, InMemoryResponseCache,
    InMemorySessionStorage, RedisSessionStorage, ReqwestHttpTransport, TracingNotifier,
};
use tracing::info;

use crate::console_config::{AuthBackend, ConsoleConfig, SessionStoreConfig};
use crate::dev_seed;

pub struct ConsoleServices {
    pub session: Arc<SessionStore>,
    pub authorization: AuthorizationService,
    pub guards: RouteGuards,
    pub api_client: ApiClient,
    pub navigator: Arc<HistoryNavigator>,
}

pub async fn build(config: &ConsoleConfig) -> AppResult<ConsoleServices> {
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestHttpTransport::new(
        http_client,
        config.api_url.as_str(),
    )?);

    let auth_api: Arc<dyn AuthApi> = match config.auth_backend {
        AuthBackend::Http => Arc::new(HttpAuthApi::new(transport.clone())),
        AuthBackend::Memory => {
            let auth_api = InMemoryAuthApi::new();
            dev_seed::seed(&auth_api).await?;
            Arc::new(auth_api)
        }
    };

    let storage: Arc<dyn SessionStorage> = match &config.session_store {
        SessionStoreConfig::Memory => Arc::new(InMemorySessionStorage::new()),
        SessionStoreConfig::File(path) => Arc::new(FileSessionStorage::new(path.clone())),
        SessionStoreConfig::Redis { url, key_prefix } => {
            let client = redis::Client::open(url.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL: {error}"))
            })?;
            Arc::new(RedisSessionStorage::new(client, key_prefix.clone()))
        }
    };

    let response_cache = Arc::new(InMemoryResponseCache::new());
    let navigator = Arc::new(HistoryNavigator::new());
    let session = Arc::new(SessionStore::new(
        auth_api,
        storage,
        response_cache.clone(),
        navigator.clone(),
    ));

    let authorization = AuthorizationService::new(session.subscribe());
    let guards = RouteGuards::new(
        authorization.clone(),
        Arc::new(RouteTable::default_routes()),
        navigator.clone(),
        config.guard_policy,
    );
    let api_client = ApiClient::new(
        transport,
        session.clone(),
        LoadingTracker::new(config.loading_debounce),
        navigator.clone(),
        Arc::new(TracingNotifier::new()),
        response_cache,
    );

    info!(
        api_url = %config.api_url,
        auth_backend = ?config.auth_backend,
        session_store = ?config.session_store,
        "console services ready"
    );

    Ok(ConsoleServices {
        session,
        authorization,
        guards,
        api_client,
        navigator,
    })
}
