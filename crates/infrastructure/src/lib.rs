//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod file_session_storage;
mod history_navigator;
mod http_auth_api;
mod in_memory_auth_api;
mod in_memory_response_cache;
mod in_memory_session_storage;
mod redis_session_storage;
mod reqwest_http_transport;
mod tracing_notifier;

pub use file_session_storage::FileSessionStorage;
pub use history_navigator::HistoryNavigator;
pub use http_auth_api::HttpAuthApi;
pub use in_memory_auth_api::{DEFAULT_TOKEN_TTL_SECONDS, InMemoryAuthApi, member_permissions};
pub use in_memory_response_cache::InMemoryResponseCache;
pub use in_memory_session_storage::InMemorySessionStorage;
pub use redis_session_storage::RedisSessionStorage;
pub use reqwest_http_transport::ReqwestHttpTransport;
pub use tracing_notifier::TracingNotifier;
