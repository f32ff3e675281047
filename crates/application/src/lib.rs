//! Application services and ports.

#![forbid(unsafe_code)]

mod auth_ports;
mod authorization_service;
mod request_pipeline;
mod route_guard;
mod session_ports;
mod session_store;

#[cfg(test)]
mod test_support;

pub use auth_ports::{
    AuthApi, LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse,
    RegisterRequest, RegisterResponse, RoleDto, UserDto,
};
pub use authorization_service::{AuthorizationService, QueryObserver};
pub use request_pipeline::{
    AUTH_ENDPOINTS, ApiClient, ApiRequest, ApiResponse, DEFAULT_CACHE_TTL,
    DEFAULT_LOADING_DEBOUNCE, HttpTransport, LoadingGuard, LoadingTracker, translate_status,
};
pub use route_guard::{
    Denial, DenialReason, GuardDecision, MisconfiguredGuardPolicy, NavigationOutcome, RouteGuards,
};
pub use session_ports::{
    Navigator, Notification, NotificationSeverity, Notifier, ResponseCache, SessionStorage,
    StorageKey,
};
pub use session_store::{ActiveSession, SessionSnapshot, SessionStore};
