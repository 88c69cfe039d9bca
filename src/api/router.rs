//! HTTP routing configuration with optional per-IP rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use governor::{Quota, RateLimiter};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, warn};

use crate::app::AppState;
use crate::domain::{AppError, ErrorDetail, RateLimitResponse};

use super::handlers::{
    add_book_handler, borrow_book_handler, create_user_handler, get_book_handler,
    get_user_handler, health_check_handler, list_books_handler, list_users_handler,
    liveness_handler, metrics_handler, readiness_handler, return_book_handler,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for /api endpoints
    pub api_rps: u32,
    /// Burst size for /api endpoints
    pub api_burst: u32,
    /// Requests per second for health endpoints
    pub health_rps: u32,
    /// Burst size for health endpoints
    pub health_burst: u32,
    /// Key clients by X-Forwarded-For / X-Real-IP. Enable only behind a proxy
    /// that overwrites these headers, otherwise clients can pick their bucket.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            api_rps: 10,
            api_burst: 20,
            health_rps: 100,
            health_burst: 100,
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Config with the given /api quota and the default health quota.
    #[must_use]
    pub fn new(api_rps: u32, api_burst: u32) -> Self {
        Self {
            api_rps,
            api_burst,
            ..Self::default()
        }
    }
}

type KeyedLimiter = RateLimiter<
    IpAddr,
    governor::state::keyed::DashMapStateStore<IpAddr>,
    governor::clock::DefaultClock,
>;

/// Shared rate limiter state, keyed by client IP.
pub struct RateLimitState {
    api_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
}

impl RateLimitState {
    /// Zero quotas are clamped to one request.
    pub fn new(config: RateLimitConfig) -> Self {
        let api_quota = Quota::per_second(non_zero(config.api_rps))
            .allow_burst(non_zero(config.api_burst));
        let health_quota = Quota::per_second(non_zero(config.health_rps))
            .allow_burst(non_zero(config.health_burst));

        Self {
            api_limiter: RateLimiter::dashmap(api_quota),
            health_limiter: RateLimiter::dashmap(health_quota),
            config,
        }
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Extract client IP from the peer address, or from X-Forwarded-For / X-Real-IP
/// first when `trust_proxy` is set. Unknown clients share the 0.0.0.0 bucket.
fn client_ip_from_request<B>(request: &Request<B>, trust_proxy: bool) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    };
    let peer_ip = || {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    let forwarded = if trust_proxy {
        header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
    } else {
        None
    };

    forwarded
        .or_else(peer_ip)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn retry_after_secs(not_until: &governor::NotUntil<governor::clock::QuantaInstant>) -> u64 {
    not_until
        .wait_time_from(governor::clock::Clock::now(
            &governor::clock::DefaultClock::default(),
        ))
        .as_secs()
}

/// Rate limit middleware for /api endpoints
async fn rate_limit_api_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request, rate_limit.config.trust_proxy_headers);
    let limit = HeaderValue::from(rate_limit.config.api_rps);

    match rate_limit.api_limiter.check_key(&client_ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert("X-RateLimit-Limit", limit);
            response
        }
        Err(not_until) => {
            let retry_after = retry_after_secs(&not_until);
            warn!(%client_ip, retry_after, "Rate limit exceeded");

            let body = RateLimitResponse {
                error: ErrorDetail {
                    r#type: "rate_limited".to_string(),
                    message: "Rate limit exceeded. Please slow down your requests.".to_string(),
                    status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                },
                retry_after,
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit);
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Rate limit middleware for health endpoints
async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = client_ip_from_request(&request, rate_limit.config.trust_proxy_headers);
    match rate_limit.health_limiter.check_key(&client_ip) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let retry_after = retry_after_secs(&not_until);
            warn!(%client_ip, retry_after, "Health rate limit exceeded");

            let mut response = AppError::RateLimited.into_response();
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(list_books_handler).post(add_book_handler))
        .route("/books/borrow", post(borrow_book_handler))
        .route("/books/return", post(return_book_handler))
        .route("/books/{id}", get(get_book_handler))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route("/users/{id}", get(get_user_handler))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check_handler))
        .route("/live", get(liveness_handler))
        .route("/ready", get(readiness_handler))
}

fn assemble(
    app_state: Arc<AppState>,
    api: Router<Arc<AppState>>,
    health: Router<Arc<AppState>>,
) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ));

    Router::new()
        .nest("/api", api)
        .nest("/health", health)
        .route("/metrics", get(metrics_handler))
        .layer(middleware)
        .with_state(app_state)
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    assemble(app_state, api_routes(), health_routes())
}

/// Create router with rate limiting enabled
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    let rate_limit_state = Arc::new(RateLimitState::new(config));

    let api = api_routes().layer(middleware::from_fn_with_state(
        Arc::clone(&rate_limit_state),
        rate_limit_api_middleware,
    ));
    let health = health_routes().layer(middleware::from_fn_with_state(
        rate_limit_state,
        rate_limit_health_middleware,
    ));

    assemble(app_state, api, health)
}
