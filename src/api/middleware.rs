//! Security middleware: API key authentication, rate limiting and role checks.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use super::error::AppError;
use crate::models::Role;

/// Header carrying the caller's persisted role.
pub const ROLE_HEADER: &str = "x-educonnect-role";

/// Roles allowed to edit curriculum and grade submissions.
pub const STAFF: &[Role] = &[Role::Teacher, Role::Admin];
/// Roles allowed to manage users and run the curriculum import.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
/// Roles allowed to hand in work.
pub const ANY_ROLE: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    /// API key for authentication (from EDUCONNECT_API_KEY)
    pub api_key: Option<String>,
    /// Allowed CORS origins (from EDUCONNECT_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
    /// Rate limiter instance
    pub rate_limiter: Option<RateLimiter>,
    /// Check the role header on mutating routes (from EDUCONNECT_ENFORCE_ROLES)
    pub enforce_roles: bool,
}

impl SecurityConfig {
    /// Load security configuration from environment variables.
    pub fn from_env() -> Self {
        let api_key = std::env::var("EDUCONNECT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let cors_origins = std::env::var("EDUCONNECT_CORS_ORIGINS").ok().map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let rate_limit = std::env::var("EDUCONNECT_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(100); // Default: 100 requests per minute

        let trust_proxy = std::env::var("EDUCONNECT_TRUST_PROXY")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        // Rate limiting only applies to keyed (remote) deployments
        let rate_limiter = api_key.as_ref().map(|_| {
            let limiter = RateLimiter::new(rate_limit, Duration::from_secs(60));
            if trust_proxy {
                limiter.trusting_proxy()
            } else {
                limiter
            }
        });

        let enforce_roles = std::env::var("EDUCONNECT_ENFORCE_ROLES")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Self {
            api_key,
            cors_origins,
            rate_limiter,
            enforce_roles,
        }
    }

    /// Create a config with every check turned off (for local development/testing).
    pub fn disabled() -> Self {
        Self {
            api_key: None,
            cors_origins: None,
            rate_limiter: None,
            enforce_roles: false,
        }
    }

    /// Create a config with authentication enabled (for testing).
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::disabled()
        }
    }

    /// Create a config with specific CORS origins.
    pub fn with_cors_origins(origins: Vec<String>) -> Self {
        Self {
            cors_origins: Some(origins),
            ..Self::disabled()
        }
    }

    /// Create a config with rate limiting enabled.
    pub fn with_rate_limit(max_requests: u32) -> Self {
        Self {
            rate_limiter: Some(RateLimiter::new(max_requests, Duration::from_secs(60))),
            ..Self::disabled()
        }
    }

    /// Turn on role checks for mutating routes.
    pub fn enforcing_roles(mut self) -> Self {
        self.enforce_roles = true;
        self
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Simple in-memory rate limiter using sliding window.
///
/// Clients are keyed by their socket address. Forwarding headers are only
/// read when the limiter sits behind a trusted proxy.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Maximum requests allowed per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
    /// Read X-Forwarded-For / X-Real-IP (from EDUCONNECT_TRUST_PROXY)
    trust_proxy: bool,
    state: Arc<Mutex<LimiterState>>,
}

#[derive(Debug)]
struct LimiterState {
    /// Request timestamps per IP
    requests: HashMap<IpAddr, Vec<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trust_proxy: false,
            state: Arc::new(Mutex::new(LimiterState {
                requests: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Take the client address from forwarding headers set by a proxy.
    pub fn trusting_proxy(mut self) -> Self {
        self.trust_proxy = true;
        self
    }

    /// Returns true if a request from the given IP is allowed.
    ///
    /// Idle IPs are swept at most once per window.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if now.duration_since(state.last_sweep) >= self.window {
            sweep(&mut state.requests, now, self.window);
            state.last_sweep = now;
        }
        let entry = state.requests.entry(ip).or_default();

        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() < self.max_requests as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    /// Drops IPs with no requests inside the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        sweep(&mut state.requests, now, self.window);
        state.last_sweep = now;
    }

    #[cfg(test)]
    fn tracked_ips(&self) -> usize {
        self.state.lock().map(|s| s.requests.len()).unwrap_or(0)
    }
}

fn sweep(requests: &mut HashMap<IpAddr, Vec<Instant>>, now: Instant, window: Duration) {
    requests.retain(|_, timestamps| {
        timestamps.retain(|&t| now.duration_since(t) < window);
        !timestamps.is_empty()
    });
}

/// Authentication middleware that checks for valid API key.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let expected_key = match &config.api_key {
        Some(key) => key,
        None => return Ok(next.run(request).await),
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.map(|h| h.strip_prefix("Bearer ")) {
        Some(Some(token)) if token == expected_key => Ok(next.run(request).await),
        Some(Some(_)) => {
            tracing::warn!("Invalid API key provided");
            Err(AppError::Unauthorized)
        }
        Some(None) => {
            tracing::warn!("Invalid Authorization header format");
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("Missing Authorization header");
            Err(AppError::Unauthorized)
        }
    }
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let ip = extract_client_ip(&request, rate_limiter.trust_proxy);

    if rate_limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        Err(AppError::RateLimited)
    }
}

/// Roles a single route accepts.
#[derive(Clone, Copy, Debug)]
pub struct RoleGuard {
    allowed: &'static [Role],
    enforce: bool,
}

impl RoleGuard {
    pub fn new(allowed: &'static [Role], enforce: bool) -> Self {
        Self { allowed, enforce }
    }

    /// Checks the raw header value against the allowed roles.
    pub fn check(&self, header: Option<&str>) -> Result<(), AppError> {
        if !self.enforce {
            return Ok(());
        }

        let Some(raw) = header else {
            return Err(AppError::Forbidden(
                "Missing X-EduConnect-Role header".to_string(),
            ));
        };

        match Role::from_str(raw) {
            Some(role) if self.allowed.contains(&role) => Ok(()),
            Some(role) => Err(AppError::Forbidden(format!(
                "Role {} is not allowed to perform this action",
                role.as_str()
            ))),
            None => Err(AppError::Forbidden(format!("Unknown role: {}", raw.trim()))),
        }
    }
}

/// Rejects requests whose role header is missing or not allowed.
pub async fn require_role(
    State(guard): State<RoleGuard>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(ROLE_HEADER)
        .and_then(|h| h.to_str().ok());

    if let Err(e) = guard.check(header) {
        tracing::warn!("{} {} denied: {}", request.method(), request.uri().path(), e);
        return Err(e);
    }

    Ok(next.run(request).await)
}

/// Extract client IP from request.
///
/// Uses the peer address from `ConnectInfo` unless the deployment trusts a
/// proxy. Requests served without connect info count as localhost.
fn extract_client_ip(request: &Request<Body>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn forwarded_ip(request: &Request<Body>) -> Option<IpAddr> {
    // Proxied requests carry the client first in X-Forwarded-For
    let forwarded = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_limiter_allows_requests_under_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check(ip));
        }
    }

    #[test]
    fn rate_limiter_blocks_requests_over_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));

        assert!(!limiter.check(ip));
    }

    #[test]
    fn rate_limiter_tracks_ips_independently() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip1: IpAddr = "192.168.1.1".parse().unwrap();
        let ip2: IpAddr = "192.168.1.2".parse().unwrap();

        assert!(limiter.check(ip1));
        assert!(limiter.check(ip1));
        assert!(!limiter.check(ip1));

        assert!(limiter.check(ip2));
        assert!(limiter.check(ip2));
        assert!(!limiter.check(ip2));
    }

    #[test]
    fn rate_limiter_cleanup_forgets_idle_ips() {
        let limiter = RateLimiter::new(2, Duration::from_millis(1));
        limiter.check("10.0.0.1".parse().unwrap());
        std::thread::sleep(Duration::from_millis(5));

        limiter.cleanup();

        assert_eq!(limiter.tracked_ips(), 0);
    }

    #[test]
    fn rate_limiter_sweeps_idle_ips_on_check() {
        let limiter = RateLimiter::new(2, Duration::from_millis(1));
        for i in 0..10u8 {
            limiter.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)));
        }
        std::thread::sleep(Duration::from_millis(5));

        limiter.check("10.0.1.1".parse().unwrap());

        assert_eq!(limiter.tracked_ips(), 1);
    }

    fn request_from(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/subjects");
        if let Some(value) = forwarded_for {
            builder = builder.header("X-Forwarded-For", value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn client_ip_ignores_forwarding_headers_by_default() {
        let request = request_from("203.0.113.7:51000", Some("198.51.100.1"));
        assert_eq!(
            extract_client_ip(&request, false),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn client_ip_reads_forwarding_headers_behind_proxy() {
        let request = request_from("10.0.0.2:51000", Some("198.51.100.1, 10.0.0.2"));
        assert_eq!(
            extract_client_ip(&request, true),
            "198.51.100.1".parse::<IpAddr>().unwrap()
        );

        let request = request_from("10.0.0.2:51000", None);
        assert_eq!(
            extract_client_ip(&request, true),
            "10.0.0.2".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn security_config_disabled_has_no_checks() {
        let config = SecurityConfig::disabled();
        assert!(config.api_key.is_none());
        assert!(config.cors_origins.is_none());
        assert!(config.rate_limiter.is_none());
        assert!(!config.enforce_roles);
    }

    #[test]
    fn security_config_with_api_key_has_auth() {
        let config = SecurityConfig::with_api_key("test-key");
        assert_eq!(config.api_key, Some("test-key".to_string()));
        assert!(config.enforcing_roles().enforce_roles);
    }

    #[test]
    fn role_flag_accepts_common_false_values() {
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" Off "));
        assert!(!parse_flag("0"));
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
    }

    #[test]
    fn role_guard_checks_header() {
        let guard = RoleGuard::new(STAFF, true);
        assert!(guard.check(Some("teacher")).is_ok());
        assert!(guard.check(Some("Admin")).is_ok());
        assert!(matches!(guard.check(Some("student")), Err(AppError::Forbidden(_))));
        assert!(matches!(guard.check(Some("principal")), Err(AppError::Forbidden(_))));
        assert!(matches!(guard.check(None), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn role_guard_allows_everything_when_not_enforced() {
        let guard = RoleGuard::new(ADMIN_ONLY, false);
        assert!(guard.check(None).is_ok());
        assert!(guard.check(Some("student")).is_ok());
    }
}
