//! Sliding-window limiter for login attempts, keyed by client address.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::AppError;
use crate::handlers::http::AppState;

const LOGIN_MAX_ATTEMPTS: usize = 5;
const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);
const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
/// Past this many tracked clients, idle entries are swept before a new one is added.
const SWEEP_THRESHOLD: usize = 10_000;
/// New clients share this bucket while the map is full of active entries.
const OVERFLOW_KEY: &str = "overflow";

#[derive(Clone)]
pub struct LoginLimiter {
    max_attempts: usize,
    window: Duration,
    max_clients: usize,
    trust_forwarded_for: bool,
    attempts: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl Default for LoginLimiter {
    fn default() -> Self {
        Self::new(LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW)
    }
}

impl LoginLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            max_clients: SWEEP_THRESHOLD,
            trust_forwarded_for: false,
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Key clients by the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    #[cfg(test)]
    fn max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.attempts.lock().await.len()
    }

    /// Record an attempt for `client`; `false` once the window is full.
    pub async fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut attempts = self.attempts.lock().await;

        let mut key = client;
        if !attempts.contains_key(key) && attempts.len() >= self.max_clients {
            let window = self.window;
            attempts.retain(|_, q| q.back().is_some_and(|t| now.duration_since(*t) < window));
            if attempts.len() >= self.max_clients {
                key = OVERFLOW_KEY;
            }
        }

        let queue = attempts.entry(key.to_string()).or_default();
        while let Some(ts) = queue.front() {
            if now.duration_since(*ts) >= self.window {
                queue.pop_front();
            } else {
                break;
            }
        }

        if queue.len() >= self.max_attempts {
            return false;
        }
        queue.push_back(now);
        true
    }
}

/// Peer IP, else one shared bucket. The first `X-Forwarded-For` hop wins
/// only when the proxy is trusted.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(HEADER_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for the login route.
pub async fn limit_login(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let limiter = state.login_limiter();
    let client = client_key(&request, limiter.trusts_forwarded_for());
    if !limiter.check(&client).await {
        debug!(client = %client, "login rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(request).await)
}
