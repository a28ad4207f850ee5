use crate::config::{ProviderKind, ServerConfig};
use dashmap::DashMap;
use facegate::{FaceProvider, InMemoryProvider};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Map size above which expired client windows are swept, at most once per
/// window.
const RATE_LIMIT_SWEEP_THRESHOLD: usize = 10_000;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Face provider, built once at startup
    pub provider: Arc<dyn FaceProvider>,

    /// Rate limit tracking: client key -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, Instant)>>,

    last_sweep: Arc<Mutex<Instant>>,
}

/// Result of a rate-limit check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

impl ServerState {
    /// Create new server state with the provider named in the configuration
    pub async fn new(config: ServerConfig) -> Self {
        let provider: Arc<dyn FaceProvider> = match config.provider {
            ProviderKind::Rekognition => Arc::new(
                facegate::RekognitionProvider::from_region(config.aws_region.clone()).await,
            ),
            ProviderKind::Memory => {
                tracing::warn!("using in-memory face provider; enrolled faces are not persisted");
                Arc::new(InMemoryProvider::new())
            }
        };
        Self::with_provider(config, provider)
    }

    /// Create server state around an already-built provider
    pub fn with_provider(config: ServerConfig, provider: Arc<dyn FaceProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            rate_limiter: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Collection named by the request, or the configured default when the
    /// request left it out or sent a blank string. A named collection is
    /// passed on exactly as sent.
    pub fn collection_id<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(id) if !id.trim().is_empty() => id,
            _ => &self.config.collection_id,
        }
    }

    /// Check and count one request against the client's fixed window
    pub fn check_rate_limit(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let window = self.config.rate_limit_window();
        let limit = self.config.rate_limit_per_minute;

        if self.rate_limiter.len() > RATE_LIMIT_SWEEP_THRESHOLD {
            self.sweep_expired(now, window);
        }

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        // Reset if window has passed
        if now.duration_since(*window_start) >= window {
            *count = 0;
            *window_start = now;
        }

        let reset_after = window.saturating_sub(now.duration_since(*window_start));

        if *count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_after,
            };
        }

        *count += 1;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - *count,
            reset_after,
        }
    }

    /// Drop expired windows unless another request swept within the last
    /// window (or is sweeping now).
    fn sweep_expired(&self, now: Instant, window: Duration) {
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < window {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);

        let before = self.rate_limiter.len();
        self.rate_limiter
            .retain(|_, (_, start)| now.duration_since(*start) < window);
        tracing::debug!(
            before,
            after = self.rate_limiter.len(),
            "swept expired rate-limit windows"
        );
    }
}
