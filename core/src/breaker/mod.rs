//! Per-service circuit breaking around unreliable upstream generators.
//!
//! A breaker fails fast once a service has failed `failure_threshold`
//! times in a row, then allows a single half-open trial after the cooldown.
//! The breaker only decides whether to attempt the call; the operation's
//! own error always propagates to the caller.

pub mod registry;

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::BreakerConfig;
use crate::error::{GenError, Result};

pub use registry::BreakerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Callback invoked on every state transition, for logging/telemetry.
pub type StateObserver = std::sync::Arc<dyn Fn(&str, BreakerState, BreakerState) + Send + Sync>;

pub struct CircuitBreaker {
    service: String,
    config: BreakerConfig,
    observer: Option<StateObserver>,
    inner: Mutex<BreakerInner>,
}

struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    next_attempt: Instant,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_observer(service, config, None)
    }

    pub fn with_observer(
        service: impl Into<String>,
        config: BreakerConfig,
        observer: Option<StateObserver>,
    ) -> Self {
        Self {
            service: service.into(),
            config,
            observer,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                next_attempt: Instant::now(),
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().expect("breaker lock poisoned").failure_count
    }

    /// Run `op` through the breaker.
    ///
    /// While open and inside the cooldown this rejects with
    /// [`GenError::CircuitOpen`] without invoking `op`. Once the cooldown
    /// elapses the next call becomes the half-open trial that decides
    /// whether the breaker closes again.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.before_call()?;

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    fn before_call(&self) -> Result<()> {
        let transition = {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            match inner.state {
                BreakerState::Closed | BreakerState::HalfOpen => None,
                BreakerState::Open => {
                    let now = Instant::now();
                    if now < inner.next_attempt {
                        let retry_after_ms =
                            inner.next_attempt.duration_since(now).as_millis() as u64;
                        return Err(GenError::CircuitOpen {
                            service: self.service.clone(),
                            retry_after_ms,
                        });
                    }
                    let from = inner.state;
                    inner.state = BreakerState::HalfOpen;
                    Some((from, BreakerState::HalfOpen))
                }
            }
        };
        self.notify(transition);
        Ok(())
    }

    fn record_success(&self) {
        let transition = {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            inner.failure_count = 0;
            if inner.state != BreakerState::Closed {
                let from = inner.state;
                inner.state = BreakerState::Closed;
                Some((from, BreakerState::Closed))
            } else {
                None
            }
        };
        self.notify(transition);
    }

    fn record_failure(&self) {
        let transition = {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            inner.failure_count += 1;
            let should_open = inner.state == BreakerState::HalfOpen
                || (inner.state == BreakerState::Closed
                    && inner.failure_count >= self.config.failure_threshold);
            if should_open {
                let from = inner.state;
                inner.state = BreakerState::Open;
                inner.next_attempt =
                    Instant::now() + Duration::from_millis(self.config.reset_timeout_ms);
                Some((from, BreakerState::Open))
            } else {
                None
            }
        };
        self.notify(transition);
    }

    // Observer runs outside the lock; it may call back into the breaker.
    fn notify(&self, transition: Option<(BreakerState, BreakerState)>) {
        if let Some((from, to)) = transition {
            tracing::info!(
                target: "genflow.breaker",
                service = %self.service,
                from = from.as_str(),
                to = to.as_str(),
                "circuit breaker state change"
            );
            if let Some(observer) = &self.observer {
                observer(&self.service, from, to);
            }
        }
    }
}
