//! Explicitly constructed breaker registry.
//!
//! One breaker per named upstream service, created lazily and cached for
//! the life of the registry. The registry is an owned object handed to the
//! orchestrator rather than ambient global state, so tests get isolated
//! registries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::BreakerConfig;

use super::{CircuitBreaker, StateObserver};

#[derive(Clone)]
pub struct BreakerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: BreakerConfig,
    observer: Option<StateObserver>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_observer(config, None)
    }

    pub fn with_observer(config: BreakerConfig, observer: Option<StateObserver>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config,
                observer,
                breakers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Breaker for a named service, created on first use.
    pub fn for_service(&self, service: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.inner.breakers.read().expect("registry lock poisoned");
            if let Some(breaker) = breakers.get(service) {
                return breaker.clone();
            }
        }

        let mut breakers = self.inner.breakers.write().expect("registry lock poisoned");
        breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_observer(
                    service,
                    self.inner.config,
                    self.inner.observer.clone(),
                ))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .breakers
            .read()
            .expect("registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
