//! Named collection of breakers, one per protected resource.

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::breaker::CircuitBreaker;
use crate::config::BreakerBuilder;
use crate::error::ConfigError;

/// Hands out one shared [`CircuitBreaker`] per resource name.
///
/// Every breaker is built from the same template, so they share a clock,
/// metric sink and hooks but keep independent health records. The registry
/// is an ordinary value: create it where the resources are wired up and
/// pass it (or the breakers it returns) to the call sites.
pub struct BreakerRegistry {
    template: BreakerBuilder,
    breakers: RwLock<AHashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Creates a registry after validating the template.
    pub fn new(template: BreakerBuilder) -> Result<Self, ConfigError> {
        if template.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        Ok(Self {
            template,
            breakers: RwLock::new(AHashMap::new()),
        })
    }

    /// Returns the breaker for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        breakers
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!(breaker = name, "registering circuit breaker");
                CircuitBreaker::from_builder(self.template.clone().name(name))
            })
            .clone()
    }

    /// Returns the breaker for `name` if one exists.
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(name).cloned()
    }

    /// Removes and returns the breaker for `name`.
    ///
    /// Clones already handed out keep working but are no longer tracked.
    pub fn remove(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.write().remove(name)
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Returns true if no breaker has been registered.
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Registered resource names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("template", &self.template)
            .field("names", &self.names())
            .finish()
    }
}
