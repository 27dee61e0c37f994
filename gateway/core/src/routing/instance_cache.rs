//! Engine Instance Cache
//!
//! Bounded map from model identifier to constructed engine handle.
//!
//! # Design
//!
//! Each identifier is in one of three states: absent, initializing, or
//! ready. An initializing slot holds a shared construction future; every
//! caller that arrives while construction is in flight awaits that same
//! future, so there is at most one construction per identifier at a time
//! and all waiters observe the same outcome.
//!
//! The slot map lock is held only to inspect or flip a slot, never across
//! construction, so different identifiers never wait on each other.
//!
//! Failed constructions are removed rather than cached; the next request for
//! that identifier starts a fresh attempt. There is no eviction: once
//! `capacity` slots are occupied, new identifiers are refused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{EngineError, EngineHandle, EngineProvider};
use crate::registry::ModelDescriptor;

/// Instance cache failure
#[derive(Clone, Debug, Error)]
pub enum CacheError {
    /// Every slot is occupied and the identifier is not among them
    #[error("instance cache is full ({capacity} engines)")]
    Exhausted {
        /// Configured ceiling
        capacity: usize,
    },

    /// Engine construction failed; shared by every waiter of that attempt
    #[error("failed to construct engine for {model_id}: {source}")]
    Construction {
        /// Model whose engine failed
        model_id: String,
        /// Provider error
        #[source]
        source: Arc<EngineError>,
    },
}

type InitFuture = Shared<BoxFuture<'static, Result<EngineHandle, Arc<EngineError>>>>;

enum Slot {
    Ready(EngineHandle),
    Initializing { generation: u64, init: InitFuture },
}

/// Point-in-time cache statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Configured ceiling
    pub capacity: usize,
    /// Engines ready to serve
    pub resident: usize,
    /// Engines under construction
    pub initializing: usize,
    /// Construction attempts started
    pub constructions: u64,
    /// Construction attempts that failed
    pub construction_failures: u64,
    /// Lookups served by a ready engine
    pub hits: u64,
}

#[derive(Default)]
struct CacheCounters {
    constructions: AtomicU64,
    construction_failures: AtomicU64,
    hits: AtomicU64,
}

/// Bounded, single-flight engine cache
pub struct InstanceCache {
    provider: Arc<dyn EngineProvider>,
    capacity: usize,
    slots: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
    counters: CacheCounters,
}

impl InstanceCache {
    /// Create an empty cache that builds engines with `provider`
    pub fn new(provider: Arc<dyn EngineProvider>, capacity: usize) -> Self {
        Self {
            provider,
            capacity,
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            counters: CacheCounters::default(),
        }
    }

    /// Configured ceiling
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Provider name
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Return the engine for `descriptor`, constructing it on first use
    pub async fn get_or_create(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<EngineHandle, CacheError> {
        let (generation, init) = {
            let mut slots = self.slots.lock();
            match slots.get(&descriptor.id) {
                Some(Slot::Ready(handle)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(handle));
                }
                Some(Slot::Initializing { generation, init }) => (*generation, init.clone()),
                None => {
                    if slots.len() >= self.capacity {
                        return Err(CacheError::Exhausted {
                            capacity: self.capacity,
                        });
                    }
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let init = self.start_construction(descriptor);
                    slots.insert(
                        descriptor.id.clone(),
                        Slot::Initializing {
                            generation,
                            init: init.clone(),
                        },
                    );
                    (generation, init)
                }
            }
        };

        let outcome = init.await;
        self.settle(&descriptor.id, generation, &outcome);

        outcome.map_err(|source| CacheError::Construction {
            model_id: descriptor.id.clone(),
            source,
        })
    }

    fn start_construction(&self, descriptor: &ModelDescriptor) -> InitFuture {
        self.counters.constructions.fetch_add(1, Ordering::Relaxed);
        info!(
            model_id = %descriptor.id,
            provider = self.provider.name(),
            "Constructing engine"
        );

        let provider = Arc::clone(&self.provider);
        let descriptor = descriptor.clone();
        async move { provider.create(&descriptor).await.map_err(Arc::new) }
            .boxed()
            .shared()
    }

    /// Move an initializing slot to its final state
    ///
    /// Only the slot created by this construction attempt is touched; a
    /// later attempt for the same identifier has a different generation.
    fn settle(
        &self,
        model_id: &str,
        generation: u64,
        outcome: &Result<EngineHandle, Arc<EngineError>>,
    ) {
        let mut slots = self.slots.lock();
        let current = matches!(
            slots.get(model_id),
            Some(Slot::Initializing { generation: g, .. }) if *g == generation
        );
        if !current {
            return;
        }

        match outcome {
            Ok(handle) => {
                slots.insert(model_id.to_string(), Slot::Ready(Arc::clone(handle)));
                info!(model_id = %model_id, "Engine ready");
            }
            Err(e) => {
                slots.remove(model_id);
                self.counters
                    .construction_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(model_id = %model_id, error = %e, "Engine construction failed");
            }
        }
    }

    /// Whether a ready engine exists for `model_id`
    #[must_use]
    pub fn is_resident(&self, model_id: &str) -> bool {
        matches!(self.slots.lock().get(model_id), Some(Slot::Ready(_)))
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (resident, initializing) = {
            let slots = self.slots.lock();
            let resident = slots
                .values()
                .filter(|s| matches!(s, Slot::Ready(_)))
                .count();
            (resident, slots.len() - resident)
        };

        CacheStats {
            capacity: self.capacity,
            resident,
            initializing,
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            construction_failures: self.counters.construction_failures.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("provider", &self.provider.name())
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockEngine, MockProvider};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Provider that counts calls and fails the first `fail_first` of them
    struct FlakyProvider {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl EngineProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn create(&self, descriptor: &ModelDescriptor) -> Result<EngineHandle, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if call < self.fail_first {
                return Err(EngineError::Backend("weights unavailable".to_string()));
            }
            Ok(Arc::new(MockEngine::new(descriptor.id.clone())))
        }
    }

    fn flaky(fail_first: usize) -> Arc<FlakyProvider> {
        Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_first,
        })
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let cache = InstanceCache::new(Arc::new(MockProvider::new()), 4);
        let descriptor = ModelDescriptor::new("m1", "org/m1", 64);

        let first = cache.get_or_create(&descriptor).await.unwrap();
        let second = cache.get_or_create(&descriptor).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.constructions, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.resident, 1);
        assert!(cache.is_resident("m1"));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let provider = flaky(1);
        let cache = InstanceCache::new(provider.clone(), 4);
        let descriptor = ModelDescriptor::new("m1", "org/m1", 64);

        let err = cache.get_or_create(&descriptor).await.unwrap_err();
        assert!(matches!(err, CacheError::Construction { ref model_id, .. } if model_id == "m1"));
        assert!(!cache.is_resident("m1"));
        assert_eq!(cache.stats().resident + cache.stats().initializing, 0);

        assert!(cache.get_or_create(&descriptor).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().construction_failures, 1);
    }

    #[tokio::test]
    async fn test_capacity_refuses_new_identifiers() {
        let cache = InstanceCache::new(Arc::new(MockProvider::new()), 1);
        let m1 = ModelDescriptor::new("m1", "org/m1", 64);
        let m2 = ModelDescriptor::new("m2", "org/m2", 64);

        cache.get_or_create(&m1).await.unwrap();
        let err = cache.get_or_create(&m2).await.unwrap_err();
        assert!(matches!(err, CacheError::Exhausted { capacity: 1 }));

        // no eviction: the resident engine is still served
        assert!(cache.get_or_create(&m1).await.is_ok());
        assert!(cache.is_resident("m1"));
    }

    #[tokio::test]
    async fn test_failed_slot_frees_capacity() {
        let cache = InstanceCache::new(flaky(1), 1);
        let m1 = ModelDescriptor::new("m1", "org/m1", 64);
        let m2 = ModelDescriptor::new("m2", "org/m2", 64);

        assert!(cache.get_or_create(&m1).await.is_err());
        assert!(cache.get_or_create(&m2).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_strand_slot() {
        let provider = flaky(0);
        let cache = InstanceCache::new(provider.clone(), 4);
        let descriptor = ModelDescriptor::new("m1", "org/m1", 64);

        // abandon the first caller mid-construction
        let abandoned =
            tokio::time::timeout(Duration::from_millis(1), cache.get_or_create(&descriptor)).await;
        assert!(abandoned.is_err());

        assert!(cache.get_or_create(&descriptor).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
