//! Collapses concurrent identical upstream fetches.
//!
//! The first caller for a fingerprint spawns the producer as its own task and
//! registers a shared handle to its outcome. Callers arriving while it runs
//! await the same handle instead of producing again. The producer task owns
//! its completion: it runs to the end even if every caller goes away, then
//! removes the in-flight marker before any waiter observes the outcome.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{error::FetchError, models::Page, services::fingerprint::Fingerprint};

pub type FetchOutcome = Result<Arc<Page>, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct InFlight {
    outcome: SharedFetch,
    waiters: Arc<AtomicUsize>,
}

type Registry = Arc<Mutex<HashMap<Fingerprint, InFlight>>>;

/// Removes the in-flight marker when the producer task finishes, panics
/// or is aborted
struct Deregister {
    registry: Registry,
    fingerprint: Fingerprint,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        // Blocks until the spawning caller has registered the marker
        self.registry.lock().remove(&self.fingerprint);
    }
}

/// Registry of outstanding fetches, keyed by fingerprint
#[derive(Clone, Default)]
pub struct RequestCollapser {
    in_flight: Registry,
}

impl RequestCollapser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` unless a fetch for `fingerprint` is already outstanding,
    /// in which case the outstanding fetch's outcome is awaited instead.
    pub async fn run<F, Fut>(&self, fingerprint: &Fingerprint, producer: F) -> FetchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let outcome = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(fingerprint) {
                Some(pending) => {
                    let joined = pending.waiters.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::debug!(fingerprint = %fingerprint, waiters = joined, "Joined in-flight fetch");
                    pending.outcome.clone()
                }
                None => {
                    let outcome = self.spawn_producer(fingerprint.clone(), producer());
                    in_flight.insert(
                        fingerprint.clone(),
                        InFlight {
                            outcome: outcome.clone(),
                            waiters: Arc::new(AtomicUsize::new(1)),
                        },
                    );
                    outcome
                }
            }
        };

        outcome.await
    }

    fn spawn_producer<Fut>(&self, fingerprint: Fingerprint, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let marker = Deregister {
            registry: Arc::clone(&self.in_flight),
            fingerprint,
        };
        let task = tokio::spawn(async move {
            let outcome = fetch.await;
            drop(marker);
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Catalog fetch task failed");
                Err(FetchError::UpstreamUnavailable(format!(
                    "catalog fetch task failed: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared()
    }

    /// Callers currently attached to the outstanding fetch for `fingerprint`
    pub fn waiters(&self, fingerprint: &Fingerprint) -> usize {
        self.in_flight
            .lock()
            .get(fingerprint)
            .map(|pending| pending.waiters.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Number of fingerprints with an outstanding fetch
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
