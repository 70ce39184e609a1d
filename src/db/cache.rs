//! Tiered catalog cache.
//!
//! Pages are stored per fingerprint with a freshness class. The in-process
//! tier is authoritative for this process: `put` is visible to the next `get`
//! immediately and entries are replaced whole, never mutated. When a shared
//! Redis tier is configured, puts are written through to it in the background
//! and local misses fall back to it; promoted entries keep their original
//! fetch time so freshness bounds hold across tiers.
//!
//! Entries live in a sharded map, so reads of different fingerprints never
//! contend. Capacity bookkeeping uses append-only queues with lazy deletion:
//! every queue record carries the tick it was written at and is skipped once
//! its slot has moved on. Eviction is amortized O(1).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;

use crate::{
    db::redis::{CacheKey, SharedTier},
    models::{Page, QueryMode},
    services::fingerprint::Fingerprint,
};

/// Freshness policy of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlClass {
    /// Fixed categories and search results, whose membership changes often
    Short,
    /// Discover listings and genre taxonomies
    Long,
}

impl TtlClass {
    /// Static mapping from query mode to freshness class
    pub fn for_mode(mode: &QueryMode) -> Self {
        match mode {
            QueryMode::Discover(_) | QueryMode::GenreList => TtlClass::Long,
            QueryMode::FixedCategory(_) | QueryMode::Search { .. } => TtlClass::Short,
        }
    }
}

/// Durations assigned to each TTL class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    short: Duration,
    long: Duration,
}

impl TtlPolicy {
    pub fn new(short: Duration, long: Duration) -> Self {
        Self { short, long }
    }

    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Short => self.short,
            TtlClass::Long => self.long,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(18_000))
    }
}

/// A fetched page and when it was fetched
#[derive(Debug)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub payload: Arc<Page>,
    pub ttl_class: TtlClass,
    /// Monotonic fetch time, used for freshness checks
    pub created_at: Instant,
    /// Wall-clock fetch time, shared with other processes
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, policy: &TtlPolicy, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) <= policy.ttl(self.ttl_class)
    }
}

/// Wire form of an entry in the shared tier
#[derive(Debug, Serialize, Deserialize)]
struct SharedEntry {
    payload: Page,
    ttl_class: TtlClass,
    fetched_at: DateTime<Utc>,
}

struct Slot {
    entry: Arc<CacheEntry>,
    /// Tick of the insert that created this slot
    generation: u64,
    /// Tick of the latest read or insert
    last_access: AtomicU64,
}

type Record = (Fingerprint, u64);

/// Queues backing capacity decisions, oldest record first
#[derive(Default)]
struct Order {
    /// One record per touch, keyed by the touch tick
    recency: VecDeque<Record>,
    /// One record per insert, keyed by generation. Entries of one class
    /// expire in insertion order.
    short: VecDeque<Record>,
    long: VecDeque<Record>,
}

impl Order {
    fn inserted(&mut self, class: TtlClass) -> &mut VecDeque<Record> {
        match class {
            TtlClass::Short => &mut self.short,
            TtlClass::Long => &mut self.long,
        }
    }
}

#[derive(Default)]
struct CacheStats {
    hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    upstream_fetches: AtomicU64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub upstream_fetches: u64,
}

/// Fingerprint-keyed page cache with per-class TTLs and a bounded size
pub struct TieredCache {
    slots: DashMap<Fingerprint, Slot>,
    order: Mutex<Order>,
    clock: AtomicU64,
    capacity: usize,
    policy: TtlPolicy,
    shared: Option<SharedTier>,
    stats: CacheStats,
}

impl TieredCache {
    /// Creates a process-local cache holding at most `capacity` pages
    pub fn new(capacity: usize, policy: TtlPolicy) -> Self {
        Self {
            slots: DashMap::new(),
            order: Mutex::new(Order::default()),
            clock: AtomicU64::new(0),
            capacity: capacity.max(1),
            policy,
            shared: None,
            stats: CacheStats::default(),
        }
    }

    /// Adds a shared tier consulted on local misses
    pub fn with_shared_tier(mut self, shared: SharedTier) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Returns the fresh entry for `fingerprint`, if any.
    ///
    /// Absent and expired entries are both reported as `None`.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<CacheEntry>> {
        if let Some(entry) = self.get_local(fingerprint) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %fingerprint, "Cache hit");
            return Some(entry);
        }

        if let Some(shared) = &self.shared {
            let key = CacheKey::Catalog(fingerprint.clone());
            match shared.get_from_cache::<SharedEntry>(&key).await {
                Ok(Some(stored)) => {
                    if let Some(entry) = self.promote(fingerprint, stored) {
                        self.stats.shared_hits.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(fingerprint = %fingerprint, "Shared cache hit");
                        return Some(entry);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, fingerprint = %fingerprint, "Shared cache read failed, treating as miss");
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(fingerprint = %fingerprint, "Cache miss");
        None
    }

    /// Fresh entry from the in-process tier only, without counting a hit or miss
    pub fn get_local(&self, fingerprint: &Fingerprint) -> Option<Arc<CacheEntry>> {
        let now = Instant::now();
        // The map guard must be released before touching `order`
        let (entry, stamp) = {
            let slot = self.slots.get(fingerprint)?;
            if slot.entry.is_fresh(&self.policy, now) {
                let tick = self.tick();
                slot.last_access.fetch_max(tick, Ordering::Relaxed);
                (Some(Arc::clone(&slot.entry)), tick)
            } else {
                (None, slot.generation)
            }
        };

        match entry {
            Some(entry) => {
                self.order
                    .lock()
                    .recency
                    .push_back((fingerprint.clone(), stamp));
                Some(entry)
            }
            None => {
                self.slots
                    .remove_if(fingerprint, |_, slot| slot.generation == stamp);
                None
            }
        }
    }

    /// Stores `payload` under `fingerprint`, replacing any prior entry
    pub fn put(&self, fingerprint: Fingerprint, payload: Arc<Page>, ttl_class: TtlClass) {
        let entry = Arc::new(CacheEntry {
            fingerprint,
            payload,
            ttl_class,
            created_at: Instant::now(),
            fetched_at: Utc::now(),
        });

        if let Some(shared) = &self.shared {
            let stored = SharedEntry {
                payload: entry.payload.as_ref().clone(),
                ttl_class,
                fetched_at: entry.fetched_at,
            };
            shared.set_in_background(
                &CacheKey::Catalog(entry.fingerprint.clone()),
                &stored,
                self.policy.ttl(ttl_class).as_secs().max(1),
            );
        }

        self.insert_local(entry);
    }

    /// Counts one call to the upstream provider
    pub fn record_upstream_fetch(&self) {
        self.stats.upstream_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops every local entry. The shared tier expires on its own.
    pub fn clear(&self) -> usize {
        let mut order = self.order.lock();
        let dropped = self.slots.len();
        self.slots.clear();
        *order = Order::default();
        tracing::info!(dropped, "Local cache cleared");
        dropped
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.stats.hits.load(Ordering::Relaxed),
            shared_hits: self.stats.shared_hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            upstream_fetches: self.stats.upstream_fetches.load(Ordering::Relaxed),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn promote(&self, fingerprint: &Fingerprint, stored: SharedEntry) -> Option<Arc<CacheEntry>> {
        let age = (Utc::now() - stored.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age > self.policy.ttl(stored.ttl_class) {
            return None;
        }

        let now = Instant::now();
        let entry = Arc::new(CacheEntry {
            fingerprint: fingerprint.clone(),
            payload: Arc::new(stored.payload),
            ttl_class: stored.ttl_class,
            created_at: now.checked_sub(age).unwrap_or(now),
            fetched_at: stored.fetched_at,
        });
        self.insert_local(Arc::clone(&entry));
        Some(entry)
    }

    fn insert_local(&self, entry: Arc<CacheEntry>) {
        // Inserts are serialized so the capacity check cannot race
        let mut order = self.order.lock();
        let generation = self.tick();
        let fingerprint = entry.fingerprint.clone();
        let class = entry.ttl_class;

        if !self.slots.contains_key(&fingerprint) && self.slots.len() >= self.capacity {
            let evicted = self.make_room(&mut order, Instant::now());
            self.stats
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::debug!(evicted, capacity = self.capacity, "Cache at capacity");
        }

        self.slots.insert(
            fingerprint.clone(),
            Slot {
                entry,
                generation,
                last_access: AtomicU64::new(generation),
            },
        );
        order.recency.push_back((fingerprint.clone(), generation));
        order.inserted(class).push_back((fingerprint, generation));

        self.compact(&mut order);
    }

    /// Purges expired entries, then evicts least recently used ones until
    /// there is room for one more
    fn make_room(&self, order: &mut Order, now: Instant) -> usize {
        let mut evicted = 0;

        for class in [TtlClass::Short, TtlClass::Long] {
            let queue = order.inserted(class);
            while let Some((fingerprint, generation)) = queue.front().cloned() {
                let fresh = self
                    .slots
                    .get(&fingerprint)
                    .filter(|slot| slot.generation == generation)
                    .map(|slot| slot.entry.is_fresh(&self.policy, now));
                match fresh {
                    Some(true) => break,
                    Some(false) => {
                        if self
                            .slots
                            .remove_if(&fingerprint, |_, slot| slot.generation == generation)
                            .is_some()
                        {
                            evicted += 1;
                        }
                    }
                    None => {}
                }
                queue.pop_front();
            }
        }

        while self.slots.len() >= self.capacity {
            let Some((fingerprint, tick)) = order.recency.pop_front() else {
                break;
            };
            if self
                .slots
                .remove_if(&fingerprint, |_, slot| {
                    slot.last_access.load(Ordering::Relaxed) == tick
                })
                .is_some()
            {
                evicted += 1;
            }
        }

        evicted
    }

    /// Drops stale records once the queues outgrow the live entries
    fn compact(&self, order: &mut Order) {
        let limit = self.capacity.saturating_mul(4).max(64);
        if order.recency.len() > limit {
            order.recency.retain(|(fingerprint, tick)| {
                self.slots
                    .get(fingerprint)
                    .is_some_and(|slot| slot.last_access.load(Ordering::Relaxed) == *tick)
            });
        }
        for class in [TtlClass::Short, TtlClass::Long] {
            let queue = order.inserted(class);
            if queue.len() > limit {
                queue.retain(|(fingerprint, generation)| {
                    self.slots
                        .get(fingerprint)
                        .is_some_and(|slot| slot.generation == *generation)
                });
            }
        }
    }
}
