//! # Checkout Pool
//!
//! [`Pool`] maps a (repository, revision, variant) request to a working
//! directory under its base directory, reusing directories across requests
//! and bounding how many exist at once.
//!
//! ## Slot lifecycle
//!
//! ```text
//!   acquire (new key)          release (refcount -> 0)
//!  ------------------> CHECKED_OUT ---------------------> PENDING
//!                          ^                                 |
//!                          |  acquire before the deadline    |  deadline passes,
//!                          +---------------------------------+  reclaimed under
//!                                                            |  pressure, or
//!                                                            v  cleanup_all
//!                                                         EVICTED
//! ```
//!
//! ## Accounting
//!
//! One mutex guards all bookkeeping. Every capacity unit is in exactly one
//! place: `available`, a slot in the table, or `reserved` by an operation
//! that runs outside the lock (a backend call or a directory removal). While
//! such an operation runs, its key is marked in flight; other acquirers of
//! that key wait for it to settle rather than starting a second checkout of
//! the same directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use serde::Serialize;

use crate::backend::{CheckoutBackend, CheckoutRequest, GitBackend};
use crate::cleanup::{self, Eviction, EvictionQueue};
use crate::config::PoolConfig;
use crate::error::{Error, Result, UsageError};
use crate::key::{CheckoutKey, Variant};

/// Stale deadlines tolerated beyond twice the pending slots before the
/// queue is compacted.
const DEADLINE_SLACK: usize = 16;

/// A checked-out working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkout {
    key: CheckoutKey,
    path: PathBuf,
}

impl Checkout {
    pub fn key(&self) -> &CheckoutKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of [`Pool::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other holders remain.
    Referenced { refcount: usize },
    /// Last holder gone; eviction is scheduled after the grace period.
    Pending,
    /// The release did not match a checked-out slot. Pool state is unchanged.
    Ignored(UsageError),
}

/// Point-in-time counters, mostly for tests and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub checked_out: usize,
    pub pending: usize,
    pub materializing: usize,
    pub evicting: usize,
}

impl PoolStats {
    /// Directories that may exist on disk right now.
    pub fn on_disk(&self) -> usize {
        self.checked_out + self.pending + self.materializing + self.evicting
    }
}

#[derive(Debug)]
struct Slot {
    path: PathBuf,
    refcount: usize,
    state: SlotState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    CheckedOut,
    /// Waiting for eviction. The generation identifies this particular
    /// release so a stale deadline cannot evict a later one.
    Pending { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Materializing,
    Evicting,
}

/// Bookkeeping guarded by the pool mutex.
#[derive(Debug)]
pub(crate) struct PoolState {
    capacity: usize,
    available: usize,
    /// Units held by operations running outside the lock.
    reserved: usize,
    slots: HashMap<CheckoutKey, Slot>,
    in_flight: HashMap<CheckoutKey, InFlight>,
    deadlines: EvictionQueue,
    next_generation: u64,
    shutdown: bool,
}

impl PoolState {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: capacity,
            reserved: 0,
            slots: HashMap::new(),
            in_flight: HashMap::new(),
            deadlines: EvictionQueue::default(),
            next_generation: 0,
            shutdown: false,
        }
    }

    /// Takes another reference on an existing slot, cancelling a pending
    /// eviction.
    fn reuse(&mut self, key: &CheckoutKey) -> Option<PathBuf> {
        let slot = self.slots.get_mut(key)?;
        if let SlotState::Pending { .. } = slot.state {
            log::debug!("reactivating pending checkout {}", key.short());
            slot.state = SlotState::CheckedOut;
        }
        slot.refcount += 1;
        Some(slot.path.clone())
    }

    /// Reserves a unit for materializing `key`, reclaiming a pending slot if
    /// nothing is available. The reclaimed slot, if any, is returned so its
    /// directory can be removed before the new checkout starts.
    fn reserve(&mut self, key: CheckoutKey) -> Result<Option<Eviction>> {
        let victim = if self.available > 0 {
            self.available -= 1;
            None
        } else {
            // Any pending slot will do; there is no recency ordering.
            let victim_key = self
                .slots
                .iter()
                .find(|(_, slot)| matches!(slot.state, SlotState::Pending { .. }))
                .map(|(k, _)| *k)
                .ok_or(Error::Exhausted {
                    capacity: self.capacity,
                })?;
            let slot = self.slots.remove(&victim_key).ok_or(Error::Exhausted {
                capacity: self.capacity,
            })?;
            log::info!(
                "reclaiming pending checkout {} for {}",
                victim_key.short(),
                key.short()
            );
            self.in_flight.insert(victim_key, InFlight::Evicting);
            Some(Eviction {
                key: victim_key,
                path: slot.path,
            })
        };
        self.reserved += 1;
        self.in_flight.insert(key, InFlight::Materializing);
        Ok(victim)
    }

    fn release(&mut self, key: &CheckoutKey, grace: std::time::Duration) -> ReleaseOutcome {
        let Some(slot) = self.slots.get_mut(key) else {
            return ReleaseOutcome::Ignored(UsageError::UnknownKey {
                key: key.to_hex(),
            });
        };
        if slot.refcount == 0 {
            return ReleaseOutcome::Ignored(UsageError::NotCheckedOut { key: key.to_hex() });
        }

        slot.refcount -= 1;
        if slot.refcount > 0 {
            return ReleaseOutcome::Referenced {
                refcount: slot.refcount,
            };
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        slot.state = SlotState::Pending { generation };
        match Instant::now().checked_add(grace) {
            Some(at) => self.deadlines.arm(*key, generation, at),
            // Past the end of the clock: pending until reclaimed or cleaned up.
            None => log::debug!("grace period {:?} never expires", grace),
        }
        self.compact_deadlines();
        ReleaseOutcome::Pending
    }

    /// Drops deadlines armed for earlier releases once they outnumber the
    /// pending slots.
    fn compact_deadlines(&mut self) {
        let pending = self
            .slots
            .values()
            .filter(|s| matches!(s.state, SlotState::Pending { .. }))
            .count();
        if self.deadlines.len() <= 2 * pending + DEADLINE_SLACK {
            return;
        }
        let slots = &self.slots;
        self.deadlines.retain(|deadline| {
            slots.get(&deadline.key).is_some_and(|slot| {
                slot.state
                    == SlotState::Pending {
                        generation: deadline.generation,
                    }
            })
        });
    }

    /// Moves every slot whose deadline passed (and is still pending under
    /// the generation the deadline was armed for) out of the table.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<Eviction> {
        let mut evictions = Vec::new();
        for deadline in self.deadlines.pop_due(now) {
            let still_pending = self.slots.get(&deadline.key).is_some_and(|slot| {
                slot.state
                    == SlotState::Pending {
                        generation: deadline.generation,
                    }
            });
            if !still_pending {
                continue;
            }
            if let Some(slot) = self.slots.remove(&deadline.key) {
                self.begin_eviction(deadline.key, slot.path, &mut evictions);
            }
        }
        evictions
    }

    /// Moves every slot, checked out or not, out of the table.
    fn take_all(&mut self) -> Vec<Eviction> {
        let mut evictions = Vec::new();
        let slots: Vec<(CheckoutKey, Slot)> = self.slots.drain().collect();
        for (key, slot) in slots {
            self.begin_eviction(key, slot.path, &mut evictions);
        }
        self.deadlines.clear();
        evictions
    }

    fn begin_eviction(&mut self, key: CheckoutKey, path: PathBuf, out: &mut Vec<Eviction>) {
        self.reserved += 1;
        self.in_flight.insert(key, InFlight::Evicting);
        out.push(Eviction { key, path });
    }

    /// Returns the units of evictions whose directories are gone.
    pub(crate) fn finish_evictions(&mut self, evictions: &[Eviction]) {
        for eviction in evictions {
            self.in_flight.remove(&eviction.key);
            self.reserved -= 1;
            self.available += 1;
        }
    }

    /// Clears the in-flight marker of a reclaimed slot. Its unit moved to
    /// the reservation that reclaimed it.
    fn finish_reclaim(&mut self, victim: &Eviction) {
        self.in_flight.remove(&victim.key);
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.next_deadline()
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    fn stats(&self) -> PoolStats {
        let pending = self
            .slots
            .values()
            .filter(|s| matches!(s.state, SlotState::Pending { .. }))
            .count();
        let materializing = self
            .in_flight
            .values()
            .filter(|f| **f == InFlight::Materializing)
            .count();
        PoolStats {
            capacity: self.capacity,
            available: self.available,
            checked_out: self.slots.len() - pending,
            pending,
            materializing,
            evicting: self.in_flight.len() - materializing,
        }
    }

    #[cfg(test)]
    fn assert_conserved(&self) {
        assert_eq!(
            self.available + self.slots.len() + self.reserved,
            self.capacity,
            "capacity units leaked: {:?}",
            self.stats()
        );
        for key in self.in_flight.keys() {
            assert!(
                !self.slots.contains_key(key),
                "key both in flight and slotted"
            );
        }
    }
}

/// State shared between the pool handle and its reaper thread.
pub(crate) struct Shared {
    config: PoolConfig,
    backend: Box<dyn CheckoutBackend>,
    state: Mutex<PoolState>,
    /// Signalled whenever an in-flight operation settles.
    pub(crate) settled: Condvar,
    /// Signalled when a deadline is armed or the pool shuts down.
    pub(crate) reaper_wake: Condvar,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state.lock().map_err(|_| Error::LockPoisoned {
            context: "checkout pool state".to_string(),
        })
    }

    /// Locks the state, recovering from poisoning. Bookkeeping is never left
    /// half-updated across a panic point, so the data stays consistent.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A unit reserved for one materialization.
///
/// Dropping it without [`commit`](Reservation::commit) removes whatever the
/// backend left behind, returns the unit, and wakes waiters, which also
/// covers a backend that panics.
struct Reservation<'a> {
    shared: &'a Shared,
    key: CheckoutKey,
    path: PathBuf,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self) -> Checkout {
        let mut state = self.shared.lock_state();
        state.in_flight.remove(&self.key);
        state.reserved -= 1;
        state.slots.insert(
            self.key,
            Slot {
                path: self.path.clone(),
                refcount: 1,
                state: SlotState::CheckedOut,
            },
        );
        drop(state);
        self.committed = true;
        self.shared.settled.notify_all();
        Checkout {
            key: self.key,
            path: self.path.clone(),
        }
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        cleanup::remove_checkout_dir(&self.path);
        let mut state = self.shared.lock_state();
        state.in_flight.remove(&self.key);
        state.reserved -= 1;
        state.available += 1;
        drop(state);
        self.shared.settled.notify_all();
    }
}

/// A bounded pool of reusable checkouts.
///
/// Construct one per process and share it by reference; all methods take
/// `&self`. Dropping the pool stops its reaper thread but leaves directories
/// on disk; call [`shutdown`](Pool::shutdown) to remove them.
pub struct Pool {
    shared: Arc<Shared>,
    reaper: Option<JoinHandle<()>>,
}

impl Pool {
    /// Creates a pool that materializes checkouts with `backend`.
    ///
    /// The base directory is created if absent. With `purge_on_start`,
    /// checkout directories left by an earlier process are removed.
    pub fn new<B: CheckoutBackend + 'static>(config: PoolConfig, backend: B) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.base_dir)?;

        if config.purge_on_start {
            for (key, path) in cleanup::checkout_dirs(&config.base_dir)? {
                log::info!("removing leftover checkout {}", key.short());
                cleanup::remove_checkout_dir(&path);
            }
        }

        log::debug!(
            "checkout pool at {} (max {}, grace {:?})",
            config.base_dir.display(),
            config.max_checkouts,
            config.grace_period
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::new(config.max_checkouts)),
            config,
            backend: Box::new(backend),
            settled: Condvar::new(),
            reaper_wake: Condvar::new(),
        });
        let reaper = cleanup::spawn_reaper(Arc::clone(&shared))?;

        Ok(Self {
            shared,
            reaper: Some(reaper),
        })
    }

    /// Creates a pool backed by the system `git`.
    pub fn with_git(config: PoolConfig) -> Result<Self> {
        let backend = GitBackend::new(config.git.clone());
        Self::new(config, backend)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Where the checkout for `key` lives (whether or not it exists).
    pub fn path_for(&self, key: &CheckoutKey) -> PathBuf {
        self.shared.config.base_dir.join(key.to_hex())
    }

    /// Returns a working directory for the request.
    ///
    /// An existing checkout of the same key is shared (and rescued from
    /// pending eviction). Otherwise a unit is reserved, reclaiming a pending
    /// checkout of another key if none is free, and the backend runs without
    /// the pool lock held.
    ///
    /// # Errors
    ///
    /// - [`Error::Exhausted`] if every unit is held by a checked-out slot or
    ///   an in-progress operation. Returned immediately.
    /// - [`Error::CheckoutFailed`] if the backend fails. The unit has been
    ///   returned and no slot exists for the key.
    pub fn acquire(
        &self,
        repository: &str,
        revision: &str,
        variant: &Variant,
    ) -> Result<Checkout> {
        let key = CheckoutKey::derive(repository, revision, variant);
        let shared = &*self.shared;

        let mut state = shared.lock()?;
        let victim = loop {
            if let Some(path) = state.reuse(&key) {
                log::debug!(
                    "reusing checkout {} for {}@{}",
                    key.short(),
                    repository,
                    revision
                );
                return Ok(Checkout { key, path });
            }
            if !state.in_flight.contains_key(&key) {
                break state.reserve(key)?;
            }
            log::debug!("waiting for in-flight checkout {}", key.short());
            state = shared.settled.wait(state).map_err(|_| Error::LockPoisoned {
                context: "checkout pool state".to_string(),
            })?;
        };
        drop(state);

        let reservation = Reservation {
            shared,
            key,
            path: self.path_for(&key),
            committed: false,
        };

        if let Some(victim) = victim {
            cleanup::remove_checkout_dir(&victim.path);
            shared.lock_state().finish_reclaim(&victim);
            shared.settled.notify_all();
        }

        log::info!(
            "checking out {}@{} into {}",
            repository,
            revision,
            reservation.path.display()
        );
        let request = CheckoutRequest {
            repository,
            revision,
            variant,
        };
        match shared.backend.materialize(&request, &reservation.path) {
            Ok(()) => Ok(reservation.commit()),
            Err(e) => {
                drop(reservation);
                log::warn!("checkout of {}@{} failed: {}", repository, revision, e);
                Err(match e {
                    Error::CheckoutFailed { .. } => e,
                    other => Error::CheckoutFailed {
                        repository: repository.to_string(),
                        revision: revision.to_string(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    /// Drops one reference to a checkout. The last release arms its eviction
    /// deadline.
    ///
    /// Releasing an unknown key, or one that is not checked out, is a caller
    /// bug: it is logged and reported as [`ReleaseOutcome::Ignored`].
    pub fn release(&self, key: &CheckoutKey) -> ReleaseOutcome {
        let grace = self.shared.config.grace_period;
        let outcome = self.shared.lock_state().release(key, grace);
        match &outcome {
            ReleaseOutcome::Pending => {
                log::debug!("checkout {} pending eviction in {:?}", key.short(), grace);
                self.shared.reaper_wake.notify_all();
            }
            ReleaseOutcome::Ignored(usage) => log::warn!("{}", usage),
            ReleaseOutcome::Referenced { .. } => {}
        }
        outcome
    }

    /// Releases the checkout at `path`, as returned by [`Checkout::path`].
    pub fn release_path(&self, path: &Path) -> ReleaseOutcome {
        let key = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<CheckoutKey>().ok());
        match key {
            Some(key) if path.parent() == Some(self.shared.config.base_dir.as_path()) => {
                self.release(&key)
            }
            _ => {
                let usage = UsageError::UnknownKey {
                    key: path.display().to_string(),
                };
                log::warn!("{}", usage);
                ReleaseOutcome::Ignored(usage)
            }
        }
    }

    /// Removes every checked-out and pending checkout immediately and
    /// returns how many were removed.
    ///
    /// Checkouts still being materialized are not touched. Later releases of
    /// removed checkouts are reported as unknown keys.
    pub fn cleanup_all(&self) -> Result<usize> {
        let evictions = self.shared.lock()?.take_all();
        for eviction in &evictions {
            log::info!("removing checkout {}", eviction.key.short());
            cleanup::remove_checkout_dir(&eviction.path);
        }
        self.shared.lock()?.finish_evictions(&evictions);
        self.shared.settled.notify_all();
        Ok(evictions.len())
    }

    /// Removes all checkouts and stops the reaper.
    pub fn shutdown(self) -> Result<usize> {
        self.cleanup_all()
    }

    pub fn stats(&self) -> Result<PoolStats> {
        Ok(self.shared.lock()?.stats())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shared.lock_state().shutdown = true;
        self.shared.reaper_wake.notify_all();
        if let Some(reaper) = self.reaper.take() {
            if reaper.join().is_err() {
                log::error!("checkout reaper thread panicked");
            }
        }
    }
}
