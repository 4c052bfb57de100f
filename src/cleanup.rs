//! # Deferred Cleanup
//!
//! A released checkout is not removed straight away. Its slot becomes
//! *pending* and an eviction deadline is armed; a later acquire of the same
//! key before the deadline takes the slot back without touching the disk.
//!
//! ## Design
//!
//! One reaper thread per pool services a min-heap of `(deadline, generation,
//! key)` entries, sleeping on a condition variable until the earliest
//! deadline or until a new deadline is armed. Entries are never removed from
//! the heap when a slot is re-acquired; instead every transition to pending
//! draws a fresh generation number, and an expired entry evicts only if the
//! slot is still pending under that exact generation. A slot that was
//! re-acquired and released again therefore cannot be evicted early by the
//! entry armed for its previous release.
//!
//! Directory removal happens outside the pool lock. While it runs the key is
//! marked in flight, so an acquire of the same key waits instead of
//! materializing into a directory that is being deleted.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::key::CheckoutKey;
use crate::pool::{PoolState, Shared};

/// An armed eviction. Ordered by deadline first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Deadline {
    pub at: Instant,
    pub generation: u64,
    pub key: CheckoutKey,
}

/// Min-heap of eviction deadlines.
#[derive(Debug, Default)]
pub(crate) struct EvictionQueue {
    heap: BinaryHeap<Reverse<Deadline>>,
}

impl EvictionQueue {
    pub fn arm(&mut self, key: CheckoutKey, generation: u64, at: Instant) {
        self.heap.push(Reverse(Deadline {
            at,
            generation,
            key,
        }));
    }

    /// Earliest armed deadline, stale or not.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(d)| d.at)
    }

    /// Pops every entry whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Vec<Deadline> {
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.at > now {
                break;
            }
            if let Some(Reverse(deadline)) = self.heap.pop() {
                due.push(deadline);
            }
        }
        due
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Keeps only the deadlines for which `live` returns true.
    pub fn retain(&mut self, mut live: impl FnMut(&Deadline) -> bool) {
        self.heap.retain(|Reverse(deadline)| live(deadline));
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

/// A slot taken out of the table whose directory still has to go.
#[derive(Debug, Clone)]
pub(crate) struct Eviction {
    pub key: CheckoutKey,
    pub path: PathBuf,
}

/// Starts the reaper thread for a pool.
pub(crate) fn spawn_reaper(shared: Arc<Shared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("checkout-reaper".to_string())
        .spawn(move || reaper_loop(&shared))
}

fn reaper_loop(shared: &Shared) {
    let mut state = shared.lock_state();
    loop {
        if state.is_shut_down() {
            break;
        }

        let now = Instant::now();
        let evictions = state.take_expired(now);
        if !evictions.is_empty() {
            drop(state);
            for eviction in &evictions {
                log::info!(
                    "evicting idle checkout {} at {}",
                    eviction.key.short(),
                    eviction.path.display()
                );
                remove_checkout_dir(&eviction.path);
            }
            state = shared.lock_state();
            state.finish_evictions(&evictions);
            shared.settled.notify_all();
            continue;
        }

        state = match state.next_deadline() {
            Some(at) => {
                let timeout = at.saturating_duration_since(now);
                wait_timeout(shared, state, timeout)
            }
            None => shared
                .reaper_wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner),
        };
    }
    log::debug!("checkout reaper stopped");
}

fn wait_timeout<'a>(
    shared: &'a Shared,
    state: MutexGuard<'a, PoolState>,
    timeout: std::time::Duration,
) -> MutexGuard<'a, PoolState> {
    match shared.reaper_wake.wait_timeout(state, timeout) {
        Ok((guard, _)) => guard,
        Err(poisoned) => poisoned.into_inner().0,
    }
}

/// Removes a checkout directory.
///
/// A directory that is already gone counts as removed. Other failures are
/// logged and reported as `false`; the capacity unit is returned regardless.
pub fn remove_checkout_dir(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => {
            log::warn!("failed to remove checkout {}: {}", path.display(), e);
            false
        }
    }
}

/// Lists directories under `base_dir` whose names are checkout keys.
///
/// Other entries are ignored, so the base directory may be shared with
/// unrelated files. A missing base directory yields an empty list.
pub fn checkout_dirs(base_dir: &Path) -> io::Result<Vec<(CheckoutKey, PathBuf)>> {
    let entries = match fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(key) = name.to_str().and_then(|n| n.parse::<CheckoutKey>().ok()) {
            dirs.push((key, entry.path()));
        }
    }
    dirs.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(dirs)
}
