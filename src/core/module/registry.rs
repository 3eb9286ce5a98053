//=========================================================================
// Module Registry
//=========================================================================
//
// Caches behind the resolver, keyed by ModuleLink.
//
//   entries: link -> RegistryEntry   (in-flight and finished creations)
//   ready:   link -> ModuleHandle    (init has resolved)
//
// At most one entry ever exists per link for the lifetime of the
// registry; this is what makes construction single-flight, and
// `lookup_or_insert` enforces it atomically. Both maps sit behind
// narrow locks: lock, read/mutate, unlock; never held across user
// callbacks or recursive resolution.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;

use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use crate::core::future::Future;
use super::{Module, ModuleHandle, ModuleLink};

//=== RegistryEntry =======================================================

/// Per-link creation record.
pub(crate) struct RegistryEntry {
    /// Settles once the instance exists and dependency wiring is
    /// underway, not necessarily initialized yet. Cycle breaking hangs
    /// off this future.
    pub creation_future: Future<ModuleHandle>,
    /// Settles once `init` has resolved (or construction/init failed).
    /// Duplicate requests chain onto this.
    pub ready_future: Future<ModuleHandle>,
    /// Set once `init` has resolved.
    pub ready: bool,
}

/// Clone of an entry's futures and readiness, safe to use outside the
/// registry lock.
pub(crate) struct EntrySnapshot {
    pub creation_future: Future<ModuleHandle>,
    pub ready_future: Future<ModuleHandle>,
    pub ready: bool,
}

//=== ModuleRegistry ======================================================

pub(crate) struct ModuleRegistry {
    entries: Mutex<HashMap<ModuleLink, RegistryEntry>>,
    ready: Mutex<HashMap<ModuleLink, ModuleHandle>>,
    // Readiness order, for reverse-order unload at shutdown.
    ready_order: Mutex<Vec<ModuleLink>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ready: Mutex::new(HashMap::new()),
            ready_order: Mutex::new(Vec::new()),
        }
    }

    //--- Entries ----------------------------------------------------------

    /// Snapshot of the entry for `link`, if one exists.
    pub fn lookup(&self, link: ModuleLink) -> Option<EntrySnapshot> {
        self.entries.lock().get(&link).map(|entry| EntrySnapshot {
            creation_future: entry.creation_future.clone(),
            ready_future: entry.ready_future.clone(),
            ready: entry.ready,
        })
    }

    /// Atomic get-or-insert behind the single-flight guarantee.
    ///
    /// Returns a snapshot of the existing entry if one is present, else
    /// records the given futures as the entry for `link` and returns
    /// `None`. Check and insert share one critical section, so two
    /// threads racing on the same link agree on exactly one winner; the
    /// loser joins the winner's futures.
    pub fn lookup_or_insert(
        &self,
        link: ModuleLink,
        creation_future: Future<ModuleHandle>,
        ready_future: Future<ModuleHandle>,
    ) -> Option<EntrySnapshot> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&link) {
            return Some(EntrySnapshot {
                creation_future: entry.creation_future.clone(),
                ready_future: entry.ready_future.clone(),
                ready: entry.ready,
            });
        }
        entries.insert(
            link,
            RegistryEntry {
                creation_future,
                ready_future,
                ready: false,
            },
        );
        None
    }

    //--- Readiness --------------------------------------------------------

    /// Marks `link` ready and stores the handle for typed lookup.
    pub fn mark_ready(&self, link: ModuleLink, handle: ModuleHandle) {
        if let Some(entry) = self.entries.lock().get_mut(&link) {
            entry.ready = true;
        }
        let first_time = self.ready.lock().insert(link, handle).is_none();
        if first_time {
            self.ready_order.lock().push(link);
        }
    }

    /// Handle for a ready module, by link.
    pub fn get_ready(&self, link: ModuleLink) -> Option<ModuleHandle> {
        self.ready.lock().get(&link).cloned()
    }

    /// Typed lookup across ready modules.
    pub fn get_module<T>(&self) -> Option<std::sync::Arc<T>>
    where
        T: Module + 'static,
    {
        self.ready
            .lock()
            .values()
            .find_map(|handle| handle.clone().as_any_arc().downcast::<T>().ok())
    }

    /// Link whose ready module downcasts to `T`.
    pub fn get_module_link<T>(&self) -> Option<ModuleLink>
    where
        T: Module + 'static,
    {
        self.ready
            .lock()
            .iter()
            .find_map(|(link, handle)| {
                handle.clone().as_any_arc().downcast::<T>().ok().map(|_| *link)
            })
    }

    /// Number of ready modules.
    pub fn ready_len(&self) -> usize {
        self.ready.lock().len()
    }

    //--- Shutdown ---------------------------------------------------------

    /// Unloads every ready module in reverse readiness order, then
    /// drops all entries en masse.
    pub fn shutdown(&self) {
        let order = std::mem::take(&mut *self.ready_order.lock());
        let mut ready = std::mem::take(&mut *self.ready.lock());
        for link in order.iter().rev() {
            if let Some(handle) = ready.remove(link) {
                handle.unload();
            }
        }
        self.entries.lock().clear();
    }
}

//=========================================================================
// Tests
//=========================================================================
