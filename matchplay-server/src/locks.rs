//! Per schedule locks serializing all mutating operations of a schedule within this process.
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use matchplay_core::ScheduleId;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A registry of per schedule async mutexes.
///
/// Only weak references are stored. A lock lives as long as a guard (or a waiter) for it exists
/// and is dropped from the registry on the next access.
#[derive(Debug, Default)]
pub struct ScheduleLocks {
    locks: Mutex<HashMap<ScheduleId, Weak<AsyncMutex<()>>>>,
}

impl ScheduleLocks {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock of `schedule`, waiting until no other operation holds it.
    pub async fn lock(&self, schedule: ScheduleId) -> ScheduleGuard {
        let mutex = self.get(schedule);

        let guard = mutex.lock_owned().await;
        log::trace!("Acquired lock for schedule {}", schedule);

        ScheduleGuard {
            schedule,
            _guard: guard,
        }
    }

    fn get(&self, schedule: ScheduleId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();

        // Drop the entries of schedules nobody holds anymore.
        locks.retain(|_, lock| lock.strong_count() > 0);

        if let Some(mutex) = locks.get(&schedule).and_then(Weak::upgrade) {
            return mutex;
        }

        let mutex = Arc::new(AsyncMutex::new(()));
        locks.insert(schedule, Arc::downgrade(&mutex));
        mutex
    }

    /// Returns the number of schedules with a live lock.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}

/// Holds the lock of a schedule until dropped.
#[derive(Debug)]
pub struct ScheduleGuard {
    schedule: ScheduleId,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for ScheduleGuard {
    fn drop(&mut self) {
        log::trace!("Released lock for schedule {}", self.schedule);
    }
}
