//! Command lock guarding the session.
//!
//! A plain `parking_lot::Mutex` that also remembers which thread holds it.
//! A second acquisition from the owning thread is reported as
//! [`ClientError::Usage`] instead of deadlocking.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{ClientError, Result};

pub(crate) struct CommandLock<T> {
    inner: Mutex<T>,
    owner: Mutex<Option<ThreadId>>,
    acquisitions: AtomicU64,
}

impl<T> CommandLock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            owner: Mutex::new(None),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Block until the lock is free, unless this thread already holds it
    pub(crate) fn acquire(&self) -> Result<CommandGuard<'_, T>> {
        let me = thread::current().id();
        if *self.owner.lock() == Some(me) {
            return Err(ClientError::Usage(
                "command lock already held by this thread; inside a pipeline block \
                 issue commands through the pipeline handle"
                    .to_string(),
            ));
        }

        let guard = self.inner.lock();
        *self.owner.lock() = Some(me);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        Ok(CommandGuard {
            guard,
            owner: &self.owner,
        })
    }

    /// Number of successful acquisitions so far
    pub(crate) fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }
}

pub(crate) struct CommandGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    owner: &'a Mutex<Option<ThreadId>>,
}

impl<T> Deref for CommandGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for CommandGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for CommandGuard<'_, T> {
    fn drop(&mut self) {
        // Runs before `guard` unlocks the session.
        *self.owner.lock() = None;
    }
}
