use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

/// Change counter shared by the catalog and completion store of one course.
///
/// Subscribers re-derive the progress snapshot whenever it moves.
#[derive(Debug)]
pub(crate) struct Revision(watch::Sender<u64>);

impl Revision {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self(tx)
    }

    pub(crate) fn bump(&self) {
        self.0.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.0.subscribe()
    }

    pub(crate) fn current(&self) -> u64 {
        *self.0.borrow()
    }
}

/// Critical sections never await and never panic, so poisoning is ignored.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
