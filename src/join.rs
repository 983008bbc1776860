use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

// the result slot shared by the running job and its handle
struct Packet<T> {
    slot: Mutex<Option<Result<T>>>,
    cvar: Condvar,
}

impl<T> Packet<T> {
    fn set(&self, ret: Result<T>) {
        let mut slot = self.slot.lock();
        // the first result wins, a late cancel must not overwrite it
        if slot.is_none() {
            *slot = Some(ret);
            self.cvar.notify_all();
        }
    }

    fn wait(&self) -> Result<T> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(ret) = slot.take() {
                return ret;
            }
            self.cvar.wait(&mut slot);
        }
    }
}

/// the producer side of a `JobHandle`, moved into the job closure
///
/// if it is dropped without completing, the handle sees `Error::Canceled`
pub(crate) struct Completer<T> {
    packet: Option<Arc<Packet<T>>>,
}

impl<T> Completer<T> {
    pub fn complete(mut self, ret: Result<T>) {
        if let Some(packet) = self.packet.take() {
            packet.set(ret);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(packet) = self.packet.take() {
            packet.set(Err(Error::Canceled));
        }
    }
}

/// A handle to a job submitted with [`ThreadPool::submit`].
///
/// Dropping the handle detaches the job, it still runs.
///
/// [`ThreadPool::submit`]: crate::ThreadPool::submit
pub struct JobHandle<T> {
    packet: Arc<Packet<T>>,
}

/// create a linked completer and handle
pub(crate) fn make_join_handle<T>() -> (Completer<T>, JobHandle<T>) {
    let packet = Arc::new(Packet {
        slot: Mutex::new(None),
        cvar: Condvar::new(),
    });
    let completer = Completer {
        packet: Some(packet.clone()),
    };
    (completer, JobHandle { packet })
}

impl<T> JobHandle<T> {
    /// return true if the job already finished
    pub fn is_done(&self) -> bool {
        self.packet.slot.lock().is_some()
    }

    /// Block until the job finished, returning the value it produced.
    ///
    /// A job that panicked gives `Err(Error::Panicked)`.
    pub fn join(self) -> Result<T> {
        self.packet.wait()
    }
}

impl<T> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("done", &self.is_done())
            .finish()
    }
}
