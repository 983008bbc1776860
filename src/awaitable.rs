//! The suspension protocol of a [`Task`](crate::Task) body.
//!
//! A task suspends only inside [`TaskContext::await_`], which drives an
//! [`Awaitable`] through three callbacks in strict order:
//!
//! 1. `is_ready`: if true the task does not suspend at all
//! 2. `on_suspend`: the task is suspended, the awaitable gets a [`Resumer`]
//!    and either calls it right away or hands it to whoever completes the
//!    operation later, possibly from another thread
//! 3. `on_resume`: the task runs again and takes the awaited value
//!
//! [`TaskContext::await_`]: crate::task::TaskContext::await_

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::pool::ThreadPool;

/// A value a task body can wait on.
pub trait Awaitable {
    /// the awaited value
    type Output;

    /// return true if the value is available without suspending
    fn is_ready(&self) -> bool;

    /// called once the task is suspended
    ///
    /// the task stays suspended until `resumer.resume()` is called
    fn on_suspend(&mut self, resumer: Resumer);

    /// produce the awaited value, or the failure of the operation
    fn on_resume(self) -> Result<Self::Output>;
}

#[derive(Debug)]
struct SignalState {
    resumed: bool,
    // live `Resumer`s, once it drops to 0 unresumed the task can never run again
    resumers: usize,
}

#[derive(Debug)]
struct Signal {
    state: Mutex<SignalState>,
    cvar: Condvar,
}

/// what a suspended task is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Resumed,
    Pending,
    // every resumer was dropped without resuming
    Abandoned,
}

/// The capability to resume a suspended task.
///
/// It is `Send + Clone`, so an awaitable can hand it to another thread that
/// completes the operation. Resuming more than once, or resuming a task that
/// was already dropped, does nothing. If every clone is dropped without
/// resuming, the task fails with `Error::Canceled` instead of waiting forever.
#[derive(Debug)]
pub struct Resumer {
    signal: Arc<Signal>,
}

/// the driver side of a suspension, paired with the resumers
#[derive(Debug)]
pub(crate) struct Waiter {
    signal: Arc<Signal>,
}

/// create a resumer and the waiter it wakes
pub(crate) fn make_resumer() -> (Resumer, Waiter) {
    let signal = Arc::new(Signal {
        state: Mutex::new(SignalState {
            resumed: false,
            resumers: 1,
        }),
        cvar: Condvar::new(),
    });
    let waiter = Waiter {
        signal: signal.clone(),
    };
    (Resumer { signal }, waiter)
}

impl Resumer {
    /// Mark the task as ready to run again.
    pub fn resume(&self) {
        let mut state = self.signal.state.lock();
        if !state.resumed {
            state.resumed = true;
            self.signal.cvar.notify_all();
        }
    }

    /// return true if `resume` was already called
    pub fn is_resumed(&self) -> bool {
        self.signal.state.lock().resumed
    }
}

impl Clone for Resumer {
    fn clone(&self) -> Self {
        self.signal.state.lock().resumers += 1;
        Resumer {
            signal: self.signal.clone(),
        }
    }
}

impl Drop for Resumer {
    fn drop(&mut self) {
        let mut state = self.signal.state.lock();
        state.resumers -= 1;
        if state.resumers == 0 && !state.resumed {
            trace!("resumer dropped without resuming");
            self.signal.cvar.notify_all();
        }
    }
}

impl Waiter {
    // a waiter that already fired, used to start a task eagerly
    pub(crate) fn resumed() -> Self {
        let (r, waiter) = make_resumer();
        r.resume();
        waiter
    }

    fn wake(state: &SignalState) -> Wake {
        if state.resumed {
            Wake::Resumed
        } else if state.resumers == 0 {
            Wake::Abandoned
        } else {
            Wake::Pending
        }
    }

    /// check without blocking
    pub(crate) fn check(&self) -> Wake {
        Self::wake(&self.signal.state.lock())
    }

    /// block until resumed or abandoned, never returns `Pending`
    pub(crate) fn wait(&self) -> Wake {
        let mut state = self.signal.state.lock();
        loop {
            match Self::wake(&state) {
                Wake::Pending => self.signal.cvar.wait(&mut state),
                wake => return wake,
            }
        }
    }
}

/// An awaitable that is always ready, the task never suspends on it.
#[derive(Debug)]
pub struct Ready<T>(pub T);

impl<T> Awaitable for Ready<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        true
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        // never suspended, but resuming keeps the contract if it ever is
        resumer.resume();
    }

    fn on_resume(self) -> Result<T> {
        Ok(self.0)
    }
}

/// An awaitable that always suspends and resumes the task on the spot.
///
/// The suspension is a no-op delay: `on_suspend` calls the resumer inline.
#[derive(Debug)]
pub struct Immediate<T>(pub T);

impl<T> Awaitable for Immediate<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        trace!("immediate: is_ready");
        false
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        trace!("immediate: on_suspend");
        resumer.resume();
    }

    fn on_resume(self) -> Result<T> {
        trace!("immediate: on_resume");
        Ok(self.0)
    }
}

/// An awaitable that runs a closure on a [`ThreadPool`] and resumes the task
/// from the worker once the closure finished.
///
/// A panic of the closure becomes the failure of the await, a pool that is
/// shutting down gives `Error::ShutDown`.
pub struct Offload<'p, F, T> {
    pool: &'p ThreadPool,
    job: Option<F>,
    // filled by the worker before it resumes the task
    slot: Arc<AtomicCell<Option<Result<T>>>>,
}

impl<'p, F, T> Offload<'p, F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    /// run `job` on `pool` when awaited
    pub fn new(pool: &'p ThreadPool, job: F) -> Self {
        Offload {
            pool,
            job: Some(job),
            slot: Arc::new(AtomicCell::new(None)),
        }
    }
}

impl<F, T> Awaitable for Offload<'_, F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn is_ready(&self) -> bool {
        // the job only starts once the task suspends
        false
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        let job = match self.job.take() {
            Some(job) => job,
            None => return resumer.resume(),
        };
        let slot = self.slot.clone();
        let r = resumer.clone();
        let queued = self.pool.enqueue(move || {
            let ret = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| Error::from_panic(&*payload));
            slot.store(Some(ret));
            r.resume();
        });
        if let Err(err) = queued {
            self.slot.store(Some(Err(err)));
            resumer.resume();
        }
    }

    fn on_resume(self) -> Result<T> {
        self.slot.take().unwrap_or(Err(Error::Canceled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn resumer_wakes_waiter() {
        let (r, waiter) = make_resumer();
        assert_eq!(waiter.check(), Wake::Pending);
        let r2 = r.clone();
        drop(r);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            r2.resume();
            // a second resume is a no-op
            r2.resume();
        });
        assert_eq!(waiter.wait(), Wake::Resumed);
        t.join().unwrap();
        // dropping after resuming does not abandon the task
        assert_eq!(waiter.check(), Wake::Resumed);
    }

    #[test]
    fn dropped_resumers_abandon_waiter() {
        let (r, waiter) = make_resumer();
        let clones: Vec<_> = (0..3).map(|_| r.clone()).collect();
        drop(r);
        assert_eq!(waiter.check(), Wake::Pending);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(clones);
        });
        assert_eq!(waiter.wait(), Wake::Abandoned);
        t.join().unwrap();
    }

    #[test]
    fn protocol_of_builtin_awaitables() {
        let ready = Ready(1);
        assert!(ready.is_ready());
        assert_eq!(ready.on_resume(), Ok(1));

        let mut imm = Immediate("x");
        assert!(!imm.is_ready());
        let (r, waiter) = make_resumer();
        imm.on_suspend(r);
        assert_eq!(waiter.check(), Wake::Resumed);
        assert_eq!(imm.on_resume(), Ok("x"));
    }

    #[test]
    fn offload_to_shut_down_pool() {
        let pool = ThreadPool::new(1);
        pool.shutdown();
        let mut job = Offload::new(&pool, || 1);
        assert!(!job.is_ready());
        let (r, waiter) = make_resumer();
        job.on_suspend(r);
        assert_eq!(waiter.check(), Wake::Resumed);
        assert_eq!(job.on_resume(), Err(Error::ShutDown));
    }
}
