//! A fixed size pool of worker threads fed by a shared job queue.
//!
//! The queue is a plain `VecDeque` behind a mutex, idle workers wait on a
//! condition variable. Job admission is not latency critical so nothing here
//! is lock-free.
//!
//! Every job runs behind a `catch_unwind` boundary: a panicking job is
//! logged, counted and handed to the optional panic handler, and the worker
//! goes on with the next job. A panic never shrinks the pool.
//!
//! Shutdown drains the queue: jobs queued before shutdown began still run,
//! jobs offered afterwards are rejected with [`Error::ShutDown`].

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::config::config;
use crate::error::{Error, Result};
use crate::join::{make_join_handle, JobHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;
type PanicHandler = Arc<dyn Fn(&str, &Error) + Send + Sync + 'static>;

const DEFAULT_NAME: &str = "cokit-pool";

struct Queue {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    // wakes idle workers on new jobs and on shutdown
    cvar: Condvar,
    failed: AtomicUsize,
    on_panic: Option<PanicHandler>,
}

impl Shared {
    fn next_job(&self, name: &str) -> Option<Job> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(job) = queue.jobs.pop_front() {
                return Some(job);
            }
            if queue.shutdown {
                debug!("{name} terminated");
                return None;
            }
            self.cvar.wait(&mut queue);
        }
    }

    fn report_panic(&self, name: &str, err: &Error) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        error!("{name}: job failed, {err}");
        if let Some(handler) = &self.on_panic {
            // the handler runs on the worker, it must not take the worker down either
            if panic::catch_unwind(AssertUnwindSafe(|| handler(name, err))).is_err() {
                error!("{name}: panic handler panicked");
            }
        }
    }
}

fn run_worker(shared: &Shared, name: &str) {
    while let Some(job) = shared.next_job(name) {
        trace!("{name} run job");
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            shared.report_panic(name, &Error::from_panic(&*payload));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Builder
////////////////////////////////////////////////////////////////////////////////

/// Thread pool factory, which can be used in order to configure the
/// properties of a new pool.
///
/// Methods can be chained on it in order to configure it.
///
/// - [`workers`]: the number of worker threads, 0 means the configured default
/// - [`name`]: prefix of the worker thread names
/// - [`pin_workers`]: pin each worker to a cpu core
/// - [`on_panic`]: a callback invoked on the worker when a job panics
///
/// The [`build`] method takes ownership of the builder and creates an
/// `io::Result` to the pool, [`ThreadPool::new`] uses a default `Builder`
/// and `unwrap`s it.
///
/// # Examples
///
/// ```
/// use cokit::pool::Builder;
///
/// let pool = Builder::new().workers(2).name("io".into()).build().unwrap();
/// pool.enqueue(|| println!("hello from the pool")).unwrap();
/// ```
///
/// [`workers`]: Builder::workers
/// [`name`]: Builder::name
/// [`pin_workers`]: Builder::pin_workers
/// [`on_panic`]: Builder::on_panic
/// [`build`]: Builder::build
#[derive(Default)]
pub struct Builder {
    name: Option<String>,
    workers: Option<usize>,
    pin_workers: Option<bool>,
    on_panic: Option<PanicHandler>,
}

impl Builder {
    /// Generates the base configuration for a pool.
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Names the worker threads, they are called `{name}-{index}`.
    pub fn name(mut self, name: String) -> Builder {
        self.name = Some(name);
        self
    }

    /// Sets the number of worker threads.
    pub fn workers(mut self, workers: usize) -> Builder {
        self.workers = Some(workers);
        self
    }

    /// Pin worker `i` to cpu core `i % cores`.
    pub fn pin_workers(mut self, pin: bool) -> Builder {
        self.pin_workers = Some(pin);
        self
    }

    /// Install a callback that receives the worker name and the failure of
    /// every job that panics.
    pub fn on_panic<F>(mut self, f: F) -> Builder
    where
        F: Fn(&str, &Error) + Send + Sync + 'static,
    {
        self.on_panic = Some(Arc::new(f));
        self
    }

    /// Spawns the worker threads and returns the pool.
    ///
    /// # Errors
    ///
    /// Returns the `io::Error` of the first worker thread that could not be
    /// spawned; the workers already started are shut down and joined.
    pub fn build(self) -> io::Result<ThreadPool> {
        let Builder {
            name,
            workers,
            pin_workers,
            on_panic,
        } = self;
        let name = name.unwrap_or_else(|| DEFAULT_NAME.to_owned());
        let workers = match workers {
            Some(n) if n > 0 => n,
            _ => config().get_workers(),
        };
        let core_ids = if pin_workers.unwrap_or_else(|| config().get_pin_workers()) {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            cvar: Condvar::new(),
            failed: AtomicUsize::new(0),
            on_panic,
        });

        let mut pool = ThreadPool {
            shared,
            workers: Vec::with_capacity(workers),
            name,
        };

        for id in 0..workers {
            let shared = pool.shared.clone();
            let worker_name = format!("{}-{}", pool.name, id);
            let core = (!core_ids.is_empty()).then(|| core_ids[id % core_ids.len()]);
            let spawned = thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || {
                    if let Some(core) = core {
                        if !core_affinity::set_for_current(core) {
                            warn!("{worker_name} failed to pin to core {}", core.id);
                        }
                    }
                    run_worker(&shared, &worker_name);
                });
            // on error dropping the pool joins the workers that did start
            pool.workers.push(spawned?);
        }

        debug!("{} started with {} workers", pool.name, workers);
        Ok(pool)
    }
}

////////////////////////////////////////////////////////////////////////////////
// ThreadPool
////////////////////////////////////////////////////////////////////////////////

/// A fixed set of worker threads consuming a shared FIFO job queue.
///
/// Jobs are dequeued in the order they were enqueued; with more than one
/// worker they may finish in any order. Dropping the pool runs every job
/// still queued and then joins the workers.
///
/// # Examples
///
/// ```
/// use cokit::ThreadPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let pool = ThreadPool::new(4);
/// for _ in 0..8 {
///     let counter = counter.clone();
///     pool.enqueue(move || {
///         counter.fetch_add(1, Ordering::Relaxed);
///     })
///     .unwrap();
/// }
/// pool.join();
/// assert_eq!(counter.load(Ordering::Relaxed), 8);
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
    name: String,
}

impl ThreadPool {
    /// Creates a pool with `workers` threads, 0 means the configured default.
    ///
    /// Panics if a worker thread can't be spawned, use [`Builder::build`] to
    /// handle that case.
    pub fn new(workers: usize) -> ThreadPool {
        Builder::new().workers(workers).build().unwrap()
    }

    /// Appends a job to the queue and returns immediately.
    ///
    /// # Errors
    ///
    /// `Error::ShutDown` once shutdown has begun, the job is dropped unrun.
    pub fn enqueue<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(Box::new(job))
    }

    /// Runs a value returning closure on the pool.
    ///
    /// The returned handle yields the value, or `Error::Panicked` if the
    /// closure panicked. The panic is also reported the same way as a
    /// panicking [`enqueue`](ThreadPool::enqueue) job.
    pub fn submit<F, T>(&self, f: F) -> Result<JobHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completer, handle) = make_join_handle();
        self.push(Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(v) => completer.complete(Ok(v)),
                Err(payload) => {
                    completer.complete(Err(Error::from_panic(&*payload)));
                    // let the worker boundary account for it
                    panic::resume_unwind(payload);
                }
            }
        }))?;
        Ok(handle)
    }

    fn push(&self, job: Job) -> Result<()> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                warn!("{} rejected a job after shutdown", self.name);
                return Err(Error::ShutDown);
            }
            queue.jobs.push_back(job);
        }
        self.shared.cvar.notify_one();
        Ok(())
    }

    /// Begin shutdown without waiting for the workers.
    ///
    /// Queued jobs still run, new jobs are rejected.
    pub fn shutdown(&self) {
        let mut queue = self.shared.queue.lock();
        if !queue.shutdown {
            debug!("{} shutting down, {} jobs queued", self.name, queue.jobs.len());
            queue.shutdown = true;
        }
        drop(queue);
        // workers only look at the flag when woken
        self.shared.cvar.notify_all();
    }

    /// Shut down, run the queued jobs and join every worker.
    pub fn join(self) {
        drop(self)
    }

    /// return true if shutdown has begun
    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.lock().shutdown
    }

    /// number of worker threads
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// number of jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// number of jobs that panicked so far
    pub fn failed_jobs(&self) -> usize {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// the worker thread name prefix
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("workers", &self.workers.len())
            .field("queued", &self.queued())
            .field("failed_jobs", &self.failed_jobs())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // the last handle was dropped by one of our own jobs, that worker
            // can't join itself, it exits once the queue is drained
            if worker.thread().id() == current {
                debug!("{} detached {:?}", self.name, worker.thread().name());
                continue;
            }
            if worker.join().is_err() {
                error!("{} worker exited abnormally", self.name);
            }
        }
        debug!("{} joined", self.name);
    }
}
