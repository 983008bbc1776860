//! `cokit` Configuration interface
//!

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Once;

// default stack size for generator and task frames, in usize
const DEFAULT_STACK_SIZE: usize = 0x4000;

static WORKERS: AtomicUsize = AtomicUsize::new(0);
static STACK_SIZE: AtomicUsize = AtomicUsize::new(0);
static PIN_WORKERS: AtomicBool = AtomicBool::new(false);

/// `cokit` Configuration type
pub struct Config;

/// get the cokit configuration instance
pub fn config() -> Config {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        WORKERS.store(num_cpus::get().max(1), Ordering::Release);
        STACK_SIZE.store(DEFAULT_STACK_SIZE, Ordering::Release);
    });

    Config
}

/// the config should be called at the program beginning
///
/// pools and generators that already exist keep the values
/// they were created with
impl Config {
    /// set the default worker thread number of a pool
    ///
    /// the minimum worker thread is 1, if you pass 0 to it, will use the cpu count
    pub fn set_workers(&self, workers: usize) -> &Self {
        info!("set workers={:?}", workers);
        let workers = if workers == 0 { num_cpus::get().max(1) } else { workers };
        WORKERS.store(workers, Ordering::Release);
        self
    }

    /// get the default pool workers number
    pub fn get_workers(&self) -> usize {
        WORKERS.load(Ordering::Acquire)
    }

    /// set default generator/task stack size in usize
    ///
    /// if you pass 0 to it, will use internal default
    pub fn set_stack_size(&self, size: usize) -> &Self {
        info!("set stack size={:?}", size);
        let size = if size == 0 { DEFAULT_STACK_SIZE } else { size };
        STACK_SIZE.store(size, Ordering::Release);
        self
    }

    /// get the default generator/task stack size
    pub fn get_stack_size(&self) -> usize {
        STACK_SIZE.load(Ordering::Acquire)
    }

    /// pin each pool worker to a cpu core
    pub fn set_pin_workers(&self, pin: bool) -> &Self {
        info!("set pin workers={:?}", pin);
        PIN_WORKERS.store(pin, Ordering::Release);
        self
    }

    /// get if pool workers are pinned to cpu cores
    pub fn get_pin_workers(&self) -> bool {
        PIN_WORKERS.load(Ordering::Acquire)
    }
}
