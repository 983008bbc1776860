//! # Concurrency and lazy evaluation kit
//!
//! `cokit` bundles four small primitives that show up again and again in
//! concurrent programs.
//!
//! ## Features
//!
//! * A lock-free Treiber [`Stack`] with epoch based reclamation
//! * A fixed size [`ThreadPool`] with a FIFO job queue, drain on shutdown
//!   and a panic boundary around every job
//! * Lazy, pull driven [`Generator`]s whose body can yield from anywhere
//! * Eager [`Task`]s with a cached, blocking `get` and a pluggable
//!   [`Awaitable`](awaitable::Awaitable) suspension protocol
//! * Panics inside jobs, generators and tasks are captured and handed to the
//!   consumer as an [`Error`], never swallowed
//!
//! Generators and tasks run on stackful frames from the `generator` crate;
//! their stack size comes from [`config`].
//!

// #![deny(missing_docs)]

#[macro_use]
#[doc(hidden)]
extern crate log;

mod config;
mod error;
mod frame;
mod join;

pub mod awaitable;
pub mod generator;
pub mod pool;
pub mod sequences;
pub mod task;

pub use cokit_stack::Stack;
pub use config::{config, Config};
pub use error::{Error, Result};
pub use generator::{Generator, GeneratorState, Yielder};
pub use join::JobHandle;
pub use pool::ThreadPool;
pub use task::{Task, TaskContext};
