//! Eager tasks.
//!
//! A [`Task`] starts running as soon as it is created and keeps going until
//! its body returns or awaits something that is not resumed right away.
//! [`Task::get`] finishes the remaining work on the calling thread.
//!
//! ```
//! use cokit::awaitable::Immediate;
//! use cokit::Task;
//!
//! let mut task = Task::new(|cx| {
//!     let v = cx.await_(Immediate(21));
//!     v * 2
//! });
//! assert_eq!(task.get(), Ok(&42));
//! ```

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use crate::awaitable::{make_resumer, Awaitable, Resumer, Wake, Waiter};
use crate::config::config;
use crate::error::{Error, Result};
use crate::frame::{self, Event, Frame};

// the part of `Awaitable` the driver calls while the body is suspended
trait Suspend {
    fn on_suspend(&mut self, resumer: Resumer);
}

impl<A: Awaitable> Suspend for A {
    fn on_suspend(&mut self, resumer: Resumer) {
        Awaitable::on_suspend(self, resumer)
    }
}

/// the event a task body suspends with
///
/// it points to the awaitable on the suspended frame stack, which stays
/// valid until the frame is resumed or dropped
struct Suspension {
    awaitable: *mut dyn Suspend,
}

impl Suspension {
    /// # Safety
    ///
    /// must be called before the frame that produced it is resumed again
    unsafe fn subscribe(self, resumer: Resumer) {
        let awaitable = &mut *self.awaitable;
        awaitable.on_suspend(resumer);
    }
}

/// The handle a task body awaits through
pub struct TaskContext<'y> {
    suspend: &'y mut dyn FnMut(Suspension),
}

impl TaskContext<'_> {
    /// Await `awaitable`, returning its failure instead of raising it.
    pub fn try_await<A: Awaitable>(&mut self, mut awaitable: A) -> Result<A::Output> {
        if !awaitable.is_ready() {
            let r: &mut dyn Suspend = &mut awaitable;
            // it's safe to use the stack value here, the driver is done
            // with it before this frame runs again
            let r: *mut dyn Suspend = unsafe { mem::transmute(r) };
            (self.suspend)(Suspension { awaitable: r });
        }
        awaitable.on_resume()
    }

    /// Await `awaitable`.
    ///
    /// A failure of the awaitable is raised again in the body, so unless the
    /// body catches it the task fails with that same error.
    pub fn await_<A: Awaitable>(&mut self, awaitable: A) -> A::Output {
        match self.try_await(awaitable) {
            Ok(v) => v,
            Err(err) => panic::resume_unwind(Box::new(err)),
        }
    }
}

enum State<'a, T> {
    // the frame runs again once the resumer fired
    Suspended(Frame<'a, Suspension, T>, Waiter),
    // the frame is taken out while it runs
    Running,
    Completed(T),
    Failed(Error),
}

/// An eagerly started computation with a blocking, cached `get`.
///
/// The body runs on creation up to its first suspension point. Suspension
/// only happens inside [`TaskContext::await_`]; an awaitable that resumes the
/// task inline does not stop it, so a body whose awaitables all complete on
/// the spot has finished by the time `new` returns.
///
/// The result is computed once, every later [`get`](Task::get) returns it
/// again, and a body that panicked makes every `get` return the failure.
///
/// A task lives on one thread, the handle is neither `Send` nor `Sync`. The
/// only cross thread hook is the [`Resumer`] an awaitable receives. Dropping a
/// suspended task unwinds its body.
pub struct Task<'a, T> {
    state: State<'a, T>,
}

impl<'a, T: 'a> Task<'a, T> {
    /// Start a task from a body, with the configured stack size.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut TaskContext<'_>) -> T + 'a,
    {
        Self::with_stack_size(config().get_stack_size(), f)
    }

    /// Start a task whose frame gets `size` words of stack.
    pub fn with_stack_size<F>(size: usize, f: F) -> Self
    where
        F: FnOnce(&mut TaskContext<'_>) -> T + 'a,
    {
        let frame = frame::new_frame(size, move |suspend| f(&mut TaskContext { suspend }));
        let mut task = Task {
            state: State::Suspended(frame, Waiter::resumed()),
        };
        task.run(false);
        task
    }

    /// A task that already completed with `v`.
    pub fn ready(v: T) -> Self {
        Task {
            state: State::Completed(v),
        }
    }

    // drive the frame until it finishes, or until it waits on a resumer
    // that has not fired when `block` is false
    fn run(&mut self, block: bool) {
        loop {
            let (mut frame, waiter) = match mem::replace(&mut self.state, State::Running) {
                State::Suspended(frame, waiter) => (frame, waiter),
                finished => {
                    self.state = finished;
                    return;
                }
            };

            let wake = match waiter.check() {
                Wake::Pending if block => waiter.wait(),
                wake => wake,
            };
            match wake {
                Wake::Resumed => {}
                Wake::Pending => {
                    self.state = State::Suspended(frame, waiter);
                    return;
                }
                // nobody can resume the body any more, dropping the frame unwinds it
                Wake::Abandoned => {
                    warn!("task abandoned by its awaitable");
                    self.state = State::Failed(Error::Canceled);
                    return;
                }
            }

            self.state = match frame::resume(&mut frame) {
                Some(Event::Yield(suspension)) => {
                    let (resumer, waiter) = make_resumer();
                    let subscribed = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
                        suspension.subscribe(resumer)
                    }));
                    match subscribed {
                        Ok(()) => State::Suspended(frame, waiter),
                        // a panicking `on_suspend` fails the task, the frame is unwound
                        Err(payload) => State::Failed(Error::from_panic(&*payload)),
                    }
                }
                Some(Event::Return(v)) => State::Completed(v),
                Some(Event::Panic(payload)) => State::Failed(Error::from_panic(&*payload)),
                None => State::Failed(Error::Canceled),
            };
        }
    }

    /// Run the task as far as it goes without blocking.
    ///
    /// Returns true if the task finished.
    pub fn poll(&mut self) -> bool {
        self.run(false);
        self.is_done()
    }

    /// Finish the task on the calling thread and return its result.
    ///
    /// Blocks while the task waits on a resumer held by someone else. If every
    /// clone of that resumer is dropped without resuming, the body is unwound
    /// and the task fails with `Error::Canceled`. The body runs at most once:
    /// later calls return the cached result, or the cached failure.
    pub fn get(&mut self) -> Result<&T> {
        self.run(true);
        match &self.state {
            State::Completed(v) => Ok(v),
            State::Failed(err) => Err(err.clone()),
            // only left behind if the frame itself blew up while running
            State::Suspended(..) | State::Running => Err(Error::Canceled),
        }
    }

    /// Finish the task and take its result.
    pub fn into_result(mut self) -> Result<T> {
        self.run(true);
        match mem::replace(&mut self.state, State::Running) {
            State::Completed(v) => Ok(v),
            State::Failed(err) => Err(err),
            State::Suspended(..) | State::Running => Err(Error::Canceled),
        }
    }

    /// return true if the body returned or panicked
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Completed(_) | State::Failed(_))
    }
}

impl<T> fmt::Debug for Task<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Suspended(..) => "Suspended",
            State::Running => "Running",
            State::Completed(_) => "Completed",
            State::Failed(_) => "Failed",
        };
        f.debug_struct("Task").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awaitable::{Immediate, Ready};

    #[test]
    fn runs_eagerly() {
        let mut ran = false;
        {
            let task = Task::new(|_| {
                ran = true;
                1
            });
            assert!(task.is_done());
        }
        assert!(ran);
    }

    #[test]
    fn ready_awaitable_never_suspends() {
        let mut task = Task::new(|cx| cx.await_(Ready(5)) + 1);
        assert!(task.is_done());
        assert_eq!(task.get(), Ok(&6));
    }

    #[test]
    fn inline_resume_finishes_on_creation() {
        let mut task = Task::new(|cx| {
            let a = cx.await_(Immediate(1));
            let b = cx.await_(Immediate(2));
            a + b
        });
        assert!(task.poll());
        assert_eq!(task.into_result(), Ok(3));
    }

    #[test]
    fn ready_task() {
        let mut task = Task::ready("v");
        assert!(task.is_done());
        assert_eq!(task.get(), Ok(&"v"));
        println!("{task:?}");
    }
}
