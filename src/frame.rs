//! The suspended computation behind `Generator` and `Task`.
//!
//! A frame is a stackful `generator` coroutine. The body can suspend from
//! anywhere, nested calls included, and the frame hands back one [`Event`]
//! per resume. A panic in the body is caught on the frame's own stack and
//! delivered as an `Event::Panic`, so the resumer decides how to surface it.
//!
//! Dropping a frame that is still suspended makes the `generator` runtime
//! unwind the frame stack, every local of the body gets dropped.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use ::generator::{Gn, LocalGenerator};

/// what a frame hands back on each resume
pub(crate) enum Event<Y, R> {
    /// the body suspended with a value
    Yield(Y),
    /// the body returned
    Return(R),
    /// the body panicked
    Panic(Box<dyn Any + Send>),
}

pub(crate) type Frame<'a, Y, R> = LocalGenerator<'a, (), Event<Y, R>>;

/// create a frame that is not started yet
///
/// the body receives a callback that suspends the frame with a value
pub(crate) fn new_frame<'a, Y, R, F>(stack_size: usize, f: F) -> Frame<'a, Y, R>
where
    F: FnOnce(&mut dyn FnMut(Y)) -> R + 'a,
    Y: 'a,
    R: 'a,
{
    Gn::<()>::new_scoped_opt_local(stack_size, move |mut scope| {
        let mut suspend = |v: Y| scope.yield_with(Event::Yield(v));
        match panic::catch_unwind(AssertUnwindSafe(|| f(&mut suspend))) {
            Ok(ret) => Event::Return(ret),
            // the cancel panic raised when a suspended frame is dropped
            // belongs to the generator runtime, keep unwinding
            Err(payload) if payload.is::<::generator::Error>() => panic::resume_unwind(payload),
            Err(payload) => Event::Panic(payload),
        }
    })
}

/// resume the frame until its next event, `None` if it already finished
#[inline]
pub(crate) fn resume<Y, R>(frame: &mut Frame<'_, Y, R>) -> Option<Event<Y, R>> {
    if frame.is_done() {
        return None;
    }
    frame.resume()
}
