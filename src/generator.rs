//! Lazy, pull driven generators.
//!
//! A [`Generator`] owns a suspended computation that only runs when the
//! consumer asks for the next value. The body gets a [`Yielder`] and may
//! yield from anywhere, inside loops or nested calls.
//!
//! ```
//! use cokit::Generator;
//!
//! let squares = Generator::new(|y| {
//!     for i in 1..4 {
//!         y.yield_(i * i);
//!     }
//! });
//! assert_eq!(squares.collect::<Vec<_>>(), [1, 4, 9]);
//! ```
//!
//! A generator lives on one thread: the handle is neither `Send` nor `Sync`,
//! so consuming it from two threads does not compile.

use std::any::Any;
use std::fmt;
use std::iter::FusedIterator;
use std::mem;
use std::panic;

use crate::config::config;
use crate::error::{Error, Result};
use crate::frame::{self, Event, Frame};

/// The state tag of a [`Generator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// created, the body has not run yet
    NotStarted,
    /// the body is suspended right after a yield
    Suspended,
    /// the body returned, terminal
    Completed,
    /// the body panicked, terminal
    Failed,
}

enum State<'a, T> {
    NotStarted(Frame<'a, T, ()>),
    Suspended(Frame<'a, T, ()>),
    Completed,
    Failed(Error),
}

// outcome of a single resume
enum Step<T> {
    Yielded(T),
    Done,
    Panicked(Box<dyn Any + Send>),
}

/// The handle a generator body yields values through
pub struct Yielder<'y, T> {
    suspend: &'y mut dyn FnMut(T),
}

impl<T> Yielder<'_, T> {
    /// hand `v` to the consumer and suspend until the next pull
    #[inline]
    pub fn yield_(&mut self, v: T) {
        (self.suspend)(v)
    }

    /// yield every value of another generator
    ///
    /// a panic of the inner generator propagates into this body
    pub fn yield_from<'g>(&mut self, g: Generator<'g, T>)
    where
        T: 'g,
    {
        for v in g {
            self.yield_(v);
        }
    }
}

/// A lazy, single pass sequence of `T` backed by a suspended computation.
///
/// The body does not run on creation, each pull resumes it until it yields
/// the next value, returns, or panics. Once the body returned or panicked the
/// generator stays finished and further pulls report "no more values".
///
/// Dropping the handle while the body is suspended unwinds the body, so every
/// value it captured or holds on its stack is dropped.
pub struct Generator<'a, T> {
    state: State<'a, T>,
    // the value of the last successful `advance`
    current: Option<T>,
}

impl<'a, T: 'a> Generator<'a, T> {
    /// Create a generator from a body, with the configured stack size.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut Yielder<'_, T>) + 'a,
    {
        Self::with_stack_size(config().get_stack_size(), f)
    }

    /// Create a generator whose frame gets `size` words of stack.
    pub fn with_stack_size<F>(size: usize, f: F) -> Self
    where
        F: FnOnce(&mut Yielder<'_, T>) + 'a,
    {
        let frame = frame::new_frame(size, move |suspend| f(&mut Yielder { suspend }));
        Generator {
            state: State::NotStarted(frame),
            current: None,
        }
    }

    // resume the body by exactly one step
    fn step(&mut self) -> Step<T> {
        let mut frame = match mem::replace(&mut self.state, State::Completed) {
            State::NotStarted(frame) | State::Suspended(frame) => frame,
            finished => {
                self.state = finished;
                return Step::Done;
            }
        };

        match frame::resume(&mut frame) {
            Some(Event::Yield(v)) => {
                self.state = State::Suspended(frame);
                Step::Yielded(v)
            }
            // the frame is dropped here, the generator stays `Completed`
            Some(Event::Return(())) | None => Step::Done,
            Some(Event::Panic(payload)) => {
                self.state = State::Failed(Error::from_panic(&*payload));
                Step::Panicked(payload)
            }
        }
    }

    /// Resume the body and buffer the value it yields.
    ///
    /// Returns `Ok(true)` if a new value is available through
    /// [`current`](Generator::current), `Ok(false)` once the sequence ended.
    /// If the body panics the failure is returned once, then the generator
    /// behaves as finished.
    pub fn advance(&mut self) -> Result<bool> {
        self.current = None;
        match self.step() {
            Step::Yielded(v) => {
                self.current = Some(v);
                Ok(true)
            }
            Step::Done => Ok(false),
            Step::Panicked(payload) => Err(Error::from_panic(&*payload)),
        }
    }

    /// The value buffered by the last successful `advance`.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Pull the next value, `Ok(None)` once the sequence ended.
    pub fn try_next(&mut self) -> Result<Option<T>> {
        self.advance()?;
        Ok(self.current.take())
    }

    /// The state tag of the generator.
    pub fn state(&self) -> GeneratorState {
        match self.state {
            State::NotStarted(_) => GeneratorState::NotStarted,
            State::Suspended(_) => GeneratorState::Suspended,
            State::Completed => GeneratorState::Completed,
            State::Failed(_) => GeneratorState::Failed,
        }
    }

    /// return true if the body returned or panicked
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Completed | State::Failed(_))
    }

    /// The failure of the body, if it panicked.
    pub fn failure(&self) -> Option<&Error> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl<'a, T: 'a> Iterator for Generator<'a, T> {
    type Item = T;

    /// Pull the next value.
    ///
    /// A panic of the body is re-raised here with its original payload.
    fn next(&mut self) -> Option<T> {
        self.current = None;
        match self.step() {
            Step::Yielded(v) => Some(v),
            Step::Done => None,
            Step::Panicked(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<'a, T: 'a> FusedIterator for Generator<'a, T> {}

impl<'a, T: 'a> fmt::Debug for Generator<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_start() {
        let mut ran = false;
        {
            let mut g = Generator::new(|y| {
                ran = true;
                y.yield_(1);
            });
            assert_eq!(g.state(), GeneratorState::NotStarted);
            assert_eq!(g.next(), Some(1));
            assert_eq!(g.state(), GeneratorState::Suspended);
            assert_eq!(g.next(), None);
            assert_eq!(g.state(), GeneratorState::Completed);
        }
        assert!(ran);
    }

    #[test]
    fn advance_and_current() {
        let mut g = Generator::new(|y| {
            y.yield_("a");
            y.yield_("b");
        });
        assert_eq!(g.current(), None);
        assert_eq!(g.advance(), Ok(true));
        assert_eq!(g.current(), Some(&"a"));
        assert_eq!(g.advance(), Ok(true));
        assert_eq!(g.current(), Some(&"b"));
        assert_eq!(g.advance(), Ok(false));
        assert_eq!(g.current(), None);
        assert!(g.is_done());
    }

    #[test]
    fn borrowed_body() {
        let data = vec![3, 1, 2];
        let g = Generator::new(|y| {
            for v in &data {
                y.yield_(*v * 10);
            }
        });
        assert_eq!(g.collect::<Vec<_>>(), [30, 10, 20]);
    }
}
