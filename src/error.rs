//! Error type shared by the pool, generators and tasks
use std::any::Any;
use std::{error, fmt, result};

/// The error surfaced to the consumer of a job, generator or task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// the computation panicked, holds the panic message
    Panicked(String),
    /// the pool is shutting down and no longer accepts jobs
    ShutDown,
    /// the result can never be produced: a job handle whose job was dropped
    /// unrun, or a task whose awaitable dropped every resumer without
    /// resuming it
    Canceled,
}

/// `Result` alias with [`Error`] as the error type
pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// build an error out of a panic payload
    ///
    /// a payload that already is an `Error` (a failure re-raised inside a
    /// task body) is passed through unchanged
    pub fn from_panic(payload: &(dyn Any + Send)) -> Error {
        match payload.downcast_ref::<Error>() {
            Some(err) => err.clone(),
            None => Error::Panicked(panic_message(payload)),
        }
    }

    /// return true if the error was caused by a panic
    pub fn is_panic(&self) -> bool {
        matches!(self, Error::Panicked(_))
    }
}

/// extract the message out of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Panicked(msg) => write!(f, "computation panicked: {msg}"),
            Error::ShutDown => write!(f, "thread pool is shutting down"),
            Error::Canceled => write!(f, "computation canceled before it finished"),
        }
    }
}

impl error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn panic_payloads() {
        let err = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(Error::from_panic(&*err), Error::Panicked("boom".into()));

        let n = 7;
        let err = panic::catch_unwind(|| panic!("boom {n}")).unwrap_err();
        assert_eq!(Error::from_panic(&*err), Error::Panicked("boom 7".into()));

        let err = panic::catch_unwind(|| panic::panic_any(42u32)).unwrap_err();
        assert_eq!(Error::from_panic(&*err), Error::Panicked("Box<dyn Any>".into()));

        let err = panic::catch_unwind(|| panic::resume_unwind(Box::new(Error::ShutDown)));
        assert_eq!(Error::from_panic(&*err.unwrap_err()), Error::ShutDown);
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::Panicked("oops".into()).to_string(),
            "computation panicked: oops"
        );
        assert_eq!(Error::ShutDown.to_string(), "thread pool is shutting down");
        assert_eq!(
            Error::Canceled.to_string(),
            "computation canceled before it finished"
        );
        assert!(Error::Panicked(String::new()).is_panic());
        assert!(!Error::Canceled.is_panic());
    }
}
