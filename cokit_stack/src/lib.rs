//! Lock-free building blocks for `cokit`.
//!
//! Currently this only hosts the Treiber [`Stack`]. Nodes popped from the
//! stack are retired through `crossbeam-epoch`, so the classic ABA and
//! use-after-free hazard of a naive node based stack can't happen.

mod treiber;

pub use treiber::Stack;
