use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::{Backoff, CachePadded};

struct Node<T> {
    // only the thread that unlinked the node reads the value out
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

/// A lock-free LIFO stack (Treiber stack).
///
/// Any number of threads may `push` and `pop` concurrently without an
/// external lock. Both operations are a CAS retry loop on the head pointer,
/// a failed CAS always means another thread made progress.
///
/// # Reclamation
///
/// A popped node is not freed on the spot. Each operation pins the calling
/// thread in the global epoch for its duration and the unlinked node is
/// retired with `defer_destroy`; the memory is released once no pinned thread
/// could still be looking at it. Callers don't need to announce quiescent
/// points themselves, the per operation pin is all it takes. The value inside
/// the node is moved out to the caller right away, only the node allocation
/// lives a little longer.
///
/// # Examples
///
/// ```
/// use cokit_stack::Stack;
///
/// let stack = Stack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct Stack<T> {
    head: CachePadded<Atomic<Node<T>>>,
}

// values are only ever moved between threads, never shared
unsafe impl<T: Send> Send for Stack<T> {}
unsafe impl<T: Send> Sync for Stack<T> {}

impl<T> Stack<T> {
    /// Creates an empty stack.
    pub fn new() -> Stack<T> {
        Stack {
            head: CachePadded::new(Atomic::null()),
        }
    }

    /// Pushes `value` on top of the stack. Never blocks.
    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });

        let guard = &epoch::pin();
        let backoff = Backoff::new();
        loop {
            // the snapshot is not dereferenced, relaxed is enough
            let head = self.head.load(Relaxed, guard);
            node.next.store(head, Relaxed);

            match self.head.compare_exchange(head, node, Release, Relaxed, guard) {
                Ok(_) => return,
                Err(e) => {
                    // take the node back and retry with a fresh head
                    node = e.new;
                    backoff.spin();
                }
            }
        }
    }

    /// Pops the value on top of the stack, `None` if the stack is empty.
    /// Never blocks.
    pub fn pop(&self) -> Option<T> {
        let guard = &epoch::pin();
        let backoff = Backoff::new();
        loop {
            let head = self.head.load(Acquire, guard);
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Relaxed, guard);

            if self
                .head
                .compare_exchange(head, next, Release, Relaxed, guard)
                .is_ok()
            {
                unsafe {
                    // we own the value now, the node is freed after the epoch moves on
                    let value = ptr::read(&node.value);
                    guard.defer_destroy(head);
                    return Some(ManuallyDrop::into_inner(value));
                }
            }
            backoff.spin();
        }
    }

    /// Returns `true` if the stack holds no value at this instant.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        self.head.load(Acquire, guard).is_null()
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Stack::new()
    }
}

impl<T> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        // we have `&mut self`, no other thread can reach the nodes
        unsafe {
            let guard = epoch::unprotected();
            let mut cur = self.head.load(Relaxed, guard);
            while let Some(node) = cur.as_ref() {
                let next = node.next.load(Relaxed, guard);
                let mut owned = cur.into_owned();
                ManuallyDrop::drop(&mut owned.value);
                cur = next;
            }
        }
    }
}
