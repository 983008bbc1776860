//! Ready made generators.

use crate::generator::Generator;

/// `start, start + 1, ..` up to but excluding `end`
pub fn range(start: i64, end: i64) -> Generator<'static, i64> {
    Generator::new(move |y| {
        let mut i = start;
        while i < end {
            y.yield_(i);
            i += 1;
        }
    })
}

/// the first `count` fibonacci numbers, starting with 0
///
/// stops early instead of overflowing
pub fn fibonacci(count: usize) -> Generator<'static, u64> {
    Generator::new(move |y| {
        let (mut a, mut b) = (Some(0u64), Some(1u64));
        for _ in 0..count {
            let Some(cur) = a else { break };
            y.yield_(cur);
            let next = b.and_then(|b| cur.checked_add(b));
            a = b;
            b = next;
        }
    })
}

/// every even number in `0..=max`
pub fn even_numbers(max: i64) -> Generator<'static, i64> {
    Generator::new(move |y| {
        let mut i = 0;
        while i <= max {
            y.yield_(i);
            i += 2;
        }
    })
}

/// the whitespace separated words of `text`
pub fn words(text: &str) -> Generator<'_, &str> {
    Generator::new(move |y| {
        for w in text.split_whitespace() {
            y.yield_(w);
        }
    })
}

/// A binary tree
#[derive(Debug)]
pub struct Tree<T> {
    pub value: T,
    pub left: Option<Box<Tree<T>>>,
    pub right: Option<Box<Tree<T>>>,
}

impl<T> Tree<T> {
    /// a node without children
    pub fn leaf(value: T) -> Self {
        Tree {
            value,
            left: None,
            right: None,
        }
    }

    /// a node with two subtrees
    pub fn node(value: T, left: Tree<T>, right: Tree<T>) -> Self {
        Tree {
            value,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// Walk the tree in order: left subtree, node, right subtree.
    ///
    /// Each subtree is walked by its own nested generator.
    pub fn inorder(&self) -> Generator<'_, &T> {
        Generator::new(move |y| {
            if let Some(left) = &self.left {
                y.yield_from(left.inorder());
            }
            y.yield_(&self.value);
            if let Some(right) = &self.right {
                y.yield_from(right.inorder());
            }
        })
    }
}
