//! Common continuation queue structures for type-erased continuations.
//!
//! This module provides data structures for managing type-erased continuations,
//! used by the algebraic effect machinery in `src/effect/algebraic/`.
//!
//! # Design
//!
//! The "Reflection without Remorse" pattern is used to achieve O(1) `push`
//! and O(n) interpretation, avoiding the O(n^2) problem from nested `FlatMap`
//! structures.
//!
//! ## Key Components
//!
//! - [`TypeErasedArrow`]: Trait for type-erased continuations
//! - [`ContinuationQueue`]: Lazy-initialized queue with 3-state enum for O(1) push/pop
//!
//! # Invariants
//!
//! - **FIFO Order**: Continuations are processed in first-in-first-out order
//! - **Multi-shot**: Arrows are stored behind `Rc`, so a queue can be cloned
//!   and walked more than once without consuming the original — a handler
//!   that needs to resume the same continuation for several candidate values
//!   (non-deterministic choice, say) clones the queue once per candidate.

use std::any::Any;
use std::collections::VecDeque;
use std::rc::Rc;

/// Internal representation of a continuation queue with three states.
///
/// This enum enables lazy initialization and optimal memory usage:
/// - `Empty`: No continuations, no allocations
/// - `Single`: One continuation, only an `Rc` allocation
/// - `Multi`: Two or more continuations, uses `VecDeque`
///
/// # Invariants
///
/// - `Multi` always contains at least 2 elements
/// - FIFO order is maintained across all states
#[derive(Default)]
enum ContinuationQueueInner<M> {
    /// No continuations (zero allocation)
    #[default]
    Empty,
    /// Exactly one continuation (`Rc` only, no `VecDeque`)
    Single(Rc<dyn TypeErasedArrow<M>>),
    /// Two or more continuations (`VecDeque` for efficient FIFO)
    Multi(VecDeque<Rc<dyn TypeErasedArrow<M>>>),
}

impl<M> Clone for ContinuationQueueInner<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Single(arrow) => Self::Single(Rc::clone(arrow)),
            Self::Multi(deque) => Self::Multi(deque.clone()),
        }
    }
}

/// Type-erased arrow (continuation).
///
/// Converts `A -> M<B>` to `Box<dyn Any> -> M<Box<dyn Any>>`.
/// This enables storing heterogeneous continuations in a single queue.
///
/// # Type Parameters
///
/// - `M`: The monadic type that arrows produce (e.g., `Eff<R, Box<dyn Any>>`)
///
/// # Contract
///
/// - `apply` takes `&self`, so the same arrow may be applied more than once
///   (stored behind `Rc` for exactly that reason)
/// - Input type must match the expected type, otherwise panic
/// - Output is always wrapped in `Box<dyn Any>`
pub trait TypeErasedArrow<M> {
    /// Applies this continuation to the given input.
    ///
    /// # Arguments
    ///
    /// - `input`: Type-erased input value
    ///
    /// # Returns
    ///
    /// The monadic result with type-erased output
    ///
    /// # Panics
    ///
    /// Panics if the input type does not match the expected type.
    /// This indicates a bug in the DSL design.
    fn apply(&self, input: Box<dyn Any>) -> M;
}

/// Continuation queue with lazy initialization.
///
/// Stores type-erased continuations with optimal memory usage:
/// - Empty state: no allocations
/// - Single element: only an `Rc` allocation
/// - Multiple elements: `VecDeque` for O(1) push/pop
///
/// # Type Parameters
///
/// - `M`: The monadic type that arrows produce
///
/// # Invariants
///
/// - Continuations are processed in FIFO order
/// - `pop` returns `None` when empty
/// - Internal `Multi` state always has 2+ elements
///
/// # Note
///
/// This type implements `Clone`: cloning only bumps the `Rc` refcount of
/// every stored arrow (or, for `Multi`, clones the `VecDeque` of those
/// refcounted pointers), so a queue can be replayed from a snapshot without
/// disturbing whichever copy a caller still holds.
pub struct ContinuationQueue<M> {
    inner: ContinuationQueueInner<M>,
}

impl<M> Clone for ContinuationQueue<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M> ContinuationQueue<M> {
    /// Creates a new empty continuation queue.
    ///
    /// This operation is zero-cost: no heap allocations occur.
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            inner: ContinuationQueueInner::Empty,
        }
    }

    /// Returns `true` if the queue is empty.
    #[inline]
    pub(crate) const fn is_empty(&self) -> bool {
        matches!(self.inner, ContinuationQueueInner::Empty)
    }

    /// Removes and returns the first continuation from the queue.
    ///
    /// Returns `None` if the queue is empty.
    ///
    /// # State Transitions
    ///
    /// - `Empty` -> `Empty` (returns `None`)
    /// - `Single(a)` -> `Empty` (returns `Some(a)`)
    /// - `Multi([a, b])` -> `Single(b)` (returns `Some(a)`)
    /// - `Multi([a, b, c, ...])` -> `Multi([b, c, ...])` (returns `Some(a)`)
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<Rc<dyn TypeErasedArrow<M>>> {
        let inner = std::mem::take(&mut self.inner);

        match inner {
            ContinuationQueueInner::Empty => None,
            ContinuationQueueInner::Single(arrow) => Some(arrow),
            ContinuationQueueInner::Multi(mut deque) => {
                let arrow = deque
                    .pop_front()
                    .expect("Multi invariant: at least 2 elements");

                self.inner = if deque.len() == 1 {
                    ContinuationQueueInner::Single(deque.pop_front().expect("checked len == 1"))
                } else {
                    debug_assert!(deque.len() >= 2, "Multi invariant: at least 2 elements");
                    ContinuationQueueInner::Multi(deque)
                };
                Some(arrow)
            }
        }
    }

    /// Adds a continuation to the end of the queue.
    ///
    /// This is an O(1) amortized operation.
    ///
    /// # State Transitions
    ///
    /// - `Empty` -> `Single(a)`
    /// - `Single(a)` -> `Multi([a, b])`
    /// - `Multi(xs)` -> `Multi(xs ++ [a])`
    #[inline]
    pub(crate) fn push_arrow(&mut self, arrow: Rc<dyn TypeErasedArrow<M>>) {
        let inner = std::mem::take(&mut self.inner);

        self.inner = match inner {
            ContinuationQueueInner::Empty => ContinuationQueueInner::Single(arrow),
            ContinuationQueueInner::Single(existing) => {
                let mut deque = VecDeque::with_capacity(4);
                deque.push_back(existing);
                deque.push_back(arrow);
                ContinuationQueueInner::Multi(deque)
            }
            ContinuationQueueInner::Multi(mut deque) => {
                deque.push_back(arrow);
                ContinuationQueueInner::Multi(deque)
            }
        };
    }

    /// Returns the number of continuations in the queue.
    #[inline]
    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        match &self.inner {
            ContinuationQueueInner::Empty => 0,
            ContinuationQueueInner::Single(_) => 1,
            ContinuationQueueInner::Multi(deque) => deque.len(),
        }
    }
}

impl<M> Default for ContinuationQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // ==========================================================================
    // Test helper: Simple arrow that wraps a function
    // ==========================================================================

    struct SimpleArrow<F> {
        function: F,
    }

    impl<F> SimpleArrow<F> {
        fn new(function: F) -> Self {
            Self { function }
        }
    }

    // For testing, we use Box<dyn Any> as the monadic type
    impl<F> TypeErasedArrow<Box<dyn Any>> for SimpleArrow<F>
    where
        F: Fn(Box<dyn Any>) -> Box<dyn Any> + 'static,
    {
        fn apply(&self, input: Box<dyn Any>) -> Box<dyn Any> {
            (self.function)(input)
        }
    }

    fn make_add_one_arrow() -> Rc<dyn TypeErasedArrow<Box<dyn Any>>> {
        Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value + 1) as Box<dyn Any>
        }))
    }

    fn make_multiply_two_arrow() -> Rc<dyn TypeErasedArrow<Box<dyn Any>>> {
        Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value * 2) as Box<dyn Any>
        }))
    }

    // ==========================================================================
    // ContinuationQueue Tests
    // ==========================================================================

    #[rstest]
    fn continuation_queue_new_creates_empty_queue() {
        let queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[rstest]
    fn continuation_queue_default_creates_empty_queue() {
        let queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::default();
        assert!(queue.is_empty());
    }

    #[rstest]
    fn continuation_queue_push_increases_length() {
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);

        queue.push_arrow(make_multiply_two_arrow());
        assert_eq!(queue.len(), 2);
    }

    #[rstest]
    fn continuation_queue_pop_returns_arrows_in_fifo_order() {
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());

        // First pop: +1
        let arrow1 = queue.pop().expect("should have first arrow");
        let result1 = arrow1.apply(Box::new(10i32));
        assert_eq!(*result1.downcast::<i32>().unwrap(), 11); // 10 + 1

        // Second pop: *2
        let arrow2 = queue.pop().expect("should have second arrow");
        let result2 = arrow2.apply(Box::new(10i32));
        assert_eq!(*result2.downcast::<i32>().unwrap(), 20); // 10 * 2

        // Third pop: None
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[rstest]
    fn continuation_queue_pop_from_empty_returns_none() {
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        assert!(queue.pop().is_none());
    }

    #[rstest]
    fn continuation_queue_clone_is_independent_and_replayable() {
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());

        let mut snapshot = queue.clone();

        // Draining `queue` must not disturb `snapshot`.
        let first = queue.pop().expect("snapshot still has both arrows");
        assert_eq!(*first.apply(Box::new(10i32)).downcast::<i32>().unwrap(), 11);
        assert_eq!(queue.len(), 1);
        assert_eq!(snapshot.len(), 2);

        let replayed_first = snapshot.pop().expect("clone replays from the start");
        assert_eq!(
            *replayed_first
                .apply(Box::new(10i32))
                .downcast::<i32>()
                .unwrap(),
            11
        );
    }

    // ==========================================================================
    // ContinuationQueue State Transition Tests (3-state enum)
    // ==========================================================================

    #[rstest]
    fn continuation_queue_state_empty_to_single() {
        // Empty -> Single transition on first push
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);

        queue.push_arrow(make_add_one_arrow());
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[rstest]
    fn continuation_queue_state_single_to_multi() {
        // Single -> Multi transition on second push
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        assert_eq!(queue.len(), 1);

        queue.push_arrow(make_multiply_two_arrow());
        assert_eq!(queue.len(), 2);
        assert!(!queue.is_empty());
    }

    #[rstest]
    fn continuation_queue_state_multi_grows() {
        // Multi state grows with more pushes
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());
        queue.push_arrow(make_add_one_arrow());
        assert_eq!(queue.len(), 3);

        queue.push_arrow(make_multiply_two_arrow());
        assert_eq!(queue.len(), 4);
    }

    #[rstest]
    fn continuation_queue_state_single_to_empty() {
        // Single -> Empty transition on pop
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        assert_eq!(queue.len(), 1);

        let arrow = queue.pop();
        assert!(arrow.is_some());
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[rstest]
    fn continuation_queue_state_multi_to_single() {
        // Multi (2 elements) -> Single transition on pop
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());
        assert_eq!(queue.len(), 2);

        let arrow = queue.pop();
        assert!(arrow.is_some());
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());
    }

    #[rstest]
    fn continuation_queue_state_multi_shrinks() {
        // Multi (3+ elements) -> Multi (2+ elements) on pop
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());
        queue.push_arrow(make_add_one_arrow());
        assert_eq!(queue.len(), 3);

        let arrow = queue.pop();
        assert!(arrow.is_some());
        assert_eq!(queue.len(), 2);
    }

    #[rstest]
    fn continuation_queue_state_multi_to_single_to_empty() {
        // Full cycle: Multi -> Single -> Empty
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());
        assert_eq!(queue.len(), 2);

        queue.pop(); // Multi -> Single
        assert_eq!(queue.len(), 1);

        queue.pop(); // Single -> Empty
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[rstest]
    fn continuation_queue_fifo_order_with_three_elements() {
        // Verify FIFO order: first pushed is first popped
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();

        // Push: +1, *2, +1 (in this order)
        queue.push_arrow(Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value + 1) as Box<dyn Any>
        })));
        queue.push_arrow(Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value * 2) as Box<dyn Any>
        })));
        queue.push_arrow(Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value + 100) as Box<dyn Any>
        })));

        // Pop order should be: +1, *2, +100
        let result1 = queue.pop().unwrap().apply(Box::new(10i32));
        assert_eq!(*result1.downcast::<i32>().unwrap(), 11); // 10 + 1

        let result2 = queue.pop().unwrap().apply(Box::new(10i32));
        assert_eq!(*result2.downcast::<i32>().unwrap(), 20); // 10 * 2

        let result3 = queue.pop().unwrap().apply(Box::new(10i32));
        assert_eq!(*result3.downcast::<i32>().unwrap(), 110); // 10 + 100

        assert!(queue.is_empty());
    }

    #[rstest]
    fn continuation_queue_interleaved_push_pop() {
        // Test interleaved push and pop operations
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();

        // Push +1, then pop
        queue.push_arrow(Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value + 1) as Box<dyn Any>
        })));
        let r1 = queue.pop().unwrap().apply(Box::new(10i32));
        assert_eq!(*r1.downcast::<i32>().unwrap(), 11);
        assert!(queue.is_empty());

        // Push *2 and +100, then pop both
        queue.push_arrow(Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value * 2) as Box<dyn Any>
        })));
        queue.push_arrow(Rc::new(SimpleArrow::new(|input: Box<dyn Any>| {
            let value = *input.downcast::<i32>().expect("expected i32");
            Box::new(value + 100) as Box<dyn Any>
        })));
        assert_eq!(queue.len(), 2);

        let r2 = queue.pop().unwrap().apply(Box::new(10i32));
        assert_eq!(*r2.downcast::<i32>().unwrap(), 20); // *2

        let r3 = queue.pop().unwrap().apply(Box::new(10i32));
        assert_eq!(*r3.downcast::<i32>().unwrap(), 110); // +100

        assert!(queue.is_empty());
    }

    #[rstest]
    fn continuation_queue_state_multi_single_multi_roundtrip() {
        // Test roundtrip: Multi -> Single -> Multi -> Single -> Empty
        let mut queue: ContinuationQueue<Box<dyn Any>> = ContinuationQueue::new();

        // Build up to Multi (3 elements)
        queue.push_arrow(make_add_one_arrow());
        queue.push_arrow(make_multiply_two_arrow());
        queue.push_arrow(make_add_one_arrow());
        assert_eq!(queue.len(), 3);

        // Multi -> Multi (3 -> 2)
        queue.pop();
        assert_eq!(queue.len(), 2);

        // Multi -> Single (2 -> 1)
        queue.pop();
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());

        // Single -> Multi (1 -> 2): add two more
        queue.push_arrow(make_multiply_two_arrow());
        assert_eq!(queue.len(), 2);
        queue.push_arrow(make_add_one_arrow());
        assert_eq!(queue.len(), 3);

        // Multi -> Single -> Empty
        queue.pop();
        assert_eq!(queue.len(), 2);
        queue.pop();
        assert_eq!(queue.len(), 1);
        queue.pop();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }
}
