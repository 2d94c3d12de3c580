//! Ordered Containers
//!
//! Small bounded stack and queue primitives used by the reactive engine:
//! the running-effect context is a uniqueness-enforcing stack, and the
//! queue scheduler buffers deferred effects in a uniqueness-enforcing
//! queue.
//!
//! Both containers share the same configuration surface: an optional
//! capacity and an optional uniqueness constraint. Insertions report
//! rejection through [`PushError`] instead of panicking; a full or
//! duplicate insert leaves the container unchanged.

use thiserror::Error;

/// Rejection reason for an insert into a bounded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// The container is at capacity.
    #[error("container is at capacity")]
    Full,

    /// The container enforces uniqueness and already holds this element.
    #[error("element is already present")]
    Duplicate,
}

/// A last-in-first-out container with optional capacity and uniqueness.
#[derive(Debug, Clone)]
pub struct Stack<T> {
    elements: Vec<T>,
    cap: Option<usize>,
    unique: bool,
}

impl<T> Stack<T> {
    /// Create an unbounded stack.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            cap: None,
            unique: false,
        }
    }

    /// Create a stack that rejects pushes beyond `cap` elements.
    pub fn bounded(cap: usize) -> Self {
        Self {
            elements: Vec::new(),
            cap: Some(cap),
            unique: false,
        }
    }

    /// Enforce element uniqueness on this stack.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The element most recently pushed, if any.
    pub fn top(&self) -> Option<&T> {
        self.elements.last()
    }

    /// Remove and return the most recently pushed element.
    pub fn pop(&mut self) -> Option<T> {
        self.elements.pop()
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the container holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether the container is at capacity. Unbounded containers are
    /// never full.
    pub fn is_full(&self) -> bool {
        self.cap.is_some_and(|cap| self.elements.len() >= cap)
    }

    /// The configured capacity, if any.
    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    /// Change the capacity. Elements beyond the new capacity are dropped,
    /// most recently pushed first.
    pub fn set_cap(&mut self, cap: Option<usize>) {
        self.cap = cap;
        if let Some(cap) = cap {
            self.elements.truncate(cap);
        }
    }

    /// Drop all elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

impl<T: PartialEq> Stack<T> {
    /// Push an element, rejecting it when the stack is full or, under the
    /// uniqueness constraint, already holds an equal element.
    pub fn push(&mut self, element: T) -> Result<(), PushError> {
        if self.is_full() {
            return Err(PushError::Full);
        }
        if self.unique && self.elements.contains(&element) {
            return Err(PushError::Duplicate);
        }
        self.elements.push(element);
        Ok(())
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A first-in-first-out container with optional capacity and uniqueness.
#[derive(Debug, Clone)]
pub struct Queue<T> {
    elements: Vec<T>,
    cap: Option<usize>,
    unique: bool,
}

impl<T> Queue<T> {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            cap: None,
            unique: false,
        }
    }

    /// Create a queue that rejects inserts beyond `cap` elements.
    pub fn bounded(cap: usize) -> Self {
        Self {
            elements: Vec::new(),
            cap: Some(cap),
            unique: false,
        }
    }

    /// Enforce element uniqueness on this queue.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The element at the front of the queue, if any.
    pub fn front(&self) -> Option<&T> {
        self.elements.first()
    }

    /// Remove and return the element at the front of the queue.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.elements.is_empty() {
            None
        } else {
            Some(self.elements.remove(0))
        }
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the container holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether the container is at capacity. Unbounded containers are
    /// never full.
    pub fn is_full(&self) -> bool {
        self.cap.is_some_and(|cap| self.elements.len() >= cap)
    }

    /// The configured capacity, if any.
    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    /// Change the capacity. Elements beyond the new capacity are dropped
    /// from the back of the queue.
    pub fn set_cap(&mut self, cap: Option<usize>) {
        self.cap = cap;
        if let Some(cap) = cap {
            self.elements.truncate(cap);
        }
    }

    /// Drop all elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

impl<T: PartialEq> Queue<T> {
    /// Enqueue an element, rejecting it when the queue is full or, under
    /// the uniqueness constraint, already holds an equal element.
    pub fn enqueue(&mut self, element: T) -> Result<(), PushError> {
        if self.is_full() {
            return Err(PushError::Full);
        }
        if self.unique && self.elements.contains(&element) {
            return Err(PushError::Duplicate);
        }
        self.elements.push(element);
        Ok(())
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_push_and_pop_are_lifo() {
        let mut stack = Stack::new();
        assert!(stack.push(1).is_ok());
        assert!(stack.push(2).is_ok());
        assert!(stack.push(3).is_ok());

        assert_eq!(stack.top(), Some(&3));
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn bounded_unique_stack_rejects_duplicates_and_overflow() {
        let mut stack = Stack::bounded(2).unique();

        assert_eq!(stack.push("a"), Ok(()));
        assert_eq!(stack.push("a"), Err(PushError::Duplicate));
        assert_eq!(stack.push("b"), Ok(()));
        assert_eq!(stack.push("c"), Err(PushError::Full));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn rejected_push_leaves_stack_unchanged() {
        let mut stack = Stack::bounded(1);
        assert!(stack.push(10).is_ok());
        assert!(stack.push(20).is_err());
        assert_eq!(stack.top(), Some(&10));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn stack_set_cap_truncates() {
        let mut stack = Stack::new();
        for i in 0..5 {
            stack.push(i).unwrap();
        }

        stack.set_cap(Some(3));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.top(), Some(&2));
        assert!(stack.is_full());

        stack.set_cap(None);
        assert!(!stack.is_full());
    }

    #[test]
    fn zero_capacity_stack_is_always_full() {
        let mut stack = Stack::bounded(0);
        assert!(stack.is_full());
        assert_eq!(stack.push(1), Err(PushError::Full));
        assert!(stack.is_empty());
    }

    #[test]
    fn queue_is_fifo() {
        let mut queue = Queue::new();
        assert!(queue.enqueue(1).is_ok());
        assert!(queue.enqueue(2).is_ok());
        assert!(queue.enqueue(3).is_ok());

        assert_eq!(queue.front(), Some(&1));
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn unique_queue_rejects_duplicates() {
        let mut queue = Queue::new().unique();
        assert_eq!(queue.enqueue(7), Ok(()));
        assert_eq!(queue.enqueue(7), Err(PushError::Duplicate));
        assert_eq!(queue.dequeue(), Some(7));

        // Once dequeued, the element may be enqueued again.
        assert_eq!(queue.enqueue(7), Ok(()));
    }

    #[test]
    fn queue_clear_empties() {
        let mut queue = Queue::bounded(4);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
    }
}
