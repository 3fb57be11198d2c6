//! FIFO request queue
//!
//! Insertion order is processing order. The queue is unbounded and performs
//! no validation or deduplication; all mutation happens on the worker's
//! drain path, so no synchronization is required.

use crate::error::{Result, WorkerError};
use std::collections::VecDeque;

/// A pending background-removal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Encoded image bytes, opaque at this layer
    pub image: Vec<u8>,
    /// Caller-supplied correlation index
    pub index: u64,
}

/// Ordered, unbounded buffer of pending requests
#[derive(Debug, Default)]
pub struct RequestQueue {
    items: VecDeque<Request>,
}

impl RequestQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append a request to the tail
    pub fn enqueue(&mut self, request: Request) {
        self.items.push_back(request);
    }

    /// Remove and return the head of the queue
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::EmptyQueue` when no requests are pending;
    /// callers check `is_empty` first on the drain path.
    pub fn dequeue_front(&mut self) -> Result<Request> {
        self.items.pop_front().ok_or(WorkerError::EmptyQueue)
    }

    /// Number of pending requests
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue has no pending requests
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(index: u64) -> Request {
        Request {
            image: vec![index as u8],
            index,
        }
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut queue = RequestQueue::new();
        for index in 0..5 {
            queue.enqueue(request(index));
        }
        assert_eq!(queue.len(), 5);

        for expected in 0..5 {
            assert_eq!(queue.dequeue_front().unwrap().index, expected);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_empty_fails() {
        let mut queue = RequestQueue::new();
        assert!(matches!(
            queue.dequeue_front(),
            Err(WorkerError::EmptyQueue)
        ));
    }

    #[test]
    fn test_duplicate_indices_allowed() {
        // No deduplication at this layer
        let mut queue = RequestQueue::new();
        queue.enqueue(request(7));
        queue.enqueue(request(7));
        assert_eq!(queue.len(), 2);
    }
}
