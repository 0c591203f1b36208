//! # Event Queue

use std::collections::VecDeque;

use serde::Deserialize;

/// What happens to events beyond the per-packet cap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardPolicy {
    /// Every queued event is removed after a flush, sent or not.
    #[default]
    DiscardOverflow,
    /// Unsent events stay queued up to the cap; older excess is dropped.
    CarryForward,
}

/// Result of truncating a queue after a flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Events written to the packet.
    pub sent: usize,
    /// Events removed without being sent.
    pub dropped: usize,
    /// Events left for the next packet.
    pub remaining: usize,
}

/// Bounded FIFO of pending events.
///
/// `max_pending` bounds growth between flushes (for example while a client
/// waits out a full update). When full, the oldest event is evicted.
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    pending: VecDeque<T>,
    max_pending: usize,
    evicted: u64,
}

impl<T> EventQueue<T> {
    /// Creates an empty queue holding at most `max_pending` events.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending.min(256)),
            max_pending,
            evicted: 0,
        }
    }

    /// Appends an event. Returns false if the oldest event had to be evicted.
    pub fn push(&mut self, event: T) -> bool {
        if self.max_pending == 0 {
            self.evicted += 1;
            return false;
        }
        let room = self.pending.len() < self.max_pending;
        if !room {
            self.pending.pop_front();
            self.evicted += 1;
        }
        self.pending.push_back(event);
        room
    }

    /// Oldest `max` events, in order.
    pub fn batch(&mut self, max: usize) -> &[T] {
        let n = self.pending.len().min(max);
        &self.pending.make_contiguous()[..n]
    }

    /// Truncates the queue after `sent` events went into a packet whose
    /// cap was `max`.
    pub fn flush(&mut self, sent: usize, max: usize, policy: DiscardPolicy) -> FlushReport {
        let total = self.pending.len();
        let sent = sent.min(total);

        let remove = match policy {
            DiscardPolicy::DiscardOverflow => total,
            DiscardPolicy::CarryForward => {
                let excess = total.saturating_sub(sent + max);
                sent + excess
            }
        };

        self.pending.drain(..remove);
        FlushReport {
            sent,
            dropped: remove - sent,
            remaining: self.pending.len(),
        }
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Events evicted on push since creation.
    #[inline]
    #[must_use]
    pub const fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Drops every pending event.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: u32) -> EventQueue<u32> {
        let mut queue = EventQueue::new(1024);
        for i in 0..n {
            queue.push(i);
        }
        queue
    }

    #[test]
    fn test_batch_is_capped() {
        let mut queue = filled(30);
        assert_eq!(queue.batch(20).len(), 20);
        assert_eq!(queue.batch(20)[0], 0);
        assert_eq!(queue.batch(100).len(), 30);
    }

    #[test]
    fn test_discard_overflow_empties_queue() {
        let mut queue = filled(30);
        let report = queue.flush(20, 20, DiscardPolicy::DiscardOverflow);
        assert_eq!(
            report,
            FlushReport {
                sent: 20,
                dropped: 10,
                remaining: 0
            }
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_carry_forward_keeps_backlog() {
        let mut queue = filled(30);
        let report = queue.flush(20, 20, DiscardPolicy::CarryForward);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.remaining, 10);
        assert_eq!(queue.batch(1)[0], 20);
    }

    #[test]
    fn test_carry_forward_bounds_backlog() {
        let mut queue = filled(100);
        let report = queue.flush(20, 20, DiscardPolicy::CarryForward);
        assert_eq!(report.sent, 20);
        assert_eq!(report.dropped, 60);
        assert_eq!(report.remaining, 20);
        // Newest events survive
        assert_eq!(queue.batch(1)[0], 80);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut queue = EventQueue::new(2);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(!queue.push(3));
        assert_eq!(queue.batch(2), &[2, 3]);
        assert_eq!(queue.evicted(), 1);
    }

    #[test]
    fn test_empty_flush() {
        let mut queue: EventQueue<u32> = EventQueue::new(4);
        assert_eq!(queue.flush(0, 20, DiscardPolicy::CarryForward), FlushReport::default());
    }
}
