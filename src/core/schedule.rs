//! Scheduled Tasks
//!
//! Delayed actions keyed by expiry time, polled once per tick.
//! Simultaneous expiries come out in insertion order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};

/// Handle returned by [`Scheduler::schedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

#[derive(Clone, Debug)]
struct Scheduled<T> {
    due: f64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Sort by: due time, then insertion sequence
        self.due
            .total_cmp(&other.due)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of tasks ordered by `(due, insertion sequence)`.
#[derive(Clone, Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<Reverse<Scheduled<T>>>,
    cancelled: BTreeSet<u64>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: BTreeSet::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` to fire once the clock reaches `due`.
    pub fn schedule(&mut self, due: f64, task: T) -> TaskId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { due, seq, task }));
        TaskId(seq)
    }

    /// Cancel a pending task. Returns false if it already fired or was unknown.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let pending = self.heap.iter().any(|Reverse(s)| s.seq == id.0);
        pending && self.cancelled.insert(id.0)
    }

    /// Pop every task due at or before `now`, in deterministic order.
    pub fn poll(&mut self, now: f64) -> Vec<T> {
        let mut fired = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.due > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                if !self.cancelled.remove(&entry.seq) {
                    fired.push(entry.task);
                }
            }
        }
        fired
    }

    /// Remove every pending task, returning them in expiry order.
    pub fn drain_all(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.heap.len());
        while let Some(Reverse(entry)) = self.heap.pop() {
            if !self.cancelled.remove(&entry.seq) {
                drained.push(entry.task);
            }
        }
        self.cancelled.clear();
        drained
    }

    /// Expiry of the earliest live task.
    pub fn next_due(&self) -> Option<f64> {
        self.heap
            .iter()
            .filter(|Reverse(s)| !self.cancelled.contains(&s.seq))
            .map(|Reverse(s)| s.due)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_in_due_order() {
        let mut sched = Scheduler::new();
        sched.schedule(3.0, "c");
        sched.schedule(1.0, "a");
        sched.schedule(2.0, "b");

        assert_eq!(sched.poll(0.5), Vec::<&str>::new());
        assert_eq!(sched.poll(2.0), vec!["a", "b"]);
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.next_due(), Some(3.0));
    }

    #[test]
    fn test_simultaneous_expiry_uses_insertion_order() {
        let mut sched = Scheduler::new();
        for label in ["first", "second", "third"] {
            sched.schedule(5.0, label);
        }
        assert_eq!(sched.poll(5.0), vec!["first", "second", "third"]);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut sched = Scheduler::new();
        let a = sched.schedule(1.0, 1);
        sched.schedule(1.0, 2);
        assert!(sched.cancel(a));
        assert!(!sched.cancel(a));
        assert_eq!(sched.len(), 1);
        assert_eq!(sched.poll(10.0), vec![2]);
        assert!(!sched.cancel(TaskId(99)));
    }

    #[test]
    fn test_drain_all() {
        let mut sched = Scheduler::new();
        sched.schedule(9.0, 'x');
        sched.schedule(4.0, 'y');
        assert_eq!(sched.drain_all(), vec!['y', 'x']);
        assert!(sched.is_empty());
        assert_eq!(sched.next_due(), None);
    }
}
