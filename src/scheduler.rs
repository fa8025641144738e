//! Discrete-event scheduler: a virtual-time priority queue with stable FIFO
//! ordering on ties and lazy-delete cancellation.
//!
//! Grounded on the teacher's `Scheduler` trait / `EventQueue` (schedule,
//! pop, next_time, FIFO-on-ties), generalized to a payload type `K` instead
//! of a fixed `EventKind`, and on its `SimClock` for the underlying notion
//! of a monotonic virtual `now`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::time::{SimDuration, SimTime};

/// Handle returned by [`Scheduler::in_`]/[`Scheduler::at`]; pass to
/// [`Scheduler::cancel`] to remove the event before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapKey {
    when: SimTime,
    seq: u64,
    id: u64,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so `BinaryHeap` (a max-heap) pops the smallest (when, seq).
        other
            .when
            .cmp(&self.when)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A time-ordered queue of pending payloads of type `K`.
///
/// Time never advances except when the scheduler pops an event: `now()` is
/// a pure read until `step_one`/`step`/`step_for`/`step_until`/`step_while`
/// moves it forward to the timestamp of whatever they dispatch.
pub struct Scheduler<K> {
    heap: BinaryHeap<HeapKey>,
    slots: HashMap<u64, K>,
    next_seq: u64,
    next_id: u64,
    now: SimTime,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Scheduler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            slots: HashMap::new(),
            next_seq: 0,
            next_id: 0,
            now: SimTime::ZERO,
        }
    }

    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedules `payload` to fire `delay` after `now()`.
    pub fn in_(&mut self, delay: SimDuration, payload: K) -> CancelHandle {
        self.at(self.now + delay, payload)
    }

    /// Schedules `payload` to fire at the absolute instant `when`.
    pub fn at(&mut self, when: SimTime, payload: K) -> CancelHandle {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(HeapKey { when, seq, id });
        self.slots.insert(id, payload);
        CancelHandle(id)
    }

    /// Removes the event if it has not yet been dispatched. Canceling an
    /// event that already fired (or an unknown handle) is a silent no-op.
    pub fn cancel(&mut self, handle: CancelHandle) -> bool {
        self.slots.remove(&handle.0).is_some()
    }

    #[must_use]
    pub fn empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    /// Timestamp of the next live event, skipping any canceled entries still
    /// sitting in the heap.
    #[must_use]
    pub fn peek_time(&mut self) -> Option<SimTime> {
        while let Some(top) = self.heap.peek() {
            if self.slots.contains_key(&top.id) {
                return Some(top.when);
            }
            self.heap.pop();
        }
        None
    }

    fn pop_ready(&mut self) -> Option<(SimTime, K)> {
        loop {
            let top = self.heap.pop()?;
            if let Some(payload) = self.slots.remove(&top.id) {
                return Some((top.when, payload));
            }
            // Canceled entry; discard and keep looking.
        }
    }

    /// Pops the earliest live event and advances `now` to its timestamp,
    /// without running any dispatch. Lets a caller that already holds
    /// `&mut self` elsewhere (e.g. a struct destructured for disjoint
    /// borrows) separate "pop" from "handle" across two statements.
    pub(crate) fn pop_one(&mut self) -> Option<(SimTime, K)> {
        let (when, payload) = self.pop_ready()?;
        self.now = when;
        Some((when, payload))
    }

    /// Pops the earliest live event, advances `now` to its timestamp, and
    /// runs `dispatch` on it. Returns `true` if an event was processed.
    pub fn step_one(&mut self, mut dispatch: impl FnMut(SimTime, K)) -> bool {
        let Some((when, payload)) = self.pop_one() else {
            return false;
        };
        dispatch(when, payload);
        true
    }

    /// Runs every event with `when <= now()`, including ones enqueued by
    /// `dispatch` during the loop. Returns the number processed.
    pub fn step(&mut self, mut dispatch: impl FnMut(SimTime, K)) -> usize {
        let limit = self.now;
        let mut count = 0;
        while matches!(self.peek_time(), Some(t) if t <= limit) {
            if !self.step_one(&mut dispatch) {
                break;
            }
            count += 1;
        }
        count
    }

    /// Drains events for `delay` of virtual time.
    pub fn step_for(&mut self, delay: SimDuration, dispatch: impl FnMut(SimTime, K)) -> usize {
        self.step_until(self.now + delay, dispatch)
    }

    /// Drains events whose `when <= end`, then advances `now` to `end`
    /// (whether the queue emptied or the head now exceeds `end`).
    pub fn step_until(&mut self, end: SimTime, mut dispatch: impl FnMut(SimTime, K)) -> usize {
        let mut count = 0;
        while matches!(self.peek_time(), Some(t) if t <= end) {
            if !self.step_one(&mut dispatch) {
                break;
            }
            count += 1;
        }
        if self.now < end {
            self.now = end;
        }
        count
    }

    /// Calls `step_one` while `pred()` holds; stops when `pred()` returns
    /// false or the queue empties.
    pub fn step_while(
        &mut self,
        mut pred: impl FnMut() -> bool,
        mut dispatch: impl FnMut(SimTime, K),
    ) -> usize {
        let mut count = 0;
        while pred() {
            if !self.step_one(&mut dispatch) {
                break;
            }
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.at(SimTime::from_nanos(1000), 1);
        s.at(SimTime::from_nanos(500), 2);
        s.at(SimTime::from_nanos(1500), 3);

        let mut out = Vec::new();
        while s.step_one(|_, p| out.push(p)) {}
        assert_eq!(out, vec![2, 1, 3]);
    }

    #[test]
    fn fifo_at_same_time() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.at(SimTime::from_nanos(1000), 1);
        s.at(SimTime::from_nanos(1000), 2);
        s.at(SimTime::from_nanos(1000), 3);

        let mut out = Vec::new();
        while s.step_one(|_, p| out.push(p)) {}
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn scheduler_tie_break_scenario() {
        // §8 scenario 6: A at 100ms, B at 50ms, C at 150ms; step 200ms.
        let at_ms = |ms: u64| SimTime::ZERO + SimDuration::from_millis(ms);
        let mut s: Scheduler<&'static str> = Scheduler::new();
        s.at(at_ms(100), "A");
        s.at(at_ms(50), "B");
        s.at(at_ms(150), "C");

        let mut out = Vec::new();
        s.step_until(at_ms(200), |_, p| out.push(p));
        assert_eq!(out, vec!["B", "A", "C"]);
    }

    #[test]
    fn cancel_before_dispatch_is_noop_after() {
        let mut s: Scheduler<u32> = Scheduler::new();
        let h = s.at(SimTime::from_nanos(100), 1);
        assert!(s.cancel(h));
        assert!(!s.cancel(h)); // second cancel is a no-op
        assert!(!s.step_one(|_, _| panic!("canceled event must not fire")));
    }

    #[test]
    fn cancel_after_dispatch_is_noop() {
        let mut s: Scheduler<u32> = Scheduler::new();
        let h = s.at(SimTime::from_nanos(100), 1);
        assert!(s.step_one(|_, _| {}));
        assert!(!s.cancel(h));
    }

    #[test]
    fn step_until_advances_now_when_queue_outlasts_end() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.at(SimTime::from_nanos(1000), 1);
        let mut out = Vec::new();
        s.step_until(SimTime::from_nanos(10), |_, p| out.push(p));
        assert!(out.is_empty());
        assert_eq!(s.now(), SimTime::from_nanos(10));
    }

    #[test]
    fn pending_count_and_empty() {
        let mut s: Scheduler<u32> = Scheduler::new();
        assert!(s.empty());
        s.at(SimTime::from_nanos(1), 1);
        s.at(SimTime::from_nanos(2), 2);
        assert_eq!(s.pending_count(), 2);
        s.step_one(|_, _| {});
        assert_eq!(s.pending_count(), 1);
    }
}
