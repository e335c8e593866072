use cwnd_lab_abstract::{EventFn, EventHandle, SimContext, SimTime};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::trace;

struct Scheduled {
    time: SimTime,
    id: u64,
    event: EventFn,
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison: smallest (time, id) is Greater in BinaryHeap,
        // so same-time events fire in registration order.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// The discrete-event scheduler: a virtual clock plus a priority queue of
/// one-shot callbacks.
///
/// Strictly single-threaded; one callback runs at a time and all shared
/// state mutation is safe by that execution guarantee alone.
#[derive(Default)]
pub struct Kernel {
    now: SimTime,
    queue: BinaryHeap<Scheduled>,
    next_id: u64,
    cancelled: HashSet<u64>,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.len().saturating_sub(self.cancelled.len())
    }

    /// Executes the next due event. Returns false once the queue is empty.
    pub fn step(&mut self) -> bool {
        let scheduled = match self.queue.pop() {
            Some(s) => s,
            None => return false,
        };
        if self.cancelled.remove(&scheduled.id) {
            trace!(id = scheduled.id, "skipping cancelled event");
            return true;
        }
        self.now = scheduled.time;
        (scheduled.event)(self);
        true
    }

    /// Drains the queue completely.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Executes every event due at or before `stop`, then pins the clock
    /// at `stop`. Events scheduled later are abandoned, which bounds all
    /// self-rescheduling activity by the global stop.
    pub fn run_until(&mut self, stop: SimTime) {
        while let Some(due) = self.queue.peek().map(|s| s.time) {
            if due > stop {
                break;
            }
            self.step();
        }
        self.now = self.now.max(stop);
    }
}

impl SimContext for Kernel {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule_after(&mut self, delay: SimTime, event: EventFn) -> EventHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Scheduled {
            time: self.now + delay,
            id,
            event,
        });
        EventHandle::from_raw(id)
    }

    fn cancel(&mut self, handle: EventHandle) {
        self.cancelled.insert(handle.raw());
    }
}
