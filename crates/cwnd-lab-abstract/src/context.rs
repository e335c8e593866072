use crate::time::SimTime;

/// A scheduled callback, invoked once when the virtual clock reaches its
/// due time.
pub type EventFn = Box<dyn FnOnce(&mut dyn SimContext)>;

/// Handle to a pending event, usable to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

impl EventHandle {
    pub fn from_raw(id: u64) -> Self {
        EventHandle(id)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// The scheduler surface entities run against.
///
/// Single-threaded and cooperative: callbacks never block, all waiting is
/// expressed by scheduling a future event and returning. Events fire in
/// nondecreasing time order, ties in registration order.
pub trait SimContext {
    /// Current virtual time.
    fn now(&self) -> SimTime;

    /// Registers a one-shot event `delay` after `now()`.
    fn schedule_after(&mut self, delay: SimTime, event: EventFn) -> EventHandle;

    /// Cancels a pending event. Cancelling an event that already fired is
    /// a no-op.
    fn cancel(&mut self, handle: EventHandle);
}

impl dyn SimContext + '_ {
    /// Closure-friendly wrapper around [`SimContext::schedule_after`].
    pub fn schedule<F>(&mut self, delay: SimTime, f: F) -> EventHandle
    where
        F: FnOnce(&mut dyn SimContext) + 'static,
    {
        self.schedule_after(delay, Box::new(f))
    }
}
