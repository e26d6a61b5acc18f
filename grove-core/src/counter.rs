use std::cell::Cell;
use std::rc::Rc;

/// A shared counter used as a cooperative-scheduling gate.
///
/// Many independently-animating entities (branch reveals, tree
/// retractions, deferred-removal watchers) hold clones of the same
/// counter. An entity increments it when it starts work and decrements
/// it when it finishes; a consumer polls [`BarrierCounter::value`] until
/// its threshold condition holds and then proceeds exactly once.
///
/// Cloning shares the underlying cell — this is the whole point. There
/// is no locking: the simulation is single-threaded and cooperative, and
/// all waiting is a guard re-evaluated once per driver tick.
#[derive(Clone, Debug, Default)]
pub struct BarrierCounter(Rc<Cell<i32>>);

impl BarrierCounter {
    pub fn new(initial: i32) -> Self {
        debug_assert!(initial >= 0);
        Self(Rc::new(Cell::new(initial)))
    }

    pub fn increment(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn increment_by(&self, n: i32) {
        debug_assert!(n >= 0);
        self.0.set(self.0.get() + n);
    }

    /// Decrements the counter. The count never goes negative in a
    /// balanced protocol; a dip below zero means someone decremented a
    /// gate they never incremented.
    pub fn decrement(&self) {
        let next = self.0.get() - 1;
        debug_assert!(next >= 0, "barrier counter decremented below zero");
        self.0.set(next);
    }

    pub fn decrement_by(&self, n: i32) {
        debug_assert!(n >= 0);
        let next = self.0.get() - n;
        debug_assert!(next >= 0, "barrier counter decremented below zero");
        self.0.set(next);
    }

    pub fn value(&self) -> i32 {
        self.0.get()
    }
}
