//! The reactive value cell.
//!
//! [`Var<T>`] owns one setting's current value plus its attached observers.
//! Cloning a `Var` creates a new handle to the **same** cell.
//!
//! # Access Model
//!
//! All access is single-threaded. Guards returned by [`read()`](Var::read)
//! and [`write()`](Var::write) are RAII borrows: the guard's scope bounds
//! the reference's validity, and the end of a write guard's scope is the
//! boundary at which the "changed" comparison and all notifications are
//! evaluated. The value borrow is released *before* sinks run, so a sink
//! callback may re-enter `get`/`set` on the same cell without deadlocking.
//! While a guard is alive, though, it holds the cell exclusively: any
//! other access to the same cell inside the guard's scope is a usage
//! error (it panics rather than deadlocking).
//!
//! # Invariants
//!
//! 1. Sinks are notified in attachment order, synchronously.
//! 2. Notification fires exactly once per distinct value transition
//!    observed at guard release; a write that leaves the value equal
//!    (by `PartialEq`) to the pre-mutation snapshot is elided.
//! 3. A failing sink does not prevent delivery to subsequent sinks.
//! 4. At most one adapter is identified with a cell at a time.

use std::cell::{Ref, RefCell, RefMut};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::observer::{sink_fn, Adapter, Sink};

struct CellInner<T> {
    value: RefCell<T>,
    sinks: RefCell<Vec<Rc<dyn Sink<T>>>>,
    adapter: RefCell<Option<Rc<dyn Adapter<T>>>>,
}

/// Atomic, observable container for one setting's current value.
pub struct Var<T> {
    inner: Rc<CellInner<T>>,
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var")
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

impl<T: Default> Default for Var<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Var<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Var<T> {
    /// Create a cell holding `value`, with no observers attached.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                value: RefCell::new(value),
                sinks: RefCell::new(Vec::new()),
                adapter: RefCell::new(None),
            }),
        }
    }

    /// Read the value through a closure without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Read-only guard over the current value.
    ///
    /// The guard is the access token: the reference it derefs to is valid
    /// exactly for the guard's scope. No write guard may be taken on this
    /// cell while a read guard is alive.
    pub fn read(&self) -> ReadGuard<'_, T> {
        ReadGuard {
            inner: self.inner.value.borrow(),
        }
    }

    /// Attach a one-way sink. Sinks are notified in attachment order.
    pub fn connect(&self, sink: Rc<dyn Sink<T>>) {
        self.inner.sinks.borrow_mut().push(sink);
    }
}

impl<T: Clone + PartialEq + 'static> Var<T> {
    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Mutable guard over the value.
    ///
    /// The pre-mutation value is snapshotted on acquisition. When the guard
    /// is dropped the new value is compared against the snapshot; if it
    /// differs, all sinks are notified and the identified adapter (if any)
    /// is re-synced. The comparison uses value semantics (`PartialEq`).
    ///
    /// The guard grants exclusive access: no other `get`/`read`/`write`
    /// on this cell is allowed until it drops. Sinks run after the drop,
    /// so *they* may re-enter freely; code holding the guard may not.
    pub fn write(&self) -> WriteGuard<'_, T> {
        let borrow = self.inner.value.borrow_mut();
        let snapshot = borrow.clone();
        WriteGuard {
            var: self,
            snapshot,
            borrow: Some(borrow),
        }
    }

    /// Write `value`, notifying sinks only if it differs from the current
    /// value. Equivalent to acquiring a write guard, assigning, and
    /// releasing it.
    pub fn set(&self, value: T) {
        *self.write() = value;
    }

    /// Attach a closure as a one-way sink.
    pub fn connect_fn(&self, f: impl Fn(&T) + 'static) {
        self.connect(sink_fn(f));
    }

    /// Identify an external control adapter with this cell, replacing any
    /// previously identified adapter.
    ///
    /// The adapter is immediately pushed the current value so the control
    /// starts in sync.
    pub fn identify(&self, adapter: Rc<dyn Adapter<T>>) {
        let value = self.get();
        if let Err(e) = adapter.notify(&value) {
            log::warn!("adapter rejected initial value: {e}");
        }
        *self.inner.adapter.borrow_mut() = Some(adapter);
    }

    /// Pull the identified adapter's current value into the cell.
    ///
    /// This is the control-side half of the two-way bridge, with the
    /// re-entrance break: if the adapter's value already equals the cell's,
    /// nothing happens, so `notify` → control callback → `refresh` cannot
    /// loop.
    pub fn refresh_from_adapter(&self) {
        let adapter = self.inner.adapter.borrow().clone();
        let Some(adapter) = adapter else { return };
        let shown = adapter.current();
        if shown == self.get() {
            return;
        }
        self.set(shown);
    }

    /// Deliver `value` to every sink and the identified adapter.
    ///
    /// Called after the value borrow has been released. The sink list is
    /// snapshotted first so a sink may attach further sinks without
    /// invalidating the traversal.
    fn notify_all(&self, value: &T) {
        let sinks: Vec<Rc<dyn Sink<T>>> = self.inner.sinks.borrow().clone();
        for sink in sinks {
            if let Err(e) = sink.notify(value) {
                log::warn!("dropping failed notification: {e}");
            }
        }
        let adapter = self.inner.adapter.borrow().clone();
        if let Some(adapter) = adapter {
            if let Err(e) = adapter.notify(value) {
                log::warn!("adapter rejected value: {e}");
            }
        }
    }
}

/// RAII read token for a [`Var`]'s value.
pub struct ReadGuard<'a, T> {
    inner: Ref<'a, T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

/// RAII write token for a [`Var`]'s value.
///
/// On drop: release the value borrow, compare against the pre-mutation
/// snapshot, and notify observers if the value changed.
pub struct WriteGuard<'a, T: Clone + PartialEq + 'static> {
    var: &'a Var<T>,
    snapshot: T,
    borrow: Option<RefMut<'a, T>>,
}

impl<T: Clone + PartialEq + 'static> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.borrow.as_ref().unwrap()
    }
}

impl<T: Clone + PartialEq + 'static> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.borrow.as_mut().unwrap()
    }
}

impl<T: Clone + PartialEq + 'static> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        let committed = {
            let borrow = self.borrow.take().unwrap();
            borrow.clone()
            // borrow released here, before any callback runs
        };
        if committed != self.snapshot {
            self.var.notify_all(&committed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::SinkError;
    use std::cell::Cell as StdCell;

    /// Sink that records every value it receives.
    struct Recorder {
        seen: RefCell<Vec<i32>>,
    }

    impl Recorder {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                seen: RefCell::new(Vec::new()),
            })
        }
    }

    impl Sink<i32> for Recorder {
        fn notify(&self, value: &i32) -> Result<(), SinkError> {
            self.seen.borrow_mut().push(*value);
            Ok(())
        }
    }

    #[test]
    fn set_and_get() {
        let v = Var::new(7);
        assert_eq!(v.get(), 7);
        v.set(9);
        assert_eq!(v.get(), 9);
    }

    #[test]
    fn clones_share_state() {
        let a = Var::new(1);
        let b = a.clone();
        b.set(5);
        assert_eq!(a.get(), 5);
    }

    #[test]
    fn redundant_writes_are_elided() {
        let v = Var::new(3);
        let rec = Recorder::new();
        v.connect(rec.clone());

        v.set(3);
        v.set(3);
        assert!(rec.seen.borrow().is_empty());

        v.set(4);
        v.set(4);
        assert_eq!(*rec.seen.borrow(), vec![4]);
    }

    #[test]
    fn distinct_transitions_notify_in_commit_order() {
        let v = Var::new(0);
        let rec = Recorder::new();
        v.connect(rec.clone());

        v.set(1);
        v.set(2);
        v.set(1);
        assert_eq!(*rec.seen.borrow(), vec![1, 2, 1]);
    }

    #[test]
    fn write_guard_notifies_once_at_release() {
        let v = Var::new(0);
        let rec = Recorder::new();
        v.connect(rec.clone());

        {
            let mut g = v.write();
            *g = 10;
            *g = 20;
            // nothing delivered while the guard is held
            assert!(rec.seen.borrow().is_empty());
        }
        assert_eq!(*rec.seen.borrow(), vec![20]);
    }

    #[test]
    fn write_guard_restoring_value_is_silent() {
        let v = Var::new(5);
        let rec = Recorder::new();
        v.connect(rec.clone());

        {
            let mut g = v.write();
            *g = 9;
            *g = 5;
        }
        assert!(rec.seen.borrow().is_empty());
    }

    #[test]
    fn sinks_fire_in_attachment_order() {
        let v = Var::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            v.connect_fn(move |_: &i32| order.borrow_mut().push(tag));
        }
        v.set(1);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_sink_does_not_block_later_sinks() {
        struct Faulty;
        impl Sink<i32> for Faulty {
            fn notify(&self, _: &i32) -> Result<(), SinkError> {
                Err(SinkError::new("widget destroyed"))
            }
        }

        let v = Var::new(0);
        let rec = Recorder::new();
        v.connect(Rc::new(Faulty));
        v.connect(rec.clone());

        v.set(42);
        assert_eq!(*rec.seen.borrow(), vec![42]);
    }

    #[test]
    fn sink_may_reenter_the_cell() {
        let v = Var::new(0);
        let observed = Rc::new(StdCell::new(-1));
        {
            let v2 = v.clone();
            let observed = Rc::clone(&observed);
            v.connect_fn(move |_| observed.set(v2.get()));
        }
        v.set(6);
        assert_eq!(observed.get(), 6);
    }

    /// Fake UI control: holds an on-screen value, counts pushes.
    struct FakeControl {
        shown: StdCell<i32>,
        pushes: StdCell<usize>,
    }

    impl Sink<i32> for FakeControl {
        fn notify(&self, value: &i32) -> Result<(), SinkError> {
            self.shown.set(*value);
            self.pushes.set(self.pushes.get() + 1);
            Ok(())
        }
    }

    impl Adapter<i32> for FakeControl {
        fn current(&self) -> i32 {
            self.shown.get()
        }
    }

    #[test]
    fn adapter_round_trip_does_not_loop() {
        let v = Var::new(1);
        let control = Rc::new(FakeControl {
            shown: StdCell::new(0),
            pushes: StdCell::new(0),
        });
        v.identify(control.clone());
        assert_eq!(control.shown.get(), 1); // initial sync
        assert_eq!(control.pushes.get(), 1);

        // Cell-side change reaches the control exactly once.
        v.set(8);
        assert_eq!(control.shown.get(), 8);
        assert_eq!(control.pushes.get(), 2);

        // Control callback fires after the push; values agree, so the
        // bridge breaks the cycle.
        v.refresh_from_adapter();
        assert_eq!(v.get(), 8);
        assert_eq!(control.pushes.get(), 2);

        // User edits the control; refresh commits the new value and the
        // resulting notify lands back on the (already equal) control.
        control.shown.set(30);
        v.refresh_from_adapter();
        assert_eq!(v.get(), 30);
        assert_eq!(control.pushes.get(), 3);
    }

    #[test]
    fn identify_replaces_previous_adapter() {
        let v = Var::new(0);
        let first = Rc::new(FakeControl {
            shown: StdCell::new(0),
            pushes: StdCell::new(0),
        });
        let second = Rc::new(FakeControl {
            shown: StdCell::new(0),
            pushes: StdCell::new(0),
        });
        v.identify(first.clone());
        v.identify(second.clone());

        v.set(5);
        assert_eq!(first.shown.get(), 0);
        assert_eq!(second.shown.get(), 5);
    }
}
