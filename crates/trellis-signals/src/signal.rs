#![forbid(unsafe_code)]

//! Observable value cells with equality-deduplicated change notification.
//!
//! # Design
//!
//! [`Signal<T>`] wraps a value and a list of subscriber callbacks in shared,
//! reference-counted storage. Writing a value that compares equal to the
//! current one is a no-op: no notification, no version bump. Otherwise the
//! value is stored and every live subscriber is called synchronously, in
//! subscription order, before [`set()`](Signal::set) returns.
//!
//! Subscribers are held as `Weak` callbacks and cleaned up lazily during
//! notification; the strong half lives in the [`Subscription`] guard returned
//! by [`subscribe()`](Signal::subscribe). Dropping the guard detaches the
//! callback before the next notification cycle.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in subscription order.
//! 3. Setting a value equal to the current value is a no-op (no version
//!    bump, no notifications).
//! 4. After [`dispose()`](Signal::dispose), no callback is ever invoked
//!    again and further writes are silent no-ops.
//!
//! # Failure Modes
//!
//! - **Reentrant write**: a subscriber callback that writes back into the
//!   signal it is being notified by violates the run-to-completion contract
//!   and panics on the interior borrow. Writes to *other* signals from a
//!   callback are fine and are how bridges re-derive.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// A subscriber callback, boxed so the entry type is concrete and can be
/// type-erased into the [`Subscription`] guard.
struct Slot<T>(Box<dyn Fn(&T)>);

/// Shared interior for [`Signal<T>`] and [`ReadableSignal<T>`].
struct SignalInner<T> {
    value: RefCell<T>,
    /// Monotonically increasing, bumped once per value change.
    version: Cell<u64>,
    /// Set by `dispose()`; writes and subscriptions are inert afterwards.
    closed: Cell<bool>,
    subscribers: RefCell<Vec<Weak<Slot<T>>>>,
    /// Callbacks whose [`Subscription`] was detached; they live as long as
    /// the signal itself.
    retained: Rc<RefCell<Vec<Rc<dyn Any>>>>,
}

impl<T> SignalInner<T> {
    /// Deliver the current value to every live subscriber, in subscription
    /// order, and drop entries whose guard has been released.
    fn notify(&self) {
        let live: Vec<Rc<Slot<T>>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        let value = self.value.borrow();
        for slot in live {
            (slot.0)(&value);
        }
    }
}

/// An owned, observable, equality-deduplicating mutable value cell.
///
/// Cloning a `Signal` creates a new handle to the **same** inner state;
/// single-threaded (`Rc`-based) by design. The owner writes through
/// [`set()`](Signal::set); observers get a [`ReadableSignal`] via
/// [`reader()`](Signal::reader) and cannot write.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

impl<T> Signal<T> {
    /// Create a signal holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                value: RefCell::new(initial),
                version: Cell::new(0),
                closed: Cell::new(false),
                subscribers: RefCell::new(Vec::new()),
                retained: Rc::new(RefCell::new(Vec::new())),
            }),
        }
    }

    /// Current value, cloned.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of value changes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether the notification channel has been closed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Close the notification channel. Idempotent. All subscriber callbacks
    /// are dropped; writes after this point are silent no-ops.
    pub fn dispose(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        self.inner.subscribers.borrow_mut().clear();
        self.inner.retained.borrow_mut().clear();
    }
}

impl<T: PartialEq> Signal<T> {
    /// Store `value` and notify subscribers, unless it compares equal to the
    /// current value (then this is a no-op). Writes to a disposed signal are
    /// silently dropped.
    pub fn set(&self, value: T) {
        if self.inner.closed.get() {
            return;
        }
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            self.inner.version.set(self.inner.version.get() + 1);
            self.inner.notify();
        }
    }

    /// Read-modify-write convenience. The result goes through the same
    /// equality dedup as [`set()`](Signal::set).
    pub fn update(&self, f: impl FnOnce(&mut T))
    where
        T: Clone,
    {
        let mut next = self.inner.value.borrow().clone();
        f(&mut next);
        self.set(next);
    }
}

impl<T: 'static> Signal<T> {
    /// Register `callback` for future changes. The callback stays registered
    /// for as long as the returned [`Subscription`] is alive.
    ///
    /// Subscribing to a disposed signal returns an inert guard.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        if self.inner.closed.get() {
            return Subscription::inert();
        }
        let slot = Rc::new(Slot(Box::new(callback)));
        self.inner.subscribers.borrow_mut().push(Rc::downgrade(&slot));
        Subscription::live(slot, Rc::downgrade(&self.inner.retained))
    }

    /// Replay the current value into `callback` immediately, then register
    /// it for future changes. This is the connect-time contract bridges rely
    /// on: one synchronous delivery of the present state, then the change
    /// stream.
    #[must_use]
    pub fn subscribe_replay(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        if self.inner.closed.get() {
            return Subscription::inert();
        }
        callback(&self.inner.value.borrow());
        self.subscribe(callback)
    }

    /// A read-only view over the same underlying cell.
    #[must_use]
    pub fn reader(&self) -> ReadableSignal<T> {
        ReadableSignal {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// A signal whose payload is optional; `None` is the cleared state.
///
/// Used for error slots and other "maybe present" state. Same dedup and
/// notification contract as [`Signal`].
pub type NullableSignal<T> = Signal<Option<T>>;

impl<T: PartialEq> Signal<Option<T>> {
    /// Store `Some(value)`.
    pub fn set_value(&self, value: T) {
        self.set(Some(value));
    }

    /// Reset to `None`.
    pub fn clear(&self) {
        self.set(None);
    }

    /// Whether a payload is currently present.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.with(Option::is_some)
    }
}

// ─── ReadableSignal ──────────────────────────────────────────────────────────

/// A non-owning, read-only projection of a [`Signal`].
///
/// Exposes the same read and subscribe surface as its source but no write
/// capability: consumers of a node's public surface can observe state they
/// did not create, never mutate it. Two readers over the same signal compare
/// equal.
pub struct ReadableSignal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for ReadableSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for ReadableSignal<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for ReadableSignal<T> {}

impl<T: fmt::Debug> fmt::Debug for ReadableSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableSignal")
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T> ReadableSignal<T> {
    /// Current value, cloned.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of value changes since the source signal was created.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether the source signal has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.closed.get()
    }
}

impl<T: 'static> ReadableSignal<T> {
    /// Register `callback` for future changes. See [`Signal::subscribe`].
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        Signal {
            inner: Rc::clone(&self.inner),
        }
        .subscribe(callback)
    }

    /// Replay the current value, then subscribe. See
    /// [`Signal::subscribe_replay`].
    #[must_use]
    pub fn subscribe_replay(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        Signal {
            inner: Rc::clone(&self.inner),
        }
        .subscribe_replay(callback)
    }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// RAII guard for a subscriber callback.
///
/// Dropping the guard detaches the callback before the next notification
/// cycle. [`detach()`](Subscription::detach) instead hands the callback to
/// the signal, keeping it alive for the signal's whole lifetime.
pub struct Subscription {
    slot: Option<Rc<dyn Any>>,
    retained: Weak<RefCell<Vec<Rc<dyn Any>>>>,
}

impl Subscription {
    fn live(slot: Rc<dyn Any>, retained: Weak<RefCell<Vec<Rc<dyn Any>>>>) -> Self {
        Self {
            slot: Some(slot),
            retained,
        }
    }

    /// A guard that holds nothing; returned when subscribing to a disposed
    /// signal.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            slot: None,
            retained: Weak::new(),
        }
    }

    /// Whether this guard still holds a callback.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    /// Give up the guard without detaching: the callback is moved into the
    /// signal and lives until the signal is disposed.
    pub fn detach(mut self) {
        if let Some(slot) = self.slot.take() {
            if let Some(retained) = self.retained.upgrade() {
                retained.borrow_mut().push(slot);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded<T: Clone + 'static>(signal: &Signal<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = signal.subscribe(move |v: &T| sink.borrow_mut().push(v.clone()));
        (log, sub)
    }

    #[test]
    fn equal_write_is_noop() {
        let signal = Signal::new(0);
        let (log, _sub) = recorded(&signal);

        signal.set(0);
        assert!(log.borrow().is_empty());
        assert_eq!(signal.version(), 0);

        signal.set(1);
        assert_eq!(*log.borrow(), vec![1]);

        signal.set(1);
        assert_eq!(*log.borrow(), vec![1]);

        signal.set(2);
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(signal.version(), 2);
    }

    #[test]
    fn subscribers_notified_in_subscription_order() {
        let signal = Signal::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&order);
        let _a = signal.subscribe(move |_| first.borrow_mut().push("a"));
        let second = Rc::clone(&order);
        let _b = signal.subscribe(move |_| second.borrow_mut().push("b"));

        signal.set(1);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let signal = Signal::new(0);
        let (log, sub) = recorded(&signal);

        signal.set(1);
        drop(sub);
        signal.set(2);

        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn detach_keeps_callback_alive() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);

        signal
            .subscribe(move |v: &i32| sink.borrow_mut().push(*v))
            .detach();

        signal.set(1);
        signal.set(2);
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn dispose_closes_channel() {
        let signal = Signal::new(0);
        let (log, _sub) = recorded(&signal);

        signal.set(1);
        signal.dispose();
        assert!(signal.is_disposed());

        signal.set(2);
        assert_eq!(*log.borrow(), vec![1]);
        // Version untouched by the rejected write.
        assert_eq!(signal.version(), 1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let signal = Signal::new(5);
        signal.dispose();
        signal.dispose();
        assert!(signal.is_disposed());
    }

    #[test]
    fn subscribe_after_dispose_is_inert() {
        let signal = Signal::new(0);
        signal.dispose();
        let sub = signal.subscribe(|_| panic!("must never fire"));
        assert!(!sub.is_active());
    }

    #[test]
    fn subscribe_replay_delivers_current_value_first() {
        let signal = Signal::new(7);
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);

        let _sub = signal.subscribe_replay(move |v: &i32| sink.borrow_mut().push(*v));
        assert_eq!(*log.borrow(), vec![7]);

        signal.set(8);
        assert_eq!(*log.borrow(), vec![7, 8]);
    }

    #[test]
    fn clone_shares_state() {
        let a = Signal::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert_eq!(a.version(), b.version());
    }

    #[test]
    fn update_goes_through_dedup() {
        let signal = Signal::new(3);
        let (log, _sub) = recorded(&signal);

        signal.update(|v| *v += 1);
        signal.update(|_| {});
        assert_eq!(*log.borrow(), vec![4]);
        assert_eq!(signal.version(), 1);
    }

    #[test]
    fn with_borrows_without_cloning() {
        let signal = Signal::new(vec![1, 2, 3]);
        let sum: i32 = signal.with(|v| v.iter().sum());
        assert_eq!(sum, 6);
    }

    #[test]
    fn readers_over_same_signal_compare_equal() {
        let signal = Signal::new(1);
        let other = Signal::new(1);
        assert_eq!(signal.reader(), signal.reader());
        assert_ne!(signal.reader(), other.reader());
    }

    #[test]
    fn reader_tracks_source() {
        let signal = Signal::new("a".to_string());
        let reader = signal.reader();
        let (log, _sub) = {
            let log = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&log);
            let sub = reader.subscribe(move |v: &String| sink.borrow_mut().push(v.clone()));
            (log, sub)
        };

        signal.set("b".to_string());
        assert_eq!(reader.get(), "b");
        assert_eq!(*log.borrow(), vec!["b".to_string()]);

        signal.dispose();
        assert!(reader.is_disposed());
    }

    #[test]
    fn nullable_helpers() {
        let slot: NullableSignal<i32> = Signal::new(None);
        assert!(!slot.is_set());

        slot.set_value(4);
        assert_eq!(slot.get(), Some(4));
        assert!(slot.is_set());

        slot.clear();
        assert!(!slot.is_set());
        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn writes_to_other_signals_from_callbacks_are_allowed() {
        let upstream = Signal::new(0);
        let downstream = Signal::new(0);

        let mirror = downstream.clone();
        let _sub = upstream.subscribe(move |v: &i32| mirror.set(v * 10));

        upstream.set(3);
        assert_eq!(downstream.get(), 30);
    }
}
