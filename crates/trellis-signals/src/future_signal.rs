#![forbid(unsafe_code)]

//! A signal driven by a zero-argument asynchronous producer.
//!
//! # Design
//!
//! [`FutureSignal<T>`] owns a `Signal<AsyncValue<T>>` and a boxed producer.
//! [`fetch()`](FutureSignal::fetch) emits `Loading`, awaits the producer,
//! then emits `Data` or `Error`. A producer failure is captured into the
//! state, never propagated to the caller of `fetch()`.
//!
//! # Fencing
//!
//! Overlapping `fetch()` calls are fenced with a sequence number: each call
//! takes the next sequence, and a completion observed under a stale sequence
//! is discarded. The signal therefore settles on the result of the *latest*
//! request, not whichever producer happened to finish last.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::async_value::{AsyncError, AsyncValue};
use crate::signal::{ReadableSignal, Signal, Subscription};

type Producer<T> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, AsyncError>>>;

/// A signal whose value lifecycle is driven by an async producer, mapped
/// into [`AsyncValue`] states.
pub struct FutureSignal<T> {
    state: Signal<AsyncValue<T>>,
    producer: Producer<T>,
    /// Fencing counter; see module docs.
    sequence: Rc<Cell<u64>>,
}

impl<T> Clone for FutureSignal<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            producer: Rc::clone(&self.producer),
            sequence: Rc::clone(&self.sequence),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FutureSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureSignal")
            .field("state", &self.state)
            .field("sequence", &self.sequence.get())
            .finish()
    }
}

impl<T: PartialEq + 'static> FutureSignal<T> {
    /// Wrap `producer`. The signal starts at [`AsyncValue::initial()`];
    /// nothing runs until [`fetch()`](FutureSignal::fetch).
    #[must_use]
    pub fn new<F, Fut, E>(producer: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
        E: fmt::Display,
    {
        let producer: Producer<T> = Rc::new(move || {
            let fut = producer();
            async move { fut.await.map_err(AsyncError::new) }.boxed_local()
        });
        Self {
            state: Signal::new(AsyncValue::initial()),
            producer,
            sequence: Rc::new(Cell::new(0)),
        }
    }

    /// Run the producer once: emit `Loading`, await, emit `Data`/`Error`.
    ///
    /// Never fails the caller; producer errors become
    /// [`AsyncValue::Error`]. If a newer `fetch` starts while this one is in
    /// flight, this one's completion is discarded.
    pub async fn fetch(&self) {
        let sequence = self.sequence.get() + 1;
        self.sequence.set(sequence);

        self.state.set(AsyncValue::Loading);
        let result = (self.producer)().await;

        if self.sequence.get() != sequence {
            // Superseded while in flight.
            return;
        }
        match result {
            Ok(value) => self.state.set(AsyncValue::Data(Some(value))),
            Err(error) => self.state.set(AsyncValue::Error(error)),
        }
    }

    /// Current state, cloned.
    #[must_use]
    pub fn get(&self) -> AsyncValue<T>
    where
        T: Clone,
    {
        self.state.get()
    }

    /// Read-only view of the state signal.
    #[must_use]
    pub fn state(&self) -> ReadableSignal<AsyncValue<T>> {
        self.state.reader()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&AsyncValue<T>) + 'static) -> Subscription {
        self.state.subscribe(callback)
    }

    /// Close the state channel. In-flight producers still complete, but
    /// their emissions are dropped by the closed signal.
    pub fn dispose(&self) {
        self.state.dispose();
    }

    /// Whether the state channel has been closed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use futures::channel::oneshot;
    use futures::executor::{LocalPool, block_on};
    use futures::task::LocalSpawnExt;

    fn record<T: Clone + PartialEq + 'static>(
        signal: &FutureSignal<T>,
    ) -> (Rc<RefCell<Vec<AsyncValue<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = signal.subscribe(move |v| sink.borrow_mut().push(v.clone()));
        (log, sub)
    }

    #[test]
    fn fetch_emits_loading_then_data() {
        let signal = FutureSignal::new(|| async { Ok::<_, AsyncError>("hello".to_string()) });
        let (log, _sub) = record(&signal);

        block_on(signal.fetch());

        assert_eq!(
            *log.borrow(),
            vec![
                AsyncValue::Loading,
                AsyncValue::Data(Some("hello".to_string())),
            ]
        );
    }

    #[test]
    fn producer_failure_is_captured_not_raised() {
        let signal: FutureSignal<i32> = FutureSignal::new(|| async { Err("backend down") });
        let (log, _sub) = record(&signal);

        // fetch() itself never fails the caller.
        block_on(signal.fetch());

        assert_eq!(
            *log.borrow(),
            vec![
                AsyncValue::Loading,
                AsyncValue::Error(AsyncError::new("backend down")),
            ]
        );
    }

    #[test]
    fn overlapping_fetches_resolve_to_latest_request() {
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        let (first_tx, first_rx) = oneshot::channel::<i32>();
        let (second_tx, second_rx) = oneshot::channel::<i32>();
        let pending = Rc::new(RefCell::new(VecDeque::from([first_rx, second_rx])));

        let signal = FutureSignal::new(move || {
            let rx = pending
                .borrow_mut()
                .pop_front()
                .expect("test issues exactly two fetches");
            async move { rx.await.map_err(|_| "cancelled".to_string()) }
        });

        let fetcher = signal.clone();
        spawner
            .spawn_local(async move { fetcher.fetch().await })
            .unwrap();
        let fetcher = signal.clone();
        spawner
            .spawn_local(async move { fetcher.fetch().await })
            .unwrap();
        pool.run_until_stalled();

        // The second request completes first, then the first (stale) one.
        second_tx.send(2).unwrap();
        pool.run_until_stalled();
        first_tx.send(1).unwrap();
        pool.run_until_stalled();

        // The stale completion is discarded.
        assert_eq!(signal.get(), AsyncValue::Data(Some(2)));
    }

    #[test]
    fn fetch_after_dispose_is_silent() {
        let signal = FutureSignal::new(|| async { Ok::<_, AsyncError>(1) });
        signal.dispose();

        block_on(signal.fetch());
        assert_eq!(signal.get(), AsyncValue::initial());
    }
}
