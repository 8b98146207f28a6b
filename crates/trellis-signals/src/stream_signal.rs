#![forbid(unsafe_code)]

//! A signal driven by an external asynchronous sequence.
//!
//! # Design
//!
//! [`StreamSignal::new`] emits `Loading` immediately and returns the signal
//! together with a *driver* future. The host spawns the driver on its
//! single-threaded executor; each `Ok` item emits `Data`, each `Err` emits
//! `Error` **without** terminating the signal: the driver keeps consuming
//! until the sequence itself ends.
//!
//! # Disposal ordering
//!
//! [`dispose()`](StreamSignal::dispose) aborts the driver *before* closing
//! the local channel, so no emission can arrive after the close.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::{FutureExt, StreamExt};
use futures::future::LocalBoxFuture;
use futures::stream::{AbortHandle, Abortable, Stream};

use crate::async_value::{AsyncError, AsyncValue};
use crate::signal::{ReadableSignal, Signal, Subscription};

/// A signal that mirrors an asynchronous sequence into [`AsyncValue`]
/// states.
pub struct StreamSignal<T> {
    state: Signal<AsyncValue<T>>,
    abort: Rc<RefCell<Option<AbortHandle>>>,
}

impl<T> Clone for StreamSignal<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            abort: Rc::clone(&self.abort),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StreamSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSignal")
            .field("state", &self.state)
            .finish()
    }
}

impl<T: PartialEq + 'static> StreamSignal<T> {
    /// Subscribe to `stream`: emits `Loading` now and returns the signal
    /// plus the driver future the host must spawn.
    #[must_use]
    pub fn new<S, E>(stream: S) -> (Self, LocalBoxFuture<'static, ()>)
    where
        S: Stream<Item = Result<T, E>> + 'static,
        E: fmt::Display + 'static,
    {
        let signal = Self {
            state: Signal::new(AsyncValue::Loading),
            abort: Rc::new(RefCell::new(None)),
        };
        let driver = signal.driver(stream);
        (signal, driver)
    }

    /// Abort the previous driver, emit `Loading`, and return a fresh driver
    /// for `stream`.
    #[must_use]
    pub fn resubscribe<S, E>(&self, stream: S) -> LocalBoxFuture<'static, ()>
    where
        S: Stream<Item = Result<T, E>> + 'static,
        E: fmt::Display + 'static,
    {
        self.state.set(AsyncValue::Loading);
        self.driver(stream)
    }

    fn driver<S, E>(&self, stream: S) -> LocalBoxFuture<'static, ()>
    where
        S: Stream<Item = Result<T, E>> + 'static,
        E: fmt::Display + 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = self.abort.borrow_mut().replace(handle) {
            previous.abort();
        }
        let state = self.state.clone();
        let stream = Abortable::new(stream, registration);
        async move {
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(value) => state.set(AsyncValue::Data(Some(value))),
                    Err(error) => state.set(AsyncValue::Error(AsyncError::new(error))),
                }
            }
        }
        .boxed_local()
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

    /// Cancel the underlying subscription, then close the local channel.
    pub fn dispose(&self) {
        if let Some(handle) = self.abort.borrow_mut().take() {
            handle.abort();
        }
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
