#![forbid(unsafe_code)]

//! Signals mirrored or derived across node boundaries.
//!
//! # Design
//!
//! A bridge is a local [`Signal`] whose value is driven by a signal owned by
//! a *parent* node, resolved lazily at connect time through the owning
//! scope. The selector/transform/update functions are captured at
//! construction; nothing is resolved until the owning node attaches.
//!
//! Two shapes:
//!
//! - [`BridgeSignal<T>`]: passthrough. Local type equals parent type; writes
//!   go straight through to the parent's signal and the local value only
//!   changes when the parent emits back.
//! - [`TransformBridgeSignal<T>`]: derived. The read path is
//!   `transform(parent_value)`; the write path is `update(parent_node,
//!   local_value)`. The two are **not** required to be inverses.
//!
//! # State machine
//!
//! `Unconnected → Connected → Disposed`. Connect happens exactly once, from
//! the owner's attach step (or immediately, for bridges created after
//! attach). Dispose cancels the parent subscription; the local channel is
//! closed by the owner's signal-disposal pass.
//!
//! # Failure Modes
//!
//! - **Parent type not registered at connect**: fatal configuration error.
//! - **Parent disposed while connected**: the subscription goes quiet and
//!   the bridge keeps its last value. Intentional staleness, not a crash.
//! - **Write while `Unconnected` or `Disposed`**: panic; there is no parent
//!   to forward to, and the host owns the lifecycle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;
use trellis_signals::{ReadableSignal, Signal, Subscription};

use crate::error::Result;
use crate::node::Node;
use crate::scope::Scope;

/// Connection state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Constructed; parent not yet resolved.
    Unconnected,
    /// Parent resolved and mirrored.
    Connected,
    /// Parent subscription cancelled.
    Disposed,
}

/// Connect-time wiring: resolve the parent, subscribe replay-then-changes,
/// and hand back the write path.
type Connector<W> = Box<dyn FnOnce(&Scope) -> Result<(W, Subscription)>>;

/// Type-erased handle the owning node keeps for FIFO connect and teardown.
pub(crate) trait BridgeLink {
    fn connect(&self, scope: &Scope) -> Result<()>;
    fn dispose(&self);
}

/// Shared interior of both bridge shapes. `W` is the write path: the
/// parent's `Signal<T>` for passthrough, a boxed update closure for
/// transform bridges.
struct BridgeCore<W> {
    state: Cell<BridgeState>,
    connector: RefCell<Option<Connector<W>>>,
    writer: RefCell<Option<W>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<W> BridgeCore<W> {
    fn new(connector: Connector<W>) -> Self {
        Self {
            state: Cell::new(BridgeState::Unconnected),
            connector: RefCell::new(Some(connector)),
            writer: RefCell::new(None),
            subscription: RefCell::new(None),
        }
    }
}

impl<W> BridgeLink for BridgeCore<W> {
    fn connect(&self, scope: &Scope) -> Result<()> {
        debug_assert_eq!(
            self.state.get(),
            BridgeState::Unconnected,
            "bridge connect must happen exactly once"
        );
        let Some(connector) = self.connector.borrow_mut().take() else {
            return Ok(());
        };
        let (writer, subscription) = connector(scope)?;
        *self.writer.borrow_mut() = Some(writer);
        *self.subscription.borrow_mut() = Some(subscription);
        self.state.set(BridgeState::Connected);
        Ok(())
    }

    fn dispose(&self) {
        if self.state.replace(BridgeState::Disposed) == BridgeState::Disposed {
            return;
        }
        // Dropping the guard cancels the parent subscription.
        self.subscription.borrow_mut().take();
        self.writer.borrow_mut().take();
        self.connector.borrow_mut().take();
        trace!("bridge disposed");
    }
}

// ─── BridgeSignal ────────────────────────────────────────────────────────────

/// A passthrough bridge: mirrors a parent signal of the same type, writes
/// straight through to it.
pub struct BridgeSignal<T> {
    local: Signal<T>,
    core: Rc<BridgeCore<Signal<T>>>,
}

impl<T> Clone for BridgeSignal<T> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for BridgeSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSignal")
            .field("local", &self.local)
            .field("state", &self.core.state.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> BridgeSignal<T> {
    pub(crate) fn new<P: Node>(
        initial: T,
        selector: impl Fn(&P) -> Signal<T> + 'static,
    ) -> Self {
        let local = Signal::new(initial);
        let mirror = local.clone();
        let connector: Connector<Signal<T>> = Box::new(move |scope| {
            let parent = scope.find::<P>()?;
            let source = selector(&parent);
            let subscription =
                source.subscribe_replay(move |value: &T| mirror.set(value.clone()));
            trace!(parent = std::any::type_name::<P>(), "bridge connected");
            Ok((source, subscription))
        });
        Self {
            local,
            core: Rc::new(BridgeCore::new(connector)),
        }
    }

    /// Current mirrored value.
    #[must_use]
    pub fn get(&self) -> T {
        self.local.get()
    }

    /// Access the mirrored value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.local.with(f)
    }

    /// Write through to the parent's signal. The local value updates when
    /// the parent emits back, so local state never diverges.
    ///
    /// # Panics
    ///
    /// Panics if the bridge is not connected (write before attach or after
    /// dispose is a host bug).
    pub fn set(&self, value: T) {
        match self.core.state.get() {
            BridgeState::Connected => {
                let writer = self.core.writer.borrow();
                if let Some(parent) = writer.as_ref() {
                    parent.set(value);
                }
            }
            state => panic!("write through a bridge in state {state:?}"),
        }
    }

    /// Subscribe to the mirrored value.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.local.subscribe(callback)
    }

    /// Read-only view of the mirrored value.
    #[must_use]
    pub fn reader(&self) -> ReadableSignal<T> {
        self.local.reader()
    }

    /// Connection state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.core.state.get()
    }

    pub(crate) fn local(&self) -> &Signal<T> {
        &self.local
    }

    pub(crate) fn link(&self) -> Rc<dyn BridgeLink> {
        self.core.clone()
    }
}

// ─── TransformBridgeSignal ───────────────────────────────────────────────────

/// A derived bridge: the local value is `transform(parent_value)`, writes go
/// through a caller-supplied update callback on the parent node.
pub struct TransformBridgeSignal<T> {
    local: Signal<T>,
    core: Rc<BridgeCore<Box<dyn Fn(T)>>>,
}

impl<T> Clone for TransformBridgeSignal<T> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TransformBridgeSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformBridgeSignal")
            .field("local", &self.local)
            .field("state", &self.core.state.get())
            .finish()
    }
}

impl<T: PartialEq + 'static> TransformBridgeSignal<T> {
    pub(crate) fn new<P, U>(
        initial: T,
        selector: impl Fn(&P) -> ReadableSignal<U> + 'static,
        transform: impl Fn(&U) -> T + 'static,
        update: impl Fn(&P, T) + 'static,
    ) -> Self
    where
        P: Node,
        U: 'static,
    {
        let local = Signal::new(initial);
        let mirror = local.clone();
        let connector: Connector<Box<dyn Fn(T)>> = Box::new(move |scope| {
            let parent = scope.find::<P>()?;
            let source = selector(&parent);
            let subscription =
                source.subscribe_replay(move |value: &U| mirror.set(transform(value)));
            let writer: Box<dyn Fn(T)> = Box::new(move |value| update(&parent, value));
            trace!(parent = std::any::type_name::<P>(), "transform bridge connected");
            Ok((writer, subscription))
        });
        Self {
            local,
            core: Rc::new(BridgeCore::new(connector)),
        }
    }

    /// Current derived value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.local.get()
    }

    /// Access the derived value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.local.with(f)
    }

    /// Invoke the update callback with `(parent_node, value)`. The local
    /// value is **not** touched here; it changes only when the parent's next
    /// emit re-runs the transform.
    ///
    /// # Panics
    ///
    /// Panics if the bridge is not connected.
    pub fn set(&self, value: T) {
        match self.core.state.get() {
            BridgeState::Connected => {
                let writer = self.core.writer.borrow();
                if let Some(update) = writer.as_ref() {
                    update(value);
                }
            }
            state => panic!("write through a bridge in state {state:?}"),
        }
    }

    /// Subscribe to the derived value.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.local.subscribe(callback)
    }

    /// Read-only view of the derived value.
    #[must_use]
    pub fn reader(&self) -> ReadableSignal<T> {
        self.local.reader()
    }

    /// Connection state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.core.state.get()
    }

    pub(crate) fn local(&self) -> &Signal<T> {
        &self.local
    }

    pub(crate) fn link(&self) -> Rc<dyn BridgeLink> {
        self.core.clone()
    }
}
