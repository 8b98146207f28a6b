#![forbid(unsafe_code)]

//! Node lifecycle: an owner of signals and bridges with init/ready/dispose
//! hooks.
//!
//! # Lifecycle
//!
//! `Created → Attached → Ready → Disposed`.
//!
//! - Attach happens through [`Scope::register`](crate::scope::Scope):
//!   back-reference set, pending bridges connected in FIFO order, `on_init`
//!   invoked synchronously.
//! - [`mark_ready`] is the host's explicit second phase, called once after
//!   its first committed render pass; `on_ready` runs exactly once.
//! - Dispose (via `Scope::unregister`/`dispose_all`) tears down every
//!   bridge, then every signal, then invokes `on_dispose`. No transitions
//!   afterwards.
//!
//! # Invariants
//!
//! 1. A node attaches to at most one scope, exactly once.
//! 2. `on_init` runs only after every bridge present at registration time is
//!    connected.
//! 3. `on_dispose` runs only after every owned bridge and signal has been
//!    torn down.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use tracing::{debug, warn};
use trellis_signals::{NullableSignal, ReadableSignal, Signal};

use crate::bridge::{BridgeLink, BridgeSignal, TransformBridgeSignal};
use crate::error::{Result, RuntimeError};
use crate::scope::{Scope, WeakScope};

/// Lifecycle state of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Attached,
    Ready,
    Disposed,
}

/// A registrable owner of signals and bridges.
///
/// Implementors embed a [`NodeBase`] and expose it through
/// [`base()`](Node::base); the lifecycle hooks have empty defaults.
pub trait Node: 'static {
    /// The embedded lifecycle/ownership bookkeeping.
    fn base(&self) -> &NodeBase;

    /// Runs synchronously when the node is registered into a scope, after
    /// all pending bridges have connected.
    fn on_init(&self) {}

    /// Runs once, when the host signals its first committed render pass.
    fn on_ready(&self) {}

    /// Runs after every owned bridge and signal has been disposed.
    fn on_dispose(&self) {}
}

/// Teardown handle the base keeps for each owned signal.
pub(crate) trait OwnedChannel {
    fn close(&self);
}

impl<T: 'static> OwnedChannel for Signal<T> {
    fn close(&self) {
        self.dispose();
    }
}

/// An error recorded on a node's `error` signal.
///
/// Carries the rendered message; compares by content so the signal dedup
/// contract applies.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeError {
    message: Rc<str>,
}

impl NodeError {
    /// Capture `error` by rendering its display form.
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            message: error.to_string().into(),
        }
    }

    /// The rendered error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeError").field(&self.message).finish()
    }
}

impl std::error::Error for NodeError {}

/// Lowers a loading flag on every exit path, including cancellation by
/// drop.
struct LoadingGuard {
    flag: Signal<bool>,
}

impl LoadingGuard {
    fn raise(flag: Signal<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Embedded bookkeeping for a [`Node`]: lifecycle state, owned signal and
/// bridge lists, the weak back-reference to the owning scope, and the
/// built-in loading/error signals.
pub struct NodeBase {
    state: Cell<LifecycleState>,
    scope: RefCell<Option<WeakScope>>,
    signals: RefCell<Vec<Rc<dyn OwnedChannel>>>,
    bridges: RefCell<Vec<Rc<dyn BridgeLink>>>,
    is_loading: Signal<bool>,
    full_screen_loading: Signal<bool>,
    error: NullableSignal<NodeError>,
}

impl Default for NodeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBase {
    /// Fresh bookkeeping in the `Created` state. The three built-in signals
    /// participate in the disposal pass like any owned signal.
    #[must_use]
    pub fn new() -> Self {
        let is_loading = Signal::new(false);
        let full_screen_loading = Signal::new(false);
        let error: NullableSignal<NodeError> = Signal::new(None);
        let signals: Vec<Rc<dyn OwnedChannel>> = vec![
            Rc::new(is_loading.clone()),
            Rc::new(full_screen_loading.clone()),
            Rc::new(error.clone()),
        ];
        Self {
            state: Cell::new(LifecycleState::Created),
            scope: RefCell::new(None),
            signals: RefCell::new(signals),
            bridges: RefCell::new(Vec::new()),
            is_loading,
            full_screen_loading,
            error,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// The owning scope, if the node is attached and the scope is alive.
    #[must_use]
    pub fn scope(&self) -> Option<Scope> {
        self.scope.borrow().as_ref().and_then(WeakScope::upgrade)
    }

    /// Create a signal owned by this node; it is disposed with the node.
    #[must_use]
    pub fn signal<T: PartialEq + 'static>(&self, initial: T) -> Signal<T> {
        let signal = Signal::new(initial);
        self.signals.borrow_mut().push(Rc::new(signal.clone()));
        signal
    }

    /// Create a passthrough bridge to a signal on parent node `P`.
    ///
    /// Before attach the bridge is queued and connects, FIFO, during
    /// [`Scope::register`](crate::scope::Scope::register). After attach it
    /// connects immediately; a missing parent then is a fail-fast panic.
    #[must_use]
    pub fn bridge<P, T>(
        &self,
        initial: T,
        selector: impl Fn(&P) -> Signal<T> + 'static,
    ) -> BridgeSignal<T>
    where
        P: Node,
        T: Clone + PartialEq + 'static,
    {
        let bridge = BridgeSignal::new(initial, selector);
        self.adopt(bridge.local().clone(), bridge.link());
        bridge
    }

    /// Create a derived bridge: read path `transform(parent_value)`, write
    /// path `update(parent_node, local_value)`. Same connect timing as
    /// [`bridge()`](NodeBase::bridge).
    #[must_use]
    pub fn transform_bridge<P, U, T>(
        &self,
        initial: T,
        selector: impl Fn(&P) -> ReadableSignal<U> + 'static,
        transform: impl Fn(&U) -> T + 'static,
        update: impl Fn(&P, T) + 'static,
    ) -> TransformBridgeSignal<T>
    where
        P: Node,
        U: 'static,
        T: PartialEq + 'static,
    {
        let bridge = TransformBridgeSignal::new(initial, selector, transform, update);
        self.adopt(bridge.local().clone(), bridge.link());
        bridge
    }

    fn adopt<T: 'static>(&self, local: Signal<T>, link: Rc<dyn BridgeLink>) {
        self.signals.borrow_mut().push(Rc::new(local));
        self.bridges.borrow_mut().push(Rc::clone(&link));
        match self.state.get() {
            LifecycleState::Created => {} // connects at attach
            LifecycleState::Attached | LifecycleState::Ready => {
                let Some(scope) = self.scope() else {
                    panic!("bridge created after attach but the owning scope is gone");
                };
                if let Err(error) = link.connect(&scope) {
                    panic!("bridge connect failed after attach: {error}");
                }
            }
            LifecycleState::Disposed => panic!("bridge created on a disposed node"),
        }
    }

    /// Whether a non-fullscreen operation is in flight. Read-only surface;
    /// the flag is driven by [`loading()`](NodeBase::loading).
    #[must_use]
    pub fn is_loading(&self) -> ReadableSignal<bool> {
        self.is_loading.reader()
    }

    /// Whether a fullscreen operation is in flight.
    #[must_use]
    pub fn full_screen_loading(&self) -> ReadableSignal<bool> {
        self.full_screen_loading.reader()
    }

    /// The last recorded operation error, if any.
    #[must_use]
    pub fn error(&self) -> ReadableSignal<Option<NodeError>> {
        self.error.reader()
    }

    /// Reset the error slot.
    pub fn clear_error(&self) {
        self.error.clear();
    }

    /// Wrap an async operation. With `invoke_loading`, exactly one of the
    /// loading flags (`full_screen` picks which) is raised before the
    /// operation and lowered on every exit path. On failure the error is
    /// recorded on the `error` signal **and** returned to the caller:
    /// UI-wide observers see the signal while the call site still handles
    /// the failure itself.
    pub async fn loading<T, E, Fut>(
        &self,
        operation: Fut,
        invoke_loading: bool,
        full_screen: bool,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let _guard = invoke_loading.then(|| {
            let flag = if full_screen {
                self.full_screen_loading.clone()
            } else {
                self.is_loading.clone()
            };
            LoadingGuard::raise(flag)
        });
        let result = operation.await;
        if let Err(error) = &result {
            self.error.set(Some(NodeError::new(error)));
        }
        result
    }

    pub(crate) fn attach(&self, scope: &Scope, type_name: &'static str) -> Result<()> {
        if self.state.get() != LifecycleState::Created {
            return Err(RuntimeError::AlreadyAttached { type_name });
        }
        *self.scope.borrow_mut() = Some(scope.downgrade());
        self.state.set(LifecycleState::Attached);
        Ok(())
    }

    pub(crate) fn connect_pending(&self, scope: &Scope) -> Result<()> {
        let pending: Vec<Rc<dyn BridgeLink>> = self.bridges.borrow().clone();
        for link in pending {
            link.connect(scope)?;
        }
        Ok(())
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.state.set(state);
    }

    pub(crate) fn take_bridges(&self) -> Vec<Rc<dyn BridgeLink>> {
        self.bridges.borrow_mut().drain(..).collect()
    }

    pub(crate) fn take_signals(&self) -> Vec<Rc<dyn OwnedChannel>> {
        self.signals.borrow_mut().drain(..).collect()
    }
}

/// Transition an attached node to `Ready`, invoking `on_ready` exactly
/// once. The host calls this after its first committed render pass.
///
/// Repeat calls are tolerated as warn-level no-ops; calling before attach
/// or after dispose is a configuration error.
pub fn mark_ready<N: Node>(node: &N) -> Result<()> {
    let base = node.base();
    match base.state.get() {
        LifecycleState::Attached => {
            base.state.set(LifecycleState::Ready);
            debug!(node = type_name::<N>(), "node ready");
            node.on_ready();
            Ok(())
        }
        LifecycleState::Ready => {
            warn!(node = type_name::<N>(), "mark_ready called more than once");
            Ok(())
        }
        LifecycleState::Created => Err(RuntimeError::NotAttached {
            type_name: type_name::<N>(),
        }),
        LifecycleState::Disposed => Err(RuntimeError::NodeDisposed {
            type_name: type_name::<N>(),
        }),
    }
}

/// Full teardown: bridges first (parent subscriptions cancelled), then
/// signals (channels closed), then `on_dispose`.
pub(crate) fn dispose_node(node: &dyn Node, type_name: &'static str) {
    let base = node.base();
    if base.state.get() == LifecycleState::Disposed {
        return;
    }
    for bridge in base.take_bridges() {
        bridge.dispose();
    }
    for signal in base.take_signals() {
        signal.close();
    }
    base.set_state(LifecycleState::Disposed);
    debug!(node = type_name, "node disposed");
    node.on_dispose();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    struct Plain {
        base: NodeBase,
    }

    impl Plain {
        fn new() -> Self {
            Self {
                base: NodeBase::new(),
            }
        }
    }

    impl Node for Plain {
        fn base(&self) -> &NodeBase {
            &self.base
        }
    }

    fn flag_log(signal: &ReadableSignal<bool>) -> Rc<RefCell<Vec<bool>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        signal
            .subscribe_replay(move |v: &bool| sink.borrow_mut().push(*v))
            .detach();
        log
    }

    #[test]
    fn loading_raises_and_lowers_flag_on_success() {
        let node = Plain::new();
        let log = flag_log(&node.base.is_loading());

        let result: std::result::Result<i32, NodeError> =
            block_on(node.base.loading(async { Ok(5) }, true, false));

        assert_eq!(result.unwrap(), 5);
        assert_eq!(*log.borrow(), vec![false, true, false]);
        assert!(!node.base.error().with(Option::is_some));
    }

    #[test]
    fn loading_failure_records_error_and_reraises() {
        let node = Plain::new();
        let log = flag_log(&node.base.is_loading());

        let result: std::result::Result<i32, &str> =
            block_on(node.base.loading(async { Err("exploded") }, true, false));

        assert_eq!(result.unwrap_err(), "exploded");
        assert_eq!(*log.borrow(), vec![false, true, false]);
        assert_eq!(
            node.base.error().with(|e| e.clone()),
            Some(NodeError::new("exploded"))
        );
    }

    #[test]
    fn loading_fullscreen_picks_the_other_flag() {
        let node = Plain::new();
        let fullscreen = flag_log(&node.base.full_screen_loading());
        let inline = flag_log(&node.base.is_loading());

        let _ = block_on(node.base.loading(
            async { Ok::<_, NodeError>(()) },
            true,
            true,
        ));

        assert_eq!(*fullscreen.borrow(), vec![false, true, false]);
        assert_eq!(*inline.borrow(), vec![false]);
    }

    #[test]
    fn loading_without_invoke_leaves_flags_alone() {
        let node = Plain::new();
        let inline = flag_log(&node.base.is_loading());

        let _ = block_on(node.base.loading(
            async { Ok::<_, NodeError>(()) },
            false,
            false,
        ));

        assert_eq!(*inline.borrow(), vec![false]);
    }

    #[test]
    fn mark_ready_requires_attachment() {
        let node = Plain::new();
        assert_eq!(
            mark_ready(&node),
            Err(RuntimeError::NotAttached {
                type_name: type_name::<Plain>(),
            })
        );
    }

    #[test]
    fn owned_signals_close_with_the_node() {
        let node = Plain::new();
        let counter = node.base.signal(0u32);

        dispose_node(&node, type_name::<Plain>());

        assert!(counter.is_disposed());
        assert!(node.base.is_loading().is_disposed());
        assert_eq!(node.base.state(), LifecycleState::Disposed);
    }

    #[test]
    fn dispose_is_idempotent() {
        let node = Plain::new();
        dispose_node(&node, type_name::<Plain>());
        dispose_node(&node, type_name::<Plain>());
        assert_eq!(node.base.state(), LifecycleState::Disposed);
    }

    #[test]
    fn error_slot_clears() {
        let node = Plain::new();
        let _ = block_on(node.base.loading(
            async { Err::<(), _>("boom") },
            false,
            false,
        ));
        assert!(node.base.error().with(Option::is_some));

        node.base.clear_error();
        assert!(!node.base.error().with(Option::is_some));
    }
}
