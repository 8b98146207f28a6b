#![forbid(unsafe_code)]

//! Trellis public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub mod prelude {
    pub use trellis_runtime as runtime;
    pub use trellis_signals as signals;

    pub use trellis_runtime::{
        BridgeSignal, BridgeState, LifecycleState, Node, NodeBase, NodeError, RuntimeError,
        Scope, TransformBridgeSignal, WeakScope, mark_ready,
    };
    pub use trellis_signals::{
        AsyncError, AsyncValue, FutureSignal, NullableSignal, ReadableSignal, Signal,
        StreamSignal, Subscription,
    };
}
