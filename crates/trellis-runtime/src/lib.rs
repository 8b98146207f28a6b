#![forbid(unsafe_code)]

//! Node lifecycle, cross-node bridges, and the scoped registry for Trellis.
//!
//! This crate layers ownership and dependency injection on top of
//! `trellis-signals`:
//!
//! - [`Node`]/[`NodeBase`]: an owner of signals and bridges with a
//!   three-phase lifecycle (init → ready → dispose) and a built-in async
//!   helper that drives loading/error signals.
//! - [`BridgeSignal`]/[`TransformBridgeSignal`]: signals mirrored or derived
//!   from a signal owned by a different node, resolved through the scope at
//!   connect time.
//! - [`Scope`]: a hierarchical, type-keyed registry holding exactly one node
//!   per type per level, with ancestor-walking lookup.
//!
//! The host UI drives everything through four touch points: create/destroy
//! scopes, register/unregister nodes, call [`mark_ready`] after its first
//! committed render, and subscribe to individual signals for re-render.

pub mod bridge;
pub mod error;
pub mod node;
pub mod scope;

pub use bridge::{BridgeSignal, BridgeState, TransformBridgeSignal};
pub use error::{Result, RuntimeError};
pub use node::{LifecycleState, Node, NodeBase, NodeError, mark_ready};
pub use scope::{Scope, WeakScope};
