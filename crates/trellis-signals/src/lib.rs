#![forbid(unsafe_code)]

//! Reactive primitives for Trellis.
//!
//! This crate provides the observable cells the rest of the stack is built
//! on:
//!
//! - [`Signal`]: an owned, equality-deduplicating mutable value cell with a
//!   broadcast notification channel.
//! - [`ReadableSignal`]: a read-only projection of a `Signal`.
//! - [`NullableSignal`]: a `Signal<Option<T>>` specialization for optional
//!   and error state.
//! - [`AsyncValue`]: the Loading/Data/Error union published by async signal
//!   variants.
//! - [`FutureSignal`] / [`StreamSignal`]: signals driven by an external
//!   asynchronous producer or sequence.
//!
//! # Architecture
//!
//! Everything here is single-threaded by design: `Rc<RefCell<..>>` shared
//! ownership, synchronous notification fan-out in subscription order, no
//! `Send`/`Sync` claims. A write and every re-derivation it triggers
//! complete within one logical tick. Hosts targeting a multi-threaded
//! runtime must add their own synchronization at the signal boundary.

pub mod async_value;
pub mod future_signal;
pub mod signal;
pub mod stream_signal;

pub use async_value::{AsyncError, AsyncValue};
pub use future_signal::FutureSignal;
pub use signal::{NullableSignal, ReadableSignal, Signal, Subscription};
pub use stream_signal::StreamSignal;
