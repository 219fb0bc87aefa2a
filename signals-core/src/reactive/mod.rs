//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds,
//! effects and effect scopes.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal is
//! linked to that context. When the signal's value changes, the context is
//! notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when it is read after one of its dependencies changed to a new value.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems.
//!
//! ## Scopes
//!
//! An EffectScope owns the effects created inside it and disposes them
//! together.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local runtime to automatically detect
//! dependencies. When a signal is read, the runtime checks whether a
//! computation is active and, if so, links the two.
//!
//! Changes are pushed as cheap marks (`Dirty` / `Pending`) and values are
//! pulled on read, so a computed whose inputs changed but ended up equal is
//! never recomputed twice, and readers downstream of it are never recomputed
//! at all.

mod batch;
mod computed;
mod context;
mod effect;
mod runtime;
mod scope;
mod signal;

pub use batch::{batch, end_batch, start_batch, BatchGuard};
pub use computed::{computed, Computed};
pub use context::{
    current_subscriber, is_tracking, pause_tracking, resume_tracking, untracked, PauseGuard,
};
pub use effect::{effect, Effect};
pub use runtime::{configure, current_config, graph_stats};
pub use scope::{effect_scope, EffectScope};
pub use signal::{signal, Signal};
