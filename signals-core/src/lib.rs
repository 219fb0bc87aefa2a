//! Signals Core
//!
//! This crate provides a fine-grained reactive runtime built on a push-pull
//! dependency graph. It implements:
//!
//! - Reactive primitives (signals, computeds, effects, effect scopes)
//! - Lazy, glitch-free derivation with equality short-circuiting
//! - Batched effect flushing
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: The user-facing primitives and the thread-local runtime
//! - `graph`: Dependency graph, propagation and dirty checking
//! - `config`: Runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use signals_core::{computed, effect, signal};
//!
//! // Create a signal
//! let count = signal(0);
//!
//! // Create a derived value
//! let doubled = computed({
//!     let count = count.clone();
//!     move |_| count.get() * 2
//! });
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let _effect = effect({
//!     let (count, doubled, log) = (count.clone(), doubled.clone(), log.clone());
//!     move || log.borrow_mut().push((count.get(), doubled.get()))
//! });
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically re-ran
//! assert_eq!(*log.borrow(), vec![(0, 0), (5, 10)]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use graph::{GraphStats, NodeId, NodeKind};
pub use reactive::{
    batch, computed, effect, effect_scope, end_batch, pause_tracking, resume_tracking, signal,
    start_batch, untracked, Computed, Effect, EffectScope, Signal,
};
