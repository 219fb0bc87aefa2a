//! Effect Scopes
//!
//! A scope collects the effects created while its body runs, plus the
//! computeds read there outside of any effect, so that they can all be
//! disposed together.

use std::marker::PhantomData;

use crate::graph::NodeId;

use super::runtime::Runtime;

/// Handle to an effect scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectScope {
    node: NodeId,
    _not_send: PhantomData<*const ()>,
}

impl EffectScope {
    /// Create a scope and run `f` inside it.
    pub fn new(f: impl FnOnce()) -> Self {
        let node = Runtime::with(|rt| rt.create_scope(f));
        Self {
            node,
            _not_send: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node
    }

    /// Dispose everything created inside the scope. Disposing twice is a
    /// no-op.
    pub fn dispose(&self) {
        Runtime::with(|rt| rt.dispose(self.node));
    }

    pub fn is_disposed(&self) -> bool {
        Runtime::with(|rt| !rt.graph(|graph| graph.contains(self.node)))
    }
}

/// Create a scope. Shorthand for [`EffectScope::new`].
pub fn effect_scope(f: impl FnOnce()) -> EffectScope {
    EffectScope::new(f)
}
