// bcli/src/anchor.rs

//! Cancellation anchors.
//!
//! A caller that wants to be notified of a request's completion holds
//! an [`Anchor`]; the driver only ever holds a [`Weak`] reference to
//! it. If the caller drops the anchor (goes out of scope, the owning
//! object is torn down) before the request finishes, the driver's weak
//! reference fails to upgrade and the completion is delivered to
//! nobody - the child process still runs to completion and is reaped,
//! but the result is thrown away. This mirrors a dangling opaque
//! callback pointer, but statically: there's no way to reference an
//! anchor that has already gone away.

use std::sync::{Arc, Weak};

/// A token the caller holds for as long as it still wants to receive a
/// request's completion.
#[derive(Debug, Default, Clone)]
pub struct Anchor(Arc<()>);

impl Anchor {
    /// Create a new, live anchor.
    pub fn new() -> Self {
        Self(Arc::new(()))
    }

    /// Obtain a weak handle the driver can poll without keeping the
    /// anchor alive.
    pub fn weak(&self) -> WeakAnchor {
        WeakAnchor(Arc::downgrade(&self.0))
    }
}

/// A non-owning handle to an [`Anchor`].
#[derive(Debug, Clone)]
pub struct WeakAnchor(Weak<()>);

impl WeakAnchor {
    /// `true` if the originating [`Anchor`] is still alive.
    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_anchor_is_live_while_anchor_exists() {
        let anchor = Anchor::new();
        let weak = anchor.weak();
        assert!(weak.is_live());
        drop(anchor);
        assert!(!weak.is_live());
    }

    #[test]
    fn cloned_anchor_keeps_weak_handle_live() {
        let anchor = Anchor::new();
        let clone = anchor.clone();
        let weak = anchor.weak();
        drop(anchor);
        assert!(weak.is_live());
        drop(clone);
        assert!(!weak.is_live());
    }
}
