//! Explicit scope markers for attribution
//!
//! Sprint 4: thread-local scope stack with RAII guards
//!
//! Frame-pair scanning works when the host's call stack is observable and
//! follows a known convention. When it is not, call sites annotate
//! themselves instead: entering a scope pushes a marker onto a thread-local
//! stack and returns a guard that pops it on drop. The innermost marker at
//! event time owns the event.
//!
//! Guards are tied to the thread that created them, so two threads never
//! see each other's scopes and no locking is involved.

use fnv::FnvHasher;
use std::cell::RefCell;
use std::hash::{Hash, Hasher};

/// Depth at which further pushes are refused
///
/// A runaway recursive host would otherwise grow the stack without bound.
/// Past this depth markers are dropped with a diagnostic; attribution
/// continues against the retained outer scopes.
pub const MAX_SCOPE_DEPTH: usize = 128;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ScopeMarker>> = const { RefCell::new(Vec::new()) };
}

/// One named scope on the thread's stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeMarker {
    /// Human-readable label, used as the owner when innermost
    pub label: String,
    /// FNV-1a hash of the label, stable across runs
    pub id: u64,
}

impl ScopeMarker {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let id = marker_id(&label);
        ScopeMarker { label, id }
    }
}

/// Stable 64-bit id for a scope label
pub fn marker_id(label: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    label.hash(&mut hasher);
    hasher.finish()
}

/// Handle to the calling thread's scope stack
///
/// All operations act on the current thread only. `enter` is the public
/// entry point; `push`/`pop` exist for guards and tests.
#[derive(Debug)]
pub struct ScopeStack;

impl ScopeStack {
    /// Enter a scope, returning a guard that leaves it on drop
    ///
    /// # Note
    ///
    /// Guards must drop in reverse entry order. Out-of-order drops are
    /// detected by marker id and reported via `tracing::debug!` rather
    /// than panicking; the stack is repaired by popping through the
    /// mismatched entry.
    #[must_use = "dropping the guard immediately exits the scope"]
    pub fn enter(label: impl Into<String>) -> ScopeGuard {
        let marker = ScopeMarker::new(label);
        let id = marker.id;
        let armed = Self::push(marker);
        ScopeGuard { id, armed }
    }

    /// Push a marker; returns false when the depth cap refused it
    pub fn push(marker: ScopeMarker) -> bool {
        SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() >= MAX_SCOPE_DEPTH {
                tracing::debug!(
                    label = %marker.label,
                    depth = stack.len(),
                    "scope depth cap reached, marker dropped"
                );
                return false;
            }
            stack.push(marker);
            true
        })
    }

    /// Pop the innermost marker
    pub fn pop() -> Option<ScopeMarker> {
        SCOPE_STACK.with(|stack| stack.borrow_mut().pop())
    }

    /// Current nesting depth on this thread
    pub fn depth() -> usize {
        SCOPE_STACK.with(|stack| stack.borrow().len())
    }

    pub fn is_empty() -> bool {
        Self::depth() == 0
    }

    /// Copy of the stack, outermost first
    pub fn snapshot() -> Vec<ScopeMarker> {
        SCOPE_STACK.with(|stack| stack.borrow().clone())
    }

    /// Label of the innermost scope, if any
    pub fn innermost() -> Option<String> {
        SCOPE_STACK.with(|stack| stack.borrow().last().map(|m| m.label.clone()))
    }

    fn pop_matching(id: u64) {
        SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last() {
                Some(top) if top.id == id => {
                    stack.pop();
                }
                Some(top) => {
                    tracing::debug!(
                        expected = id,
                        found = top.id,
                        "scope guard dropped out of order, repairing stack"
                    );
                    // Pop through the mismatched entry so outer guards
                    // still land on their own markers.
                    while let Some(popped) = stack.pop() {
                        if popped.id == id {
                            break;
                        }
                    }
                }
                None => {
                    tracing::debug!(expected = id, "scope guard dropped on empty stack");
                }
            }
        });
    }
}

/// RAII guard returned by [`ScopeStack::enter`]
///
/// Exits the scope when dropped. A guard whose push was refused by the
/// depth cap is disarmed and pops nothing.
#[derive(Debug)]
pub struct ScopeGuard {
    id: u64,
    armed: bool,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.armed {
            ScopeStack::pop_matching(self.id);
        }
    }
}

/// Enter a named scope for the rest of the enclosing block
///
/// # Example
///
/// ```
/// use rastro::layer_scope;
///
/// fn forward() {
///     let _scope = layer_scope!("conv1");
///     // allocations here attribute to "conv1"
/// }
/// ```
#[macro_export]
macro_rules! layer_scope {
    ($label:expr) => {
        $crate::scope::ScopeStack::enter($label)
    };
}
