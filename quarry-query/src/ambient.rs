//! Ambient default scopes.
//!
//! An ambient scope is an option set that applies to every parameterless
//! `scoped()` call on one entity type for as long as a guard is alive on the
//! current thread.
//!
//! ```rust
//! use quarry_query::{EntityType, Filter, OptionSet};
//!
//! let shirt = EntityType::builder("Shirt").build();
//! {
//!     let _guard = shirt.push_scope(OptionSet::new().filter(Filter::equals("tenant_id", 7)));
//!     assert!(!shirt.scoped().options().filter.is_none());
//! }
//! assert!(shirt.scoped().options().filter.is_none());
//! ```
//!
//! The stack lives in a thread local, so scopes pushed on one thread are
//! invisible to every other thread. Guards are `!Send` for the same reason.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::options::OptionSet;

/// Identifier of an entity type within the process.
pub type EntityId = u64;

thread_local! {
    /// Active ambient scopes for this thread, oldest first.
    static AMBIENT_SCOPES: RefCell<Vec<(EntityId, OptionSet)>> = const { RefCell::new(Vec::new()) };
}

/// Push an ambient scope for `entity` on the current thread.
///
/// The scope stays active until the returned guard is dropped.
pub fn push(entity: EntityId, options: OptionSet) -> AmbientScopeGuard {
    let depth = AMBIENT_SCOPES.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push((entity, options));
        depth
    });
    crate::quarry_trace!(entity, depth, "pushed ambient scope");

    AmbientScopeGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// Merge every ambient scope active for `entity`, oldest first.
///
/// Returns `None` when no scope is active, so callers can skip the merge.
pub fn current(entity: EntityId) -> Option<OptionSet> {
    AMBIENT_SCOPES.with(|stack| {
        let stack = stack.borrow();
        let mut active = stack.iter().filter(|(id, _)| *id == entity).map(|(_, o)| o);
        let first = active.next()?.clone();
        Some(active.fold(first, |acc, options| acc.merge(options)))
    })
}

/// Number of ambient scopes active on this thread, across all entity types.
pub fn depth() -> usize {
    AMBIENT_SCOPES.with(|stack| stack.borrow().len())
}

/// Guard that pops an ambient scope when dropped.
///
/// Dropping truncates the stack back to its depth at push time, which also
/// releases any scope pushed after this one and leaked with
/// [`std::mem::forget`].
#[must_use = "the ambient scope is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct AmbientScopeGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl AmbientScopeGuard {
    /// Stack depth this guard restores on drop.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for AmbientScopeGuard {
    fn drop(&mut self) {
        AMBIENT_SCOPES.with(|stack| stack.borrow_mut().truncate(self.depth));
        crate::quarry_trace!(depth = self.depth, "released ambient scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_and_release() {
        assert_eq!(current(1), None);
        {
            let _guard = push(1, OptionSet::new().limit(5));
            assert_eq!(current(1).and_then(|o| o.limit), Some(5));
            assert_eq!(current(2), None);
        }
        assert_eq!(current(1), None);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_nested_scopes_merge_oldest_first() {
        let _outer = push(1, OptionSet::new().limit(5).filter(Filter::equals("a", 1)));
        let _inner = push(1, OptionSet::new().limit(10).filter(Filter::equals("b", 2)));

        let merged = current(1).unwrap();
        assert_eq!(merged.limit, Some(10));
        assert_eq!(merged.filter.terms().len(), 2);
    }

    #[test]
    fn test_outer_guard_releases_leaked_inner() {
        let outer = push(3, OptionSet::new().limit(1));
        std::mem::forget(push(3, OptionSet::new().limit(2)));
        assert_eq!(depth(), 2);

        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_released_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = push(4, OptionSet::new().limit(1));
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(current(4), None);
    }

    #[test]
    fn test_scopes_are_thread_local() {
        let _guard = push(5, OptionSet::new().limit(1));
        let seen = std::thread::spawn(|| current(5)).join().unwrap();
        assert_eq!(seen, None);
    }
}
