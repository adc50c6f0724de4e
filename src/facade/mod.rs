//! Typed stores for scans and projects.
//!
//! Each facade wraps a [`ContentStore`](crate::store::ContentStore) and
//! dereferences to it for read access. Mutations go through the facade so
//! that its identifier slot stays consistent with the entry list.

mod project;
mod scan;

pub use project::*;
pub use scan::*;

/// Clear `slot` if its identifier is no longer listed.
fn drop_if_missing(slot: &mut Option<String>, present: impl Fn(&str) -> bool) {
    if slot.as_deref().is_some_and(|id| !present(id)) {
        *slot = None;
    }
}
