/*!

Types/type aliases that abstract over the implementing backing type.

# Background and Motivation

A motivating example is the [`IString`] type, an interned string type. A number of external
crates could provide this functionality. This module redirects to whatever chosen implementation
we want. To use the [`string_cache` crate](https://crates.io/crates/string_cache), we define
`IString` as an alias for `string_cache::DefaultAtom`. If we later want to switch backing crates,
only this module needs to change.

The `log` module follows the same philosophy: its (crate) public interface consists only of
[`log::set_global_logging_threshold`]/[`log::get_global_logging_threshold`] and the macros
`critical!`, `error!`, `warning!`, `info!`, `debug!`, and `trace!`. The backing implementation
(currently `tracing`) is encapsulated there.

*/

mod rccell;

pub mod log;

// Re-exported so that the macros in `log` can expand to `$crate::tracing::...` from any
// downstream crate.
pub use tracing;

// For vectors that are expected to have few or zero elements.
pub use smallvec::{smallvec, SmallVec};

// region Hashing data structures
pub use std::collections::HashMap;
pub use std::collections::HashSet;

/// A set of `T`. Most sets in this crate are small (struct member names, catch-clause
/// identifiers), so a plain `HashSet` is the right default rather than reaching for a
/// specialized bitset.
pub type Set<T> = HashSet<T>;
// endregion

// Interned string. Use `DefaultAtom` for a cache shared across threads.
pub use string_cache::DefaultAtom as IString;

// Reference counted, interior-mutable cells used for symbol-table scopes, struct/object memory,
// and anything else with Python-dict-like shared-mutation semantics.
pub use rccell::{RcCell, WeakCell};
