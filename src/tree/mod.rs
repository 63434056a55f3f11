// src/tree/mod.rs
// Accessibility Tree Adapter (C1, spec §4.1).
//
// The accessibility platform API itself is an external collaborator (spec
// §1 Non-goals): this module only defines the read-only, deadline-bounded
// capability set Slunk consumes, plus the bounded-size guarantees that
// protect the walker from runaway UI nodes.

mod mock;

#[cfg(all(target_os = "macos", feature = "macos-ax"))]
mod macos;

pub use mock::{MockElement, MockTree};

#[cfg(all(target_os = "macos", feature = "macos-ax"))]
pub use macos::AxTree;

use crate::error::{Result, SlunkError};
use async_trait::async_trait;
use std::time::Duration;

/// Default bound on the number of children a single container may report
/// before the walker refuses to enumerate them (spec §4.1).
pub const MAX_CHILDREN: usize = 1_000;

/// Default bound on the length of a single text value the walker will read
/// (spec §4.1).
pub const MAX_VALUE: usize = 1_000_000;

/// An opaque handle to a node in the accessibility tree. Adapters hand these
/// out and never let callers hold them across process ticks — ownership is
/// the adapter's, per spec §9's "Cyclic references (tree ↔ parent)" note.
pub type ElementId = u64;

/// The coarse accessibility role of a node (window, list, group, text, ...).
/// Adapter implementations map platform-specific role strings onto this.
pub type Role = String;

/// Read-only, deadline-bounded access to a single snapshot of a chat
/// application's accessibility tree (spec §4.1's capability set).
#[async_trait]
pub trait TreeAdapter: Send + Sync {
    /// The deadline applied to every call below, unless an explicit deadline
    /// is passed to a method that supports one.
    fn default_deadline(&self) -> Duration;

    /// The focused window, if any. Used by the parser to locate the active
    /// conversation (spec §4.2 step 1).
    async fn focused_window(&self) -> Result<Option<ElementId>>;

    fn role(&self, element: ElementId) -> Result<Role>;

    fn subrole(&self, element: ElementId) -> Result<Option<String>>;

    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>>;

    /// Enumerate direct children. Refuses (returns `TreeUnavailable`) when
    /// the element reports more than `max_children` children, per spec
    /// §4.1's bound against runaway UI nodes.
    fn children(&self, element: ElementId, max_children: usize) -> Result<Vec<ElementId>>;

    /// The element's text value, if any. Refuses values longer than
    /// `max_value` characters.
    fn value(&self, element: ElementId, max_value: usize) -> Result<Option<String>>;

    /// Walk up `depth` parent links from `element`.
    fn parent(&self, element: ElementId, depth: usize) -> Result<Option<ElementId>>;
}

/// Wraps a blocking tree read with the adapter's deadline, converting a
/// timeout into `SlunkError::Timeout` and any join failure into
/// `SlunkError::TreeUnavailable` (spec §4.1: "on timeout or invalid-element
/// it fails with `TreeUnavailable` and the caller aborts the current
/// snapshot cleanly").
pub async fn with_deadline<T, F>(deadline: Duration, op: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>> + Send,
    T: Send,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result,
        Err(_) => Err(SlunkError::Timeout(deadline)),
    }
}
