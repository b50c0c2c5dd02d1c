//! Reference bookkeeping attached to individual commits.
//!
//! A [`ReferenceSet`] maps a [`RefKind`] to the reference names pointing at
//! one commit. The cache only stores and queries these strings; creating or
//! deleting the underlying refs is the version-control collaborator's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RefKind
// ---------------------------------------------------------------------------

/// The kind of a reference attached to a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RefKind {
    /// An annotated or lightweight tag.
    Tag,
    /// A local branch head.
    LocalBranch,
    /// A remote-tracking branch head.
    RemoteBranch,
    /// An applied patch marker.
    Applied,
    /// An unapplied patch marker.
    Unapplied,
    /// Wildcard kind used by callers that enumerate without filtering.
    AnyRef,
}

// ---------------------------------------------------------------------------
// ReferenceSet
// ---------------------------------------------------------------------------

/// The references attached to a single commit, grouped by kind.
///
/// Names keep their insertion order and duplicates are allowed; an absent
/// kind behaves as an empty list, never an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    refs: BTreeMap<RefKind, Vec<String>>,
}

impl ReferenceSet {
    /// Create an empty reference set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `name` under `kind`, preserving insertion order.
    pub fn add(&mut self, kind: RefKind, name: &str) {
        self.refs.entry(kind).or_default().push(name.to_owned());
    }

    /// The names attached under `kind`; empty slice when none.
    #[must_use]
    pub fn get(&self, kind: RefKind) -> &[String] {
        self.refs.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Remove every occurrence of `name` under `kind`.
    pub fn remove(&mut self, kind: RefKind, name: &str) {
        if let Some(names) = self.refs.get_mut(&kind) {
            names.retain(|n| n != name);
            if names.is_empty() {
                self.refs.remove(&kind);
            }
        }
    }

    /// Merge every entry of `other` into this set, after this set's own
    /// entries of the same kind.
    pub fn merge(&mut self, other: Self) {
        for (kind, names) in other.refs {
            self.refs.entry(kind).or_default().extend(names);
        }
    }

    /// `true` if no reference of any kind is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Drop every reference of every kind.
    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
