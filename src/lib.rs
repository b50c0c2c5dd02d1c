//! In-memory commit-graph cache with stable lane layout.
//!
//! `revcache` holds a repository's commit history as parsed from log/diff
//! text: random-access lookup by row position or identifier, a pair-keyed
//! file-change cache, reference bookkeeping, and a streaming lane
//! assignment so the graph renders as columns of connected lines.
//!
//! The crate is the storage and layout core of a history viewer. Invoking
//! the version-control tool, diffing text and drawing rows all live in
//! collaborators; this library only consumes their output and answers
//! their queries.
//!
//! # Crate layout
//!
//! - [`types`] — validated commit identifiers.
//! - [`refs`] — reference kinds and per-commit reference sets.
//! - [`commit`] — the commit record and its searchable fields.
//! - [`files`] — file-change records, status flags and name pools.
//! - [`parser`] — the diff-summary parser.
//! - [`lanes`] — the lane-assignment engine.
//! - [`cache`] — the [`RevisionCache`] tying everything together.

pub mod cache;
pub mod commit;
pub mod files;
pub mod lanes;
pub mod parser;
pub mod refs;
pub mod types;

// Re-export the vocabulary at the crate root for ergonomic imports:
// `use revcache::{RevisionCache, CommitRecord, RefKind};`
pub use cache::{LocalBranchDistances, RevisionCache};
pub use commit::{CommitRecord, Field};
pub use files::{FileEntry, FileStatus, NamePools, RevisionFiles};
pub use lanes::{LaneType, Lanes};
pub use parser::DiffParser;
pub use refs::{RefKind, ReferenceSet};
pub use types::{CommitId, ValidationError, ZERO_ID};
