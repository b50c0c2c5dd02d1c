//! The commit record stored at every cache row.

use serde::{Deserialize, Serialize};

use crate::lanes::LaneType;
use crate::refs::{RefKind, ReferenceSet};
use crate::types::CommitId;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A textual commit field usable for substring search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// The commit identifier.
    Sha,
    /// The author string (may embed an email in angle brackets).
    Author,
    /// The author timestamp, rendered as decimal seconds since epoch.
    Date,
    /// The first line of the log message.
    ShortLog,
    /// The log message body.
    LongLog,
}

// ---------------------------------------------------------------------------
// CommitRecord
// ---------------------------------------------------------------------------

/// One commit as held by the revision cache: identity, parents, metadata,
/// attached references and the computed lane snapshot.
///
/// The `Default` record is the documented "empty" value returned by degraded
/// reads; [`is_valid`](Self::is_valid) distinguishes it from real commits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    id: CommitId,
    parents: Vec<CommitId>,
    author: String,
    author_date: i64,
    short_log: String,
    long_log: String,
    references: ReferenceSet,
    lanes: Vec<LaneType>,
}

impl Default for CommitRecord {
    fn default() -> Self {
        Self {
            id: CommitId::empty(),
            parents: Vec::new(),
            author: String::new(),
            author_date: 0,
            short_log: String::new(),
            long_log: String::new(),
            references: ReferenceSet::new(),
            lanes: Vec::new(),
        }
    }
}

impl CommitRecord {
    /// Create a record from parsed log data. References and lanes start
    /// empty; the cache fills both during insertion.
    #[must_use]
    pub fn new(
        id: CommitId,
        parents: Vec<CommitId>,
        author: impl Into<String>,
        author_date: i64,
        short_log: impl Into<String>,
        long_log: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parents,
            author: author.into(),
            author_date,
            short_log: short_log.into(),
            long_log: long_log.into(),
            references: ReferenceSet::new(),
            lanes: Vec::new(),
        }
    }

    /// The commit identifier.
    #[must_use]
    pub fn id(&self) -> &CommitId {
        &self.id
    }

    /// All parent identifiers, oldest-first as parsed (first parent first).
    #[must_use]
    pub fn parents(&self) -> &[CommitId] {
        &self.parents
    }

    /// The `i`-th parent, if any.
    #[must_use]
    pub fn parent(&self, i: usize) -> Option<&CommitId> {
        self.parents.get(i)
    }

    /// Number of parents: 0 for a root, 1 for a normal commit, 2+ for merges.
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// The author string.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Author timestamp in seconds since epoch.
    #[must_use]
    pub const fn author_date(&self) -> i64 {
        self.author_date
    }

    /// First line of the log message.
    #[must_use]
    pub fn short_log(&self) -> &str {
        &self.short_log
    }

    /// Log message body.
    #[must_use]
    pub fn long_log(&self) -> &str {
        &self.long_log
    }

    /// The references attached to this commit.
    #[must_use]
    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    /// Mutable access for the cache's reference maintenance.
    pub(crate) fn references_mut(&mut self) -> &mut ReferenceSet {
        &mut self.references
    }

    /// Convenience: the names attached under one reference kind.
    #[must_use]
    pub fn references_of(&self, kind: RefKind) -> &[String] {
        self.references.get(kind)
    }

    /// The computed lane snapshot, one marker per rendering column.
    #[must_use]
    pub fn lanes(&self) -> &[LaneType] {
        &self.lanes
    }

    pub(crate) fn set_lanes(&mut self, lanes: Vec<LaneType>) {
        self.lanes = lanes;
    }

    pub(crate) fn take_references(&mut self) -> ReferenceSet {
        std::mem::take(&mut self.references)
    }

    /// `false` for the default record returned by degraded reads.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.as_str().is_empty()
    }

    /// `true` if this is the working-directory pseudo-commit.
    #[must_use]
    pub fn is_working_dir(&self) -> bool {
        self.id.is_zero()
    }

    /// Structural equality over identity fields only (id, parents, author,
    /// timestamp, logs). References and lanes are maintained by the cache
    /// and do not make two records "different content" for the purpose of
    /// overwrite-in-place.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.parents == other.parents
            && self.author == other.author
            && self.author_date == other.author_date
            && self.short_log == other.short_log
            && self.long_log == other.long_log
    }

    /// Render one searchable field as text.
    #[must_use]
    pub fn field_text(&self, field: Field) -> String {
        match field {
            Field::Sha => self.id.as_str().to_owned(),
            Field::Author => self.author.clone(),
            Field::Date => self.author_date.to_string(),
            Field::ShortLog => self.short_log.clone(),
            Field::LongLog => self.long_log.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
