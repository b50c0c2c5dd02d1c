//! The revision cache: owner of all commit records and derived indices.
//!
//! [`RevisionCache`] maps a mutable, partially-known commit set to stable
//! row positions. Records live in an arena addressed by integer handles;
//! the row index and the identifier index are parallel handle tables into
//! that arena, never a second ownership path.
//!
//! # Concurrency
//!
//! All operations are safe to call from multiple threads. One mutex guards
//! the whole index state; mutations serialize through it. During a bulk
//! load (between [`begin_bulk_load`](RevisionCache::begin_bulk_load) and
//! [`end_bulk_load`](RevisionCache::end_bulk_load)) the cache is in
//! *rebuilding* mode: reads short-circuit on an atomic flag before touching
//! the mutex and return default values with a diagnostic. This is the
//! expected staleness-over-failure behavior while the index is in flux,
//! not an error. A read racing the flag flip may observe one stale result;
//! callers must tolerate that.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::commit::{CommitRecord, Field};
use crate::files::{FileStatus, NamePools, RevisionFiles};
use crate::lanes::{LaneType, Lanes};
use crate::parser::DiffParser;
use crate::refs::RefKind;
use crate::types::{CommitId, ZERO_ID};

// ---------------------------------------------------------------------------
// LocalBranchDistances
// ---------------------------------------------------------------------------

/// Ahead/behind counts for one local branch, stored and returned verbatim.
/// The cache never computes these; the version-control collaborator does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBranchDistances {
    /// Commits ahead of the master branch.
    pub ahead_master: u32,
    /// Commits behind the master branch.
    pub behind_master: u32,
    /// Commits ahead of the origin counterpart.
    pub ahead_origin: u32,
    /// Commits behind the origin counterpart.
    pub behind_origin: u32,
}

// ---------------------------------------------------------------------------
// CacheState
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CacheState {
    /// Record arena; handles are indices and stay stable until drop.
    records: Vec<CommitRecord>,
    /// Row position → arena handle. `None` marks a pre-sized slot not yet
    /// filled during a bulk load. Row 0 is reserved for the
    /// working-directory pseudo-commit.
    rows: Vec<Option<usize>>,
    /// Identifier → arena handle.
    by_id: HashMap<String, usize>,
    /// File changes keyed by the directional pair (older, newer).
    rev_files: HashMap<(CommitId, CommitId), RevisionFiles>,
    /// Handles of commits carrying at least one reference, in attach order.
    referenced: Vec<usize>,
    distances: HashMap<String, LocalBranchDistances>,
    pools: NamePools,
    lanes: Lanes,
    untracked: Vec<String>,
}

impl CacheState {
    fn record_by_id(&self, id: &str) -> Option<&CommitRecord> {
        self.by_id.get(id).and_then(|&h| self.records.get(h))
    }

    fn search_rows(&self, field: Field, text: &str, from: usize) -> Option<&CommitRecord> {
        self.rows
            .iter()
            .skip(from)
            .filter_map(|row| row.and_then(|h| self.records.get(h)))
            .find(|record| record.field_text(field).contains(text))
    }

    fn insert_rev_files(
        &mut self,
        older: &CommitId,
        newer: &CommitId,
        files: RevisionFiles,
    ) -> bool {
        let key = (older.clone(), newer.clone());
        if self.rev_files.get(&key) == Some(&files) {
            return false;
        }
        tracing::debug!(older = %older, newer = %newer, "caching revision files");
        self.rev_files.insert(key, files);
        true
    }

    /// Synthesize the "all local changes" record: unstaged diff, then the
    /// untracked files, with index/conflict flags folded in from the staged
    /// diff.
    fn synth_workdir_files(&mut self, unstaged_diff: &str, staged_diff: &str) -> RevisionFiles {
        let untracked = self.untracked.clone();
        let mut parser = DiffParser::new(&mut self.pools);

        let mut rf = parser.parse(unstaged_diff);
        rf.set_only_modified(false);
        for path in &untracked {
            parser.stage_untracked(path);
        }
        parser.flush_into(&mut rf);

        let staged_rf = parser.parse(staged_diff);
        for i in 0..rf.count() {
            let Some((dir, name)) = rf.entry(i).map(|e| (e.dir, e.name)) else {
                continue;
            };
            if let Some(j) = staged_rf.position_of(dir, name) {
                if staged_rf.status_contains(j, FileStatus::CONFLICT) {
                    rf.add_status(i, FileStatus::CONFLICT);
                }
                rf.add_status(i, FileStatus::IN_INDEX);
            }
        }
        rf
    }
}

/// Classify one commit against the lane engine, snapshot the columns, then
/// advance the engine to the commit's first parent.
fn lane_snapshot(lanes: &mut Lanes, id: &CommitId, parents: &[CommitId]) -> Vec<LaneType> {
    tracing::trace!(id = %id, "updating lanes");
    if lanes.is_empty() {
        lanes.init(id);
    }

    let (is_fork, is_discontinuity) = lanes.is_fork(id);
    let is_merge = parents.len() > 1;

    if is_discontinuity {
        lanes.change_active_lane(id);
    }
    if is_fork {
        lanes.set_fork(id);
    }
    if is_merge {
        lanes.set_merge(parents);
    }
    if parents.is_empty() {
        lanes.set_initial();
    }

    let snapshot = lanes.lanes();

    lanes.next_parent(parents.first());
    if is_merge {
        lanes.after_merge();
    }
    if is_fork {
        lanes.after_fork();
    }
    if lanes.is_branch() {
        lanes.after_branch();
    }
    snapshot
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// RevisionCache
// ---------------------------------------------------------------------------

/// In-memory cache of a repository's commit graph with row positions,
/// identifier lookup, file-change records and lane snapshots.
#[derive(Default)]
pub struct RevisionCache {
    rebuilding: AtomicBool,
    state: Mutex<CacheState>,
}

impl RevisionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a bulk load is active and reads degrade to defaults.
    #[must_use]
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Number of rows, the reserved pseudo-commit row included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().rows.len()
    }

    /// `true` when the cache holds no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    // -- bulk load ----------------------------------------------------------

    /// Enter rebuilding mode for a reload of `expected` commits.
    ///
    /// On a cold cache the row index is pre-sized to `expected + 1`, the
    /// extra slot reserved for the working-directory pseudo-commit at row 0.
    /// A no-op when already rebuilding.
    pub fn begin_bulk_load(&self, expected: usize) {
        let mut state = self.lock();
        tracing::debug!(expected, "configuring the cache for a bulk load");
        if !self.is_rebuilding() {
            if state.rows.is_empty() {
                state.rows.resize(expected + 1, None);
                state.records.reserve(expected + 1);
                state.by_id.reserve(expected + 1);
            }
            self.rebuilding.store(true, Ordering::Release);
        }
    }

    /// Leave rebuilding mode; reads resume serving the new index.
    pub fn end_bulk_load(&self) {
        let _state = self.lock();
        self.rebuilding.store(false, Ordering::Release);
    }

    // -- mutations ----------------------------------------------------------

    /// Append one commit at row 1 after a local commit operation, migrating
    /// `local_branch` from the commit's first parent onto the new tip.
    pub fn append_commit(&self, mut record: CommitRecord, local_branch: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let snapshot = lane_snapshot(&mut state.lanes, record.id(), record.parents());
        record.set_lanes(snapshot);

        // A branch pointer always follows its tip.
        if let Some(&parent) = record
            .parent(0)
            .and_then(|p| state.by_id.get(p.as_str()))
        {
            if let Some(parent_record) = state.records.get_mut(parent) {
                parent_record
                    .references_mut()
                    .remove(RefKind::LocalBranch, local_branch);
            }
        }
        record.references_mut().add(RefKind::LocalBranch, local_branch);

        let id = record.id().as_str().to_owned();
        tracing::debug!(id = %id, "appending commit");
        let handle = state.records.len();
        state.records.push(record);
        let row = 1.min(state.rows.len());
        state.rows.insert(row, Some(handle));
        state.by_id.insert(id, handle);
    }

    /// Replace a placeholder record with its final content once the real
    /// identifier is known, preserving references already attached, and
    /// re-index it under the new identifier.
    pub fn rename_commit(&self, old_id: &str, mut record: CommitRecord) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(handle) = state.by_id.remove(old_id) else {
            tracing::debug!(old_id, "rename target not in the identifier index");
            return;
        };
        if let Some(placeholder) = state.records.get_mut(handle) {
            let kept = placeholder.take_references();
            record.references_mut().merge(kept);
        }
        state.by_id.insert(record.id().as_str().to_owned(), handle);
        if let Some(slot) = state.records.get_mut(handle) {
            *slot = record;
        }
    }

    /// Insert one commit during a bulk load at the given row hint.
    ///
    /// Duplicate identifiers are skipped idempotently. A hint past the end
    /// appends; otherwise the row is overwritten in place only when the
    /// existing record's content differs. Ignored (with a diagnostic)
    /// outside of rebuilding mode.
    pub fn insert_commit(&self, mut record: CommitRecord, position_hint: usize) {
        if !self.is_rebuilding() {
            tracing::info!(id = %record.id(), "insert ignored: the cache is not rebuilding");
            return;
        }
        let mut guard = self.lock();
        let state = &mut *guard;

        if state.by_id.contains_key(record.id().as_str()) {
            tracing::info!(id = %record.id(), "commit is already in the cache");
            return;
        }

        let snapshot = lane_snapshot(&mut state.lanes, record.id(), record.parents());
        record.set_lanes(snapshot);

        let id = record.id().as_str().to_owned();
        let first_parent = record.parent(0).map(|p| p.as_str().to_owned());

        let handle = if position_hint >= state.rows.len() {
            tracing::debug!(id = %id, "adding commit");
            let handle = state.records.len();
            state.records.push(record);
            state.rows.push(Some(handle));
            handle
        } else {
            let hinted = state.rows[position_hint];
            match hinted {
                None => {
                    tracing::debug!(id = %id, row = position_hint, "adding commit");
                    let handle = state.records.len();
                    state.records.push(record);
                    state.rows[position_hint] = Some(handle);
                    handle
                }
                Some(handle) => {
                    if !state.records[handle].same_content(&record) {
                        tracing::trace!(id = %id, row = position_hint, "overwriting commit");
                        let stale = state.records[handle].id().as_str().to_owned();
                        if stale != id {
                            state.by_id.remove(&stale);
                        }
                        state.records[handle] = record;
                    }
                    handle
                }
            }
        };
        state.by_id.insert(id, handle);

        // An index entry under this record's first parent can only be a
        // placeholder left by an incremental append: children arrive before
        // their parents in the reverse-chronological load, so the parent's
        // real record has not been inserted yet. Drop the stale key; the
        // parent re-registers when its own record arrives.
        if let Some(parent) = first_parent {
            if state.by_id.remove(&parent).is_some() {
                tracing::debug!(parent = %parent, "dropping stale placeholder index entry");
            }
        }
    }

    /// Attach one reference to a commit. Bulk-load-only.
    pub fn insert_reference(&self, id: &str, kind: RefKind, name: &str) {
        if !self.is_rebuilding() {
            tracing::info!("the cache is not rebuilding");
            return;
        }
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(&handle) = state.by_id.get(id) else {
            tracing::debug!(id, "reference target not in the cache");
            return;
        };
        tracing::debug!(id, name, "attaching reference");
        state.records[handle].references_mut().add(kind, name);
        if !state.referenced.contains(&handle) {
            state.referenced.push(handle);
        }
    }

    /// Clear every reference attached to a commit. Bulk-load-only.
    pub fn remove_all_references(&self, id: &str) {
        if !self.is_rebuilding() {
            tracing::info!("the cache is not rebuilding");
            return;
        }
        let mut guard = self.lock();
        let state = &mut *guard;

        if let Some(&handle) = state.by_id.get(id) {
            state.records[handle].references_mut().clear();
            state.referenced.retain(|&h| h != handle);
        }
    }

    /// Store ahead/behind distances for one local branch. Bulk-load-only.
    pub fn insert_local_branch_distances(&self, name: &str, distances: LocalBranchDistances) {
        if !self.is_rebuilding() {
            tracing::info!("the cache is not rebuilding");
            return;
        }
        self.lock().distances.insert(name.to_owned(), distances);
    }

    /// Cache the file changes between a directional commit pair.
    ///
    /// Returns `false` without storing when the cached value is already
    /// identical, so downstream consumers can skip redundant reparse work.
    pub fn insert_revision_files(
        &self,
        older: &CommitId,
        newer: &CommitId,
        files: RevisionFiles,
    ) -> bool {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return false;
        }
        self.lock().insert_rev_files(older, newer, files)
    }

    /// Rebuild the working-directory pseudo-commit from fresh diff text.
    ///
    /// The previous pseudo-commit is replaced wholesale: its file-change
    /// record, its row-0 slot and its index entry. The lane engine is
    /// re-seeded at the zero identifier since lane continuity is broken on
    /// purpose at every refresh.
    pub fn update_working_directory(
        &self,
        parent: &CommitId,
        unstaged_diff: &str,
        staged_diff: &str,
    ) {
        let mut guard = self.lock();
        let state = &mut *guard;

        tracing::debug!(parent = %parent, "updating the working-directory pseudo-commit");

        let files = state.synth_workdir_files(unstaged_diff, staged_diff);
        let log = if files.count() == state.untracked.len() {
            "No local changes"
        } else {
            "Local changes"
        };
        let zero = CommitId::zero();
        state.insert_rev_files(&zero, parent, files);

        let mut record =
            CommitRecord::new(zero, vec![parent.clone()], "-", now_secs(), log, "");
        state.lanes.init(record.id());
        let snapshot = lane_snapshot(&mut state.lanes, record.id(), record.parents());
        record.set_lanes(snapshot);

        match state.rows.first().copied().flatten() {
            Some(handle) => {
                let stale = state.records[handle].id().as_str().to_owned();
                if stale != ZERO_ID {
                    state.by_id.remove(&stale);
                }
                state.records[handle] = record;
                state.by_id.insert(ZERO_ID.to_owned(), handle);
            }
            None => {
                let handle = state.records.len();
                state.records.push(record);
                if state.rows.is_empty() {
                    state.rows.push(Some(handle));
                } else {
                    state.rows[0] = Some(handle);
                }
                state.by_id.insert(ZERO_ID.to_owned(), handle);
            }
        }
    }

    /// Replace the externally maintained untracked-file list.
    pub fn set_untracked_files(&self, files: Vec<String>) {
        self.lock().untracked = files;
    }

    /// Recompute every row's lane snapshot except the pseudo-commit's,
    /// continuing from the engine's current state.
    pub fn update_lanes(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;

        for row in 1..state.rows.len() {
            let Some(handle) = state.rows[row] else {
                continue;
            };
            let (id, parents) = match state.records.get(handle) {
                Some(record) => (record.id().clone(), record.parents().to_vec()),
                None => continue,
            };
            let snapshot = lane_snapshot(&mut state.lanes, &id, &parents);
            if let Some(record) = state.records.get_mut(handle) {
                record.set_lanes(snapshot);
            }
        }
    }

    /// Reset the lane engine without touching stored snapshots.
    pub fn clear_lanes(&self) {
        self.lock().lanes.clear();
    }

    /// Drop the derived indices: name pools, file-change cache, lane state,
    /// identifier index and the reference side list. Records and row
    /// positions survive until the cache is dropped.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.pools.clear();
        state.rev_files.clear();
        state.lanes.clear();
        state.by_id.clear();
        state.referenced.clear();
    }

    // -- queries ------------------------------------------------------------

    /// The record at `row`; the default record when out of range or while
    /// rebuilding.
    #[must_use]
    pub fn commit_by_row(&self, row: usize) -> CommitRecord {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return CommitRecord::default();
        }
        let state = self.lock();
        state
            .rows
            .get(row)
            .copied()
            .flatten()
            .and_then(|h| state.records.get(h))
            .cloned()
            .unwrap_or_default()
    }

    /// The record with identifier `id`, accepting abbreviations: an exact
    /// match first, then the first known identifier with `id` as a prefix.
    /// The default record when nothing matches or while rebuilding.
    #[must_use]
    pub fn commit_info(&self, id: &str) -> CommitRecord {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return CommitRecord::default();
        }
        let state = self.lock();
        if id.is_empty() {
            return CommitRecord::default();
        }
        if let Some(record) = state.record_by_id(id) {
            return record.clone();
        }
        state
            .by_id
            .iter()
            .find(|(key, _)| key.starts_with(id))
            .and_then(|(_, &h)| state.records.get(h))
            .cloned()
            .unwrap_or_default()
    }

    /// The row position of an exact identifier. Linear over the row index;
    /// position lookups are rare next to row-based access, so this cost is
    /// accepted rather than indexed.
    #[must_use]
    pub fn commit_pos(&self, id: &str) -> Option<usize> {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return None;
        }
        let state = self.lock();
        let &handle = state.by_id.get(id)?;
        state.rows.iter().position(|row| *row == Some(handle))
    }

    /// The first record whose `field` text contains `text`, scanning from
    /// `starting_row` and wrapping once from row 0 when nothing matched and
    /// the scan did not already start there.
    #[must_use]
    pub fn commit_by_field(&self, field: Field, text: &str, starting_row: usize) -> CommitRecord {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return CommitRecord::default();
        }
        let state = self.lock();
        state
            .search_rows(field, text, starting_row)
            .or_else(|| {
                if starting_row > 0 {
                    state.search_rows(field, text, 0)
                } else {
                    None
                }
            })
            .cloned()
            .unwrap_or_default()
    }

    /// Every referenced commit with its names of `kind`; empty while
    /// rebuilding.
    #[must_use]
    pub fn branches(&self, kind: RefKind) -> Vec<(CommitId, Vec<String>)> {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return Vec::new();
        }
        let state = self.lock();
        state
            .referenced
            .iter()
            .filter_map(|&h| state.records.get(h))
            .map(|record| (record.id().clone(), record.references_of(kind).to_vec()))
            .collect()
    }

    /// Every referenced commit with its tag names; empty while rebuilding.
    #[must_use]
    pub fn tags(&self) -> Vec<(CommitId, Vec<String>)> {
        self.branches(RefKind::Tag)
    }

    /// The first referenced commit carrying branch `name` of the requested
    /// locality; `None` when absent or while rebuilding.
    #[must_use]
    pub fn commit_for_branch(&self, name: &str, local: bool) -> Option<CommitId> {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return None;
        }
        let kind = if local {
            RefKind::LocalBranch
        } else {
            RefKind::RemoteBranch
        };
        let state = self.lock();
        state
            .referenced
            .iter()
            .filter_map(|&h| state.records.get(h))
            .find(|record| record.references_of(kind).iter().any(|n| n == name))
            .map(|record| record.id().clone())
    }

    /// The cached file changes for the directional pair (older, newer); the
    /// default record when absent or while rebuilding. The reversed pair is
    /// an independent entry.
    #[must_use]
    pub fn revision_files(&self, older: &CommitId, newer: &CommitId) -> RevisionFiles {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return RevisionFiles::default();
        }
        self.lock()
            .rev_files
            .get(&(older.clone(), newer.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// `true` when the directional pair is cached; `false` while rebuilding.
    #[must_use]
    pub fn contains_revision_files(&self, older: &CommitId, newer: &CommitId) -> bool {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return false;
        }
        self.lock()
            .rev_files
            .contains_key(&(older.clone(), newer.clone()))
    }

    /// `true` when the synthesized working-directory record's file count
    /// equals the untracked-file count, i.e. no tracked change exists beyond
    /// the untracked files. Derived from cached state, never recomputed.
    #[must_use]
    pub fn pending_local_changes(&self) -> bool {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return false;
        }
        let state = self.lock();
        let Some(parent) = state
            .record_by_id(ZERO_ID)
            .and_then(|wip| wip.parent(0).cloned())
        else {
            return false;
        };
        let count = state
            .rev_files
            .get(&(CommitId::zero(), parent))
            .map_or(0, RevisionFiles::count);
        count == state.untracked.len()
    }

    /// Stored distances for `name`; the default when absent or rebuilding.
    #[must_use]
    pub fn local_branch_distances(&self, name: &str) -> LocalBranchDistances {
        if self.is_rebuilding() {
            tracing::info!("the cache is rebuilding");
            return LocalBranchDistances::default();
        }
        self.lock()
            .distances
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    /// Parse one diff-summary block against this cache's name pools without
    /// caching the result.
    #[must_use]
    pub fn parse_diff(&self, text: &str) -> RevisionFiles {
        let mut state = self.lock();
        DiffParser::new(&mut state.pools).parse(text)
    }

    /// Resolve a record's entries to full paths through this cache's pools.
    #[must_use]
    pub fn revision_file_paths(&self, files: &RevisionFiles) -> Vec<String> {
        files.paths(&self.lock().pools)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn oid(c: char) -> CommitId {
        CommitId::new(&c.to_string().repeat(40)).unwrap()
    }

    fn record(c: char, parents: &[char]) -> CommitRecord {
        CommitRecord::new(
            oid(c),
            parents.iter().map(|&p| oid(p)).collect(),
            "Alice <alice@example.com>",
            1_700_000_000,
            format!("commit {c}"),
            String::new(),
        )
    }

    /// Load a linear history: row 1 = newest ... plus a WIP row 0.
    fn loaded_cache(chain: &[char]) -> RevisionCache {
        let cache = RevisionCache::new();
        cache.begin_bulk_load(chain.len());
        for (i, window) in chain.windows(2).enumerate() {
            cache.insert_commit(record(window[0], &[window[1]]), i + 1);
        }
        if let Some(&root) = chain.last() {
            cache.insert_commit(record(root, &[]), chain.len());
        }
        cache.end_bulk_load();
        cache
    }

    #[test]
    fn bulk_load_presizes_rows_only_when_cold() {
        let cache = RevisionCache::new();
        cache.begin_bulk_load(3);
        assert_eq!(cache.lock().rows.len(), 4);
        // Re-entering while locked is a no-op.
        cache.begin_bulk_load(100);
        assert_eq!(cache.lock().rows.len(), 4);
        cache.end_bulk_load();
        // Warm cache: no re-sizing.
        cache.begin_bulk_load(100);
        assert_eq!(cache.lock().rows.len(), 4);
        cache.end_bulk_load();
    }

    #[test]
    fn insert_fills_hinted_rows() {
        let cache = loaded_cache(&['a', 'b', 'c']);
        assert_eq!(cache.count(), 4);
        assert_eq!(cache.commit_by_row(1).id(), &oid('a'));
        assert_eq!(cache.commit_by_row(2).id(), &oid('b'));
        assert_eq!(cache.commit_by_row(3).id(), &oid('c'));
        // Row 0 is still the reserved (unfilled) pseudo-commit slot.
        assert!(!cache.commit_by_row(0).is_valid());
    }

    #[test]
    fn insert_outside_bulk_load_is_ignored() {
        let cache = RevisionCache::new();
        cache.insert_commit(record('a', &[]), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let cache = RevisionCache::new();
        cache.begin_bulk_load(2);
        cache.insert_commit(record('a', &['b']), 1);
        cache.insert_commit(record('b', &[]), 2);
        let rows = cache.lock().rows.len();
        cache.insert_commit(record('a', &['b']), 1);
        cache.end_bulk_load();
        assert_eq!(cache.lock().rows.len(), rows);
        assert_eq!(cache.commit_info(oid('a').as_str()).short_log(), "commit a");
    }

    #[test]
    fn overwrite_in_place_requires_changed_content() {
        let cache = RevisionCache::new();
        cache.begin_bulk_load(1);
        cache.insert_commit(record('a', &[]), 1);
        cache.end_bulk_load();

        // Same row, different commit: the row is overwritten and the stale
        // identifier unindexed.
        cache.begin_bulk_load(1);
        cache.insert_commit(record('b', &[]), 1);
        cache.end_bulk_load();
        assert_eq!(cache.commit_by_row(1).id(), &oid('b'));
        assert!(!cache.commit_info(oid('a').as_str()).is_valid());
    }

    #[test]
    fn rebuilding_reads_degrade_to_defaults() {
        let cache = loaded_cache(&['a', 'b']);
        cache.begin_bulk_load(10);
        assert!(!cache.commit_by_row(1).is_valid());
        assert!(!cache.commit_info(oid('a').as_str()).is_valid());
        assert_eq!(cache.commit_pos(oid('a').as_str()), None);
        assert!(!cache.commit_by_field(Field::ShortLog, "commit", 0).is_valid());
        assert!(cache.branches(RefKind::LocalBranch).is_empty());
        assert!(cache.tags().is_empty());
        assert_eq!(cache.commit_for_branch("main", true), None);
        assert!(cache.revision_files(&oid('a'), &oid('b')).is_empty());
        assert!(!cache.contains_revision_files(&oid('a'), &oid('b')));
        assert!(!cache.pending_local_changes());
        assert_eq!(
            cache.local_branch_distances("main"),
            LocalBranchDistances::default()
        );
        cache.end_bulk_load();
        assert!(cache.commit_by_row(1).is_valid());
    }

    #[test]
    fn commit_info_prefix_fallback() {
        let cache = loaded_cache(&['a', 'b']);
        let full = "a".repeat(40);
        assert_eq!(cache.commit_info(&full).id(), &oid('a'));
        assert_eq!(cache.commit_info("aaaa").id(), &oid('a'));
        assert!(!cache.commit_info("ffff").is_valid());
        assert!(!cache.commit_info("").is_valid());
    }

    #[test]
    fn commit_pos_resolves_rows() {
        let cache = loaded_cache(&['a', 'b', 'c']);
        assert_eq!(cache.commit_pos(oid('b').as_str()), Some(2));
        assert_eq!(cache.commit_pos(&"f".repeat(40)), None);
    }

    #[test]
    fn field_search_wraps_from_start() {
        let cache = loaded_cache(&['a', 'b', 'c']);
        // Starting past the only match wraps around to find it.
        let hit = cache.commit_by_field(Field::ShortLog, "commit a", 2);
        assert_eq!(hit.id(), &oid('a'));
        // Starting at zero does not retry; a miss is a miss.
        assert!(!cache.commit_by_field(Field::ShortLog, "no such log", 0).is_valid());
    }

    #[test]
    fn append_commit_lands_at_row_one_and_migrates_branch() {
        let cache = loaded_cache(&['b', 'c']);
        cache.begin_bulk_load(9);
        cache.insert_reference(oid('b').as_str(), RefKind::LocalBranch, "main");
        cache.end_bulk_load();

        cache.append_commit(record('a', &['b']), "main");

        assert_eq!(cache.commit_by_row(1).id(), &oid('a'));
        assert_eq!(cache.commit_by_row(2).id(), &oid('b'));
        let tip = cache.commit_info(oid('a').as_str());
        assert_eq!(tip.references_of(RefKind::LocalBranch), ["main"]);
        let old_tip = cache.commit_info(oid('b').as_str());
        assert!(old_tip.references_of(RefKind::LocalBranch).is_empty());
        // The appended record has a lane snapshot.
        assert!(!tip.lanes().is_empty());
    }

    #[test]
    fn rename_commit_preserves_references() {
        let cache = RevisionCache::new();
        let placeholder = "e".repeat(40);
        cache.begin_bulk_load(1);
        cache.insert_commit(record('e', &[]), 1);
        cache.insert_reference(&placeholder, RefKind::LocalBranch, "main");
        cache.end_bulk_load();

        cache.rename_commit(&placeholder, record('a', &[]));

        let renamed = cache.commit_info(oid('a').as_str());
        assert!(renamed.is_valid());
        assert_eq!(renamed.references_of(RefKind::LocalBranch), ["main"]);
        assert!(!cache.commit_info(&placeholder).is_valid());
    }

    #[test]
    fn rename_unknown_id_is_ignored() {
        let cache = loaded_cache(&['a']);
        cache.rename_commit(&"f".repeat(40), record('b', &[]));
        assert!(!cache.commit_info(oid('b').as_str()).is_valid());
    }

    #[test]
    fn references_enumerate_by_kind() {
        let cache = loaded_cache(&['a', 'b']);
        cache.begin_bulk_load(9);
        cache.insert_reference(oid('a').as_str(), RefKind::LocalBranch, "main");
        cache.insert_reference(oid('a').as_str(), RefKind::Tag, "v2.0");
        cache.insert_reference(oid('b').as_str(), RefKind::RemoteBranch, "origin/main");
        cache.insert_reference(oid('b').as_str(), RefKind::Tag, "v1.0");
        cache.end_bulk_load();

        let tags = cache.tags();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0], (oid('a'), vec!["v2.0".to_owned()]));
        assert_eq!(tags[1], (oid('b'), vec!["v1.0".to_owned()]));

        assert_eq!(cache.commit_for_branch("main", true), Some(oid('a')));
        assert_eq!(cache.commit_for_branch("origin/main", false), Some(oid('b')));
        assert_eq!(cache.commit_for_branch("main", false), None);
    }

    #[test]
    fn remove_all_references_clears_and_delists() {
        let cache = loaded_cache(&['a']);
        cache.begin_bulk_load(9);
        cache.insert_reference(oid('a').as_str(), RefKind::Tag, "v1.0");
        cache.remove_all_references(oid('a').as_str());
        cache.end_bulk_load();
        assert!(cache.tags().is_empty());
        assert!(cache.commit_info(oid('a').as_str()).references().is_empty());
    }

    #[test]
    fn revision_files_pairs_are_directional() {
        let cache = RevisionCache::new();
        let mut files = RevisionFiles::new();
        files.set_only_modified(false);
        assert!(cache.insert_revision_files(&oid('a'), &oid('b'), files.clone()));
        assert!(cache.contains_revision_files(&oid('a'), &oid('b')));
        assert!(!cache.contains_revision_files(&oid('b'), &oid('a')));
        // Unchanged value: no-op.
        assert!(!cache.insert_revision_files(&oid('a'), &oid('b'), files));
    }

    #[test]
    fn distances_stored_verbatim() {
        let cache = RevisionCache::new();
        let distances = LocalBranchDistances {
            ahead_master: 2,
            behind_master: 5,
            ahead_origin: 1,
            behind_origin: 0,
        };
        cache.begin_bulk_load(0);
        cache.insert_local_branch_distances("feature", distances);
        cache.end_bulk_load();
        assert_eq!(cache.local_branch_distances("feature"), distances);
        assert_eq!(
            cache.local_branch_distances("missing"),
            LocalBranchDistances::default()
        );
    }

    #[test]
    fn working_directory_replaces_row_zero() {
        let cache = loaded_cache(&['a', 'b']);
        cache.set_untracked_files(vec!["scratch.tmp".to_owned()]);
        cache.update_working_directory(&oid('a'), "", "");

        let wip = cache.commit_by_row(0);
        assert!(wip.is_working_dir());
        assert_eq!(wip.parent(0), Some(&oid('a')));
        assert_eq!(wip.short_log(), "No local changes");
        assert!(!wip.lanes().is_empty());

        // Refresh onto a different parent replaces it wholesale.
        cache.update_working_directory(&oid('b'), "", "");
        let wip = cache.commit_by_row(0);
        assert_eq!(wip.parent(0), Some(&oid('b')));
        assert_eq!(cache.count(), 3);
    }

    #[test]
    fn working_directory_detects_tracked_changes() {
        let cache = loaded_cache(&['a']);
        cache.set_untracked_files(vec!["scratch.tmp".to_owned()]);
        let diff = format!(
            ":100644 100644 {} {} M\tsrc/lib.rs",
            "1".repeat(40),
            "2".repeat(40),
        );
        cache.update_working_directory(&oid('a'), &diff, "");
        assert_eq!(cache.commit_by_row(0).short_log(), "Local changes");

        let files = cache.revision_files(&CommitId::zero(), &oid('a'));
        assert_eq!(files.count(), 2);
        assert_eq!(
            cache.revision_file_paths(&files),
            ["src/lib.rs", "scratch.tmp"]
        );
        assert!(files.status_contains(0, FileStatus::MODIFIED));
        assert!(files.status_contains(1, FileStatus::UNKNOWN));
    }

    #[test]
    fn staged_entries_gain_index_flags() {
        let cache = loaded_cache(&['a']);
        let unstaged = format!(
            ":100644 100644 {} {} M\tsrc/lib.rs\n:100644 100644 {} {} M\tsrc/other.rs",
            "1".repeat(40),
            "2".repeat(40),
            "3".repeat(40),
            "4".repeat(40),
        );
        let staged = format!(
            ":100644 100644 {} {} U\tsrc/lib.rs",
            "1".repeat(40),
            "2".repeat(40),
        );
        cache.update_working_directory(&oid('a'), &unstaged, &staged);
        let files = cache.revision_files(&CommitId::zero(), &oid('a'));
        assert!(files.status_contains(0, FileStatus::IN_INDEX | FileStatus::CONFLICT));
        assert!(files.status_contains(1, FileStatus::MODIFIED));
        assert!(!files.status_contains(1, FileStatus::IN_INDEX));
    }

    #[test]
    fn pending_local_changes_tracks_untracked_count() {
        let cache = loaded_cache(&['a']);
        cache.set_untracked_files(vec!["scratch.tmp".to_owned()]);
        cache.update_working_directory(&oid('a'), "", "");
        // Only the untracked file: counts match.
        assert!(cache.pending_local_changes());

        let diff = format!(
            ":100644 100644 {} {} M\tsrc/lib.rs",
            "1".repeat(40),
            "2".repeat(40),
        );
        cache.update_working_directory(&oid('a'), &diff, "");
        // One tracked modification on top: counts differ.
        assert!(!cache.pending_local_changes());
    }

    #[test]
    fn pending_local_changes_without_wip_is_false() {
        let cache = loaded_cache(&['a']);
        assert!(!cache.pending_local_changes());
    }

    #[test]
    fn lanes_connect_rows_after_bulk_load() {
        let cache = RevisionCache::new();
        cache.begin_bulk_load(3);
        // a merges b and c; c roots the graph.
        cache.insert_commit(record('a', &['b', 'c']), 1);
        cache.insert_commit(record('b', &['c']), 2);
        cache.insert_commit(record('c', &[]), 3);
        cache.end_bulk_load();

        assert_eq!(
            cache.commit_by_row(1).lanes(),
            [LaneType::MergeForkL, LaneType::HeadR]
        );
        assert_eq!(
            cache.commit_by_row(2).lanes(),
            [LaneType::Active, LaneType::NotActive]
        );
        assert_eq!(
            cache.commit_by_row(3).lanes(),
            [LaneType::MergeForkL, LaneType::TailR]
        );
    }

    #[test]
    fn update_lanes_recomputes_from_reset_engine() {
        let cache = loaded_cache(&['a', 'b', 'c']);
        let before: Vec<_> = (1..4).map(|r| cache.commit_by_row(r).lanes().to_vec()).collect();
        cache.clear_lanes();
        cache.update_lanes();
        let after: Vec<_> = (1..4).map(|r| cache.commit_by_row(r).lanes().to_vec()).collect();
        // A fresh engine walks the same topology to the same snapshots,
        // except the seed row which is a branch start again.
        assert_eq!(after[0], [LaneType::Branch]);
        assert_eq!(after[1..], before[1..]);
    }

    #[test]
    fn clear_drops_derived_indices_but_keeps_rows() {
        let cache = loaded_cache(&['a', 'b']);
        cache.begin_bulk_load(9);
        cache.insert_reference(oid('a').as_str(), RefKind::Tag, "v1.0");
        cache.end_bulk_load();
        let mut files = RevisionFiles::new();
        files.set_only_modified(false);
        cache.insert_revision_files(&oid('a'), &oid('b'), files);

        cache.clear();

        assert_eq!(cache.count(), 3);
        assert!(!cache.commit_info(oid('a').as_str()).is_valid());
        assert!(cache.tags().is_empty());
        assert!(!cache.contains_revision_files(&oid('a'), &oid('b')));
        // Row access still works; records are owned until drop.
        assert!(cache.commit_by_row(1).is_valid());
    }

    #[test]
    fn insert_drops_stale_placeholder_parent_key() {
        let cache = RevisionCache::new();
        // An incremental append indexed a placeholder id.
        cache.append_commit(record('b', &[]), "main");

        cache.begin_bulk_load(2);
        // The reload inserts a child naming 'b' as first parent: the stale
        // key is dropped, then 'b' re-registers with its real record.
        cache.insert_commit(record('a', &['b']), 1);
        assert!(!cache.lock().by_id.contains_key(oid('b').as_str()));
        cache.insert_commit(record('b', &[]), 2);
        cache.end_bulk_load();
        assert_eq!(cache.commit_info(oid('b').as_str()).id(), &oid('b'));
    }
}
