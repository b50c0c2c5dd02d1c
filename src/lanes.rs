//! Streaming lane assignment for commit-graph rendering.
//!
//! [`Lanes`] walks commits in reverse-chronological order and maintains the
//! set of active rendering columns. For each commit the cache asks the
//! engine to classify the topology (fork, merge, branch start, root), takes
//! a snapshot of the per-column markers, and then advances the engine to the
//! commit's first parent. The snapshot sequence is what a renderer later
//! replays to draw connected column lines.
//!
//! The engine is re-seeded with [`init`](Lanes::init) whenever lane
//! continuity is intentionally broken, e.g. when the working-directory
//! pseudo-commit is resynthesized on refresh.

use serde::{Deserialize, Serialize};

use crate::types::CommitId;

// ---------------------------------------------------------------------------
// LaneType
// ---------------------------------------------------------------------------

/// The role of one rendering column at one commit row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneType {
    /// Unused column.
    Empty,
    /// The column carrying the commit being drawn.
    Active,
    /// A column passing through this row unchanged.
    NotActive,
    /// Node of a merge or fork.
    MergeFork,
    /// Merge/fork node with lines leaving to the left only.
    MergeForkL,
    /// Merge/fork node with lines leaving to the right only.
    MergeForkR,
    /// A lane joining into a merge node crossing other lanes.
    Join,
    /// Leftmost joining lane.
    JoinL,
    /// Rightmost joining lane.
    JoinR,
    /// First appearance of a merge parent not yet tracked by any lane.
    Head,
    /// Leftmost new-parent head.
    HeadL,
    /// Rightmost new-parent head.
    HeadR,
    /// A lane ending here because its commit forked from this row's commit.
    Tail,
    /// Leftmost ending lane.
    TailL,
    /// Rightmost ending lane.
    TailR,
    /// A pass-through lane crossed by a fork/merge line.
    Cross,
    /// An empty column crossed by a fork/merge line.
    CrossEmpty,
    /// A root commit (no parents).
    Initial,
    /// Start of a new branch line.
    Branch,
    /// Boundary commit marker.
    Boundary,
    /// Boundary node.
    BoundaryC,
    /// Leftmost boundary node.
    BoundaryL,
    /// Rightmost boundary node.
    BoundaryR,
}

impl LaneType {
    /// `true` for any head marker.
    #[must_use]
    pub const fn is_head(self) -> bool {
        matches!(self, Self::Head | Self::HeadL | Self::HeadR)
    }

    /// `true` for any join marker.
    #[must_use]
    pub const fn is_join(self) -> bool {
        matches!(self, Self::Join | Self::JoinL | Self::JoinR)
    }

    /// `true` for any tail marker.
    #[must_use]
    pub const fn is_tail(self) -> bool {
        matches!(self, Self::Tail | Self::TailL | Self::TailR)
    }

    /// `true` for any merge/fork node marker, boundary nodes included.
    #[must_use]
    pub const fn is_node(self) -> bool {
        matches!(
            self,
            Self::MergeFork
                | Self::MergeForkL
                | Self::MergeForkR
                | Self::BoundaryC
                | Self::BoundaryL
                | Self::BoundaryR
        )
    }
}

// ---------------------------------------------------------------------------
// Lanes
// ---------------------------------------------------------------------------

/// The active lane set of a reverse-chronological commit walk.
#[derive(Clone, Debug)]
pub struct Lanes {
    active_lane: usize,
    types: Vec<LaneType>,
    next_ids: Vec<Option<CommitId>>,
    boundary: bool,
    node: LaneType,
    node_l: LaneType,
    node_r: LaneType,
}

impl Default for Lanes {
    fn default() -> Self {
        Self::new()
    }
}

impl Lanes {
    /// Create an engine with no lanes; call [`init`](Self::init) before the
    /// first commit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active_lane: 0,
            types: Vec::new(),
            next_ids: Vec::new(),
            boundary: false,
            node: LaneType::MergeFork,
            node_l: LaneType::MergeForkL,
            node_r: LaneType::MergeForkR,
        }
    }

    /// `true` when no lane is tracked (cleared or never initialized).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Seed the walk: one branch lane expecting `id` as the next commit.
    pub fn init(&mut self, id: &CommitId) {
        self.clear();
        self.active_lane = 0;
        self.set_boundary(false);
        self.add(LaneType::Branch, Some(id.clone()), 0);
    }

    /// Drop all lane state.
    pub fn clear(&mut self) {
        self.types.clear();
        self.next_ids.clear();
    }

    /// Classify `id` against the tracked lanes.
    ///
    /// Returns `(fork, discontinuity)`: `fork` when more than one lane
    /// expects this commit (it has multiple already-seen children);
    /// `discontinuity` when the lane expecting it is not the active lane
    /// (or no lane expects it at all) and the active lane must be
    /// reassigned via [`change_active_lane`](Self::change_active_lane)
    /// before the commit is drawn.
    #[must_use]
    pub fn is_fork(&self, id: &CommitId) -> (bool, bool) {
        let pos = self.find_next_id(id, 0);
        let discontinuity = pos != Some(self.active_lane);
        match pos {
            None => (false, discontinuity), // new branch
            Some(pos) => (self.find_next_id(id, pos + 1).is_some(), discontinuity),
        }
    }

    /// Switch the boundary flag, selecting the node marker triple used by
    /// [`set_fork`](Self::set_fork) and [`set_merge`](Self::set_merge).
    pub fn set_boundary(&mut self, boundary: bool) {
        self.boundary = boundary;
        if boundary {
            self.node = LaneType::BoundaryC;
            self.node_r = LaneType::BoundaryR;
            self.node_l = LaneType::BoundaryL;
            if let Some(t) = self.types.get_mut(self.active_lane) {
                *t = LaneType::Boundary;
            }
        } else {
            self.node = LaneType::MergeFork;
            self.node_r = LaneType::MergeForkR;
            self.node_l = LaneType::MergeForkL;
        }
    }

    /// Reassign the active lane to the one expecting `id`, adding a new
    /// branch lane when none does.
    pub fn change_active_lane(&mut self, id: &CommitId) {
        if self.types.is_empty() {
            return;
        }
        let t = &mut self.types[self.active_lane];
        *t = if *t == LaneType::Initial || *t == LaneType::Boundary {
            LaneType::Empty
        } else {
            LaneType::NotActive
        };

        self.active_lane = match self.find_next_id(id, 0) {
            Some(idx) => {
                self.types[idx] = LaneType::Active;
                idx
            }
            None => self.add(LaneType::Branch, Some(id.clone()), self.active_lane),
        };
    }

    /// Mark every lane expecting `id` as a tail of this commit's node.
    pub fn set_fork(&mut self, id: &CommitId) {
        let Some(range_start) = self.find_next_id(id, 0) else {
            return;
        };
        let mut range_end = range_start;
        let mut idx = Some(range_start);
        while let Some(i) = idx {
            range_end = i;
            self.types[i] = LaneType::Tail;
            idx = self.find_next_id(id, i + 1);
        }
        self.types[self.active_lane] = self.node;

        if self.types[range_start] == self.node {
            self.types[range_start] = self.node_l;
        }
        if self.types[range_end] == self.node {
            self.types[range_end] = self.node_r;
        }
        if self.types[range_start] == LaneType::Tail {
            self.types[range_start] = LaneType::TailL;
        }
        if self.types[range_end] == LaneType::Tail {
            self.types[range_end] = LaneType::TailR;
        }
        for i in range_start + 1..range_end {
            match self.types[i] {
                LaneType::NotActive => self.types[i] = LaneType::Cross,
                LaneType::Empty => self.types[i] = LaneType::CrossEmpty,
                _ => {}
            }
        }
    }

    /// Join or head every parent after the first into this commit's node.
    ///
    /// Must run after [`set_fork`](Self::set_fork) for the same commit.
    pub fn set_merge(&mut self, parents: &[CommitId]) {
        if self.boundary || self.types.is_empty() {
            return; // handled as a simple active line
        }

        let t = self.types[self.active_lane];
        let was_fork = t == self.node;
        let was_fork_l = t == self.node_l;
        let was_fork_r = t == self.node_r;
        let mut start_join_was_cross = false;
        let mut end_join_was_cross = false;

        self.types[self.active_lane] = self.node;

        let mut range_start = self.active_lane;
        let mut range_end = self.active_lane;
        for parent in parents.iter().skip(1) {
            match self.find_next_id(parent, 0) {
                Some(idx) => {
                    if idx > range_end {
                        range_end = idx;
                        end_join_was_cross = self.types[idx] == LaneType::Cross;
                    }
                    if idx < range_start {
                        range_start = idx;
                        start_join_was_cross = self.types[idx] == LaneType::Cross;
                    }
                    self.types[idx] = LaneType::Join;
                }
                None => {
                    range_end = self.add(LaneType::Head, Some(parent.clone()), range_end + 1);
                }
            }
        }

        if self.types[range_start] == self.node && !was_fork && !was_fork_r {
            self.types[range_start] = self.node_l;
        }
        if self.types[range_end] == self.node && !was_fork && !was_fork_l {
            self.types[range_end] = self.node_r;
        }
        if self.types[range_start] == LaneType::Join && !start_join_was_cross {
            self.types[range_start] = LaneType::JoinL;
        }
        if self.types[range_end] == LaneType::Join && !end_join_was_cross {
            self.types[range_end] = LaneType::JoinR;
        }
        if self.types[range_start] == LaneType::Head {
            self.types[range_start] = LaneType::HeadL;
        }
        if self.types[range_end] == LaneType::Head {
            self.types[range_end] = LaneType::HeadR;
        }

        for i in range_start + 1..range_end {
            match self.types[i] {
                LaneType::NotActive => self.types[i] = LaneType::Cross,
                LaneType::Empty => self.types[i] = LaneType::CrossEmpty,
                LaneType::TailL | LaneType::TailR => self.types[i] = LaneType::Tail,
                _ => {}
            }
        }
    }

    /// Mark the active lane as a root commit.
    pub fn set_initial(&mut self) {
        let Some(&t) = self.types.get(self.active_lane) else {
            return;
        };
        if !t.is_node() {
            self.types[self.active_lane] = if self.boundary {
                LaneType::Boundary
            } else {
                LaneType::Initial
            };
        }
    }

    /// Record the identifier the active lane expects next; `None` for roots
    /// (and boundary commits, whose continuation is not tracked).
    pub fn next_parent(&mut self, id: Option<&CommitId>) {
        if let Some(slot) = self.next_ids.get_mut(self.active_lane) {
            *slot = if self.boundary { None } else { id.cloned() };
        }
    }

    /// Post-snapshot transition after a merge commit.
    pub fn after_merge(&mut self) {
        if self.boundary {
            return; // will be reset by change_active_lane()
        }
        for t in &mut self.types {
            if t.is_head() || t.is_join() || *t == LaneType::Cross {
                *t = LaneType::NotActive;
            } else if *t == LaneType::CrossEmpty {
                *t = LaneType::Empty;
            } else if t.is_node() {
                *t = LaneType::Active;
            }
        }
    }

    /// Post-snapshot transition after a fork commit; trailing empty lanes
    /// are released.
    pub fn after_fork(&mut self) {
        for t in &mut self.types {
            if *t == LaneType::Cross {
                *t = LaneType::NotActive;
            } else if t.is_tail() || *t == LaneType::CrossEmpty {
                *t = LaneType::Empty;
            }
            if t.is_node() {
                *t = LaneType::Active;
            }
        }
        while matches!(self.types.last(), Some(LaneType::Empty)) {
            self.types.pop();
            self.next_ids.pop();
        }
    }

    /// `true` when the active lane is a freshly started branch line.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.types.get(self.active_lane) == Some(&LaneType::Branch)
    }

    /// Post-snapshot transition after a branch-start commit.
    pub fn after_branch(&mut self) {
        if let Some(t) = self.types.get_mut(self.active_lane) {
            *t = LaneType::Active;
        }
    }

    /// Snapshot of the current per-column markers.
    #[must_use]
    pub fn lanes(&self) -> Vec<LaneType> {
        self.types.clone()
    }

    fn find_next_id(&self, id: &CommitId, from: usize) -> Option<usize> {
        self.next_ids
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, next)| next.as_ref() == Some(id))
            .map(|(i, _)| i)
    }

    fn find_type(&self, wanted: LaneType, from: usize) -> Option<usize> {
        self.types
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, t)| **t == wanted)
            .map(|(i, _)| i)
    }

    /// Put a lane at the first empty slot at or after `pos`, appending a new
    /// column when none is free. Returns the slot used.
    fn add(&mut self, t: LaneType, next: Option<CommitId>, pos: usize) -> usize {
        if pos < self.types.len() {
            if let Some(slot) = self.find_type(LaneType::Empty, pos) {
                self.types[slot] = t;
                self.next_ids[slot] = next;
                return slot;
            }
        }
        self.types.push(t);
        self.next_ids.push(next);
        self.types.len() - 1
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
