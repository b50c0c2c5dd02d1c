//! Diff-summary parsing into [`RevisionFiles`] records.
//!
//! Input is the conventional status-line format: one line per changed file,
//! starting with one colon for normal changes or two for combined merges,
//! with rename/copy lines carrying a three-field tab-separated status.
//! Lines that start with no colon separate per-parent blocks in merge
//! output and advance the parent counter.
//!
//! Parsed paths are interned into the cache's [`NamePools`]; the parser
//! only borrows the pools for the duration of one parse. File entries are
//! staged first and flushed into the record in one pass, so no path is
//! indexed twice and no partial state leaks between records.

use crate::files::{FileEntry, FileStatus, NamePools, RevisionFiles};

/// Offset of the status letter in a single-parent status line
/// (`:<mode> <mode> <id> <id> <letter>\t<path>`).
const STATUS_OFFSET: usize = 97;

/// Offset of the tab separating the status letter from the path.
const TAB_OFFSET: usize = 98;

// ---------------------------------------------------------------------------
// DiffParser
// ---------------------------------------------------------------------------

/// Converts diff-summary text blocks into [`RevisionFiles`] records.
pub struct DiffParser<'a> {
    pools: &'a mut NamePools,
    staged: Vec<FileEntry>,
    clears_only_modified: bool,
}

impl<'a> DiffParser<'a> {
    /// Create a parser interning into `pools`.
    pub fn new(pools: &'a mut NamePools) -> Self {
        Self {
            pools,
            staged: Vec::new(),
            clears_only_modified: false,
        }
    }

    /// Parse one diff-summary block into a fresh record.
    pub fn parse(&mut self, text: &str) -> RevisionFiles {
        if !self.staged.is_empty() {
            tracing::debug!(
                pending = self.staged.len(),
                "discarding staged entries left over from an unfinished record"
            );
            self.staged.clear();
            self.clears_only_modified = false;
        }

        let mut rf = RevisionFiles::new();
        let mut parent: u32 = 1;

        for line in text.lines().filter(|l| !l.is_empty()) {
            let bytes = line.as_bytes();
            if bytes[0] != b':' {
                // Commit ids and other noise separate per-parent blocks.
                parent += 1;
                continue;
            }
            if bytes.get(1) == Some(&b':') {
                // Combined merge: no usable rename/similarity data, record
                // the file as modified for the contributing parent.
                let path = line.rsplit('\t').next().unwrap_or(line);
                self.stage(path, FileStatus::MODIFIED, true, parent, None);
                continue;
            }
            if bytes.get(TAB_OFFSET) == Some(&b'\t') {
                // Fast path: fixed-offset single-parent status line.
                let (Some(letter), Some(path)) = (
                    line.get(STATUS_OFFSET..TAB_OFFSET),
                    line.get(TAB_OFFSET + 1..),
                ) else {
                    tracing::debug!(line, "skipping malformed diff-summary line");
                    continue;
                };
                let letter = letter.chars().next().unwrap_or('M');
                let (status, keeps_only_modified) = FileStatus::from_status_letter(letter);
                self.stage(path, status, keeps_only_modified, parent, None);
            } else if let Some(row) = line.get(STATUS_OFFSET..) {
                self.stage_ext_status(row, parent);
            } else {
                tracing::debug!(line, "skipping malformed diff-summary line");
            }
        }

        self.flush_into(&mut rf);
        rf
    }

    /// Stage one untracked path (no diff line exists for it).
    pub fn stage_untracked(&mut self, path: &str) {
        self.stage(path, FileStatus::UNKNOWN, false, 1, None);
    }

    /// Move every staged entry into `rf`, skipping paths the record already
    /// carries, and fold the accumulated only-modified state into it.
    pub fn flush_into(&mut self, rf: &mut RevisionFiles) {
        for entry in self.staged.drain(..) {
            if rf.position_of(entry.dir, entry.name).is_none() {
                rf.push(entry);
            }
        }
        if self.clears_only_modified {
            rf.set_only_modified(false);
            self.clears_only_modified = false;
        }
    }

    fn stage(
        &mut self,
        path: &str,
        status: FileStatus,
        keeps_only_modified: bool,
        parent: u32,
        ext_status: Option<String>,
    ) {
        let (dir, name) = self.pools.intern(path);
        if !keeps_only_modified {
            self.clears_only_modified = true;
        }
        self.staged.push(FileEntry {
            dir,
            name,
            status,
            merge_parent: parent,
            ext_status,
        });
    }

    /// Rename/copy status row: `<R|C><NN>\t<orig>\t<dest>`. Synthesizes a
    /// NEW entry at the destination and, for renames only, a DELETED entry
    /// at the origin, both annotated `"orig --> dest (NN%)"`.
    fn stage_ext_status(&mut self, row: &str, parent: u32) {
        let fields: Vec<&str> = row.split('\t').filter(|s| !s.is_empty()).collect();
        let &[kind, orig, dest] = fields.as_slice() else {
            tracing::debug!(row, "skipping rename/copy row without three fields");
            return;
        };

        let similarity = kind.get(1..).and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
        let annotation = format!("{orig} --> {dest} ({similarity}%)");

        self.stage(
            dest,
            FileStatus::NEW,
            false,
            parent,
            Some(annotation.clone()),
        );
        if kind.starts_with('R') {
            // A copy keeps the origin; only a rename deletes it.
            self.stage(orig, FileStatus::DELETED, false, parent, Some(annotation));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Build a well-formed single-parent status line for `path`.
    fn status_line(letter: char, path: &str) -> String {
        format!(
            ":100644 100644 {} {} {letter}\t{path}",
            "a".repeat(40),
            "b".repeat(40),
        )
    }

    fn parse(text: &str) -> (RevisionFiles, NamePools) {
        let mut pools = NamePools::new();
        let rf = DiffParser::new(&mut pools).parse(text);
        (rf, pools)
    }

    #[test]
    fn fast_path_modified_line() {
        let (rf, pools) = parse(&status_line('M', "src/lib.rs"));
        assert_eq!(rf.count(), 1);
        assert_eq!(rf.paths(&pools), ["src/lib.rs"]);
        assert!(rf.status_contains(0, FileStatus::MODIFIED));
        assert!(rf.only_modified());
        assert_eq!(rf.entry(0).unwrap().merge_parent, 1);
    }

    #[test]
    fn fast_path_added_and_deleted() {
        let text = format!("{}\n{}", status_line('A', "new.rs"), status_line('D', "old.rs"));
        let (rf, pools) = parse(&text);
        assert_eq!(rf.paths(&pools), ["new.rs", "old.rs"]);
        assert!(rf.status_contains(0, FileStatus::NEW));
        assert!(rf.status_contains(1, FileStatus::DELETED));
        assert!(!rf.only_modified());
    }

    #[test]
    fn conflict_letter_sets_both_flags() {
        let (rf, _) = parse(&status_line('U', "conflicted.rs"));
        assert!(rf.status_contains(0, FileStatus::MODIFIED | FileStatus::CONFLICT));
    }

    #[test]
    fn rename_synthesizes_new_and_deleted() {
        let (rf, pools) = parse(&format!(
            ":100644 100644 {} {} R90\told/path.txt\tnew/path.txt",
            "a".repeat(40),
            "b".repeat(40),
        ));
        assert_eq!(rf.count(), 2);
        assert_eq!(rf.paths(&pools), ["new/path.txt", "old/path.txt"]);
        assert!(rf.status_contains(0, FileStatus::NEW));
        assert!(rf.status_contains(1, FileStatus::DELETED));
        let annotation = "old/path.txt --> new/path.txt (90%)";
        assert_eq!(rf.entry(0).unwrap().ext_status.as_deref(), Some(annotation));
        assert_eq!(rf.entry(1).unwrap().ext_status.as_deref(), Some(annotation));
        assert!(!rf.only_modified());
    }

    #[test]
    fn copy_synthesizes_new_only() {
        let (rf, pools) = parse(&format!(
            ":100644 100644 {} {} C80\ta.txt\tb.txt",
            "a".repeat(40),
            "b".repeat(40),
        ));
        assert_eq!(rf.count(), 1);
        assert_eq!(rf.paths(&pools), ["b.txt"]);
        assert!(rf.status_contains(0, FileStatus::NEW));
        assert_eq!(
            rf.entry(0).unwrap().ext_status.as_deref(),
            Some("a.txt --> b.txt (80%)")
        );
    }

    #[test]
    fn combined_merge_line_records_modification() {
        let text = format!(
            "::100644 100644 100644 {} {} {} MM\tsrc/shared.rs",
            "a".repeat(40),
            "b".repeat(40),
            "c".repeat(40),
        );
        let (rf, pools) = parse(&text);
        assert_eq!(rf.paths(&pools), ["src/shared.rs"]);
        assert!(rf.status_contains(0, FileStatus::MODIFIED));
        assert_eq!(rf.entry(0).unwrap().merge_parent, 1);
    }

    #[test]
    fn non_status_lines_advance_parent_counter() {
        let text = format!(
            "{}\n{}\n{}",
            status_line('M', "from-first-parent.rs"),
            "c".repeat(40), // commit id separating parent blocks
            status_line('M', "from-second-parent.rs"),
        );
        let (rf, _) = parse(&text);
        assert_eq!(rf.entry(0).unwrap().merge_parent, 1);
        assert_eq!(rf.entry(1).unwrap().merge_parent, 2);
    }

    #[test]
    fn duplicate_paths_are_indexed_once() {
        let text = format!(
            "{}\n{}",
            status_line('M', "src/lib.rs"),
            status_line('M', "src/lib.rs"),
        );
        let (rf, pools) = parse(&text);
        assert_eq!(rf.count(), 1);
        assert_eq!(rf.paths(&pools), ["src/lib.rs"]);
    }

    #[test]
    fn malformed_colon_lines_are_skipped() {
        let (rf, _) = parse(":too short to carry a status\n:x");
        assert!(rf.is_empty());
    }

    #[test]
    fn rename_row_without_three_fields_is_skipped() {
        let (rf, _) = parse(&format!(
            ":100644 100644 {} {} R90\tonly-one-path.txt",
            "a".repeat(40),
            "b".repeat(40),
        ));
        assert!(rf.is_empty());
    }

    #[test]
    fn empty_input_yields_empty_record() {
        let (rf, _) = parse("");
        assert!(rf.is_empty());
        assert!(rf.only_modified());
    }

    #[test]
    fn untracked_staging_flushes_into_record() {
        let mut pools = NamePools::new();
        let mut parser = DiffParser::new(&mut pools);
        let mut rf = parser.parse(&status_line('M', "tracked.rs"));
        parser.stage_untracked("scratch.tmp");
        parser.flush_into(&mut rf);
        assert_eq!(rf.count(), 2);
        assert!(rf.status_contains(1, FileStatus::UNKNOWN));
        assert_eq!(rf.paths(&pools), ["tracked.rs", "scratch.tmp"]);
    }

    #[test]
    fn staging_does_not_leak_between_records() {
        let mut pools = NamePools::new();
        let mut parser = DiffParser::new(&mut pools);
        parser.stage_untracked("leftover.tmp");
        // A new parse must not carry the unflushed entry into its record.
        let rf = parser.parse(&status_line('M', "src/lib.rs"));
        assert_eq!(rf.count(), 1);
    }

    #[test]
    fn components_are_shared_across_records() {
        let mut pools = NamePools::new();
        let mut parser = DiffParser::new(&mut pools);
        parser.parse(&status_line('M', "src/lib.rs"));
        parser.parse(&status_line('M', "src/main.rs"));
        assert_eq!(pools.dir_count(), 1);
        assert_eq!(pools.name_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_parser_never_panics(text in "\\PC*") {
            let mut pools = NamePools::new();
            let _ = DiffParser::new(&mut pools).parse(&text);
        }

        #[test]
        fn prop_colon_noise_never_panics(lines in prop::collection::vec(":{1,2}[ -~]{0,120}", 0..8)) {
            let mut pools = NamePools::new();
            let _ = DiffParser::new(&mut pools).parse(&lines.join("\n"));
        }

        #[test]
        fn prop_well_formed_lines_all_land(paths in prop::collection::hash_set("[a-z]{1,8}/[a-z]{1,8}\\.rs", 1..6)) {
            let text: Vec<String> = paths.iter().map(|p| status_line('M', p)).collect();
            let mut pools = NamePools::new();
            let rf = DiffParser::new(&mut pools).parse(&text.join("\n"));
            prop_assert_eq!(rf.count(), paths.len());
        }
    }
}
