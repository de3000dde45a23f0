//! Element change log managing deltas, undo, and redo.
//!
//! Records describe atomic changes to a line store; the log tracks them
//! with three cursors: `committed` (records applied to the element store),
//! `count` (records written including uncommitted), and a `future` stack
//! holding records retracted by undo. Snapshots of the cursor triple
//! identify versions, and `since` replays the deltas between a snapshot
//! and the present.

use tracing::trace;

use crate::line::Line;
use crate::sequence::Sequence;

/// Interface for communicating change summaries to observers.
///
/// Used by `Log::track` and the commit pipeline to report line and
/// codepoint deltas for cursor motion and view stabilization.
pub trait Summary {
    /// Report that lines were deleted and inserted at `ln_offset`.
    fn line_delta(&mut self, ln_offset: usize, deleted: usize, inserted: usize);

    /// Report that codepoints were deleted and inserted at `cp_offset` in
    /// the line identified by `ln_offset`.
    fn codepoint_delta(&mut self, ln_offset: usize, cp_offset: usize, deleted: usize, inserted: usize);
}

impl Summary for crate::position::CursorPair {
    fn line_delta(&mut self, ln_offset: usize, deleted: usize, inserted: usize) {
        if deleted > 0 {
            self.lines.delete(ln_offset as isize, deleted as isize);
        }
        if inserted > 0 {
            self.lines.insert(ln_offset as isize, inserted as isize);
        }
    }

    fn codepoint_delta(&mut self, ln_offset: usize, cp_offset: usize, deleted: usize, inserted: usize) {
        if self.lines.get() == ln_offset as isize {
            if deleted > 0 {
                self.codepoints.delete(cp_offset as isize, deleted as isize);
            }
            if inserted > 0 {
                self.codepoints.insert(cp_offset as isize, inserted as isize);
            }
        }
    }
}

fn cp_len(s: &str) -> usize {
    s.chars().count()
}

fn cp_byte(s: &str, cp: usize) -> usize {
    s.char_indices().nth(cp).map(|(i, _)| i).unwrap_or(s.len())
}

fn cp_splice(target: &str, position: usize, insertion: &str, removed_cp: usize) -> String {
    let b0 = cp_byte(target, position);
    let b1 = cp_byte(target, position + removed_cp);
    let mut out = String::with_capacity(target.len() + insertion.len());
    out.push_str(&target[..b0]);
    out.push_str(insertion);
    out.push_str(&target[b1..]);
    out
}

/// An individual record of change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A no-op change holding a creation stamp, delimiting record groups
    /// for undo and redo. The stamp is the log's committed count at the
    /// time of the write; monotonic per log.
    Checkpoint { when: u64 },

    /// Intra-line splice: `deletion` is removed at `position` before
    /// `insertion` is written there. Positions are content codepoints.
    Update {
        element: usize,
        insertion: String,
        deletion: String,
        position: usize,
    },

    /// Whole-line insertion and/or deletion at the element offset. Equal
    /// insertion and deletion counts express in-place replacement.
    Lines {
        element: usize,
        insertion: Vec<Line>,
        deletion: Vec<Line>,
    },

    /// Pure cursor displacement hint; no element mutation.
    Cursor {
        element: usize,
        lines: isize,
        position: usize,
        codepoints: isize,
    },
}

impl Record {
    /// The change in the element count caused by application.
    pub fn change(&self) -> isize {
        match self {
            Record::Lines {
                insertion, deletion, ..
            } => insertion.len() as isize - deletion.len() as isize,
            _ => 0,
        }
    }

    /// The element offset and count of elements changed.
    pub fn span(&self) -> (Option<usize>, usize) {
        match self {
            Record::Checkpoint { .. } => (None, 0),
            Record::Update { element, .. } => (Some(*element), 1),
            Record::Lines {
                element,
                insertion,
                deletion,
            } => (Some(*element), insertion.len().max(deletion.len())),
            Record::Cursor { element, .. } => (Some(*element), 0),
        }
    }

    /// The element offset the record addresses, when it addresses one.
    pub fn element(&self) -> Option<usize> {
        self.span().0
    }

    /// Construct the record reversing the effect of the change.
    pub fn invert(&self) -> Record {
        match self {
            Record::Checkpoint { .. } => self.clone(),
            Record::Update {
                element,
                insertion,
                deletion,
                position,
            } => Record::Update {
                element: *element,
                insertion: deletion.clone(),
                deletion: insertion.clone(),
                position: *position,
            },
            Record::Lines {
                element,
                insertion,
                deletion,
            } => Record::Lines {
                element: *element,
                insertion: deletion.clone(),
                deletion: insertion.clone(),
            },
            Record::Cursor {
                element,
                lines,
                position,
                codepoints,
            } => Record::Cursor {
                element: *element,
                lines: -lines,
                position: *position,
                codepoints: -codepoints,
            },
        }
    }

    /// Reconstruct the record as an ineffective operation: application
    /// leaves the target unchanged while the span is preserved.
    pub fn revert(&self) -> Record {
        match self {
            Record::Update {
                element,
                insertion,
                deletion,
                position,
            } => {
                if insertion == deletion {
                    return self.clone();
                }
                let d = if !insertion.is_empty() {
                    insertion.clone()
                } else {
                    deletion.clone()
                };
                Record::Update {
                    element: *element,
                    insertion: d.clone(),
                    deletion: d,
                    position: *position,
                }
            }
            Record::Lines {
                element,
                insertion,
                deletion,
            } => {
                if insertion == deletion {
                    return self.clone();
                }
                let d = if !insertion.is_empty() {
                    insertion.clone()
                } else {
                    deletion.clone()
                };
                Record::Lines {
                    element: *element,
                    insertion: d.clone(),
                    deletion: d,
                }
            }
            _ => self.clone(),
        }
    }

    /// Communicate the change summary to `target`.
    ///
    /// Equal-count line replacements leave the reference space unchanged
    /// and are not reported; the record itself still reaches views for
    /// redraw purposes.
    pub fn track(&self, target: &mut dyn Summary) {
        match self {
            Record::Checkpoint { .. } => {}
            Record::Update {
                element,
                insertion,
                deletion,
                position,
            } => {
                target.codepoint_delta(*element, *position, cp_len(deletion), cp_len(insertion));
            }
            Record::Lines {
                element,
                insertion,
                deletion,
            } => {
                let (d, i) = (deletion.len(), insertion.len());
                if d != i {
                    target.line_delta(*element, d, i);
                }
            }
            Record::Cursor {
                element,
                lines,
                position,
                codepoints,
            } => {
                if *lines > 0 {
                    target.line_delta(*element, 0, *lines as usize);
                } else if *lines < 0 {
                    target.line_delta(*element, (-lines) as usize, 0);
                }
                if *codepoints > 0 {
                    target.codepoint_delta(*element, *position, 0, *codepoints as usize);
                } else if *codepoints < 0 {
                    target.codepoint_delta(*element, *position, (-codepoints) as usize, 0);
                }
            }
        }
    }

    /// Perform the change on `target`.
    pub fn apply(&self, target: &mut dyn Sequence<Line>) {
        match self {
            Record::Checkpoint { .. } | Record::Cursor { .. } => {}
            Record::Update {
                element,
                insertion,
                deletion,
                position,
            } => {
                let Some(line) = target.get(*element) else {
                    trace!(target: "state.log", element, "update_apply_out_of_range");
                    return;
                };
                let mut updated = line.clone();
                updated.content = cp_splice(&line.content, *position, insertion, cp_len(deletion));
                target.set(*element, updated);
            }
            Record::Lines {
                element,
                insertion,
                deletion,
            } => {
                target.splice(*element, *element + deletion.len(), insertion.clone());
            }
        }
    }

    /// Perform the inverse, restoring `target` to its pre-apply state.
    pub fn retract(&self, target: &mut dyn Sequence<Line>) {
        match self {
            Record::Checkpoint { .. } | Record::Cursor { .. } => {}
            Record::Update {
                element,
                insertion,
                deletion,
                position,
            } => {
                let Some(line) = target.get(*element) else {
                    trace!(target: "state.log", element, "update_retract_out_of_range");
                    return;
                };
                let mut updated = line.clone();
                updated.content = cp_splice(&line.content, *position, deletion, cp_len(insertion));
                target.set(*element, updated);
            }
            Record::Lines {
                element,
                insertion,
                deletion,
            } => {
                target.splice(*element, *element + insertion.len(), deletion.clone());
            }
        }
    }

    /// Construct a new record combining `self` with `following`, or `None`
    /// when the pair cannot merge.
    pub fn combine(&self, following: &Record) -> Option<Record> {
        match (self, following) {
            (Record::Checkpoint { when: a }, Record::Checkpoint { when: b }) => {
                Some(Record::Checkpoint { when: *a.min(b) })
            }
            (
                Record::Update {
                    element,
                    insertion,
                    deletion,
                    position,
                },
                Record::Update {
                    element: fe,
                    insertion: fi,
                    deletion: fd,
                    position: fp,
                },
            ) if element == fe => {
                if !insertion.is_empty() {
                    // Editing the insertion.
                    if !deletion.is_empty() {
                        return None;
                    }
                    let stop = position + cp_len(insertion);
                    if *fp < *position || *fp > stop {
                        return None;
                    }
                    let rp = fp - position;

                    if fd.is_empty() {
                        // Contiguous insertion.
                        let mut merged = String::new();
                        merged.push_str(cp_prefix(insertion, rp));
                        merged.push_str(fi);
                        merged.push_str(cp_suffix(insertion, rp));
                        return Some(Record::Update {
                            element: *element,
                            insertion: merged,
                            deletion: deletion.clone(),
                            position: *position,
                        });
                    }

                    if fi.is_empty() && *fp < stop {
                        // Deletion within the insertion; must be prior to
                        // stop as deletion removes at the position.
                        let delsize = cp_len(fd);
                        let b0 = cp_byte(insertion, rp);
                        let b1 = cp_byte(insertion, rp + delsize);
                        if &insertion[b0..b1] == fd.as_str() {
                            let mut shrunk = String::new();
                            shrunk.push_str(&insertion[..b0]);
                            shrunk.push_str(&insertion[b1..]);
                            return Some(Record::Update {
                                element: *element,
                                insertion: shrunk,
                                deletion: deletion.clone(),
                                position: *position,
                            });
                        }
                    }
                    None
                } else if !deletion.is_empty() && fi.is_empty() && !fd.is_empty() {
                    // Combining the deletion.
                    if fp == position {
                        // Successive delete forward.
                        let mut merged = deletion.clone();
                        merged.push_str(fd);
                        return Some(Record::Update {
                            element: *element,
                            insertion: String::new(),
                            deletion: merged,
                            position: *position,
                        });
                    }
                    let end = fp + cp_len(fd);
                    if end == *position {
                        // Contiguous delete backwards.
                        let mut merged = fd.clone();
                        merged.push_str(deletion);
                        return Some(Record::Update {
                            element: *element,
                            insertion: String::new(),
                            deletion: merged,
                            position: *fp,
                        });
                    }
                    None
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn cp_prefix(s: &str, cp: usize) -> &str {
    &s[..cp_byte(s, cp)]
}

fn cp_suffix(s: &str, cp: usize) -> &str {
    &s[cp_byte(s, cp)..]
}

/// Version identifier for a log: the committed count, the collapse
/// counter, and the undo depth at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSnapshot {
    pub committed: usize,
    pub collapsed: u32,
    pub future: usize,
}

/// The record vector tracking changes.
#[derive(Debug, Default, Clone)]
pub struct Log {
    records: Vec<Record>,
    count: usize,
    committed: usize,
    collapsed: u32,
    future: Vec<Record>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn future_depth(&self) -> usize {
        self.future.len()
    }

    pub fn truncate(&mut self) {
        self.count = 0;
        self.committed = 0;
        self.collapsed = 0;
        self.records.clear();
        self.future.clear();
    }

    /// Construct a version identifier for the current state.
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            committed: self.committed,
            collapsed: self.collapsed,
            future: self.future.len(),
        }
    }

    /// Generate the ordered deltas moving a store at `snapshot` to the
    /// current state. Records retracted since the snapshot appear inverted,
    /// in retraction order.
    pub fn since(&self, snapshot: LogSnapshot) -> Vec<Record> {
        let mut out = Vec::new();

        if snapshot.committed == self.committed && snapshot.collapsed < self.collapsed {
            // A collapse folded later edits into an already-seen record;
            // re-emit the combined update.
            for r in self.records[..snapshot.committed.min(self.records.len())]
                .iter()
                .rev()
            {
                match r {
                    Record::Checkpoint { .. } => continue,
                    Record::Update { .. } => {
                        out.push(r.clone());
                        break;
                    }
                    _ => break,
                }
            }
        }

        out.extend(
            self.records[snapshot.committed.min(self.records.len())..self.count]
                .iter()
                .cloned(),
        );

        let fresh = self.future.len().saturating_sub(snapshot.future);
        out.extend(self.future[..fresh].iter().map(|r| r.invert()));
        out
    }

    /// Append a delta to the log.
    pub fn write(&mut self, record: Record) -> &mut Self {
        self.records.push(record);
        self.count += 1;
        self
    }

    /// The uncommitted deltas.
    pub fn pending(&self) -> &[Record] {
        &self.records[self.committed..self.count]
    }

    /// Report the pending change summaries to `target`.
    pub fn track(&self, target: &mut dyn Summary) {
        for r in self.pending() {
            r.track(target);
        }
    }

    /// Apply the current transaction to `target`.
    pub fn apply(&self, target: &mut dyn Sequence<Line>) {
        for r in self.pending() {
            r.apply(target);
        }
    }

    /// Retract the current transaction from `target`.
    pub fn retract(&self, target: &mut dyn Sequence<Line>) {
        for r in self.pending().iter().rev() {
            r.retract(target);
        }
    }

    /// Commit the leading deltas of the current transaction by combining
    /// records into the last committed one. Primarily eliminates successive
    /// character insertions and deletions from insert-mode typing.
    pub fn collapse(&mut self) -> &mut Self {
        if self.committed == 0 {
            // Nothing to collapse into.
            return self;
        }

        let ci = self.committed - 1;
        let mut current = self.records[ci].clone();

        let mut folded = 0usize;
        for r in &self.records[self.committed..self.count] {
            match current.combine(r) {
                Some(merged) => {
                    current = merged;
                    folded += 1;
                    self.collapsed += 1;
                }
                None => break,
            }
        }

        self.records[ci] = current;
        self.records.drain(self.committed..self.committed + folded);
        self.count -= folded;
        trace!(target: "state.log", folded, collapsed = self.collapsed, "collapse");
        self
    }

    /// Advance the commit position. Normally called directly after `apply`.
    pub fn commit(&mut self) -> &mut Self {
        if self.committed != self.count {
            self.collapsed = 0;
        }
        self.committed = self.count;
        self
    }

    /// Remove records written since the last commit.
    ///
    /// Deleting applied records would cause display inconsistencies, so
    /// this is reserved for failed transactions; `undo` is the normal path.
    pub fn abort(&mut self) -> &mut Self {
        self.records.truncate(self.committed);
        self.count = self.committed;
        self.collapsed = 0;
        self
    }

    /// Write a checkpoint, clearing any uncommitted records. Consecutive
    /// checkpoints are deduplicated.
    pub fn checkpoint(&mut self) -> &mut Self {
        if self.committed < self.count {
            self.abort();
        }
        if matches!(self.records.last(), None | Some(Record::Checkpoint { .. })) {
            return self;
        }

        self.records.push(Record::Checkpoint {
            when: self.committed as u64,
        });
        self.committed += 1;
        self.count += 1;
        self.collapsed = 0;
        debug_assert_eq!(self.count, self.records.len());
        debug_assert_eq!(self.committed, self.records.len());
        self
    }

    /// Retract records until `quantity` checkpoints have been traversed or
    /// the beginning of the log is reached. Returns the inverted records in
    /// application order.
    pub fn undo(&mut self, quantity: usize) -> Vec<Record> {
        self.checkpoint();
        let mut quantity = quantity + 1;

        let mut transfer: Vec<Record> = Vec::new();
        let mut i = self.committed;
        while i > 0 {
            i -= 1;
            let r = self.records[i].clone();
            let boundary = matches!(r, Record::Checkpoint { .. });
            transfer.push(r);
            if boundary {
                quantity -= 1;
                if quantity == 0 {
                    break;
                }
            }
        }

        self.records.drain(i..self.committed);
        self.committed -= transfer.len();
        self.count -= transfer.len();
        self.collapsed = 0;
        debug_assert!(self.committed <= self.count);

        // Newest-first ordering; redo replays from the front.
        self.future.splice(0..0, transfer.iter().cloned());
        trace!(target: "state.log", retracted = transfer.len(), future = self.future.len(), "undo");

        transfer.iter().map(|r| r.invert()).collect()
    }

    /// Replay retracted records until `quantity` checkpoints have been
    /// traversed or the future is exhausted. Returns the records in
    /// application order.
    pub fn redo(&mut self, quantity: usize) -> Vec<Record> {
        let mut quantity = quantity;
        if matches!(self.future.first(), Some(Record::Checkpoint { .. })) {
            quantity += 1;
        }

        let mut transfer: Vec<Record> = Vec::new();
        for r in &self.future {
            if matches!(r, Record::Checkpoint { .. }) {
                quantity -= 1;
                if quantity == 0 {
                    break;
                }
            }
            transfer.push(r.clone());
        }
        transfer.reverse();

        let xfer = transfer.len();
        self.committed += xfer;
        self.count += xfer;
        self.collapsed = 0;
        self.records.extend(transfer.iter().cloned());
        self.future.drain(..xfer);
        debug_assert!(self.committed <= self.count);
        trace!(target: "state.log", replayed = xfer, future = self.future.len(), "redo");

        transfer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Segments;

    fn update(e: usize, i: &str, d: &str, p: usize) -> Record {
        Record::Update {
            element: e,
            insertion: i.to_string(),
            deletion: d.to_string(),
            position: p,
        }
    }

    fn store(lines: &[&str]) -> Segments<Line> {
        Segments::from_iter(lines.iter().map(|s| Line::new(*s, 0)))
    }

    fn contents(s: &Segments<Line>) -> Vec<String> {
        s.iter().map(|l| l.content.clone()).collect()
    }

    #[test]
    fn update_apply_retract() {
        let mut e = store(&["hello world"]);
        let r = update(0, "big ", "", 6);
        r.apply(&mut e);
        assert_eq!(contents(&e), vec!["hello big world"]);
        r.retract(&mut e);
        assert_eq!(contents(&e), vec!["hello world"]);
    }

    #[test]
    fn lines_apply_changes_length() {
        let mut e = store(&["a", "b"]);
        let r = Record::Lines {
            element: 1,
            insertion: vec![Line::new("x", 0), Line::new("y", 0)],
            deletion: vec![],
        };
        assert_eq!(r.change(), 2);
        r.apply(&mut e);
        assert_eq!(contents(&e), vec!["a", "x", "y", "b"]);
        r.retract(&mut e);
        assert_eq!(contents(&e), vec!["a", "b"]);
    }

    #[test]
    fn invert_round_trips() {
        let mut e = store(&["abcdef"]);
        let r = update(0, "XY", "cd", 2);
        r.apply(&mut e);
        assert_eq!(contents(&e), vec!["abXYef"]);
        r.invert().apply(&mut e);
        assert_eq!(contents(&e), vec!["abcdef"]);
    }

    #[test]
    fn combine_contiguous_insertions() {
        let a = update(0, "h", "", 4);
        let b = update(0, "i", "", 5);
        let merged = a.combine(&b).expect("contiguous insertions merge");
        assert_eq!(merged, update(0, "hi", "", 4));
    }

    #[test]
    fn combine_rejects_discontiguous() {
        let a = update(0, "h", "", 4);
        let b = update(0, "i", "", 9);
        assert!(a.combine(&b).is_none());
        let c = update(1, "i", "", 5);
        assert!(a.combine(&c).is_none());
    }

    #[test]
    fn combine_deletion_into_insertion() {
        let a = update(0, "hello", "", 4);
        let b = update(0, "", "ll", 6);
        let merged = a.combine(&b).expect("contained deletion collapses");
        assert_eq!(merged, update(0, "heo", "", 4));
    }

    #[test]
    fn combine_forward_deletes() {
        let a = update(0, "", "a", 3);
        let b = update(0, "", "b", 3);
        let merged = a.combine(&b).expect("forward deletes merge");
        assert_eq!(merged, update(0, "", "ab", 3));
    }

    #[test]
    fn combine_backward_deletes() {
        let a = update(0, "", "b", 3);
        let b = update(0, "", "a", 2);
        let merged = a.combine(&b).expect("backward deletes merge");
        assert_eq!(merged, update(0, "", "ab", 2));
    }

    #[test]
    fn combine_checkpoints_takes_earlier() {
        let a = Record::Checkpoint { when: 3 };
        let b = Record::Checkpoint { when: 7 };
        assert_eq!(a.combine(&b), Some(Record::Checkpoint { when: 3 }));
    }

    #[test]
    fn collapse_typing_run() {
        // Scenario: two single-character insertions collapse into one
        // record whose retraction restores the empty line.
        let mut log = Log::new();
        let mut e = store(&["previous"]);

        log.write(update(0, "h", "", 4));
        log.apply(&mut e);
        log.commit();
        log.write(update(0, "i", "", 5));
        log.apply(&mut e);
        log.collapse();
        log.commit();

        assert_eq!(log.count(), 1);
        assert_eq!(log.records()[0], update(0, "hi", "", 4));
        assert_eq!(contents(&e), vec!["prevhiious"]);
    }

    #[test]
    fn checkpoint_dedupes() {
        let mut log = Log::new();
        log.write(update(0, "x", "", 0));
        log.commit();
        log.checkpoint();
        let n = log.count();
        log.checkpoint();
        assert_eq!(log.count(), n);
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut log = Log::new();
        let mut e = store(&[""]);

        log.write(update(0, "hello", "", 0));
        log.apply(&mut e);
        log.commit();
        log.checkpoint();
        assert_eq!(contents(&e), vec!["hello"]);

        for r in log.undo(1) {
            r.apply(&mut e);
        }
        assert_eq!(contents(&e), vec![""]);

        for r in log.redo(1) {
            r.apply(&mut e);
        }
        assert_eq!(contents(&e), vec!["hello"]);
    }

    #[test]
    fn since_replays_to_current() {
        let mut log = Log::new();
        let mut e = store(&["ab"]);
        let mut copy = e.clone();
        let s0 = log.snapshot();

        log.write(update(0, "X", "", 1));
        log.apply(&mut e);
        log.commit();
        log.write(Record::Lines {
            element: 1,
            insertion: vec![Line::new("new", 0)],
            deletion: vec![],
        });
        log.apply(&mut e);
        log.commit();

        for r in log.since(s0) {
            r.apply(&mut copy);
        }
        assert_eq!(contents(&copy), contents(&e));
    }

    #[test]
    fn since_after_undo_inverts_future() {
        let mut log = Log::new();
        let mut e = store(&[""]);

        log.write(update(0, "one", "", 0));
        log.apply(&mut e);
        log.commit();
        log.checkpoint();

        // Snapshot before the undo, aligned with the applied state.
        let s0 = log.snapshot();
        let mut copy = e.clone();

        for r in log.undo(1) {
            r.apply(&mut e);
        }
        assert_eq!(contents(&e), vec![""]);

        for r in log.since(s0) {
            r.apply(&mut copy);
        }
        assert_eq!(contents(&copy), contents(&e));
    }

    #[test]
    fn snapshot_restored_by_undo_pair() {
        let mut log = Log::new();
        let mut e = store(&[""]);
        log.write(update(0, "x", "", 0));
        log.apply(&mut e);
        log.commit();
        log.checkpoint();
        let before = log.snapshot();

        for r in log.undo(1) {
            r.apply(&mut e);
        }
        for r in log.redo(1) {
            r.apply(&mut e);
        }
        assert_eq!(contents(&e), vec!["x"]);
        let after = log.snapshot();
        assert_eq!(before.committed, after.committed);
        assert_eq!(before.future, after.future);
    }
}
