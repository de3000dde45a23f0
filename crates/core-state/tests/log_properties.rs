//! Property tests for the delta log, segmented sequence, and position
//! arithmetic.

use core_state::{Line, Log, Position, Record, Segments, Sequence};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    InsertLines { at: usize, texts: Vec<String> },
    DeleteLines { at: usize, count: usize },
    Splice { line: usize, at: usize, text: String, remove: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..50, prop::collection::vec("[a-z]{0,6}", 1..4)).prop_map(|(at, texts)| {
            Op::InsertLines {
                at,
                texts: texts.into_iter().collect(),
            }
        }),
        (0usize..50, 1usize..4).prop_map(|(at, count)| Op::DeleteLines { at, count }),
        (0usize..50, 0usize..10, "[a-z]{0,5}", 0usize..4).prop_map(|(line, at, text, remove)| {
            Op::Splice {
                line,
                at,
                text,
                remove,
            }
        }),
    ]
}

fn store(lines: &[&str]) -> Segments<Line> {
    Segments::from_iter(lines.iter().map(|s| Line::new(*s, 0)))
}

fn contents(s: &Segments<Line>) -> Vec<String> {
    s.iter().map(|l| l.content.clone()).collect()
}

/// Interpret an abstract op against the current store, producing a record
/// with coherent offsets, or none when the op is inapplicable.
fn realize(op: &Op, store: &Segments<Line>) -> Option<Record> {
    match op {
        Op::InsertLines { at, texts } => {
            let at = at % (store.len() + 1);
            Some(Record::Lines {
                element: at,
                insertion: texts.iter().map(|t| Line::new(t.as_str(), 0)).collect(),
                deletion: vec![],
            })
        }
        Op::DeleteLines { at, count } => {
            if store.len() == 0 {
                return None;
            }
            let at = at % store.len();
            let stop = (at + count).min(store.len());
            Some(Record::Lines {
                element: at,
                insertion: vec![],
                deletion: store.select(at, stop),
            })
        }
        Op::Splice {
            line,
            at,
            text,
            remove,
        } => {
            if store.len() == 0 {
                return None;
            }
            let line = line % store.len();
            let content = &store.get(line)?.content;
            let n = content.chars().count();
            let at = (*at).min(n);
            let stop = (at + remove).min(n);
            let removed: String = content.chars().skip(at).take(stop - at).collect();
            Some(Record::Update {
                element: line,
                insertion: text.clone(),
                deletion: removed,
                position: at,
            })
        }
    }
}

proptest! {
    /// Replaying `since(s0)` against a pre-edit copy reproduces the
    /// current store.
    #[test]
    fn since_replay_reaches_current(ops in prop::collection::vec(op_strategy(), 1..20)) {
        let mut log = Log::new();
        let mut elements = store(&["seed", "lines"]);
        let s0 = log.snapshot();
        let copy = elements.clone();

        for op in &ops {
            if let Some(r) = realize(op, &elements) {
                log.write(r);
                log.apply(&mut elements);
                log.commit();
            }
        }

        let mut replay = copy;
        for r in log.since(s0) {
            r.apply(&mut replay);
        }
        prop_assert_eq!(contents(&replay), contents(&elements));
    }

    /// `undo(1)` then `redo(1)` returns the store to the call-site state.
    #[test]
    fn undo_redo_round_trip(ops in prop::collection::vec(op_strategy(), 1..16)) {
        let mut log = Log::new();
        let mut elements = store(&["alpha"]);

        for (i, op) in ops.iter().enumerate() {
            if let Some(r) = realize(op, &elements) {
                log.write(r);
                log.apply(&mut elements);
                log.commit();
                if i % 3 == 0 {
                    log.checkpoint();
                }
            }
        }

        let before = contents(&elements);
        for r in log.undo(1) {
            r.apply(&mut elements);
        }
        for r in log.redo(1) {
            r.apply(&mut elements);
        }
        prop_assert_eq!(contents(&elements), before);
    }

    /// `apply` changes the store length by `change()` and `retract`
    /// inverts exactly.
    #[test]
    fn apply_retract_inverse(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let mut elements = store(&["one", "two", "three"]);

        for op in &ops {
            if let Some(r) = realize(op, &elements) {
                let before = contents(&elements);
                let len0 = elements.len() as isize;
                r.apply(&mut elements);
                prop_assert_eq!(elements.len() as isize, len0 + r.change());
                r.retract(&mut elements);
                prop_assert_eq!(contents(&elements), before);
                r.apply(&mut elements);
            }
        }
    }

    /// `combine` is associative over a run of mergeable typing updates.
    #[test]
    fn combine_associative_typing(texts in prop::collection::vec("[a-z]{1,3}", 3)) {
        let mut pos = 0usize;
        let mut records = Vec::new();
        for t in &texts {
            records.push(Record::Update {
                element: 0,
                insertion: t.clone(),
                deletion: String::new(),
                position: pos,
            });
            pos += t.chars().count();
        }

        let left = records[0]
            .combine(&records[1])
            .and_then(|ab| ab.combine(&records[2]));
        let right = records[1]
            .combine(&records[2])
            .and_then(|bc| records[0].combine(&bc));
        prop_assert_eq!(left.clone(), right);
        prop_assert!(left.is_some());
    }

    /// Position arithmetic preserves the absolute offset under edits that
    /// do not remove the indexed unit; removed positions snap to the
    /// edit's end.
    #[test]
    fn position_changed_preserves_absolute(
        datum in 0isize..100,
        offset in 0isize..50,
        magnitude in 0isize..50,
        at in 0isize..200,
        k in 1isize..20,
        insertion in prop::bool::ANY,
    ) {
        let mut p = Position::new();
        p.configure(datum, magnitude, offset);
        let absolute = p.get();

        if insertion {
            p.changed(at, k);
            if at <= absolute {
                prop_assert_eq!(p.get(), absolute + k);
            } else {
                prop_assert_eq!(p.get(), absolute);
            }
        } else {
            p.changed(at, -k);
            if at + k <= absolute {
                prop_assert_eq!(p.get(), absolute - k);
            } else if at > absolute {
                prop_assert_eq!(p.get(), absolute);
            } else {
                // The indexed unit was removed; snap to the edit start.
                prop_assert_eq!(p.get(), at);
            }
        }
    }

    /// Flattened segmented-sequence state matches a plain vector applying
    /// the same operations.
    #[test]
    fn segments_match_vec_model(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let mut seg: Segments<String> = Segments::from_iter((0..100).map(|i| i.to_string()));
        let mut model: Vec<String> = (0..100).map(|i| i.to_string()).collect();

        for op in &ops {
            match op {
                Op::InsertLines { at, texts } => {
                    let at = at % (model.len() + 1);
                    seg.insert(at, texts.clone());
                    model.splice(at..at, texts.iter().cloned());
                }
                Op::DeleteLines { at, count } => {
                    if model.is_empty() {
                        continue;
                    }
                    let at = at % model.len();
                    let stop = (at + count).min(model.len());
                    seg.delete(at, stop);
                    model.drain(at..stop);
                }
                Op::Splice { line, text, .. } => {
                    if model.is_empty() {
                        continue;
                    }
                    let line = line % model.len();
                    seg.set(line, text.clone());
                    model[line] = text.clone();
                }
            }
            prop_assert_eq!(seg.len(), model.len());
        }
        let flat: Vec<String> = seg.iter().cloned().collect();
        prop_assert_eq!(flat, model);
    }

    /// Edits folded into an already-committed record by `collapse` remain
    /// visible to observers that sampled before the fold: `since` re-emits
    /// the combined record.
    #[test]
    fn since_with_collapse(extra in "[a-z]{1,4}") {
        let mut log = Log::new();
        let mut elements = store(&[""]);

        log.write(Record::Update {
            element: 0,
            insertion: "base".into(),
            deletion: String::new(),
            position: 0,
        });
        log.apply(&mut elements);
        log.commit();

        // Observer samples here.
        let s0 = log.snapshot();

        log.write(Record::Update {
            element: 0,
            insertion: extra.clone(),
            deletion: String::new(),
            position: 4,
        });
        log.apply(&mut elements);
        log.collapse();
        log.commit();

        let replay = log.since(s0);
        prop_assert!(
            replay.iter().any(|r| matches!(
                r,
                Record::Update { insertion, .. } if insertion.contains(extra.as_str())
            )),
            "combined record must be re-emitted for earlier samplers"
        );
    }
}
