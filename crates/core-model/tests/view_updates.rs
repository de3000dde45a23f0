//! Incremental view update scenarios.

use std::sync::Arc;

use core_model::refraction::{Instruction, LineSource, Refraction};
use core_model::Area;
use core_state::{Line, Record, ResourceId, Segments, Sequence, Storage};
use core_syntax::Reformulations;

fn store_of(n: usize) -> Storage {
    Storage::Segmented(Segments::from_iter(
        (0..n).map(|i| Line::new(format!("line {i}"), 0)),
    ))
}

fn refraction(lines: usize, span: usize) -> Refraction {
    let mut rf = Refraction::new(ResourceId(0), Arc::new(Reformulations::default()));
    rf.configure(Area::new(0, 0, lines, span));
    rf.frame_visible = true;
    rf
}

fn image_texts(rf: &Refraction) -> Vec<String> {
    rf.image.phrases().iter().map(|p| p.text()).collect()
}

fn apply(store: &mut Storage, r: &Record) {
    r.apply(store);
}

#[test]
fn last_page_deletion_keeps_tail_alignment() {
    // A ten-line view over thirty lines, anchored at the last page.
    let mut store = store_of(30);
    let mut rf = refraction(10, 40);
    rf.refresh(20, &store);
    assert_eq!(rf.image.line_offset, 20);

    // Delete lines [5, 10).
    let record = Record::Lines {
        element: 5,
        insertion: vec![],
        deletion: store.select(5, 10),
    };
    apply(&mut store, &record);
    assert_eq!(store.ln_count(), 25);

    rf.v_update(&record, &store);

    assert_eq!(rf.image.line_offset, 15);
    let texts = image_texts(&rf);
    assert_eq!(texts.len(), 10);
    // The image still covers lines [15, 25) of the shrunken store.
    for (row, text) in texts.iter().enumerate() {
        let line = store.line(15 + row).unwrap();
        assert_eq!(text, &line.content, "row {row}");
    }
}

#[test]
fn update_record_redraws_single_line() {
    let mut store = store_of(20);
    let mut rf = refraction(10, 40);
    rf.refresh(5, &store);

    let record = Record::Update {
        element: 8,
        insertion: "X".to_string(),
        deletion: String::new(),
        position: 0,
    };
    apply(&mut store, &record);
    let out = rf.v_update(&record, &store);

    // One rewrite covering exactly the affected row.
    assert_eq!(out.len(), 1);
    match &out[0] {
        Instruction::Rewrite { area, .. } => {
            assert_eq!(area.lines, 1);
            assert_eq!(area.top_offset, 8 - 5);
        }
        other => panic!("expected rewrite, got {other:?}"),
    }
    assert_eq!(image_texts(&rf)[3], store.line(8).unwrap().content);
}

#[test]
fn insertion_before_window_adjusts_offset_only() {
    let mut store = store_of(30);
    let mut rf = refraction(5, 40);
    rf.refresh(10, &store);
    let before = image_texts(&rf);

    let record = Record::Lines {
        element: 2,
        insertion: vec![Line::new("new a", 0), Line::new("new b", 0)],
        deletion: vec![],
    };
    apply(&mut store, &record);
    let out = rf.v_update(&record, &store);

    assert!(out.is_empty(), "no display change expected");
    assert_eq!(rf.image.line_offset, 12);
    assert_eq!(image_texts(&rf), before);
}

#[test]
fn in_window_insertion_emits_copy_and_render() {
    let mut store = store_of(30);
    let mut rf = refraction(10, 40);
    rf.refresh(0, &store);

    let record = Record::Lines {
        element: 3,
        insertion: vec![Line::new("inserted", 0)],
        deletion: vec![],
    };
    apply(&mut store, &record);
    let out = rf.v_update(&record, &store);

    assert!(
        out.iter()
            .any(|i| matches!(i, Instruction::Copy { src, dst } if dst.top_offset > src.top_offset)),
        "insertion moves rows downward"
    );
    assert_eq!(image_texts(&rf)[3], "inserted");
    assert_eq!(rf.image.count(), 10, "image stays trimmed to the view");
}

#[test]
fn in_window_deletion_emits_upward_copy() {
    let mut store = store_of(30);
    let mut rf = refraction(10, 40);
    rf.refresh(0, &store);

    let record = Record::Lines {
        element: 2,
        insertion: vec![],
        deletion: store.select(2, 4),
    };
    apply(&mut store, &record);
    let out = rf.v_update(&record, &store);

    assert!(
        out.iter()
            .any(|i| matches!(i, Instruction::Copy { src, dst } if dst.top_offset < src.top_offset)),
        "deletion moves rows upward"
    );
    // The vacated tail is refilled from the source.
    let texts = image_texts(&rf);
    assert_eq!(texts[2], store.line(2).unwrap().content);
    assert_eq!(texts.len(), 10);
}

#[test]
fn replacement_record_redraws_in_place() {
    let mut store = store_of(10);
    let mut rf = refraction(5, 40);
    rf.refresh(0, &store);

    let record = Record::Lines {
        element: 1,
        insertion: vec![Line::new("replaced", 2)],
        deletion: store.select(1, 2),
    };
    apply(&mut store, &record);
    let out = rf.v_update(&record, &store);

    assert_eq!(rf.image.line_offset, 0);
    assert!(matches!(out[0], Instruction::Rewrite { .. }));
    assert!(image_texts(&rf)[1].contains("replaced"));
}

#[test]
fn last_page_deletion_underflow_forces_refresh() {
    // Deleting more than the offset on the last page clamps to the first
    // page and rebuilds the image.
    let mut store = store_of(12);
    let mut rf = refraction(10, 40);
    rf.refresh(2, &store);

    let record = Record::Lines {
        element: 0,
        insertion: vec![],
        deletion: store.select(0, 5),
    };
    apply(&mut store, &record);
    rf.v_update(&record, &store);

    assert_eq!(rf.image.line_offset, 0);
    let texts = image_texts(&rf);
    assert_eq!(texts[0], store.line(0).unwrap().content);
}

#[test]
fn incremental_updates_match_refresh_fixed_point() {
    // Applying v_update for each record then refreshing equals a refresh
    // alone: the incremental path is idempotent with respect to the full
    // redraw.
    let mut store = store_of(40);
    let mut incremental = refraction(10, 40);
    incremental.refresh(12, &store);

    let records = vec![
        Record::Lines {
            element: 14,
            insertion: vec![Line::new("mid insert", 0)],
            deletion: vec![],
        },
        Record::Update {
            element: 16,
            insertion: "!!".to_string(),
            deletion: String::new(),
            position: 2,
        },
        Record::Lines {
            element: 3,
            insertion: vec![],
            deletion: store.select(3, 5),
        },
    ];

    for r in &records {
        apply(&mut store, r);
        incremental.v_update(r, &store);
    }
    incremental.compensate();

    let mut fresh = refraction(10, 40);
    fresh.refresh(incremental.image.line_offset, &store);

    assert_eq!(image_texts(&incremental), image_texts(&fresh));
    assert_eq!(incremental.image.line_offset, fresh.image.line_offset);
}

#[test]
fn scroll_emits_copy_for_small_motion() {
    let mut rf = refraction(10, 40);
    let store = store_of(30);
    rf.refresh(0, &store);

    let out = rf.scroll(3, &store);
    assert_eq!(rf.image.line_offset, 3);
    match &out[0] {
        Instruction::Copy { src, dst } => {
            assert_eq!(src, &Area::new(3, 0, 7, 40));
            assert_eq!(dst, &Area::new(0, 0, 7, 40));
        }
        other => panic!("expected copy, got {other:?}"),
    }
    assert_eq!(image_texts(&rf)[0], store.line(3).unwrap().content);
}

#[test]
fn scroll_large_motion_refreshes() {
    let mut rf = refraction(10, 40);
    let store = store_of(60);
    rf.refresh(0, &store);

    let out = rf.scroll(40, &store);
    assert_eq!(rf.image.line_offset, 40);
    assert!(matches!(out[0], Instruction::Rewrite { .. }));
    assert_eq!(image_texts(&rf)[0], store.line(40).unwrap().content);
}

#[test]
fn recursor_margin_scrolling() {
    let store = store_of(100);
    let mut rf = refraction(10, 40);
    rf.limits = (2, 2);
    rf.refresh(0, &store);

    // Move the cursor near the bottom edge: forward margin scroll.
    rf.seek(9, 0);
    rf.recursor(&store);
    assert!(rf.image.line_offset > 0, "margin scroll engaged");

    // A far jump centers the cursor.
    rf.seek(60, 0);
    rf.recursor(&store);
    let off = rf.image.line_offset;
    assert!(off <= 60 && 60 < off + 10, "cursor inside view after jump");
    assert!((55..=56).contains(&off), "jump centers: got {off}");
}

#[test]
fn recursor_constrains_cursor_to_store() {
    let store = store_of(5);
    let mut rf = refraction(10, 40);
    rf.refresh(0, &store);

    rf.seek(100, 50);
    rf.recursor(&store);
    let (lo, co) = rf.coordinates();
    assert_eq!(lo, 4);
    assert_eq!(co, store.line(4).unwrap().ln_length());
}

mod alignment_properties {
    use core_model::alignment;
    use proptest::prelude::*;

    proptest! {
        /// The view position after a deletion stays within the old
        /// store's scrollable range.
        #[test]
        fn delete_position_stays_in_range(
            total in 1usize..200,
            visible in 1usize..40,
            position in 0usize..200,
            offset in 0usize..200,
            quantity in 1usize..40,
        ) {
            let quantity = quantity.min(total);
            let position = position.min(total.saturating_sub(1));
            let offset = offset.min(total - quantity);

            let p = alignment::delete(total, visible, position, offset, quantity);
            prop_assert!(p <= total.saturating_sub(visible));
        }

        /// Insertion never moves a scrollable view backwards.
        #[test]
        fn insert_position_monotonic(
            total in 0usize..200,
            visible in 1usize..40,
            position in 0usize..200,
            offset in 0usize..200,
            quantity in 1usize..40,
        ) {
            let position = position.min(total);
            let p = alignment::insert(total, visible, position, offset, quantity);
            prop_assert!(p >= position.min(total.saturating_sub(visible)));
        }

        /// Constrained scrolls land inside the scrollable range and the
        /// vacant region never exceeds the visible span.
        #[test]
        fn scroll_constrained(
            total in 1usize..200,
            visible in 1usize..40,
            position in 0usize..200,
            quantity in -60isize..60,
        ) {
            let position = position.min(total.saturating_sub(1));
            let (start, change, (v0, v1)) = alignment::scroll(total, visible, position, quantity);
            prop_assert!(start <= total.saturating_sub(visible).max(position));
            if quantity <= 0 {
                prop_assert_eq!(start as isize, position as isize + change);
            }
            prop_assert!(v1 >= v0);
            prop_assert!(v1 - v0 <= visible);
        }
    }
}
