// SPDX-License-Identifier: MIT OR Apache-2.0
//! Step ordering: dense reindexing, insertion and batch moves.
//!
//! Every operation keeps the batches of one track in their original relative
//! order. The functions work on `Vec<Step>` values and never touch objects;
//! callers persist the resulting global indexes.

use crate::batch::{locate_batch, BatchId, FrameBatch, Step};
use crate::frame::CueFrame;
use serde::{Deserialize, Serialize};

/// Where a moved batch should land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveTarget {
    /// Join the existing step at this index
    At(usize),
    /// Open a new step right after this index
    After(usize),
    /// Open a new first step
    Front,
}

/// Drop empty steps and renumber the rest to `0..N`
pub fn reindex_dense(steps: &mut Vec<Step>) {
    steps.retain(|step| !step.is_empty());
    for (index, step) in steps.iter_mut().enumerate() {
        for batch in step.iter_mut() {
            batch.cue.global_index = index;
        }
    }
}

/// Insert `batch` as a new step at `index` (appended when past the end)
pub fn insert_at(steps: &mut Vec<Step>, batch: FrameBatch, index: usize) {
    let index = index.min(steps.len());
    steps.insert(index, vec![batch]);
    reindex_dense(steps);
}

/// Insert `batch` as a new step right after the step at `after`
pub fn insert_after(steps: &mut Vec<Step>, batch: FrameBatch, after: usize) {
    insert_at(steps, batch, after.saturating_add(1));
}

/// Global index one past the largest cue index, 0 when there is none
pub fn next_global_index<'a>(cues: impl IntoIterator<Item = &'a CueFrame>) -> usize {
    cues.into_iter()
        .map(|cue| cue.global_index + 1)
        .max()
        .unwrap_or(0)
}

/// Move a batch and return the reordered steps.
///
/// Same-track batches the move would jump over are split into their own
/// steps around the moved batch. Returns `None` when the batch is unknown or
/// an `At` target does not exist.
pub fn move_batch(steps: &[Step], batch_id: &BatchId, target: MoveTarget) -> Option<Vec<Step>> {
    let (from_step, from_position) = locate_batch(steps, batch_id)?;
    if let MoveTarget::At(index) = target {
        if index >= steps.len() {
            return None;
        }
    }

    let mut result: Vec<Step> = steps.to_vec();
    let moved = result[from_step].remove(from_position);

    // Track order as it was before the move.
    let track_order: Vec<BatchId> = steps
        .iter()
        .flatten()
        .filter(|batch| batch.track_id() == moved.track_id())
        .map(|batch| batch.id.clone())
        .collect();
    let rank = track_order.iter().position(|id| id == batch_id)?;
    let earlier = &track_order[..rank];
    let later = &track_order[rank + 1..];

    // Emptied steps stay in place until the final reindex so indexes hold.
    let mut landing = match target {
        MoveTarget::At(index) => {
            result[index].push(moved);
            index
        }
        MoveTarget::After(index) => {
            let index = index.saturating_add(1).min(result.len());
            result.insert(index, vec![moved]);
            index
        }
        MoveTarget::Front => {
            result.insert(0, vec![moved]);
            0
        }
    };

    for id in earlier {
        let Some((step, position)) = locate_batch(&result, id) else {
            continue;
        };
        if step >= landing {
            let batch = result[step].remove(position);
            result.insert(landing, vec![batch]);
            landing += 1;
        }
    }

    let mut after_landing = landing + 1;
    for id in later {
        let Some((step, position)) = locate_batch(&result, id) else {
            continue;
        };
        if step <= landing {
            let batch = result[step].remove(position);
            result.insert(after_landing, vec![batch]);
            after_landing += 1;
        }
    }

    reindex_dense(&mut result);
    tracing::debug!(batch = %batch_id, ?target, steps = result.len(), "moved batch");
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::derive_steps;
    use crate::batch::tests::{batch_ids, cue};
    use crate::frame::FrameAction;

    fn single(id: &str, track: &str, global_index: usize) -> FrameBatch {
        FrameBatch::new(CueFrame {
            id: id.into(),
            track_id: track.into(),
            global_index,
            action: FrameAction::shape_animation(),
        })
    }

    fn ids(list: &[&[&str]]) -> Vec<Vec<String>> {
        list.iter()
            .map(|step| {
                let mut ids: Vec<String> = step.iter().map(|s| s.to_string()).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    fn assert_dense(steps: &[Step]) {
        for (index, step) in steps.iter().enumerate() {
            assert!(!step.is_empty());
            for batch in step {
                assert_eq!(batch.global_index(), index);
            }
        }
    }

    fn batch(id: &str) -> BatchId {
        BatchId::for_cue(&id.into())
    }

    /// `c1 | s1 | c2` with `c*` on the camera track and `s1` on a shape track.
    fn independent_steps() -> Vec<Step> {
        derive_steps(&[cue("c1", "camera", 0), cue("s1", "shape", 1), cue("c2", "camera", 2)])
    }

    /// `S0 | C0 | C1 S1 | C2 | S2` with two tracks.
    fn interleaved_steps() -> Vec<Step> {
        derive_steps(&[
            cue("S0", "shape", 0),
            cue("C0", "camera", 1),
            cue("C1", "camera", 2),
            cue("S1", "shape", 2),
            cue("C2", "camera", 3),
            cue("S2", "shape", 4),
        ])
    }

    #[test]
    fn test_reindex_dense_closes_gaps() {
        let mut steps = derive_steps(&[cue("a", "t1", 0), cue("b", "t2", 4), cue("c", "t3", 9)]);
        reindex_dense(&mut steps);
        assert_dense(&steps);
        assert_eq!(batch_ids(&steps), ids(&[&["a"], &["b"], &["c"]]));

        let before = steps.clone();
        reindex_dense(&mut steps);
        assert_eq!(steps, before);
    }

    #[test]
    fn test_reindex_dense_drops_empty_steps() {
        let mut steps = vec![vec![single("a", "t", 0)], Vec::new(), vec![single("b", "t", 2)]];
        reindex_dense(&mut steps);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1][0].global_index(), 1);
    }

    #[test]
    fn test_insert_after_shifts_later_steps() {
        let mut steps = derive_steps(&[cue("a", "t", 0), cue("b", "t", 1), cue("x", "u", 1)]);
        insert_after(&mut steps, single("n", "t", 99), 0);

        assert_dense(&steps);
        assert_eq!(batch_ids(&steps), ids(&[&["a"], &["n"], &["b", "x"]]));
    }

    #[test]
    fn test_insert_after_past_end_appends() {
        let mut steps = derive_steps(&[cue("a", "t", 0)]);
        insert_after(&mut steps, single("n", "t", 0), 7);
        assert_eq!(batch_ids(&steps), ids(&[&["a"], &["n"]]));
    }

    #[test]
    fn test_next_global_index() {
        let steps = derive_steps(&[cue("a", "t", 0), cue("b", "u", 5)]);
        let cues = steps.iter().flatten().map(|b| &b.cue);
        assert_eq!(next_global_index(cues), 6);
        assert_eq!(next_global_index(std::iter::empty()), 0);
    }

    #[test]
    fn test_move_into_earlier_step() {
        let moved = move_batch(&independent_steps(), &batch("s1"), MoveTarget::At(0)).unwrap();
        assert_dense(&moved);
        assert_eq!(batch_ids(&moved), ids(&[&["c1", "s1"], &["c2"]]));
    }

    #[test]
    fn test_move_into_later_step() {
        let moved = move_batch(&independent_steps(), &batch("s1"), MoveTarget::At(2)).unwrap();
        assert_dense(&moved);
        assert_eq!(batch_ids(&moved), ids(&[&["c1"], &["c2", "s1"]]));
    }

    #[test]
    fn test_move_earlier_pulls_same_track_predecessor_out() {
        let moved = move_batch(&interleaved_steps(), &batch("S2"), MoveTarget::At(2)).unwrap();
        assert_dense(&moved);
        assert_eq!(
            batch_ids(&moved),
            ids(&[&["S0"], &["C0"], &["S1"], &["C1", "S2"], &["C2"]])
        );
    }

    #[test]
    fn test_move_later_pushes_same_track_successor_out() {
        let moved = move_batch(&interleaved_steps(), &batch("S0"), MoveTarget::At(2)).unwrap();
        assert_dense(&moved);
        assert_eq!(
            batch_ids(&moved),
            ids(&[&["C0"], &["C1", "S0"], &["S1"], &["C2"], &["S2"]])
        );
    }

    #[test]
    fn test_move_after_creates_new_step() {
        let moved = move_batch(&independent_steps(), &batch("c2"), MoveTarget::After(0)).unwrap();
        assert_eq!(batch_ids(&moved), ids(&[&["c1"], &["c2"], &["s1"]]));
    }

    #[test]
    fn test_move_to_front_keeps_track_order() {
        let moved = move_batch(&interleaved_steps(), &batch("C2"), MoveTarget::Front).unwrap();
        assert_dense(&moved);
        assert_eq!(
            batch_ids(&moved),
            ids(&[&["C0"], &["C1"], &["C2"], &["S0"], &["S1"], &["S2"]])
        );
    }

    #[test]
    fn test_move_preserves_every_track_order() {
        let steps = interleaved_steps();
        for id in ["S0", "S1", "S2", "C0", "C1", "C2"] {
            for index in 0..steps.len() {
                for target in [MoveTarget::At(index), MoveTarget::After(index)] {
                    let moved = move_batch(&steps, &batch(id), target).unwrap();
                    assert_dense(&moved);
                    for track in ["shape", "camera"] {
                        let order: Vec<String> = moved
                            .iter()
                            .flatten()
                            .filter(|b| b.track_id().as_str() == track)
                            .map(|b| b.cue.id.0.clone())
                            .collect();
                        let mut sorted = order.clone();
                        sorted.sort();
                        assert_eq!(order, sorted, "{id} {target:?} broke {track}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_move_unknown_batch_or_target() {
        let steps = independent_steps();
        assert!(move_batch(&steps, &batch("nope"), MoveTarget::At(0)).is_none());
        assert!(move_batch(&steps, &batch("s1"), MoveTarget::At(3)).is_none());
    }
}
