// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chain and ordering repair after frames are removed or inserted.

use crate::batch::derive_steps;
use crate::frame::{Frame, FrameId, SubFrame};
use crate::ordering::reindex_dense;
use std::collections::HashMap;

/// Frames to rewrite after `deleted` disappears from `remaining`.
///
/// Deleting a cue frame renumbers the surviving cue frames densely and
/// returns those whose global index changed. Deleting a sub frame relinks
/// its successors to its own predecessor.
pub fn reconcile_deletion(deleted: &Frame, remaining: &[Frame]) -> Vec<Frame> {
    let survivors: Vec<Frame> = remaining
        .iter()
        .filter(|frame| frame.id() != deleted.id())
        .cloned()
        .collect();

    match deleted {
        Frame::Cue(_) => {
            let before: HashMap<&FrameId, usize> = survivors
                .iter()
                .filter_map(Frame::as_cue)
                .map(|cue| (&cue.id, cue.global_index))
                .collect();

            let mut steps = derive_steps(&survivors);
            reindex_dense(&mut steps);

            let changed: Vec<Frame> = steps
                .into_iter()
                .flatten()
                .filter(|batch| before.get(&batch.cue.id) != Some(&batch.cue.global_index))
                .map(|batch| Frame::Cue(batch.cue))
                .collect();
            tracing::debug!(frame = %deleted.id(), changed = changed.len(), "reindexed after cue deletion");
            changed
        }
        Frame::Sub(sub) => relink_successors(&survivors, &sub.id, &sub.prev_frame_id),
    }
}

/// Sub frames following `old_prev`, rewritten to follow `new_prev`
pub fn relink_successors(frames: &[Frame], old_prev: &FrameId, new_prev: &FrameId) -> Vec<Frame> {
    frames
        .iter()
        .filter_map(Frame::as_sub)
        .filter(|sub| &sub.prev_frame_id == old_prev && &sub.id != new_prev)
        .map(|sub| {
            Frame::Sub(SubFrame {
                prev_frame_id: new_prev.clone(),
                ..sub.clone()
            })
        })
        .collect()
}
