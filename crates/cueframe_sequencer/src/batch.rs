// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batch reconstruction and step derivation.
//!
//! Frames are stored one per object, so batches are rebuilt on demand: every
//! cue frame starts a batch and the sub frames reachable from it through
//! `prevFrameId` links are appended in chain order.

use crate::frame::{CueFrame, Frame, FrameAction, FrameId, SubFrame, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Identifier of a batch, derived from its cue frame id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    /// Batch id for the batch opened by `cue`
    pub fn for_cue(cue: &FrameId) -> Self {
        Self(format!("batch-{cue}"))
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cue frame followed by its chained sub frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameBatch {
    /// Batch id
    pub id: BatchId,
    /// Head of the batch, carrying track and global index
    pub cue: CueFrame,
    /// Chained frames in playback order
    pub subs: Vec<SubFrame>,
}

impl FrameBatch {
    /// Batch holding only `cue`
    pub fn new(cue: CueFrame) -> Self {
        Self {
            id: BatchId::for_cue(&cue.id),
            cue,
            subs: Vec::new(),
        }
    }

    /// Track of the batch
    pub fn track_id(&self) -> &TrackId {
        &self.cue.track_id
    }

    /// Global index of the batch
    pub fn global_index(&self) -> usize {
        self.cue.global_index
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        1 + self.subs.len()
    }

    /// A batch always holds its cue frame
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Frame ids and actions in playback order
    pub fn chain(&self) -> impl Iterator<Item = (&FrameId, &FrameAction)> + '_ {
        std::iter::once((&self.cue.id, &self.cue.action))
            .chain(self.subs.iter().map(|sub| (&sub.id, &sub.action)))
    }

    /// Frame ids in playback order
    pub fn frame_ids(&self) -> impl Iterator<Item = &FrameId> + '_ {
        self.chain().map(|(id, _)| id)
    }

    /// Id of the last frame
    pub fn last_frame_id(&self) -> &FrameId {
        self.subs.last().map_or(&self.cue.id, |sub| &sub.id)
    }

    /// Whether the batch holds the frame
    pub fn contains(&self, id: &FrameId) -> bool {
        self.frame_ids().any(|frame| frame == id)
    }

    /// Owned copies of every frame
    pub fn frames(&self) -> Vec<Frame> {
        std::iter::once(Frame::Cue(self.cue.clone()))
            .chain(self.subs.iter().cloned().map(Frame::Sub))
            .collect()
    }
}

/// Batches sharing one global index, played together
pub type Step = Vec<FrameBatch>;

/// Rebuild batches from a flat frame list, in cue input order.
///
/// Sub frames pointing to a missing frame are unreachable and dropped. When
/// two sub frames claim the same predecessor, the one with the smallest id
/// continues the chain.
pub fn frame_batches(frames: &[Frame]) -> Vec<FrameBatch> {
    let mut next_by_prev: HashMap<&FrameId, &SubFrame> = HashMap::new();
    for sub in frames.iter().filter_map(Frame::as_sub) {
        match next_by_prev.get(&sub.prev_frame_id).copied() {
            Some(existing) if existing.id <= sub.id => {
                tracing::warn!(
                    frame = %sub.id,
                    prev = %sub.prev_frame_id,
                    kept = %existing.id,
                    "sub frame shares its predecessor, excluded from chain"
                );
            }
            Some(existing) => {
                tracing::warn!(
                    frame = %existing.id,
                    prev = %sub.prev_frame_id,
                    kept = %sub.id,
                    "sub frame shares its predecessor, excluded from chain"
                );
                next_by_prev.insert(&sub.prev_frame_id, sub);
            }
            None => {
                next_by_prev.insert(&sub.prev_frame_id, sub);
            }
        }
    }

    frames
        .iter()
        .filter_map(Frame::as_cue)
        .map(|cue| {
            let mut batch = FrameBatch::new(cue.clone());
            let mut visited: HashSet<&FrameId> = HashSet::from([&cue.id]);
            let mut cursor = &cue.id;
            while let Some(sub) = next_by_prev.get(cursor) {
                if !visited.insert(&sub.id) {
                    tracing::warn!(frame = %sub.id, "cycle in frame chain");
                    break;
                }
                batch.subs.push((*sub).clone());
                cursor = &sub.id;
            }
            batch
        })
        .collect()
}

/// Group batches into steps ordered by global index.
///
/// Batches inside a step are ordered by track then batch id, so the result
/// does not depend on the order of `frames`.
pub fn derive_steps(frames: &[Frame]) -> Vec<Step> {
    steps_from_batches(frame_batches(frames))
}

/// Group already built batches into ordered steps
pub fn steps_from_batches(mut batches: Vec<FrameBatch>) -> Vec<Step> {
    batches.sort_by(|a, b| {
        a.global_index()
            .cmp(&b.global_index())
            .then_with(|| a.track_id().cmp(b.track_id()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut steps: Vec<Step> = Vec::new();
    let mut current: Option<usize> = None;
    for batch in batches {
        if current == Some(batch.global_index()) {
            if let Some(step) = steps.last_mut() {
                step.push(batch);
                continue;
            }
        }
        current = Some(batch.global_index());
        steps.push(vec![batch]);
    }

    tracing::debug!(steps = steps.len(), "derived steps");
    steps
}

/// Flatten batches back into frames, in batch order
pub fn frames_from_batches<'a>(batches: impl IntoIterator<Item = &'a FrameBatch>) -> Vec<Frame> {
    batches.into_iter().flat_map(FrameBatch::frames).collect()
}

/// Find the step and position of a batch
pub fn locate_batch(steps: &[Step], id: &BatchId) -> Option<(usize, usize)> {
    steps.iter().enumerate().find_map(|(step_index, step)| {
        step.iter()
            .position(|batch| &batch.id == id)
            .map(|position| (step_index, position))
    })
}

/// Ordered steps memoized by a revision counter
#[derive(Debug, Default)]
pub struct StepCache {
    revision: Option<u64>,
    steps: Arc<Vec<Step>>,
}

impl StepCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps for `revision`, deriving them from `frames` only when the revision changed
    pub fn get_or_derive(
        &mut self,
        revision: u64,
        frames: impl FnOnce() -> Vec<Frame>,
    ) -> Arc<Vec<Step>> {
        if self.revision != Some(revision) {
            self.steps = Arc::new(derive_steps(&frames()));
            self.revision = Some(revision);
        }
        Arc::clone(&self.steps)
    }

    /// Drop the memoized steps
    pub fn invalidate(&mut self) {
        self.revision = None;
    }
}
