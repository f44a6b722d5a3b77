// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame model and step ordering for cueframe presentations.
//!
//! Canvas objects carry optional frame annotations. This crate turns those
//! scattered annotations into an ordered list of steps and decides which
//! objects are visible at a given step:
//! - Cue and sub frames with their playback actions
//! - Batch reconstruction and step derivation
//! - Dense reindexing, insertion and batch moves that keep track order
//! - Chain repair after deletions
//! - Per-track visibility rules
//!
//! Nothing here talks to a host or waits on timers; see `cueframe_player`
//! for playback.

pub mod batch;
pub mod document;
pub mod easing;
pub mod error;
pub mod frame;
pub mod object;
pub mod ordering;
pub mod reconcile;
pub mod visibility;

pub use batch::{
    derive_steps, frame_batches, frames_from_batches, locate_batch, steps_from_batches, BatchId,
    FrameBatch, Step, StepCache,
};
pub use document::CanvasDocument;
pub use easing::Easing;
pub use error::{Result, SequencerError};
pub use frame::{CueFrame, Frame, FrameAction, FrameId, SubFrame, TrackId, FRAME_META_KEY};
pub use object::{Bounds, CanvasObject, ObjectId, Pose, HIDDEN_DURING_ANIMATION_KEY};
pub use ordering::{insert_after, insert_at, move_batch, next_global_index, reindex_dense, MoveTarget};
pub use reconcile::{reconcile_deletion, relink_successors};
pub use visibility::{shape_visibilities, shape_visibility, ShapeVisibility, VisibilityRules};
