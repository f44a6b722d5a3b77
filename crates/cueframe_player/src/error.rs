// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player errors.

use cueframe_sequencer::{BatchId, FrameId, ObjectId};
use thiserror::Error;

/// Reasons a batch stops during playback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// No object owns the frame
    #[error("No object found for frame {0}")]
    MissingObject(FrameId),

    /// The host could not resolve the page pose of an object
    #[error("Page pose not found for object {0}")]
    MissingPose(ObjectId),

    /// The host could not resolve the page bounds of an object
    #[error("Page bounds not found for object {0}")]
    MissingBounds(ObjectId),

    /// A newer navigation took over
    #[error("Superseded by a newer navigation")]
    Superseded,

    /// The step task panicked or was aborted
    #[error("Step task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised by annotation edits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    /// The object does not exist on the page
    #[error("Object not found: {0}")]
    MissingObject(ObjectId),

    /// No object owns the frame
    #[error("Frame not found: {0}")]
    MissingFrame(FrameId),

    /// The object already carries a frame
    #[error("Object {0} already has a frame")]
    AlreadyAnnotated(ObjectId),

    /// The frame is a sub frame where a cue frame is required
    #[error("Frame {0} is not a cue frame")]
    NotACue(FrameId),

    /// The batch is not part of the ordered steps, or the target step does not exist
    #[error("Batch {0} cannot be moved there")]
    InvalidMove(BatchId),
}

/// History errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// The checkpoint was already released or never existed
    #[error("Unknown checkpoint {0}")]
    UnknownCheckpoint(u64),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// The file was written by a newer format
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version stored in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
}
