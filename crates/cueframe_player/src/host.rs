// SPDX-License-Identifier: MIT OR Apache-2.0
//! The canvas host seam.
//!
//! The player never owns canvas state. It reads and mutates objects, drives
//! the camera and manages history checkpoints through [`CanvasHost`].

use crate::error::HistoryError;
use cueframe_sequencer::{
    Bounds, CanvasObject, Easing, Frame, FrameId, ObjectId, Pose, HIDDEN_DURING_ANIMATION_KEY,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Whether a mutation lands in the undo history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryMode {
    /// User edit, undoable
    Record,
    /// Transient change, never undoable
    Ignore,
}

/// Marker returned by [`CanvasHost::mark_checkpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checkpoint(pub u64);

/// Timing of a pose animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationOptions {
    /// Animation length
    pub duration: Duration,
    /// Easing curve
    pub easing: Easing,
}

/// Timing and padding of a camera fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomOptions {
    /// Padding around the target bounds
    pub inset: f64,
    /// Animation length
    pub duration: Duration,
    /// Easing curve
    pub easing: Easing,
}

/// A host shared between the presenter, its step tasks and editing code
pub type SharedHost<H> = Arc<Mutex<H>>;

/// Wrap a host for sharing
pub fn share<H: CanvasHost>(host: H) -> SharedHost<H> {
    Arc::new(Mutex::new(host))
}

/// Canvas operations the player relies on
pub trait CanvasHost: Send + 'static {
    /// Counter bumped on every object change
    fn revision(&self) -> u64;

    /// Objects of the active page, in paint order
    fn objects(&self) -> Vec<CanvasObject>;

    /// Look up an object
    fn object(&self, id: &ObjectId) -> Option<CanvasObject>;

    /// Id of the active page, used as parent of top-level objects
    fn page_id(&self) -> ObjectId;

    /// Fresh object id
    fn new_object_id(&mut self) -> ObjectId;

    /// Pose of an object in page space
    fn page_pose(&self, id: &ObjectId) -> Option<Pose>;

    /// Bounds of an object in page space
    fn page_bounds(&self, id: &ObjectId) -> Option<Bounds>;

    /// Add an object
    fn create_object(&mut self, object: CanvasObject, mode: HistoryMode);

    /// Replace an existing object, returns false when it does not exist
    fn update_object(&mut self, object: CanvasObject, mode: HistoryMode) -> bool;

    /// Remove an object
    fn delete_object(&mut self, id: &ObjectId, mode: HistoryMode) -> Option<CanvasObject>;

    /// Set (`Some`) or remove (`None`) one metadata entry
    fn set_meta(&mut self, id: &ObjectId, key: &str, value: Option<Value>, mode: HistoryMode)
        -> bool;

    /// Animate an object toward a page-space pose and props
    fn animate_object(
        &mut self,
        id: &ObjectId,
        target: Pose,
        props: &Value,
        options: AnimationOptions,
        mode: HistoryMode,
    );

    /// Fit the viewport to page-space bounds
    fn zoom_to_bounds(&mut self, bounds: Bounds, options: ZoomOptions);

    /// Stop any running camera animation
    fn stop_camera_animation(&mut self);

    /// Clear the selection
    fn select_none(&mut self);

    /// Open an undo group; recorded changes up to the matching
    /// [`CanvasHost::end_group`] are undone together. Groups nest.
    fn begin_group(&mut self, description: &str);

    /// Close the group opened by the matching [`CanvasHost::begin_group`]
    fn end_group(&mut self);

    /// Mark the current history position
    fn mark_checkpoint(&mut self) -> Checkpoint;

    /// Revert every recorded change made after the checkpoint
    fn bail_to_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<(), HistoryError>;

    /// Every valid frame on the page
    fn frames(&self) -> Vec<Frame> {
        self.objects().iter().filter_map(CanvasObject::frame).collect()
    }

    /// The object owning a frame
    fn object_by_frame_id(&self, id: &FrameId) -> Option<CanvasObject> {
        if let Some(object) = self.object(&ObjectId::from(id)) {
            if object.frame().is_some_and(|frame| frame.id() == id) {
                return Some(object);
            }
        }
        self.objects()
            .into_iter()
            .find(|object| object.frame().is_some_and(|frame| frame.id() == id))
    }

    /// Write a frame into an object's metadata
    fn write_frame(&mut self, id: &ObjectId, frame: &Frame, mode: HistoryMode) -> bool {
        self.set_meta(id, cueframe_sequencer::FRAME_META_KEY, Some(frame.encode()), mode)
    }

    /// Set or clear the hidden-during-animation flag
    fn set_hidden_during_animation(&mut self, id: &ObjectId, hidden: bool, mode: HistoryMode) -> bool {
        let value = hidden.then_some(Value::Bool(true));
        self.set_meta(id, HIDDEN_DURING_ANIMATION_KEY, value, mode)
    }
}
