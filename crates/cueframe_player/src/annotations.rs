// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame editing against a host.
//!
//! These are user edits: every write is recorded in the host history so it
//! can be undone. Ordering decisions come from the pure functions in
//! `cueframe_sequencer`; this module reads frames from the host and writes
//! the results back onto the owning objects.

use crate::config::PlayerConfig;
use crate::error::AnnotationError;
use crate::host::{CanvasHost, HistoryMode};
use cueframe_sequencer::{
    derive_steps, frames_from_batches, insert_after, locate_batch, move_batch, next_global_index,
    reconcile_deletion, relink_successors, BatchId, CanvasObject, CueFrame, Frame, FrameAction,
    FrameBatch, FrameId, MoveTarget, ObjectId, Step, SubFrame, TrackId, FRAME_META_KEY,
};
use serde_json::Map;
use std::collections::HashMap;

/// Result type for annotation edits
pub type Result<T> = std::result::Result<T, AnnotationError>;

/// Editing operations over the frames of one host
pub struct Annotator<'a, H: CanvasHost + ?Sized> {
    host: &'a mut H,
    config: &'a PlayerConfig,
}

impl<'a, H: CanvasHost + ?Sized> Annotator<'a, H> {
    /// Borrow a host for editing
    pub fn new(host: &'a mut H, config: &'a PlayerConfig) -> Self {
        Self { host, config }
    }

    /// Every valid frame on the page
    pub fn frames(&self) -> Vec<Frame> {
        self.host.frames()
    }

    /// The object owning a frame
    pub fn object_by_frame_id(&self, id: &FrameId) -> Option<CanvasObject> {
        self.host.object_by_frame_id(id)
    }

    /// Ordered steps of the page
    pub fn ordered_steps(&self) -> Vec<Step> {
        derive_steps(&self.frames())
    }

    fn cue_frames(&self) -> Vec<CueFrame> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Cue(cue) => Some(cue),
                Frame::Sub(_) => None,
            })
            .collect()
    }

    /// Run `edit` as one undo step
    fn transact<R>(&mut self, description: &str, edit: impl FnOnce(&mut Self) -> R) -> R {
        self.host.begin_group(description);
        let result = edit(self);
        self.host.end_group();
        result
    }

    fn write(&mut self, frame: &Frame) -> bool {
        match self.host.object_by_frame_id(frame.id()) {
            Some(object) => self.host.write_frame(&object.id, frame, HistoryMode::Record),
            None => {
                tracing::warn!(frame = %frame.id(), "no object owns frame, write skipped");
                false
            }
        }
    }

    /// Start a new track on an unannotated object, appended at the end of the timeline
    pub fn attach_cue_frame(&mut self, object_id: &ObjectId, action: FrameAction) -> Result<CueFrame> {
        let object = self
            .host
            .object(object_id)
            .ok_or_else(|| AnnotationError::MissingObject(object_id.clone()))?;
        if object.frame().is_some() {
            return Err(AnnotationError::AlreadyAnnotated(object_id.clone()));
        }

        let cue = CueFrame {
            id: object_id.frame_id(),
            track_id: TrackId::generate(),
            global_index: next_global_index(&self.cue_frames()),
            action,
        };
        self.host
            .write_frame(object_id, &Frame::Cue(cue.clone()), HistoryMode::Record);
        tracing::info!(frame = %cue.id, track = %cue.track_id, index = cue.global_index, "attached cue frame");
        Ok(cue)
    }

    /// Repair chains and indexes after `deleted` left the page.
    ///
    /// Returns the number of frames rewritten.
    pub fn reconcile_deletion(&mut self, deleted: &CanvasObject) -> usize {
        let Some(frame) = deleted.frame() else {
            return 0;
        };
        let changed = reconcile_deletion(&frame, &self.frames());
        self.transact("Repair frames", |this| {
            changed.iter().filter(|frame| this.write(frame)).count()
        })
    }

    /// Delete an object and repair the frames around it
    pub fn delete_object(&mut self, id: &ObjectId) -> Option<CanvasObject> {
        self.transact("Delete object", |this| {
            let deleted = this.host.delete_object(id, HistoryMode::Record)?;
            this.reconcile_deletion(&deleted);
            Some(deleted)
        })
    }

    /// Adjust an object about to be created.
    ///
    /// A slide without a frame gets a camera cue at the end of the timeline,
    /// joining the latest camera track when there is one. An object whose
    /// frame id is already owned by another object is a copy: a copied sub
    /// frame is chained right after its original, a copied cue frame starts a
    /// new track.
    pub fn prepare_created_object(&mut self, mut object: CanvasObject) -> CanvasObject {
        match object.frame() {
            None if object.kind == self.config.slide_kind => {
                let steps = self.ordered_steps();
                let camera_track = steps
                    .iter()
                    .rev()
                    .flatten()
                    .find(|batch| batch.cue.action.is_camera_zoom())
                    .map(|batch| batch.track_id().clone());
                let duration = if camera_track.is_some() {
                    self.config.slide_camera_duration_ms
                } else {
                    0
                };
                let cue = CueFrame {
                    id: object.id.frame_id(),
                    track_id: camera_track.unwrap_or_else(TrackId::generate),
                    global_index: steps.len(),
                    action: FrameAction::camera_zoom().with_duration(duration),
                };
                tracing::debug!(frame = %cue.id, track = %cue.track_id, "slide gets camera cue");
                object.set_frame(&Frame::Cue(cue));
            }
            Some(frame) => {
                let duplicated = self
                    .host
                    .object_by_frame_id(frame.id())
                    .is_some_and(|owner| owner.id != object.id);
                if duplicated {
                    let copy = self.unique_frame_for_copy(&object.id, &frame);
                    object.set_frame(&copy);
                }
            }
            None => {}
        }
        object
    }

    fn unique_frame_for_copy(&mut self, copy_id: &ObjectId, original: &Frame) -> Frame {
        match original {
            Frame::Sub(sub) => {
                let copy_frame = copy_id.frame_id();
                for successor in relink_successors(&self.frames(), &sub.id, &copy_frame) {
                    self.write(&successor);
                }
                Frame::Sub(SubFrame {
                    id: copy_frame,
                    prev_frame_id: sub.id.clone(),
                    action: sub.action.clone(),
                })
            }
            Frame::Cue(cue) => Frame::Cue(CueFrame {
                id: copy_id.frame_id(),
                track_id: TrackId::generate(),
                global_index: next_global_index(&self.cue_frames()),
                action: cue.action.clone(),
            }),
        }
    }

    /// Create an object, applying [`Self::prepare_created_object`] first
    pub fn create_object(&mut self, object: CanvasObject) -> ObjectId {
        self.transact("Create object", |this| {
            let object = this.prepare_created_object(object);
            let id = object.id.clone();
            this.host.create_object(object, HistoryMode::Record);
            id
        })
    }

    /// Offset copy of an object with fresh id and empty metadata
    fn copy_of(&mut self, original: &CanvasObject) -> CanvasObject {
        let offset = self.config.copy_offset;
        let mut copy = original.clone();
        copy.id = self.host.new_object_id();
        copy.x += offset.x;
        copy.y += offset.y;
        copy.meta = Map::new();
        copy
    }

    fn new_action(&self, like: &FrameAction) -> FrameAction {
        like.same_kind(self.config.new_frame_duration_ms)
            .with_easing(self.config.default_easing)
    }

    /// Copy the object of a cue frame and add the copy as the next batch of the same track.
    ///
    /// The new batch becomes its own step right after the original's step.
    pub fn add_cue_frame_after(&mut self, prev_cue: &FrameId) -> Result<ObjectId> {
        let original = self
            .host
            .object_by_frame_id(prev_cue)
            .ok_or_else(|| AnnotationError::MissingFrame(prev_cue.clone()))?;
        let Some(Frame::Cue(cue)) = original.frame() else {
            return Err(AnnotationError::NotACue(prev_cue.clone()));
        };

        let mut steps = self.ordered_steps();
        let after = locate_batch(&steps, &BatchId::for_cue(&cue.id))
            .map_or(steps.len(), |(step, _)| step);

        let mut copy = self.copy_of(&original);
        let new_cue = CueFrame {
            id: copy.id.frame_id(),
            track_id: cue.track_id.clone(),
            global_index: 0,
            action: self.new_action(&cue.action),
        };
        let new_batch = BatchId::for_cue(&new_cue.id);
        insert_after(&mut steps, FrameBatch::new(new_cue.clone()), after);

        let global_index = locate_batch(&steps, &new_batch).map_or(0, |(step, _)| step);
        copy.set_frame(&Frame::Cue(CueFrame {
            global_index,
            ..new_cue
        }));
        let id = copy.id.clone();
        self.transact("Add cue frame", |this| {
            this.host.create_object(copy, HistoryMode::Record);
            this.apply_steps(&steps);
        });

        tracing::info!(object = %id, track = %cue.track_id, index = global_index, "added cue frame");
        Ok(id)
    }

    /// Copy the object of a frame and chain the copy right after it
    pub fn add_sub_frame_after(&mut self, prev_frame: &FrameId) -> Result<ObjectId> {
        let original = self
            .host
            .object_by_frame_id(prev_frame)
            .ok_or_else(|| AnnotationError::MissingFrame(prev_frame.clone()))?;
        let frame = original
            .frame()
            .ok_or_else(|| AnnotationError::MissingFrame(prev_frame.clone()))?;

        let mut copy = self.copy_of(&original);
        let sub = SubFrame {
            id: copy.id.frame_id(),
            prev_frame_id: prev_frame.clone(),
            action: self.new_action(frame.action()),
        };
        copy.set_frame(&Frame::Sub(sub.clone()));

        let successors = relink_successors(&self.frames(), prev_frame, &sub.id);
        let id = copy.id.clone();
        self.transact("Add sub frame", |this| {
            this.host.create_object(copy, HistoryMode::Record);
            for successor in &successors {
                this.write(successor);
            }
        });

        tracing::info!(object = %id, prev = %prev_frame, "added sub frame");
        Ok(id)
    }

    /// Move a batch and persist the new order
    pub fn move_batch(&mut self, batch_id: &BatchId, target: MoveTarget) -> Result<usize> {
        let steps = self.ordered_steps();
        let moved = move_batch(&steps, batch_id, target)
            .ok_or_else(|| AnnotationError::InvalidMove(batch_id.clone()))?;
        Ok(self.apply_steps(&moved))
    }

    /// Persist edited steps onto the objects.
    ///
    /// Frames whose content changed are rewritten; frames absent from the
    /// steps are removed from their objects. Returns the number of objects
    /// touched.
    pub fn apply_steps(&mut self, steps: &[Step]) -> usize {
        self.transact("Reorder frames", |this| this.write_steps(steps))
    }

    fn write_steps(&mut self, steps: &[Step]) -> usize {
        let wanted = frames_from_batches(steps.iter().flatten());
        let current: HashMap<FrameId, Frame> = self
            .frames()
            .into_iter()
            .map(|frame| (frame.id().clone(), frame))
            .collect();

        let mut touched = 0;
        for frame in &wanted {
            if current.get(frame.id()) != Some(frame) && self.write(frame) {
                touched += 1;
            }
        }

        let kept: Vec<&FrameId> = wanted.iter().map(Frame::id).collect();
        for id in current.keys().filter(|id| !kept.contains(id)) {
            if let Some(object) = self.host.object_by_frame_id(id) {
                self.host
                    .set_meta(&object.id, FRAME_META_KEY, None, HistoryMode::Record);
                touched += 1;
            }
        }
        touched
    }

    /// Persist an edited frame, e.g. a new duration or easing
    pub fn update_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.write(frame) {
            Ok(())
        } else {
            Err(AnnotationError::MissingFrame(frame.id().clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessCanvas;
    use cueframe_sequencer::Easing;

    fn shape(id: &str) -> CanvasObject {
        CanvasObject::new(id, "geo").at(10.0, 10.0)
    }

    fn cue(id: &str, track: &str, global_index: usize) -> CueFrame {
        CueFrame {
            id: id.into(),
            track_id: track.into(),
            global_index,
            action: FrameAction::shape_animation(),
        }
    }

    fn sub(id: &str, prev: &str) -> SubFrame {
        SubFrame {
            id: id.into(),
            prev_frame_id: prev.into(),
            action: FrameAction::shape_animation(),
        }
    }

    fn frame_of(canvas: &HeadlessCanvas, id: &str) -> Option<Frame> {
        canvas.object(&id.into()).and_then(|o| o.frame())
    }

    fn index_of(canvas: &HeadlessCanvas, id: &str) -> usize {
        match frame_of(canvas, id) {
            Some(Frame::Cue(cue)) => cue.global_index,
            other => panic!("{id} has no cue frame: {other:?}"),
        }
    }

    #[test]
    fn test_attach_cue_frame_appends_new_track() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("a").with_frame(cue("a", "t1", 0)),
            shape("b").with_frame(cue("b", "t2", 4)),
            shape("c"),
        ]);
        let config = PlayerConfig::default();
        let mut annotator = Annotator::new(&mut canvas, &config);

        let frame = annotator
            .attach_cue_frame(&"c".into(), FrameAction::shape_animation())
            .unwrap();
        assert_eq!(frame.global_index, 5);
        assert_eq!(frame.id, FrameId::from("c"));
        assert_ne!(frame.track_id, TrackId::from("t1"));
        assert_ne!(frame.track_id, TrackId::from("t2"));

        assert_eq!(
            annotator.attach_cue_frame(&"c".into(), FrameAction::shape_animation()),
            Err(AnnotationError::AlreadyAnnotated("c".into()))
        );
        assert_eq!(
            annotator.attach_cue_frame(&"zz".into(), FrameAction::shape_animation()),
            Err(AnnotationError::MissingObject("zz".into()))
        );
        assert!(canvas.history().can_undo());
    }

    #[test]
    fn test_attach_on_empty_page_starts_at_zero() {
        let mut canvas = HeadlessCanvas::with_objects([shape("a")]);
        let config = PlayerConfig::default();
        let frame = Annotator::new(&mut canvas, &config)
            .attach_cue_frame(&"a".into(), FrameAction::camera_zoom())
            .unwrap();
        assert_eq!(frame.global_index, 0);
    }

    #[test]
    fn test_delete_cue_reindexes() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("a").with_frame(cue("a", "t1", 0)),
            shape("b").with_frame(cue("b", "t2", 1)),
            shape("c").with_frame(cue("c", "t3", 2)),
        ]);
        let config = PlayerConfig::default();
        Annotator::new(&mut canvas, &config).delete_object(&"b".into());

        assert_eq!(index_of(&canvas, "a"), 0);
        assert_eq!(index_of(&canvas, "c"), 1);
    }

    #[test]
    fn test_delete_with_repair_is_one_undo_step() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("a").with_frame(cue("a", "t1", 0)),
            shape("b").with_frame(cue("b", "t2", 1)),
            shape("c").with_frame(cue("c", "t3", 2)),
        ]);
        let config = PlayerConfig::default();
        Annotator::new(&mut canvas, &config).delete_object(&"b".into());
        assert_eq!(canvas.history().undo_depth(), 1);

        canvas.undo().unwrap();
        assert_eq!(index_of(&canvas, "a"), 0);
        assert_eq!(index_of(&canvas, "b"), 1);
        assert_eq!(index_of(&canvas, "c"), 2);
        let ids: Vec<String> = canvas.objects().into_iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_cue_frame_after_is_one_undo_step() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("a").with_frame(cue("a", "t", 0)),
            shape("b").with_frame(cue("b", "u", 1)),
        ]);
        let config = PlayerConfig::default();
        let id = Annotator::new(&mut canvas, &config)
            .add_cue_frame_after(&"a".into())
            .unwrap();
        assert_eq!(canvas.history().undo_depth(), 1);

        canvas.undo().unwrap();
        assert!(canvas.object(&id).is_none());
        assert_eq!(index_of(&canvas, "b"), 1);
    }

    #[test]
    fn test_delete_sub_relinks_chain() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("c").with_frame(cue("c", "t", 0)),
            shape("a").with_frame(sub("a", "c")),
            shape("b").with_frame(sub("b", "a")),
        ]);
        let config = PlayerConfig::default();
        Annotator::new(&mut canvas, &config).delete_object(&"a".into());

        assert_eq!(frame_of(&canvas, "b"), Some(Frame::Sub(sub("b", "c"))));
    }

    #[test]
    fn test_slide_gets_camera_cue() {
        let mut canvas = HeadlessCanvas::with_objects([shape("a").with_frame(cue("a", "t", 0))]);
        let config = PlayerConfig::default();
        let mut annotator = Annotator::new(&mut canvas, &config);

        annotator.create_object(CanvasObject::new("s1", "slide"));
        annotator.create_object(CanvasObject::new("s2", "slide"));

        let Some(Frame::Cue(first)) = frame_of(&canvas, "s1") else {
            panic!("s1 has no cue");
        };
        let Some(Frame::Cue(second)) = frame_of(&canvas, "s2") else {
            panic!("s2 has no cue");
        };
        assert!(first.action.is_camera_zoom());
        assert_eq!(first.global_index, 1);
        assert_eq!(first.action.duration_ms(), 0);
        assert_eq!(second.global_index, 2);
        assert_eq!(second.track_id, first.track_id);
        assert_eq!(second.action.duration_ms(), 1000);
    }

    #[test]
    fn test_duplicated_sub_is_chained_after_original() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("c").with_frame(cue("c", "t", 0)),
            shape("a").with_frame(sub("a", "c")),
            shape("b").with_frame(sub("b", "a")),
        ]);
        let config = PlayerConfig::default();
        let copy = shape("a2").with_frame(sub("a", "c"));
        Annotator::new(&mut canvas, &config).create_object(copy);

        assert_eq!(frame_of(&canvas, "a2"), Some(Frame::Sub(sub("a2", "a"))));
        assert_eq!(frame_of(&canvas, "b"), Some(Frame::Sub(sub("b", "a2"))));
    }

    #[test]
    fn test_duplicated_cue_starts_new_track() {
        let mut canvas = HeadlessCanvas::with_objects([shape("c").with_frame(cue("c", "t", 0))]);
        let config = PlayerConfig::default();
        Annotator::new(&mut canvas, &config).create_object(shape("c2").with_frame(cue("c", "t", 0)));

        let Some(Frame::Cue(copy)) = frame_of(&canvas, "c2") else {
            panic!("copy has no cue");
        };
        assert_eq!(copy.id, FrameId::from("c2"));
        assert_ne!(copy.track_id, TrackId::from("t"));
        assert_eq!(copy.global_index, 1);
    }

    #[test]
    fn test_add_cue_frame_after_shifts_later_steps() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("a").with_frame(cue("a", "t", 0)),
            shape("b").with_frame(cue("b", "u", 1)),
        ]);
        let config = PlayerConfig::default();
        let id = Annotator::new(&mut canvas, &config)
            .add_cue_frame_after(&"a".into())
            .unwrap();

        let copy = canvas.object(&id).unwrap();
        assert_eq!((copy.x, copy.y), (110.0, 110.0));
        let Some(Frame::Cue(new_cue)) = copy.frame() else {
            panic!("copy has no cue");
        };
        assert_eq!(new_cue.track_id, TrackId::from("t"));
        assert_eq!(new_cue.global_index, 1);
        assert_eq!(new_cue.action.duration_ms(), 1000);
        assert_eq!(new_cue.action.easing(), Easing::EaseInCubic);
        assert_eq!(index_of(&canvas, "b"), 2);
    }

    #[test]
    fn test_add_cue_frame_after_rejects_sub() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("c").with_frame(cue("c", "t", 0)),
            shape("s").with_frame(sub("s", "c")),
        ]);
        let config = PlayerConfig::default();
        let mut annotator = Annotator::new(&mut canvas, &config);
        assert_eq!(
            annotator.add_cue_frame_after(&"s".into()),
            Err(AnnotationError::NotACue("s".into()))
        );
        assert_eq!(
            annotator.add_cue_frame_after(&"x".into()),
            Err(AnnotationError::MissingFrame("x".into()))
        );
    }

    #[test]
    fn test_add_sub_frame_after_relinks_successor() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("c").with_frame(cue("c", "t", 0)),
            shape("b").with_frame(sub("b", "c")),
        ]);
        let config = PlayerConfig::default();
        let id = Annotator::new(&mut canvas, &config)
            .add_sub_frame_after(&"c".into())
            .unwrap();

        let Some(Frame::Sub(new_sub)) = frame_of(&canvas, id.as_str()) else {
            panic!("copy has no sub frame");
        };
        assert_eq!(new_sub.prev_frame_id, FrameId::from("c"));
        assert_eq!(frame_of(&canvas, "b"), Some(Frame::Sub(sub("b", id.as_str()))));

        let steps = derive_steps(&canvas.frames());
        let chain: Vec<String> = steps[0][0].frame_ids().map(|f| f.0.clone()).collect();
        assert_eq!(chain, vec!["c".to_string(), id.0.clone(), "b".to_string()]);
    }

    #[test]
    fn test_move_batch_persists_indexes() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("c1").with_frame(cue("c1", "camera", 0)),
            shape("s1").with_frame(cue("s1", "shape", 1)),
            shape("c2").with_frame(cue("c2", "camera", 2)),
        ]);
        let config = PlayerConfig::default();
        let mut annotator = Annotator::new(&mut canvas, &config);
        let touched = annotator
            .move_batch(&BatchId::for_cue(&"s1".into()), MoveTarget::At(2))
            .unwrap();
        assert_eq!(touched, 1);
        assert!(annotator
            .move_batch(&BatchId::for_cue(&"s1".into()), MoveTarget::At(9))
            .is_err());

        assert_eq!(index_of(&canvas, "c1"), 0);
        assert_eq!(index_of(&canvas, "s1"), 1);
        assert_eq!(index_of(&canvas, "c2"), 1);
        assert_eq!(canvas.history().undo_depth(), 1);
    }

    #[test]
    fn test_apply_steps_removes_dropped_frames() {
        let mut canvas = HeadlessCanvas::with_objects([
            shape("a").with_frame(cue("a", "t", 0)),
            shape("b").with_frame(cue("b", "u", 1)),
        ]);
        let config = PlayerConfig::default();
        let mut annotator = Annotator::new(&mut canvas, &config);
        let mut steps = annotator.ordered_steps();
        steps.remove(0);
        annotator.apply_steps(&steps);

        assert!(frame_of(&canvas, "a").is_none());
        assert!(frame_of(&canvas, "b").is_some());
    }

    #[test]
    fn test_update_frame() {
        let mut canvas = HeadlessCanvas::with_objects([shape("a").with_frame(cue("a", "t", 0))]);
        let config = PlayerConfig::default();
        let mut annotator = Annotator::new(&mut canvas, &config);
        let mut frame = Frame::Cue(cue("a", "t", 0));
        *frame.action_mut() = FrameAction::shape_animation().with_duration(250);
        annotator.update_frame(&frame).unwrap();

        assert!(annotator.update_frame(&Frame::Cue(cue("ghost", "t", 0))).is_err());
        assert_eq!(frame_of(&canvas, "a").map(|f| f.action().duration_ms()), Some(250));
    }
}
