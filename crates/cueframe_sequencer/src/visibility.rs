// SPDX-License-Identifier: MIT OR Apache-2.0
//! Presentation-mode visibility of canvas objects.
//!
//! At a given step each track shows only its head: the last frame of its
//! most recent batch reached so far. Earlier frames of the track and frames
//! not reached yet are hidden.

use crate::batch::Step;
use crate::frame::{Frame, FrameId, TrackId};
use crate::object::{CanvasObject, ObjectId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Visibility decision for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeVisibility {
    /// Shown
    Visible,
    /// Not shown
    Hidden,
    /// Follows the containing group
    Inherit,
}

/// Object kinds with fixed visibility rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRules {
    /// Decorative slide marker kind, always hidden
    pub slide_kind: String,
    /// Container kind whose children inherit visibility
    pub group_kind: String,
}

impl Default for VisibilityRules {
    fn default() -> Self {
        Self {
            slide_kind: "slide".to_string(),
            group_kind: "group".to_string(),
        }
    }
}

/// Per-evaluation lookup built from the ordered steps
struct TrackHeads<'a> {
    /// Global index and track of the batch holding each frame
    placement: HashMap<&'a FrameId, (usize, &'a TrackId)>,
    /// Last frame of the latest batch of each track up to the current step
    heads: HashMap<&'a TrackId, &'a FrameId>,
}

impl<'a> TrackHeads<'a> {
    fn new(steps: &'a [Step], current: usize) -> Self {
        let mut placement = HashMap::new();
        let mut heads = HashMap::new();
        for (index, step) in steps.iter().enumerate() {
            for batch in step {
                for id in batch.frame_ids() {
                    placement.insert(id, (batch.global_index(), batch.track_id()));
                }
                if index <= current {
                    heads.insert(batch.track_id(), batch.last_frame_id());
                }
            }
        }
        Self { placement, heads }
    }

    fn is_head(&self, track: &TrackId, frame: &FrameId) -> bool {
        self.heads.get(track).is_some_and(|head| *head == frame)
    }

    fn frame_visibility(&self, frame: &Frame, current: usize) -> ShapeVisibility {
        let (global_index, track) = match frame {
            Frame::Cue(cue) => (cue.global_index, &cue.track_id),
            Frame::Sub(sub) => match self.placement.get(&sub.id) {
                Some((global_index, track)) => (*global_index, *track),
                None => return ShapeVisibility::Hidden,
            },
        };

        if global_index > current {
            ShapeVisibility::Hidden
        } else if self.is_head(track, frame.id()) {
            ShapeVisibility::Visible
        } else {
            ShapeVisibility::Hidden
        }
    }
}

impl VisibilityRules {
    fn evaluate(
        &self,
        object: &CanvasObject,
        parent: Option<&CanvasObject>,
        heads: &TrackHeads<'_>,
        current: usize,
    ) -> ShapeVisibility {
        if parent.is_some_and(|parent| parent.kind == self.group_kind) {
            return ShapeVisibility::Inherit;
        }
        if object.kind == self.slide_kind || object.is_hidden_during_animation() {
            return ShapeVisibility::Hidden;
        }
        match object.frame() {
            None => ShapeVisibility::Visible,
            Some(frame) => heads.frame_visibility(&frame, current),
        }
    }

    /// Visibility of one object at step `current`
    pub fn shape_visibility(
        &self,
        object: &CanvasObject,
        parent: Option<&CanvasObject>,
        steps: &[Step],
        current: usize,
    ) -> ShapeVisibility {
        self.evaluate(object, parent, &TrackHeads::new(steps, current), current)
    }

    /// Visibility of every object at step `current`, in object order
    pub fn shape_visibilities(
        &self,
        objects: &[CanvasObject],
        steps: &[Step],
        current: usize,
    ) -> IndexMap<ObjectId, ShapeVisibility> {
        let heads = TrackHeads::new(steps, current);
        let by_id: HashMap<&ObjectId, &CanvasObject> =
            objects.iter().map(|object| (&object.id, object)).collect();

        objects
            .iter()
            .map(|object| {
                let parent = object
                    .parent_id
                    .as_ref()
                    .and_then(|id| by_id.get(id).copied());
                (
                    object.id.clone(),
                    self.evaluate(object, parent, &heads, current),
                )
            })
            .collect()
    }
}

/// Visibility of one object at step `current` with the default kinds
pub fn shape_visibility(
    object: &CanvasObject,
    parent: Option<&CanvasObject>,
    steps: &[Step],
    current: usize,
) -> ShapeVisibility {
    VisibilityRules::default().shape_visibility(object, parent, steps, current)
}

/// Visibility of every object at step `current` with the default kinds
pub fn shape_visibilities(
    objects: &[CanvasObject],
    steps: &[Step],
    current: usize,
) -> IndexMap<ObjectId, ShapeVisibility> {
    VisibilityRules::default().shape_visibilities(objects, steps, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::derive_steps;
    use crate::batch::tests::{cue, sub};

    fn annotated(frame: Frame) -> CanvasObject {
        CanvasObject::new(frame.id().as_str(), "geo").with_frame(frame)
    }

    fn scene() -> Vec<CanvasObject> {
        // Track t: a (0) then b with sub b1 (2). Track u: c (1).
        vec![
            annotated(cue("a", "t", 0)),
            annotated(cue("b", "t", 2)),
            annotated(sub("b1", "b")),
            annotated(cue("c", "u", 1)),
            CanvasObject::new("plain", "geo"),
        ]
    }

    fn steps_of(objects: &[CanvasObject]) -> Vec<Step> {
        let frames: Vec<Frame> = objects.iter().filter_map(CanvasObject::frame).collect();
        derive_steps(&frames)
    }

    fn visible_at(objects: &[CanvasObject], current: usize) -> Vec<String> {
        let steps = steps_of(objects);
        shape_visibilities(objects, &steps, current)
            .into_iter()
            .filter(|(_, v)| *v == ShapeVisibility::Visible)
            .map(|(id, _)| id.0)
            .collect()
    }

    #[test]
    fn test_track_head_progression() {
        let objects = scene();
        assert_eq!(visible_at(&objects, 0), vec!["a", "plain"]);
        assert_eq!(visible_at(&objects, 1), vec!["a", "c", "plain"]);
        assert_eq!(visible_at(&objects, 2), vec!["b1", "c", "plain"]);
    }

    #[test]
    fn test_single_visible_per_track() {
        let objects = scene();
        let steps = steps_of(&objects);
        for current in 0..steps.len() {
            let visibilities = shape_visibilities(&objects, &steps, current);
            for track in ["t", "u"] {
                let count = objects
                    .iter()
                    .filter(|o| visibilities[&o.id] == ShapeVisibility::Visible)
                    .filter_map(|o| o.frame())
                    .filter(|f| {
                        steps
                            .iter()
                            .flatten()
                            .any(|b| b.track_id().as_str() == track && b.contains(f.id()))
                    })
                    .count();
                assert!(count <= 1, "track {track} at {current}");
            }
        }
    }

    #[test]
    fn test_slide_and_group_rules() {
        let steps = Vec::new();
        let slide = CanvasObject::new("s", "slide");
        assert_eq!(shape_visibility(&slide, None, &steps, 0), ShapeVisibility::Hidden);

        let group = CanvasObject::new("g", "group");
        let child = CanvasObject::new("child", "slide").with_parent("g");
        assert_eq!(
            shape_visibility(&child, Some(&group), &steps, 0),
            ShapeVisibility::Inherit
        );
    }

    #[test]
    fn test_hidden_during_animation() {
        let objects = scene();
        let steps = steps_of(&objects);
        let mut a = objects[0].clone();
        a.set_hidden_during_animation(true);
        assert_eq!(shape_visibility(&a, None, &steps, 0), ShapeVisibility::Hidden);
    }

    #[test]
    fn test_unreachable_sub_is_hidden() {
        let orphan = annotated(sub("o", "missing"));
        assert_eq!(shape_visibility(&orphan, None, &[], 3), ShapeVisibility::Hidden);
    }

    #[test]
    fn test_malformed_frame_is_visible() {
        let mut object = CanvasObject::new("x", "geo");
        object
            .meta
            .insert("frame".to_string(), serde_json::json!({ "type": "cue" }));
        assert_eq!(shape_visibility(&object, None, &[], 0), ShapeVisibility::Visible);
    }

    #[test]
    fn test_custom_kinds() {
        let rules = VisibilityRules {
            slide_kind: "marker".to_string(),
            group_kind: "frame".to_string(),
        };
        let marker = CanvasObject::new("m", "marker");
        let slide = CanvasObject::new("s", "slide");
        assert_eq!(rules.shape_visibility(&marker, None, &[], 0), ShapeVisibility::Hidden);
        assert_eq!(rules.shape_visibility(&slide, None, &[], 0), ShapeVisibility::Visible);
    }
}
