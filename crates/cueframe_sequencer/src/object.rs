// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-agnostic canvas object records.

use crate::frame::{Frame, FrameId, FRAME_META_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Metadata key of the transient flag set while a stand-in plays in place of an object
pub const HIDDEN_DURING_ANIMATION_KEY: &str = "hiddenDuringAnimation";

/// Unique identifier for a canvas object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Create an object id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of the frame this object would own
    pub fn frame_id(&self) -> FrameId {
        FrameId(self.0.clone())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<&FrameId> for ObjectId {
    fn from(id: &FrameId) -> Self {
        Self(id.0.clone())
    }
}

/// Position and rotation of an object
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Rotation in radians
    pub rotation: f64,
}

impl Pose {
    /// Create a pose
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self { x, y, rotation }
    }

    /// Express a pose given in this pose's local space in the outer space
    pub fn compose(&self, local: Pose) -> Pose {
        let (sin, cos) = self.rotation.sin_cos();
        Pose {
            x: self.x + local.x * cos - local.y * sin,
            y: self.y + local.x * sin + local.y * cos,
            rotation: self.rotation + local.rotation,
        }
    }

    /// Pose at `t` along the straight path to `to`
    pub fn lerp(&self, to: Pose, t: f64) -> Pose {
        Pose {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            rotation: self.rotation + (to.rotation - self.rotation) * t,
        }
    }

    /// Express an outer-space pose in this pose's local space
    pub fn localize(&self, outer: Pose) -> Pose {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = outer.x - self.x;
        let dy = outer.y - self.y;
        Pose {
            x: dx * cos + dy * sin,
            y: -dx * sin + dy * cos,
            rotation: outer.rotation - self.rotation,
        }
    }
}

/// Axis-aligned bounds in page space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge
    pub min_x: f64,
    /// Top edge
    pub min_y: f64,
    /// Right edge
    pub max_x: f64,
    /// Bottom edge
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from origin and size
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    /// Smallest bounds containing every point
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Bounds>, (x, y)| {
            Some(match acc {
                None => Bounds {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => Bounds {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            })
        })
    }

    /// Width
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Center point
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Grow the bounds by `inset` on every side
    pub fn expanded(&self, inset: f64) -> Self {
        Self {
            min_x: self.min_x - inset,
            min_y: self.min_y - inset,
            max_x: self.max_x + inset,
            max_y: self.max_y + inset,
        }
    }
}

/// A canvas object as the sequencer sees it.
///
/// `x`, `y` and `rotation` are relative to the parent. `props` is the
/// kind-specific payload and `meta` the free-form metadata holding the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasObject {
    /// Object id
    pub id: ObjectId,
    /// Shape kind name
    pub kind: String,
    /// Parent object, `None` for objects placed directly on the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ObjectId>,
    /// X position in parent space
    #[serde(default)]
    pub x: f64,
    /// Y position in parent space
    #[serde(default)]
    pub y: f64,
    /// Rotation in parent space
    #[serde(default)]
    pub rotation: f64,
    /// Kind-specific properties
    #[serde(default)]
    pub props: Value,
    /// Free-form metadata
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl CanvasObject {
    /// Create an object at the origin with empty props and metadata
    pub fn new(id: impl Into<ObjectId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parent_id: None,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            props: Value::Object(Map::new()),
            meta: Map::new(),
        }
    }

    /// Set the position
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the parent
    pub fn with_parent(mut self, parent: impl Into<ObjectId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Set the props
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Attach a frame
    pub fn with_frame(mut self, frame: impl Into<Frame>) -> Self {
        self.set_frame(&frame.into());
        self
    }

    /// Local pose
    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.rotation)
    }

    /// Replace the local pose
    pub fn set_pose(&mut self, pose: Pose) {
        self.x = pose.x;
        self.y = pose.y;
        self.rotation = pose.rotation;
    }

    /// The attached frame, if any valid one is stored
    pub fn frame(&self) -> Option<Frame> {
        Frame::from_meta(&self.meta)
    }

    /// Store a frame in the metadata
    pub fn set_frame(&mut self, frame: &Frame) {
        self.meta.insert(FRAME_META_KEY.to_string(), frame.encode());
    }

    /// Remove the stored frame
    pub fn clear_frame(&mut self) -> Option<Frame> {
        let frame = self.frame();
        self.meta.remove(FRAME_META_KEY);
        frame
    }

    /// Whether a stand-in currently plays in place of this object
    pub fn is_hidden_during_animation(&self) -> bool {
        self.meta
            .get(HIDDEN_DURING_ANIMATION_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Set or clear the hidden-during-animation flag
    pub fn set_hidden_during_animation(&mut self, hidden: bool) {
        if hidden {
            self.meta
                .insert(HIDDEN_DURING_ANIMATION_KEY.to_string(), Value::Bool(true));
        } else {
            self.meta.remove(HIDDEN_DURING_ANIMATION_KEY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CueFrame, FrameAction};
    use serde_json::json;

    #[test]
    fn test_frame_roundtrip_through_meta() {
        let cue = CueFrame {
            id: "a".into(),
            track_id: "t".into(),
            global_index: 0,
            action: FrameAction::shape_animation(),
        };
        let mut object = CanvasObject::new("a", "geo").with_frame(cue.clone());
        assert_eq!(object.frame(), Some(Frame::Cue(cue.clone())));

        assert_eq!(object.clear_frame(), Some(Frame::Cue(cue)));
        assert!(object.frame().is_none());
    }

    #[test]
    fn test_hidden_flag() {
        let mut object = CanvasObject::new("a", "geo");
        assert!(!object.is_hidden_during_animation());
        object.set_hidden_during_animation(true);
        assert!(object.is_hidden_during_animation());
        object.set_hidden_during_animation(false);
        assert!(!object.meta.contains_key(HIDDEN_DURING_ANIMATION_KEY));
    }

    #[test]
    fn test_pose_compose_rotates_local_offset() {
        let parent = Pose::new(10.0, 0.0, std::f64::consts::FRAC_PI_2);
        let page = parent.compose(Pose::new(5.0, 0.0, 0.1));
        assert!((page.x - 10.0).abs() < 1e-9);
        assert!((page.y - 5.0).abs() < 1e-9);
        assert!((page.rotation - (std::f64::consts::FRAC_PI_2 + 0.1)).abs() < 1e-9);

        let local = parent.localize(page);
        assert!((local.x - 5.0).abs() < 1e-9);
        assert!(local.y.abs() < 1e-9);
        assert!((local.rotation - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_pose_lerp() {
        let from = Pose::new(0.0, 10.0, 0.0);
        let to = Pose::new(100.0, 30.0, 1.0);
        assert_eq!(from.lerp(to, 0.0), from);
        assert_eq!(from.lerp(to, 1.0), to);
        assert_eq!(from.lerp(to, 0.5), Pose::new(50.0, 20.0, 0.5));
    }

    #[test]
    fn test_object_json_defaults() {
        let object: CanvasObject =
            serde_json::from_value(json!({ "id": "a", "kind": "geo" })).unwrap();
        assert_eq!(object.pose(), Pose::default());
        assert!(object.parent_id.is_none());
        assert!(object.meta.is_empty());
    }

    #[test]
    fn test_bounds_from_points() {
        let bounds = Bounds::from_points([(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)]).unwrap();
        assert_eq!(bounds.width(), 6.0);
        assert_eq!(bounds.height(), 6.0);
        assert_eq!(bounds.expanded(1.0).min_x, -3.0);
        assert!(Bounds::from_points(Vec::new()).is_none());
    }
}
