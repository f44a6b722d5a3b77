// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame annotations attached to canvas objects.
//!
//! A frame lives in the `frame` metadata entry of exactly one object. Cue
//! frames open a batch on a track and carry its global position; sub frames
//! chain after another frame through `prevFrameId`.

use crate::easing::Easing;
use crate::error::{Result, SequencerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Metadata key holding the serialized frame of an object
pub const FRAME_META_KEY: &str = "frame";

/// Identifier of a frame, equal to the id of the object that owns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl FrameId {
    /// Create a frame id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier shared by every batch of one track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    /// Create a track id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh `track-<unix millis>-<uuid>` id
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(format!("track-{millis}-{}", Uuid::new_v4().simple()))
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What happens when a frame is reached during playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FrameAction {
    /// Interpolate from the predecessor's pose to this object's pose
    ShapeAnimation {
        /// Duration in milliseconds, 0 when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
        /// Easing curve, `easeInCubic` when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        easing: Option<Easing>,
    },
    /// Fit the viewport to this object's bounds
    CameraZoom {
        /// Padding around the bounds, 0 when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inset: Option<f64>,
        /// Duration in milliseconds, 0 when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
        /// Easing curve, `easeInCubic` when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        easing: Option<Easing>,
    },
}

impl FrameAction {
    /// Shape animation with default timing
    pub fn shape_animation() -> Self {
        Self::ShapeAnimation {
            duration: None,
            easing: None,
        }
    }

    /// Camera zoom with default timing and no inset
    pub fn camera_zoom() -> Self {
        Self::CameraZoom {
            inset: None,
            duration: None,
            easing: None,
        }
    }

    /// Whether this is a camera zoom
    pub fn is_camera_zoom(&self) -> bool {
        matches!(self, Self::CameraZoom { .. })
    }

    /// Effective duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::ShapeAnimation { duration, .. } | Self::CameraZoom { duration, .. } => {
                duration.unwrap_or(0)
            }
        }
    }

    /// Effective duration
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }

    /// Effective easing
    pub fn easing(&self) -> Easing {
        match self {
            Self::ShapeAnimation { easing, .. } | Self::CameraZoom { easing, .. } => {
                easing.unwrap_or_default()
            }
        }
    }

    /// Effective camera inset, 0 for shape animations
    pub fn inset(&self) -> f64 {
        match self {
            Self::CameraZoom { inset, .. } => inset.unwrap_or(0.0),
            Self::ShapeAnimation { .. } => 0.0,
        }
    }

    /// Replace the duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        match &mut self {
            Self::ShapeAnimation { duration, .. } | Self::CameraZoom { duration, .. } => {
                *duration = Some(duration_ms);
            }
        }
        self
    }

    /// Replace the easing
    pub fn with_easing(mut self, value: Easing) -> Self {
        match &mut self {
            Self::ShapeAnimation { easing, .. } | Self::CameraZoom { easing, .. } => {
                *easing = Some(value);
            }
        }
        self
    }

    /// Same kind of action with only a duration set
    pub fn same_kind(&self, duration_ms: u64) -> Self {
        let fresh = match self {
            Self::ShapeAnimation { .. } => Self::shape_animation(),
            Self::CameraZoom { .. } => Self::camera_zoom(),
        };
        fresh.with_duration(duration_ms)
    }
}

impl Default for FrameAction {
    fn default() -> Self {
        Self::shape_animation()
    }
}

/// Head frame of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueFrame {
    /// Frame id (owning object id)
    pub id: FrameId,
    /// Track this batch belongs to
    pub track_id: TrackId,
    /// Position of the batch in the presentation
    pub global_index: usize,
    /// Playback action
    pub action: FrameAction,
}

/// Frame chained after another frame of the same batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubFrame {
    /// Frame id (owning object id)
    pub id: FrameId,
    /// Frame this one follows
    pub prev_frame_id: FrameId,
    /// Playback action
    pub action: FrameAction,
}

/// Any frame annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Batch head
    Cue(CueFrame),
    /// Chained frame
    Sub(SubFrame),
}

impl Frame {
    /// Frame id
    pub fn id(&self) -> &FrameId {
        match self {
            Frame::Cue(cue) => &cue.id,
            Frame::Sub(sub) => &sub.id,
        }
    }

    /// Playback action
    pub fn action(&self) -> &FrameAction {
        match self {
            Frame::Cue(cue) => &cue.action,
            Frame::Sub(sub) => &sub.action,
        }
    }

    /// Mutable playback action
    pub fn action_mut(&mut self) -> &mut FrameAction {
        match self {
            Frame::Cue(cue) => &mut cue.action,
            Frame::Sub(sub) => &mut sub.action,
        }
    }

    /// The cue frame, if this is one
    pub fn as_cue(&self) -> Option<&CueFrame> {
        match self {
            Frame::Cue(cue) => Some(cue),
            Frame::Sub(_) => None,
        }
    }

    /// The sub frame, if this is one
    pub fn as_sub(&self) -> Option<&SubFrame> {
        match self {
            Frame::Sub(sub) => Some(sub),
            Frame::Cue(_) => None,
        }
    }

    /// Decode a frame from its JSON value
    pub fn decode(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(SequencerError::InvalidFrame)
    }

    /// Encode the frame as a JSON value
    pub fn encode(&self) -> Value {
        // Serializing plain structs with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Read the frame stored in object metadata.
    ///
    /// Malformed annotations are treated as absent.
    pub fn from_meta(meta: &Map<String, Value>) -> Option<Self> {
        let value = meta.get(FRAME_META_KEY)?;
        if value.is_null() {
            return None;
        }
        match Self::decode(value) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::debug!(%err, "ignoring malformed frame annotation");
                None
            }
        }
    }
}

impl From<CueFrame> for Frame {
    fn from(cue: CueFrame) -> Self {
        Frame::Cue(cue)
    }
}

impl From<SubFrame> for Frame {
    fn from(sub: SubFrame) -> Self {
        Frame::Sub(sub)
    }
}
