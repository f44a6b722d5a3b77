// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serializable snapshot of a canvas page.

use crate::batch::{derive_steps, Step};
use crate::error::{Result, SequencerError};
use crate::frame::Frame;
use crate::object::{CanvasObject, ObjectId};
use serde::{Deserialize, Serialize};

/// Objects of one page with their frame annotations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasDocument {
    /// Objects in paint order
    #[serde(default)]
    pub objects: Vec<CanvasObject>,
}

impl CanvasDocument {
    /// Create a document from objects
    pub fn new(objects: Vec<CanvasObject>) -> Self {
        Self { objects }
    }

    /// Parse a JSON snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(SequencerError::InvalidDocument)
    }

    /// Write a pretty JSON snapshot
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(SequencerError::InvalidDocument)
    }

    /// Look up an object
    pub fn object(&self, id: &ObjectId) -> Option<&CanvasObject> {
        self.objects.iter().find(|object| &object.id == id)
    }

    /// Every valid frame annotation
    pub fn frames(&self) -> Vec<Frame> {
        self.objects.iter().filter_map(CanvasObject::frame).collect()
    }

    /// Ordered steps of the document
    pub fn steps(&self) -> Vec<Step> {
        derive_steps(&self.frames())
    }

    /// Number of steps, without any host
    pub fn total_steps(&self) -> usize {
        self.steps().len()
    }
}
