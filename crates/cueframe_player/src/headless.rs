// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory canvas host.
//!
//! Stores objects in paint order, keeps an undo/redo history of recorded
//! changes and applies animations to their end state at once. Camera and
//! selection calls are logged so playback can be inspected without a
//! renderer.

use crate::error::HistoryError;
use crate::host::{AnimationOptions, CanvasHost, Checkpoint, HistoryMode, ZoomOptions};
use cueframe_sequencer::{Bounds, CanvasDocument, CanvasObject, ObjectId, Pose};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use uuid::Uuid;

/// Maximum undo history depth
const MAX_HISTORY: usize = 100;

/// Intermediate poses logged per animation
pub const ANIMATION_SAMPLES: usize = 8;

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// One recorded object change
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Changed object
    pub object_id: ObjectId,
    /// Paint-order position before the change
    pub position: usize,
    /// Object before the change, `None` when it was created
    pub before: Option<CanvasObject>,
    /// Object after the change, `None` when it was deleted
    pub after: Option<CanvasObject>,
}

/// Group of operations that are undone/redone together
#[derive(Debug, Clone, PartialEq)]
pub struct OperationGroup {
    /// Group ID, increasing in begin order
    pub id: u64,
    /// Human-readable description
    pub description: String,
    /// Operations in this group
    pub operations: Vec<Operation>,
}

impl OperationGroup {
    /// Create an empty group
    pub fn new(id: u64, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            operations: Vec::new(),
        }
    }

    /// Add an operation to this group
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Get operation count
    pub fn count(&self) -> usize {
        self.operations.len()
    }
}

/// Undo/redo stacks of object changes
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<OperationGroup>,
    redo_stack: VecDeque<OperationGroup>,
    /// Group collecting operations until the outermost `end_group`
    open: Option<OperationGroup>,
    depth: usize,
    next_id: u64,
    max_depth: usize,
}

impl History {
    /// Create a history with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            open: None,
            depth: 0,
            next_id: 1,
            max_depth,
        }
    }

    /// Id the next group will get
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Begin a new operation, returning its group id.
    ///
    /// Nested calls join the outermost group.
    pub fn begin_operation(&mut self, description: &str) -> u64 {
        self.depth += 1;
        if let Some(group) = &self.open {
            return group.id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.open = Some(OperationGroup::new(id, description));
        id
    }

    /// Close the innermost operation, committing the group when it was the outermost
    pub fn end_operation(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            if let Some(group) = self.open.take() {
                self.commit(group);
            }
        }
    }

    /// Whether an operation is open
    pub fn in_operation(&self) -> bool {
        self.open.is_some()
    }

    /// Record one operation, in the open group or as its own group
    pub fn record(&mut self, description: &str, operation: Operation) {
        if let Some(group) = &mut self.open {
            group.add_operation(operation);
            return;
        }
        self.begin_operation(description);
        if let Some(group) = &mut self.open {
            group.add_operation(operation);
        }
        self.end_operation();
    }

    /// Commit an operation group
    pub fn commit(&mut self, group: OperationGroup) {
        if group.operations.is_empty() {
            return;
        }
        self.redo_stack.clear();
        self.undo_stack.push_back(group);

        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Pop the group to undo
    pub fn undo(&mut self) -> Result<OperationGroup> {
        let group = self
            .undo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToUndo)?;
        self.redo_stack.push_back(group.clone());
        Ok(group)
    }

    /// Pop the group to redo
    pub fn redo(&mut self) -> Result<OperationGroup> {
        let group = self
            .redo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToRedo)?;
        self.undo_stack.push_back(group.clone());
        Ok(group)
    }

    /// Remove and return every group committed at or after `id`, newest first
    pub fn discard_from(&mut self, id: u64) -> Vec<OperationGroup> {
        let mut discarded = Vec::new();
        while self.undo_stack.back().is_some_and(|group| group.id >= id) {
            if let Some(group) = self.undo_stack.pop_back() {
                discarded.push(group);
            }
        }
        discarded
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|g| g.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

/// Something the headless host was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Object added
    Created {
        /// New object
        id: ObjectId,
        /// Its kind
        kind: String,
    },
    /// Object removed
    Deleted {
        /// Removed object
        id: ObjectId,
    },
    /// Object animated
    Animated {
        /// Animated object
        id: ObjectId,
        /// Target page pose
        target: Pose,
        /// Timing
        options: AnimationOptions,
        /// Page poses along the eased path, ending at `target`
        samples: Vec<Pose>,
    },
    /// Viewport fitted to bounds
    Zoomed {
        /// Target bounds
        bounds: Bounds,
        /// Timing and padding
        options: ZoomOptions,
    },
    /// Camera animation stopped
    CameraStopped,
    /// Selection cleared
    SelectionCleared,
}

/// In-memory [`CanvasHost`]
#[derive(Debug)]
pub struct HeadlessCanvas {
    page_id: ObjectId,
    objects: IndexMap<ObjectId, CanvasObject>,
    revision: u64,
    history: History,
    checkpoints: BTreeSet<u64>,
    viewport: Option<Bounds>,
    selection: Vec<ObjectId>,
    events: Vec<HostEvent>,
}

impl HeadlessCanvas {
    /// Create an empty page
    pub fn new() -> Self {
        Self {
            page_id: ObjectId::new("page:page"),
            objects: IndexMap::new(),
            revision: 0,
            history: History::new(),
            checkpoints: BTreeSet::new(),
            viewport: None,
            selection: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Create a page holding `objects`, outside the history
    pub fn with_objects(objects: impl IntoIterator<Item = CanvasObject>) -> Self {
        let mut canvas = Self::new();
        canvas.objects = objects
            .into_iter()
            .map(|object| (object.id.clone(), object))
            .collect();
        canvas
    }

    /// Load a document snapshot
    pub fn from_document(document: CanvasDocument) -> Self {
        Self::with_objects(document.objects)
    }

    /// Snapshot the page
    pub fn to_document(&self) -> CanvasDocument {
        CanvasDocument::new(self.objects.values().cloned().collect())
    }

    /// Recorded history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Undo the latest recorded change
    pub fn undo(&mut self) -> Result<()> {
        let group = self.history.undo()?;
        for operation in group.operations.iter().rev() {
            self.restore(&operation.object_id, operation.position, operation.before.clone());
        }
        Ok(())
    }

    /// Redo the latest undone change
    pub fn redo(&mut self) -> Result<()> {
        let group = self.history.redo()?;
        for operation in &group.operations {
            self.restore(&operation.object_id, operation.position, operation.after.clone());
        }
        Ok(())
    }

    /// Select objects
    pub fn select(&mut self, ids: impl IntoIterator<Item = ObjectId>) {
        self.selection = ids.into_iter().collect();
    }

    /// Current selection
    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    /// Bounds the viewport was last fitted to, inset included
    pub fn viewport(&self) -> Option<Bounds> {
        self.viewport
    }

    /// Everything the host was asked to do
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Drain the event log
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of live checkpoints
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    fn restore(&mut self, id: &ObjectId, position: usize, state: Option<CanvasObject>) {
        match state {
            Some(object) => {
                if let Some(existing) = self.objects.get_mut(id) {
                    *existing = object;
                } else {
                    let position = position.min(self.objects.len());
                    self.objects.shift_insert(position, id.clone(), object);
                }
            }
            None => {
                self.objects.shift_remove(id);
            }
        }
        self.revision += 1;
    }

    /// Apply a change and record it when asked to
    fn apply(&mut self, description: &str, id: &ObjectId, after: Option<CanvasObject>, mode: HistoryMode) {
        let position = self
            .objects
            .get_index_of(id)
            .unwrap_or(self.objects.len());
        let before = self.objects.get(id).cloned();
        if mode == HistoryMode::Record {
            self.history.record(
                description,
                Operation {
                    object_id: id.clone(),
                    position,
                    before,
                    after: after.clone(),
                },
            );
        }
        self.restore(id, position, after);
    }

    fn parent_pose(&self, object: &CanvasObject) -> Pose {
        match &object.parent_id {
            Some(parent) if parent != &self.page_id => {
                self.page_pose(parent).unwrap_or_default()
            }
            _ => Pose::default(),
        }
    }
}

impl Default for HeadlessCanvas {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_props(current: &mut Value, target: &Value) {
    match (current, target) {
        (Value::Object(current), Value::Object(target)) => {
            for (key, value) in target {
                current.insert(key.clone(), value.clone());
            }
        }
        (current, target) => *current = target.clone(),
    }
}

fn dimension(props: &Value, key: &str) -> f64 {
    props.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

impl CanvasHost for HeadlessCanvas {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn objects(&self) -> Vec<CanvasObject> {
        self.objects.values().cloned().collect()
    }

    fn object(&self, id: &ObjectId) -> Option<CanvasObject> {
        self.objects.get(id).cloned()
    }

    fn page_id(&self) -> ObjectId {
        self.page_id.clone()
    }

    fn new_object_id(&mut self) -> ObjectId {
        ObjectId(format!("shape:{}", Uuid::new_v4().simple()))
    }

    fn page_pose(&self, id: &ObjectId) -> Option<Pose> {
        let mut object = self.objects.get(id)?;
        let mut pose = object.pose();
        // Bounded walk, parent cycles end at the page.
        for _ in 0..self.objects.len() {
            let Some(parent) = object
                .parent_id
                .as_ref()
                .and_then(|parent| self.objects.get(parent))
            else {
                break;
            };
            pose = parent.pose().compose(pose);
            object = parent;
        }
        Some(pose)
    }

    fn page_bounds(&self, id: &ObjectId) -> Option<Bounds> {
        let object = self.objects.get(id)?;
        let pose = self.page_pose(id)?;
        let width = dimension(&object.props, "w");
        let height = dimension(&object.props, "h");
        let corners = [(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)];
        Bounds::from_points(
            corners
                .into_iter()
                .map(|(x, y)| pose.compose(Pose::new(x, y, 0.0)))
                .map(|corner| (corner.x, corner.y)),
        )
    }

    fn create_object(&mut self, object: CanvasObject, mode: HistoryMode) {
        self.events.push(HostEvent::Created {
            id: object.id.clone(),
            kind: object.kind.clone(),
        });
        let id = object.id.clone();
        self.apply("Create object", &id, Some(object), mode);
    }

    fn update_object(&mut self, object: CanvasObject, mode: HistoryMode) -> bool {
        if !self.objects.contains_key(&object.id) {
            return false;
        }
        let id = object.id.clone();
        self.apply("Update object", &id, Some(object), mode);
        true
    }

    fn delete_object(&mut self, id: &ObjectId, mode: HistoryMode) -> Option<CanvasObject> {
        let existing = self.objects.get(id).cloned()?;
        self.events.push(HostEvent::Deleted { id: id.clone() });
        self.selection.retain(|selected| selected != id);
        self.apply("Delete object", id, None, mode);
        Some(existing)
    }

    fn set_meta(&mut self, id: &ObjectId, key: &str, value: Option<Value>, mode: HistoryMode) -> bool {
        let Some(mut object) = self.objects.get(id).cloned() else {
            return false;
        };
        match value {
            Some(value) => {
                object.meta.insert(key.to_string(), value);
            }
            None => {
                if object.meta.remove(key).is_none() {
                    return true;
                }
            }
        }
        self.apply("Update metadata", id, Some(object), mode);
        true
    }

    fn animate_object(
        &mut self,
        id: &ObjectId,
        target: Pose,
        props: &Value,
        options: AnimationOptions,
        mode: HistoryMode,
    ) {
        let Some(mut object) = self.objects.get(id).cloned() else {
            return;
        };
        let from = self.page_pose(id).unwrap_or_default();
        let samples = (1..=ANIMATION_SAMPLES)
            .map(|step| from.lerp(target, options.easing.apply(step as f64 / ANIMATION_SAMPLES as f64)))
            .collect();
        self.events.push(HostEvent::Animated {
            id: id.clone(),
            target,
            options,
            samples,
        });
        let local = self.parent_pose(&object).localize(target);
        object.set_pose(local);
        merge_props(&mut object.props, props);
        self.apply("Animate object", id, Some(object), mode);
    }

    fn zoom_to_bounds(&mut self, bounds: Bounds, options: ZoomOptions) {
        self.viewport = Some(bounds.expanded(options.inset));
        self.events.push(HostEvent::Zoomed { bounds, options });
    }

    fn stop_camera_animation(&mut self) {
        self.events.push(HostEvent::CameraStopped);
    }

    fn select_none(&mut self) {
        self.selection.clear();
        self.events.push(HostEvent::SelectionCleared);
    }

    fn begin_group(&mut self, description: &str) {
        self.history.begin_operation(description);
    }

    fn end_group(&mut self) {
        self.history.end_operation();
    }

    fn mark_checkpoint(&mut self) -> Checkpoint {
        let id = self.history.next_id();
        self.checkpoints.insert(id);
        Checkpoint(id)
    }

    fn bail_to_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<()> {
        if !self.checkpoints.contains(&checkpoint.0) {
            return Err(HistoryError::UnknownCheckpoint(checkpoint.0));
        }
        for group in self.history.discard_from(checkpoint.0) {
            for operation in group.operations.iter().rev() {
                self.restore(&operation.object_id, operation.position, operation.before.clone());
            }
        }
        self.checkpoints.retain(|id| *id < checkpoint.0);
        Ok(())
    }
}
