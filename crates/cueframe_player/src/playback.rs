// SPDX-License-Identifier: MIT OR Apache-2.0
//! Step navigation and playback.
//!
//! A step runs as one tokio task. Its batches are polled together, each
//! walking its frame chain in order and waiting out every frame's duration.
//! Shape animations play on a disposable stand-in object while the real
//! objects of the batch are flagged hidden. All playback mutations bypass the
//! host history, and the history is rolled back to the checkpoint taken at
//! step start once every batch settled.
//!
//! Navigation is last-wins: starting a step supersedes any step still
//! running. Superseded runs stop at their next wait and leave cleanup to the
//! new run, which rolls back the old checkpoint and removes every leftover
//! stand-in and hidden flag first.
//!
//! The rollback restores recorded snapshots, which may still carry a hidden
//! flag or a stand-in. Everything a run ever flagged or created is therefore
//! cleaned again right after the rollback, under the same host lock.

use crate::config::PlayerConfig;
use crate::error::PlaybackError;
use crate::host::{AnimationOptions, CanvasHost, Checkpoint, HistoryMode, SharedHost, ZoomOptions};
use cueframe_sequencer::{
    BatchId, FrameAction, FrameBatch, FrameId, ObjectId, ShapeVisibility, Step, StepCache, TrackId,
    VisibilityRules,
};
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stand-ins, hidden flags and the checkpoint owned by the current run
#[derive(Debug, Default)]
pub struct Transients {
    /// Live stand-ins
    stand_ins: HashSet<ObjectId>,
    /// Live hidden flags
    hidden: HashSet<ObjectId>,
    /// Every stand-in the run created
    created: HashSet<ObjectId>,
    /// Every object the run flagged
    flagged: HashSet<ObjectId>,
    checkpoint: Option<Checkpoint>,
}

impl Transients {
    /// Nothing left on the canvas
    pub fn is_empty(&self) -> bool {
        self.stand_ins.is_empty() && self.hidden.is_empty()
    }

    fn add_stand_in(&mut self, id: &ObjectId) {
        self.stand_ins.insert(id.clone());
        self.created.insert(id.clone());
    }

    fn add_hidden(&mut self, id: &ObjectId) {
        self.hidden.insert(id.clone());
        self.flagged.insert(id.clone());
    }

    /// Roll back to the run's checkpoint, then remove every stand-in and
    /// hidden flag the run ever produced, including ones the rollback restored
    fn release<H: CanvasHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(checkpoint) = self.checkpoint.take() {
            if let Err(err) = host.bail_to_checkpoint(checkpoint) {
                tracing::warn!(checkpoint = checkpoint.0, %err, "history rollback failed");
            }
        }
        if !self.created.is_empty() || !self.flagged.is_empty() {
            tracing::debug!(
                stand_ins = self.created.len(),
                hidden = self.flagged.len(),
                "releasing playback transients"
            );
        }
        for id in self.stand_ins.drain().chain(self.created.drain()) {
            if host.object(&id).is_some() {
                host.delete_object(&id, HistoryMode::Ignore);
            }
        }
        for id in self.hidden.drain().chain(self.flagged.drain()) {
            if host
                .object(&id)
                .is_some_and(|object| object.is_hidden_during_animation())
            {
                host.set_hidden_during_animation(&id, false, HistoryMode::Ignore);
            }
        }
    }
}

/// Outcome of one step execution
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Executed step
    pub index: usize,
    /// Number of batches in the step
    pub batches: usize,
    /// Batches that ran to the end
    pub completed: Vec<BatchId>,
    /// Batches that stopped early, with the reason
    pub failed: Vec<(BatchId, PlaybackError)>,
    /// A newer navigation took over before the step settled
    pub superseded: bool,
}

impl StepReport {
    /// Every batch completed and the step was not superseded
    pub fn is_success(&self) -> bool {
        !self.superseded && self.failed.is_empty()
    }
}

/// Handle to a running step
#[derive(Debug)]
pub struct StepRun {
    index: usize,
    handle: JoinHandle<StepReport>,
}

impl StepRun {
    /// Step being executed
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the step task has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the step to settle
    pub async fn finished(self) -> Result<StepReport, PlaybackError> {
        self.handle
            .await
            .map_err(|err| PlaybackError::TaskFailed(err.to_string()))
    }
}

/// Everything a step task needs
struct StepContext<H: CanvasHost> {
    host: SharedHost<H>,
    transients: Arc<Mutex<Transients>>,
    generation: u64,
    latest: watch::Receiver<u64>,
}

impl<H: CanvasHost> StepContext<H> {
    fn is_current(&self) -> bool {
        *self.latest.borrow() == self.generation
    }

    /// Run `f` on the host unless a newer navigation took over.
    ///
    /// The check happens under the host lock, the same lock a new navigation
    /// holds while it releases transients, so no mutation can land after that.
    fn with_host<R>(
        &self,
        f: impl FnOnce(&mut H, &mut Transients) -> R,
    ) -> Result<R, PlaybackError> {
        let mut host = self.host.lock();
        if !self.is_current() {
            return Err(PlaybackError::Superseded);
        }
        let mut transients = self.transients.lock();
        Ok(f(&mut host, &mut transients))
    }

    /// Sleep for `duration`, returning early when superseded
    async fn wait(&self, duration: Duration) -> Result<(), PlaybackError> {
        if !duration.is_zero() {
            let mut latest = self.latest.clone();
            let generation = self.generation;
            let superseded = async move {
                if latest.wait_for(|value| *value != generation).await.is_err() {
                    // Presenter dropped: nothing can supersede this run any more.
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                () = tokio::time::sleep(duration) => {}
                () = superseded => {}
            }
        }
        if self.is_current() {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }
}

fn resolve<H: CanvasHost + ?Sized>(host: &H, frame: &FrameId) -> Result<ObjectId, PlaybackError> {
    host.object_by_frame_id(frame)
        .map(|object| object.id)
        .ok_or_else(|| PlaybackError::MissingObject(frame.clone()))
}

/// Last frame of the latest batch of `track` before step `index`
fn track_head_before<'a>(steps: &'a [Step], index: usize, track: &TrackId) -> Option<&'a FrameId> {
    steps[..index.min(steps.len())]
        .iter()
        .rev()
        .flatten()
        .find(|batch| batch.track_id() == track)
        .map(FrameBatch::last_frame_id)
}

fn zoom_to_frame<H: CanvasHost + ?Sized>(
    host: &mut H,
    frame: &FrameId,
    inset: f64,
    timing: AnimationOptions,
) -> Result<ObjectId, PlaybackError> {
    let target = resolve(host, frame)?;
    host.stop_camera_animation();
    let bounds = host
        .page_bounds(&target)
        .ok_or_else(|| PlaybackError::MissingBounds(target.clone()))?;
    host.select_none();
    host.zoom_to_bounds(
        bounds,
        ZoomOptions {
            inset,
            duration: timing.duration,
            easing: timing.easing,
        },
    );
    Ok(target)
}

/// Start a shape animation, returning the target and the stand-in playing it
fn animate_frame<H: CanvasHost + ?Sized>(
    host: &mut H,
    transients: &mut Transients,
    frame: &FrameId,
    predecessor: Option<&ObjectId>,
    timing: AnimationOptions,
) -> Result<(ObjectId, Option<ObjectId>), PlaybackError> {
    host.select_none();
    let target_id = resolve(host, frame)?;
    let Some(predecessor) = predecessor else {
        return Ok((target_id, None));
    };

    let target = host
        .object(&target_id)
        .ok_or_else(|| PlaybackError::MissingObject(frame.clone()))?;
    let source = host
        .object(predecessor)
        .ok_or_else(|| PlaybackError::MissingPose(predecessor.clone()))?;
    let from = host
        .page_pose(predecessor)
        .ok_or_else(|| PlaybackError::MissingPose(predecessor.clone()))?;
    let to = host
        .page_pose(&target_id)
        .ok_or_else(|| PlaybackError::MissingPose(target_id.clone()))?;

    let mut stand_in = source;
    stand_in.id = host.new_object_id();
    stand_in.kind = target.kind.clone();
    stand_in.parent_id = Some(host.page_id());
    stand_in.meta = Map::new();
    stand_in.set_pose(from);
    let stand_in_id = stand_in.id.clone();

    host.create_object(stand_in, HistoryMode::Ignore);
    transients.add_stand_in(&stand_in_id);
    host.animate_object(&stand_in_id, to, &target.props, timing, HistoryMode::Ignore);
    Ok((target_id, Some(stand_in_id)))
}

fn remove_stand_in<H: CanvasHost + ?Sized>(host: &mut H, transients: &mut Transients, id: &ObjectId) {
    if transients.stand_ins.remove(id) {
        host.delete_object(id, HistoryMode::Ignore);
    }
}

async fn run_frames<H: CanvasHost>(
    ctx: &StepContext<H>,
    batch: &FrameBatch,
    mut predecessor: Option<ObjectId>,
    stand_ins: &mut Vec<ObjectId>,
) -> Result<(), PlaybackError> {
    for (frame, action) in batch.chain() {
        let timing = AnimationOptions {
            duration: action.duration(),
            easing: action.easing(),
        };

        let (target, stand_in) = match action {
            FrameAction::CameraZoom { .. } => {
                let target =
                    ctx.with_host(|host, _| zoom_to_frame(host, frame, action.inset(), timing))??;
                (target, None)
            }
            FrameAction::ShapeAnimation { .. } => {
                let from = predecessor.clone();
                let started = ctx.with_host(|host, transients| {
                    animate_frame(host, transients, frame, from.as_ref(), timing)
                })??;
                if from.is_none() {
                    // First frame of the track: nothing to animate from.
                    predecessor = Some(started.0);
                    continue;
                }
                started
            }
        };

        if let Some(id) = &stand_in {
            stand_ins.push(id.clone());
        }
        ctx.wait(timing.duration).await?;
        if let Some(id) = stand_in {
            ctx.with_host(|host, transients| remove_stand_in(host, transients, &id))?;
            stand_ins.retain(|existing| existing != &id);
        }
        predecessor = Some(target);
    }
    Ok(())
}

async fn run_batch<H: CanvasHost>(
    ctx: &StepContext<H>,
    steps: &[Step],
    index: usize,
    batch: &FrameBatch,
) -> Result<(), PlaybackError> {
    let (predecessor, hidden) = ctx.with_host(|host, transients| {
        let predecessor = track_head_before(steps, index, batch.track_id())
            .and_then(|frame| host.object_by_frame_id(frame))
            .map(|object| object.id);

        let mut hidden = Vec::new();
        for frame in batch.frame_ids() {
            let Some(object) = host.object_by_frame_id(frame) else {
                continue;
            };
            if host.set_hidden_during_animation(&object.id, true, HistoryMode::Ignore) {
                transients.add_hidden(&object.id);
                hidden.push(object.id);
            }
        }
        (predecessor, hidden)
    })?;

    let mut stand_ins = Vec::new();
    let result = run_frames(ctx, batch, predecessor, &mut stand_ins).await;

    if result != Err(PlaybackError::Superseded) {
        let cleaned = ctx.with_host(|host, transients| {
            for id in &stand_ins {
                remove_stand_in(host, transients, id);
            }
            for id in &hidden {
                if transients.hidden.remove(id) {
                    host.set_hidden_during_animation(id, false, HistoryMode::Ignore);
                }
            }
        });
        if cleaned.is_err() {
            tracing::debug!(batch = %batch.id, "superseded before cleanup");
            return Err(PlaybackError::Superseded);
        }
    }
    result
}

async fn run_step<H: CanvasHost>(
    ctx: StepContext<H>,
    steps: Arc<Vec<Step>>,
    index: usize,
) -> StepReport {
    let step: &[FrameBatch] = steps.get(index).map(Vec::as_slice).unwrap_or_default();
    tracing::info!(step = index, batches = step.len(), "running step");

    let results = join_all(
        step.iter()
            .map(|batch| run_batch(&ctx, &steps, index, batch)),
    )
    .await;

    let mut report = StepReport {
        index,
        batches: step.len(),
        completed: Vec::new(),
        failed: Vec::new(),
        superseded: false,
    };
    for (batch, result) in step.iter().zip(results) {
        match result {
            Ok(()) => report.completed.push(batch.id.clone()),
            Err(PlaybackError::Superseded) => report.superseded = true,
            Err(err) => {
                tracing::warn!(step = index, batch = %batch.id, %err, "batch aborted");
                report.failed.push((batch.id.clone(), err));
            }
        }
    }

    if ctx
        .with_host(|host, transients| transients.release(host))
        .is_err()
    {
        report.superseded = true;
    }

    if report.superseded {
        tracing::debug!(step = index, "step superseded");
    } else {
        tracing::info!(
            step = index,
            completed = report.completed.len(),
            failed = report.failed.len(),
            "step settled"
        );
    }
    report
}

/// Presentation navigator over a shared host
pub struct Presenter<H: CanvasHost> {
    host: SharedHost<H>,
    rules: VisibilityRules,
    cache: StepCache,
    current: watch::Sender<usize>,
    generation: watch::Sender<u64>,
    transients: Arc<Mutex<Transients>>,
}

impl<H: CanvasHost> Presenter<H> {
    /// Create a presenter at step 0 with default object kinds
    pub fn new(host: SharedHost<H>) -> Self {
        Self::with_rules(host, VisibilityRules::default())
    }

    /// Create a presenter using the kinds from `config`
    pub fn with_config(host: SharedHost<H>, config: &PlayerConfig) -> Self {
        Self::with_rules(host, config.visibility_rules())
    }

    /// Create a presenter with explicit visibility rules
    pub fn with_rules(host: SharedHost<H>, rules: VisibilityRules) -> Self {
        let (current, _) = watch::channel(0);
        let (generation, _) = watch::channel(0);
        Self {
            host,
            rules,
            cache: StepCache::new(),
            current,
            generation,
            transients: Arc::new(Mutex::new(Transients::default())),
        }
    }

    /// The shared host
    pub fn host(&self) -> SharedHost<H> {
        Arc::clone(&self.host)
    }

    /// Current step index
    pub fn current_step(&self) -> usize {
        *self.current.borrow()
    }

    /// Observe the current step index
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.current.subscribe()
    }

    /// Ordered steps, derived again only when the host changed
    pub fn steps(&mut self) -> Arc<Vec<Step>> {
        let host = self.host.lock();
        self.cache.get_or_derive(host.revision(), || host.frames())
    }

    /// Number of steps
    pub fn total_steps(&mut self) -> usize {
        self.steps().len()
    }

    /// Whether playback currently owns stand-ins or hidden flags
    pub fn has_transients(&self) -> bool {
        !self.transients.lock().is_empty()
    }

    /// Navigate to a step.
    ///
    /// The index is clamped to the last step. Returns `None` without running
    /// anything when there are no steps or the clamped index is already current.
    pub fn move_to(&mut self, index: usize) -> Option<StepRun> {
        let total = self.total_steps();
        if total == 0 {
            tracing::debug!("no steps to navigate");
            return None;
        }
        let target = index.min(total - 1);
        if target == self.current_step() {
            return None;
        }
        self.current.send_replace(target);
        tracing::info!(step = target, total, "navigating");
        self.execute_step(target)
    }

    /// Navigate to the step computed from the current one
    pub fn move_with(&mut self, update: impl FnOnce(usize) -> usize) -> Option<StepRun> {
        let target = update(self.current_step());
        self.move_to(target)
    }

    /// Navigate relative to the current step
    pub fn move_by(&mut self, delta: isize) -> Option<StepRun> {
        self.move_with(|current| current.saturating_add_signed(delta))
    }

    /// Navigate to the next step
    pub fn next_step(&mut self) -> Option<StepRun> {
        self.move_by(1)
    }

    /// Navigate to the previous step
    pub fn previous_step(&mut self) -> Option<StepRun> {
        self.move_by(-1)
    }

    /// Run the current step again
    pub fn rerun_step(&mut self) -> Option<StepRun> {
        let current = self.current_step();
        self.execute_step(current)
    }

    /// Execute a step without changing the current index.
    ///
    /// Returns `None` when the step does not exist. Must be called within a
    /// tokio runtime.
    pub fn execute_step(&mut self, index: usize) -> Option<StepRun> {
        let steps = self.steps();
        if steps.get(index).is_none() {
            tracing::warn!(step = index, total = steps.len(), "no step at index");
            return None;
        }

        let generation = {
            let mut host = self.host.lock();
            let mut generation = 0;
            self.generation.send_modify(|value| {
                *value += 1;
                generation = *value;
            });
            let mut transients = self.transients.lock();
            transients.release(&mut *host);
            transients.checkpoint = Some(host.mark_checkpoint());
            generation
        };

        let ctx = StepContext {
            host: Arc::clone(&self.host),
            transients: Arc::clone(&self.transients),
            generation,
            latest: self.generation.subscribe(),
        };
        let handle = tokio::spawn(run_step(ctx, steps, index));
        Some(StepRun { index, handle })
    }

    /// Visibility of every object at the current step
    pub fn visibilities(&mut self) -> IndexMap<ObjectId, ShapeVisibility> {
        let steps = self.steps();
        let objects = self.host.lock().objects();
        self.rules
            .shape_visibilities(&objects, &steps, self.current_step())
    }
}
