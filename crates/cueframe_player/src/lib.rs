// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host seam, frame editing and step playback for cueframe presentations.
//!
//! - [`CanvasHost`]: what the player needs from a canvas
//! - [`Annotator`]: attaching, duplicating, moving and repairing frames
//! - [`Presenter`]: step navigation and concurrent batch playback
//! - [`HeadlessCanvas`]: in-memory host with undo/redo history
//! - [`PlayerConfig`]: RON settings
//!
//! ## Playback
//!
//! Each step runs on a tokio task. Animations play on stand-in objects while
//! the real ones are flagged hidden, and everything playback touched is
//! rolled back through the host history when the step settles.

pub mod annotations;
pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod playback;

pub use annotations::Annotator;
pub use config::{CopyOffset, PlayerConfig, CONFIG_FILE_NAME, CONFIG_FORMAT_VERSION};
pub use error::{AnnotationError, ConfigError, HistoryError, PlaybackError};
pub use headless::{HeadlessCanvas, History, HostEvent};
pub use host::{share, AnimationOptions, CanvasHost, Checkpoint, HistoryMode, SharedHost, ZoomOptions};
pub use playback::{Presenter, StepReport, StepRun};
