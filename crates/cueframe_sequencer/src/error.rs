// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequencer errors.

use thiserror::Error;

/// Errors raised while decoding annotations and documents
#[derive(Debug, Error)]
pub enum SequencerError {
    /// A frame annotation did not match the frame schema
    #[error("Invalid frame annotation: {0}")]
    InvalidFrame(#[source] serde_json::Error),

    /// A document snapshot could not be read or written
    #[error("Invalid document: {0}")]
    InvalidDocument(#[source] serde_json::Error),
}

/// Result type for sequencer operations
pub type Result<T> = std::result::Result<T, SequencerError>;
