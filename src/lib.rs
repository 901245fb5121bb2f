//! chitter - session derivation pipeline for synchronized audio/video
//! recordings of animal vocalizations.
//!
//! A project is a directory of recording sessions. Each session derives a
//! chain of artifacts from its raw media: transcoded video, spectrogram
//! blob, auto-detected vocalization segments, and a browsable visualization
//! bundle. Artifacts are rebuilt only when missing or explicitly forced;
//! rebuilding one invalidates everything downstream of it.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod annotations;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod detect;
pub mod error;
pub mod levels;
pub mod matrix;
pub mod pipeline;
pub mod probe;
pub mod project;
pub mod publish;
pub mod query;
pub mod spectrogram;
pub mod stage;
pub mod transcode;

// Detection core
pub use detect::{DetectorParams, Segment, detect, segments_from_table};
pub use matrix::EnergyMatrix;

// Staging and pipeline
pub use pipeline::{Collaborators, RunReport, run_all, run_session};
pub use stage::{Stage, StagePlan, StagePresence, UpdateOpts, plan};

// Collaborator seams
pub use probe::{FfprobeVideoProbe, VideoProbe};
pub use publish::{LocalBlobStore, Publisher};
pub use transcode::{FfmpegTranscoder, Transcoder};

// Error handling
pub use error::{ChitterError, Result};

// Config
pub use config::{ProjectConfig, SessionConfig};
