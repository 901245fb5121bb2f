//! Project and session configuration records.
//!
//! Both records are typed TOML documents. Saves go through a temp file in
//! the same directory followed by a rename, so a crashed write never leaves
//! a half-written record behind. Reads always come from disk; callers that
//! mutate a record re-load it first so a write from earlier in the same run
//! is observed.

use crate::defaults;
use crate::error::{ChitterError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Project-level record, one per project root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Registered session ids in registration order. No duplicates.
    pub sessions: Vec<String>,
    /// URL of the git repository the project publishes through.
    pub repository_url: String,
    /// Route transcoder invocations through an isolated sandbox.
    pub use_sandbox_for_transcode: bool,
}

/// Kind of raw audio source found in a session directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioSourceKind {
    /// Headerless interleaved little-endian i16 container.
    MultiChannelRaw { channels: usize },
    /// Plain single-file WAV.
    SingleFileWav,
}

/// Raw audio descriptor derived at registration time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioDescriptor {
    /// Source file name, relative to the session directory.
    pub source: String,
    pub sample_rate_hz: f64,
    pub duration_sec: f64,
    #[serde(flatten)]
    pub source_kind: AudioSourceKind,
}

/// Raw video descriptor, filled in by the video stage probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoDescriptor {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
}

/// Session-level record, one per session directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Session id; equals the directory name.
    pub session_id: String,
    pub audio: Option<AudioDescriptor>,
    pub video: Option<VideoDescriptor>,
    /// Published URI of the transcoded video, set by the video stage.
    pub video_uri: Option<String>,
    /// Detection frequency band, inclusive-exclusive bin range.
    pub detect_freq_band: Option<(usize, usize)>,
}

impl SessionConfig {
    /// Detection band for this session, falling back to the default band.
    pub fn freq_band(&self) -> (usize, usize) {
        self.detect_freq_band.unwrap_or(defaults::DETECT_FREQ_BAND)
    }
}

impl ProjectConfig {
    pub fn path(root: &Path) -> PathBuf {
        root.join(defaults::PROJECT_CONFIG_NAME)
    }

    /// Load the project record, failing if it does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        load_toml(&Self::path(root))
    }

    /// Atomically persist the project record.
    pub fn save(&self, root: &Path) -> Result<()> {
        save_toml(&Self::path(root), self)
    }
}

impl SessionConfig {
    pub fn path(session_dir: &Path) -> PathBuf {
        session_dir.join(defaults::SESSION_CONFIG_NAME)
    }

    /// Load the session record, failing if it does not exist.
    pub fn load(session_dir: &Path) -> Result<Self> {
        load_toml(&Self::path(session_dir))
    }

    /// Atomically persist the session record.
    pub fn save(&self, session_dir: &Path) -> Result<()> {
        save_toml(&Self::path(session_dir), self)
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ChitterError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Write to a temp file in the target directory, then rename over the
/// destination. Rename within one directory is atomic on POSIX.
fn save_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let serialized = toml::to_string_pretty(value)?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, serialized)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
