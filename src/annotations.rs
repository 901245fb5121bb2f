//! Annotation bundle: the per-session list of vocalization segments.
//!
//! One JSON document per session, overwritten wholesale on every
//! recomputation or import; there is no incremental merge. Segment bounds
//! are accepted as stored, minimum-size filtering only happens inside
//! detection.

use crate::detect::Segment;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the annotation bundle inside a session directory.
pub const BUNDLE_NAME: &str = "annotations.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationBundle {
    /// Sampling frequency of the frame axis the segment bounds refer to.
    pub sampling_frequency: f64,
    pub vocalizations: Vec<Segment>,
}

impl AnnotationBundle {
    pub fn path(session_dir: &Path) -> PathBuf {
        session_dir.join(BUNDLE_NAME)
    }

    pub fn load(session_dir: &Path) -> Result<Self> {
        let contents = fs::read_to_string(Self::path(session_dir))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Atomically overwrite the session's bundle.
    pub fn save(&self, session_dir: &Path) -> Result<()> {
        let path = Self::path(session_dir);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec(self)?)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
