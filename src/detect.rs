//! Vocalization segment detection.
//!
//! Converts a time x frequency energy matrix into discrete labeled time
//! intervals. Pure computation, no I/O: the pipeline hands in a matrix read
//! from the spectrogram blob and persists whatever comes back.

use crate::defaults;
use crate::matrix::EnergyMatrix;
use serde::{Deserialize, Serialize};

/// One detected or imported vocalization interval.
///
/// Frame bounds use the half-open convention: `start_frame` inclusive,
/// `end_frame` exclusive. Serialized field names match the annotation bundle
/// wire format consumed by the visualization GUI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub vocalization_id: String,
    pub start_frame: usize,
    pub end_frame: usize,
    pub labels: Vec<String>,
}

/// Tuning parameters for [`detect`].
///
/// The defaults reproduce the behavior the recording rigs were calibrated
/// against; every knob is overridable per session through config.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    /// Restrict detection to this bin range (inclusive-exclusive) before
    /// thresholding. `None` means the matrix is already band-limited
    /// upstream.
    pub freq_band: Option<(usize, usize)>,
    /// Adaptive threshold percentile. Values at or below the percentile are
    /// zeroed before the scan. `None` skips thresholding (the matrix was
    /// already zeroed upstream).
    pub threshold_percentile: Option<f64>,
    /// Silent gap, in frames, tolerated inside one vocalization.
    pub max_gap_frames: usize,
    /// Minimum active span, in frames, for a run to be emitted.
    pub min_size_frames: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            freq_band: None,
            threshold_percentile: Some(defaults::DETECT_THRESHOLD_PERCENTILE),
            max_gap_frames: defaults::DETECT_MAX_GAP_FRAMES,
            min_size_frames: defaults::DETECT_MIN_SIZE_FRAMES,
        }
    }
}

/// Detect vocalization segments in an energy matrix.
///
/// Single left-to-right pass over the frame axis. A potential vocalization
/// opens on the first frame whose max-over-frequency intensity is non-zero
/// and is only closed once `max_gap_frames` consecutive silent frames have
/// elapsed since the last active frame. Closed runs shorter than
/// `min_size_frames` are discarded. Emitted segments carry sequential ids
/// `auto-0, auto-1, ...` and the singleton label `"auto"`.
///
/// A run still open when the matrix ends is never emitted, even when it
/// would satisfy the minimum span. Trailing vocalizations are therefore
/// dropped; this matches the calibrated behavior and is kept deliberately.
pub fn detect(matrix: &EnergyMatrix, params: &DetectorParams) -> Vec<Segment> {
    let banded;
    let matrix = match params.freq_band {
        Some((lo, hi)) => {
            banded = matrix.band(lo, hi);
            &banded
        }
        None => matrix,
    };
    let thresholded;
    let matrix = match params.threshold_percentile {
        Some(pct) => {
            thresholded = matrix.zero_below(matrix.percentile(pct));
            &thresholded
        }
        None => matrix,
    };

    let mut segments = Vec::new();
    let mut start_frame: Option<usize> = None;
    let mut last_active_frame: Option<usize> = None;

    for i in 0..matrix.num_frames() {
        if matrix.max_over_bins(i) > 0 {
            if start_frame.is_none() {
                start_frame = Some(i);
            }
            last_active_frame = Some(i);
        } else if let (Some(start), Some(last_active)) = (start_frame, last_active_frame) {
            if i - last_active >= params.max_gap_frames {
                if last_active - start >= params.min_size_frames {
                    segments.push(Segment {
                        vocalization_id: format!("auto-{}", segments.len()),
                        start_frame: start,
                        end_frame: last_active + 1,
                        labels: vec!["auto".to_string()],
                    });
                }
                start_frame = None;
                last_active_frame = None;
            }
        }
    }

    segments
}

/// Convert a hand-labeled interval table into segments.
///
/// Each row is `(start_sec, end_sec)`; times are converted to frame indices
/// by multiplying by `sampling_frequency` and truncating. Row index becomes
/// the segment id and the label set is left empty, which marks the segment
/// as curated rather than machine-generated.
pub fn segments_from_table(rows: &[(f64, f64)], sampling_frequency: f64) -> Vec<Segment> {
    rows.iter()
        .enumerate()
        .map(|(i, &(start_sec, end_sec))| Segment {
            vocalization_id: i.to_string(),
            start_frame: (start_sec * sampling_frequency) as usize,
            end_frame: (end_sec * sampling_frequency) as usize,
            labels: Vec::new(),
        })
        .collect()
}
