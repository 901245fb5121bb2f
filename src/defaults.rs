//! Default configuration constants for chitter.
//!
//! Every tuning constant in the derivation pipeline lives here so the values
//! are named, documented, and overridable through config rather than buried
//! at call sites.

/// Percentile used as the adaptive intensity threshold inside segment
/// detection (0-100).
///
/// The threshold adapts to each recording's noise floor instead of being a
/// fixed intensity, so recordings with different gain settings detect
/// comparably. Values at or below the threshold are treated as silence.
pub const DETECT_THRESHOLD_PERCENTILE: f64 = 99.8;

/// Maximum silent gap, in spectrogram frames, tolerated inside a single
/// vocalization.
///
/// A run of active frames is only closed once this many consecutive
/// below-threshold frames have elapsed, which absorbs short dropouts in the
/// middle of one call.
pub const DETECT_MAX_GAP_FRAMES: usize = 20;

/// Minimum active span, in spectrogram frames, for a detected run to be
/// emitted as a segment. Shorter runs are discarded silently.
pub const DETECT_MIN_SIZE_FRAMES: usize = 10;

/// Default frequency band (inclusive-exclusive bin range) examined by
/// detection. Mouse ultrasonic vocalizations concentrate in this band for
/// the recording setup the defaults were tuned on.
pub const DETECT_FREQ_BAND: (usize, usize) = (130, 230);

/// FFT window length for spectrogram computation.
pub const SPECTROGRAM_NFFT: usize = 512;

/// Overlap between consecutive FFT windows. The hop is `NFFT - overlap`.
pub const SPECTROGRAM_NOVERLAP: usize = 256;

/// Percentile cutoff (0-100) applied to the display matrix within the
/// detection band. Values at or below the cutoff are zeroed, which affects
/// both detection and compressed artifact size.
pub const DISPLAY_THRESHOLD_PERCENTILE: f64 = 95.0;

/// Window length in seconds for the display-max estimator.
///
/// The display matrix is scaled against the median of per-window maxima
/// rather than the global maximum so that a single loud transient does not
/// wash out the rest of the recording.
pub const DISPLAY_MAXVAL_CHUNK_SEC: f64 = 15.0;

/// Temporal downsampling base for preview levels. Level k pools
/// `DOWNSAMPLE_BASE^k` frames into one.
pub const DOWNSAMPLE_BASE: usize = 3;

/// Downsampling stops once a level would hold fewer frames than this.
pub const DOWNSAMPLE_MIN_FRAMES: usize = 512;

/// Frames per compressed chunk in the preview level store.
pub const LEVEL_CHUNK_FRAMES: usize = 2048;

/// Channel count assumed for multi-channel raw audio containers that carry
/// no header.
pub const RAW_AUDIO_CHANNELS: usize = 4;

/// Default sampling rate assumed for raw audio containers when the session
/// record does not override it.
pub const RAW_AUDIO_SR_HZ: f64 = 250_000.0;

/// Project configuration file name, one per project root.
pub const PROJECT_CONFIG_NAME: &str = "chitter-project.toml";

/// Session configuration file name, one per session directory.
pub const SESSION_CONFIG_NAME: &str = "chitter-session.toml";

/// Placeholder repository URL written on first init.
pub const REPOSITORY_URL_PLACEHOLDER: &str = "https://github.com/<user>/<repo>";
