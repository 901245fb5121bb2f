//! Per-session staging: which pipeline stages must run.
//!
//! Artifact presence on disk is the "already computed" marker; there is no
//! separate manifest. Stages form a fixed dependency chain, and re-running
//! an earlier stage marks every later stage dirty regardless of its own
//! artifact check.

use crate::annotations::BUNDLE_NAME;
use crate::error::{ChitterError, Result};
use crate::levels::LEVELS_NAME;
use crate::spectrogram::BLOB_NAME;
use std::path::Path;

/// Pipeline stages in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    VideoTranscode,
    Spectrogram,
    Detection,
    GuiBundle,
}

impl Stage {
    /// Artifact file whose presence marks the stage as computed.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Stage::VideoTranscode => "video.ogv",
            Stage::Spectrogram => BLOB_NAME,
            Stage::Detection => BUNDLE_NAME,
            Stage::GuiBundle => "gui_data.uri",
        }
    }

    pub fn is_present(&self, session_dir: &Path) -> bool {
        session_dir.join(self.artifact_name()).exists()
    }
}

/// Force flags for one `update` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOpts {
    pub redo_spectrograms: bool,
    pub redo_video_conversion: bool,
    pub no_vocalization_detection: bool,
    pub redo_vocalization_detection: bool,
}

impl UpdateOpts {
    /// Validate the flag combination before any stage runs.
    ///
    /// Redoing spectrograms invalidates any existing detection result, so
    /// the caller must say what happens to detection: exactly one of
    /// `no_vocalization_detection` / `redo_vocalization_detection`.
    pub fn validate(&self) -> Result<()> {
        if self.redo_spectrograms
            && self.no_vocalization_detection == self.redo_vocalization_detection
        {
            return Err(ChitterError::InvalidFlags {
                message: "with --redo-spectrograms, specify exactly one of \
                          --no-vocalization-detection / --redo-vocalization-detection"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Artifact presence snapshot for one session.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagePresence {
    pub video: bool,
    pub spectrogram: bool,
    pub detection: bool,
    pub gui_bundle: bool,
}

impl StagePresence {
    pub fn scan(session_dir: &Path) -> Self {
        Self {
            video: Stage::VideoTranscode.is_present(session_dir),
            spectrogram: Stage::Spectrogram.is_present(session_dir),
            detection: Stage::Detection.is_present(session_dir),
            gui_bundle: Stage::GuiBundle.is_present(session_dir),
        }
    }
}

/// Which stages run in this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagePlan {
    pub video: bool,
    pub spectrogram: bool,
    pub detection: bool,
    pub gui_bundle: bool,
}

impl StagePlan {
    pub fn any(&self) -> bool {
        self.video || self.spectrogram || self.detection || self.gui_bundle
    }
}

/// Decide which stages must run, in fixed dependency order.
pub fn plan(present: &StagePresence, opts: &UpdateOpts) -> StagePlan {
    let video = !present.video || opts.redo_video_conversion;
    let spectrogram = !present.spectrogram || opts.redo_spectrograms || video;
    let detection = opts.redo_vocalization_detection
        || (!opts.no_vocalization_detection && (!present.detection || spectrogram));
    let gui_bundle = !present.gui_bundle || video || spectrogram || detection;
    StagePlan {
        video,
        spectrogram,
        detection,
        gui_bundle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_present() -> StagePresence {
        StagePresence {
            video: true,
            spectrogram: true,
            detection: true,
            gui_bundle: true,
        }
    }

    #[test]
    fn nothing_runs_when_everything_is_present() {
        let p = plan(&all_present(), &UpdateOpts::default());
        assert!(!p.any());
    }

    #[test]
    fn everything_runs_on_empty_session() {
        let p = plan(&StagePresence::default(), &UpdateOpts::default());
        assert!(p.video && p.spectrogram && p.detection && p.gui_bundle);
    }

    #[test]
    fn forcing_video_invalidates_all_downstream_stages() {
        let opts = UpdateOpts {
            redo_video_conversion: true,
            ..UpdateOpts::default()
        };
        let p = plan(&all_present(), &opts);
        assert!(p.video);
        assert!(p.spectrogram);
        assert!(p.detection);
        assert!(p.gui_bundle);
    }

    #[test]
    fn forcing_video_with_suppressed_detection_skips_it() {
        let opts = UpdateOpts {
            redo_video_conversion: true,
            no_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        let p = plan(&all_present(), &opts);
        assert!(p.video && p.spectrogram);
        assert!(!p.detection);
        assert!(p.gui_bundle);
    }

    #[test]
    fn redo_spectrograms_with_redo_detection() {
        let opts = UpdateOpts {
            redo_spectrograms: true,
            redo_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        opts.validate().unwrap();
        let p = plan(&all_present(), &opts);
        assert!(!p.video);
        assert!(p.spectrogram && p.detection && p.gui_bundle);
    }

    #[test]
    fn suppressed_detection_is_skipped_even_when_missing() {
        let present = StagePresence {
            video: true,
            spectrogram: true,
            detection: false,
            gui_bundle: true,
        };
        let opts = UpdateOpts {
            no_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        let p = plan(&present, &opts);
        assert!(!p.detection);
        assert!(!p.gui_bundle);
    }

    #[test]
    fn missing_detection_runs_and_dirties_bundle() {
        let present = StagePresence {
            video: true,
            spectrogram: true,
            detection: false,
            gui_bundle: true,
        };
        let p = plan(&present, &UpdateOpts::default());
        assert!(!p.video && !p.spectrogram);
        assert!(p.detection);
        assert!(p.gui_bundle);
    }

    #[test]
    fn force_detection_overrides_suppression_pairing() {
        let opts = UpdateOpts {
            redo_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        let p = plan(&all_present(), &opts);
        assert!(p.detection);
        assert!(p.gui_bundle);
    }

    #[test]
    fn validate_rejects_redo_spectrograms_alone() {
        let opts = UpdateOpts {
            redo_spectrograms: true,
            ..UpdateOpts::default()
        };
        assert!(matches!(
            opts.validate().unwrap_err(),
            ChitterError::InvalidFlags { .. }
        ));
    }

    #[test]
    fn validate_rejects_both_detection_flags() {
        let opts = UpdateOpts {
            redo_spectrograms: true,
            no_vocalization_detection: true,
            redo_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_accepts_exactly_one_detection_flag() {
        let opts = UpdateOpts {
            redo_spectrograms: true,
            no_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        opts.validate().unwrap();
        let opts = UpdateOpts {
            redo_spectrograms: true,
            redo_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        opts.validate().unwrap();
    }

    #[test]
    fn validate_ignores_detection_flags_without_redo_spectrograms() {
        let opts = UpdateOpts {
            no_vocalization_detection: true,
            ..UpdateOpts::default()
        };
        opts.validate().unwrap();
    }
}
