//! Per-session derivation pipeline.
//!
//! Drives the stager's decisions against the external collaborators:
//! transcoder, video probe, detector, publisher. Stages execute strictly in
//! dependency order because each consumes the file artifacts of the one
//! before it. A stage failure aborts the rest of the session's run but
//! never rolls back artifacts already written, so a retry resumes from the
//! first incomplete stage instead of restarting.

use crate::annotations::AnnotationBundle;
use crate::bundle::{ANNOTATIONS_URI_NAME, GUI_DATA_URI_NAME, build_gui_data};
use crate::config::{ProjectConfig, SessionConfig};
use crate::detect::{DetectorParams, detect};
use crate::error::{ChitterError, Result};
use crate::levels::{LEVELS_NAME, write_levels};
use crate::probe::{VideoProbe, find_singular_file};
use crate::publish::Publisher;
use crate::spectrogram::{SpectrogramBlob, build_spectrogram};
use crate::stage::{Stage, StagePlan, StagePresence, UpdateOpts, plan};
use crate::transcode::Transcoder;
use std::fs;
use std::path::Path;

/// External collaborators a pipeline run needs.
pub struct Collaborators<'a> {
    pub transcoder: &'a dyn Transcoder,
    pub video_probe: &'a dyn VideoProbe,
    pub publisher: &'a dyn Publisher,
}

/// What one session run actually did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session_id: String,
    pub ran: StagePlan,
}

/// Run the pipeline for one session.
///
/// Validates the flag combination, snapshots artifact presence, and
/// executes whatever the stager says is due. Fail-fast: the first stage
/// error propagates and the remaining stages are skipped.
pub fn run_session(
    root: &Path,
    session_id: &str,
    opts: &UpdateOpts,
    collab: &Collaborators,
) -> Result<RunReport> {
    opts.validate()?;

    let project = ProjectConfig::load(root)?;
    if !project.sessions.iter().any(|s| s == session_id) {
        return Err(ChitterError::SessionNotRegistered {
            session_id: session_id.to_string(),
        });
    }

    let session_dir = root.join(session_id);
    let presence = StagePresence::scan(&session_dir);
    let due = plan(&presence, opts);

    if due.video {
        eprintln!("[{session_id}] transcoding video");
        run_video_stage(&session_dir, collab)?;
    }
    if due.spectrogram {
        eprintln!("[{session_id}] building spectrograms");
        run_spectrogram_stage(&session_dir)?;
    }
    if due.detection {
        eprintln!("[{session_id}] detecting vocalizations");
        run_detection_stage(&session_dir, collab)?;
    }
    if due.gui_bundle {
        eprintln!("[{session_id}] publishing visualization bundle");
        run_bundle_stage(&session_dir, collab)?;
    }

    Ok(RunReport {
        session_id: session_id.to_string(),
        ran: due,
    })
}

/// Run the pipeline over every registered session, in registration order.
///
/// Fail-fast across sessions: the first failing session aborts the batch.
pub fn run_all(root: &Path, opts: &UpdateOpts, collab: &Collaborators) -> Result<Vec<RunReport>> {
    opts.validate()?;
    let project = ProjectConfig::load(root)?;
    let mut reports = Vec::with_capacity(project.sessions.len());
    for session_id in &project.sessions {
        reports.push(run_session(root, session_id, opts, collab)?);
    }
    Ok(reports)
}

/// Transcode the raw video, probe the result, publish it, and record the
/// descriptor in the session record.
fn run_video_stage(session_dir: &Path, collab: &Collaborators) -> Result<()> {
    let raw = match find_singular_file(session_dir, &[".avi"])? {
        Some(path) => path,
        None => find_singular_file(session_dir, &[".mp4"])?.ok_or_else(|| {
            ChitterError::NoInputFile {
                extension: ".avi/.mp4".to_string(),
                dir: session_dir.to_path_buf(),
            }
        })?,
    };

    let output = session_dir.join(Stage::VideoTranscode.artifact_name());
    // A forced re-run overwrites the previous transcode.
    if output.exists() {
        fs::remove_file(&output)?;
    }
    collab.transcoder.transcode(&raw, &output)?;

    let descriptor = collab.video_probe.probe(&output)?;
    let video_uri = collab.publisher.put_file(&output)?;

    // Re-load before mutating: a prior interrupted run may have written
    // fields this stage must not clobber.
    let mut config = SessionConfig::load(session_dir)?;
    config.video = Some(descriptor);
    config.video_uri = Some(video_uri);
    config.save(session_dir)?;
    Ok(())
}

/// Build and persist the spectrogram blob and the preview level store.
fn run_spectrogram_stage(session_dir: &Path) -> Result<()> {
    let config = SessionConfig::load(session_dir)?;
    let audio = config
        .audio
        .as_ref()
        .ok_or_else(|| ChitterError::ConfigMissingValue {
            key: "audio".to_string(),
            path: SessionConfig::path(session_dir),
        })?;

    let blob = build_spectrogram(session_dir, audio, config.freq_band())?;
    blob.write(&session_dir.join(Stage::Spectrogram.artifact_name()))?;
    write_levels(&blob.display, &session_dir.join(LEVELS_NAME))?;
    Ok(())
}

/// Detect segments over the display matrix and persist + publish them.
///
/// The display matrix was already band-thresholded when the blob was built,
/// so detection restricts to the configured band but skips its own
/// percentile step.
fn run_detection_stage(session_dir: &Path, collab: &Collaborators) -> Result<()> {
    let config = SessionConfig::load(session_dir)?;
    let blob = SpectrogramBlob::read(&session_dir.join(Stage::Spectrogram.artifact_name()))?;

    let params = DetectorParams {
        freq_band: Some(config.freq_band()),
        threshold_percentile: None,
        ..DetectorParams::default()
    };
    let segments = detect(&blob.display, &params);
    eprintln!("  {} vocalizations detected", segments.len());

    let bundle = AnnotationBundle {
        sampling_frequency: blob.frame_rate_hz(),
        vocalizations: segments,
    };
    bundle.save(session_dir)?;

    let uri = collab.publisher.put_json(&bundle.to_json()?)?;
    fs::write(session_dir.join(ANNOTATIONS_URI_NAME), uri)?;
    Ok(())
}

/// Publish the display matrix and the assembled GUI payload, recording the
/// bundle URI as this stage's artifact.
fn run_bundle_stage(session_dir: &Path, collab: &Collaborators) -> Result<()> {
    let config = SessionConfig::load(session_dir)?;
    let blob = SpectrogramBlob::read(&session_dir.join(Stage::Spectrogram.artifact_name()))?;

    let display_uri = collab.publisher.put_bytes(blob.display.as_bytes())?;
    let gui_data = build_gui_data(&config, &blob, &display_uri)?;
    let gui_uri = collab.publisher.put_json(&gui_data)?;
    fs::write(session_dir.join(GUI_DATA_URI_NAME), gui_uri)?;
    Ok(())
}
