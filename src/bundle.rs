//! Visualization payload assembly and the project index document.
//!
//! The GUI bundle is the JSON document the browser figure loads: a
//! reference to the published display spectrogram plus the video
//! descriptor. The index is a markdown page with one visualization link per
//! session, regenerated from scratch on every update.

use crate::config::{ProjectConfig, SessionConfig};
use crate::error::{ChitterError, Result};
use crate::spectrogram::SpectrogramBlob;
use serde_json::json;
use std::fs;
use std::path::Path;

/// File holding the published URI of a session's GUI bundle.
pub const GUI_DATA_URI_NAME: &str = "gui_data.uri";
/// File holding the published URI of a session's annotation bundle.
pub const ANNOTATIONS_URI_NAME: &str = "annotations.uri";

const FIGURL_BASE: &str = "https://figurl.org/f";
const FIGURL_VIEW: &str = "gs://figurl/neurostatslab-views-1dev6";

/// Assemble the visualization payload for one session.
///
/// `display_uri` is the published display matrix. Requires the video stage
/// to have recorded its descriptor and URI.
pub fn build_gui_data(
    session: &SessionConfig,
    blob: &SpectrogramBlob,
    display_uri: &str,
) -> Result<serde_json::Value> {
    let session_path = Path::new(&session.session_id);
    let video_uri = session.video_uri.as_deref().ok_or_else(|| {
        ChitterError::ConfigMissingValue {
            key: "video_uri".to_string(),
            path: SessionConfig::path(session_path),
        }
    })?;
    let video = session
        .video
        .as_ref()
        .ok_or_else(|| ChitterError::ConfigMissingValue {
            key: "video".to_string(),
            path: SessionConfig::path(session_path),
        })?;

    Ok(json!({
        "type": "neurostatslab.AnnotateVocalizations",
        "spectrogram": {
            "uri": display_uri,
            "numFrames": blob.num_frames,
            "numFrequencies": blob.num_bins,
            "samplingFrequency": blob.frame_rate_hz(),
        },
        "video": {
            "uri": video_uri,
            "samplingFrequency": video.fps,
            "width": video.width,
            "height": video.height,
        },
    }))
}

/// Regenerate `index.md` at the project root: one section per registered
/// session, with a visualization link for sessions whose bundle has been
/// published.
pub fn write_index(root: &Path) -> Result<()> {
    let project = ProjectConfig::load(root)?;
    let (user, repo) = parse_repository_url(&project.repository_url)?;

    let mut lines: Vec<String> = vec!["# Sessions".to_string()];
    for session_id in &project.sessions {
        let session_dir = root.join(session_id);
        if !session_dir.is_dir() {
            return Err(ChitterError::NotADirectory { path: session_dir });
        }
        // Session record must exist even if derivation has not run yet.
        SessionConfig::load(&session_dir)?;

        lines.push(String::new());
        lines.push(format!("## {session_id}"));

        let gui_uri_path = session_dir.join(GUI_DATA_URI_NAME);
        if gui_uri_path.exists() {
            let gui_uri = fs::read_to_string(&gui_uri_path)?;
            let annotations_pointer =
                format!("gh://{user}/{repo}/main/{session_id}/{ANNOTATIONS_URI_NAME}");
            let state = serde_json::to_string(&json!({"vocalizations": annotations_pointer}))?;
            let url = format!(
                "{FIGURL_BASE}?v={FIGURL_VIEW}&d={}&s={state}&label={session_id}",
                gui_uri.trim()
            );
            lines.push(String::new());
            lines.push(format!("[Open session for visualization and editing]({url})"));
        }
    }
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push("This file was auto-generated.".to_string());

    fs::write(root.join("index.md"), lines.join("\n"))?;
    Ok(())
}

/// Split `https://github.com/<user>/<repo>` into user and repo.
fn parse_repository_url(url: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 5 || parts[3].is_empty() || parts[4].is_empty() {
        return Err(ChitterError::ConfigMissingValue {
            key: "repository_url".to_string(),
            path: url.into(),
        });
    }
    Ok((parts[3].to_string(), parts[4].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioDescriptor, AudioSourceKind, VideoDescriptor};
    use crate::matrix::EnergyMatrix;
    use tempfile::TempDir;

    fn session_with_video() -> SessionConfig {
        SessionConfig {
            session_id: "s1".to_string(),
            audio: Some(AudioDescriptor {
                source: "mic.wav".to_string(),
                sample_rate_hz: 48_000.0,
                duration_sec: 1.0,
                source_kind: AudioSourceKind::SingleFileWav,
            }),
            video: Some(VideoDescriptor {
                width: 640,
                height: 480,
                fps: 30.0,
                frame_count: 30,
            }),
            video_uri: Some("sha1://feed".to_string()),
            detect_freq_band: None,
        }
    }

    fn tiny_blob() -> SpectrogramBlob {
        SpectrogramBlob {
            channels: vec![vec![0.0; 8]],
            num_frames: 4,
            num_bins: 2,
            freqs: vec![0.0, 100.0],
            times: vec![0.0, 0.01, 0.02, 0.03],
            display: EnergyMatrix::zeros(4, 2),
        }
    }

    #[test]
    fn gui_data_references_published_artifacts() {
        let data = build_gui_data(&session_with_video(), &tiny_blob(), "sha1://beef").unwrap();
        assert_eq!(data["type"], "neurostatslab.AnnotateVocalizations");
        assert_eq!(data["spectrogram"]["uri"], "sha1://beef");
        assert_eq!(data["spectrogram"]["numFrames"], 4);
        assert!((data["spectrogram"]["samplingFrequency"].as_f64().unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(data["video"]["uri"], "sha1://feed");
        assert_eq!(data["video"]["width"], 640);
        assert_eq!(data["video"]["samplingFrequency"], 30.0);
    }

    #[test]
    fn gui_data_requires_video_uri() {
        let mut session = session_with_video();
        session.video_uri = None;
        let err = build_gui_data(&session, &tiny_blob(), "sha1://beef").unwrap_err();
        assert!(matches!(err, ChitterError::ConfigMissingValue { .. }));
    }

    #[test]
    fn repository_url_parses() {
        let (user, repo) = parse_repository_url("https://github.com/lab/recordings").unwrap();
        assert_eq!(user, "lab");
        assert_eq!(repo, "recordings");
        assert!(parse_repository_url("not-a-url").is_err());
    }

    #[test]
    fn index_links_sessions_with_published_bundles() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let project = ProjectConfig {
            sessions: vec!["s1".to_string(), "s2".to_string()],
            repository_url: "https://github.com/lab/recordings".to_string(),
            use_sandbox_for_transcode: false,
        };
        project.save(root).unwrap();
        for id in ["s1", "s2"] {
            let session_dir = root.join(id);
            fs::create_dir(&session_dir).unwrap();
            SessionConfig {
                session_id: id.to_string(),
                ..SessionConfig::default()
            }
            .save(&session_dir)
            .unwrap();
        }
        // Only s1 has a published bundle.
        fs::write(root.join("s1").join(GUI_DATA_URI_NAME), "sha1://abc\n").unwrap();

        write_index(root).unwrap();
        let index = fs::read_to_string(root.join("index.md")).unwrap();
        assert!(index.starts_with("# Sessions"));
        assert!(index.contains("## s1"));
        assert!(index.contains("## s2"));
        assert!(index.contains("d=sha1://abc&"));
        assert!(index.contains("gh://lab/recordings/main/s1/annotations.uri"));
        // s2 has no link.
        assert!(!index.contains("main/s2/"));
    }

    #[test]
    fn index_fails_on_missing_session_dir() {
        let dir = TempDir::new().unwrap();
        let project = ProjectConfig {
            sessions: vec!["ghost".to_string()],
            repository_url: "https://github.com/lab/recordings".to_string(),
            use_sandbox_for_transcode: false,
        };
        project.save(dir.path()).unwrap();
        let err = write_index(dir.path()).unwrap_err();
        assert!(matches!(err, ChitterError::NotADirectory { .. }));
    }
}
