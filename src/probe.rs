//! Raw media discovery for session directories.
//!
//! A session directory must hold exactly one raw audio file and exactly one
//! raw video file. Zero candidates of a required extension is a
//! missing-input error the operator has to fix; more than one is ambiguous
//! and equally fatal.

use crate::config::{AudioDescriptor, AudioSourceKind, VideoDescriptor};
use crate::defaults;
use crate::error::{ChitterError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Find the single file in `dir` whose name ends in one of `extensions`.
///
/// Returns `None` when there is no candidate and an error when there is
/// more than one.
pub fn find_singular_file(dir: &Path, extensions: &[&str]) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if extensions.iter().any(|ext| name.ends_with(ext)) {
            matches.push(entry.path());
        }
    }
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(ChitterError::AmbiguousInputFile {
            extension: extensions.join("/"),
            dir: dir.to_path_buf(),
        }),
    }
}

/// Raw media located in a freshly registered session directory.
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    pub audio: AudioDescriptor,
    pub video_source: PathBuf,
}

/// Probe a session directory for its raw audio and video sources.
///
/// Audio: prefers the multi-channel `.raw` container, falls back to a plain
/// `.wav`. Video: prefers `.avi`, falls back to `.mp4`. The audio descriptor
/// is fully derived here (rate, duration, channel layout); video geometry is
/// probed later, after transcoding, by [`probe_video`].
pub fn probe_session(dir: &Path) -> Result<SessionBootstrap> {
    let audio = match find_singular_file(dir, &[".raw"])? {
        Some(path) => describe_raw_audio(&path)?,
        None => match find_singular_file(dir, &[".wav"])? {
            Some(path) => describe_wav_audio(&path)?,
            None => {
                return Err(ChitterError::NoInputFile {
                    extension: ".raw/.wav".to_string(),
                    dir: dir.to_path_buf(),
                });
            }
        },
    };

    let video_source = match find_singular_file(dir, &[".avi"])? {
        Some(path) => path,
        None => find_singular_file(dir, &[".mp4"])?.ok_or_else(|| ChitterError::NoInputFile {
            extension: ".avi/.mp4".to_string(),
            dir: dir.to_path_buf(),
        })?,
    };

    Ok(SessionBootstrap {
        audio,
        video_source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Describe a headerless interleaved i16 container. Duration comes from the
/// byte length; rate and channel count are rig conventions.
fn describe_raw_audio(path: &Path) -> Result<AudioDescriptor> {
    let channels = defaults::RAW_AUDIO_CHANNELS;
    let sample_rate_hz = defaults::RAW_AUDIO_SR_HZ;
    let bytes = fs::metadata(path)?.len();
    let frames = bytes / (2 * channels as u64);
    Ok(AudioDescriptor {
        source: file_name(path),
        sample_rate_hz,
        duration_sec: frames as f64 / sample_rate_hz,
        source_kind: AudioSourceKind::MultiChannelRaw { channels },
    })
}

fn describe_wav_audio(path: &Path) -> Result<AudioDescriptor> {
    let reader = hound::WavReader::open(path).map_err(|e| ChitterError::AudioRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let spec = reader.spec();
    let sample_rate_hz = spec.sample_rate as f64;
    let duration_sec = reader.duration() as f64 / sample_rate_hz;
    Ok(AudioDescriptor {
        source: file_name(path),
        sample_rate_hz,
        duration_sec,
        source_kind: AudioSourceKind::SingleFileWav,
    })
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: u32,
    height: u32,
    r_frame_rate: String,
    #[serde(default)]
    nb_frames: Option<String>,
}

/// Video geometry probe interface. Mocked in pipeline tests.
pub trait VideoProbe {
    fn probe(&self, path: &Path) -> Result<VideoDescriptor>;
}

/// Probe backed by the host ffprobe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeVideoProbe;

impl VideoProbe for FfprobeVideoProbe {
    fn probe(&self, path: &Path) -> Result<VideoDescriptor> {
        probe_video(path)
    }
}

/// Probe a video file's geometry with ffprobe.
pub fn probe_video(path: &Path) -> Result<VideoDescriptor> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| ChitterError::ProcessLaunch {
            program: "ffprobe".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ChitterError::ExternalProcess {
            program: "ffprobe".to_string(),
            status: output.status.to_string(),
            path: path.to_path_buf(),
        });
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ChitterError::ProbeOutput {
            program: "ffprobe".to_string(),
            message: format!("no video stream in {}", path.display()),
        })?;

    let fps = parse_frame_rate(&stream.r_frame_rate).ok_or_else(|| ChitterError::ProbeOutput {
        program: "ffprobe".to_string(),
        message: format!("unparseable frame rate: {}", stream.r_frame_rate),
    })?;
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoDescriptor {
        width: stream.width,
        height: stream.height,
        fps,
        frame_count,
    })
}

/// ffprobe reports frame rates as a fraction like `30000/1001`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => s.parse().ok(),
    }
}
