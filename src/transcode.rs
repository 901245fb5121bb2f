//! Video transcoding collaborator.
//!
//! The pipeline treats the codec as an opaque external process: ffmpeg is
//! invoked with fixed Theora/Vorbis settings and awaited synchronously. A
//! non-zero exit is fatal for the session's run. Projects on shared compute
//! nodes can route the invocation through a singularity sandbox instead of
//! a host ffmpeg.

use crate::error::{ChitterError, Result};
use std::path::Path;
use std::process::Command;

const FFMPEG_IMAGE: &str = "docker://jrottenberg/ffmpeg";

/// External transcoder interface. Mocked in pipeline tests.
pub trait Transcoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Transcoder running ffmpeg on the host or inside a singularity sandbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegTranscoder {
    pub use_sandbox: bool,
}

impl FfmpegTranscoder {
    pub fn new(use_sandbox: bool) -> Self {
        Self { use_sandbox }
    }

    fn build_command(&self, input: &Path, output: &Path) -> Result<Command> {
        if self.use_sandbox {
            // The sandbox only bind-mounts one directory, so both files
            // must live under the same parent.
            let in_parent = input.parent();
            let out_parent = output.parent();
            if in_parent.is_none() || in_parent != out_parent {
                return Err(ChitterError::InvalidFlags {
                    message: format!(
                        "Files must be in the same parent directory: {} {}",
                        input.display(),
                        output.display()
                    ),
                });
            }
            let parent = in_parent.unwrap_or_else(|| Path::new("."));
            let mut cmd = Command::new("singularity");
            cmd.arg("exec")
                .arg("--bind")
                .arg(format!("{}:{}", parent.display(), parent.display()))
                .arg(FFMPEG_IMAGE);
            cmd.args(ffmpeg_args(input, output));
            Ok(cmd)
        } else {
            let mut cmd = Command::new("ffmpeg");
            cmd.args(ffmpeg_args(input, output).into_iter().skip(1));
            Ok(cmd)
        }
    }
}

fn ffmpeg_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "ffmpeg".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-c:v".to_string(),
        "libtheora".to_string(),
        "-q:v".to_string(),
        "7".to_string(),
        "-c:a".to_string(),
        "libvorbis".to_string(),
        "-q:a".to_string(),
        "4".to_string(),
        output.display().to_string(),
    ]
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = self.build_command(input, output)?;
        let status = cmd.status().map_err(|e| ChitterError::ProcessLaunch {
            program: "ffmpeg".to_string(),
            message: e.to_string(),
        })?;
        if !status.success() {
            return Err(ChitterError::ExternalProcess {
                program: "ffmpeg".to_string(),
                status: status.to_string(),
                path: input.to_path_buf(),
            });
        }
        Ok(())
    }
}
