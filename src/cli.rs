//! Command-line interface for chitter
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Manage and derive artifacts for vocalization recording sessions
#[derive(Parser, Debug)]
#[command(name = "chitter", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root directory (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// One-time initialization of a project directory
    Init {
        /// Repository URL used for published annotation links
        #[arg(long, value_name = "URL")]
        repository_url: Option<String>,
    },

    /// Register a session directory with the project
    Add {
        /// Session id (directory name)
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        session_id: Option<String>,

        /// Register every unregistered subdirectory
        #[arg(long)]
        all: bool,
    },

    /// Recompute stale or forced artifacts for one or all sessions
    Update(UpdateArgs),

    /// Answer one plugin query from stdin, writing the response to stdout
    ServeQuery {
        /// Share root the query's rtcshare:// paths resolve against
        #[arg(long, value_name = "PATH", default_value = ".")]
        share_root: PathBuf,

        /// Directory reference `$dir` expands to
        #[arg(long, value_name = "URI", default_value = "rtcshare://")]
        dir: String,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SessionSelector {
    /// Update one session
    #[arg(long, value_name = "SESSION_ID")]
    pub session: Option<String>,

    /// Update every registered session
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub selector: SessionSelector,

    /// Rebuild spectrograms even if present
    #[arg(long)]
    pub redo_spectrograms: bool,

    /// Re-run the video transcode even if present
    #[arg(long)]
    pub redo_video_conversion: bool,

    /// Skip vocalization detection
    #[arg(long)]
    pub no_vocalization_detection: bool,

    /// Re-run vocalization detection even if present
    #[arg(long)]
    pub redo_vocalization_detection: bool,
}

impl UpdateArgs {
    pub fn opts(&self) -> crate::stage::UpdateOpts {
        crate::stage::UpdateOpts {
            redo_spectrograms: self.redo_spectrograms,
            redo_video_conversion: self.redo_video_conversion,
            no_vocalization_detection: self.no_vocalization_detection,
            redo_vocalization_detection: self.redo_vocalization_detection,
        }
    }
}
