//! Error types for chitter.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChitterError {
    // Configuration errors
    #[error("File already exists: {path}")]
    FileAlreadyExists { path: PathBuf },

    #[error("File does not exist: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Session already in project: {session_id}")]
    SessionAlreadyRegistered { session_id: String },

    #[error("Session not in project: {session_id}")]
    SessionNotRegistered { session_id: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Invalid flag combination: {message}")]
    InvalidFlags { message: String },

    #[error("Missing configuration value for {key} in {path}")]
    ConfigMissingValue { key: String, path: PathBuf },

    // Missing-input errors
    #[error("No {extension} file found in directory: {dir}")]
    NoInputFile { extension: String, dir: PathBuf },

    #[error("More than one {extension} file found in directory: {dir}")]
    AmbiguousInputFile { extension: String, dir: PathBuf },

    #[error("Failed to read audio source {path}: {message}")]
    AudioRead { path: PathBuf, message: String },

    // External-process errors
    #[error("{program} exited with {status} for {path}")]
    ExternalProcess {
        program: String,
        status: String,
        path: PathBuf,
    },

    #[error("Failed to launch {program}: {message}")]
    ProcessLaunch { program: String, message: String },

    #[error("Unexpected {program} output: {message}")]
    ProbeOutput { program: String, message: String },

    // Plugin endpoint errors
    #[error("Invalid project path: {path}")]
    MalformedQueryPath { path: String },

    #[error("Unexpected query type: {query_type}")]
    UnexpectedQueryType { query_type: String },

    // Artifact format errors
    #[error("Corrupt spectrogram blob {path}: {message}")]
    CorruptBlob { path: PathBuf, message: String },

    // General I/O and serialization errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ChitterError>;
