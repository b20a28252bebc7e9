//! Error types for the pipeline core

use frame_pipeline_common::ProcessingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {path}: {value:?} ({reason})")]
    InvalidValue {
        path: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrayError {
    #[error("Bad cast when retrieving {key} from tray: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Tray key {key} does not hold a {expected} slot")]
    SlotKindMismatch { key: String, expected: &'static str },
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Tray error: {0}")]
    Tray(#[from] TrayError),

    #[error("Missing tray entry: {0}")]
    MissingInput(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Stage panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input termination handle to pipeline is uninitialised")]
    TerminationHandleMissing,

    #[error("No source buffer registered with the pipeline")]
    NoSourceBuffer,

    #[error("Pipeline stage {stage} has exited prematurely")]
    StageFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Tray error: {0}")]
    Tray(#[from] TrayError),
}
