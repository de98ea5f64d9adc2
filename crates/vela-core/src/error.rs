//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("more than one applications provided")]
    MultipleApplications,

    #[error("more than one external workflow provided")]
    MultipleWorkflows,

    #[error("no application provided")]
    NoApplication,

    #[error("file {file} is not application, policy or workflow")]
    UnrecognizedKind { file: String },

    #[error("invalid {kind} in {file}: {message}")]
    InvalidObject {
        kind: String,
        file: String,
        message: String,
    },

    #[error("invalid properties of deploy step {step}: {message}")]
    InvalidDeployStep { step: String, message: String },

    #[error("parameter format should be foo=bar, {arg} not match")]
    InvalidParameter { arg: String },

    #[error("invalid VelaQL statement {statement:?}: {message}")]
    InvalidQuery { statement: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
