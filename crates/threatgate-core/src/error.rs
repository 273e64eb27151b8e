use std::path::PathBuf;
use thiserror::Error;

/// The register could not be turned into valid threat records.
///
/// Every variant is fatal: loading stops at the first problem and the gate
/// is never evaluated.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("failed to read threat register '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in '{source_file}'")]
    Yaml {
        source_file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unexpected register layout in '{source_file}': {message}")]
    Shape { source_file: String, message: String },

    #[error("threat #{index} in '{source_file}' is missing required field '{field}'")]
    MissingField {
        source_file: String,
        index: usize,
        field: &'static str,
    },

    #[error("threat #{index} in '{source_file}' has an empty id")]
    EmptyId { source_file: String, index: usize },

    #[error(
        "threat '{id}' has unrecognized {field} '{value}'{}",
        .suggestion.as_ref().map(|s| format!(" (did you mean '{}'?)", s)).unwrap_or_default()
    )]
    InvalidValue {
        id: String,
        field: &'static str,
        value: String,
        suggestion: Option<String>,
    },

    #[error("duplicate threat id '{id}' in '{source_file}'")]
    DuplicateId { source_file: String, id: String },
}

/// Outcome of a gate run that did not pass.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("{} blocking threat(s) still open in '{source_file}': {}", .offending.len(), .offending.join(", "))]
    PolicyViolation {
        source_file: String,
        offending: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read policy file '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file '{}'", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to post notification")]
    Http(#[from] reqwest::Error),
}
