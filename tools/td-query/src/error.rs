//! Error types for the command line

use thiserror::Error;

/// Problems with the command line, found before any remote call
#[derive(Error, Debug)]
pub enum ArgumentError {
    #[error("Missing one or both required database name and table name.")]
    MissingPositional,

    #[error("Missing required option --{option}")]
    MissingOption { option: &'static str },

    #[error("Invalid numeric value '{value}' for --{option}")]
    InvalidNumber { option: &'static str, value: String },

    #[error("{}", summarize(.0))]
    Usage(#[from] clap::Error),
}

impl ArgumentError {
    /// `--help` and `--version` come through clap as errors but are not failures
    pub fn is_informational(&self) -> bool {
        match self {
            ArgumentError::Usage(e) => matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ),
            _ => false,
        }
    }
}

/// First line of a clap error, without its `error: ` prefix
fn summarize(error: &clap::Error) -> String {
    let rendered = error.to_string();
    let first = rendered.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();
    first.trim_start_matches("error: ").trim().to_string()
}
