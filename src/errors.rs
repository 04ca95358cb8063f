use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to read batch file {path}: {source}")]
    BatchFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read management password: {0}")]
    Prompt(#[source] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{value} is not a valid lifecycle; expected one of: {accepted}")]
    Lifecycle { value: String, accepted: String },
    #[error("{value} is not a valid OTES entity number; expected one of: {accepted}")]
    EntityNumber { value: String, accepted: String },
    #[error("{value} is not a known pod; expected one of: {accepted}")]
    Pod { value: String, accepted: String },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

impl ValidationError {
    pub fn lifecycle(value: impl Into<String>, accepted: &[&str]) -> Self {
        Self::Lifecycle {
            value: value.into(),
            accepted: accepted.join(", "),
        }
    }

    pub fn entity_number<I, S>(value: impl Into<String>, accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self::EntityNumber {
            value: value.into(),
            accepted: join_accepted(accepted),
        }
    }

    pub fn pod<I, S>(value: impl Into<String>, accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self::Pod {
            value: value.into(),
            accepted: join_accepted(accepted),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line_number}: malformed batch record {line:?}, expected host:port:pod")]
pub struct BatchRecordError {
    pub line_number: usize,
    pub line: String,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render service template: {0}")]
    Render(String),
    #[error("failed to write service template to a temporary file: {0}")]
    TempFile(#[from] std::io::Error),
}

fn join_accepted<I, S>(accepted: I) -> String
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    accepted
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
