use std::io;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing required column(s): {}", .roles.join(", "))]
    MissingColumn { roles: Vec<&'static str> },

    #[error("no group-session attendance found in the upload")]
    EmptyDataset,

    #[error("no attendance between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid date '{0}', expected YYYY-MM-DD or DD.MM.YYYY")]
    InvalidDate(String),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid delimiter '{0}', expected a single ASCII character")]
    InvalidDelimiter(String),

    #[error("failed to read workbook '{path}': {source}")]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook '{0}' has no worksheets")]
    NoWorksheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// Conditions that leave nothing to report rather than indicating bad input.
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            PipelineError::EmptyDataset | PipelineError::EmptyRange { .. }
        )
    }
}
