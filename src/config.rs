use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::models::MetricKind;

pub const DEFAULT_SESSION_TYPES: [&str; 6] = [
    "CROSSFIT",
    "CROSSFIT LITE",
    "GYM",
    "GYMNASTICS",
    "THE LONG WOD",
    "WEIGHTLIFTING",
];

/// Explicit header names per role. Unset roles fall back to substring inference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    pub date: Option<String>,
    pub name: Option<String>,
    pub session: Option<String>,
}

/// Optional JSON file passed with `--config`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub session_types: Option<Vec<String>>,
    #[serde(default)]
    pub columns: ColumnMapping,
    #[serde(default)]
    pub delimiter: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PipelineError::Config {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub metric: MetricKind,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub sort_descending: bool,
    pub columns: ColumnMapping,
    pub session_types: Vec<String>,
    pub delimiter: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metric: MetricKind::Retention,
            start: None,
            end: None,
            sort_descending: false,
            columns: ColumnMapping::default(),
            session_types: DEFAULT_SESSION_TYPES.iter().map(|s| s.to_string()).collect(),
            delimiter: b',',
        }
    }
}

impl PipelineConfig {
    /// Layers a config file under the defaults. CLI overrides are applied by the caller afterwards.
    pub fn with_file(mut self, file: FileConfig) -> Result<Self> {
        if let Some(types) = file.session_types {
            self.session_types = types;
        }
        self.columns = file.columns;
        if let Some(delimiter) = file.delimiter {
            self.delimiter = parse_delimiter(&delimiter)?;
        }
        Ok(self)
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => {
            let bytes = value.as_bytes();
            if bytes.len() == 1 && bytes[0].is_ascii() {
                Ok(bytes[0])
            } else {
                Err(PipelineError::InvalidDelimiter(value.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_allow_list_and_columns() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "session_types": ["CrossFit Light"],
                "columns": { "date": "Visit Day" },
                "delimiter": ";"
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::default().with_file(file).unwrap();
        assert_eq!(config.session_types, vec!["CrossFit Light".to_string()]);
        assert_eq!(config.columns.date.as_deref(), Some("Visit Day"));
        assert_eq!(config.columns.name, None);
        assert_eq!(config.delimiter, b';');
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: std::result::Result<FileConfig, _> =
            serde_json::from_str(r#"{ "sessions": [] }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn delimiter_accepts_tab_alias() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert!(parse_delimiter(";;").is_err());
    }

    #[test]
    fn defaults_use_canonical_allow_list() {
        let config = PipelineConfig::default();
        assert_eq!(config.metric, MetricKind::Retention);
        assert_eq!(config.session_types.len(), 6);
        assert!(config.session_types.contains(&"THE LONG WOD".to_string()));
    }
}
