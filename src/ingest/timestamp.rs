//! Timestamp extraction from frame file and folder names.
//!
//! Frame sources encode their capture time as a fixed-width
//! `YYYYMMDDHHMMSS` token, e.g. `DJI_20240611143005_0001_labels.csv`.

use crate::error::{PipelineError, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;

/// chrono format of the 14-digit token.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Pulls the capture time out of a frame source path.
#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    prefixed: Regex,
    bare: Regex,
}

impl TimestampExtractor {
    /// Create an extractor that prefers tokens right after `prefix`.
    pub fn new(prefix: &str) -> Result<Self> {
        let prefixed = Regex::new(&format!(r"{}(\d{{14}})", regex::escape(prefix)))
            .map_err(|e| PipelineError::InvalidConfig(format!("filename prefix: {e}")))?;
        let bare = Regex::new(r"(?:^|\D)(\d{14})(?:\D|$)")
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        Ok(Self { prefixed, bare })
    }

    /// Extract the timestamp of a frame source.
    ///
    /// The file stem is tried first, then the parent folder name.
    pub fn extract(&self, path: &Path) -> Result<NaiveDateTime> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let folder = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let token = self
            .find_token(stem)
            .or_else(|| self.find_token(folder))
            .ok_or_else(|| {
                PipelineError::timestamp(
                    path.display().to_string(),
                    "no 14-digit date-time token in file or folder name",
                )
            })?;

        NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT).map_err(|e| {
            PipelineError::timestamp(path.display().to_string(), format!("'{token}': {e}"))
        })
    }

    fn find_token<'a>(&self, name: &'a str) -> Option<&'a str> {
        if let Some(caps) = self.prefixed.captures(name) {
            return caps.get(1).map(|m| m.as_str());
        }
        self.bare
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Render a timestamp as the 14-digit token.
pub fn format_token(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::path::PathBuf;

    #[test]
    fn test_extract_from_prefixed_file_name() {
        let extractor = TimestampExtractor::new("DJI_").unwrap();
        let ts = extractor
            .extract(&PathBuf::from("lot/DJI_20240611143005_0001_labels.csv"))
            .unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.month(), 6);
        assert_eq!(ts.day(), 11);
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 30, 5));
    }

    #[test]
    fn test_extract_falls_back_to_folder_name() {
        let extractor = TimestampExtractor::new("DJI_").unwrap();
        let ts = extractor
            .extract(&PathBuf::from("DJI_20240611080000_0002/labels.csv"))
            .unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn test_bare_token_without_prefix() {
        let extractor = TimestampExtractor::new("DJI_").unwrap();
        let ts = extractor
            .extract(&PathBuf::from("frame-20231231235959.csv"))
            .unwrap();
        assert_eq!(ts.year(), 2023);
        assert_eq!(ts.second(), 59);
    }

    #[test]
    fn test_missing_token_is_timestamp_error() {
        let extractor = TimestampExtractor::new("DJI_").unwrap();
        let err = extractor
            .extract(&PathBuf::from("misc/readme.csv"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::TimestampParse { .. }));
    }

    #[test]
    fn test_calendar_invalid_token_is_timestamp_error() {
        let extractor = TimestampExtractor::new("DJI_").unwrap();
        let err = extractor
            .extract(&PathBuf::from("DJI_20241345990000_x.csv"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::TimestampParse { .. }));
    }

    #[test]
    fn test_format_token() {
        let ts = NaiveDateTime::parse_from_str("20240102030405", TIMESTAMP_FORMAT).unwrap();
        assert_eq!(format_token(&ts), "20240102030405");
    }
}
