//! Trace configuration

use crate::error::TraceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of one trace session, immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Record the disassembled mnemonic and label of each instruction
    pub disassemble: bool,
    /// Path of the trace document
    pub output: PathBuf,
    /// Location where tracing starts (function name or debugger location)
    pub breakpoint: String,
    /// Maximum number of instructions; `None` or `Some(0)` is unbounded
    pub limit: Option<u64>,
    /// Target program followed by its arguments
    pub target: Vec<String>,
    /// Symbol treated as the program's conventional entry point
    pub entry_point: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            disassemble: false,
            output: PathBuf::from("trace.json"),
            breakpoint: "main".to_string(),
            limit: None,
            target: vec!["a.out".to_string()],
            entry_point: "main".to_string(),
        }
    }
}

impl TraceConfig {
    /// Load a configuration document, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        let config: TraceConfig = serde_json::from_str(json)
            .map_err(|e| TraceError::Configuration(format!("malformed config: {}", e)))?;
        Ok(config)
    }

    /// Limit with the "zero means unbounded" convention applied
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit.filter(|&n| n > 0)
    }

    /// Whether tracing starts at the entry point, in which case no reverse
    /// recording is needed.
    pub fn starts_at_entry(&self) -> bool {
        self.breakpoint.trim() == self.entry_point.trim()
    }

    /// Check the configuration without touching the filesystem beyond
    /// metadata lookups.
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.breakpoint.trim().is_empty() {
            return Err(TraceError::Configuration("breakpoint spec is empty".to_string()));
        }
        if self.entry_point.trim().is_empty() {
            return Err(TraceError::Configuration("entry point is empty".to_string()));
        }
        validate_output(&self.output)
    }
}

fn validate_output(output: &Path) -> Result<(), TraceError> {
    if output.as_os_str().is_empty() {
        return Err(TraceError::Configuration("output path is empty".to_string()));
    }
    if output.is_dir() {
        return Err(TraceError::Configuration(format!(
            "output path {} is a directory",
            output.display()
        )));
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(TraceError::Configuration(format!(
                "output directory {} does not exist",
                parent.display()
            )));
        }
    }
    if let Ok(metadata) = output.metadata() {
        if metadata.permissions().readonly() {
            return Err(TraceError::Configuration(format!(
                "output path {} is read-only",
                output.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TraceConfig::default();
        assert!(!config.disassemble);
        assert_eq!(config.output, PathBuf::from("trace.json"));
        assert!(config.starts_at_entry());
        assert_eq!(config.effective_limit(), None);
    }

    #[test]
    fn test_zero_limit_is_unbounded() {
        let config = TraceConfig { limit: Some(0), ..TraceConfig::default() };
        assert_eq!(config.effective_limit(), None);
        let config = TraceConfig { limit: Some(3), ..TraceConfig::default() };
        assert_eq!(config.effective_limit(), Some(3));
    }

    #[test]
    fn test_from_json_partial() {
        let config = TraceConfig::from_json(r#"{"disassemble":true,"breakpoint":"compute","limit":10}"#)
            .unwrap();
        assert!(config.disassemble);
        assert_eq!(config.breakpoint, "compute");
        assert!(!config.starts_at_entry());
        assert_eq!(config.target, vec!["a.out".to_string()]);
    }

    #[test]
    fn test_entry_point_ignores_surrounding_whitespace() {
        let config = TraceConfig {
            breakpoint: "main ".to_string(),
            entry_point: " main".to_string(),
            ..TraceConfig::default()
        };
        assert!(config.starts_at_entry());

        let config = TraceConfig { entry_point: " start".to_string(), ..TraceConfig::default() };
        assert!(!config.starts_at_entry());
    }

    #[test]
    fn test_from_json_rejects_negative_limit() {
        let result = TraceConfig::from_json(r#"{"limit":-1}"#);
        assert!(matches!(result, Err(TraceError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_empty_breakpoint() {
        let config = TraceConfig { breakpoint: "  ".to_string(), ..TraceConfig::default() };
        assert!(matches!(config.validate(), Err(TraceError::Configuration(_))));
    }

    #[test]
    fn test_validate_output_paths() {
        let dir = tempfile::tempdir().unwrap();

        let config = TraceConfig { output: dir.path().to_path_buf(), ..TraceConfig::default() };
        assert!(config.validate().is_err(), "directory output must be rejected");

        let config = TraceConfig {
            output: dir.path().join("missing").join("trace.json"),
            ..TraceConfig::default()
        };
        assert!(config.validate().is_err(), "missing parent must be rejected");

        let config = TraceConfig {
            output: dir.path().join("trace.json"),
            ..TraceConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(!dir.path().join("trace.json").exists(), "validation must not create the file");
    }
}
