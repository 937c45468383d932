use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "laytime-sof";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sentence-embedding model used for event classification.
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Minimum classifier confidence for a line to be kept as an event.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.45;

/// Page upscaling factor used when rendering scanned PDFs for OCR.
pub const DEFAULT_OCR_RENDER_SCALE: f32 = 3.0;

/// Built-in event ontology (label -> synonyms).
pub const DEFAULT_EVENTS_YAML: &str = include_str!("../resources/events.yml");

/// Built-in business label vocabulary (field -> label phrases).
pub const DEFAULT_BUSINESS_DATA_YAML: &str = include_str!("../resources/business_data.yml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "laytime_sof=info,warn"
}

/// Get the application data directory (~/.laytime-sof/)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!(".{APP_NAME}"))
}

/// Get the models directory (for ONNX embeddings, etc.)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the embedding model directory (all-MiniLM-L6-v2)
pub fn embedding_model_dir() -> PathBuf {
    models_dir().join("all-MiniLM-L6-v2")
}

/// Read a configuration file into a string, tagging I/O errors with the path.
pub fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a `label -> [phrase, ...]` YAML mapping, preserving document order.
///
/// Null or missing phrase lists become empty lists. Scalar values are
/// accepted as a single-phrase list.
pub fn parse_phrase_mapping(yaml: &str) -> Result<Vec<(String, Vec<String>)>, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(m) => m,
        other => {
            return Err(ConfigError::Invalid(format!(
                "expected a mapping of label -> phrases, got {}",
                yaml_kind(&other)
            )))
        }
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, phrases) in mapping {
        let label = match key {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "label keys must be strings, got {}",
                    yaml_kind(&other)
                )))
            }
        };
        let phrases = match phrases {
            serde_yaml::Value::Null => Vec::new(),
            serde_yaml::Value::String(s) => vec![s],
            serde_yaml::Value::Sequence(seq) => seq
                .into_iter()
                .filter_map(|v| match v {
                    serde_yaml::Value::String(s) => Some(s),
                    serde_yaml::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            other => {
                return Err(ConfigError::Invalid(format!(
                    "phrases for '{label}' must be a list, got {}",
                    yaml_kind(&other)
                )))
            }
        };
        entries.push((label, phrases));
    }
    Ok(entries)
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "bool",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}

// ═══════════════════════════════════════════════════════════
// Pipeline settings
// ═══════════════════════════════════════════════════════════

/// Runtime settings for the extraction pipeline.
///
/// Every field has a default; `from_env()` layers `LAYTIME_*` overrides on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Name reported in output metadata.
    pub model_name: String,
    /// Directory holding `model.onnx` + `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Event ontology YAML. `None` uses the built-in ontology.
    pub ontology_path: Option<PathBuf>,
    /// Business label vocabulary YAML. `None` uses the built-in vocabulary.
    pub business_labels_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub ocr_render_scale: f32,
    /// Tesseract `tessdata` directory. `None` probes the usual system paths.
    pub tessdata_dir: Option<PathBuf>,
    pub parse_timeout_secs: u64,
    pub classify_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_dir: embedding_model_dir(),
            ontology_path: None,
            business_labels_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            ocr_render_scale: DEFAULT_OCR_RENDER_SCALE,
            tessdata_dir: None,
            parse_timeout_secs: 300,
            classify_timeout_secs: 120,
        }
    }
}

impl PipelineSettings {
    /// Defaults overridden by `LAYTIME_*` environment variables.
    ///
    /// Unparsable numeric overrides are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("LAYTIME_MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = lookup("LAYTIME_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("LAYTIME_ONTOLOGY_PATH") {
            self.ontology_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LAYTIME_BUSINESS_LABELS_PATH") {
            self.business_labels_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LAYTIME_TESSDATA_DIR") {
            self.tessdata_dir = Some(PathBuf::from(v));
        }
        override_parsed(&lookup, "LAYTIME_CONFIDENCE_THRESHOLD", &mut self.confidence_threshold);
        override_parsed(&lookup, "LAYTIME_OCR_RENDER_SCALE", &mut self.ocr_render_scale);
        override_parsed(&lookup, "LAYTIME_PARSE_TIMEOUT_SECS", &mut self.parse_timeout_secs);
        override_parsed(&lookup, "LAYTIME_CLASSIFY_TIMEOUT_SECS", &mut self.classify_timeout_secs);
        self
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs.max(1))
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs.max(1))
    }

    /// Ontology YAML text: configured file or the built-in default.
    pub fn ontology_yaml(&self) -> Result<String, ConfigError> {
        match &self.ontology_path {
            Some(path) => read_config_file(path),
            None => Ok(DEFAULT_EVENTS_YAML.to_string()),
        }
    }

    /// Business label YAML text: configured file or the built-in default.
    pub fn business_labels_yaml(&self) -> Result<String, ConfigError> {
        match &self.business_labels_path {
            Some(path) => read_config_file(path),
            None => Ok(DEFAULT_BUSINESS_DATA_YAML.to_string()),
        }
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparsable setting override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn app_data_dir_is_hidden_app_folder() {
        let dir = app_data_dir();
        assert!(dir.ends_with(".laytime-sof"));
    }

    #[test]
    fn embedding_model_dir_under_models() {
        let dir = embedding_model_dir();
        assert!(dir.starts_with(models_dir()));
        assert!(dir.ends_with("all-MiniLM-L6-v2"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn phrase_mapping_preserves_order() {
        let yaml = "ZULU:\n  - last letter\nALPHA:\n  - first letter\n  - a\nMIKE:\n";
        let entries = parse_phrase_mapping(yaml).unwrap();
        let labels: Vec<&str> = entries.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["ZULU", "ALPHA", "MIKE"]);
        assert_eq!(entries[1].1, vec!["first letter", "a"]);
        assert!(entries[2].1.is_empty());
    }

    #[test]
    fn phrase_mapping_accepts_scalar_phrase() {
        let entries = parse_phrase_mapping("PORT: port").unwrap();
        assert_eq!(entries, vec![("PORT".to_string(), vec!["port".to_string()])]);
    }

    #[test]
    fn phrase_mapping_empty_document() {
        assert!(parse_phrase_mapping("").unwrap().is_empty());
    }

    #[test]
    fn phrase_mapping_rejects_sequence_root() {
        let err = parse_phrase_mapping("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn built_in_yaml_parses() {
        assert!(!parse_phrase_mapping(DEFAULT_EVENTS_YAML).unwrap().is_empty());
        assert!(!parse_phrase_mapping(DEFAULT_BUSINESS_DATA_YAML).unwrap().is_empty());
    }

    #[test]
    fn settings_defaults() {
        let s = PipelineSettings::default();
        assert!((s.confidence_threshold - 0.45).abs() < f32::EPSILON);
        assert!((s.ocr_render_scale - 3.0).abs() < f32::EPSILON);
        assert!(s.ontology_path.is_none());
        assert_eq!(s.model_name, DEFAULT_MODEL_NAME);
    }

    #[test]
    fn settings_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LAYTIME_CONFIDENCE_THRESHOLD", "0.6"),
            ("LAYTIME_ONTOLOGY_PATH", "/etc/laytime/events.yml"),
            ("LAYTIME_PARSE_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let s = PipelineSettings::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert!((s.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(s.ontology_path, Some(PathBuf::from("/etc/laytime/events.yml")));
        assert_eq!(s.parse_timeout_secs, 300, "bad override keeps default");
    }

    #[test]
    fn ontology_yaml_reads_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.yml");
        std::fs::write(&path, "ARRIVAL:\n  - vessel arrived\n").unwrap();
        let s = PipelineSettings {
            ontology_path: Some(path),
            ..PipelineSettings::default()
        };
        assert!(s.ontology_yaml().unwrap().contains("vessel arrived"));
    }

    #[test]
    fn missing_config_file_reports_path() {
        let s = PipelineSettings {
            business_labels_path: Some(PathBuf::from("/nonexistent/business.yml")),
            ..PipelineSettings::default()
        };
        match s.business_labels_yaml() {
            Err(ConfigError::Io { path, .. }) => assert!(path.ends_with("business.yml")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn settings_deserialize_partial_json() {
        let s: PipelineSettings =
            serde_json::from_str(r#"{"confidence_threshold": 0.3}"#).unwrap();
        assert!((s.confidence_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(s.parse_timeout_secs, 300);
    }
}
