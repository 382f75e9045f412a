//! # Configuration Tests Module
//!
//! Loading the pipeline configuration from the bundled file, from JSON and
//! YAML documents, through the environment variable, and rejecting missing,
//! misspelled or invalid keys with the offending key named.

#[cfg(test)]
mod tests {
    use manuscript_lines::config::{PipelineConfig, CONFIG_PATH_ENV};
    use manuscript_lines::errors::PipelineError;
    use serde_json::{json, Value};
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::NamedTempFile;

    fn bundled_config_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.yaml")
    }

    fn temp_config(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write temp file");
        file
    }

    /// The shipped configuration loads and matches the defaults
    #[test]
    fn test_bundled_config_loads() {
        let config = PipelineConfig::from_path(&bundled_config_path()).unwrap();

        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.preprocessing.clahe.tile_grid_size, [8, 8]);
        assert_eq!(config.preprocessing.threshold.block_size, 25);
        assert_eq!(config.preprocessing.morphology.guide_removal_kernel, [40, 1]);
        assert_eq!(config.segmentation.max_line_height, 60);
        assert_eq!(config.ocr.model, None);
    }

    /// The default configuration as a mutable document tree
    fn default_document() -> Value {
        serde_json::to_value(PipelineConfig::default()).unwrap()
    }

    /// The default document with `key` set to `value`, rendered as YAML
    fn yaml_with(key: &str, value: Value) -> String {
        let mut document = default_document();
        let slot = key
            .split('.')
            .try_fold(&mut document, |node, part| node.get_mut(part))
            .unwrap_or_else(|| panic!("unknown key {}", key));
        *slot = value;
        serde_yaml::to_string(&document).unwrap()
    }

    /// JSON documents are accepted; the ocr section may be left out
    #[test]
    fn test_json_config_without_ocr_section() {
        let file = temp_config(
            ".json",
            r#"{
                "preprocessing": {
                    "clahe": { "clip_limit": 2.0, "tile_grid_size": [8, 8] },
                    "threshold": { "block_size": 31, "k": -0.35 },
                    "morphology": {
                        "guide_removal_kernel": [40, 1],
                        "line_closing_kernel": [30, 3]
                    }
                },
                "segmentation": {
                    "min_line_height": 15,
                    "max_line_height": 60,
                    "horizontal_margin": 0
                }
            }"#,
        );

        let config = PipelineConfig::from_path(file.path()).unwrap();

        assert_eq!(config.preprocessing.threshold.block_size, 31);
        assert_eq!(config.preprocessing.threshold.k, -0.35);
        assert_eq!(config.segmentation.horizontal_margin, 0);
        assert_eq!(config.ocr.confidence_threshold, 0.5);
        assert_eq!(config.ocr.languages, "eng");
    }

    /// A document that leaves out a stage parameter is rejected by key
    #[test]
    fn test_missing_required_key_is_reported() {
        let file = temp_config(
            ".json",
            r#"{
                "preprocessing": { "threshold": { "block_size": 31, "k": -0.35 } },
                "segmentation": { "horizontal_margin": 0 }
            }"#,
        );

        let err = PipelineConfig::from_path(file.path()).unwrap_err();
        match &err {
            PipelineError::Config { key, .. } => {
                assert_eq!(*key, "preprocessing.clahe.clip_limit")
            }
            other => panic!("expected missing key error, got {:?}", other),
        }
        assert!(err.to_string().contains("required key is missing"));

        let mut document = default_document();
        document["segmentation"]
            .as_object_mut()
            .unwrap()
            .remove("max_line_height");
        let err = PipelineConfig::from_yaml_str(&serde_yaml::to_string(&document).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("segmentation.max_line_height"));
    }

    /// A misspelled key fails the load instead of being ignored
    #[test]
    fn test_misspelled_key_is_rejected() {
        let mut document = default_document();
        document["preprocessing"]["threshold"]["block_sise"] = Value::from(31);
        let file = temp_config(".yaml", &serde_yaml::to_string(&document).unwrap());

        let err = PipelineConfig::from_path(file.path()).unwrap_err();

        assert!(matches!(err, PipelineError::ConfigLoad { .. }));
        assert!(err.to_string().contains("block_sise"));
    }

    /// An explicit path takes precedence over everything else
    #[test]
    fn test_explicit_path_is_used() {
        let mut document = default_document();
        document["segmentation"]["min_line_height"] = Value::from(20);
        document["segmentation"]["max_line_height"] = Value::from(80);
        let file = temp_config(".yaml", &serde_yaml::to_string(&document).unwrap());

        let config = PipelineConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.segmentation.min_line_height, 20);
        assert_eq!(config.segmentation.max_line_height, 80);
    }

    /// The environment variable points the loader at a file
    #[test]
    fn test_environment_variable_path() {
        let file = temp_config(
            ".yml",
            &yaml_with("ocr.confidence_threshold", Value::from(0.8)),
        );

        std::env::set_var(CONFIG_PATH_ENV, file.path());
        let result = PipelineConfig::load(None);
        std::env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(result.unwrap().ocr.confidence_threshold, 0.8);
    }

    /// A missing explicit file is a load error naming the path
    #[test]
    fn test_missing_file_is_load_error() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/pipeline.yaml"))).unwrap_err();

        assert!(matches!(err, PipelineError::ConfigLoad { .. }));
        assert!(err.to_string().contains("/nonexistent/pipeline.yaml"));
    }

    /// Each invalid value is rejected with its key in the message
    #[test]
    fn test_invalid_values_name_their_key() {
        let cases = [
            ("preprocessing.clahe.clip_limit", json!(0)),
            ("preprocessing.clahe.tile_grid_size", json!([8, 0])),
            ("preprocessing.threshold.block_size", json!(24)),
            ("preprocessing.threshold.block_size", json!(-25)),
            ("preprocessing.morphology.guide_removal_kernel", json!([0, 1])),
            ("preprocessing.morphology.line_closing_kernel", json!([30, -3])),
            ("segmentation.min_line_height", json!(70)),
            ("segmentation.horizontal_margin", json!(-1)),
            ("ocr.confidence_threshold", json!(1.5)),
        ];

        for (key, value) in cases {
            let document = yaml_with(key, value);
            let err = PipelineConfig::from_yaml_str(&document).unwrap_err();
            match &err {
                PipelineError::Config { key: reported, .. } => {
                    assert_eq!(*reported, key, "document: {}", document)
                }
                other => panic!("expected config error for {}, got {:?}", key, other),
            }
            assert!(err.to_string().contains(key));
        }
    }

    /// Configuration survives a YAML round trip
    #[test]
    fn test_config_serializes_back_to_yaml() {
        let mut config = PipelineConfig::default();
        config.preprocessing.morphology.line_closing_kernel = [45, 5];
        config.ocr.languages = "lat".to_string();

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
