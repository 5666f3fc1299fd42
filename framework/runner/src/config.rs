use std::path::Path;

use serde::Deserialize;
use surge_core::prelude::{DeclarationError, StageOptions};

/// The on-disk form of a workload declaration.
///
/// ```toml
/// graceful_stop = "30s"
///
/// [[stages]]
/// duration = "15s"
/// target = 500
/// ```
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeclarationFile {
    #[serde(default)]
    pub stages: Vec<StageOptions>,
    pub graceful_stop: Option<String>,
}

/// Load a declaration file, choosing the format from the file extension.
pub fn load_declaration_file(path: &Path) -> Result<DeclarationFile, DeclarationError> {
    let invalid = |reason: String| DeclarationError::InvalidFile {
        path: path.display().to_string(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("toml") => toml::from_str(&content).map_err(|e| invalid(e.to_string())),
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))
        }
        Some("json") => serde_json::from_str(&content).map_err(|e| invalid(e.to_string())),
        _ => Err(invalid(
            "unsupported file extension, expected toml, yaml, yml or json".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write_declaration(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn reference_stages() -> Vec<StageOptions> {
        vec![
            StageOptions::new("15s", 500),
            StageOptions::new("1m30s", 500),
            StageOptions::new("15s", 0),
        ]
    }

    #[test]
    fn loads_toml() {
        let file = write_declaration(
            ".toml",
            r#"
graceful_stop = "10s"

[[stages]]
duration = "15s"
target = 500

[[stages]]
duration = "1m30s"
target = 500

[[stages]]
duration = "15s"
target = 0
"#,
        );

        let declaration = load_declaration_file(file.path()).unwrap();

        assert_eq!(reference_stages(), declaration.stages);
        assert_eq!(Some("10s".to_string()), declaration.graceful_stop);
    }

    #[test]
    fn loads_yaml() {
        let file = write_declaration(
            ".yaml",
            r#"
stages:
  - duration: 15s
    target: 500
  - duration: 1m30s
    target: 500
  - duration: 15s
    target: 0
"#,
        );

        let declaration = load_declaration_file(file.path()).unwrap();

        assert_eq!(reference_stages(), declaration.stages);
        assert_eq!(None, declaration.graceful_stop);
    }

    #[test]
    fn loads_json() {
        let file = write_declaration(
            ".json",
            r#"{"stages": [{"duration": "15s", "target": 500}, {"duration": "1m30s", "target": 500}, {"duration": "15s", "target": 0}]}"#,
        );

        let declaration = load_declaration_file(file.path()).unwrap();

        assert_eq!(reference_stages(), declaration.stages);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_declaration(".ini", "stages=");

        let err = load_declaration_file(file.path()).unwrap_err();

        assert!(matches!(err, DeclarationError::InvalidFile { .. }));
    }

    #[test]
    fn rejects_unknown_fields() {
        let file = write_declaration(".toml", "vus = 10\n");

        assert!(load_declaration_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_a_declaration_error() {
        let err = load_declaration_file(Path::new("/does/not/exist.toml")).unwrap_err();

        assert!(matches!(err, DeclarationError::InvalidFile { .. }));
    }
}
