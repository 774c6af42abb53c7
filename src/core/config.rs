use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::obfuscate::TargetIndex;
use crate::utils::io;

/// File looked up in the base path when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "symshield.json";

/// Shortest generated name accepted. Shorter names make collisions plausible.
pub const MIN_NAME_LENGTH: usize = 20;

/// Root configuration structure for symshield.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    #[serde(default = "default_name_length")]
    pub name_length: usize,

    /// Marker that flags identifiers in manual mode.
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default)]
    pub ignore_modules: Vec<String>,

    #[serde(default = "default_kinds")]
    pub kinds: KindConfig,

    #[serde(default = "default_files")]
    pub files: FilesConfig,

    #[serde(default)]
    pub target_index: TargetIndex,

    #[serde(default = "default_indexer_program")]
    pub indexer_program: String,

    #[serde(default = "default_build_program")]
    pub build_program: String,

    /// Insert the SWIFTSHIELDED marker into project.pbxproj files after a run.
    #[serde(default = "default_tag_projects")]
    pub tag_projects: bool,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            name_length: default_name_length(),
            tag: default_tag(),
            ignore_modules: Vec::new(),
            kinds: default_kinds(),
            files: default_files(),
            target_index: TargetIndex::default(),
            indexer_program: default_indexer_program(),
            build_program: default_build_program(),
            tag_projects: default_tag_projects(),
        }
    }
}

/// Which indexer entity kinds count as declarations and references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindConfig {
    pub declaration_prefix: String,
    pub declaration_kinds: Vec<String>,
    pub reference_prefix: String,
}

/// Source tree discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,

    /// Glob patterns, relative to the base path, never touched.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_name_length() -> usize {
    25
}

fn default_tag() -> String {
    "__s".to_string()
}

fn default_kinds() -> KindConfig {
    KindConfig {
        declaration_prefix: "source.lang.swift.decl.".to_string(),
        declaration_kinds: [
            "class",
            "struct",
            "enum",
            "protocol",
            "function.free",
            "function.method.instance",
            "function.method.static",
            "function.method.class",
        ]
        .iter()
        .map(|k| k.to_string())
        .collect(),
        reference_prefix: "source.lang.swift.ref.".to_string(),
    }
}

fn default_files() -> FilesConfig {
    FilesConfig {
        source_extensions: default_source_extensions(),
        document_extensions: default_document_extensions(),
        exclude: default_exclude(),
    }
}

fn default_source_extensions() -> Vec<String> {
    vec!["swift".to_string(), "h".to_string(), "m".to_string()]
}

fn default_document_extensions() -> Vec<String> {
    vec!["storyboard".to_string(), "xib".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec!["Pods/**".to_string(), "Carthage/**".to_string()]
}

fn default_indexer_program() -> String {
    "sourcekitten".to_string()
}

fn default_build_program() -> String {
    "xcodebuild".to_string()
}

fn default_tag_projects() -> bool {
    true
}

// =============================================================================
// Loading
// =============================================================================

/// Load configuration for a run.
///
/// An explicit path must exist. Otherwise `<base>/symshield.json` is used when
/// present, and built-in defaults when it is not. Invalid JSON is always an error.
pub fn load_config(explicit: Option<&Path>, base_path: &Path) -> Result<ShieldConfig> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = base_path.join(CONFIG_FILE_NAME);
            if !candidate.exists() {
                return Ok(ShieldConfig::default());
            }
            candidate
        }
    };

    let content = io::read_file(&path, "read config")?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

impl ShieldConfig {
    /// Reject settings that would make a run meaningless or unsafe.
    pub fn validate(&self) -> Result<()> {
        if self.name_length < MIN_NAME_LENGTH {
            return Err(Error::config_invalid_value(
                "name_length",
                Some(self.name_length.to_string()),
                format!("must be at least {}", MIN_NAME_LENGTH),
            ));
        }

        if self.tag.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "tag",
                Some(self.tag.clone()),
                "must not be empty",
            ));
        }

        if self.kinds.declaration_prefix.is_empty() || self.kinds.reference_prefix.is_empty() {
            return Err(Error::config_missing_key("kinds", None));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_object() {
        let config: ShieldConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.name_length, 25);
        assert_eq!(config.tag, "__s");
        assert_eq!(config.target_index, TargetIndex::Prescan);
        assert!(config.tag_projects);
        assert!(config.kinds.declaration_kinds.contains(&"class".to_string()));
    }

    #[test]
    fn partial_files_section_keeps_other_defaults() {
        let config: ShieldConfig =
            serde_json::from_str(r#"{"files": {"exclude": ["Vendor/**"]}}"#).unwrap();
        assert_eq!(config.files.exclude, vec!["Vendor/**".to_string()]);
        assert_eq!(config.files.source_extensions, default_source_extensions());
    }

    #[test]
    fn missing_default_file_falls_back_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.build_program, "xcodebuild");
    }

    #[test]
    fn config_file_in_base_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"name_length": 32, "target_index": "document_order"}"#,
        )
        .unwrap();

        let config = load_config(None, dir.path()).unwrap();
        assert_eq!(config.name_length, 32);
        assert_eq!(config.target_index, TargetIndex::DocumentOrder);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ nope").unwrap();

        let err = load_config(None, dir.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("other.json");
        assert!(load_config(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn validate_rejects_short_names_and_empty_tags() {
        let mut config = ShieldConfig::default();
        config.name_length = 8;
        assert_eq!(
            config.validate().unwrap_err().code.as_str(),
            "config.invalid_value"
        );

        let mut config = ShieldConfig::default();
        config.tag = "  ".to_string();
        assert!(config.validate().is_err());

        assert!(ShieldConfig::default().validate().is_ok());
    }
}
