//! Source selection: config file, single document, or a directory of documents.
//!
//! Command-line values override whatever the config file says.

use crate::error::{AdapterError, Result};
use openapi_mcp_tools::{ApiServerConfig, SourceOptions};
use std::path::{Path, PathBuf};

/// Values given on the command line (or through their environment fallbacks).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub spec: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub lenient_security: bool,
}

impl Overrides {
    fn apply(&self, config: &mut ApiServerConfig) {
        if let Some(spec) = &self.spec {
            config.spec.clone_from(spec);
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = Some(timeout_ms);
        }
        if self.lenient_security {
            config.strict_security = false;
        }
    }
}

/// Where tools come from.
#[derive(Debug, Clone)]
pub enum SourcePlan {
    /// One document.
    Single(ApiServerConfig),
    /// Every `.yaml` / `.yml` document of a directory, sharing the same options.
    Directory { dir: PathBuf, options: SourceOptions },
}

/// Decide which documents to load.
///
/// A config file wins over `--spec`, and `--spec` wins over the documents directory. A relative
/// `spec` path inside a config file is resolved against the file's directory.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub fn plan(config_file: Option<&Path>, openapi_dir: &Path, overrides: &Overrides) -> Result<SourcePlan> {
    if let Some(path) = config_file {
        let mut config = ApiServerConfig::from_file(path)?;
        if let Some(parent) = path.parent() {
            config.spec = resolve_relative(&config.spec, parent);
        }
        overrides.apply(&mut config);
        if config.spec.trim().is_empty() {
            return Err(AdapterError::Config(format!(
                "'{}' does not name a document (spec is empty)",
                path.display()
            )));
        }
        return Ok(SourcePlan::Single(config));
    }

    let mut config = ApiServerConfig::new(overrides.spec.clone().unwrap_or_default());
    overrides.apply(&mut config);
    if config.spec.is_empty() {
        Ok(SourcePlan::Directory {
            dir: openapi_dir.to_path_buf(),
            options: SourceOptions::from(&config),
        })
    } else {
        Ok(SourcePlan::Single(config))
    }
}

fn resolve_relative(spec: &str, base: &Path) -> String {
    let is_url = spec.starts_with("http://") || spec.starts_with("https://") || spec.starts_with("file://");
    if is_url || spec.is_empty() || Path::new(spec).is_absolute() {
        spec.to_string()
    } else {
        base.join(spec).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_is_overridden_by_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("source.yaml");
        std::fs::write(
            &path,
            "spec: petstore.yaml\nbaseUrl: http://from-file\ntimeoutMs: 500\n",
        )
        .expect("write");

        let overrides = Overrides {
            base_url: Some("http://from-flag".to_string()),
            lenient_security: true,
            ..Overrides::default()
        };
        let SourcePlan::Single(config) =
            plan(Some(&path), Path::new("./openapi"), &overrides).expect("plan")
        else {
            panic!("expected a single source");
        };
        assert_eq!(config.spec, dir.path().join("petstore.yaml").display().to_string());
        assert_eq!(config.base_url.as_deref(), Some("http://from-flag"));
        assert_eq!(config.timeout_ms, Some(500));
        assert!(!config.strict_security);
    }

    #[test]
    fn url_specs_in_config_files_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("source.yaml");
        std::fs::write(&path, "spec: https://example.com/openapi.json\n").expect("write");

        let SourcePlan::Single(config) =
            plan(Some(&path), Path::new("./openapi"), &Overrides::default()).expect("plan")
        else {
            panic!("expected a single source");
        };
        assert_eq!(config.spec, "https://example.com/openapi.json");
        assert!(config.strict_security);
    }

    #[test]
    fn spec_flag_selects_a_single_document() {
        let overrides = Overrides {
            spec: Some("./api.json".to_string()),
            timeout_ms: Some(1000),
            ..Overrides::default()
        };
        let SourcePlan::Single(config) =
            plan(None, Path::new("./openapi"), &overrides).expect("plan")
        else {
            panic!("expected a single source");
        };
        assert_eq!(config.spec, "./api.json");
        assert_eq!(config.timeout_ms, Some(1000));
    }

    #[test]
    fn without_a_spec_the_directory_is_used() {
        let overrides = Overrides {
            base_url: Some("http://h".to_string()),
            ..Overrides::default()
        };
        let SourcePlan::Directory { dir, options } =
            plan(None, Path::new("/srv/openapi"), &overrides).expect("plan")
        else {
            panic!("expected directory mode");
        };
        assert_eq!(dir, PathBuf::from("/srv/openapi"));
        assert_eq!(options.base_url.as_deref(), Some("http://h"));
        assert!(options.strict_security);
    }

    #[test]
    fn unreadable_config_file_is_an_error() {
        let err = plan(
            Some(Path::new("/no/such/config.yaml")),
            Path::new("./openapi"),
            &Overrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::OpenApi(_)), "{err}");
    }
}
