use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How PDF pages are turned into raster images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfExtractionMethod {
    /// Render each page with poppler's `pdftoppm` at the configured DPI.
    Render,
    /// Pull the page's embedded image out with `pdfimages` (no re-render).
    Embedded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfExtraction {
    pub method: PdfExtractionMethod,
    pub dpi: u32,
}

impl Default for PdfExtraction {
    fn default() -> Self {
        Self {
            method: PdfExtractionMethod::Render,
            dpi: 300,
        }
    }
}

/// Settings consumed from the host application's settings store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Parent directory for scratch workspaces. Relative paths are resolved
    /// against `base_path`; unset means the OS temp root.
    pub temp_folder_path: Option<PathBuf>,
    pub pdf_extraction: PdfExtraction,
}

impl ConverterConfig {
    /// Resolves the workspace parent, if configured, against the
    /// application-defined base path.
    pub fn resolved_temp_parent(&self, base_path: &Path) -> Option<PathBuf> {
        self.temp_folder_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_path.join(p)
            }
        })
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConverterConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ConverterConfig, ConfigError> {
    let config: ConverterConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ConverterConfig) -> Result<(), ConfigError> {
    if config.pdf_extraction.dpi == 0 || config.pdf_extraction.dpi > 1200 {
        return Err(ConfigError::Validation {
            message: format!(
                "pdf_extraction.dpi must be in 1..=1200, got {}",
                config.pdf_extraction.dpi
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConverterConfig::default();
        assert!(config.temp_folder_path.is_none());
        assert_eq!(config.pdf_extraction.method, PdfExtractionMethod::Render);
        assert_eq!(config.pdf_extraction.dpi, 300);
    }

    #[test]
    fn test_load_from_str() {
        let json = r#"{
            "temp_folder_path": "scratch",
            "pdf_extraction": { "method": "embedded", "dpi": 150 }
        }"#;
        let config = load_config_from_str(json).unwrap();
        assert_eq!(
            config.temp_folder_path,
            Some(PathBuf::from("scratch"))
        );
        assert_eq!(config.pdf_extraction.method, PdfExtractionMethod::Embedded);
        assert_eq!(config.pdf_extraction.dpi, 150);
    }

    #[test]
    fn test_relative_temp_parent_resolution() {
        let config = load_config_from_str(r#"{ "temp_folder_path": "scratch" }"#).unwrap();
        let resolved = config.resolved_temp_parent(Path::new("/app/data")).unwrap();
        assert_eq!(resolved, PathBuf::from("/app/data/scratch"));

        let config =
            load_config_from_str(r#"{ "temp_folder_path": "/abs/scratch" }"#).unwrap();
        let resolved = config.resolved_temp_parent(Path::new("/app/data")).unwrap();
        assert_eq!(resolved, PathBuf::from("/abs/scratch"));
    }

    #[test]
    fn test_invalid_dpi_rejected() {
        let err =
            load_config_from_str(r#"{ "pdf_extraction": { "method": "render", "dpi": 0 } }"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            load_config_from_str("not json").unwrap_err(),
            ConfigError::ParseJson(_)
        ));
    }
}
