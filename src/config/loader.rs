//! Loading and validating `ExportConfig`

use std::path::Path;

use super::types::ExportConfig;
use crate::error::ConfigError;

impl ExportConfig {
    /// Parse a JSON settings document, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ExportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read settings from a JSON file
    ///
    /// A missing file yields the defaults, as a fresh plugin install has no
    /// settings yet.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json_str(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let formula = &self.formula;
        if !(formula.oversampling > 0.0 && formula.oversampling <= 8.0) {
            return Err(ConfigError::Invalid {
                field: "formula.oversampling",
                message: format!("{} is outside (0, 8]", formula.oversampling),
            });
        }
        if !(formula.default_width >= 1.0 && formula.default_height >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "formula.default_width/default_height",
                message: format!(
                    "{}x{} must be at least 1x1",
                    formula.default_width, formula.default_height
                ),
            });
        }
        if formula.max_source_len == 0 {
            return Err(ConfigError::Invalid {
                field: "formula.max_source_len",
                message: "must be greater than zero".to_string(),
            });
        }

        let publish = &self.publish;
        if publish.upload_images && publish.host_endpoint.is_none() {
            return Err(ConfigError::Invalid {
                field: "publish.host_endpoint",
                message: "required when publish.upload_images is set".to_string(),
            });
        }
        if let Some(scheme) = publish.auth_schemes.iter().find(|s| !s.contains("{token}")) {
            return Err(ConfigError::Invalid {
                field: "publish.auth_schemes",
                message: format!("`{scheme}` has no {{token}} placeholder"),
            });
        }
        if let Some(folder) = &publish.save_folder
            && folder.split('/').any(|part| part == "..")
        {
            return Err(ConfigError::Invalid {
                field: "publish.save_folder",
                message: format!("`{folder}` escapes the vault"),
            });
        }

        Ok(())
    }
}
