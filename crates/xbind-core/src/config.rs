//! Registry-wide binding configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parse::Culture;

/// Defaults applied when a property declares no format of its own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Culture used when a property names none; invariant when unset
    pub default_culture: Option<String>,
    /// Extra chrono patterns tried by free date parsing after the ISO forms
    pub date_time_formats: Vec<String>,
}

impl BindingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every named culture is known
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.default_culture {
            Culture::lookup(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config = BindingConfig::from_json_str(
            r#"{ "default_culture": "de-DE", "date_time_formats": ["%d %b %Y"] }"#,
        )
        .unwrap();
        assert_eq!(config.default_culture.as_deref(), Some("de-DE"));
        assert_eq!(config.date_time_formats, vec!["%d %b %Y".to_string()]);

        let config = BindingConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BindingConfig::default());
    }

    #[test]
    fn test_config_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "default_culture": "en-GB" }}"#).unwrap();
        let config = BindingConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.default_culture.as_deref(), Some("en-GB"));
        assert!(config.date_time_formats.is_empty());

        let err = BindingConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_rejects_unknown_culture() {
        let err = BindingConfig::from_json_str(r#"{ "default_culture": "xx-XX" }"#).unwrap_err();
        assert!(matches!(err, Error::UnknownCulture(name) if name == "xx-XX"));
    }
}
