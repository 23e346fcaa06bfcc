//! INI file configuration adapter.
//!
//! Also serves instrument metadata from `[instrument.<symbol>]` sections.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::config::{instrument_from_config, instrument_section};
use crate::domain::config_validation::validate_instrument;
use crate::domain::error::TraderError;
use crate::domain::instrument::InstrumentSpec;
use crate::ports::config_port::ConfigPort;
use crate::ports::instrument_port::InstrumentInfo;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .load(path.as_ref())
            .map_err(|reason| TraderError::ConfigParse {
                file: path.as_ref().display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, TraderError> {
        self.config
            .getint(section, key)
            .map(|v| v.unwrap_or(default))
            .map_err(|_| Self::not_a(section, key, self.config.get(section, key), "an integer"))
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, TraderError> {
        self.config
            .getfloat(section, key)
            .map(|v| v.unwrap_or(default))
            .map_err(|_| Self::not_a(section, key, self.config.get(section, key), "a number"))
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, TraderError> {
        match self.config.get(section, key) {
            None => Ok(default),
            Some(raw) => Self::parse_bool(&raw)
                .ok_or_else(|| Self::not_a(section, key, Some(raw), "a boolean")),
        }
    }

    fn has_section(&self, section: &str) -> bool {
        let wanted = section.to_lowercase();
        self.sections().iter().any(|s| *s == wanted)
    }

    fn sections(&self) -> Vec<String> {
        let mut sections: Vec<String> = self
            .config
            .sections()
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        sections.sort();
        sections
    }
}

impl InstrumentInfo for FileConfigAdapter {
    /// Metadata is checked with the same rules as startup validation, so a
    /// symbol picked at runtime cannot bring in unusable lot bounds.
    fn lookup(&self, symbol: &str) -> Result<InstrumentSpec, TraderError> {
        let spec = instrument_from_config(self, symbol)?;
        validate_instrument(&spec)?;
        Ok(spec)
    }
}

impl FileConfigAdapter {
    /// Symbols that have an `[instrument.<symbol>]` section.
    pub fn configured_instruments(&self) -> Vec<String> {
        let prefix = instrument_section("");
        self.sections()
            .iter()
            .filter_map(|s| s.strip_prefix(&prefix).map(str::to_uppercase))
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn not_a(section: &str, key: &str, raw: Option<String>, what: &str) -> TraderError {
        TraderError::invalid(
            section,
            key,
            format!("'{}' is not {what}", raw.unwrap_or_default().trim()),
        )
    }
}
