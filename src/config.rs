use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::OrganizerError;

pub const DEFAULT_CONFIG_FILE: &str = "nifti-org.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub raw_root: Utf8PathBuf,
    #[serde(default)]
    pub input_root: Option<Utf8PathBuf>,
    pub data_root: Utf8PathBuf,
    pub ledger: Utf8PathBuf,
    pub rules: Utf8PathBuf,
    #[serde(default)]
    pub converter: Option<ConverterEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConverterEntry {
    Shorthand(Utf8PathBuf),
    Detailed(ConverterEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConverterEntryObject {
    #[serde(default)]
    pub program: Option<Utf8PathBuf>,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    pub program: Utf8PathBuf,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub raw_root: Utf8PathBuf,
    pub input_root: Utf8PathBuf,
    pub data_root: Utf8PathBuf,
    pub ledger: Utf8PathBuf,
    pub rules: Utf8PathBuf,
    pub converter: ConverterSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, OrganizerError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Err(OrganizerError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| OrganizerError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| OrganizerError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, OrganizerError> {
        let converter = match config.converter {
            None => default_converter(),
            Some(ConverterEntry::Shorthand(program)) => ConverterSettings {
                program,
                extensions: default_extensions(),
            },
            Some(ConverterEntry::Detailed(obj)) => ConverterSettings {
                program: obj.program.unwrap_or_else(default_program),
                extensions: obj
                    .extensions
                    .map(normalize_extensions)
                    .unwrap_or_else(default_extensions),
            },
        };

        if converter.extensions.is_empty() {
            return Err(OrganizerError::ConfigParse(
                "converter.extensions must not be empty".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            input_root: config
                .input_root
                .unwrap_or_else(|| config.raw_root.clone()),
            raw_root: config.raw_root,
            data_root: config.data_root,
            ledger: config.ledger,
            rules: config.rules,
            converter,
        })
    }
}

pub fn default_converter() -> ConverterSettings {
    ConverterSettings {
        program: default_program(),
        extensions: default_extensions(),
    }
}

pub fn default_program() -> Utf8PathBuf {
    Utf8PathBuf::from("dcm2niix")
}

pub fn default_extensions() -> Vec<String> {
    vec!["nii".to_string(), "bvec".to_string(), "bval".to_string()]
}

fn normalize_extensions(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
