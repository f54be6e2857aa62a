use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// One credentialed provider/model pair the router may call. The file never
/// carries the key itself, only the name of the env var holding it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    /// OpenAI-compatible API root. Optional for providers with a well-known
    /// default endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProvidersFile {
    pub providers: Vec<ProviderConfig>,
}

/// Load and validate the provider pool configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails
/// validation.
pub fn load_providers(path: &Path) -> Result<ProvidersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProvidersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ProvidersFile =
        serde_yaml::from_str(&content).map_err(ConfigError::ProvidersFileParse)?;

    validate_providers(&file)?;

    Ok(file)
}

fn validate_providers(file: &ProvidersFile) -> Result<(), ConfigError> {
    if file.providers.is_empty() {
        return Err(ConfigError::Validation(
            "providers config must list at least one provider".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for entry in &file.providers {
        if entry.provider.trim().is_empty()
            || entry.model.trim().is_empty()
            || entry.api_key_env.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "provider, model, and api_key_env must be non-empty".to_string(),
            ));
        }
        if !seen.insert((entry.provider.to_lowercase(), entry.model.clone())) {
            return Err(ConfigError::Validation(format!(
                "duplicate provider/model pair: {}/{}",
                entry.provider, entry.model
            )));
        }
    }

    Ok(())
}
