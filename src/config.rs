//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::catalog;

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MOVIE_NIGHT_BACK_CONFIG_PATH";
/// Environment variable carrying the catalog API credential.
const CATALOG_KEY_ENV: &str = "TMDB_API_KEY";

/// Settings for the hosted movie catalog. Absent entirely when no credential
/// is configured; the catalog feature is then disabled.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// API credential sent with every call.
    pub api_key: String,
    /// Base URL of the catalog API.
    pub base_url: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Directory for on-device JSON blobs.
    pub data_dir: PathBuf,
    /// Public URL of the front end; room/share links are minted against it.
    pub frontend_url: String,
    /// Catalog settings, `None` when the credential is missing.
    pub catalog: Option<CatalogSettings>,
}

impl AppConfig {
    /// Load the configuration from disk, overlaying environment overrides.
    ///
    /// A missing catalog credential is a configuration error fatal only to
    /// the catalog feature: it is reported once here and the rest of the
    /// engine runs normally.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration");
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        let api_key = env::var(CATALOG_KEY_ENV).ok().or(raw.catalog_api_key);
        let catalog = match api_key {
            Some(api_key) if !api_key.trim().is_empty() => Some(CatalogSettings {
                api_key,
                base_url: raw
                    .catalog_base_url
                    .unwrap_or_else(|| catalog::DEFAULT_BASE_URL.into()),
            }),
            _ => {
                warn!(
                    "no catalog API credential ({} or config); search and discovery disabled",
                    CATALOG_KEY_ENV
                );
                None
            }
        };

        Self {
            data_dir: raw.data_dir.map(PathBuf::from).unwrap_or_else(|| "data".into()),
            frontend_url: raw
                .frontend_url
                .unwrap_or_else(|| "http://localhost:8080".into()),
            catalog,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_dir: Option<String>,
    frontend_url: Option<String>,
    catalog_api_key: Option<String>,
    catalog_base_url: Option<String>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
