use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::registry::DEFAULT_INITIAL_LEASE;
use crate::retrieve::{ApiClient, ConnectionError, Credentials};

/// Config file looked up in the working directory when `--config-path` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "signal2x.conf";

/// Port the HTTP server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5000;

/// Darmstadt, the city the service is deployed for.
const DEFAULT_BBOX: &str = "8.609031997891949,49.799331422494326,8.701769255695297,49.94381976422014";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No credentials configured: set SIGNAL2X_ACCESS_TOKEN or SIGNAL2X_CLIENT_SECRET")]
    MissingCredentials,
    #[error("Invalid API client setup: {0}")]
    Client(#[from] ConnectionError),
}

/// Every knob, optional at each layer. Flatten it into a binary's clap parser.
#[derive(Args, Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "SIGNAL2X_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "SIGNAL2X_PORT", help = "Port the HTTP server listens on.")]
    pub port: Option<u16>,

    #[clap(long, env = "SIGNAL2X_BIND_ADDRESS", help = "Address the HTTP server binds to.")]
    pub bind_address: Option<String>,

    #[clap(long, env = "SIGNAL2X_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "SIGNAL2X_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "SIGNAL2X_API_BASE_URL", help = "Base URL of the SPaT service.")]
    pub api_base_url: Option<String>,

    #[clap(long, env = "SIGNAL2X_CLIENT_ID", help = "OAuth client id for the token endpoint.")]
    pub client_id: Option<String>,

    #[clap(long, env = "SIGNAL2X_CLIENT_SECRET", hide_env_values = true, help = "OAuth client secret for the token endpoint.")]
    pub client_secret: Option<String>,

    #[clap(long, env = "SIGNAL2X_ACCESS_TOKEN", hide_env_values = true, help = "Fixed bearer token, skips the token endpoint.")]
    pub access_token: Option<String>,

    #[clap(long, env = "SIGNAL2X_LANES_FILE", help = "Lane map written by get-lane-map and read by live-status.")]
    pub lanes_file: Option<PathBuf>,

    #[clap(long, env = "SIGNAL2X_INTERSECTIONS_FILE", help = "Output file of get-intersections.")]
    pub intersections_file: Option<PathBuf>,

    #[clap(long, env = "SIGNAL2X_TRIGGERS_FILE", help = "Output file of get-trigger-lines.")]
    pub triggers_file: Option<PathBuf>,

    #[clap(long, env = "SIGNAL2X_BBOX", help = "Bounding box (minLon,minLat,maxLon,maxLat) for intersection lookups.")]
    pub bbox: Option<String>,

    #[clap(long, env = "SIGNAL2X_INITIAL_LEASE", help = "Batches a live worker may handle after the last query.")]
    pub initial_lease: Option<u32>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            port: other.port.or(self.port),
            bind_address: other.bind_address.or(self.bind_address),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            api_base_url: other.api_base_url.or(self.api_base_url),
            client_id: other.client_id.or(self.client_id),
            client_secret: other.client_secret.or(self.client_secret),
            access_token: other.access_token.or(self.access_token),
            lanes_file: other.lanes_file.or(self.lanes_file),
            intersections_file: other.intersections_file.or(self.intersections_file),
            triggers_file: other.triggers_file.or(self.triggers_file),
            bbox: other.bbox.or(self.bbox),
            initial_lease: other.initial_lease.or(self.initial_lease),
        }
    }

    /// Built-in defaults, the lowest layer.
    pub fn defaults() -> Config {
        Config {
            port: Some(DEFAULT_PORT),
            bind_address: Some("0.0.0.0".to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            api_base_url: Some("https://spat.signal2xprod.aws.vmz.services".to_string()),
            client_id: Some("spat-app".to_string()),
            lanes_file: Some(PathBuf::from("static/lanes.json")),
            intersections_file: Some(PathBuf::from("intersections.json")),
            triggers_file: Some(PathBuf::from("triggers.json")),
            bbox: Some(DEFAULT_BBOX.to_string()),
            initial_lease: Some(DEFAULT_INITIAL_LEASE),
            ..Default::default()
        }
    }

    /// Reads a JSON config file. Missing or broken files are logged and ignored.
    pub fn from_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
            return None;
        }
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Config>(&raw) {
            Ok(file_config) => Some(file_config),
            Err(e) => {
                log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        }
    }

    /// Fills every gap from [`Config::defaults`] and drops the optionality.
    pub fn resolve(self) -> Settings {
        let merged = Config::defaults().merge(self);
        Settings {
            port: merged.port.unwrap_or(DEFAULT_PORT),
            bind_address: merged.bind_address.unwrap_or_default(),
            log_dir: merged.log_dir.unwrap_or_default(),
            log_level: merged.log_level.unwrap_or_default(),
            api_base_url: merged.api_base_url.unwrap_or_default(),
            client_id: merged.client_id.unwrap_or_default(),
            client_secret: merged.client_secret,
            access_token: merged.access_token,
            lanes_file: merged.lanes_file.unwrap_or_default(),
            intersections_file: merged.intersections_file.unwrap_or_default(),
            triggers_file: merged.triggers_file.unwrap_or_default(),
            bbox: merged.bbox.unwrap_or_default(),
            initial_lease: merged.initial_lease.unwrap_or(DEFAULT_INITIAL_LEASE),
        }
    }
}

/// Layers defaults, the JSON config file and the parsed CLI/env values, in
/// that order of increasing precedence.
pub fn load_config(cli: Config) -> Settings {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current = Config::defaults();
    if let Some(file_config) = Config::from_file(&config_file_path) {
        current = current.merge(file_config);
    }
    current.merge(cli).resolve()
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub bind_address: String,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub api_base_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub lanes_file: PathBuf,
    pub intersections_file: PathBuf,
    pub triggers_file: PathBuf,
    pub bbox: String,
    pub initial_lease: u32,
}

impl Settings {
    /// A fixed access token wins over the client-credentials grant.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Static(token.clone()));
        }
        match self.client_secret.as_ref().filter(|s| !s.is_empty()) {
            Some(secret) => Ok(Credentials::ClientCredentials {
                client_id: self.client_id.clone(),
                client_secret: secret.clone(),
            }),
            None => Err(ConfigError::MissingCredentials),
        }
    }

    /// Unauthenticated client for the configured service.
    pub fn api_client(&self) -> Result<ApiClient, ConfigError> {
        Ok(ApiClient::new(&self.api_base_url, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_resolve_completely() {
        let settings = Config::default().resolve();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(Config::defaults().port, Some(DEFAULT_PORT));
        assert_eq!(settings.bind_address, "0.0.0.0");
        assert_eq!(settings.client_id, "spat-app");
        assert_eq!(settings.lanes_file, PathBuf::from("static/lanes.json"));
        assert_eq!(settings.initial_lease, 5);
        assert_eq!(settings.client_secret, None);
    }

    #[test]
    fn cli_beats_file_beats_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 6000, "logLevel": "debug", "initialLease": 9}}"#).unwrap();

        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            port: Some(7000),
            ..Default::default()
        };
        let settings = load_config(cli);

        assert_eq!(settings.port, 7000);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.initial_lease, 9);
        assert_eq!(settings.bind_address, "0.0.0.0");
    }

    #[test]
    fn broken_config_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(Config::from_file(file.path()).is_none());
        let settings = load_config(Config {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        });
        assert_eq!(settings.port, DEFAULT_PORT);
    }

    #[test]
    fn access_token_wins_over_client_secret() {
        let mut settings = Config::default().resolve();
        assert!(matches!(settings.credentials(), Err(ConfigError::MissingCredentials)));

        settings.client_secret = Some("s3cret".into());
        assert!(matches!(
            settings.credentials(),
            Ok(Credentials::ClientCredentials { ref client_id, .. }) if client_id == "spat-app"
        ));

        settings.access_token = Some("tok".into());
        assert!(matches!(settings.credentials(), Ok(Credentials::Static(ref t)) if t == "tok"));
    }
}
