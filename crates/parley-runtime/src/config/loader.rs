//! Configuration loader using figment.
//!
//! This module provides a layered configuration loading system that supports:
//!
//! - **Multiple sources**: TOML/YAML files, environment variables, programmatic merges
//! - **Layered configuration**: Later sources override earlier ones
//! - **Profile support**: `parley.{profile}.toml` next to the main file
//! - **Validation**: every loaded configuration is validated before it is returned
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `parley.toml`
//! - `yaml-config`: enables `parley.yaml` / `parley.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic merges ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`parley.{profile}.toml`)
//! 4. Main config file (`parley.toml`)
//! 5. Environment variables (`PARLEY_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `PARLEY_` prefix with `__` as separator:
//!
//! - `PARLEY_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `PARLEY_CACHE__CONVERSATION_TTL_MINUTES=60` → `cache.conversation_ttl_minutes = 60`
//! - `PARLEY_TRANSPORT__TOKEN=xxx` → `transport.token = "xxx"`
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/parley.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ParleyConfig;
use super::validation::validate_config;

/// Prefix of the environment variables read by the loader.
pub const ENV_PREFIX: &str = "PARLEY_";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "PARLEY_PROFILE";

/// Base file names tried in each search directory, for the enabled formats.
const CONFIG_FILE_NAMES: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "parley.toml",
    #[cfg(feature = "yaml-config")]
    "parley.yaml",
    #[cfg(feature = "yaml-config")]
    "parley.yml",
];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Parses a profile name. `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads the profile from `PARLEY_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic configuration merged over the defaults.
    figment: Figment,
    /// Configuration profile.
    profile: Profile,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the user config directory (`~/.config/parley` on Linux) to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("parley"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration programmatically, over the defaults and under files.
    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<ParleyConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: ParleyConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            conversation_ttl_minutes = config.cache.conversation_ttl_minutes,
            user_ttl_minutes = config.cache.user_ttl_minutes,
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(ParleyConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            let files = self.discover_files();
            if files.is_empty() {
                warn!("No configuration file found, using defaults");
            }
            for path in files {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_config_file(figment, &path)?;
            }
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Merges one file, choosing the provider by extension.
    ///
    /// Extensions whose format feature is disabled are rejected.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => {
                let _ = figment;
                Err(ConfigError::UnsupportedFormat(ext.to_string()))
            }
        }
    }

    /// Directories to search: the configured ones, else the working directory
    /// and the user config directory.
    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("parley")))
            .collect()
    }

    /// `parley.toml` becomes `parley.<profile>.toml`.
    fn profile_variant(&self, file_name: &str) -> Option<String> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        Some(format!("{stem}.{}.{ext}", self.profile))
    }

    /// Finds the files to merge, lowest priority first.
    ///
    /// The first directory holding a base file wins. Its profile variant, if
    /// present, comes before the base file.
    fn discover_files(&self) -> Vec<PathBuf> {
        for dir in self.search_dirs() {
            for name in CONFIG_FILE_NAMES {
                let base = dir.join(name);
                if !base.exists() {
                    continue;
                }

                let mut files = Vec::with_capacity(2);
                if let Some(variant) = self.profile_variant(name) {
                    let variant = dir.join(variant);
                    if variant.exists() {
                        debug!(path = %variant.display(), "Found profile configuration");
                        files.push(variant);
                    }
                }
                files.push(base);
                return files;
            }
        }
        Vec::new()
    }
}

/// Loads configuration from the default locations and environment.
pub fn load_config() -> ConfigResult<ParleyConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file plus the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<ParleyConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, LogLevel, MAX_TTL_MINUTES};
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config, ParleyConfig::default());
            assert_eq!(config.cache.conversation_ttl_minutes, 40);
            assert_eq!(config.cache.user_ttl_minutes, 30);
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("PARLEY_CACHE__USER_TTL_MINUTES", "5");
            jail.set_env("PARLEY_LOGGING__LEVEL", "debug");
            jail.set_env("PARLEY_TRANSPORT__TOKEN", "secret");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.cache.user_ttl_minutes, 5);
            assert_eq!(config.cache.conversation_ttl_minutes, 40);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.transport["token"], "secret");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/nonexistent/parley.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("parley.ini", "level = debug")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("parley.ini"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "ini"));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_profile() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "parley.toml",
                r#"
                [cache]
                conversation_ttl_minutes = 60

                [logging]
                format = "pretty"

                [logging.filters]
                parley_framework = "trace"
                "#,
            )?;
            jail.create_file(
                "parley.production.toml",
                r#"
                [cache]
                user_ttl_minutes = 10
                "#,
            )?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.cache.conversation_ttl_minutes, 60);
            assert_eq!(config.cache.user_ttl_minutes, 10);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(
                config.logging.filters.get("parley_framework"),
                Some(&LogLevel::Trace)
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_ttl_above_bound_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env(
                "PARLEY_CACHE__CONVERSATION_TTL_MINUTES",
                (MAX_TTL_MINUTES + 1).to_string(),
            );
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("parley.toml", "[cache]\nuser_ttl_minutes = 0\n")?;
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }
}
