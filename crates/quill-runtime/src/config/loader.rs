//! Layered configuration loading.
//!
//! Sources, each overriding the previous one:
//!
//! 1. [`QuillConfig::default`]
//! 2. `quill.{profile}.toml` (or `.yaml` / `.yml`) next to the main file
//! 3. `quill.toml` or `config.toml` (or the YAML equivalents)
//! 4. `QUILL_*` environment variables, nested with `__`
//! 5. Configs passed to [`ConfigLoader::merge`]
//!
//! TOML files need the `toml-config` feature (on by default), YAML files the
//! `yaml-config` feature.
//!
//! ```text
//! QUILL_APPLICATION__TOKEN=xxx          application.token = "xxx"
//! QUILL_SERVER__PORT=9000               server.port = 9000
//! QUILL_STATE__BACKEND__TYPE=sqlite     state.backend.type = "sqlite"
//! ```
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().profile("production").load()?;
//! ```

use std::fmt;
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
use super::schema::QuillConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "QUILL_";

/// File names probed in every search directory, in order.
const CANDIDATES: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "quill.toml",
    #[cfg(feature = "yaml-config")]
    "quill.yaml",
    #[cfg(feature = "yaml-config")]
    "quill.yml",
    #[cfg(feature = "toml-config")]
    "config.toml",
    #[cfg(feature = "yaml-config")]
    "config.yaml",
    #[cfg(feature = "yaml-config")]
    "config.yml",
];

/// Deployment profile selecting `quill.{profile}.*` files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `QUILL_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("QUILL_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects configuration sources and extracts a [`QuillConfig`].
pub struct ConfigLoader {
    overrides: Vec<QuillConfig>,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// When set, search paths are ignored.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Starts with the profile from `QUILL_PROFILE` and environment
    /// variables enabled.
    pub fn new() -> Self {
        Self {
            overrides: Vec::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Probes `path` for config files. Once any directory was added, the
    /// working and user config directories are no longer probed implicitly.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Probes `<user config dir>/quill`.
    pub fn with_user_config_dir(self) -> Self {
        match user_config_dir() {
            Some(dir) => self.search_path(dir),
            None => self,
        }
    }

    /// Loads exactly this file; it must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges `config` above every other source.
    ///
    /// Every field of `config` is merged, so start from a loaded or default
    /// config rather than a sparse one.
    pub fn merge(mut self, config: QuillConfig) -> Self {
        self.overrides.push(config);
        self
    }

    pub fn load(self) -> ConfigResult<QuillConfig> {
        let profile = self.profile.clone();
        let config: QuillConfig = self.into_figment()?.extract()?;

        debug!(
            profile = %profile,
            application_id = %config.application.id,
            log_level = %config.logging.level,
            "Configuration extracted"
        );
        Ok(config)
    }

    fn into_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(QuillConfig::default()));

        figment = match &self.config_file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => merge_file(figment, path)?,
            None => self.merge_discovered(figment)?,
        };

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Merging environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        for config in self.overrides {
            figment = figment.merge(Serialized::defaults(config));
        }
        Ok(figment)
    }

    /// Merges the first candidate found across the search directories,
    /// preceded by its profile variant when one exists.
    fn merge_discovered(&self, mut figment: Figment) -> ConfigResult<Figment> {
        let dirs: Vec<PathBuf> = if self.search_paths.is_empty() {
            std::env::current_dir()
                .ok()
                .into_iter()
                .chain(user_config_dir())
                .collect()
        } else {
            self.search_paths.clone()
        };

        for dir in &dirs {
            for name in CANDIDATES {
                let base = dir.join(name);
                let Some(variant) = profile_variant(&base, &self.profile) else {
                    continue;
                };
                if variant.exists() {
                    figment = merge_file(figment, &variant)?;
                }
                if base.exists() {
                    return merge_file(figment, &base);
                }
            }
        }

        warn!(paths = ?dirs, "No configuration file found, using defaults");
        Ok(figment)
    }
}

fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quill"))
}

/// `dir/quill.toml` becomes `dir/quill.{profile}.toml`.
fn profile_variant(base: &Path, profile: &Profile) -> Option<PathBuf> {
    let stem = base.file_stem()?.to_str()?;
    let ext = base.extension()?.to_str()?;
    Some(base.with_file_name(format!("{stem}.{profile}.{ext}")))
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    info!(path = %path.display(), "Merging configuration file");
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        ext => Err(ConfigError::ParseError(format!(
            "cannot read .{ext} configuration files with the enabled features"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<QuillConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<QuillConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(all(test, feature = "toml-config"))]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, LogLevel};
    use figment::Jail;

    fn load(jail: &Jail, loader: ConfigLoader) -> figment::error::Result<QuillConfig> {
        loader
            .search_path(jail.directory())
            .load()
            .map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = load(jail, ConfigLoader::new().without_env())?;
            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.server.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn file_then_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "quill.toml",
                r#"
                [application]
                id = "123"
                token = "from-file"

                [server]
                port = 9000

                [state.backend]
                type = "sqlite"
                path = "state.db"

                [logging.filters]
                quill_state = "debug"
                "#,
            )?;
            jail.set_env("QUILL_APPLICATION__TOKEN", "from-env");

            let config = load(jail, ConfigLoader::new())?;
            assert_eq!(config.application.id.get(), 123);
            assert_eq!(config.application.token, "from-env");
            assert_eq!(config.server.port, 9000);
            assert_eq!(
                config.state.backend,
                BackendConfig::Sqlite {
                    path: "state.db".into()
                }
            );
            assert_eq!(config.logging.filters["quill_state"], LogLevel::Debug);

            let mut programmatic = config.clone();
            programmatic.server.port = 7000;
            let config = load(jail, ConfigLoader::new().merge(programmatic))?;
            assert_eq!(config.server.port, 7000);
            Ok(())
        });
    }

    #[test]
    fn profile_file_is_overridden_by_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file("quill.production.toml", "[server]\nport = 1\nhost = \"10.0.0.1\"")?;
            jail.create_file("quill.toml", "[server]\nport = 2")?;
            let config = load(jail, ConfigLoader::new().without_env().profile("prod"))?;
            assert_eq!(config.server.host, "10.0.0.1");
            assert_eq!(config.server.port, 2);
            Ok(())
        });
    }

    #[test]
    fn unknown_log_level_fails() {
        Jail::expect_with(|jail| {
            jail.create_file("quill.toml", "[logging]\nlevel = \"loud\"")?;
            let result = ConfigLoader::new()
                .without_env()
                .search_path(jail.directory())
                .load();
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file() {
        let result = ConfigLoader::new().file("/nonexistent/quill.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("QUILL_PROFILE", "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            jail.set_env("QUILL_PROFILE", "Staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            Ok(())
        });
    }
}
