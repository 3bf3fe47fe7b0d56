//! Configuration for a ringbridge host.
//!
//! TOML config, seed-token resolution (env + keyring + plaintext),
//! translation to `ringbridge_core::BridgeConfig`, and a file-backed
//! `TokenStore` that keeps the rotated refresh token between runs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ringbridge_core::{
    BridgeConfig, Capability, CoreError, Credentials, DEFAULT_NAMESPACE, TokenStore,
};

const KEYRING_SERVICE: &str = "ringbridge";
const KEYRING_SEED_ENTRY: &str = "initial-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// First topic segment of every outbound message.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Seed refresh token (plaintext -- prefer keyring or env var).
    pub initial_token: Option<String>,

    /// Environment variable holding the seed refresh token.
    pub initial_token_env: Option<String>,

    /// Look the seed token up in the system keyring.
    #[serde(default = "default_true")]
    pub use_keyring: bool,

    /// Where the current refresh token is persisted.
    /// Defaults to `token.toml` in the platform data dir.
    pub token_file: Option<PathBuf>,

    /// Announce every listed device on `<namespace>/<location>/device/<id>`.
    #[serde(default = "default_true")]
    pub announce_devices: bool,

    /// Capabilities a device needs to be routed.
    #[serde(default = "default_require")]
    pub require: Vec<Capability>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            initial_token: None,
            initial_token_env: None,
            use_keyring: true,
            token_file: None,
            announce_devices: true,
            require: default_require(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}
fn default_true() -> bool {
    true
}
fn default_require() -> Vec<Capability> {
    vec![Capability::Ding, Capability::Unlock]
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ringbridge", "ringbridge")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the persisted refresh token.
pub fn default_token_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("token.toml"),
        |dirs| dirs.data_dir().join("token.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ringbridge");
    p
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path`, overlaid with `RINGBRIDGE_*` env vars.
/// A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RINGBRIDGE_"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), namespace = %config.namespace, "config loaded");
    Ok(config)
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the seed token: env var, then keyring, then plaintext.
///
/// `None` is not an error: a token may already be persisted.
pub fn resolve_initial_token(cfg: &Config) -> Option<SecretString> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.initial_token_env {
        if let Ok(val) = std::env::var(env_name) {
            debug!(env = %env_name, "seed token from environment");
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if cfg.use_keyring {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_SEED_ENTRY) {
            if let Ok(secret) = entry.get_password() {
                debug!("seed token from keyring");
                return Some(SecretString::from(secret));
            }
        }
    }

    // 3. Plaintext in config
    cfg.initial_token.clone().map(SecretString::from)
}

/// Store a seed token in the system keyring.
pub fn store_initial_token(token: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_SEED_ENTRY).map_err(keyring_error)?;
    entry
        .set_password(token.expose_secret())
        .map_err(keyring_error)
}

fn keyring_error(err: keyring::Error) -> ConfigError {
    ConfigError::Validation {
        field: "keyring".into(),
        reason: err.to_string(),
    }
}

/// Build a `BridgeConfig` from the TOML config.
pub fn to_bridge_config(cfg: &Config) -> Result<BridgeConfig, ConfigError> {
    let namespace = cfg.namespace.trim();
    if namespace.is_empty() || namespace.contains('/') {
        return Err(ConfigError::Validation {
            field: "namespace".into(),
            reason: format!("expected a single topic segment, got '{}'", cfg.namespace),
        });
    }
    if cfg.require.is_empty() {
        return Err(ConfigError::Validation {
            field: "require".into(),
            reason: "at least one capability is needed to select devices".into(),
        });
    }

    Ok(BridgeConfig {
        namespace: namespace.to_owned(),
        credentials: Credentials {
            initial_token: resolve_initial_token(cfg),
            token: None,
        },
        required_capabilities: cfg.require.iter().copied().collect(),
        announce_devices: cfg.announce_devices,
    })
}

/// The token store configured by `cfg`.
pub fn token_store(cfg: &Config) -> FileTokenStore {
    FileTokenStore::new(cfg.token_file.clone().unwrap_or_else(default_token_path))
}

// ── File-backed token store ─────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct TokenFile {
    token: String,
}

/// Persists the current refresh token as a small TOML file.
///
/// Every save rewrites the whole file: last write wins.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: TokenFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(file.token).filter(|t| !t.is_empty()))
    }

    fn write(&self, token: &SecretString) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string_pretty(&TokenFile {
            token: token.expose_secret().to_owned(),
        })?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}

fn persistence_error(err: &ConfigError) -> CoreError {
    CoreError::Persistence {
        message: err.to_string(),
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SecretString>, CoreError> {
        self.read()
            .map(|token| token.map(SecretString::from))
            .map_err(|e| persistence_error(&e))
    }

    fn save(&self, token: &SecretString) -> Result<(), CoreError> {
        self.write(token).map_err(|e| persistence_error(&e))?;
        debug!(path = %self.path.display(), "refresh token persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence_error(&e.into())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn offline(cfg: Config) -> Config {
        Config {
            use_keyring: false,
            ..cfg
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn loads_toml_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
namespace = "building"
initial_token = "seed"
announce_devices = false
require = ["unlock"]
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.namespace, "building");
        assert_eq!(cfg.initial_token.as_deref(), Some("seed"));
        assert!(!cfg.announce_devices);
        assert_eq!(cfg.require, vec![Capability::Unlock]);
    }

    #[test]
    fn save_then_load_preserves_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            namespace: "lobby".into(),
            token_file: Some(dir.path().join("token.toml")),
            ..Config::default()
        };

        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }

    #[test]
    fn plaintext_seed_is_last_resort() {
        let cfg = offline(Config {
            initial_token: Some("plain".into()),
            initial_token_env: Some("RINGBRIDGE_TEST_UNSET_SEED_VAR".into()),
            ..Config::default()
        });
        let token = resolve_initial_token(&cfg).unwrap();
        assert_eq!(token.expose_secret(), "plain");
    }

    #[test]
    fn no_seed_is_not_an_error() {
        assert!(resolve_initial_token(&offline(Config::default())).is_none());
    }

    #[test]
    fn bridge_config_carries_settings() {
        let cfg = offline(Config {
            namespace: " ring ".into(),
            initial_token: Some("abc".into()),
            announce_devices: false,
            ..Config::default()
        });

        let bridge = to_bridge_config(&cfg).unwrap();
        assert_eq!(bridge.namespace, "ring");
        assert!(!bridge.announce_devices);
        assert!(bridge.required_capabilities.contains(Capability::Ding));
        assert!(bridge.required_capabilities.contains(Capability::Unlock));
        assert_eq!(
            bridge
                .credentials
                .initial_token
                .as_ref()
                .map(|t| t.expose_secret().to_owned()),
            Some("abc".to_owned())
        );
    }

    #[test]
    fn rejects_bad_namespace_and_empty_requirements() {
        let slash = offline(Config {
            namespace: "a/b".into(),
            ..Config::default()
        });
        assert!(matches!(
            to_bridge_config(&slash),
            Err(ConfigError::Validation { ref field, .. }) if field == "namespace"
        ));

        let empty = offline(Config {
            require: Vec::new(),
            ..Config::default()
        });
        assert!(matches!(
            to_bridge_config(&empty),
            Err(ConfigError::Validation { ref field, .. }) if field == "require"
        ));
    }

    #[test]
    fn file_token_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("state").join("token.toml"));

        assert!(store.load().unwrap().is_none());
        store.save(&SecretString::from("first".to_owned())).unwrap();
        store.save(&SecretString::from("second".to_owned())).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "second");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_token_file_is_a_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = FileTokenStore::new(&path).load().unwrap_err();
        assert!(matches!(err, CoreError::Persistence { .. }));
    }
}
