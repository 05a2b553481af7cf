//! Layered JSON configuration and resolution against command-line flags.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use brewsync_core::session::{Credentials, Endpoints, DEFAULT_APP_URL, DEFAULT_AUTH_URL};
use brewsync_core::util::{is_http_url, normalize_text_option};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::CliError;

pub const GLOBAL_CONFIG_PATH: &str = "/etc/brewsync/config.json";
pub const PASSWORD_ENV: &str = "BREWSYNC_PASSWORD";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Keys accepted in a config file. Every key is optional so that later
/// files only override what they set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub kbh_file: Option<PathBuf>,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read one config file. `Ok(None)` when it does not exist.
    pub fn load_from_path(path: &Path) -> Result<Option<Self>, CliError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(CliError::Config(format!(
                    "Failed to read config file {}: {error}",
                    path.display()
                )))
            }
        };
        let mut config: Self = serde_json::from_str(&raw).map_err(|error| {
            CliError::Config(format!(
                "Failed to parse config file {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        Ok(Some(config))
    }

    fn normalize(&mut self) {
        self.username = normalize_text_option(self.username.take());
        self.password = normalize_text_option(self.password.take());
        self.auth_url = normalize_text_option(self.auth_url.take());
        self.app_url = normalize_text_option(self.app_url.take());
        self.password_file = self.password_file.take().map(expand_home);
        self.state_dir = self.state_dir.take().map(expand_home);
        self.kbh_file = self.kbh_file.take().map(expand_home);
    }

    /// Overlay `other` onto `self`; keys set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            username: other.username.or(self.username),
            password: other.password.or(self.password),
            password_file: other.password_file.or(self.password_file),
            state_dir: other.state_dir.or(self.state_dir),
            kbh_file: other.kbh_file.or(self.kbh_file),
            auth_url: other.auth_url.or(self.auth_url),
            app_url: other.app_url.or(self.app_url),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }
}

/// Resolve a leading `~` against the home directory. `~user` forms are left
/// alone.
pub fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path,
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("brewsync").join("config.json"))
}

/// Global, then user, then the explicit file, which must exist.
pub fn load_layered(explicit: Option<&Path>) -> Result<FileConfig, CliError> {
    load_layered_from(
        Path::new(GLOBAL_CONFIG_PATH),
        user_config_path().as_deref(),
        explicit,
    )
}

pub fn load_layered_from(
    global: &Path,
    user: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<FileConfig, CliError> {
    let mut config = FileConfig::default();
    for path in std::iter::once(global).chain(user) {
        if let Some(layer) = FileConfig::load_from_path(path)? {
            tracing::debug!("Loaded config from {}", path.display());
            config = config.merge(layer);
        }
    }
    if let Some(path) = explicit {
        let layer = FileConfig::load_from_path(path)?.ok_or_else(|| {
            CliError::Config(format!("Config file not found: {}", path.display()))
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        config = config.merge(layer);
    }
    Ok(config)
}

/// First line of a password file, without the line terminator.
pub fn read_password_file(path: &Path) -> Result<String, CliError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CliError::Config(format!(
            "Failed to read password file {}: {error}",
            path.display()
        ))
    })?;
    let first = raw.lines().next().unwrap_or_default();
    Ok(first.trim_end_matches(['\r', '\n']).to_string())
}

/// Everything a command needs, after flags, files and defaults are merged.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub state_dir: PathBuf,
    pub kbh_file: PathBuf,
    pub auth_url: String,
    pub app_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("state_dir", &self.state_dir)
            .field("kbh_file", &self.kbh_file)
            .field("auth_url", &self.auth_url)
            .field("app_url", &self.app_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Settings {
    /// Flags beat the environment, which beats config files.
    pub fn resolve(
        cli: &Cli,
        file: FileConfig,
        env_password: Option<String>,
    ) -> Result<Self, CliError> {
        let username = normalize_text_option(cli.user.clone()).or(file.username);

        let password = match normalize_text_option(cli.password.clone()) {
            Some(password) => Some(password),
            None => match cli.password_file.clone().map(expand_home) {
                Some(path) => Some(read_password_file(&path)?),
                None => match normalize_text_option(env_password).or(file.password) {
                    Some(password) => Some(password),
                    None => file
                        .password_file
                        .as_deref()
                        .map(read_password_file)
                        .transpose()?,
                },
            },
        };

        let state_dir = match file.state_dir {
            Some(dir) => dir,
            None => default_state_dir()?,
        };
        let kbh_file = match cli.kbh_file.clone().map(expand_home).or(file.kbh_file) {
            Some(path) => path,
            None => default_kbh_file()?,
        };

        let auth_url = file
            .auth_url
            .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());
        let app_url = file.app_url.unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        for (key, url) in [("auth_url", &auth_url), ("app_url", &app_url)] {
            if !is_http_url(url) {
                return Err(CliError::Config(format!(
                    "{key} must start with http:// or https://, got '{url}'"
                )));
            }
        }

        let timeout_secs = file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(CliError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            username,
            password,
            state_dir,
            kbh_file,
            auth_url,
            app_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Login credentials, when both halves are known.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        }
    }

    pub fn endpoints(&self) -> Result<Endpoints, CliError> {
        Ok(Endpoints::new(&self.auth_url, &self.app_url)?)
    }
}

fn default_state_dir() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("brewsync").join("sessions"))
        .ok_or_else(|| {
            CliError::Config("No data directory available; set state_dir".to_string())
        })
}

fn default_kbh_file() -> Result<PathBuf, CliError> {
    dirs::home_dir()
        .map(|home| home.join(".kleiner-brauhelfer").join("kb_daten.sqlite"))
        .ok_or_else(|| {
            CliError::Config("No home directory available; pass --kbhfile".to_string())
        })
}
