//! Configuration file support (`~/.sunat/config.toml`).
//!
//! Credentials, endpoint hosts and the polling budget live in a TOML file
//! under the home directory. Individual values can be overridden through
//! `SUNAT_*` environment variables and CLI flags; later sources win per
//! value, and anything left unset falls back to the shipped defaults.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sunat_poll::PollPolicy;

use crate::auth::Credentials;
use crate::client::{DEFAULT_API_BASE_URL, DEFAULT_AUTH_BASE_URL, Endpoints};

/// Environment variable that relocates the config file.
pub const CONFIG_PATH_ENV: &str = "SUNAT_CONFIG_PATH";
/// Environment variables overriding individual credential values.
pub const CLIENT_ID_ENV: &str = "SUNAT_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SUNAT_CLIENT_SECRET";
pub const USERNAME_ENV: &str = "SUNAT_USERNAME";
pub const PASSWORD_ENV: &str = "SUNAT_PASSWORD";
/// Environment variables overriding the endpoint hosts.
pub const AUTH_BASE_URL_ENV: &str = "SUNAT_AUTH_BASE_URL";
pub const API_BASE_URL_ENV: &str = "SUNAT_API_BASE_URL";

/// Keys accepted by [`SunatConfig::set_value`].
pub const KNOWN_KEYS: [&str; 9] = [
    "credentials.client_id",
    "credentials.client_secret",
    "credentials.username",
    "credentials.password",
    "endpoints.auth_base_url",
    "endpoints.api_base_url",
    "poll.max_attempts",
    "poll.initial_delay",
    "poll.interval",
];

/// Nested credentials section.
///
/// All four values are optional in the file since each can come from the
/// environment instead. `Debug` masks the secret pair.
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CredentialsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_deref().map(mask_secret),
            )
            .field("username", &self.username)
            .field("password", &self.password.as_deref().map(mask_secret))
            .finish()
    }
}

/// Nested endpoints section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointsConfig {
    /// Host of the token endpoint.
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
    /// Host of the ingestion API, also used as the OAuth2 scope.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            auth_base_url: default_auth_base_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

fn default_auth_base_url() -> String {
    DEFAULT_AUTH_BASE_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// Configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SunatConfig {
    /// SOL credential values.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Endpoint hosts.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Polling budget for ticket resolution.
    #[serde(default)]
    pub poll: PollPolicy,
}

/// CLI overrides for merging with file and environment values.
///
/// `Option` fields mean "user did not pass this flag" when `None`.
#[derive(Clone, Default)]
pub struct CliOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_base_url: Option<String>,
    pub api_base_url: Option<String>,
    pub max_attempts: Option<u32>,
    pub initial_delay: Option<Duration>,
    pub interval: Option<Duration>,
}

impl SunatConfig {
    /// Where the config file lives: `SUNAT_CONFIG_PATH` if set, otherwise
    /// `~/.sunat/config.toml`.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().context("could not determine the home directory")?;
        Ok(home.join(".sunat").join("config.toml"))
    }

    /// Loads the config file from its default location.
    ///
    /// Returns `Ok(None)` if no config file exists.
    pub fn load() -> Result<Option<Self>> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&path).map(Some)
    }

    /// Loads configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: SunatConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Writes the config to `path`, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Resolves the configuration a command runs with.
    ///
    /// Starts from the file (an explicit path must exist; the default
    /// location may be absent), then applies `SUNAT_*` environment
    /// variables, then CLI flags.
    pub fn effective(config_path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?.unwrap_or_default(),
        };
        config.apply_env();
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Applies `SUNAT_*` environment variables on top of file values.
    ///
    /// Empty variables are ignored so `SUNAT_PASSWORD= sunat ...` does not
    /// silently blank a configured value.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var(CLIENT_ID_ENV)
            && !v.is_empty()
        {
            self.credentials.client_id = Some(v);
        }
        if let Ok(v) = env::var(CLIENT_SECRET_ENV)
            && !v.is_empty()
        {
            self.credentials.client_secret = Some(v);
        }
        if let Ok(v) = env::var(USERNAME_ENV)
            && !v.is_empty()
        {
            self.credentials.username = Some(v);
        }
        if let Ok(v) = env::var(PASSWORD_ENV)
            && !v.is_empty()
        {
            self.credentials.password = Some(v);
        }
        if let Ok(v) = env::var(AUTH_BASE_URL_ENV)
            && !v.is_empty()
        {
            self.endpoints.auth_base_url = v;
        }
        if let Ok(v) = env::var(API_BASE_URL_ENV)
            && !v.is_empty()
        {
            self.endpoints.api_base_url = v;
        }
    }

    /// Applies CLI flags on top of everything else.
    pub fn apply_overrides(&mut self, cli: &CliOverrides) {
        if let Some(v) = &cli.client_id {
            self.credentials.client_id = Some(v.clone());
        }
        if let Some(v) = &cli.client_secret {
            self.credentials.client_secret = Some(v.clone());
        }
        if let Some(v) = &cli.username {
            self.credentials.username = Some(v.clone());
        }
        if let Some(v) = &cli.password {
            self.credentials.password = Some(v.clone());
        }
        if let Some(v) = &cli.auth_base_url {
            self.endpoints.auth_base_url = v.clone();
        }
        if let Some(v) = &cli.api_base_url {
            self.endpoints.api_base_url = v.clone();
        }
        if let Some(v) = cli.max_attempts {
            self.poll.max_attempts = v;
        }
        if let Some(v) = cli.initial_delay {
            self.poll.initial_delay = v;
        }
        if let Some(v) = cli.interval {
            self.poll.interval = v;
        }
    }

    /// Validates the configuration.
    ///
    /// A zero attempt budget is allowed; the resolver still checks once.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.auth_base_url.is_empty() {
            bail!("endpoints.auth_base_url cannot be empty");
        }
        if self.endpoints.api_base_url.is_empty() {
            bail!("endpoints.api_base_url cannot be empty");
        }
        if self.poll.interval.is_zero() {
            bail!("poll.interval must be greater than 0");
        }
        Ok(())
    }

    /// The endpoint pair this config points at.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            auth_base_url: self.endpoints.auth_base_url.clone(),
            api_base_url: self.endpoints.api_base_url.clone(),
        }
    }

    /// Materializes the four credential values, failing with the names of
    /// the missing ones. The values themselves never appear in the error.
    pub fn require_credentials(&self) -> Result<Credentials> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str, value: &Option<String>| -> String {
            match value.as_deref().filter(|v| !v.is_empty()) {
                Some(v) => v.to_string(),
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let credentials = Credentials {
            client_id: take("client_id", &self.credentials.client_id),
            client_secret: take("client_secret", &self.credentials.client_secret),
            username: take("username", &self.credentials.username),
            password: take("password", &self.credentials.password),
        };

        if !missing.is_empty() {
            bail!(
                "missing credentials: {} (set them in the config file or via the SUNAT_* environment variables)",
                missing.join(", ")
            );
        }

        Ok(credentials)
    }

    /// Sets one dotted key, as used by `config set`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "credentials.client_id" => self.credentials.client_id = Some(value.to_string()),
            "credentials.client_secret" => self.credentials.client_secret = Some(value.to_string()),
            "credentials.username" => self.credentials.username = Some(value.to_string()),
            "credentials.password" => self.credentials.password = Some(value.to_string()),
            "endpoints.auth_base_url" => self.endpoints.auth_base_url = value.to_string(),
            "endpoints.api_base_url" => self.endpoints.api_base_url = value.to_string(),
            "poll.max_attempts" => {
                self.poll.max_attempts = value
                    .parse()
                    .with_context(|| format!("{key} takes a number of attempts"))?;
            }
            "poll.initial_delay" => self.poll.initial_delay = parse_duration_value(key, value)?,
            "poll.interval" => self.poll.interval = parse_duration_value(key, value)?,
            other => bail!(
                "unknown config key {other:?}; known keys: {}",
                KNOWN_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// A copy with secret values masked, for `config show`.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        masked.credentials.client_secret = self.credentials.client_secret.as_deref().map(mask_secret);
        masked.credentials.password = self.credentials.password.as_deref().map(mask_secret);
        masked
    }

    /// Generates a commented starter config as a TOML string.
    pub fn default_toml_template() -> String {
        r#"# SUNAT client configuration
# Default location: ~/.sunat/config.toml (override with SUNAT_CONFIG_PATH)

[credentials]
# OAuth2 client pair issued in the SUNAT portal (credenciales API SOL)
# client_id = "..."
# client_secret = "..."
# SOL user and password of the taxpayer
# username = "20600055519MODDATOS"
# password = "..."
# Each value can also come from SUNAT_CLIENT_ID, SUNAT_CLIENT_SECRET,
# SUNAT_USERNAME or SUNAT_PASSWORD.

[endpoints]
# Host of the token endpoint
auth_base_url = "https://api-seguridad.sunat.gob.pe"
# Host of the ingestion API, also used as the OAuth2 scope
api_base_url = "https://api-cpe.sunat.gob.pe"

[poll]
# Status checks before giving up on a ticket
max_attempts = 10
# Delay before the first check
initial_delay = "1s"
# Delay between subsequent checks
interval = "2s"
"#
        .to_string()
    }
}

/// Masks a secret for display: short values are fully starred, longer ones
/// keep a four-character prefix.
pub fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= 8 {
        "*".repeat(len)
    } else {
        let prefix: String = secret.chars().take(4).collect();
        format!("{prefix}****")
    }
}

fn parse_duration_value(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .with_context(|| format!("{key} takes a duration like \"2s\" or \"500ms\""))
}
