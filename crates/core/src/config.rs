use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub services: ServicesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub public_key: String,
    pub bot_token: SecretString,
    pub application_id: String,
    pub api_base: String,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub ack_deadline_ms: u64,
    pub state_sweep_secs: u64,
    pub state_default_ttl_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
    pub register_commands: bool,
}

/// External collaborators reached over the network. All optional; a missing
/// URL disables the integration and the in-process fallback is used instead.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub document_store_url: Option<String>,
    pub cache_url: Option<String>,
    pub backup_rpc_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub public_key: Option<String>,
    pub bot_token: Option<String>,
    pub application_id: Option<String>,
    pub api_base: Option<String>,
    pub ack_deadline_ms: Option<u64>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub register_commands: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                public_key: String::new(),
                bot_token: String::new().into(),
                application_id: String::new(),
                api_base: "https://discord.com/api/v10".to_owned(),
            },
            engine: EngineConfig {
                ack_deadline_ms: 2_500,
                state_sweep_secs: 5,
                state_default_ttl_secs: 300,
                max_retries: 5,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_owned(),
                port: 8090,
                health_check_port: 8091,
                graceful_shutdown_secs: 15,
                register_commands: false,
            },
            services: ServicesConfig {
                document_store_url: None,
                cache_url: None,
                backup_rpc_url: None,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("parley.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(public_key) = discord.public_key {
                self.discord.public_key = public_key;
            }
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(bot_token_value);
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = application_id;
            }
            if let Some(api_base) = discord.api_base {
                self.discord.api_base = api_base;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(ack_deadline_ms) = engine.ack_deadline_ms {
                self.engine.ack_deadline_ms = ack_deadline_ms;
            }
            if let Some(state_sweep_secs) = engine.state_sweep_secs {
                self.engine.state_sweep_secs = state_sweep_secs;
            }
            if let Some(state_default_ttl_secs) = engine.state_default_ttl_secs {
                self.engine.state_default_ttl_secs = state_default_ttl_secs;
            }
            if let Some(max_retries) = engine.max_retries {
                self.engine.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(register_commands) = server.register_commands {
                self.server.register_commands = register_commands;
            }
        }

        if let Some(services) = patch.services {
            if let Some(document_store_url) = services.document_store_url {
                self.services.document_store_url = Some(document_store_url);
            }
            if let Some(cache_url) = services.cache_url {
                self.services.cache_url = Some(cache_url);
            }
            if let Some(backup_rpc_url) = services.backup_rpc_url {
                self.services.backup_rpc_url = Some(backup_rpc_url);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARLEY_DISCORD_PUBLIC_KEY") {
            self.discord.public_key = value;
        }
        if let Some(value) = read_env("PARLEY_DISCORD_BOT_TOKEN") {
            self.discord.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PARLEY_DISCORD_APPLICATION_ID") {
            self.discord.application_id = value;
        }
        if let Some(value) = read_env("PARLEY_DISCORD_API_BASE") {
            self.discord.api_base = value;
        }

        if let Some(value) = read_env("PARLEY_ENGINE_ACK_DEADLINE_MS") {
            self.engine.ack_deadline_ms = parse_u64("PARLEY_ENGINE_ACK_DEADLINE_MS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_STATE_SWEEP_SECS") {
            self.engine.state_sweep_secs = parse_u64("PARLEY_ENGINE_STATE_SWEEP_SECS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_STATE_DEFAULT_TTL_SECS") {
            self.engine.state_default_ttl_secs =
                parse_u64("PARLEY_ENGINE_STATE_DEFAULT_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_MAX_RETRIES") {
            self.engine.max_retries = parse_u32("PARLEY_ENGINE_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PARLEY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PARLEY_SERVER_PORT") {
            self.server.port = parse_u16("PARLEY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PARLEY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("PARLEY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_SERVER_REGISTER_COMMANDS") {
            self.server.register_commands = parse_bool("PARLEY_SERVER_REGISTER_COMMANDS", &value)?;
        }

        if let Some(value) = read_env("PARLEY_SERVICES_DOCUMENT_STORE_URL") {
            self.services.document_store_url = Some(value);
        }
        if let Some(value) = read_env("PARLEY_SERVICES_CACHE_URL") {
            self.services.cache_url = Some(value);
        }
        if let Some(value) = read_env("PARLEY_SERVICES_BACKUP_RPC_URL") {
            self.services.backup_rpc_url = Some(value);
        }

        let log_level = read_env("PARLEY_LOGGING_LEVEL").or_else(|| read_env("PARLEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARLEY_LOGGING_FORMAT").or_else(|| read_env("PARLEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(public_key) = overrides.public_key {
            self.discord.public_key = public_key;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.discord.bot_token = secret_value(bot_token);
        }
        if let Some(application_id) = overrides.application_id {
            self.discord.application_id = application_id;
        }
        if let Some(api_base) = overrides.api_base {
            self.discord.api_base = api_base;
        }
        if let Some(ack_deadline_ms) = overrides.ack_deadline_ms {
            self.engine.ack_deadline_ms = ack_deadline_ms;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(register_commands) = overrides.register_commands {
            self.server.register_commands = register_commands;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_engine(&self.engine)?;
        validate_server(&self.server)?;
        validate_services(&self.services)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parley.toml"), PathBuf::from("config/parley.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let public_key = discord.public_key.trim();
    if public_key.len() != 64 || !public_key.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConfigError::Validation(
            "discord.public_key must be the 64 hex character Ed25519 key from the developer portal"
                .to_owned(),
        ));
    }

    if discord.bot_token.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from the Discord Developer Portal > Your App > Bot".to_owned()
        ));
    }

    if discord.application_id.trim().is_empty()
        || !discord.application_id.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(ConfigError::Validation(
            "discord.application_id must be the numeric application snowflake".to_owned(),
        ));
    }

    if !discord.api_base.starts_with("http://") && !discord.api_base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "discord.api_base must start with http:// or https://".to_owned(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    // The platform invalidates unacknowledged interactions after 3 seconds.
    if engine.ack_deadline_ms == 0 || engine.ack_deadline_ms > 3_000 {
        return Err(ConfigError::Validation(
            "engine.ack_deadline_ms must be in range 1..=3000".to_owned(),
        ));
    }

    if engine.state_sweep_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.state_sweep_secs must be greater than zero".to_owned(),
        ));
    }

    if engine.state_default_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.state_default_ttl_secs must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_owned()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_owned(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

fn validate_services(services: &ServicesConfig) -> Result<(), ConfigError> {
    for (name, url) in [
        ("services.document_store_url", &services.document_store_url),
        ("services.cache_url", &services.cache_url),
        ("services.backup_rpc_url", &services.backup_rpc_url),
    ] {
        if let Some(url) = url {
            if !url.starts_with("http://") && !url.starts_with("https://") && !url.starts_with("redis://") {
                return Err(ConfigError::Validation(format!(
                    "{name} must start with http://, https:// or redis://"
                )));
            }
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    engine: Option<EnginePatch>,
    server: Option<ServerPatch>,
    services: Option<ServicesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    public_key: Option<String>,
    bot_token: Option<String>,
    application_id: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    ack_deadline_ms: Option<u64>,
    state_sweep_secs: Option<u64>,
    state_default_ttl_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    register_commands: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServicesPatch {
    document_store_url: Option<String>,
    cache_url: Option<String>,
    backup_rpc_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
