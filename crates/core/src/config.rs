use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub messaging: MessagingConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub delivery: DeliveryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MessagingConfig {
    pub api_url: String,
    pub api_token: SecretString,
    pub sender_id: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// TTL for the bot-processing lock taken around a single message.
    pub bot_lock_ttl_secs: u64,
    /// How long an operator send path waits for an in-flight bot lock
    /// before proceeding anyway.
    pub owner_wait_timeout_ms: u64,
    /// Interval of the background sweep that purges expired lock entries.
    pub sweep_interval_secs: u64,
    /// Rolling history window handed to the AI Director.
    pub history_turns: u32,
}

#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    pub in_city_fee_cents: i64,
    pub out_of_city_fee_cents: i64,
    /// Address substrings that qualify for the in-city fee.
    pub city_keywords: Vec<String>,
}

impl DeliveryConfig {
    /// Delivery fee in cents for a destination address. An address matching
    /// any city keyword gets the in-city rate, everything else ships at the
    /// out-of-city rate.
    pub fn fee_cents_for(&self, address: &str) -> i64 {
        let normalized = address.to_ascii_lowercase();
        let in_city = self
            .city_keywords
            .iter()
            .any(|keyword| normalized.contains(&keyword.to_ascii_lowercase()));
        if in_city {
            self.in_city_fee_cents
        } else {
            self.out_of_city_fee_cents
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub messaging_api_url: Option<String>,
    pub messaging_api_token: Option<String>,
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
            database: DatabaseConfig {
                url: "sqlite://cartly.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            messaging: MessagingConfig {
                api_url: "https://graph.example.com/v19.0".to_string(),
                api_token: String::new().into(),
                sender_id: String::new(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                max_tokens: 512,
            },
            agent: AgentConfig {
                bot_lock_ttl_secs: 30,
                owner_wait_timeout_ms: 2_000,
                sweep_interval_secs: 60,
                history_turns: 10,
            },
            delivery: DeliveryConfig {
                in_city_fee_cents: 6_000,
                out_of_city_fee_cents: 12_000,
                city_keywords: vec!["dhaka".to_string()],
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cartly.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(messaging) = patch.messaging {
            if let Some(api_url) = messaging.api_url {
                self.messaging.api_url = api_url;
            }
            if let Some(api_token_value) = messaging.api_token {
                self.messaging.api_token = secret_value(api_token_value);
            }
            if let Some(sender_id) = messaging.sender_id {
                self.messaging.sender_id = sender_id;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(bot_lock_ttl_secs) = agent.bot_lock_ttl_secs {
                self.agent.bot_lock_ttl_secs = bot_lock_ttl_secs;
            }
            if let Some(owner_wait_timeout_ms) = agent.owner_wait_timeout_ms {
                self.agent.owner_wait_timeout_ms = owner_wait_timeout_ms;
            }
            if let Some(sweep_interval_secs) = agent.sweep_interval_secs {
                self.agent.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(history_turns) = agent.history_turns {
                self.agent.history_turns = history_turns;
            }
        }

        if let Some(delivery) = patch.delivery {
            if let Some(in_city_fee_cents) = delivery.in_city_fee_cents {
                self.delivery.in_city_fee_cents = in_city_fee_cents;
            }
            if let Some(out_of_city_fee_cents) = delivery.out_of_city_fee_cents {
                self.delivery.out_of_city_fee_cents = out_of_city_fee_cents;
            }
            if let Some(city_keywords) = delivery.city_keywords {
                self.delivery.city_keywords = city_keywords;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("CARTLY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARTLY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CARTLY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARTLY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CARTLY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTLY_MESSAGING_API_URL") {
            self.messaging.api_url = value;
        }
        if let Some(value) = read_env("CARTLY_MESSAGING_API_TOKEN") {
            self.messaging.api_token = secret_value(value);
        }
        if let Some(value) = read_env("CARTLY_MESSAGING_SENDER_ID") {
            self.messaging.sender_id = value;
        }

        if let Some(value) = read_env("CARTLY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CARTLY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CARTLY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CARTLY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CARTLY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CARTLY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTLY_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("CARTLY_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("CARTLY_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("CARTLY_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("CARTLY_AGENT_BOT_LOCK_TTL_SECS") {
            self.agent.bot_lock_ttl_secs = parse_u64("CARTLY_AGENT_BOT_LOCK_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTLY_AGENT_OWNER_WAIT_TIMEOUT_MS") {
            self.agent.owner_wait_timeout_ms =
                parse_u64("CARTLY_AGENT_OWNER_WAIT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("CARTLY_AGENT_SWEEP_INTERVAL_SECS") {
            self.agent.sweep_interval_secs = parse_u64("CARTLY_AGENT_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTLY_AGENT_HISTORY_TURNS") {
            self.agent.history_turns = parse_u32("CARTLY_AGENT_HISTORY_TURNS", &value)?;
        }

        if let Some(value) = read_env("CARTLY_DELIVERY_IN_CITY_FEE_CENTS") {
            self.delivery.in_city_fee_cents = parse_i64("CARTLY_DELIVERY_IN_CITY_FEE_CENTS", &value)?;
        }
        if let Some(value) = read_env("CARTLY_DELIVERY_OUT_OF_CITY_FEE_CENTS") {
            self.delivery.out_of_city_fee_cents =
                parse_i64("CARTLY_DELIVERY_OUT_OF_CITY_FEE_CENTS", &value)?;
        }

        if let Some(value) = read_env("CARTLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARTLY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("CARTLY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("CARTLY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CARTLY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("CARTLY_LOGGING_LEVEL").or_else(|| read_env("CARTLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTLY_LOGGING_FORMAT").or_else(|| read_env("CARTLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(messaging_api_url) = overrides.messaging_api_url {
            self.messaging.api_url = messaging_api_url;
        }
        if let Some(messaging_api_token) = overrides.messaging_api_token {
            self.messaging.api_token = secret_value(messaging_api_token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_messaging(&self.messaging)?;
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_delivery(&self.delivery)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cartly.toml"), PathBuf::from("config/cartly.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_messaging(messaging: &MessagingConfig) -> Result<(), ConfigError> {
    if messaging.api_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "messaging.api_token is required (set it in cartly.toml or CARTLY_MESSAGING_API_TOKEN)"
                .to_string(),
        ));
    }

    let api_url = messaging.api_url.trim();
    if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "messaging.api_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation("llm.max_tokens must be greater than zero".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.bot_lock_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "agent.bot_lock_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if agent.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "agent.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    if agent.history_turns == 0 {
        return Err(ConfigError::Validation(
            "agent.history_turns must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_delivery(delivery: &DeliveryConfig) -> Result<(), ConfigError> {
    if delivery.in_city_fee_cents < 0 || delivery.out_of_city_fee_cents < 0 {
        return Err(ConfigError::Validation(
            "delivery fees must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    messaging: Option<MessagingPatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    delivery: Option<DeliveryPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagingPatch {
    api_url: Option<String>,
    api_token: Option<String>,
    sender_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    bot_lock_ttl_secs: Option<u64>,
    owner_wait_timeout_ms: Option<u64>,
    sweep_interval_secs: Option<u64>,
    history_turns: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DeliveryPatch {
    in_city_fee_cents: Option<i64>,
    out_of_city_fee_cents: Option<i64>,
    city_keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
