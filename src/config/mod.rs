//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sentinel";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_AGENT_ENDPOINT: &str = "https://agent-prod.studio.lyzr.ai/v3/inference/chat/";
const DEFAULT_AGENT_USER_ID: &str = "sentinel@localhost";
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_API_RATE_LIMIT_WINDOW_SECS: u32 = 60;
const DEFAULT_API_RATE_LIMIT_MAX_REQUESTS: u32 = 120;

/// Command-line arguments for the Sentinel binary.
#[derive(Debug, Parser)]
#[command(name = "sentinel", version, about = "Sentinel compliance workflow server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SENTINEL_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Sentinel HTTP service.
    Serve(Box<ServeArgs>),
    /// Bulk-load the reference security catalog from a CSV file.
    #[command(name = "import-securities")]
    ImportSecurities(ImportSecuritiesArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the agent service endpoint.
    #[arg(long = "agents-endpoint", value_name = "URL")]
    pub agents_endpoint: Option<String>,

    /// Override the agent service API key.
    #[arg(long = "agents-api-key", env = "SENTINEL_AGENTS_API_KEY", value_name = "KEY")]
    pub agents_api_key: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ImportSecuritiesArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// CSV file holding the security catalog.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub agents: AgentSettings,
    pub api_rate_limit: ApiRateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Connection details for the external agent service. Agent ids are
/// optional: a missing id leaves that workflow task unconfigured, which
/// the diff service treats as "compare locally".
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub endpoint: Url,
    pub api_key: Option<String>,
    /// Separate key for the diff agent; falls back to `api_key`.
    pub diff_api_key: Option<String>,
    pub user_id: String,
    pub extractor_agent_id: Option<String>,
    pub mapper_agent_id: Option<String>,
    pub gap_agent_id: Option<String>,
    pub diff_agent_id: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ApiRateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SENTINEL").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::ImportSecurities(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    agents: RawAgentSettings,
    api_rate_limit: RawApiRateLimitSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAgentSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    diff_api_key: Option<String>,
    user_id: Option<String>,
    extractor_agent_id: Option<String>,
    mapper_agent_id: Option<String>,
    gap_agent_id: Option<String>,
    diff_agent_id: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiRateLimitSettings {
    window_seconds: Option<u32>,
    max_requests: Option<u32>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(endpoint) = overrides.agents_endpoint.as_ref() {
            self.agents.endpoint = Some(endpoint.clone());
        }
        if let Some(key) = overrides.agents_api_key.as_ref() {
            self.agents.api_key = Some(key.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            agents,
            api_rate_limit,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            agents: build_agent_settings(agents)?,
            api_rate_limit: build_api_rate_limit_settings(api_rate_limit)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str())
            .map_err(|err| LoadError::invalid("logging.level", format!("failed to parse: {err}")))?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_agent_settings(agents: RawAgentSettings) -> Result<AgentSettings, LoadError> {
    let endpoint = agents
        .endpoint
        .unwrap_or_else(|| DEFAULT_AGENT_ENDPOINT.to_string());
    let endpoint = Url::parse(&endpoint)
        .map_err(|err| LoadError::invalid("agents.endpoint", err.to_string()))?;

    let timeout_secs = agents.timeout_seconds.unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "agents.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let non_empty = |value: Option<String>| {
        value.and_then(|inner| {
            let trimmed = inner.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    };

    Ok(AgentSettings {
        endpoint,
        api_key: non_empty(agents.api_key),
        diff_api_key: non_empty(agents.diff_api_key),
        user_id: agents
            .user_id
            .unwrap_or_else(|| DEFAULT_AGENT_USER_ID.to_string()),
        extractor_agent_id: non_empty(agents.extractor_agent_id),
        mapper_agent_id: non_empty(agents.mapper_agent_id),
        gap_agent_id: non_empty(agents.gap_agent_id),
        diff_agent_id: non_empty(agents.diff_agent_id),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_api_rate_limit_settings(
    api_rate_limit: RawApiRateLimitSettings,
) -> Result<ApiRateLimitSettings, LoadError> {
    Ok(ApiRateLimitSettings {
        window_seconds: non_zero_u32(
            api_rate_limit
                .window_seconds
                .unwrap_or(DEFAULT_API_RATE_LIMIT_WINDOW_SECS),
            "api_rate_limit.window_seconds",
        )?,
        max_requests: non_zero_u32(
            api_rate_limit
                .max_requests
                .unwrap_or(DEFAULT_API_RATE_LIMIT_MAX_REQUESTS),
            "api_rate_limit.max_requests",
        )?,
    })
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    format!("{host}:{port}")
        .parse()
        .map_err(|err| format!("failed to parse `{host}:{port}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(RawSettings::default()).unwrap();
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert!(settings.database.url.is_none());
        assert_eq!(
            settings.database.max_connections.get(),
            DEFAULT_DB_MAX_CONNECTIONS
        );
        assert!(settings.agents.api_key.is_none());
        assert!(settings.agents.extractor_agent_id.is_none());
        assert_eq!(
            settings.agents.timeout.as_secs(),
            DEFAULT_AGENT_TIMEOUT_SECS
        );
    }

    #[test]
    fn serve_overrides_take_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(8080);
        raw.apply_serve_overrides(&ServeOverrides {
            server_port: Some(9090),
            database_url: Some("postgres://example/sentinel".into()),
            agents_api_key: Some("key".into()),
            ..ServeOverrides::default()
        });

        let settings = Settings::from_raw(raw).unwrap();
        assert_eq!(settings.server.addr.port(), 9090);
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://example/sentinel")
        );
        assert_eq!(settings.agents.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn rejects_zero_port() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "server.port"
        ));
    }

    #[test]
    fn rejects_malformed_agent_endpoint() {
        let mut raw = RawSettings::default();
        raw.agents.endpoint = Some("not a url".into());
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "agents.endpoint"
        ));
    }

    #[test]
    fn blank_agent_ids_read_as_unconfigured() {
        let mut raw = RawSettings::default();
        raw.agents.extractor_agent_id = Some("  ".into());
        raw.agents.diff_agent_id = Some("agent-123".into());
        let settings = Settings::from_raw(raw).unwrap();
        assert!(settings.agents.extractor_agent_id.is_none());
        assert_eq!(settings.agents.diff_agent_id.as_deref(), Some("agent-123"));
    }

    #[test]
    fn log_level_parses() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("debug".into());
        let settings = Settings::from_raw(raw).unwrap();
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }
}
