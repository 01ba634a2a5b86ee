//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "taskflow";
const ENV_PREFIX: &str = "TASKFLOW";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_API_PREFIX: &str = "/v1";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_JOB_SYNC_CONCURRENCY: u32 = 2;
const REDIS_SCHEMES: [&str; 3] = ["redis://", "rediss://", "redis+unix://"];

/// Command-line arguments for the taskflow binary.
#[derive(Debug, Parser)]
#[command(name = "taskflow", version, about = "CQRS task service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TASKFLOW_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API together with the read-model workers.
    Serve(Box<ServeArgs>),
    /// Run only the read-model workers.
    Worker(WorkerArgs),
    /// Apply write-store, read-store and queue migrations, then exit.
    Migrate(MigrateArgs),
    /// Repopulate the task cache and its index from the read store, then exit.
    #[command(name = "rebuild-cache")]
    RebuildCache(RebuildCacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverrides {
    /// Override the authoritative (write) database URL.
    #[arg(long = "write-database-url", value_name = "URL")]
    pub write_database_url: Option<String>,

    /// Override the read-model database URL.
    #[arg(long = "read-database-url", value_name = "URL")]
    pub read_database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache URL; a redis:// URL selects the Redis backend.
    #[arg(long = "cache-url", value_name = "URL")]
    pub cache_url: Option<String>,

    /// Override the per-entry cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Run without any cache; every read goes to the read store.
    #[arg(long = "cache-disabled", action = clap::ArgAction::SetTrue)]
    pub cache_disabled: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct JobsOverrides {
    /// Override the created-event worker concurrency.
    #[arg(long = "jobs-created-concurrency", value_name = "COUNT")]
    pub jobs_created_concurrency: Option<u32>,

    /// Override the updated-event worker concurrency.
    #[arg(long = "jobs-updated-concurrency", value_name = "COUNT")]
    pub jobs_updated_concurrency: Option<u32>,

    /// Override the deleted-event worker concurrency.
    #[arg(long = "jobs-deleted-concurrency", value_name = "COUNT")]
    pub jobs_deleted_concurrency: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub jobs: JobsOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the path prefix of the task routes.
    #[arg(long = "server-api-prefix", value_name = "PREFIX")]
    pub server_api_prefix: Option<String>,

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
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub database: DatabaseOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub jobs: JobsOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RebuildCacheArgs {
    #[command(flatten)]
    pub database: DatabaseOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub write_database: DatabaseSettings,
    pub read_database: DatabaseSettings,
    pub cache: CacheSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub api_prefix: String,
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

impl DatabaseSettings {
    /// The URL, or an error naming the missing key.
    pub fn require_url(&self, key: &'static str) -> Result<&str, LoadError> {
        self.url
            .as_deref()
            .ok_or_else(|| LoadError::invalid(key, "a database URL is required"))
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub url: Option<String>,
    pub ttl: Duration,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub created_concurrency: NonZeroU32,
    pub updated_concurrency: NonZeroU32,
    pub deleted_concurrency: NonZeroU32,
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Worker(args)) => {
            raw.apply_database_overrides(&args.database);
            raw.apply_cache_overrides(&args.cache);
            raw.apply_jobs_overrides(&args.jobs);
        }
        Some(Command::Migrate(args)) => raw.apply_database_overrides(&args.database),
        Some(Command::RebuildCache(args)) => {
            raw.apply_database_overrides(&args.database);
            raw.apply_cache_overrides(&args.cache);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    write_database: RawDatabaseSettings,
    read_database: RawDatabaseSettings,
    cache: RawCacheSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(prefix) = overrides.server_api_prefix.as_ref() {
            self.server.api_prefix = Some(prefix.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_database_overrides(&overrides.database);
        self.apply_cache_overrides(&overrides.cache);
        self.apply_jobs_overrides(&overrides.jobs);
    }

    fn apply_database_overrides(&mut self, overrides: &DatabaseOverrides) {
        if let Some(url) = overrides.write_database_url.as_ref() {
            self.write_database.url = Some(url.clone());
        }
        if let Some(url) = overrides.read_database_url.as_ref() {
            self.read_database.url = Some(url.clone());
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(url) = overrides.cache_url.as_ref() {
            self.cache.url = Some(url.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if overrides.cache_disabled {
            self.cache.enabled = Some(false);
        }
    }

    fn apply_jobs_overrides(&mut self, overrides: &JobsOverrides) {
        if let Some(value) = overrides.jobs_created_concurrency {
            self.jobs.created_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_updated_concurrency {
            self.jobs.updated_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_deleted_concurrency {
            self.jobs.deleted_concurrency = Some(value);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            write_database,
            read_database,
            cache,
            jobs,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            write_database: build_database_settings(
                write_database,
                "write_database.max_connections",
            )?,
            read_database: build_database_settings(
                read_database,
                "read_database.max_connections",
            )?,
            cache: build_cache_settings(cache)?,
            jobs: build_jobs_settings(jobs)?,
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

    let api_prefix = server
        .api_prefix
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());
    if !api_prefix.starts_with('/') || (api_prefix.len() > 1 && api_prefix.ends_with('/')) {
        return Err(LoadError::invalid(
            "server.api_prefix",
            "must start with `/` and must not end with `/`",
        ));
    }

    Ok(ServerSettings { addr, api_prefix })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(
    database: RawDatabaseSettings,
    max_connections_key: &'static str,
) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        max_connections_key,
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let url = non_blank(cache.url);
    if let Some(url) = url.as_deref() {
        if !REDIS_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            return Err(LoadError::invalid(
                "cache.url",
                format!("unsupported cache URL `{url}`; expected one of {REDIS_SCHEMES:?}"),
            ));
        }
    }

    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        url,
        ttl: Duration::from_secs(ttl_seconds),
        key_prefix: cache.key_prefix.unwrap_or_default(),
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let created = jobs
        .created_concurrency
        .unwrap_or(DEFAULT_JOB_SYNC_CONCURRENCY);
    let updated = jobs
        .updated_concurrency
        .unwrap_or(DEFAULT_JOB_SYNC_CONCURRENCY);
    let deleted = jobs
        .deleted_concurrency
        .unwrap_or(DEFAULT_JOB_SYNC_CONCURRENCY);

    Ok(JobsSettings {
        created_concurrency: non_zero_u32(created.into(), "jobs.created_concurrency")?,
        updated_concurrency: non_zero_u32(updated.into(), "jobs.updated_concurrency")?,
        deleted_concurrency: non_zero_u32(deleted.into(), "jobs.deleted_concurrency")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    api_prefix: Option<String>,
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
struct RawCacheSettings {
    enabled: Option<bool>,
    url: Option<String>,
    ttl_seconds: Option<u64>,
    key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    created_concurrency: Option<u32>,
    updated_concurrency: Option<u32>,
    deleted_concurrency: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
