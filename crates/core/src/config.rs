use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::analysis::UnknownVariant;
use crate::domain::AnalysisVariant;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tool_turns: u32,
    pub temperature: Option<f32>,
    pub fixture_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub variant: AnalysisVariant,
    pub max_upload_bytes: u64,
    pub max_concurrent: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
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
    Gemini,
    Fixture,
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
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_fixture_path: Option<PathBuf>,
    pub analysis_variant: Option<AnalysisVariant>,
    pub server_port: Option<u16>,
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
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: "gemini-2.0-flash".to_string(),
                timeout_secs: 120,
                max_tool_turns: 4,
                temperature: None,
                fixture_path: None,
            },
            analysis: AnalysisConfig {
                variant: AnalysisVariant::Commentary,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                max_concurrent: 4,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
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
            "gemini" | "googleai" => Ok(Self::Gemini),
            "fixture" => Ok(Self::Fixture),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|fixture)"
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
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("hoops.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_tool_turns) = llm.max_tool_turns {
                self.llm.max_tool_turns = max_tool_turns;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = Some(temperature);
            }
            if let Some(fixture_path) = llm.fixture_path {
                self.llm.fixture_path = Some(fixture_path);
            }
        }

        if let Some(analysis) = patch.analysis {
            if let Some(variant) = analysis.variant {
                self.analysis.variant = variant.parse().map_err(|error: UnknownVariant| {
                    ConfigError::Validation(format!("analysis.variant: {error}"))
                })?;
            }
            if let Some(max_upload_bytes) = analysis.max_upload_bytes {
                self.analysis.max_upload_bytes = max_upload_bytes;
            }
            if let Some(max_concurrent) = analysis.max_concurrent {
                self.analysis.max_concurrent = max_concurrent;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HOOPS_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("HOOPS_LLM_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HOOPS_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("HOOPS_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HOOPS_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HOOPS_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HOOPS_LLM_MAX_TOOL_TURNS") {
            self.llm.max_tool_turns = parse_u32("HOOPS_LLM_MAX_TOOL_TURNS", &value)?;
        }
        if let Some(value) = read_env("HOOPS_LLM_TEMPERATURE") {
            self.llm.temperature = Some(parse_f32("HOOPS_LLM_TEMPERATURE", &value)?);
        }
        if let Some(value) = read_env("HOOPS_LLM_FIXTURE_PATH") {
            self.llm.fixture_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("HOOPS_ANALYSIS_VARIANT") {
            self.analysis.variant = parse_variant("HOOPS_ANALYSIS_VARIANT", &value)?;
        }
        if let Some(value) = read_env("HOOPS_ANALYSIS_MAX_UPLOAD_BYTES") {
            self.analysis.max_upload_bytes = parse_u64("HOOPS_ANALYSIS_MAX_UPLOAD_BYTES", &value)?;
        }
        if let Some(value) = read_env("HOOPS_ANALYSIS_MAX_CONCURRENT") {
            self.analysis.max_concurrent = parse_usize("HOOPS_ANALYSIS_MAX_CONCURRENT", &value)?;
        }

        if let Some(value) = read_env("HOOPS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HOOPS_SERVER_PORT") {
            self.server.port = parse_u16("HOOPS_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("HOOPS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HOOPS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HOOPS_LOGGING_LEVEL").or_else(|| read_env("HOOPS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("HOOPS_LOGGING_FORMAT").or_else(|| read_env("HOOPS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(fixture_path) = overrides.llm_fixture_path {
            self.llm.fixture_path = Some(fixture_path);
        }
        if let Some(variant) = overrides.analysis_variant {
            self.analysis.variant = variant;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_analysis(&self.analysis)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("hoops.toml"), PathBuf::from("config/hoops.toml")]
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

/// Expands `${VAR}` from the environment. Comment lines are copied verbatim.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }
        interpolate_line(line, &mut output)?;
    }

    Ok(output)
}

fn interpolate_line(line: &str, output: &mut String) -> Result<(), ConfigError> {
    let mut chars = line.chars().peekable();

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

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if llm.max_tool_turns == 0 || llm.max_tool_turns > 16 {
        return Err(ConfigError::Validation(
            "llm.max_tool_turns must be in range 1..=16".to_string(),
        ));
    }

    if let Some(temperature) = llm.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Validation(
                "llm.temperature must be in range 0.0..=2.0".to_string(),
            ));
        }
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::Gemini => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the gemini provider. Create one at https://aistudio.google.com/apikey".to_string(),
                ));
            }
            if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "llm.base_url must start with http:// or https://".to_string(),
                ));
            }
        }
        LlmProvider::Fixture => {
            if llm.fixture_path.is_none() {
                return Err(ConfigError::Validation(
                    "llm.fixture_path is required for the fixture provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    if analysis.max_upload_bytes == 0 {
        return Err(ConfigError::Validation(
            "analysis.max_upload_bytes must be greater than zero".to_string(),
        ));
    }

    if analysis.max_concurrent == 0 {
        return Err(ConfigError::Validation(
            "analysis.max_concurrent must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_variant(key: &str, value: &str) -> Result<AnalysisVariant, ConfigError> {
    value.parse::<AnalysisVariant>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    analysis: Option<AnalysisPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_tool_turns: Option<u32>,
    temperature: Option<f32>,
    fixture_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    variant: Option<String>,
    max_upload_bytes: Option<u64>,
    max_concurrent: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
