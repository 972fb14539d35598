use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub google_ads: GoogleAdsConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GoogleAdsConfig {
    pub api_base_url: String,
    pub api_version: String,
    pub developer_token: SecretString,
    pub access_token: SecretString,
    pub login_customer_id: Option<String>,
    pub timeout_secs: u64,
}

impl GoogleAdsConfig {
    /// Base URL of the versioned Google Ads REST surface.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub base_url: Option<String>,
    pub project: Option<String>,
    pub location: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub instructions_collection: String,
    /// Read-only HTTP APIs the model may query for external signals, keyed by name.
    pub external_apis: BTreeMap<String, ExternalApiConfig>,
}

#[derive(Clone, Debug)]
pub struct ExternalApiConfig {
    pub base_url: String,
    pub description: Option<String>,
    pub api_key: Option<SecretString>,
    /// Query parameter the key is sent in.
    pub api_key_param: String,
    pub timeout_secs: u64,
}

impl ExternalApiConfig {
    pub const DEFAULT_KEY_PARAM: &'static str = "key";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// Environment variable holding the key when the file does not set one.
    pub fn key_env_var(name: &str) -> String {
        format!("{}_API_KEY", name.trim().to_ascii_uppercase().replace('-', "_"))
    }
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
    VertexAi,
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
    pub google_ads_developer_token: Option<String>,
    pub google_ads_access_token: Option<String>,
    pub google_ads_login_customer_id: Option<String>,
    pub agent_max_steps: Option<u32>,
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
                url: "sqlite://adpilot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            google_ads: GoogleAdsConfig {
                api_base_url: "https://googleads.googleapis.com".to_string(),
                api_version: "v22".to_string(),
                developer_token: String::new().into(),
                access_token: String::new().into(),
                login_customer_id: None,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                access_token: None,
                base_url: Some("https://generativelanguage.googleapis.com".to_string()),
                project: None,
                location: "us-central1".to_string(),
                model: "gemini-2.5-flash".to_string(),
                timeout_secs: 60,
            },
            agent: AgentConfig {
                max_steps: 12,
                instructions_collection: "CustomerInstructions".to_string(),
                external_apis: BTreeMap::new(),
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
            "gemini" => Ok(Self::Gemini),
            "vertex_ai" | "vertexai" | "vertex" => Ok(Self::VertexAi),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|vertex_ai)"
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("adpilot.toml"));
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

        if let Some(google_ads) = patch.google_ads {
            if let Some(api_base_url) = google_ads.api_base_url {
                self.google_ads.api_base_url = api_base_url;
            }
            if let Some(api_version) = google_ads.api_version {
                self.google_ads.api_version = api_version;
            }
            if let Some(developer_token) = google_ads.developer_token {
                self.google_ads.developer_token = secret_value(developer_token);
            }
            if let Some(access_token) = google_ads.access_token {
                self.google_ads.access_token = secret_value(access_token);
            }
            if let Some(login_customer_id) = google_ads.login_customer_id {
                self.google_ads.login_customer_id = Some(login_customer_id);
            }
            if let Some(timeout_secs) = google_ads.timeout_secs {
                self.google_ads.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(access_token) = llm.access_token {
                self.llm.access_token = Some(secret_value(access_token));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(project) = llm.project {
                self.llm.project = Some(project);
            }
            if let Some(location) = llm.location {
                self.llm.location = location;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_steps) = agent.max_steps {
                self.agent.max_steps = max_steps;
            }
            if let Some(instructions_collection) = agent.instructions_collection {
                self.agent.instructions_collection = instructions_collection;
            }
            for (name, api) in agent.external_apis.unwrap_or_default() {
                self.agent.external_apis.insert(
                    name,
                    ExternalApiConfig {
                        base_url: api.base_url,
                        description: api.description,
                        api_key: api.api_key.map(secret_value),
                        api_key_param: api
                            .api_key_param
                            .unwrap_or_else(|| ExternalApiConfig::DEFAULT_KEY_PARAM.to_string()),
                        timeout_secs: api
                            .timeout_secs
                            .unwrap_or(ExternalApiConfig::DEFAULT_TIMEOUT_SECS),
                    },
                );
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
        if let Some(value) = read_env("ADPILOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ADPILOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ADPILOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ADPILOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ADPILOT_GOOGLE_ADS_API_BASE_URL") {
            self.google_ads.api_base_url = value;
        }
        if let Some(value) = read_env("ADPILOT_GOOGLE_ADS_API_VERSION") {
            self.google_ads.api_version = value;
        }
        if let Some(value) = read_env("ADPILOT_GOOGLE_ADS_DEVELOPER_TOKEN") {
            self.google_ads.developer_token = secret_value(value);
        }
        if let Some(value) = read_env("ADPILOT_GOOGLE_ADS_ACCESS_TOKEN") {
            self.google_ads.access_token = secret_value(value);
        }
        if let Some(value) = read_env("ADPILOT_GOOGLE_ADS_LOGIN_CUSTOMER_ID") {
            self.google_ads.login_customer_id = Some(value);
        }
        if let Some(value) = read_env("ADPILOT_GOOGLE_ADS_TIMEOUT_SECS") {
            self.google_ads.timeout_secs = parse_u64("ADPILOT_GOOGLE_ADS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ADPILOT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ADPILOT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ADPILOT_LLM_ACCESS_TOKEN") {
            self.llm.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ADPILOT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("ADPILOT_LLM_PROJECT") {
            self.llm.project = Some(value);
        }
        if let Some(value) = read_env("ADPILOT_LLM_LOCATION") {
            self.llm.location = value;
        }
        if let Some(value) = read_env("ADPILOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ADPILOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ADPILOT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ADPILOT_AGENT_MAX_STEPS") {
            self.agent.max_steps = parse_u32("ADPILOT_AGENT_MAX_STEPS", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_AGENT_INSTRUCTIONS_COLLECTION") {
            self.agent.instructions_collection = value;
        }
        for (name, api) in &mut self.agent.external_apis {
            if api.api_key.is_none() {
                api.api_key = read_env(&ExternalApiConfig::key_env_var(name)).map(secret_value);
            }
        }

        let log_level =
            read_env("ADPILOT_LOGGING_LEVEL").or_else(|| read_env("ADPILOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ADPILOT_LOGGING_FORMAT").or_else(|| read_env("ADPILOT_LOG_FORMAT"));
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
        if let Some(developer_token) = overrides.google_ads_developer_token {
            self.google_ads.developer_token = secret_value(developer_token);
        }
        if let Some(access_token) = overrides.google_ads_access_token {
            self.google_ads.access_token = secret_value(access_token);
        }
        if let Some(login_customer_id) = overrides.google_ads_login_customer_id {
            self.google_ads.login_customer_id = Some(login_customer_id);
        }
        if let Some(max_steps) = overrides.agent_max_steps {
            self.agent.max_steps = max_steps;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_google_ads(&self.google_ads)?;
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("adpilot.toml"), PathBuf::from("config/adpilot.toml")]
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

fn validate_google_ads(google_ads: &GoogleAdsConfig) -> Result<(), ConfigError> {
    let base_url = google_ads.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "google_ads.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if !google_ads.api_version.trim().starts_with('v') {
        return Err(ConfigError::Validation(
            "google_ads.api_version must look like `v22`".to_string(),
        ));
    }

    if google_ads.developer_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "google_ads.developer_token is required. Find it in the Google Ads API Center of \
             your manager account"
                .to_string(),
        ));
    }

    if google_ads.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "google_ads.access_token is required (an OAuth2 access token with the adwords scope)"
                .to_string(),
        ));
    }

    if let Some(login_customer_id) = &google_ads.login_customer_id {
        let digits = login_customer_id.replace('-', "");
        if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::Validation(
                "google_ads.login_customer_id must be a customer id such as 123-456-7890"
                    .to_string(),
            ));
        }
    }

    if google_ads.timeout_secs == 0 || google_ads.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "google_ads.timeout_secs must be in range 1..=300".to_string(),
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

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let blank_secret = |value: &Option<SecretString>| {
        value.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
    };

    match llm.provider {
        LlmProvider::Gemini => {
            if blank_secret(&llm.api_key) {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the gemini provider".to_string(),
                ));
            }
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the gemini provider".to_string(),
                ));
            }
        }
        LlmProvider::VertexAi => {
            let missing_project =
                llm.project.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing_project {
                return Err(ConfigError::Validation(
                    "llm.project is required for the vertex_ai provider".to_string(),
                ));
            }
            if blank_secret(&llm.access_token) {
                return Err(ConfigError::Validation(
                    "llm.access_token is required for the vertex_ai provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_steps == 0 || agent.max_steps > 50 {
        return Err(ConfigError::Validation(
            "agent.max_steps must be in range 1..=50".to_string(),
        ));
    }

    if agent.instructions_collection.trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.instructions_collection must not be empty".to_string(),
        ));
    }

    for (name, api) in &agent.external_apis {
        let valid_name = !name.is_empty()
            && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid_name {
            return Err(ConfigError::Validation(format!(
                "agent.external_apis key `{name}` must be alphanumeric \
                 (underscores and dashes allowed)"
            )));
        }
        let base_url = api.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "agent.external_apis.{name}.base_url must start with http:// or https://"
            )));
        }
        if api.api_key_param.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "agent.external_apis.{name}.api_key_param must not be empty"
            )));
        }
        if api.timeout_secs == 0 || api.timeout_secs > 300 {
            return Err(ConfigError::Validation(format!(
                "agent.external_apis.{name}.timeout_secs must be in range 1..=300"
            )));
        }
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    google_ads: Option<GoogleAdsPatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleAdsPatch {
    api_base_url: Option<String>,
    api_version: Option<String>,
    developer_token: Option<String>,
    access_token: Option<String>,
    login_customer_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    access_token: Option<String>,
    base_url: Option<String>,
    project: Option<String>,
    location: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_steps: Option<u32>,
    instructions_collection: Option<String>,
    external_apis: Option<BTreeMap<String, ExternalApiPatch>>,
}

#[derive(Debug, Deserialize)]
struct ExternalApiPatch {
    base_url: String,
    description: Option<String>,
    api_key: Option<String>,
    api_key_param: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const CREDENTIAL_VARS: [&str; 3] = [
        "ADPILOT_GOOGLE_ADS_DEVELOPER_TOKEN",
        "ADPILOT_GOOGLE_ADS_ACCESS_TOKEN",
        "ADPILOT_LLM_API_KEY",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_credentials() {
        env::set_var("ADPILOT_GOOGLE_ADS_DEVELOPER_TOKEN", "dev-token-test");
        env::set_var("ADPILOT_GOOGLE_ADS_ACCESS_TOKEN", "ya29.test");
        env::set_var("ADPILOT_LLM_API_KEY", "gemini-key-test");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ADS_DEVELOPER_TOKEN", "dev-from-env");
        env::set_var("TEST_ADS_ACCESS_TOKEN", "ya29.from-env");
        env::set_var("ADPILOT_LLM_API_KEY", "gemini-key-test");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("adpilot.toml");
            fs::write(
                &path,
                r#"
[google_ads]
developer_token = "${TEST_ADS_DEVELOPER_TOKEN}"
access_token = "${TEST_ADS_ACCESS_TOKEN}"
login_customer_id = "123-456-7890"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.google_ads.developer_token.expose_secret() == "dev-from-env",
                "developer token should be loaded from environment",
            )?;
            ensure(
                config.google_ads.access_token.expose_secret() == "ya29.from-env",
                "access token should be loaded from environment",
            )?;
            ensure(
                config.google_ads.login_customer_id.as_deref() == Some("123-456-7890"),
                "login customer id should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_ADS_DEVELOPER_TOKEN", "TEST_ADS_ACCESS_TOKEN", "ADPILOT_LLM_API_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("adpilot.toml");
        fs::write(&path, "[google_ads]\naccess_token = \"${ADPILOT_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                ensure(var == "ADPILOT_TEST_UNSET_VAR", "error should name the missing variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected interpolation failure".to_string()),
        }
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("ADPILOT_LOG_LEVEL", "warn");
        env::set_var("ADPILOT_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["ADPILOT_LOG_LEVEL", "ADPILOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("ADPILOT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("ADPILOT_AGENT_MAX_STEPS", "8");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("adpilot.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[google_ads]
developer_token = "dev-from-file"

[agent]
max_steps = 4
instructions_collection = "Instructions"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.google_ads.developer_token.expose_secret() == "dev-token-test",
                "env developer token should win over file and defaults",
            )?;
            ensure(config.agent.max_steps == 8, "env max steps should win over the file")?;
            ensure(
                config.agent.instructions_collection == "Instructions",
                "file value should win over the default",
            )?;
            Ok(())
        })();

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["ADPILOT_DATABASE_URL", "ADPILOT_AGENT_MAX_STEPS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ADPILOT_GOOGLE_ADS_ACCESS_TOKEN", "ya29.test");
        env::set_var("ADPILOT_LLM_API_KEY", "gemini-key-test");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("google_ads.developer_token")
            );
            ensure(has_message, "validation failure should mention google_ads.developer_token")
        })();

        clear_vars(&CREDENTIAL_VARS);
        result
    }

    #[test]
    fn vertex_provider_requires_project_and_token() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("ADPILOT_LLM_PROVIDER", "vertex_ai");

        let result = (|| -> Result<(), String> {
            let missing_project = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(
                    missing_project,
                    Err(ConfigError::Validation(ref message)) if message.contains("llm.project")
                ),
                "vertex without a project should fail validation",
            )?;

            env::set_var("ADPILOT_LLM_PROJECT", "ads-automation");
            env::set_var("ADPILOT_LLM_ACCESS_TOKEN", "ya29.vertex");
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.provider == LlmProvider::VertexAi, "provider should be vertex")
        })();

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["ADPILOT_LLM_PROVIDER", "ADPILOT_LLM_PROJECT", "ADPILOT_LLM_ACCESS_TOKEN"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ADPILOT_GOOGLE_ADS_DEVELOPER_TOKEN", "dev-secret-value");
        env::set_var("ADPILOT_GOOGLE_ADS_ACCESS_TOKEN", "ya29.secret-value");
        env::set_var("ADPILOT_LLM_API_KEY", "gemini-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("dev-secret-value"), "debug output should not contain token")?;
            ensure(
                !debug.contains("ya29.secret-value"),
                "debug output should not contain access token",
            )?;
            ensure(!debug.contains("gemini-secret-value"), "debug output should not contain key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            ensure(
                config.google_ads.endpoint() == "https://googleads.googleapis.com/v22",
                "endpoint should join base url and version",
            )?;
            Ok(())
        })();

        clear_vars(&CREDENTIAL_VARS);
        result
    }

    #[test]
    fn external_apis_load_from_file_with_key_fallback() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();
        env::set_var("POLLEN_API_KEY", "pollen-secret");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("adpilot.toml");
            fs::write(
                &path,
                r#"
[agent.external_apis.weather]
base_url = "https://weather.example.com/v1"
description = "Daily forecasts by city"
api_key = "weather-secret"
api_key_param = "appid"

[agent.external_apis.pollen]
base_url = "https://pollen.example.com"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;
            let apis = &config.agent.external_apis;

            ensure(apis.len() == 2, "both apis should be loaded")?;
            let weather = apis.get("weather").ok_or("weather api should be present")?;
            ensure(weather.api_key_param == "appid", "file key param should be kept")?;
            ensure(
                weather.api_key.as_ref().map(|key| key.expose_secret()) == Some("weather-secret"),
                "file key should win",
            )?;
            let pollen = apis.get("pollen").ok_or("pollen api should be present")?;
            ensure(pollen.api_key_param == "key", "key param should default to `key`")?;
            ensure(pollen.timeout_secs == 15, "timeout should default to 15 seconds")?;
            ensure(
                pollen.api_key.as_ref().map(|key| key.expose_secret()) == Some("pollen-secret"),
                "key should fall back to POLLEN_API_KEY",
            )?;
            ensure(!format!("{config:?}").contains("weather-secret"), "api keys must stay redacted")
        })();

        clear_vars(&CREDENTIAL_VARS);
        clear_vars(&["POLLEN_API_KEY"]);
        result
    }

    #[test]
    fn external_api_base_url_must_be_http() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_credentials();

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("adpilot.toml");
            fs::write(&path, "[agent.external_apis.aqi]\nbase_url = \"ftp://aqi.example.com\"\n")
                .map_err(|err| err.to_string())?;

            let loaded =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
            ensure(
                matches!(
                    loaded,
                    Err(ConfigError::Validation(ref message))
                        if message.contains("agent.external_apis.aqi.base_url")
                ),
                "a non-http base url should fail validation",
            )
        })();

        clear_vars(&CREDENTIAL_VARS);
        result
    }
}
