use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use adpilot_core::config::{AppConfig, ExternalApiConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: &str, env_key: &str| {
        lines.push(render_line(key, value, source(key, env_key)));
    };

    push("database.url", &config.database.url, "ADPILOT_DATABASE_URL");
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "ADPILOT_DATABASE_MAX_CONNECTIONS",
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "ADPILOT_DATABASE_TIMEOUT_SECS",
    );

    push("google_ads.endpoint", &config.google_ads.endpoint(), "ADPILOT_GOOGLE_ADS_API_VERSION");
    push(
        "google_ads.developer_token",
        &redact_token(config.google_ads.developer_token.expose_secret()),
        "ADPILOT_GOOGLE_ADS_DEVELOPER_TOKEN",
    );
    push(
        "google_ads.access_token",
        &redact_token(config.google_ads.access_token.expose_secret()),
        "ADPILOT_GOOGLE_ADS_ACCESS_TOKEN",
    );
    push(
        "google_ads.login_customer_id",
        config.google_ads.login_customer_id.as_deref().unwrap_or("<unset>"),
        "ADPILOT_GOOGLE_ADS_LOGIN_CUSTOMER_ID",
    );
    push(
        "google_ads.timeout_secs",
        &config.google_ads.timeout_secs.to_string(),
        "ADPILOT_GOOGLE_ADS_TIMEOUT_SECS",
    );

    push("llm.provider", &format!("{:?}", config.llm.provider), "ADPILOT_LLM_PROVIDER");
    push("llm.model", &config.llm.model, "ADPILOT_LLM_MODEL");
    push(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        "ADPILOT_LLM_BASE_URL",
    );
    push("llm.api_key", optional_secret(&config.llm.api_key), "ADPILOT_LLM_API_KEY");
    push(
        "llm.access_token",
        optional_secret(&config.llm.access_token),
        "ADPILOT_LLM_ACCESS_TOKEN",
    );
    push("llm.project", config.llm.project.as_deref().unwrap_or("<unset>"), "ADPILOT_LLM_PROJECT");
    push("llm.location", &config.llm.location, "ADPILOT_LLM_LOCATION");

    push("agent.max_steps", &config.agent.max_steps.to_string(), "ADPILOT_AGENT_MAX_STEPS");
    push(
        "agent.instructions_collection",
        &config.agent.instructions_collection,
        "ADPILOT_AGENT_INSTRUCTIONS_COLLECTION",
    );

    push("logging.level", &config.logging.level, "ADPILOT_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "ADPILOT_LOGGING_FORMAT");

    for (name, api) in &config.agent.external_apis {
        let base_url_key = format!("agent.external_apis.{name}.base_url");
        let file_source = field_source(
            &base_url_key,
            None,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(&base_url_key, &api.base_url, file_source));

        let api_key_key = format!("agent.external_apis.{name}.api_key");
        lines.push(render_line(
            &api_key_key,
            optional_secret(&api.api_key),
            source(&api_key_key, &ExternalApiConfig::key_env_var(name)),
        ));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("adpilot.toml"), PathBuf::from("config/adpilot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn optional_secret(value: &Option<SecretString>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

/// Keeps a short recognizable prefix (`ya29.`, `dev-`) and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix_end = trimmed.find(['.', '-']).filter(|index| *index <= 8);
    match prefix_end {
        Some(index) => format!("{}***", &trimmed[..=index]),
        None => "<redacted>".to_string(),
    }
}
